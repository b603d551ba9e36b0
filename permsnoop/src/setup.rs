use std::fs;
use std::io::{self, Read};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context as _;
use clap::Parser;
use log::{debug, warn};
use walkdir::WalkDir;

use permsnoop_common::{encode_kernel_dev, split_userspace_dev, WatchKey};

use crate::version::KERNEL_VERSION_STR;
use crate::watch::WatchSet;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// file to watch for permission checks
    #[arg(short, long)]
    pub path: Vec<PathBuf>,
    /// watch every regular file currently under this directory
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
    /// if walk dir follow links
    #[arg(short, long, default_value_t = false)]
    pub follow_links: bool,
    /// linux kernel version that program compile for
    #[arg(short, long, default_value_t = false)]
    pub kernel_version: bool,
    /// eBPF object built by `cargo xtask build-ebpf`
    #[arg(short, long, default_value = DEFAULT_OBJECT)]
    pub object: PathBuf,
}

#[cfg(debug_assertions)]
const DEFAULT_OBJECT: &str = "target/bpfel-unknown-none/debug/permsnoop-ebpf";
#[cfg(not(debug_assertions))]
const DEFAULT_OBJECT: &str = "target/bpfel-unknown-none/release/permsnoop-ebpf";

pub fn version_check(args: &Args) -> Result<(), anyhow::Error> {
    if args.kernel_version {
        println!("{}", KERNEL_VERSION_STR);
        process::exit(0)
    }
    let mut fd = fs::File::open("/proc/version").context("open /proc/version")?;
    let mut version = String::new();
    fd.read_to_string(&mut version)?;
    let version = version.trim_end();
    if KERNEL_VERSION_STR != version {
        println!("program kernel version: {}", KERNEL_VERSION_STR);
        println!("current kernel version: {}", version);
        println!("Please recompile otherwise errors may occur");
        process::exit(1)
    }
    Ok(())
}

pub fn check_permission() {
    if unsafe { libc::geteuid() } != 0 {
        eprintln!("currently only supports running as the root user.");
        process::exit(1);
    }
}

/// The identity the watch set is keyed on: inode plus the kernel s_dev
/// encoding of the owning device.
pub fn resolve(path: &Path) -> Result<WatchKey, io::Error> {
    let md = fs::metadata(path)?;
    let (major, minor) = split_userspace_dev(md.dev());
    Ok(WatchKey::new(encode_kernel_dev(major, minor), md.ino()))
}

pub fn populate(args: &Args, watches: &mut WatchSet) -> Result<usize, anyhow::Error> {
    let mut keys = Vec::new();
    for path in &args.path {
        let key = resolve(path).with_context(|| format!("resolving {}", path.display()))?;
        debug!("watching {} as {}", path.display(), key);
        keys.push(key);
    }
    if let Some(dir) = &args.dir {
        for entry in WalkDir::new(dir)
            .follow_links(args.follow_links)
            .follow_root_links(true)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("skipping directory entry: {}", err);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match resolve(entry.path()) {
                Ok(key) => {
                    debug!("watching {} as {}", entry.path().display(), key);
                    keys.push(key);
                }
                Err(err) => debug!("skipping {}: {}", entry.path().display(), err),
            }
        }
    }
    if keys.is_empty() {
        warn!("nothing to watch; pass --path or --dir");
    }
    for key in keys {
        watches
            .insert(key)
            .with_context(|| format!("watching {}", key))?;
    }
    Ok(watches.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use permsnoop_common::{dev_major, dev_minor};

    #[test]
    fn resolve_keys_on_kernel_dev_encoding() {
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        let key = resolve(&manifest).unwrap();
        let md = fs::metadata(&manifest).unwrap();
        assert_eq!(key.inode, md.ino());
        let (major, minor) = split_userspace_dev(md.dev());
        assert_eq!(dev_major(key.device), major);
        assert_eq!(dev_minor(key.device), minor);
    }

    #[test]
    fn resolve_reports_missing_paths() {
        assert!(resolve(Path::new("/no/such/file/for/permsnoop")).is_err());
    }
}
