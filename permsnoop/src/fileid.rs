//! Companion diagnostic: print the (device, inode) identity of a path,
//! both as stat(2) reports it and as the kernel keys the watch set.

use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

use clap::Parser;

use permsnoop_common::{encode_kernel_dev, split_userspace_dev};

#[derive(Parser, Debug)]
#[command(author, version, about = "print the device and inode identity of a path")]
struct Args {
    path: PathBuf,
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let md = std::fs::metadata(&args.path)?;
    let (major, minor) = split_userspace_dev(md.dev());
    let kdev = encode_kernel_dev(major, minor);
    println!("path:   {}", args.path.display());
    println!("st_dev: {} (0x{:x}, {}:{})", md.dev(), md.dev(), major, minor);
    println!("device: {} (kernel s_dev encoding)", kdev);
    println!("inode:  {}", md.ino());
    Ok(())
}
