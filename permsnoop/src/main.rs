use anyhow::Context as _;
use aya::programs::KProbe;
use aya::Ebpf;
use aya_log::EbpfLogger;
use clap::Parser;
use log::{debug, info, warn};
use tokio::signal;

use crate::setup::{check_permission, version_check, Args};
use crate::watch::WatchSet;

mod event;
mod setup;
pub mod version;
mod watch;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    check_permission();
    env_logger::init();
    version_check(&args)?;
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!("remove limit on locked memory failed, ret is: {}", ret);
    }

    let mut ebpf = Ebpf::load_file(&args.object)
        .with_context(|| format!("loading {} (build it with `cargo xtask build-ebpf`)", args.object.display()))?;
    if let Err(e) = EbpfLogger::init(&mut ebpf) {
        // This can happen if you remove all log statements from your eBPF program.
        warn!("failed to initialize eBPF logger: {}", e);
    }

    let mut watches = WatchSet::new(
        ebpf.take_map("WATCHED_INODES")
            .context("WATCHED_INODES map missing")?,
    )?;
    let watched = setup::populate(&args, &mut watches)?;
    info!("{} object(s) under watch", watched);

    let program: &mut KProbe = ebpf
        .program_mut("permsnoop")
        .context("permsnoop program missing")?
        .try_into()?;
    program.load()?;
    program.attach("inode_permission", 0)?;

    event::wait_events(&mut ebpf)?;
    info!("Waiting for Ctrl-C...");
    signal::ctrl_c().await?;
    event::report_stats(&mut ebpf)?;
    watches.clear()?;
    info!("Exiting...");
    Ok(())
}
