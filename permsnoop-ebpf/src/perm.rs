use aya_ebpf::helpers;
use aya_ebpf::programs::ProbeContext;
use aya_log_ebpf::debug;

use permsnoop_common::{AccessEvent, WatchKey};

use crate::read_struct_field;
use crate::tools::ERROR_FAULT;
use crate::vmlinuz::inode;
use crate::{EVENTS, STATS, WATCHED_INODES};

// Probed function:
//   int inode_permission(struct mnt_idmap *idmap,
//                        struct inode *inode, int mask)
// The leading idmap argument (user_namespace before 6.3) appeared in 5.12;
// earlier kernels pass the inode first.
#[cfg(not(feature = "kernel-pre-5-12"))]
const INODE_ARG: usize = 1;
#[cfg(not(feature = "kernel-pre-5-12"))]
const MASK_ARG: usize = 2;
#[cfg(feature = "kernel-pre-5-12")]
const INODE_ARG: usize = 0;
#[cfg(feature = "kernel-pre-5-12")]
const MASK_ARG: usize = 1;

pub fn try_inode_permission(ctx: ProbeContext) -> Result<u32, i64> {
    let inode_ptr: *const inode = ctx.arg(INODE_ARG).ok_or(ERROR_FAULT)?;
    let mask: i32 = ctx.arg(MASK_ARG).ok_or(ERROR_FAULT)?;
    if inode_ptr.is_null() {
        return Ok(0);
    }
    let ino = read_struct_field!(inode_ptr, i_ino)?;
    let sb = read_struct_field!(inode_ptr, i_sb)?;
    // a zero inode or null superblock means the read went wrong;
    // treat it as a miss rather than emitting a garbage identity
    if ino == 0 || sb.is_null() {
        return Ok(0);
    }
    let dev = read_struct_field!(sb, s_dev)?;
    let key = WatchKey::new(dev, ino);
    if WATCHED_INODES.get_ptr(&key).is_none() {
        // the expected common case
        return Ok(0);
    }
    let event = fill_event(&key, mask)?;
    // ring full means the record is dropped, never a stall on this path
    let delivered = EVENTS.output(&event, 0).is_ok();
    count(delivered);
    if delivered {
        debug!(&ctx, "matched check on {}:{} mask {}", dev, ino, mask);
    }
    Ok(0)
}

fn fill_event(key: &WatchKey, mask: i32) -> Result<AccessEvent, i64> {
    let mut event = AccessEvent::zeroed();
    let pid_tgid = unsafe { helpers::bpf_get_current_pid_tgid() };
    event.tgid = (pid_tgid >> 32) as i32;
    event.pid = pid_tgid as i32;
    let uid_gid = unsafe { helpers::bpf_get_current_uid_gid() };
    event.gid = (uid_gid >> 32) as u32;
    event.uid = uid_gid as u32;
    event.dev = key.device;
    event.ino = key.inode;
    event.mask = mask;
    event.comm = helpers::bpf_get_current_comm().map_err(|_| ERROR_FAULT)?;
    Ok(event)
}

fn count(delivered: bool) {
    if let Some(stats) = STATS.get_ptr_mut(0) {
        let stats = unsafe { &mut *stats };
        stats.matched += 1;
        if !delivered {
            stats.dropped += 1;
        }
    }
}
