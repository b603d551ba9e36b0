#![no_std]
#![no_main]
#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]

use aya_ebpf::macros::{kprobe, map};
use aya_ebpf::maps::{HashMap, PerCpuArray, RingBuf};
use aya_ebpf::programs::ProbeContext;

use permsnoop_common::{EventStats, WatchKey, EVENT_RING_BYTES, MAX_WATCHED};

mod perm;
mod tools;
mod vmlinuz;

/// Watched identities, mutated only from user space; the probe does point
/// lookups and never writes.
#[map]
static WATCHED_INODES: HashMap<WatchKey, u8> = HashMap::with_max_entries(MAX_WATCHED as u32, 0);

#[map]
static EVENTS: RingBuf = RingBuf::with_byte_size(EVENT_RING_BYTES, 0);

#[map]
static STATS: PerCpuArray<EventStats> = PerCpuArray::with_max_entries(1, 0);

#[kprobe]
pub fn permsnoop(ctx: ProbeContext) -> u32 {
    // observe only: faults are swallowed here so the authorization path
    // never sees an error from the probe
    perm::try_inode_permission(ctx).unwrap_or(0)
}

#[link_section = "license"]
#[no_mangle]
static LICENSE: [u8; 4] = *b"GPL\0";

#[cfg(target_arch = "bpf")]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
