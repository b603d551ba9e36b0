#![cfg_attr(not(test), no_std)]

use bitflags::bitflags;
use core::fmt::{self, Display};

/// Upper bound on watched objects; map capacity is fixed at load time.
pub const MAX_WATCHED: usize = 1024;
/// Event ring buffer size in bytes.
pub const EVENT_RING_BYTES: u32 = 16 * 1024 * 1024;
pub const TASK_COMM_LEN: usize = 16;

bitflags! {
    /// Requested access bits as inode_permission() receives them
    /// (MAY_* in include/linux/fs.h).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct AccessMask: i32 {
        const EXEC      = 0x01;
        const WRITE     = 0x02;
        const READ      = 0x04;
        const APPEND    = 0x08;
        const ACCESS    = 0x10;
        const OPEN      = 0x20;
        const CHDIR     = 0x40;
        const NOT_BLOCK = 0x80;
    }
}

impl Display for AccessMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// Identity of a watched object. Inode numbers are unique only within a
/// device, so the device is always part of the key. `device` carries the
/// kernel's s_dev encoding (major << 20 | minor), not the glibc st_dev one.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WatchKey {
    pub inode: u64,
    pub device: u32,
    // explicit tail padding so the map key never carries uninitialised bytes
    pad: u32,
}

impl WatchKey {
    pub const fn new(device: u32, inode: u64) -> Self {
        Self {
            inode,
            device,
            pad: 0,
        }
    }
}

impl Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            dev_major(self.device),
            dev_minor(self.device),
            self.inode
        )
    }
}

/// One matched permission check. Built whole on the probe stack and copied
/// whole into the ring buffer; never partially written.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AccessEvent {
    pub pid: i32,
    pub tgid: i32,
    pub uid: u32,
    pub gid: u32,
    pub dev: u32,
    pub ino: u64,
    pub mask: i32,
    pub comm: [u8; TASK_COMM_LEN],
}

impl AccessEvent {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    pub const fn zeroed() -> Self {
        Self {
            pid: 0,
            tgid: 0,
            uid: 0,
            gid: 0,
            dev: 0,
            ino: 0,
            mask: 0,
            comm: [0; TASK_COMM_LEN],
        }
    }
}

/// Per-CPU delivery counters; drop-on-full is deliberate and these make it
/// observable instead of silent.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct EventStats {
    pub matched: u64,
    pub dropped: u64,
}

/// Split a glibc-encoded st_dev into (major, minor).
pub const fn split_userspace_dev(dev: u64) -> (u32, u32) {
    let major = (((dev >> 8) & 0xfff) | ((dev >> 32) & !0xfff)) as u32;
    let minor = ((dev & 0xff) | ((dev >> 12) & !0xff)) as u32;
    (major, minor)
}

/// Kernel-internal s_dev encoding (new_encode_dev in the kernel).
pub const fn encode_kernel_dev(major: u32, minor: u32) -> u32 {
    (major << 20) | minor
}

pub const fn dev_major(dev: u32) -> u32 {
    dev >> 20
}

pub const fn dev_minor(dev: u32) -> u32 {
    dev & 0xfffff
}

#[cfg(feature = "user")]
mod user {
    use super::{AccessEvent, EventStats, WatchKey};

    unsafe impl aya::Pod for WatchKey {}
    unsafe impl aya::Pod for AccessEvent {}
    unsafe impl aya::Pod for EventStats {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{offset_of, size_of};

    #[test]
    fn event_layout_matches_wire_order() {
        assert_eq!(offset_of!(AccessEvent, pid), 0);
        assert_eq!(offset_of!(AccessEvent, tgid), 4);
        assert_eq!(offset_of!(AccessEvent, uid), 8);
        assert_eq!(offset_of!(AccessEvent, gid), 12);
        assert_eq!(offset_of!(AccessEvent, dev), 16);
        assert_eq!(offset_of!(AccessEvent, ino), 24);
        assert_eq!(offset_of!(AccessEvent, mask), 32);
        assert_eq!(offset_of!(AccessEvent, comm), 36);
        assert_eq!(AccessEvent::SIZE, 56);
    }

    #[test]
    fn watch_key_has_no_hidden_padding() {
        assert_eq!(size_of::<WatchKey>(), 16);
        assert_eq!(offset_of!(WatchKey, inode), 0);
        assert_eq!(offset_of!(WatchKey, device), 8);
        let key = WatchKey::new(0x800003, 1050);
        assert_eq!(key.pad, 0);
    }

    #[test]
    fn device_encoding_round_trips() {
        // sda3: glibc makedev(8, 3)
        let st_dev: u64 = (8 << 8) | 3;
        let (major, minor) = split_userspace_dev(st_dev);
        assert_eq!((major, minor), (8, 3));
        let kdev = encode_kernel_dev(major, minor);
        assert_eq!(kdev, (8 << 20) | 3);
        assert_eq!(dev_major(kdev), 8);
        assert_eq!(dev_minor(kdev), 3);
    }

    #[test]
    fn large_major_survives_glibc_split() {
        // nvme: major 259, minor 5
        let st_dev: u64 = (259 << 8) | 5;
        assert_eq!(split_userspace_dev(st_dev), (259, 5));
    }

    #[test]
    fn mask_renders_named_bits() {
        let mask = AccessMask::from_bits_truncate(0x05);
        assert_eq!(mask.to_string(), "EXEC|READ");
        assert_eq!(AccessMask::empty().to_string(), "none");
        // unknown high bits are ignored rather than failing the decode
        assert_eq!(AccessMask::from_bits_truncate(0x104), AccessMask::READ);
    }

    #[test]
    fn watch_key_display_splits_device() {
        let key = WatchKey::new(encode_kernel_dev(8, 3), 1050);
        assert_eq!(key.to_string(), "8:3/1050");
    }
}
