//! Trimmed kernel structure layouts for the fields the probe reads.
//!
//! Regenerated for the running kernel by `cargo xtask build-ebpf`
//! (aya-tool); the checked-in copy matches the kernel recorded in
//! permsnoop/src/version.rs. Only the members up to and including the
//! ones we read are declared, so every access stays a fixed-offset
//! `bpf_probe_read_kernel`.

#![allow(non_camel_case_types)]
#![allow(dead_code)]

#[cfg(any(bpf_target_arch = "x86_64", bpf_target_arch = "aarch64"))]
mod layout {
    use core::ffi::c_void;

    #[repr(C)]
    pub struct super_block {
        pub s_list: [*mut c_void; 2],
        pub s_dev: u32,
    }

    #[repr(C)]
    pub struct inode {
        pub i_mode: u16,
        pub i_opflags: u16,
        pub i_uid: u32,
        pub i_gid: u32,
        pub i_flags: u32,
        pub i_acl: *mut c_void,
        pub i_default_acl: *mut c_void,
        pub i_op: *const c_void,
        pub i_sb: *mut super_block,
        pub i_mapping: *mut c_void,
        pub i_security: *mut c_void,
        pub i_ino: u64,
    }
}

#[cfg(not(any(bpf_target_arch = "x86_64", bpf_target_arch = "aarch64")))]
compile_error!(
    "no kernel structure layouts for this architecture; \
     regenerate vmlinuz.rs with `cargo xtask build-ebpf` on a supported target"
);

#[cfg(any(bpf_target_arch = "x86_64", bpf_target_arch = "aarch64"))]
pub use layout::*;
