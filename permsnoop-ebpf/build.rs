use std::env;

/// Kernel structure layouts differ per architecture; refuse to build for
/// anything the checked-in bindings were not generated for.
const SUPPORTED: &[&str] = &["x86_64", "aarch64"];

fn main() {
    println!("cargo:rerun-if-env-changed=BPF_TARGET_ARCH");
    println!("cargo:rustc-check-cfg=cfg(bpf_target_arch, values(\"x86_64\", \"aarch64\"))");
    let arch = env::var("BPF_TARGET_ARCH").unwrap_or_else(|_| {
        let host = env::var("HOST").unwrap();
        host.split('-').next().unwrap().to_owned()
    });
    if !SUPPORTED.contains(&arch.as_str()) {
        panic!(
            "unsupported BPF target architecture `{}` (supported: {})",
            arch,
            SUPPORTED.join(", ")
        );
    }
    println!("cargo:rustc-cfg=bpf_target_arch=\"{arch}\"");
}
