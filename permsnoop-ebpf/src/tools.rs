pub const ERROR_FAULT: i64 = -1;

/// Validated field read from kernel memory; any fault maps to ERROR_FAULT
/// so the caller can treat it as a miss.
#[macro_export]
macro_rules! read_struct_field {
    ($obj: ident, $field: ident $(.$subfield:ident)*) => {
        unsafe {
            aya_ebpf::helpers::bpf_probe_read_kernel(&(*$obj).$field $(.$subfield)*)
                .map_err(|_| $crate::tools::ERROR_FAULT)
        }
    };
}
