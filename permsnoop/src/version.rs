pub const KERNEL_VERSION_STR: &str = "Linux version 6.8.0-57-generic (buildd@lcy02-amd64-101) (x86_64-linux-gnu-gcc-13 (Ubuntu 13.3.0-6ubuntu2~24.04) 13.3.0, GNU ld (GNU Binutils for Ubuntu) 2.42) #59-Ubuntu SMP PREEMPT_DYNAMIC Sat Mar 15 17:40:59 UTC 2025";
