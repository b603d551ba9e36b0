use std::ffi::CStr;
use std::io;

use anyhow::Context as _;
use aya::maps::{PerCpuArray, RingBuf};
use aya::Ebpf;
use log::{error, info};
use prettytable::{color, row, Attr, Cell, Row, Table};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use users::{get_group_by_gid, get_user_by_uid};

use permsnoop_common::{AccessEvent, AccessMask, EventStats};

pub fn wait_events(ebpf: &mut Ebpf) -> Result<(), anyhow::Error> {
    let ring = RingBuf::try_from(ebpf.take_map("EVENTS").context("EVENTS map missing")?)?;
    let mut poll = AsyncFd::with_interest(ring, Interest::READABLE)?;
    tokio::task::spawn(async move {
        loop {
            match poll.readable_mut().await {
                Ok(mut guard) => {
                    let ring = guard.get_inner_mut();
                    while let Some(item) = ring.next() {
                        match decode_event(&item) {
                            Some(event) => print_event(&event),
                            None => error!("short ring buffer record: {} bytes", item.len()),
                        }
                    }
                    guard.clear_ready();
                }
                Err(err) => {
                    error!("failed to poll event ring: {}", err);
                    break;
                }
            }
        }
    });
    Ok(())
}

/// Delivery counters, summed across CPUs; dropped records are the
/// documented cost of the non-blocking hot path.
pub fn report_stats(ebpf: &mut Ebpf) -> Result<(), anyhow::Error> {
    let stats: PerCpuArray<_, EventStats> =
        PerCpuArray::try_from(ebpf.take_map("STATS").context("STATS map missing")?)?;
    let values = stats.get(&0, 0)?;
    let (matched, dropped) = values
        .iter()
        .fold((0u64, 0u64), |(m, d), s| (m + s.matched, d + s.dropped));
    info!("{} permission check(s) matched, {} record(s) dropped", matched, dropped);
    Ok(())
}

fn decode_event(buf: &[u8]) -> Option<AccessEvent> {
    if buf.len() < AccessEvent::SIZE {
        return None;
    }
    Some(unsafe { (buf.as_ptr() as *const AccessEvent).read_unaligned() })
}

fn comm_str(comm: &[u8]) -> &str {
    CStr::from_bytes_until_nul(comm)
        .unwrap_or(c"Unknown")
        .to_str()
        .unwrap_or("Unknown")
}

fn print_event(event: &AccessEvent) {
    let mut table = Table::new();
    let user_name = match get_user_by_uid(event.uid) {
        None => format!("{}", event.uid),
        Some(name) => name.name().to_string_lossy().to_string(),
    };
    let group_name = match get_group_by_gid(event.gid) {
        None => format!("{}", event.gid),
        Some(name) => name.name().to_string_lossy().to_string(),
    };
    let access = AccessMask::from_bits_truncate(event.mask);
    table.set_titles(row![
        "command",
        "pid/tgid",
        "user",
        "group",
        "access",
        "dev/inode"
    ]);
    table.add_row(Row::new(vec![
        Cell::new(comm_str(&event.comm)).with_style(Attr::ForegroundColor(color::BLUE)),
        Cell::new(&format!("{}/{}", event.pid, event.tgid))
            .with_style(Attr::ForegroundColor(color::BRIGHT_WHITE)),
        Cell::new(user_name.as_str()).with_style(Attr::ForegroundColor(color::BRIGHT_YELLOW)),
        Cell::new(group_name.as_str()).with_style(Attr::ForegroundColor(color::BRIGHT_YELLOW)),
        Cell::new(&format!("{} (0x{:x})", access, event.mask))
            .with_style(Attr::ForegroundColor(color::GREEN)),
        Cell::new(&format!(
            "{}:{}/{}",
            permsnoop_common::dev_major(event.dev),
            permsnoop_common::dev_minor(event.dev),
            event.ino
        ))
        .with_style(Attr::ForegroundColor(color::BRIGHT_WHITE)),
    ]));
    {
        //prevent overprinting when using multithreading
        let _stdout = io::stdout().lock();
        let _ = table.print_tty(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permsnoop_common::TASK_COMM_LEN;

    #[test]
    fn decode_round_trips_a_fixed_record() {
        let mut comm = [0u8; TASK_COMM_LEN];
        comm[..4].copy_from_slice(b"bash");
        let event = AccessEvent {
            pid: 4242,
            tgid: 4242,
            uid: 1000,
            gid: 1000,
            dev: (8 << 20) | 3,
            ino: 1050,
            mask: 4,
            comm,
        };
        let bytes = unsafe {
            std::slice::from_raw_parts(&event as *const _ as *const u8, AccessEvent::SIZE)
        };
        let decoded = decode_event(bytes).unwrap();
        assert_eq!(decoded.pid, 4242);
        assert_eq!(decoded.uid, 1000);
        assert_eq!(decoded.dev, (8 << 20) | 3);
        assert_eq!(decoded.ino, 1050);
        assert_eq!(decoded.mask, 4);
        assert_eq!(comm_str(&decoded.comm), "bash");
    }

    #[test]
    fn short_records_are_rejected() {
        assert!(decode_event(&[0u8; 8]).is_none());
    }
}
