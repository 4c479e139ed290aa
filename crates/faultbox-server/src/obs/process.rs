//! Process resource usage read from procfs.
//!
//! Sampled on demand at scrape time. Every reader returns `None` when the
//! file is missing or unparsable (non-Linux hosts, restricted containers),
//! and the corresponding series is simply not updated.

use std::fs;

/// Kernel clock ticks per second as exposed in `/proc/<pid>/stat`.
const USER_HZ: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessSample {
    pub cpu_seconds: Option<f64>,
    pub resident_bytes: Option<u64>,
    pub virtual_bytes: Option<u64>,
    pub open_fds: Option<u64>,
}

pub fn sample() -> ProcessSample {
    let status = fs::read_to_string("/proc/self/status").ok();
    ProcessSample {
        cpu_seconds: fs::read_to_string("/proc/self/stat")
            .ok()
            .and_then(|s| cpu_seconds_from_stat(&s)),
        resident_bytes: status.as_deref().and_then(|s| status_kib(s, "VmRSS")).map(|kb| kb * 1024),
        virtual_bytes: status.as_deref().and_then(|s| status_kib(s, "VmSize")).map(|kb| kb * 1024),
        open_fds: fs::read_dir("/proc/self/fd").ok().map(|d| d.count() as u64),
    }
}

/// `utime + stime` in seconds from a `/proc/<pid>/stat` line.
///
/// The command name is parenthesised and may contain spaces, so fields are
/// counted from the last `)`.
pub fn cpu_seconds_from_stat(stat: &str) -> Option<f64> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    // After `)`: state(0) ... utime(11) stime(12)
    let utime: u64 = fields.nth(11)?.parse().ok()?;
    let stime: u64 = fields.next()?.parse().ok()?;
    Some((utime + stime) as f64 / USER_HZ)
}

/// Value of a `Key:   1234 kB` line from `/proc/<pid>/status`.
pub fn status_kib(status: &str, key: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let value = line.strip_prefix(key)?.strip_prefix(':')?;
        value.split_whitespace().next()?.parse().ok()
    })
}
