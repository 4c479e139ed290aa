//! Simulated CPU load.
//!
//! `burn_cpu` is a deliberate busy loop, not a sleep: the point is to drive
//! CPU utilization telemetry. It blocks the calling thread for the whole
//! duration, so async callers must move it onto a blocking worker.

use std::hint::black_box;
use std::time::{Duration, Instant};

/// Used when the `duration` query is absent or not a number.
pub const DEFAULT_BURN_MS: u64 = 3000;

/// Parse a requested burn duration in milliseconds.
///
/// Takes the leading decimal digits (`"500"`, `"+500"`, `"500ms"` -> 500).
/// Absent, empty, negative or non-numeric input falls back to
/// [`DEFAULT_BURN_MS`].
pub fn parse_duration_ms(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else {
        return DEFAULT_BURN_MS;
    };
    let raw = raw.trim_start();
    let raw = raw.strip_prefix('+').unwrap_or(raw);
    let end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    if end == 0 {
        return DEFAULT_BURN_MS;
    }
    // Digit strings too long for u64 saturate.
    raw[..end].parse().unwrap_or(u64::MAX)
}

/// Spin on floating-point work until at least `target` wall-clock time has
/// elapsed. Returns the actual elapsed time.
pub fn burn_cpu(target: Duration) -> Duration {
    let start = Instant::now();
    let mut acc = 0.0f64;
    let mut x = 1.0f64;
    while start.elapsed() < target {
        for _ in 0..1024 {
            x = (x * 1.000_001 + 0.5).sqrt();
            acc += x;
        }
        black_box(acc);
    }
    start.elapsed()
}
