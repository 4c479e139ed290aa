//! Error-injection controller.
//!
//! Holds the process error rate as f64 bits in an `AtomicU64`, so reads and
//! writes never lock. Trials draw one uniform sample in `[0, 1)` and fail when
//! the sample is below the current rate.
//!
//! Randomness is injectable: a seeded controller derives each trial's RNG from
//! `(seed, trial index)`, which makes a sequence of trials reproducible while
//! keeping trials lock-free and independent of each other.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::{FaultboxError, Result};

const TRIAL_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Current rate as reported over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSnapshot {
    #[serde(rename = "errorRate")]
    pub error_rate: f64,
    pub percentage: String,
}

impl RateSnapshot {
    pub fn new(rate: f64) -> Self {
        Self {
            error_rate: rate,
            percentage: format_percentage(rate),
        }
    }
}

/// `0.5` -> `"50.0%"`.
pub fn format_percentage(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

#[derive(Debug)]
enum TrialSource {
    Entropy,
    Seeded { seed: u64, trials: AtomicU64 },
}

/// Owned, thread-safe error rate with get/set and per-request trials.
#[derive(Debug)]
pub struct FaultController {
    rate_bits: AtomicU64,
    source: TrialSource,
}

impl Default for FaultController {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultController {
    /// Rate 0.0, trials drawn from the thread-local entropy RNG.
    pub fn new() -> Self {
        Self {
            rate_bits: AtomicU64::new(0f64.to_bits()),
            source: TrialSource::Entropy,
        }
    }

    /// Rate 0.0, reproducible trial sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rate_bits: AtomicU64::new(0f64.to_bits()),
            source: TrialSource::Seeded {
                seed,
                trials: AtomicU64::new(0),
            },
        }
    }

    /// Builder-style initial rate. Fails with `InvalidRate` like `set_rate`.
    pub fn with_rate(self, rate: f64) -> Result<Self> {
        self.set_rate(rate)?;
        Ok(self)
    }

    pub fn get_rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> RateSnapshot {
        RateSnapshot::new(self.get_rate())
    }

    /// Replace the rate. Non-finite or out-of-range values leave the prior
    /// rate untouched.
    pub fn set_rate(&self, value: f64) -> Result<RateSnapshot> {
        validate_rate(value)?;
        // -0.0 + 0.0 == +0.0
        let value = value + 0.0;
        self.rate_bits.store(value.to_bits(), Ordering::Release);
        Ok(RateSnapshot::new(value))
    }

    /// One independent trial against the current rate.
    pub fn should_fail(&self) -> bool {
        let rate = self.get_rate();
        self.sample() < rate
    }

    fn sample(&self) -> f64 {
        match &self.source {
            TrialSource::Entropy => rand::thread_rng().gen::<f64>(),
            TrialSource::Seeded { seed, trials } => {
                let n = trials.fetch_add(1, Ordering::Relaxed);
                let mut rng = StdRng::seed_from_u64(seed ^ n.wrapping_mul(TRIAL_STRIDE));
                rng.gen::<f64>()
            }
        }
    }
}

pub fn validate_rate(value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(FaultboxError::InvalidRate(format!("{value} is not a finite number")));
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(FaultboxError::InvalidRate(format!("{value} is outside [0, 1]")));
    }
    Ok(())
}

/// Extract `rate` from a request body such as `{"rate": 0.3}`.
///
/// Numbers are taken as-is; strings use leading-float parsing (`"0.3"`,
/// `"0.3abc"`). Anything else, including a body that is not JSON, is an
/// `InvalidRate`. Range checking is left to `set_rate`.
pub fn rate_from_body(body: &[u8]) -> Result<f64> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| FaultboxError::InvalidRate(format!("body is not json: {e}")))?;

    match value.get("rate") {
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| FaultboxError::InvalidRate(format!("unrepresentable number: {n}"))),
        Some(serde_json::Value::String(s)) => leading_float(s)
            .ok_or_else(|| FaultboxError::InvalidRate(format!("not a number: {s:?}"))),
        Some(other) => Err(FaultboxError::InvalidRate(format!("not a number: {other}"))),
        None => Err(FaultboxError::InvalidRate("missing field `rate`".into())),
    }
}

/// Parse the longest decimal float prefix of `s`, after leading whitespace.
pub fn leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let b = s.as_bytes();
    let digits = |mut i: usize| {
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(b.first(), Some(b'+' | b'-')));
    let int_start = end;
    end = digits(end);
    let mut mantissa = end - int_start;

    if b.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let frac_end = digits(frac_start);
        mantissa += frac_end - frac_start;
        end = frac_end;
    }
    if mantissa == 0 {
        return None;
    }

    if matches!(b.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(b.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}
