//! Named metrics registry with Prometheus text export.
//!
//! Families are declared once (`register_*`) and then updated by name with
//! positional label values matching the declared label names. Every series is
//! a set of atomics inside a `DashMap`, so updates from many request tasks
//! never serialize on a global lock. Export walks families and series in
//! sorted order to keep the output deterministic.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{FaultboxError, Result};

/// Content type served with [`Registry::export`] output.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Default request-latency buckets, in seconds.
pub const DEFAULT_DURATION_BUCKETS: [f64; 11] =
    [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn fmt_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v == f64::INFINITY {
        "+Inf".into()
    } else if v == f64::NEG_INFINITY {
        "-Inf".into()
    } else {
        v.to_string()
    }
}

struct AtomicHistogram {
    count: AtomicU64,
    sum_bits: AtomicU64,
    buckets: Vec<AtomicU64>,
}

impl AtomicHistogram {
    fn new(len: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_bits: AtomicU64::new(0f64.to_bits()),
            buckets: (0..len).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn observe(&self, bounds: &[f64], v: f64) {
        // Cumulative buckets: increment every bucket whose bound covers v.
        for (i, &le) in bounds.iter().enumerate() {
            if v <= le {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        let _ = self
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + v).to_bits())
            });
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

enum Series {
    Counter(DashMap<Vec<String>, AtomicU64>),
    /// Counter mirrored from an external cumulative source, f64 bits.
    Cumulative(DashMap<Vec<String>, AtomicU64>),
    /// f64 bits.
    Gauge(DashMap<Vec<String>, AtomicU64>),
    Histogram {
        bounds: Vec<f64>,
        map: DashMap<Vec<String>, AtomicHistogram>,
    },
}

struct Family {
    name: String,
    help: String,
    label_names: Vec<String>,
    series: Series,
}

impl Family {
    fn kind(&self) -> MetricKind {
        match self.series {
            Series::Counter(_) | Series::Cumulative(_) => MetricKind::Counter,
            Series::Gauge(_) => MetricKind::Gauge,
            Series::Histogram { .. } => MetricKind::Histogram,
        }
    }

    fn key(&self, values: &[&str]) -> Result<Vec<String>> {
        if values.len() != self.label_names.len() {
            return Err(FaultboxError::LabelMismatch {
                name: self.name.clone(),
                expected: self.label_names.len(),
                got: values.len(),
            });
        }
        Ok(values.iter().map(|v| v.to_string()).collect())
    }

    fn wrong_kind(&self, wanted: MetricKind) -> FaultboxError {
        FaultboxError::UnknownMetric(format!(
            "{} is a {}, not a {}",
            self.name,
            self.kind().as_str(),
            wanted.as_str()
        ))
    }

    /// `a="x",b="y"`, with an optional trailing extra pair.
    fn label_str(&self, values: &[String], extra: Option<(&str, &str)>) -> String {
        let mut parts: Vec<String> = self
            .label_names
            .iter()
            .zip(values)
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
            .collect();
        if let Some((k, v)) = extra {
            parts.push(format!("{}=\"{}\"", k, escape_label(v)));
        }
        parts.join(",")
    }

    fn write_sample(out: &mut String, name: &str, labels: &str, value: &str) {
        if labels.is_empty() {
            let _ = writeln!(out, "{} {}", name, value);
        } else {
            let _ = writeln!(out, "{}{{{}}} {}", name, labels, value);
        }
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, escape_help(&self.help));
        let _ = writeln!(out, "# TYPE {} {}", self.name, self.kind().as_str());

        match &self.series {
            Series::Counter(map) => {
                for (key, val) in sorted(map, |a| a.load(Ordering::Relaxed)) {
                    let labels = self.label_str(&key, None);
                    Self::write_sample(out, &self.name, &labels, &val.to_string());
                }
            }
            Series::Gauge(map) | Series::Cumulative(map) => {
                for (key, bits) in sorted(map, |a| a.load(Ordering::Relaxed)) {
                    let labels = self.label_str(&key, None);
                    Self::write_sample(out, &self.name, &labels, &fmt_float(f64::from_bits(bits)));
                }
            }
            Series::Histogram { bounds, map } => {
                let snapshots = sorted(map, |h| {
                    let buckets: Vec<u64> =
                        h.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect();
                    let sum = f64::from_bits(h.sum_bits.load(Ordering::Relaxed));
                    let count = h.count.load(Ordering::Relaxed);
                    (buckets, sum, count)
                });
                let bucket_name = format!("{}_bucket", self.name);
                for (key, (buckets, sum, count)) in snapshots {
                    // Concurrent observers may be mid-update; keep the
                    // rendered snapshot cumulative.
                    let mut running = 0u64;
                    for (le, n) in bounds.iter().zip(buckets) {
                        running = running.max(n);
                        let labels = self.label_str(&key, Some(("le", &fmt_float(*le))));
                        Self::write_sample(out, &bucket_name, &labels, &running.to_string());
                    }
                    let total = running.max(count);
                    let labels = self.label_str(&key, Some(("le", "+Inf")));
                    Self::write_sample(out, &bucket_name, &labels, &total.to_string());

                    let labels = self.label_str(&key, None);
                    Self::write_sample(out, &format!("{}_sum", self.name), &labels, &fmt_float(sum));
                    Self::write_sample(out, &format!("{}_count", self.name), &labels, &total.to_string());
                }
            }
        }
    }
}

fn sorted<V, T>(map: &DashMap<Vec<String>, V>, read: impl Fn(&V) -> T) -> Vec<(Vec<String>, T)> {
    let mut rows: Vec<(Vec<String>, T)> = map
        .iter()
        .map(|r| (r.key().clone(), read(r.value())))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_' || c == ':')
        .unwrap_or(false);
    if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':') {
        return Err(FaultboxError::BadRequest(format!("invalid metric name: {name:?}")));
    }
    Ok(())
}

fn validate_buckets(name: &str, bounds: &[f64]) -> Result<()> {
    if bounds.is_empty() {
        return Err(FaultboxError::BadRequest(format!("{name}: buckets must not be empty")));
    }
    if bounds.iter().any(|b| !b.is_finite()) {
        return Err(FaultboxError::BadRequest(format!("{name}: buckets must be finite")));
    }
    if bounds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(FaultboxError::BadRequest(format!(
            "{name}: buckets must be strictly ascending"
        )));
    }
    Ok(())
}

/// Process metrics registry. Construct once and share by reference.
#[derive(Default)]
pub struct Registry {
    families: DashMap<String, Arc<Family>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, name: &str, help: &str, label_names: &[&str], series: Series) -> Result<()> {
        validate_name(name)?;
        for label in label_names {
            validate_name(label)?;
            if *label == "le" {
                return Err(FaultboxError::BadRequest(format!("{name}: label `le` is reserved")));
            }
        }
        match self.families.entry(name.to_string()) {
            Entry::Occupied(_) => Err(FaultboxError::DuplicateMetric(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Family {
                    name: name.to_string(),
                    help: help.to_string(),
                    label_names: label_names.iter().map(|l| l.to_string()).collect(),
                    series,
                }));
                Ok(())
            }
        }
    }

    fn family(&self, name: &str) -> Result<Arc<Family>> {
        self.families
            .get(name)
            .map(|f| Arc::clone(f.value()))
            .ok_or_else(|| FaultboxError::UnknownMetric(name.to_string()))
    }

    pub fn register_counter(&self, name: &str, help: &str, label_names: &[&str]) -> Result<()> {
        self.insert(name, help, label_names, Series::Counter(DashMap::new()))
    }

    /// Counter whose value is copied from a cumulative source (e.g. process
    /// CPU time) with [`Registry::set_cumulative`] instead of incremented.
    pub fn register_cumulative(&self, name: &str, help: &str, label_names: &[&str]) -> Result<()> {
        self.insert(name, help, label_names, Series::Cumulative(DashMap::new()))
    }

    pub fn register_gauge(&self, name: &str, help: &str, label_names: &[&str]) -> Result<()> {
        self.insert(name, help, label_names, Series::Gauge(DashMap::new()))
    }

    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Result<()> {
        validate_buckets(name, buckets)?;
        self.insert(
            name,
            help,
            label_names,
            Series::Histogram {
                bounds: buckets.to_vec(),
                map: DashMap::new(),
            },
        )
    }

    /// Increment a counter series by 1.
    pub fn increment(&self, name: &str, label_values: &[&str]) -> Result<()> {
        self.add(name, label_values, 1)
    }

    /// Increment a counter series by an arbitrary value.
    pub fn add(&self, name: &str, label_values: &[&str], v: u64) -> Result<()> {
        let family = self.family(name)?;
        let Series::Counter(map) = &family.series else {
            return Err(family.wrong_kind(MetricKind::Counter));
        };
        let key = family.key(label_values)?;
        let counter = map.entry(key).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_gauge(&self, name: &str, label_values: &[&str], value: f64) -> Result<()> {
        let family = self.family(name)?;
        let Series::Gauge(map) = &family.series else {
            return Err(family.wrong_kind(MetricKind::Gauge));
        };
        let key = family.key(label_values)?;
        let gauge = map.entry(key).or_insert_with(|| AtomicU64::new(0f64.to_bits()));
        gauge.store(value.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Raise a cumulative counter to `value`. Lower samples are ignored so
    /// the exported series never decreases.
    pub fn set_cumulative(&self, name: &str, label_values: &[&str], value: f64) -> Result<()> {
        let family = self.family(name)?;
        let Series::Cumulative(map) = &family.series else {
            return Err(family.wrong_kind(MetricKind::Counter));
        };
        if !value.is_finite() || value < 0.0 {
            return Err(FaultboxError::BadRequest(format!(
                "{name}: cumulative value must be a non-negative finite number, got {value}"
            )));
        }
        let key = family.key(label_values)?;
        let slot = map.entry(key).or_insert_with(|| AtomicU64::new(0f64.to_bits()));
        // Non-negative f64 bit patterns order like the values they encode.
        slot.fetch_max((value + 0.0).to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Record one observation, in seconds, into a histogram series.
    pub fn observe_duration(&self, name: &str, label_values: &[&str], seconds: f64) -> Result<()> {
        let family = self.family(name)?;
        let Series::Histogram { bounds, map } = &family.series else {
            return Err(family.wrong_kind(MetricKind::Histogram));
        };
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(FaultboxError::BadRequest(format!(
                "{name}: observation must be a non-negative finite number, got {seconds}"
            )));
        }
        let key = family.key(label_values)?;
        let hist = map
            .entry(key)
            .or_insert_with(|| AtomicHistogram::new(bounds.len()));
        hist.observe(bounds, seconds);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.families.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Option<MetricKind> {
        self.families.get(name).map(|f| f.kind())
    }

    /// Current value of a counter series; `None` if the series was never touched.
    pub fn counter_value(&self, name: &str, label_values: &[&str]) -> Option<u64> {
        let family = self.family(name).ok()?;
        let Series::Counter(map) = &family.series else {
            return None;
        };
        let key = family.key(label_values).ok()?;
        let value = map.get(&key).map(|c| c.load(Ordering::Relaxed));
        value
    }

    /// Current value of a gauge or cumulative counter series.
    pub fn gauge_value(&self, name: &str, label_values: &[&str]) -> Option<f64> {
        let family = self.family(name).ok()?;
        let (Series::Gauge(map) | Series::Cumulative(map)) = &family.series else {
            return None;
        };
        let key = family.key(label_values).ok()?;
        let value = map.get(&key).map(|g| f64::from_bits(g.load(Ordering::Relaxed)));
        value
    }

    /// Observation count of a histogram series.
    pub fn histogram_count(&self, name: &str, label_values: &[&str]) -> Option<u64> {
        let family = self.family(name).ok()?;
        let Series::Histogram { map, .. } = &family.series else {
            return None;
        };
        let key = family.key(label_values).ok()?;
        let value = map.get(&key).map(|h| h.count.load(Ordering::Relaxed));
        value
    }

    /// Render every family, sorted by name.
    pub fn export(&self) -> String {
        let mut families: Vec<Arc<Family>> =
            self.families.iter().map(|f| Arc::clone(f.value())).collect();
        families.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = String::new();
        for family in families {
            family.render(&mut out);
        }
        out
    }
}
