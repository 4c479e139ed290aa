//! Metrics registry behaviour and exposition output.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use faultbox_core::error::ClientCode;
use faultbox_core::metrics::DEFAULT_DURATION_BUCKETS;
use faultbox_core::{FaultboxError, MetricKind, Registry};

/// Sample lines keyed by `name{labels}`, skipping comments.
fn samples(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter(|l| !l.starts_with('#') && !l.is_empty())
        .map(|l| {
            let (series, value) = l.rsplit_once(' ').expect("sample line has a value");
            (series.to_string(), value.to_string())
        })
        .collect()
}

#[test]
fn duplicate_registration_is_rejected() {
    let reg = Registry::new();
    reg.register_counter("app_errors_total", "Total errors", &["type"]).unwrap();
    let err = reg
        .register_counter("app_errors_total", "again", &["type"])
        .expect_err("duplicate");
    assert!(matches!(err, FaultboxError::DuplicateMetric(ref n) if n == "app_errors_total"));
    assert_eq!(err.client_code(), ClientCode::Internal);

    // Kind does not matter for duplicates.
    assert!(reg.register_gauge("app_errors_total", "g", &[]).is_err());
}

#[test]
fn unknown_metrics_are_rejected() {
    let reg = Registry::new();
    assert!(matches!(
        reg.increment("nope_total", &[]),
        Err(FaultboxError::UnknownMetric(_))
    ));
    assert!(matches!(
        reg.observe_duration("nope_seconds", &[], 0.1),
        Err(FaultboxError::UnknownMetric(_))
    ));
}

#[test]
fn wrong_kind_and_label_arity_are_errors() {
    let reg = Registry::new();
    reg.register_counter("c_total", "c", &["a"]).unwrap();
    assert!(reg.observe_duration("c_total", &["x"], 0.1).is_err());
    assert!(matches!(
        reg.increment("c_total", &["x", "y"]),
        Err(FaultboxError::LabelMismatch { expected: 1, got: 2, .. })
    ));
    assert_eq!(reg.kind("c_total"), Some(MetricKind::Counter));
}

#[test]
fn k_increments_export_as_k() {
    let reg = Registry::new();
    reg.register_counter("http_requests_total", "Total HTTP requests", &["method", "status"])
        .unwrap();
    for _ in 0..17 {
        reg.increment("http_requests_total", &["GET", "200"]).unwrap();
    }
    reg.increment("http_requests_total", &["POST", "400"]).unwrap();

    let text = reg.export();
    let s = samples(&text);
    assert_eq!(s[r#"http_requests_total{method="GET",status="200"}"#], "17");
    assert_eq!(s[r#"http_requests_total{method="POST",status="400"}"#], "1");
    assert_eq!(reg.counter_value("http_requests_total", &["GET", "200"]), Some(17));
    assert_eq!(reg.counter_value("http_requests_total", &["PUT", "200"]), None);
}

#[test]
fn concurrent_increments_lose_nothing() {
    const THREADS: u64 = 8;
    const K: u64 = 5_000;

    let reg = Arc::new(Registry::new());
    reg.register_counter("hits_total", "hits", &["type"]).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let reg = Arc::clone(&reg);
            thread::spawn(move || {
                for _ in 0..K {
                    reg.increment("hits_total", &["random"]).unwrap();
                }
            })
        })
        .collect();

    // Export while writers run must not deadlock.
    for _ in 0..10 {
        let _ = reg.export();
    }
    for h in handles {
        h.join().unwrap();
    }

    let s = samples(&reg.export());
    assert_eq!(s[r#"hits_total{type="random"}"#], (THREADS * K).to_string());
}

#[test]
fn histogram_buckets_are_cumulative() {
    let reg = Registry::new();
    reg.register_histogram(
        "http_request_duration_seconds",
        "Duration of HTTP requests in seconds",
        &["method", "route", "code"],
        &DEFAULT_DURATION_BUCKETS,
    )
    .unwrap();

    let labels = ["GET", "/api/test", "200"];
    for v in [0.001, 0.02, 0.02, 0.3, 7.0, 60.0] {
        reg.observe_duration("http_request_duration_seconds", &labels, v).unwrap();
    }

    let s = samples(&reg.export());
    let bucket = |le: &str| {
        s[&format!(
            r#"http_request_duration_seconds_bucket{{method="GET",route="/api/test",code="200",le="{le}"}}"#
        )]
        .parse::<u64>()
        .unwrap()
    };

    assert_eq!(bucket("0.005"), 1);
    assert_eq!(bucket("0.025"), 3);
    assert_eq!(bucket("0.5"), 4);
    assert_eq!(bucket("10"), 5);
    assert_eq!(bucket("+Inf"), 6);

    let mut prev = 0;
    for le in ["0.005", "0.01", "0.025", "0.05", "0.1", "0.25", "0.5", "1", "2.5", "5", "10", "+Inf"] {
        let n = bucket(le);
        assert!(n >= prev, "bucket {le} went backwards");
        prev = n;
    }

    let count_key = r#"http_request_duration_seconds_count{method="GET",route="/api/test",code="200"}"#;
    assert_eq!(s[count_key], "6");
    let sum_key = r#"http_request_duration_seconds_sum{method="GET",route="/api/test",code="200"}"#;
    let sum: f64 = s[sum_key].parse().unwrap();
    assert!((sum - 67.341).abs() < 1e-9);
    assert_eq!(reg.histogram_count("http_request_duration_seconds", &labels), Some(6));
}

#[test]
fn negative_observations_are_rejected() {
    let reg = Registry::new();
    reg.register_histogram("h_seconds", "h", &[], &[0.1, 1.0]).unwrap();
    assert!(reg.observe_duration("h_seconds", &[], -1.0).is_err());
    assert!(reg.observe_duration("h_seconds", &[], f64::NAN).is_err());
    assert_eq!(reg.histogram_count("h_seconds", &[]), None);
}

#[test]
fn gauges_hold_the_last_value() {
    let reg = Registry::new();
    reg.register_gauge("app_error_rate", "Current error rate", &[]).unwrap();
    reg.set_gauge("app_error_rate", &[], 0.25).unwrap();
    reg.set_gauge("app_error_rate", &[], 0.75).unwrap();
    assert_eq!(reg.gauge_value("app_error_rate", &[]), Some(0.75));
    assert!(reg.export().contains("\napp_error_rate 0.75\n"));
}

#[test]
fn cumulative_counters_never_go_backwards() {
    let reg = Registry::new();
    reg.register_cumulative("process_cpu_seconds_total", "cpu", &[]).unwrap();
    assert_eq!(reg.kind("process_cpu_seconds_total"), Some(MetricKind::Counter));

    reg.set_cumulative("process_cpu_seconds_total", &[], 1.5).unwrap();
    reg.set_cumulative("process_cpu_seconds_total", &[], 0.5).unwrap();
    assert_eq!(reg.gauge_value("process_cpu_seconds_total", &[]), Some(1.5));
    reg.set_cumulative("process_cpu_seconds_total", &[], 2.25).unwrap();

    assert!(reg.set_cumulative("process_cpu_seconds_total", &[], -1.0).is_err());
    assert!(reg.set_cumulative("process_cpu_seconds_total", &[], f64::NAN).is_err());
    assert!(reg.increment("process_cpu_seconds_total", &[]).is_err());

    let text = reg.export();
    assert!(text.contains("# TYPE process_cpu_seconds_total counter"));
    assert_eq!(samples(&text)["process_cpu_seconds_total"], "2.25");
}

#[test]
fn export_is_grouped_sorted_and_parseable() {
    let reg = Registry::new();
    reg.register_counter("zz_total", "last", &["k"]).unwrap();
    reg.register_counter("aa_total", "first\nline", &[]).unwrap();
    reg.increment("zz_total", &["b"]).unwrap();
    reg.increment("zz_total", &["a\"quoted"]).unwrap();
    reg.increment("aa_total", &[]).unwrap();

    let text = reg.export();
    let expected = "\
# HELP aa_total first\\nline
# TYPE aa_total counter
aa_total 1
# HELP zz_total last
# TYPE zz_total counter
zz_total{k=\"a\\\"quoted\"} 1
zz_total{k=\"b\"} 1
";
    assert_eq!(text, expected);
    assert_eq!(text, reg.export());

    // Every sample line belongs to the most recent TYPE header.
    let mut current: Option<&str> = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("# TYPE ") {
            current = rest.split(' ').next();
        } else if !line.starts_with('#') {
            let name = line.split(['{', ' ']).next().unwrap();
            assert_eq!(Some(name), current);
        }
    }
}

#[test]
fn registered_but_untouched_family_exports_headers_only() {
    let reg = Registry::new();
    reg.register_counter("app_errors_total", "Total errors", &["type"]).unwrap();
    assert_eq!(
        reg.export(),
        "# HELP app_errors_total Total errors\n# TYPE app_errors_total counter\n"
    );
}
