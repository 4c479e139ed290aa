use std::time::{Duration, SystemTime, UNIX_EPOCH};

use faultbox_core::error::{FailureKind, Result};
use faultbox_core::Registry;

use crate::config::MetricsSection;
use crate::obs::process;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const APP_ERRORS_TOTAL: &str = "app_errors_total";
pub const APP_ERROR_RATE: &str = "app_error_rate";
pub const PROCESS_START_TIME_SECONDS: &str = "process_start_time_seconds";
pub const PROCESS_CPU_SECONDS_TOTAL: &str = "process_cpu_seconds_total";
pub const PROCESS_RESIDENT_MEMORY_BYTES: &str = "process_resident_memory_bytes";
pub const PROCESS_VIRTUAL_MEMORY_BYTES: &str = "process_virtual_memory_bytes";
pub const PROCESS_OPEN_FDS: &str = "process_open_fds";

/// `app_errors_total{type}` value for genuine server faults, as opposed to
/// the simulated `random` / `500` ones.
pub const INTERNAL_ERROR_TYPE: &str = "internal";

/// Typed facade over the registry for the families this service exports.
pub struct AppMetrics {
    registry: Registry,
    request_duration: bool,
}

impl AppMetrics {
    /// Register every family. Fails only on programmer error (duplicate or
    /// malformed names), which callers treat as fatal at startup.
    pub fn new(cfg: &MetricsSection, initial_rate: f64) -> Result<Self> {
        let registry = Registry::new();

        registry.register_counter(
            HTTP_REQUESTS_TOTAL,
            "Total HTTP requests",
            &["method", "status"],
        )?;
        registry.register_counter(APP_ERRORS_TOTAL, "Total errors", &["type"])?;
        registry.register_gauge(APP_ERROR_RATE, "Current injected error rate (0-1)", &[])?;
        registry.register_gauge(
            PROCESS_START_TIME_SECONDS,
            "Start time of the process since unix epoch in seconds.",
            &[],
        )?;
        registry.register_cumulative(
            PROCESS_CPU_SECONDS_TOTAL,
            "Total user and system CPU time spent in seconds.",
            &[],
        )?;
        registry.register_gauge(
            PROCESS_RESIDENT_MEMORY_BYTES,
            "Resident memory size in bytes.",
            &[],
        )?;
        registry.register_gauge(
            PROCESS_VIRTUAL_MEMORY_BYTES,
            "Virtual memory size in bytes.",
            &[],
        )?;
        registry.register_gauge(PROCESS_OPEN_FDS, "Number of open file descriptors.", &[])?;
        if cfg.request_duration {
            registry.register_histogram(
                HTTP_REQUEST_DURATION_SECONDS,
                "Duration of HTTP requests in seconds",
                &["method", "route", "code"],
                &cfg.duration_buckets,
            )?;
        }

        let started = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        registry.set_gauge(PROCESS_START_TIME_SECONDS, &[], started)?;
        registry.set_gauge(APP_ERROR_RATE, &[], initial_rate)?;

        Ok(Self {
            registry,
            request_duration: cfg.request_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Request tap: one call per completed response.
    pub fn record_request(&self, method: &str, route: &str, status: u16, elapsed: Duration) {
        let code = status.to_string();
        if let Err(e) = self.registry.increment(HTTP_REQUESTS_TOTAL, &[method, &code]) {
            tracing::error!(error = %e, "http_requests_total update failed");
        }
        if self.request_duration {
            if let Err(e) = self.registry.observe_duration(
                HTTP_REQUEST_DURATION_SECONDS,
                &[method, route, &code],
                elapsed.as_secs_f64(),
            ) {
                tracing::error!(error = %e, "http_request_duration_seconds update failed");
            }
        }
    }

    pub fn record_failure(&self, kind: FailureKind) {
        self.record_error_type(kind.label());
    }

    pub fn record_internal_error(&self) {
        self.record_error_type(INTERNAL_ERROR_TYPE);
    }

    fn record_error_type(&self, ty: &str) {
        if let Err(e) = self.registry.increment(APP_ERRORS_TOTAL, &[ty]) {
            tracing::error!(error = %e, "app_errors_total update failed");
        }
    }

    pub fn set_error_rate(&self, rate: f64) {
        if let Err(e) = self.registry.set_gauge(APP_ERROR_RATE, &[], rate) {
            tracing::error!(error = %e, "app_error_rate update failed");
        }
    }

    pub fn errors(&self, ty: &str) -> u64 {
        self.registry
            .counter_value(APP_ERRORS_TOTAL, &[ty])
            .unwrap_or(0)
    }

    pub fn requests(&self, method: &str, status: u16) -> u64 {
        self.registry
            .counter_value(HTTP_REQUESTS_TOTAL, &[method, &status.to_string()])
            .unwrap_or(0)
    }

    /// Refresh the process families from procfs. Fields the host cannot
    /// provide keep their previous value.
    pub fn sample_process(&self) {
        let s = process::sample();
        if let Some(cpu) = s.cpu_seconds {
            if let Err(e) = self.registry.set_cumulative(PROCESS_CPU_SECONDS_TOTAL, &[], cpu) {
                tracing::error!(error = %e, "process_cpu_seconds_total update failed");
            }
        }
        let gauges = [
            (PROCESS_RESIDENT_MEMORY_BYTES, s.resident_bytes),
            (PROCESS_VIRTUAL_MEMORY_BYTES, s.virtual_bytes),
            (PROCESS_OPEN_FDS, s.open_fds),
        ];
        for (name, value) in gauges {
            let Some(value) = value else { continue };
            if let Err(e) = self.registry.set_gauge(name, &[], value as f64) {
                tracing::error!(error = %e, metric = name, "process gauge update failed");
            }
        }
    }

    /// Prometheus text exposition of every family, with process usage
    /// sampled just before rendering.
    pub fn render(&self) -> String {
        self.sample_process();
        self.registry.export()
    }
}
