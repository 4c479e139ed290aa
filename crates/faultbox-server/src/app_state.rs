//! Shared application state for the faultbox server.
//!
//! Owns the one fault controller and the one metrics registry of the
//! process. Handlers receive it through axum `State` and never reach for
//! globals.

use std::sync::Arc;

use faultbox_core::error::{FaultboxError, Result};
use faultbox_core::{FaultController, RateSnapshot};

use crate::config::ServerConfig;
use crate::obs::metrics::AppMetrics;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ServerConfig,
    hostname: String,
    faults: FaultController,
    metrics: AppMetrics,
}

impl AppState {
    /// Build application state.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: ServerConfig) -> Result<Self> {
        Self::with_hostname(cfg, resolve_hostname())
    }

    /// Same as [`AppState::new`] with a fixed hostname.
    pub fn with_hostname(cfg: ServerConfig, hostname: String) -> Result<Self> {
        let faults = match cfg.faults.seed {
            Some(seed) => FaultController::seeded(seed),
            None => FaultController::new(),
        }
        .with_rate(cfg.faults.initial_rate)
        .map_err(|e| FaultboxError::BadRequest(format!("faults.initial_rate: {e}")))?;

        let metrics = AppMetrics::new(&cfg.metrics, faults.get_rate())?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                hostname,
                faults,
                metrics,
            }),
        })
    }

    pub fn cfg(&self) -> &ServerConfig {
        &self.inner.cfg
    }

    pub fn environment(&self) -> &str {
        &self.inner.cfg.server.environment
    }

    pub fn version(&self) -> &str {
        &self.inner.cfg.server.version
    }

    pub fn hostname(&self) -> &str {
        &self.inner.hostname
    }

    pub fn faults(&self) -> &FaultController {
        &self.inner.faults
    }

    pub fn metrics(&self) -> &AppMetrics {
        &self.inner.metrics
    }

    /// Set the error rate and mirror it into the `app_error_rate` gauge.
    pub fn set_error_rate(&self, rate: f64) -> Result<RateSnapshot> {
        let snap = self.inner.faults.set_rate(rate)?;
        self.inner.metrics.set_error_rate(snap.error_rate);
        Ok(snap)
    }
}

/// `$HOSTNAME`, else the kernel hostname, else `"unknown"`.
fn resolve_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| {
            std::fs::read_to_string("/proc/sys/kernel/hostname")
                .or_else(|_| std::fs::read_to_string("/etc/hostname"))
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
