use std::net::SocketAddr;

use serde::Deserialize;
use faultbox_core::error::{FaultboxError, Result};
use faultbox_core::fault::validate_rate;
use faultbox_core::metrics::DEFAULT_DURATION_BUCKETS;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub faults: FaultSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            faults: FaultSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(FaultboxError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.faults.validate()?;
        self.metrics.validate()?;

        Ok(())
    }

    /// Apply `APP_ENV` (falling back to `NODE_ENV`), `PORT`, `APP_VERSION`
    /// and `FAULTBOX_SEED` overrides.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = lookup("APP_ENV")
            .filter(|v| !v.is_empty())
            .or_else(|| lookup("NODE_ENV").filter(|v| !v.is_empty()));
        if let Some(env) = env {
            self.server.environment = env;
        }
        if let Some(version) = lookup("APP_VERSION").filter(|v| !v.is_empty()) {
            self.server.version = version;
        }
        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            let port: u16 = port
                .parse()
                .map_err(|_| FaultboxError::BadRequest(format!("PORT must be a u16, got {port:?}")))?;
            let mut addr = self.server.listen_addr()?;
            addr.set_port(port);
            self.server.listen = addr.to_string();
        }
        if let Some(seed) = lookup("FAULTBOX_SEED").filter(|v| !v.is_empty()) {
            let seed: u64 = seed.parse().map_err(|_| {
                FaultboxError::BadRequest(format!("FAULTBOX_SEED must be a u64, got {seed:?}"))
            })?;
            self.faults.seed = Some(seed);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            environment: default_environment(),
            version: default_version(),
            service_name: default_service_name(),
        }
    }
}

impl ServerSection {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            FaultboxError::BadRequest(format!(
                "server.listen must be a valid SocketAddr, got {:?}",
                self.listen
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if self.environment.trim().is_empty() {
            return Err(FaultboxError::BadRequest("server.environment must not be empty".into()));
        }
        if self.version.trim().is_empty() {
            return Err(FaultboxError::BadRequest("server.version must not be empty".into()));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_environment() -> String {
    "development".into()
}
fn default_version() -> String {
    "1.0.0".into()
}
fn default_service_name() -> String {
    "Demo Backend".into()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaultSection {
    #[serde(default)]
    pub initial_rate: f64,

    /// Fixed seed for reproducible fault trials.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl FaultSection {
    pub fn validate(&self) -> Result<()> {
        validate_rate(self.initial_rate).map_err(|e| {
            FaultboxError::BadRequest(format!("faults.initial_rate: {e}"))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_true")]
    pub request_duration: bool,

    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            request_duration: true,
            duration_buckets: default_duration_buckets(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if self.duration_buckets.is_empty() {
            return Err(FaultboxError::BadRequest(
                "metrics.duration_buckets must not be empty".into(),
            ));
        }
        if self.duration_buckets.iter().any(|b| !b.is_finite() || *b <= 0.0) {
            return Err(FaultboxError::BadRequest(
                "metrics.duration_buckets must be positive finite numbers".into(),
            ));
        }
        if self.duration_buckets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FaultboxError::BadRequest(
                "metrics.duration_buckets must be strictly ascending".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_duration_buckets() -> Vec<f64> {
    DEFAULT_DURATION_BUCKETS.to_vec()
}
