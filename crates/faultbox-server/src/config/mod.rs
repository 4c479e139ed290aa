//! Server config loader (strict parsing).

pub mod schema;

use std::fs;
use std::io::ErrorKind;

use faultbox_core::error::{FaultboxError, Result};

pub use schema::{FaultSection, MetricsSection, ServerConfig, ServerSection};

/// Config file path when `FAULTBOX_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "faultbox.yaml";

pub fn load_from_file(path: &str) -> Result<ServerConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| FaultboxError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServerConfig> {
    let cfg: ServerConfig = serde_yaml::from_str(s)
        .map_err(|e| FaultboxError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve the process config: file (defaults if absent), then environment
/// overrides, then validation.
pub fn load<F>(lookup: F) -> Result<ServerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path = lookup("FAULTBOX_CONFIG").unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut cfg = match fs::read_to_string(&path) {
        Ok(s) => {
            tracing::info!(%path, "loading config");
            serde_yaml::from_str::<ServerConfig>(&s)
                .map_err(|e| FaultboxError::BadRequest(format!("invalid yaml: {e}")))?
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(%path, "config file not found, using defaults");
            ServerConfig::default()
        }
        Err(e) => {
            return Err(FaultboxError::Internal(format!("read config failed ({path}): {e}")));
        }
    };

    cfg.apply_env(lookup)?;
    cfg.validate()?;
    Ok(cfg)
}
