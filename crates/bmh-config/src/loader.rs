use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;
use crate::raw::RawControllerConfig;

/// Default bound on optimistic-concurrency label/annotation retries (§4.A
/// step 1, §5 "bounded number of times on conflict").
pub const DEFAULT_LABEL_CONFLICT_RETRY_BOUND: u32 = 5;
/// Default Transient Error Arbiter retry window (§4.E).
pub const DEFAULT_ERROR_RETRY_WINDOW_SECS: u64 = 300;
pub const DEFAULT_SHORT_REQUEUE_SECS: u64 = 15;
pub const DEFAULT_MEDIUM_REQUEUE_SECS: u64 = 60;
const DEFAULT_ADMIN_BIND_ADDR: &str = "0.0.0.0:8090";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Identity prefix used when constructing deterministic AllocatedNode
    /// names (spec §3).
    pub plugin_id: String,
    pub error_retry_window_secs: u64,
    pub label_conflict_retry_bound: u32,
    pub short_requeue_secs: u64,
    pub medium_requeue_secs: u64,
    pub admin_bind_addr: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            plugin_id: "clcm".to_string(),
            error_retry_window_secs: DEFAULT_ERROR_RETRY_WINDOW_SECS,
            label_conflict_retry_bound: DEFAULT_LABEL_CONFLICT_RETRY_BOUND,
            short_requeue_secs: DEFAULT_SHORT_REQUEUE_SECS,
            medium_requeue_secs: DEFAULT_MEDIUM_REQUEUE_SECS,
            admin_bind_addr: DEFAULT_ADMIN_BIND_ADDR.to_string(),
        }
    }
}

/// Load and validate the controller's operational config file.
pub fn load(path: &Path) -> Result<ControllerConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: RawControllerConfig = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!(path = %path.display(), "loaded controller config");
    convert(raw, path)
}

fn convert(raw: RawControllerConfig, path: &Path) -> Result<ControllerConfig, ConfigError> {
    let defaults = ControllerConfig::default();
    let cfg = ControllerConfig {
        plugin_id: raw.plugin_id.unwrap_or(defaults.plugin_id),
        error_retry_window_secs: raw.error_retry_window_secs.unwrap_or(defaults.error_retry_window_secs),
        label_conflict_retry_bound: raw
            .label_conflict_retry_bound
            .unwrap_or(defaults.label_conflict_retry_bound),
        short_requeue_secs: raw.short_requeue_secs.unwrap_or(defaults.short_requeue_secs),
        medium_requeue_secs: raw.medium_requeue_secs.unwrap_or(defaults.medium_requeue_secs),
        admin_bind_addr: raw.admin_bind_addr.unwrap_or(defaults.admin_bind_addr),
    };
    validate(&cfg, path)?;
    Ok(cfg)
}

fn validate(cfg: &ControllerConfig, path: &Path) -> Result<(), ConfigError> {
    if cfg.plugin_id.is_empty() {
        return Err(ConfigError::Invalid {
            path: path.display().to_string(),
            message: "plugin_id must not be empty".to_string(),
        });
    }
    if cfg.error_retry_window_secs == 0 {
        return Err(ConfigError::Invalid {
            path: path.display().to_string(),
            message: "error_retry_window_secs must be > 0".to_string(),
        });
    }
    if cfg.label_conflict_retry_bound == 0 {
        return Err(ConfigError::Invalid {
            path: path.display().to_string(),
            message: "label_conflict_retry_bound must be > 0".to_string(),
        });
    }
    Ok(())
}
