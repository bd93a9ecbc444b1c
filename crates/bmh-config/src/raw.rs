use serde::{Deserialize, Serialize};

/// Wire format for the controller's operational config file. Every field is
/// optional so a near-empty file is valid; `loader::load` fills in the
/// documented defaults and validates the result.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RawControllerConfig {
    pub plugin_id: Option<String>,
    pub error_retry_window_secs: Option<u64>,
    pub label_conflict_retry_bound: Option<u32>,
    pub short_requeue_secs: Option<u64>,
    pub medium_requeue_secs: Option<u64>,
    pub admin_bind_addr: Option<String>,
}
