use std::collections::HashMap;
use std::sync::Arc;

use bmh_config::ControllerConfig;
use bmh_domain::HardwareProfile;
use bmh_operator::HostOperator;
use bmh_store::ObjectStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub operator: Arc<dyn HostOperator>,
    pub profiles: Arc<HashMap<String, HardwareProfile>>,
    pub config: Arc<ControllerConfig>,
    pub auth_token: Arc<String>,
}
