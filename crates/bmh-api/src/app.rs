use std::collections::HashMap;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use bmh_config::ControllerConfig;
use bmh_domain::HardwareProfile;
use bmh_operator::HostOperator;
use bmh_store::ObjectStore;
use tower_http::trace::TraceLayer;

use crate::auth::require_bearer_token;
use crate::handlers;
use crate::state::AppState;

pub fn build_app(
    store: Arc<dyn ObjectStore>,
    operator: Arc<dyn HostOperator>,
    profiles: HashMap<String, HardwareProfile>,
    config: ControllerConfig,
    auth_token: Arc<String>,
) -> Router {
    let state = AppState {
        store,
        operator,
        profiles: Arc::new(profiles),
        config: Arc::new(config),
        auth_token,
    };

    Router::new()
        // Health
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        // Reconcile
        .route("/reconcile", post(handlers::post_reconcile))
        // NARs
        .route("/nars", get(handlers::list_nars))
        .route("/nars/:id", get(handlers::get_nar))
        .route("/nars/:id/nodes", get(handlers::list_nodes))
        // Allocated nodes
        .route("/nodes/:id", get(handlers::get_node))
        .route("/nars/:id/nodes/:node_id/deallocate", post(handlers::post_deallocate_node))
        // Events
        .route("/events", get(handlers::list_events))
        // Status
        .route("/status", get(handlers::status))
        // Auth middleware applies to all routes above
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
