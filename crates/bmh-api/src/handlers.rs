use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use bmh_domain::{AllocatedNodeId, NarId};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::ApiError;
use crate::state::AppState;

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn ready(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.list_nars().await?;
    Ok(StatusCode::OK)
}

// ── Reconcile ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReconcileBody {
    pub nar_id: String,
}

pub async fn post_reconcile(
    State(state): State<AppState>,
    Json(body): Json<ReconcileBody>,
) -> Result<Json<Value>, ApiError> {
    let nar_id = NarId::new(body.nar_id);
    let report = bmh_reconciler::reconcile_nar(
        &nar_id,
        state.store.clone(),
        state.operator.clone(),
        &state.profiles,
        &state.config,
        Utc::now(),
    )
    .await?;
    Ok(Json(json!(report)))
}

// ── NARs ──────────────────────────────────────────────────────────────────────

pub async fn list_nars(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let nars = state.store.list_nars().await?;
    Ok(Json(json!(nars)))
}

pub async fn get_nar(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let nar_id = NarId::new(id.clone());
    let record = state
        .store
        .get_nar(&nar_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("node allocation request '{}' not found", id)))?;
    Ok(Json(json!(record)))
}

pub async fn list_nodes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let nar_id = NarId::new(id);
    let nodes = state.store.list_allocated_nodes(&nar_id).await?;
    Ok(Json(json!(nodes)))
}

pub async fn get_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let node_id = AllocatedNodeId::new(id.clone());
    let record = state
        .store
        .get_allocated_node(&node_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("allocated node '{}' not found", id)))?;
    Ok(Json(json!(record)))
}

pub async fn post_deallocate_node(
    State(state): State<AppState>,
    Path((nar_id, node_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let nar_id = NarId::new(nar_id);
    let node_id = AllocatedNodeId::new(node_id);
    let report = bmh_reconciler::reconcile_deallocation(
        &nar_id,
        &node_id,
        state.store.clone(),
        state.operator.clone(),
        &state.config,
        Utc::now(),
    )
    .await?;
    Ok(Json(json!(report)))
}

// ── Events ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub nar_id: Option<String>,
    pub limit: Option<u32>,
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(q): Query<EventsQuery>,
) -> Result<Json<Value>, ApiError> {
    let nar_id = q.nar_id.map(NarId::new);
    let events = state.store.list_events(nar_id.as_ref(), q.limit.unwrap_or(100)).await?;
    Ok(Json(json!(events)))
}

// ── Status ────────────────────────────────────────────────────────────────────

pub async fn status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let nars = state.store.list_nars().await?;

    let mut by_condition: HashMap<String, usize> = HashMap::new();
    let mut errors: Vec<Value> = Vec::new();

    for record in &nars {
        for cond in &record.nar.status.conditions {
            *by_condition.entry(format!("{}={}", cond.type_, cond.reason)).or_default() += 1;
            if cond.status == bmh_domain::ConditionStatus::False {
                errors.push(json!({
                    "nar_id": record.nar.id,
                    "condition": cond.type_.to_string(),
                    "reason": cond.reason.to_string(),
                    "message": cond.message,
                }));
            }
        }
    }

    let last_reconciled_at = nars.iter().map(|r| r.meta.updated_at).max();

    Ok(Json(json!({
        "nar_count": nars.len(),
        "by_condition": by_condition,
        "last_reconciled_at": last_reconciled_at,
        "errors": errors,
        "hardware_profiles": state.profiles.keys().collect::<Vec<_>>(),
    })))
}
