pub mod allocate;
pub mod arbiter;
pub mod deallocate;
pub mod error;
pub mod firmware;
pub mod report;
pub mod rolling;

use std::collections::HashMap;
use std::sync::Arc;

use bmh_config::ControllerConfig;
use bmh_domain::{set_condition, AllocatedNodeId, Condition, ConditionReason, ConditionStatus, ConditionType, HardwareProfile, NarId};
use bmh_operator::HostOperator;
use bmh_store::{AuditEvent, ObjectStore};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

pub use error::ReconcileError;
pub use report::{Change, ReconcileReport};

/// Drive one reconcile cycle for `nar_id`: pre-check, then the Allocator
/// (§4.A) for any node groups still short of target size, then the Rolling
/// Reconfiguration Scheduler (§4.C) for whatever is already allocated.
///
/// A pre-check failure aborts the whole cycle without mutating anything
/// (§8 scenario 2); every other error is surfaced the same way the rest of
/// this plugin does — audited, and if fatal, propagated to the caller.
pub async fn reconcile_nar(
    nar_id: &NarId,
    store: Arc<dyn ObjectStore>,
    operator: Arc<dyn HostOperator>,
    profiles: &HashMap<String, HardwareProfile>,
    config: &ControllerConfig,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, ReconcileError> {
    let run_id = Uuid::new_v4();
    store.append_event(&AuditEvent::NarReconcileStarted { id: run_id, at: now, nar_id: nar_id.clone() }).await?;

    let mut nar_record = store
        .get_nar(nar_id)
        .await?
        .ok_or_else(|| ReconcileError::Internal(format!("nar {nar_id} not found")))?;

    if let Err(e) = allocate::pre_check(&nar_record.nar, &operator).await {
        warn!(nar_id = %nar_id, error = %e, "pre-check failed, aborting reconcile cycle");
        set_condition(
            &mut nar_record.nar.status.conditions,
            Condition::new(ConditionType::Validated, ConditionStatus::False, ConditionReason::Failed, e.to_string(), nar_record.nar.generation, now),
        );
        nar_record.meta.touch(now, bmh_store::compute_desired_hash(&nar_record.nar.spec));
        store.upsert_nar(&nar_record).await?;
        store
            .append_event(&AuditEvent::NarError { id: Uuid::new_v4(), at: now, nar_id: nar_id.clone(), message: e.to_string() })
            .await?;
        return Err(e);
    }

    let mut report = allocate::allocate(&mut nar_record, &store, &operator, profiles, config, now).await?;

    let rolling_report = rolling::advance(&mut nar_record, &store, &operator, profiles, config, now).await?;
    report.changes.extend(rolling_report.changes);
    report.errors.extend(rolling_report.errors);
    report.merge_requeue(rolling_report.requeue);

    store
        .append_event(&AuditEvent::NarReconcileCompleted { id: run_id, at: now, nar_id: nar_id.clone(), changes: report.changes.len() })
        .await?;
    info!(nar_id = %nar_id, changes = report.changes.len(), errors = report.errors.len(), "nar reconcile cycle complete");
    Ok(report)
}

/// Drive one step of the Deallocation Finalizer (§4.F) for a node that has
/// been marked for deletion.
pub async fn reconcile_deallocation(
    nar_id: &NarId,
    node_id: &AllocatedNodeId,
    store: Arc<dyn ObjectStore>,
    operator: Arc<dyn HostOperator>,
    config: &ControllerConfig,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, ReconcileError> {
    let mut record = store
        .get_allocated_node(node_id)
        .await?
        .ok_or_else(|| ReconcileError::Internal(format!("allocated node {node_id} not found")))?;
    deallocate::advance(nar_id, &mut record, &store, &operator, config, now).await
}

// §8 deallocation-with-skip-cleanup is covered end to end by
// `deallocate::tests::skip_cleanup_leaves_online_true_and_image_reference_untouched`;
// nothing here duplicates it.
#[cfg(test)]
mod tests {
    use super::*;
    use bmh_domain::keys::{ALLOCATED_LABEL, ALLOCATED_NODE_LABEL, BMH_ERROR_TIMESTAMP_ANNOTATION, FIRMWARE_UPDATE_NEEDED_ANNOTATION};
    use bmh_domain::{find_condition, ConditionReason, ConditionStatus, HardwareProfile, HostRef, NarSpec, NodeGroup, OperationalStatus, ProvisioningState};
    use bmh_operator::InMemoryOperator;
    use bmh_store::{InMemoryStore, NarRecord};
    use std::collections::HashMap as Map;

    fn dummy_host(host_ref: HostRef, operational_status: OperationalStatus) -> bmh_domain::BareMetalHost {
        bmh_domain::BareMetalHost {
            host_ref,
            provisioning_state: ProvisioningState::Available,
            operational_status,
            error_type: None,
            hardware: None,
            labels: Map::new(),
            annotations: Map::new(),
            online: true,
        }
    }

    fn single_group_nar(size: u32) -> bmh_domain::NodeAllocationRequest {
        let group = NodeGroup {
            name: "workers".into(),
            role: "worker".into(),
            size,
            hardware_profile_ref: "p".into(),
            resource_pool_id: None,
            selector: Map::new(),
        };
        bmh_domain::NodeAllocationRequest::new("nar-1", NarSpec { cluster_id: "c".into(), site_id: None, node_groups: vec![group] })
    }

    fn default_profiles() -> Map<String, HardwareProfile> {
        Map::from([("p".to_string(), HardwareProfile { name: "p".into(), ..Default::default() })])
    }

    // §8 scenario 1: happy-path allocation. A single reconcile cycle can
    // only carry a fresh host through the first leg of the Allocator +
    // Firmware Engine pipeline (the firmware engine always treats a host's
    // first-ever components read as "update required", §4.B Decision) — it
    // reserves the host and starts a config update, not a terminal Configured.
    #[tokio::test]
    async fn happy_allocation_reserves_host_and_starts_config_update() {
        let host_ref = HostRef::new("metal3", "h1");
        let op = InMemoryOperator::new();
        op.seed(dummy_host(host_ref.clone(), OperationalStatus::Ok)).await;
        let operator: Arc<dyn HostOperator> = Arc::new(op.clone());
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());

        let nar = single_group_nar(1);
        let nar_id = nar.id.clone();
        let now = Utc::now();
        store.upsert_nar(&NarRecord::new(nar, now)).await.unwrap();

        let report = reconcile_nar(&nar_id, store.clone(), operator.clone(), &default_profiles(), &ControllerConfig::default(), now)
            .await
            .unwrap();

        assert_eq!(report.changes.len(), 2);
        assert!(matches!(report.changes[0], Change::HostReserved { .. }));
        match &report.changes[1] {
            Change::NodeConfigInProgress { reason, .. } => assert_eq!(*reason, bmh_domain::ConfigInProgressReason::FirmwareUpdate),
            other => panic!("expected NodeConfigInProgress, got {other:?}"),
        }
        assert!(report.requeue.is_requeue());

        let nodes = store.list_allocated_nodes(&nar_id).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node.spec.host, host_ref);
        let cond = find_condition(&nodes[0].node.status.conditions, &ConditionType::Configured).unwrap();
        assert_eq!(cond.status, ConditionStatus::False);
        assert_eq!(cond.reason, ConditionReason::ConfigUpdate);

        let host_after = operator.get_host(&host_ref).await.unwrap().unwrap();
        assert_eq!(host_after.labels.get(ALLOCATED_LABEL).map(String::as_str), Some("true"));
        assert!(host_after.labels.contains_key(ALLOCATED_NODE_LABEL));
        assert_eq!(host_after.annotations.get(FIRMWARE_UPDATE_NEEDED_ANNOTATION).map(String::as_str), Some("true"));
    }

    // §8 scenario 2: a short-capacity group fails the pre-check before the
    // allocation loop ever runs — no AllocatedNode is created.
    #[tokio::test]
    async fn insufficient_capacity_aborts_before_allocating_anything() {
        let operator: Arc<dyn HostOperator> = Arc::new(InMemoryOperator::new());
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());

        let nar = single_group_nar(2);
        let nar_id = nar.id.clone();
        let now = Utc::now();
        store.upsert_nar(&NarRecord::new(nar, now)).await.unwrap();

        let err = reconcile_nar(&nar_id, store.clone(), operator, &default_profiles(), &ControllerConfig::default(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InsufficientCapacity { needed: 2, available: 0, .. }));

        assert!(store.list_allocated_nodes(&nar_id).await.unwrap().is_empty());
        let record = store.get_nar(&nar_id).await.unwrap().unwrap();
        let cond = find_condition(&record.nar.status.conditions, &ConditionType::Validated).unwrap();
        assert_eq!(cond.status, ConditionStatus::False);
        assert_eq!(cond.reason, ConditionReason::Failed);
    }

    // §8 scenario 4: a host observed in `Error` with no stamp yet is
    // transient on its first observation — requeued, not failed, and the
    // rest of the reservation (labels, node record) still proceeds.
    #[tokio::test]
    async fn transient_host_error_requeues_without_failing_reconcile() {
        let host_ref = HostRef::new("metal3", "h1");
        let op = InMemoryOperator::new();
        let mut host = dummy_host(host_ref.clone(), OperationalStatus::Error);
        host.error_type = Some("transient glitch".to_string());
        op.seed(host).await;
        let operator: Arc<dyn HostOperator> = Arc::new(op.clone());
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());

        let nar = single_group_nar(1);
        let nar_id = nar.id.clone();
        let now = Utc::now();
        store.upsert_nar(&NarRecord::new(nar, now)).await.unwrap();

        let report = reconcile_nar(&nar_id, store.clone(), operator.clone(), &default_profiles(), &ControllerConfig::default(), now)
            .await
            .unwrap();

        assert!(report.errors.is_empty());
        assert!(report.requeue.is_requeue());
        assert_eq!(store.list_allocated_nodes(&nar_id).await.unwrap().len(), 1);

        let host_after = operator.get_host(&host_ref).await.unwrap().unwrap();
        assert!(host_after.annotations.contains_key(BMH_ERROR_TIMESTAMP_ANNOTATION));
        assert_eq!(host_after.labels.get(ALLOCATED_LABEL).map(String::as_str), Some("true"));
    }

    // §8 scenario 5: a host whose error stamp is already outside the retry
    // window is persistent — recorded as a per-resource error and a Failed
    // node condition, without failing the whole reconcile cycle.
    #[tokio::test]
    async fn persistent_host_error_is_recorded_without_aborting_reconcile() {
        let host_ref = HostRef::new("metal3", "h1");
        let op = InMemoryOperator::new();
        let mut host = dummy_host(host_ref.clone(), OperationalStatus::Error);
        host.error_type = Some("disk failure".to_string());
        let now = Utc::now();
        host.annotations.insert(BMH_ERROR_TIMESTAMP_ANNOTATION.to_string(), (now - chrono::Duration::seconds(600)).to_rfc3339());
        op.seed(host).await;
        let operator: Arc<dyn HostOperator> = Arc::new(op.clone());
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());

        let nar = single_group_nar(1);
        let nar_id = nar.id.clone();
        store.upsert_nar(&NarRecord::new(nar, now)).await.unwrap();

        let report = reconcile_nar(&nar_id, store.clone(), operator.clone(), &default_profiles(), &ControllerConfig::default(), now)
            .await
            .unwrap();

        assert!(report.changes.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("disk failure"));
        assert!(report.requeue.is_requeue());

        let nodes = store.list_allocated_nodes(&nar_id).await.unwrap();
        assert_eq!(nodes.len(), 1);
        let cond = find_condition(&nodes[0].node.status.conditions, &ConditionType::Configured).unwrap();
        assert_eq!(cond.status, ConditionStatus::False);
        assert_eq!(cond.reason, ConditionReason::Failed);

        let host_after = operator.get_host(&host_ref).await.unwrap().unwrap();
        assert!(!host_after.annotations.contains_key(BMH_ERROR_TIMESTAMP_ANNOTATION));
    }
}
