use std::sync::Arc;

use bmh_domain::keys::{
    ALLOCATED_LABEL, ALLOCATED_NODE_LABEL, AUTOMATED_CLEANING_MODE_ANNOTATION, BIOS_UPDATE_NEEDED_ANNOTATION,
    BMH_ERROR_TIMESTAMP_ANNOTATION, CUSTOM_DEPLOY_ANNOTATION, DEALLOCATION_COMPLETE_ANNOTATION,
    FIRMWARE_UPDATE_NEEDED_ANNOTATION, IMAGE_REFERENCE_ANNOTATION, INFRA_ENV_LABEL, OWNED_BY_LABEL,
    SKIP_CLEANUP_ANNOTATION,
};
use bmh_domain::{NarId, ProvisioningState, RequeueHint};
use bmh_config::ControllerConfig;
use bmh_operator::{HostOperator, PatchOp};
use bmh_store::{AllocatedNodeRecord, AuditEvent, ObjectStore};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ReconcileError;
use crate::report::{Change, ReconcileReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Finalizer removed; the caller may let the delete proceed.
    Done,
    Requeue(RequeueHint),
}

/// Drive the Deallocation Finalizer (§4.F) one step. Called repeatedly while
/// the AllocatedNode carries a deletion timestamp and
/// `has_ownership_finalizer` is still set.
pub async fn finalize(
    nar_id: &NarId,
    record: &mut AllocatedNodeRecord,
    store: &Arc<dyn ObjectStore>,
    operator: &Arc<dyn HostOperator>,
    config: &ControllerConfig,
    now: DateTime<Utc>,
) -> Result<FinalizeOutcome, ReconcileError> {
    let host_ref = record.node.spec.host.clone();
    let Some(host) = operator.get_host(&host_ref).await? else {
        // Host already gone — nothing left to clean up externally.
        return remove_finalizer(nar_id, record, store, &host_ref, now).await;
    };

    let skip_cleanup = host.annotations.contains_key(SKIP_CLEANUP_ANNOTATION);

    // Step 1 — infra-env label, host and image record.
    operator.apply_patch(&host_ref, &[PatchOp::remove_label(INFRA_ENV_LABEL)], config.label_conflict_retry_bound).await?;
    operator.remove_image_label(&host_ref, INFRA_ENV_LABEL).await?;

    // Step 2 — host patch.
    let mut ops = vec![
        PatchOp::remove_label(ALLOCATED_LABEL),
        PatchOp::remove_label(OWNED_BY_LABEL),
        PatchOp::remove_label(ALLOCATED_NODE_LABEL),
        PatchOp::remove_annotation(BIOS_UPDATE_NEEDED_ANNOTATION),
        PatchOp::remove_annotation(FIRMWARE_UPDATE_NEEDED_ANNOTATION),
    ];
    if !skip_cleanup {
        ops.push(PatchOp::remove_annotation(CUSTOM_DEPLOY_ANNOTATION));
        ops.push(PatchOp::remove_annotation(IMAGE_REFERENCE_ANNOTATION));
        if host.provisioning_state == ProvisioningState::Provisioned {
            ops.push(PatchOp::add_annotation(AUTOMATED_CLEANING_MODE_ANNOTATION, "metadata"));
        }
    }
    ops.push(PatchOp::add_annotation(DEALLOCATION_COMPLETE_ANNOTATION, "true"));
    operator.apply_patch(&host_ref, &ops, config.label_conflict_retry_bound).await?;
    if !skip_cleanup {
        operator.clear_preprovisioning_network_data(&host_ref).await?;
    }

    // Steps 3 and 4 only apply to the wipe/power-off cycle that step 2 just
    // kicked off — with skip-cleanup set, that cycle never starts, so there
    // is nothing to wait for and online is left exactly as the external
    // operator had it (§8 scenario 6).
    if !skip_cleanup {
        let provisioning_was_in_progress = record.node.config_in_progress.is_some();
        if provisioning_was_in_progress {
            let Some(fresh) = operator.get_host(&host_ref).await? else {
                return remove_finalizer(nar_id, record, store, &host_ref, now).await;
            };
            if fresh.provisioning_state != ProvisioningState::Available {
                return Ok(FinalizeOutcome::Requeue(RequeueHint::Short));
            }
        }

        let Some(fresh) = operator.get_host(&host_ref).await? else {
            return remove_finalizer(nar_id, record, store, &host_ref, now).await;
        };
        if fresh.online {
            operator.set_online(&host_ref, false).await?;
        }
    }

    // Step 5 — clear the bookkeeping annotations this finalizer itself set.
    operator
        .apply_patch(
            &host_ref,
            &[PatchOp::remove_annotation(DEALLOCATION_COMPLETE_ANNOTATION), PatchOp::remove_annotation(BMH_ERROR_TIMESTAMP_ANNOTATION)],
            config.label_conflict_retry_bound,
        )
        .await?;

    // Step 6 — remove the ownership finalizer.
    remove_finalizer(nar_id, record, store, &host_ref, now).await
}

async fn remove_finalizer(
    nar_id: &NarId,
    record: &mut AllocatedNodeRecord,
    store: &Arc<dyn ObjectStore>,
    _host_ref: &bmh_domain::HostRef,
    now: DateTime<Utc>,
) -> Result<FinalizeOutcome, ReconcileError> {
    record.node.has_ownership_finalizer = false;
    record.node.config_in_progress = None;
    store.delete_allocated_node(&record.node.id).await?;
    store
        .append_event(&AuditEvent::NodeDeallocated { id: Uuid::new_v4(), at: now, nar_id: nar_id.clone(), node_id: record.node.id.clone() })
        .await?;
    Ok(FinalizeOutcome::Done)
}

/// Run [`finalize`] and fold its outcome into a [`ReconcileReport`]. Kept
/// separate so `lib.rs` can treat deallocation the same way it treats the
/// other reconcile entry points.
pub async fn advance(
    nar_id: &NarId,
    record: &mut AllocatedNodeRecord,
    store: &Arc<dyn ObjectStore>,
    operator: &Arc<dyn HostOperator>,
    config: &ControllerConfig,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, ReconcileError> {
    let mut report = ReconcileReport::new();
    let node_id = record.node.id.clone();
    match finalize(nar_id, record, store, operator, config, now).await? {
        FinalizeOutcome::Done => {
            report.changes.push(Change::NodeDeallocated { node_id });
        }
        FinalizeOutcome::Requeue(hint) => {
            report.merge_requeue(hint);
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmh_domain::{AllocatedNode, AllocatedNodeId, AllocatedNodeSpec, HostRef, OperationalStatus};
    use bmh_operator::InMemoryOperator;
    use bmh_store::InMemoryStore;

    fn host(ref_: HostRef, provisioning: ProvisioningState, online: bool) -> bmh_domain::BareMetalHost {
        bmh_domain::BareMetalHost {
            host_ref: ref_,
            provisioning_state: provisioning,
            operational_status: OperationalStatus::Ok,
            error_type: None,
            hardware: None,
            labels: std::collections::HashMap::from([(ALLOCATED_LABEL.to_string(), "true".to_string())]),
            annotations: std::collections::HashMap::new(),
            online,
        }
    }

    #[tokio::test]
    async fn skip_cleanup_leaves_online_true_and_image_reference_untouched() {
        let operator = Arc::new(InMemoryOperator::new());
        let host_ref = HostRef::new("metal3", "h1");
        let mut h = host(host_ref.clone(), ProvisioningState::Available, true);
        h.annotations.insert(SKIP_CLEANUP_ANNOTATION.to_string(), "true".to_string());
        h.annotations.insert(IMAGE_REFERENCE_ANNOTATION.to_string(), "quay.io/image:tag".to_string());
        operator.seed(h).await;

        let nar_id = NarId::new("nar-1");
        let node = AllocatedNode::new(
            AllocatedNodeId::new("node-1"),
            AllocatedNodeSpec { nar_id: nar_id.clone(), node_group_name: "masters".into(), host: host_ref.clone(), hw_profile_ref: "p".into() },
        );
        let now = DateTime::<Utc>::UNIX_EPOCH;
        let mut record = AllocatedNodeRecord::new(node, now);
        let operator_dyn: Arc<dyn HostOperator> = operator.clone();
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());
        let config = ControllerConfig::default();

        let outcome = finalize(&nar_id, &mut record, &store, &operator_dyn, &config, now).await.unwrap();
        assert_eq!(outcome, FinalizeOutcome::Done);

        let fresh = operator.get_host(&host_ref).await.unwrap().unwrap();
        assert!(fresh.online, "online must stay true when skip-cleanup is set");
        assert_eq!(
            fresh.annotations.get(IMAGE_REFERENCE_ANNOTATION).map(String::as_str),
            Some("quay.io/image:tag"),
            "image reference must not be reset"
        );
        assert!(!fresh.labels.contains_key(ALLOCATED_LABEL));
        assert!(!record.node.has_ownership_finalizer);
    }

    #[tokio::test]
    async fn without_skip_cleanup_provisioned_host_gets_metadata_clean_and_goes_offline() {
        let operator = Arc::new(InMemoryOperator::new());
        let host_ref = HostRef::new("metal3", "h2");
        let h = host(host_ref.clone(), ProvisioningState::Provisioned, true);
        operator.seed(h).await;

        let nar_id = NarId::new("nar-1");
        let node = AllocatedNode::new(
            AllocatedNodeId::new("node-2"),
            AllocatedNodeSpec { nar_id: nar_id.clone(), node_group_name: "workers".into(), host: host_ref.clone(), hw_profile_ref: "p".into() },
        );
        let now = DateTime::<Utc>::UNIX_EPOCH;
        let mut record = AllocatedNodeRecord::new(node, now);
        let operator_dyn: Arc<dyn HostOperator> = operator.clone();
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());
        let config = ControllerConfig::default();

        let outcome = finalize(&nar_id, &mut record, &store, &operator_dyn, &config, now).await.unwrap();
        assert_eq!(outcome, FinalizeOutcome::Done);

        let fresh = operator.get_host(&host_ref).await.unwrap().unwrap();
        assert!(!fresh.online, "online must be cleared without skip-cleanup");
        assert!(!fresh.annotations.contains_key(DEALLOCATION_COMPLETE_ANNOTATION));
    }
}
