use std::collections::HashMap;
use std::sync::Arc;

use bmh_config::ControllerConfig;
use bmh_domain::keys::{BIOS_UPDATE_NEEDED_ANNOTATION, FIRMWARE_UPDATE_NEEDED_ANNOTATION};
use bmh_domain::{
    find_condition, set_condition, AllocatedNodeId, Condition, ConditionReason, ConditionStatus, ConditionType,
    ConfigInProgressReason, HardwareProfile, NodeAllocationRequest, NodeGroup, RequeueHint,
};
use bmh_operator::HostOperator;
use bmh_store::{AllocatedNodeRecord, AuditEvent, NarRecord, ObjectStore};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ReconcileError;
use crate::firmware::{self, FirmwareOutcome};
use crate::report::{Change, ReconcileReport};

/// Stable node ordering for the scheduler (§4.C step 2): NodeGroups with
/// role `master` (case-insensitive) sorted first, groups otherwise in
/// declared order, nodes within a group by id. The backing store doesn't
/// retain true insertion order, so node id stands in for it — arbitrary
/// but stable, matching the spec's determinism requirement rather than any
/// literal insertion sequence.
fn ordered_node_ids(nar: &NodeAllocationRequest, records: &[AllocatedNodeRecord]) -> Vec<AllocatedNodeId> {
    let mut groups: Vec<&NodeGroup> = nar.spec.node_groups.iter().collect();
    groups.sort_by_key(|g| !g.is_master());
    let mut ids = Vec::new();
    for group in groups {
        let mut group_ids: Vec<AllocatedNodeId> =
            records.iter().filter(|r| r.node.spec.node_group_name == group.name).map(|r| r.node.id.clone()).collect();
        group_ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids.extend(group_ids);
    }
    ids
}

fn find_record<'a>(records: &'a mut [AllocatedNodeRecord], id: &AllocatedNodeId) -> &'a mut AllocatedNodeRecord {
    records.iter_mut().find(|r| &r.node.id == id).expect("ordered id always has a backing record")
}

fn group_for<'a>(nar: &'a NodeAllocationRequest, group_name: &str) -> Option<&'a NodeGroup> {
    nar.spec.node_groups.iter().find(|g| g.name == group_name)
}

/// Drive one cycle of the rolling reconfiguration scheduler over `nar_record`'s
/// child AllocatedNodes (§4.C). At most one node is touched per call.
pub async fn advance(
    nar_record: &mut NarRecord,
    store: &Arc<dyn ObjectStore>,
    operator: &Arc<dyn HostOperator>,
    profiles: &HashMap<String, HardwareProfile>,
    config: &ControllerConfig,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, ReconcileError> {
    let mut report = ReconcileReport::new();
    let nar_id = nar_record.nar.id.clone();
    let mut records = store.list_allocated_nodes(&nar_id).await?;
    let ordered = ordered_node_ids(&nar_record.nar, &records);

    // Step 1 — in-progress drain.
    let draining = ordered.iter().find(|id| find_record(&mut records, id).node.config_in_progress.is_some()).cloned();
    if let Some(id) = draining {
        let record = find_record(&mut records, &id);
        let profile = profiles.get(&record.node.spec.hw_profile_ref).cloned().ok_or_else(|| {
            ReconcileError::InvalidInput(format!("no hardware profile registered for ref '{}'", record.node.spec.hw_profile_ref))
        })?;
        drain_one(&nar_id, record, &profile, store, operator, config, now, &mut report).await?;
        return Ok(report);
    }

    // Step 2 — select next for promotion.
    let promote_id = ordered
        .iter()
        .find(|id| {
            let record = find_record(&mut records, id);
            let Some(group) = group_for(&nar_record.nar, &record.node.spec.node_group_name) else { return false };
            let profile_mismatch = record.node.spec.hw_profile_ref != group.hardware_profile_ref;
            let needs_configured = match find_condition(&record.node.status.conditions, &ConditionType::Configured) {
                None => true,
                Some(c) => c.reason == ConditionReason::InvalidInput,
            };
            profile_mismatch || needs_configured
        })
        .cloned();

    if let Some(id) = promote_id {
        let group_name = find_record(&mut records, &id).node.spec.node_group_name.clone();
        let group = group_for(&nar_record.nar, &group_name)
            .ok_or_else(|| ReconcileError::Internal(format!("node {id} references unknown group '{group_name}'")))?
            .clone();
        let profile = profiles
            .get(&group.hardware_profile_ref)
            .cloned()
            .ok_or_else(|| ReconcileError::InvalidInput(format!("no hardware profile registered for ref '{}'", group.hardware_profile_ref)))?;

        let record = find_record(&mut records, &id);
        record.node.spec.hw_profile_ref = group.hardware_profile_ref.clone();
        let host_ref = record.node.spec.host.clone();

        match firmware::advance(&host_ref, &profile, &mut record.node, true, operator, config, now).await {
            Ok(_) => {}
            Err(ReconcileError::PersistentHost { message }) => {
                store.upsert_allocated_node(record).await?;
                store
                    .append_event(&AuditEvent::NodeError { id: Uuid::new_v4(), at: now, nar_id: nar_id.clone(), node_id: id.clone(), message: message.clone() })
                    .await?;
                report.changes.push(Change::NodeFailed { node_id: id.clone(), message: message.clone() });
                return Err(ReconcileError::PersistentHost { message });
            }
            Err(e) => return Err(e),
        }

        set_condition(
            &mut record.node.status.conditions,
            Condition::new(ConditionType::Configured, ConditionStatus::False, ConditionReason::ConfigUpdate, "Update Requested", 0, now),
        );
        store.upsert_allocated_node(record).await?;
        let reason = record.node.config_in_progress.unwrap_or(ConfigInProgressReason::FirmwareUpdate);
        store
            .append_event(&AuditEvent::NodeConfigInProgress { id: Uuid::new_v4(), at: now, nar_id: nar_id.clone(), node_id: id.clone(), reason })
            .await?;
        report.changes.push(Change::NodeConfigInProgress { node_id: id, reason });
        report.merge_requeue(RequeueHint::Medium);
        return Ok(report);
    }

    // Step 3 — transition sweep.
    for id in &ordered {
        let record = find_record(&mut records, id);
        let host_ref = record.node.spec.host.clone();
        let Some(host) = operator.get_host(&host_ref).await? else { continue };
        let awaiting_gating =
            host.annotations.contains_key(BIOS_UPDATE_NEEDED_ANNOTATION) || host.annotations.contains_key(FIRMWARE_UPDATE_NEEDED_ANNOTATION);
        if !awaiting_gating {
            continue;
        }
        let profile = profiles.get(&record.node.spec.hw_profile_ref).cloned().ok_or_else(|| {
            ReconcileError::InvalidInput(format!("no hardware profile registered for ref '{}'", record.node.spec.hw_profile_ref))
        })?;
        drain_one(&nar_id, record, &profile, store, operator, config, now, &mut report).await?;
        return Ok(report);
    }

    // All three steps found nothing: fully configured.
    set_condition(
        &mut nar_record.nar.status.conditions,
        Condition::new(ConditionType::Configured, ConditionStatus::True, ConditionReason::ConfigApplied, "", 0, now),
    );
    nar_record.meta.touch(now, bmh_store::compute_desired_hash(&nar_record.nar.spec));
    store.upsert_nar(nar_record).await?;
    Ok(report)
}

async fn drain_one(
    nar_id: &bmh_domain::NarId,
    record: &mut AllocatedNodeRecord,
    profile: &HardwareProfile,
    store: &Arc<dyn ObjectStore>,
    operator: &Arc<dyn HostOperator>,
    config: &ControllerConfig,
    now: DateTime<Utc>,
    report: &mut ReconcileReport,
) -> Result<(), ReconcileError> {
    let host_ref = record.node.spec.host.clone();
    match firmware::advance(&host_ref, profile, &mut record.node, true, operator, config, now).await {
        Ok(FirmwareOutcome::Done) => {
            report.changes.push(Change::NodeConfigured { node_id: record.node.id.clone() });
            store.upsert_allocated_node(record).await?;
            Ok(())
        }
        Ok(FirmwareOutcome::Requeue(hint)) => {
            report.merge_requeue(hint);
            store.upsert_allocated_node(record).await?;
            Ok(())
        }
        Err(ReconcileError::PersistentHost { message }) => {
            store.upsert_allocated_node(record).await?;
            store
                .append_event(&AuditEvent::NodeError { id: Uuid::new_v4(), at: now, nar_id: nar_id.clone(), node_id: record.node.id.clone(), message: message.clone() })
                .await?;
            report.changes.push(Change::NodeFailed { node_id: record.node.id.clone(), message: message.clone() });
            Err(ReconcileError::PersistentHost { message })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmh_domain::NodeGroup;
    use bmh_operator::InMemoryOperator;
    use bmh_store::InMemoryStore;
    use std::collections::HashMap as Map;

    fn group(name: &str, role: &str) -> NodeGroup {
        NodeGroup { name: name.to_string(), role: role.to_string(), size: 1, hardware_profile_ref: "p".into(), resource_pool_id: None, selector: Map::new() }
    }

    fn nar(groups: Vec<NodeGroup>) -> NodeAllocationRequest {
        NodeAllocationRequest::new("nar-1", bmh_domain::NarSpec { cluster_id: "c".into(), site_id: None, node_groups: groups })
    }

    #[test]
    fn master_groups_sort_before_others_stably() {
        let n = nar(vec![group("workers", "worker"), group("masters", "Master"), group("infra", "worker")]);
        let mut groups: Vec<&NodeGroup> = n.spec.node_groups.iter().collect();
        groups.sort_by_key(|g| !g.is_master());
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["masters", "workers", "infra"]);
    }

    fn configured_node(id: &str, host_ref: bmh_domain::HostRef, now: DateTime<Utc>) -> AllocatedNodeRecord {
        let spec = bmh_domain::AllocatedNodeSpec {
            nar_id: bmh_domain::NarId::new("nar-1"),
            node_group_name: "masters".to_string(),
            host: host_ref,
            hw_profile_ref: "v1".to_string(),
        };
        let mut node = bmh_domain::AllocatedNode::new(AllocatedNodeId::new(id), spec);
        set_condition(
            &mut node.status.conditions,
            Condition::new(ConditionType::Configured, ConditionStatus::True, ConditionReason::ConfigApplied, "", 0, now),
        );
        AllocatedNodeRecord::new(node, now)
    }

    // §8 scenario 3: a 3-master rolling upgrade touches exactly one node per
    // call, leaving the other two untouched until the next cycle.
    #[tokio::test]
    async fn promotion_touches_one_mismatched_master_per_call() {
        let now = Utc::now();
        let group_v2 = NodeGroup {
            name: "masters".into(),
            role: "Master".into(),
            size: 3,
            hardware_profile_ref: "v2".into(),
            resource_pool_id: None,
            selector: Map::new(),
        };
        let n = NodeAllocationRequest::new("nar-1", bmh_domain::NarSpec { cluster_id: "c".into(), site_id: None, node_groups: vec![group_v2] });
        let mut nar_record = NarRecord::new(n, now);

        let op = InMemoryOperator::new();
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());
        for name in ["m-a", "m-b", "m-c"] {
            let host_ref = bmh_domain::HostRef::new("metal3", name);
            op.seed(bmh_domain::BareMetalHost {
                host_ref: host_ref.clone(),
                provisioning_state: bmh_domain::ProvisioningState::Available,
                operational_status: bmh_domain::OperationalStatus::Ok,
                error_type: None,
                hardware: None,
                labels: Map::new(),
                annotations: Map::new(),
                online: true,
            })
            .await;
            store.upsert_allocated_node(&configured_node(name, host_ref, now)).await.unwrap();
        }
        let operator: Arc<dyn HostOperator> = Arc::new(op);

        let profiles: HashMap<String, HardwareProfile> =
            HashMap::from([("v2".to_string(), HardwareProfile { name: "v2".into(), ..Default::default() })]);
        let config = ControllerConfig::default();

        let report = advance(&mut nar_record, &store, &operator, &profiles, &config, now).await.unwrap();

        assert_eq!(report.changes.len(), 1);
        let promoted_id = match &report.changes[0] {
            Change::NodeConfigInProgress { node_id, .. } => node_id.clone(),
            other => panic!("expected NodeConfigInProgress, got {other:?}"),
        };
        assert_eq!(promoted_id.as_str(), "m-a");

        let promoted = store.get_allocated_node(&promoted_id).await.unwrap().unwrap();
        assert_eq!(promoted.node.spec.hw_profile_ref, "v2");
        let cond = find_condition(&promoted.node.status.conditions, &ConditionType::Configured).unwrap();
        assert_eq!(cond.status, ConditionStatus::False);
        assert_eq!(cond.reason, ConditionReason::ConfigUpdate);

        for name in ["m-b", "m-c"] {
            let untouched = store.get_allocated_node(&AllocatedNodeId::new(name)).await.unwrap().unwrap();
            assert_eq!(untouched.node.spec.hw_profile_ref, "v1");
            let cond = find_condition(&untouched.node.status.conditions, &ConditionType::Configured).unwrap();
            assert_eq!(cond.status, ConditionStatus::True);
        }
    }

    // A host that finished a prior firmware cycle still carries the
    // bios/firmware-update-needed and reboot annotations until `advance`
    // clears them on its `Done` path. Step 3's transition sweep must not
    // treat that residue as perpetually `awaiting_gating` — otherwise the
    // NAR can never reach the "all three steps found nothing" terminal
    // branch, even though the node itself already matches its profile.
    #[tokio::test]
    async fn residual_update_annotations_from_a_prior_cycle_do_not_block_convergence() {
        let now = Utc::now();
        let group_v2 = NodeGroup {
            name: "masters".into(),
            role: "Master".into(),
            size: 1,
            hardware_profile_ref: "v2".into(),
            resource_pool_id: None,
            selector: Map::new(),
        };
        let n = NodeAllocationRequest::new("nar-1", bmh_domain::NarSpec { cluster_id: "c".into(), site_id: None, node_groups: vec![group_v2] });
        let mut nar_record = NarRecord::new(n, now);

        let op = InMemoryOperator::new();
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());
        let host_ref = bmh_domain::HostRef::new("metal3", "m-a");
        op.seed(bmh_domain::BareMetalHost {
            host_ref: host_ref.clone(),
            provisioning_state: bmh_domain::ProvisioningState::Available,
            operational_status: bmh_domain::OperationalStatus::Ok,
            error_type: None,
            hardware: None,
            labels: Map::new(),
            annotations: Map::from([
                (BIOS_UPDATE_NEEDED_ANNOTATION.to_string(), "true".to_string()),
                (FIRMWARE_UPDATE_NEEDED_ANNOTATION.to_string(), "true".to_string()),
                (bmh_domain::keys::REBOOT_ANNOTATION.to_string(), String::new()),
            ]),
            online: true,
        })
        .await;

        let spec = bmh_domain::AllocatedNodeSpec {
            nar_id: bmh_domain::NarId::new("nar-1"),
            node_group_name: "masters".to_string(),
            host: host_ref.clone(),
            hw_profile_ref: "v2".to_string(),
        };
        let mut node = bmh_domain::AllocatedNode::new(AllocatedNodeId::new("m-a"), spec);
        set_condition(
            &mut node.status.conditions,
            Condition::new(ConditionType::Configured, ConditionStatus::True, ConditionReason::ConfigApplied, "", 0, now),
        );
        store.upsert_allocated_node(&AllocatedNodeRecord::new(node, now)).await.unwrap();

        let operator: Arc<dyn HostOperator> = Arc::new(op);
        let profiles: HashMap<String, HardwareProfile> =
            HashMap::from([("v2".to_string(), HardwareProfile { name: "v2".into(), ..Default::default() })]);
        let config = ControllerConfig::default();

        let first = advance(&mut nar_record, &store, &operator, &profiles, &config, now).await.unwrap();
        assert_eq!(first.changes.len(), 1);
        assert!(matches!(&first.changes[0], Change::NodeConfigured { node_id } if node_id.as_str() == "m-a"));

        let host_after = operator.get_host(&host_ref).await.unwrap().unwrap();
        assert!(!host_after.annotations.contains_key(BIOS_UPDATE_NEEDED_ANNOTATION));
        assert!(!host_after.annotations.contains_key(FIRMWARE_UPDATE_NEEDED_ANNOTATION));
        assert!(!host_after.annotations.contains_key(bmh_domain::keys::REBOOT_ANNOTATION));

        let second = advance(&mut nar_record, &store, &operator, &profiles, &config, now).await.unwrap();
        assert!(second.changes.is_empty());
        let nar_cond = find_condition(&nar_record.nar.status.conditions, &ConditionType::Configured).unwrap();
        assert_eq!(nar_cond.status, ConditionStatus::True);
        assert_eq!(nar_cond.reason, ConditionReason::ConfigApplied);
    }
}
