use std::collections::HashMap;
use std::sync::Arc;

use bmh_config::ControllerConfig;
use bmh_domain::keys::{
    ALLOCATED_LABEL, ALLOCATED_NODE_LABEL, ALLOW_HOST_MANAGEMENT_ANNOTATION, BOOT_INTERFACE_LABEL_KEY,
    BOOT_MAC_ANNOTATION,
};
use bmh_domain::{
    allocated_node_name, AllocatedNode, AllocatedNodeId, AllocatedNodeSpec, HardwareDetails, HardwareProfile,
    HostRef, NarId, NicInfo, NodeInterface, RequeueHint,
};
use bmh_operator::{HostOperator, PatchOp};
use bmh_select::matches as group_matches;
use bmh_store::{AllocatedNodeRecord, AuditEvent, NarRecord, ObjectStore};
use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::ReconcileError;
use crate::firmware::{self, FirmwareOutcome};
use crate::report::{Change, ReconcileReport};

/// §4.A pre-check: for every NodeGroup with `size > 0`, count free hosts
/// matching its filter. Fails without mutating anything if any group is
/// short — the allocation loop below is never entered on failure.
pub async fn pre_check(
    nar: &bmh_domain::NodeAllocationRequest,
    operator: &Arc<dyn HostOperator>,
) -> Result<(), ReconcileError> {
    let hosts = operator.list_available_hosts().await?;
    for group in &nar.spec.node_groups {
        if group.size == 0 {
            continue;
        }
        let mut available = 0u32;
        for host in &hosts {
            if group_matches(host, group, nar.spec.site_id.as_deref())? {
                available += 1;
            }
        }
        if available < group.size {
            return Err(ReconcileError::InsufficientCapacity { group: group.name.clone(), needed: group.size, available });
        }
    }
    Ok(())
}

struct AllocationState {
    remaining: u32,
    first_error: Option<String>,
    min_backoff: RequeueHint,
    reserved: Vec<PerHostOutcome>,
}

struct PerHostOutcome {
    node_id: AllocatedNodeId,
    host: HostRef,
    requeue: Option<RequeueHint>,
}

/// Run the allocation loop for every NodeGroup still short of its target
/// size, then fold every host this call reserved into the NAR's status.
/// Assumes [`pre_check`] already passed this cycle.
pub async fn allocate(
    nar_record: &mut NarRecord,
    store: &Arc<dyn ObjectStore>,
    operator: &Arc<dyn HostOperator>,
    profiles: &HashMap<String, HardwareProfile>,
    config: &ControllerConfig,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, ReconcileError> {
    let mut report = ReconcileReport::new();
    let nar_id = nar_record.nar.id.clone();
    let cluster_id = nar_record.nar.spec.cluster_id.clone();
    let site_id = nar_record.nar.spec.site_id.clone();

    for group in nar_record.nar.spec.node_groups.clone() {
        if group.size == 0 {
            continue;
        }
        let existing = store.list_allocated_nodes(&nar_id).await?;
        let current_count = existing.iter().filter(|r| r.node.spec.node_group_name == group.name).count() as u32;
        if current_count >= group.size {
            continue;
        }
        let pending = group.size - current_count;

        let profile = profiles
            .get(&group.hardware_profile_ref)
            .cloned()
            .ok_or_else(|| ReconcileError::InvalidInput(format!("no hardware profile registered for ref '{}'", group.hardware_profile_ref)))?;

        // "fetch the non-cached candidate list" — deliberately a fresh read,
        // distinct from pre_check's snapshot.
        let candidates: Vec<HostRef> = operator
            .list_available_hosts()
            .await?
            .into_iter()
            .filter(|h| group_matches(h, &group, site_id.as_deref()).unwrap_or(false))
            .take(pending as usize)
            .map(|h| h.host_ref)
            .collect();

        let state = Arc::new(tokio::sync::Mutex::new(AllocationState {
            remaining: candidates.len() as u32,
            first_error: None,
            min_backoff: RequeueHint::None,
            reserved: Vec::new(),
        }));

        let mut set = JoinSet::new();
        for host_ref in candidates {
            let store = Arc::clone(store);
            let operator = Arc::clone(operator);
            let profile = profile.clone();
            let config = config.clone();
            let state = Arc::clone(&state);
            let nar_id = nar_id.clone();
            let group_name = group.name.clone();
            let hw_profile_ref = group.hardware_profile_ref.clone();
            let plugin_id = config.plugin_id.clone();
            let cluster_id = cluster_id.clone();

            set.spawn(async move {
                // Remaining need counter, decremented under lock before the
                // task does any work (§4.A allocation loop).
                {
                    let mut s = state.lock().await;
                    if s.remaining == 0 {
                        return;
                    }
                    s.remaining -= 1;
                }

                let result = reserve_host(
                    &nar_id, &cluster_id, &group_name, &hw_profile_ref, &plugin_id, &host_ref, &profile, &store, &operator, &config, now,
                )
                .await;

                let mut s = state.lock().await;
                match result {
                    Ok(outcome) => s.reserved.push(outcome),
                    Err(e) => {
                        if s.first_error.is_none() {
                            s.first_error = Some(e.to_string());
                        }
                        s.min_backoff = s.min_backoff.combine(RequeueHint::Short);
                    }
                }
            });
        }

        // Join barrier: wait for every task in this group's fan-out before
        // moving to the next group.
        while set.join_next().await.is_some() {}

        let final_state = state.lock().await;
        if let Some(message) = &final_state.first_error {
            report.errors.push(message.clone());
        }
        report.merge_requeue(final_state.min_backoff);
        for outcome in &final_state.reserved {
            report.changes.push(Change::HostReserved { nar_id: nar_id.clone(), node_id: outcome.node_id.clone(), host: outcome.host.clone() });
            if let Some(hint) = outcome.requeue {
                report.merge_requeue(hint);
            }
            nar_record.nar.status.record_node(outcome.node_id.as_str());
        }
    }

    if !report.changes.is_empty() {
        nar_record.meta.touch(now, bmh_store::compute_desired_hash(&nar_record.nar.spec));
        store.upsert_nar(nar_record).await?;
    }

    Ok(report)
}

#[allow(clippy::too_many_arguments)]
async fn reserve_host(
    nar_id: &NarId,
    cluster_id: &str,
    group_name: &str,
    hw_profile_ref: &str,
    plugin_id: &str,
    host_ref: &HostRef,
    profile: &HardwareProfile,
    store: &Arc<dyn ObjectStore>,
    operator: &Arc<dyn HostOperator>,
    config: &ControllerConfig,
    now: DateTime<Utc>,
) -> Result<PerHostOutcome, ReconcileError> {
    let node_id = allocated_node_name(plugin_id, cluster_id, host_ref);

    // Step 1.
    operator
        .apply_patch(host_ref, &[PatchOp::add_label(ALLOCATED_NODE_LABEL, node_id.as_str())], config.label_conflict_retry_bound)
        .await?;

    // Step 2.
    if store.get_allocated_node(&node_id).await?.is_none() {
        let spec = AllocatedNodeSpec {
            nar_id: nar_id.clone(),
            node_group_name: group_name.to_string(),
            host: host_ref.clone(),
            hw_profile_ref: hw_profile_ref.to_string(),
        };
        let node = AllocatedNode::new(node_id.clone(), spec);
        store.upsert_allocated_node(&AllocatedNodeRecord::new(node, now)).await?;
        store
            .append_event(&AuditEvent::NodeAllocated { id: Uuid::new_v4(), at: now, nar_id: nar_id.clone(), node_id: node_id.clone() })
            .await?;
    }

    let mut record = store
        .get_allocated_node(&node_id)
        .await?
        .ok_or_else(|| ReconcileError::Internal(format!("allocated node {node_id} vanished after creation")))?;

    // Step 3: entry point into the firmware engine, postInstall=false.
    let mut requeue = None;
    match firmware::advance(host_ref, profile, &mut record.node, false, operator, config, now).await {
        Ok(FirmwareOutcome::Done) => {}
        Ok(FirmwareOutcome::Requeue(hint)) => requeue = Some(hint),
        Err(ReconcileError::PersistentHost { message }) => {
            store.upsert_allocated_node(&record).await?;
            store
                .append_event(&AuditEvent::NodeError { id: Uuid::new_v4(), at: now, nar_id: nar_id.clone(), node_id: node_id.clone(), message: message.clone() })
                .await?;
            return Err(ReconcileError::PersistentHost { message });
        }
        Err(e) => return Err(e),
    }

    // Steps 4 + 5.
    operator
        .apply_patch(
            host_ref,
            &[PatchOp::add_label(ALLOCATED_LABEL, "true"), PatchOp::add_annotation(ALLOW_HOST_MANAGEMENT_ANNOTATION, "")],
            config.label_conflict_retry_bound,
        )
        .await?;

    let host = operator
        .get_host(host_ref)
        .await?
        .ok_or_else(|| ReconcileError::Internal(format!("host {host_ref} vanished mid-reservation")))?;

    // Step 6.
    if let Some(label_value) = host.labels.get(BOOT_INTERFACE_LABEL_KEY) {
        if !host.annotations.contains_key(BOOT_MAC_ANNOTATION) {
            if let Some(nic) = find_boot_nic(host.hardware.as_ref(), label_value) {
                operator
                    .apply_patch(host_ref, &[PatchOp::add_annotation(BOOT_MAC_ANNOTATION, nic.mac_address.clone())], config.label_conflict_retry_bound)
                    .await?;
            }
        }
    }

    // Step 7.
    if let Some(hw) = &host.hardware {
        record.node.status.interfaces = hw
            .nics
            .iter()
            .map(|n| NodeInterface { name: n.name.clone(), mac_address: n.mac_address.clone(), ipv4_address: None })
            .collect();
        record.node.status.bmc_address = (!hw.bmc_address.is_empty()).then(|| hw.bmc_address.clone());
    }
    record.node.status.applied_profile = Some(profile.name.clone());

    // Step 9: no firmware update pending this call means the host is ready
    // for provisioning — clear preprovisioning network data and wait for
    // the bare-metal operator to confirm.
    if requeue.is_none() {
        operator.clear_preprovisioning_network_data(host_ref).await?;
        if let Some(image) = operator.get_preprovisioning_image(host_ref).await? {
            if !image.network_data_is_cleared() {
                requeue = Some(RequeueHint::Short);
            }
        }
    }

    store.upsert_allocated_node(&record).await?;

    Ok(PerHostOutcome { node_id, host: host_ref.clone(), requeue })
}

/// First-match on iteration order between a NIC-name match and a
/// hyphenated-MAC match (spec §9 open question 2) — name is tried first;
/// this ordering is arbitrary but pinned by a test, not "fixed".
fn find_boot_nic<'a>(hw: Option<&'a HardwareDetails>, label_value: &str) -> Option<&'a NicInfo> {
    let hw = hw?;
    hw.nics
        .iter()
        .find(|n| n.name == label_value)
        .or_else(|| hw.nics.iter().find(|n| n.mac_address.replace(':', "-").eq_ignore_ascii_case(label_value)))
}
