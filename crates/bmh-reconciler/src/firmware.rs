use std::collections::HashMap;
use std::sync::Arc;

use bmh_domain::keys::{
    BIOS_UPDATE_NEEDED_ANNOTATION, BMH_ERROR_TIMESTAMP_ANNOTATION, FIRMWARE_UPDATE_NEEDED_ANNOTATION,
    REBOOT_ANNOTATION,
};
use bmh_domain::{
    AllocatedNode, Condition, ConditionReason, ConditionStatus, ConditionType, ConfigInProgressReason,
    FirmwareComponentStatus, HardwareProfile, HostFirmwareComponents, HostFirmwareSettings, HostRef,
    HostUpdatePolicy, OperationalStatus, ProvisioningState, RequeueHint, set_condition,
};
use bmh_config::ControllerConfig;
use bmh_operator::{HostOperator, PatchOp};
use chrono::{DateTime, Utc};

use crate::arbiter;
use crate::error::ReconcileError;

/// Outcome of one `advance` call. `Done` corresponds to the state machine's
/// `Done` state; every other non-terminal state surfaces as a requeue hint
/// instead of a distinct return variant, since the next call re-derives
/// which phase it's in from the host's observed annotations and status
/// (spec §2: "no in-process durable state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareOutcome {
    Done,
    Requeue(RequeueHint),
}

/// Drive one step of the per-host firmware/BIOS state machine (§4.B). Safe
/// to call repeatedly — each call re-derives the current phase from the
/// host's observed annotations/status rather than trusting any state this
/// function itself might have returned last time.
///
/// `post_install` distinguishes the Allocator's entry (`postInstall=false`,
/// §4.A step 3) from the Rolling Scheduler's (`postInstall=true`, §4.C):
/// it picks the gating provisioning state (`Preparing` vs `Servicing`/`OK`)
/// and whether a `HostUpdatePolicy` is created.
pub async fn advance(
    host_ref: &HostRef,
    profile: &HardwareProfile,
    node: &mut AllocatedNode,
    post_install: bool,
    operator: &Arc<dyn HostOperator>,
    config: &ControllerConfig,
    now: DateTime<Utc>,
) -> Result<FirmwareOutcome, ReconcileError> {
    profile.validate().map_err(|e| ReconcileError::InvalidInput(e.to_string()))?;

    let Some(host) = operator.get_host(host_ref).await? else {
        return Err(ReconcileError::Internal(format!("host {host_ref} vanished mid-reconcile")));
    };

    if host.operational_status == OperationalStatus::Error {
        return match arbiter::classify(&host.annotations, now, config.error_retry_window_secs) {
            arbiter::Verdict::Transient { stamp_needed: true } => {
                operator
                    .apply_patch(
                        host_ref,
                        &[PatchOp::add_annotation(BMH_ERROR_TIMESTAMP_ANNOTATION, now.to_rfc3339())],
                        config.label_conflict_retry_bound,
                    )
                    .await?;
                Ok(FirmwareOutcome::Requeue(RequeueHint::Short))
            }
            arbiter::Verdict::Transient { stamp_needed: false } => Ok(FirmwareOutcome::Requeue(RequeueHint::Short)),
            arbiter::Verdict::Persistent => {
                let message = host.error_type.clone().unwrap_or_else(|| "BMH Servicing Error".to_string());
                node.config_in_progress = None;
                set_condition(
                    &mut node.status.conditions,
                    Condition::new(ConditionType::Configured, ConditionStatus::False, ConditionReason::Failed, message.clone(), 0, now),
                );
                operator
                    .apply_patch(host_ref, &[PatchOp::remove_annotation(BMH_ERROR_TIMESTAMP_ANNOTATION)], config.label_conflict_retry_bound)
                    .await?;
                Err(ReconcileError::PersistentHost { message })
            }
        };
    }

    // Cleared on any transition out of Error (§4.E).
    if host.annotations.contains_key(BMH_ERROR_TIMESTAMP_ANNOTATION) {
        operator
            .apply_patch(host_ref, &[PatchOp::remove_annotation(BMH_ERROR_TIMESTAMP_ANNOTATION)], config.label_conflict_retry_bound)
            .await?;
    }

    let bios_needed = host.annotations.contains_key(BIOS_UPDATE_NEEDED_ANNOTATION);
    let fw_needed = host.annotations.contains_key(FIRMWARE_UPDATE_NEEDED_ANNOTATION);
    let reboot_issued = host.annotations.contains_key(REBOOT_ANNOTATION);

    // Decision + Programming: only re-evaluated while neither update-needed
    // annotation is set. Once one is, later calls fall through to Gating.
    // Every path that reaches `Done` below clears both annotations (and
    // `REBOOT_ANNOTATION`) so the next call — possibly against a different
    // profile — re-enters Decision instead of reading stale phase state.
    if !bios_needed && !fw_needed {
        let settings = operator.get_firmware_settings(host_ref).await?;
        let bios_required = bios_required_for_profile(profile, settings.as_ref().map(|s| &s.settings));

        let (components, newly_created) = operator.get_or_create_firmware_components(host_ref).await?;
        let firmware_required = newly_created || firmware_required_for_profile(profile, &components.components);

        if !bios_required && !firmware_required {
            clear_update_annotations(host_ref, &host, operator, config).await?;
            set_condition(
                &mut node.status.conditions,
                Condition::new(ConditionType::Configured, ConditionStatus::True, ConditionReason::ConfigApplied, "", 0, now),
            );
            return Ok(FirmwareOutcome::Done);
        }

        if post_install {
            operator
                .set_update_policy(
                    host_ref,
                    HostUpdatePolicy { allow_firmware_updates: firmware_required, allow_bios_settings_updates: bios_required },
                )
                .await?;
        }
        let mut ops = Vec::new();
        if bios_required {
            ops.push(PatchOp::add_annotation(BIOS_UPDATE_NEEDED_ANNOTATION, "true"));
        }
        if firmware_required {
            ops.push(PatchOp::add_annotation(FIRMWARE_UPDATE_NEEDED_ANNOTATION, "true"));
        }
        operator.apply_patch(host_ref, &ops, config.label_conflict_retry_bound).await?;
        return Ok(FirmwareOutcome::Requeue(RequeueHint::Short));
    }

    if !reboot_issued {
        // Gating: wait for the operator to observe the request.
        let gating_target_reached = if post_install {
            host.operational_status == OperationalStatus::Servicing
        } else {
            host.provisioning_state == ProvisioningState::Preparing
        };
        if !gating_target_reached {
            return Ok(FirmwareOutcome::Requeue(RequeueHint::Short));
        }
        if node.config_in_progress.is_none() {
            node.config_in_progress =
                Some(if fw_needed { ConfigInProgressReason::FirmwareUpdate } else { ConfigInProgressReason::BiosSettingsUpdate });
        }

        // Reboot gating: asymmetric verdict policy (spec §9 open question,
        // preserved as stated — not "fixed").
        let gate_passed = if post_install {
            let bios_verdict = if bios_needed {
                operator.get_firmware_settings(host_ref).await?.map(|s| s.change_detected_and_valid()).unwrap_or(false)
            } else {
                true
            };
            let fw_verdict = if fw_needed {
                operator.get_firmware_components(host_ref).await?.map(|c| c.change_detected_and_valid()).unwrap_or(false)
            } else {
                true
            };
            bios_verdict && fw_verdict
        } else {
            true
        };
        if !gate_passed {
            return Ok(FirmwareOutcome::Requeue(RequeueHint::Short));
        }
        operator
            .apply_patch(host_ref, &[PatchOp::add_annotation(REBOOT_ANNOTATION, "")], config.label_conflict_retry_bound)
            .await?;
        return Ok(FirmwareOutcome::Requeue(RequeueHint::Short));
    }

    // Completion.
    let completion_target_reached = if post_install {
        host.operational_status == OperationalStatus::Ok
    } else {
        host.provisioning_state == ProvisioningState::Available
    };
    if !completion_target_reached {
        return Ok(FirmwareOutcome::Requeue(RequeueHint::Short));
    }

    let settings = operator.get_firmware_settings(host_ref).await?;
    let components = operator.get_firmware_components(host_ref).await?;
    if !validate_applied(profile, settings.as_ref(), components.as_ref()) {
        // Non-terminal: remain in Validating and re-queue (§4.B Completion).
        return Ok(FirmwareOutcome::Requeue(RequeueHint::Short));
    }

    operator.clear_preprovisioning_network_data(host_ref).await?;
    let image = operator.get_preprovisioning_image(host_ref).await?;
    if image.map(|i| !i.network_data_is_cleared()).unwrap_or(false) {
        return Ok(FirmwareOutcome::Requeue(RequeueHint::Short));
    }

    clear_update_annotations(host_ref, &host, operator, config).await?;
    node.config_in_progress = None;
    set_condition(
        &mut node.status.conditions,
        Condition::new(ConditionType::Configured, ConditionStatus::True, ConditionReason::ConfigApplied, "", 0, now),
    );
    Ok(FirmwareOutcome::Done)
}

/// Clear a clean slate for the next cycle (§4.B Decision: "Clear any residual
/// bios-update-needed / firmware-update-needed annotations"). Called on every
/// path that reaches `Done` — otherwise a host that has completed one firmware
/// cycle would permanently read as `bios_needed`/`fw_needed`/`reboot_issued`,
/// skipping Decision and Gating forever on the next profile change.
async fn clear_update_annotations(
    host_ref: &HostRef,
    host: &bmh_domain::BareMetalHost,
    operator: &Arc<dyn HostOperator>,
    config: &ControllerConfig,
) -> Result<(), ReconcileError> {
    let mut ops = Vec::new();
    if host.annotations.contains_key(BIOS_UPDATE_NEEDED_ANNOTATION) {
        ops.push(PatchOp::remove_annotation(BIOS_UPDATE_NEEDED_ANNOTATION));
    }
    if host.annotations.contains_key(FIRMWARE_UPDATE_NEEDED_ANNOTATION) {
        ops.push(PatchOp::remove_annotation(FIRMWARE_UPDATE_NEEDED_ANNOTATION));
    }
    if host.annotations.contains_key(REBOOT_ANNOTATION) {
        ops.push(PatchOp::remove_annotation(REBOOT_ANNOTATION));
    }
    if !ops.is_empty() {
        operator.apply_patch(host_ref, &ops, config.label_conflict_retry_bound).await?;
    }
    Ok(())
}

/// Trim, case-fold, and strip a single leading `v` before a digit (§4.B
/// Completion's normalization rule — used for firmware *versions* only;
/// BIOS attributes use [`normalize_attr`], which never strips a `v`).
fn normalize_version(s: &str) -> String {
    let trimmed = s.trim().to_lowercase();
    match trimmed.strip_prefix('v') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest.to_string(),
        _ => trimmed,
    }
}

fn normalize_attr(s: &str) -> String {
    s.trim().to_lowercase()
}

fn nic_versions(components: &[FirmwareComponentStatus]) -> impl Iterator<Item = &str> {
    components.iter().filter(|c| c.component.starts_with("nic:")).map(|c| c.current_version.as_str())
}

fn bios_required_for_profile(profile: &HardwareProfile, settings: Option<&HashMap<String, String>>) -> bool {
    if !profile.has_bios_attributes() {
        return false;
    }
    let Some(settings) = settings else { return true };
    profile
        .bios_attributes
        .iter()
        .any(|(k, v)| settings.get(k).map(|actual| normalize_attr(actual) != normalize_attr(v)).unwrap_or(true))
}

fn firmware_required_for_profile(profile: &HardwareProfile, components: &[FirmwareComponentStatus]) -> bool {
    if let Some(e) = &profile.bios_firmware {
        if !e.is_empty() && !components.iter().any(|c| c.component == "bios" && normalize_version(&c.current_version) == normalize_version(&e.version)) {
            return true;
        }
    }
    if let Some(e) = &profile.bmc_firmware {
        if !e.is_empty() && !components.iter().any(|c| c.component == "bmc" && normalize_version(&c.current_version) == normalize_version(&e.version)) {
            return true;
        }
    }
    for e in &profile.nic_firmware {
        if e.is_empty() {
            continue;
        }
        let target = normalize_version(&e.version);
        if !nic_versions(components).any(|v| normalize_version(v) == target) {
            return true;
        }
    }
    false
}

fn validate_applied(profile: &HardwareProfile, settings: Option<&HostFirmwareSettings>, components: Option<&HostFirmwareComponents>) -> bool {
    if profile.has_bios_attributes() {
        let Some(settings) = settings else { return false };
        for (k, v) in &profile.bios_attributes {
            let Some(actual) = settings.settings.get(k) else { return false };
            if normalize_attr(actual) != normalize_attr(v) {
                return false;
            }
        }
    }
    let comps: &[FirmwareComponentStatus] = components.map(|c| c.components.as_slice()).unwrap_or(&[]);
    if let Some(e) = &profile.bios_firmware {
        if !e.is_empty() && !comps.iter().any(|c| c.component == "bios" && normalize_version(&c.current_version) == normalize_version(&e.version)) {
            return false;
        }
    }
    if let Some(e) = &profile.bmc_firmware {
        if !e.is_empty() && !comps.iter().any(|c| c.component == "bmc" && normalize_version(&c.current_version) == normalize_version(&e.version)) {
            return false;
        }
    }
    for e in &profile.nic_firmware {
        if e.is_empty() {
            continue;
        }
        let target = normalize_version(&e.version);
        if !nic_versions(comps).any(|v| normalize_version(v) == target) {
            return false;
        }
    }
    true
}
