use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bmh_domain::{BareMetalHost, HostFirmwareComponents, HostFirmwareSettings, HostRef, HostUpdatePolicy, PreprovisioningImage};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::OperatorError;
use crate::operator::HostOperator;
use crate::patch::PatchOp;

#[derive(Debug, Clone)]
struct HostRecord {
    host: BareMetalHost,
    firmware_components: Option<HostFirmwareComponents>,
    firmware_settings: Option<HostFirmwareSettings>,
    preprovisioning_image: Option<PreprovisioningImage>,
    update_policy: Option<HostUpdatePolicy>,
}

impl HostRecord {
    fn new(host: BareMetalHost) -> Self {
        Self { host, firmware_components: None, firmware_settings: None, preprovisioning_image: None, update_policy: None }
    }
}

/// In-memory [`HostOperator`] fixture. Holds one exclusive write lock per
/// call, so it never actually exercises a label-write conflict — useful for
/// reconciler unit tests and for running the controller against a seeded
/// fixture with no external operator present.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOperator {
    hosts: Arc<RwLock<HashMap<HostRef, HostRecord>>>,
}

impl InMemoryOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a host fixture. Test-only entry point; production callers only
    /// ever observe hosts the real bare-metal operator created.
    pub async fn seed(&self, host: BareMetalHost) {
        let mut guard = self.hosts.write().await;
        guard.insert(host.host_ref.clone(), HostRecord::new(host));
    }

    pub async fn seed_firmware_settings(&self, host_ref: &HostRef, settings: HostFirmwareSettings) {
        let mut guard = self.hosts.write().await;
        if let Some(rec) = guard.get_mut(host_ref) {
            rec.firmware_settings = Some(settings);
        }
    }

    pub async fn seed_preprovisioning_image(&self, host_ref: &HostRef, image: PreprovisioningImage) {
        let mut guard = self.hosts.write().await;
        if let Some(rec) = guard.get_mut(host_ref) {
            rec.preprovisioning_image = Some(image);
        }
    }
}

#[async_trait]
impl HostOperator for InMemoryOperator {
    async fn get_host(&self, host_ref: &HostRef) -> Result<Option<BareMetalHost>, OperatorError> {
        let guard = self.hosts.read().await;
        Ok(guard.get(host_ref).map(|r| r.host.clone()))
    }

    async fn list_available_hosts(&self) -> Result<Vec<BareMetalHost>, OperatorError> {
        let guard = self.hosts.read().await;
        Ok(guard.values().filter(|r| !r.host.is_allocated()).map(|r| r.host.clone()).collect())
    }

    async fn apply_patch(&self, host_ref: &HostRef, ops: &[PatchOp], _max_retries: u32) -> Result<(), OperatorError> {
        let mut guard = self.hosts.write().await;
        let rec = guard.get_mut(host_ref).ok_or_else(|| OperatorError::HostNotFound(host_ref.to_string()))?;
        let mut changed = false;
        for op in ops {
            changed |= op.apply(&mut rec.host.labels, &mut rec.host.annotations);
        }
        debug!(host = %host_ref, changed, "InMemoryOperator: apply_patch");
        Ok(())
    }

    async fn set_online(&self, host_ref: &HostRef, online: bool) -> Result<(), OperatorError> {
        let mut guard = self.hosts.write().await;
        let rec = guard.get_mut(host_ref).ok_or_else(|| OperatorError::HostNotFound(host_ref.to_string()))?;
        rec.host.online = online;
        Ok(())
    }

    async fn get_firmware_components(&self, host_ref: &HostRef) -> Result<Option<HostFirmwareComponents>, OperatorError> {
        let guard = self.hosts.read().await;
        Ok(guard.get(host_ref).and_then(|r| r.firmware_components.clone()))
    }

    async fn get_or_create_firmware_components(&self, host_ref: &HostRef) -> Result<(HostFirmwareComponents, bool), OperatorError> {
        let mut guard = self.hosts.write().await;
        let rec = guard.get_mut(host_ref).ok_or_else(|| OperatorError::HostNotFound(host_ref.to_string()))?;
        if let Some(existing) = &rec.firmware_components {
            Ok((existing.clone(), false))
        } else {
            let created = HostFirmwareComponents::default();
            rec.firmware_components = Some(created.clone());
            Ok((created, true))
        }
    }

    async fn get_firmware_settings(&self, host_ref: &HostRef) -> Result<Option<HostFirmwareSettings>, OperatorError> {
        let guard = self.hosts.read().await;
        Ok(guard.get(host_ref).and_then(|r| r.firmware_settings.clone()))
    }

    async fn get_preprovisioning_image(&self, host_ref: &HostRef) -> Result<Option<PreprovisioningImage>, OperatorError> {
        let guard = self.hosts.read().await;
        Ok(guard.get(host_ref).and_then(|r| r.preprovisioning_image.clone()))
    }

    async fn clear_preprovisioning_network_data(&self, host_ref: &HostRef) -> Result<(), OperatorError> {
        let mut guard = self.hosts.write().await;
        let rec = guard.get_mut(host_ref).ok_or_else(|| OperatorError::HostNotFound(host_ref.to_string()))?;
        rec.preprovisioning_image = Some(PreprovisioningImage::default());
        Ok(())
    }

    async fn set_update_policy(&self, host_ref: &HostRef, policy: HostUpdatePolicy) -> Result<(), OperatorError> {
        let mut guard = self.hosts.write().await;
        let rec = guard.get_mut(host_ref).ok_or_else(|| OperatorError::HostNotFound(host_ref.to_string()))?;
        rec.update_policy = Some(policy);
        Ok(())
    }

    async fn remove_image_label(&self, host_ref: &HostRef, key: &str) -> Result<(), OperatorError> {
        let mut guard = self.hosts.write().await;
        let rec = guard.get_mut(host_ref).ok_or_else(|| OperatorError::HostNotFound(host_ref.to_string()))?;
        if let Some(image) = rec.preprovisioning_image.as_mut() {
            image.labels.remove(key);
        }
        Ok(())
    }
}
