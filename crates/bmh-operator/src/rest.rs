use async_trait::async_trait;
use bmh_domain::{BareMetalHost, HostFirmwareComponents, HostFirmwareSettings, HostRef, HostUpdatePolicy, PreprovisioningImage};
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::warn;

use crate::error::OperatorError;
use crate::operator::HostOperator;
use crate::patch::PatchOp;

/// Talks to the external bare-metal operator's HTTP surface. Conflicts on a
/// label/annotation write (`409 Conflict`) are retried with a fresh read,
/// bounded by the `max_retries` argument to `apply_patch` (§5).
#[derive(Debug, Clone)]
pub struct RestOperator {
    client: Client,
    base_url: String,
}

impl RestOperator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into() }
    }

    fn host_url(&self, host_ref: &HostRef) -> String {
        format!("{}/hosts/{}/{}", self.base_url, host_ref.namespace, host_ref.name)
    }
}

#[async_trait]
impl HostOperator for RestOperator {
    async fn get_host(&self, host_ref: &HostRef) -> Result<Option<BareMetalHost>, OperatorError> {
        let resp = self.client.get(self.host_url(host_ref)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json().await?))
    }

    async fn list_available_hosts(&self) -> Result<Vec<BareMetalHost>, OperatorError> {
        let resp = self.client.get(format!("{}/hosts?allocated=false", self.base_url)).send().await?;
        Ok(resp.error_for_status()?.json().await?)
    }

    async fn apply_patch(&self, host_ref: &HostRef, ops: &[PatchOp], max_retries: u32) -> Result<(), OperatorError> {
        for attempt in 0..=max_retries {
            let Some(mut host) = self.get_host(host_ref).await? else {
                return Err(OperatorError::HostNotFound(host_ref.to_string()));
            };
            let mut changed = false;
            for op in ops {
                changed |= op.apply(&mut host.labels, &mut host.annotations);
            }
            if !changed {
                return Ok(());
            }

            let resp = self
                .client
                .patch(self.host_url(host_ref))
                .json(&json!({ "labels": host.labels, "annotations": host.annotations }))
                .send()
                .await?;

            if resp.status() == StatusCode::CONFLICT {
                warn!(host = %host_ref, attempt, "label/annotation patch conflict, retrying");
                continue;
            }
            resp.error_for_status()?;
            return Ok(());
        }
        Err(OperatorError::ConflictRetriesExhausted { host: host_ref.to_string() })
    }

    async fn set_online(&self, host_ref: &HostRef, online: bool) -> Result<(), OperatorError> {
        self.client
            .patch(self.host_url(host_ref))
            .json(&json!({ "online": online }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn get_firmware_components(&self, host_ref: &HostRef) -> Result<Option<HostFirmwareComponents>, OperatorError> {
        let resp = self.client.get(format!("{}/firmware-components", self.host_url(host_ref))).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json().await?))
    }

    async fn get_or_create_firmware_components(&self, host_ref: &HostRef) -> Result<(HostFirmwareComponents, bool), OperatorError> {
        if let Some(existing) = self.get_firmware_components(host_ref).await? {
            return Ok((existing, false));
        }
        let resp = self
            .client
            .post(format!("{}/firmware-components", self.host_url(host_ref)))
            .json(&HostFirmwareComponents::default())
            .send()
            .await?;
        Ok((resp.error_for_status()?.json().await?, true))
    }

    async fn get_firmware_settings(&self, host_ref: &HostRef) -> Result<Option<HostFirmwareSettings>, OperatorError> {
        let resp = self.client.get(format!("{}/firmware-settings", self.host_url(host_ref))).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json().await?))
    }

    async fn get_preprovisioning_image(&self, host_ref: &HostRef) -> Result<Option<PreprovisioningImage>, OperatorError> {
        let resp = self.client.get(format!("{}/preprovisioning-image", self.host_url(host_ref))).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json().await?))
    }

    async fn clear_preprovisioning_network_data(&self, host_ref: &HostRef) -> Result<(), OperatorError> {
        self.client
            .patch(format!("{}/preprovisioning-image", self.host_url(host_ref)))
            .json(&json!({ "network_data_name": "", "network_data_version": "" }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn set_update_policy(&self, host_ref: &HostRef, policy: HostUpdatePolicy) -> Result<(), OperatorError> {
        self.client
            .put(format!("{}/update-policy", self.host_url(host_ref)))
            .json(&policy)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn remove_image_label(&self, host_ref: &HostRef, key: &str) -> Result<(), OperatorError> {
        let resp = self
            .client
            .delete(format!("{}/preprovisioning-image/labels/{}", self.host_url(host_ref), key))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        resp.error_for_status()?;
        Ok(())
    }
}
