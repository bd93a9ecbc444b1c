use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// One firmware target: a version and the URL to fetch it from.
///
/// Valid iff the URL is non-empty and well-formed whenever a version is set
/// (spec §3). An entry with neither field set is a no-op placeholder and is
/// always valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareEntry {
    /// Component name for NIC entries (e.g. `nic:eth0`); ignored for the
    /// singleton BIOS/BMC entries.
    #[serde(default)]
    pub component: String,
    pub version: String,
    pub url: String,
}

impl FirmwareEntry {
    pub fn is_empty(&self) -> bool {
        self.version.is_empty() && self.url.is_empty()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.version.is_empty() {
            return Ok(());
        }
        if self.url.is_empty() || !looks_well_formed(&self.url) {
            return Err(DomainError::InvalidFirmwareEntry(format!(
                "component={} version={} url={:?}",
                self.component, self.version, self.url
            )));
        }
        Ok(())
    }
}

/// Minimal well-formedness check: a scheme followed by `://` and a non-empty
/// remainder. This is deliberately not a full URL parse — the firmware URLs
/// this plugin handles are opaque to it; it only needs to reject the obvious
/// "someone forgot the URL" case.
fn looks_well_formed(url: &str) -> bool {
    match url.find("://") {
        Some(idx) => idx > 0 && url.len() > idx + 3,
        None => false,
    }
}

/// Declarative target for one host's BIOS/BMC/NIC firmware (spec §3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProfile {
    pub name: String,
    #[serde(default)]
    pub bios_attributes: HashMap<String, String>,
    pub bios_firmware: Option<FirmwareEntry>,
    pub bmc_firmware: Option<FirmwareEntry>,
    #[serde(default)]
    pub nic_firmware: Vec<FirmwareEntry>,
}

impl HardwareProfile {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(e) = &self.bios_firmware {
            e.validate()?;
        }
        if let Some(e) = &self.bmc_firmware {
            e.validate()?;
        }
        for e in &self.nic_firmware {
            e.validate()?;
        }
        Ok(())
    }

    pub fn has_bios_attributes(&self) -> bool {
        !self.bios_attributes.is_empty()
    }

    /// Firmware entries with a non-empty URL or version — placeholders are
    /// never "required".
    pub fn firmware_entries(&self) -> Vec<&FirmwareEntry> {
        self.bios_firmware
            .iter()
            .chain(self.bmc_firmware.iter())
            .chain(self.nic_firmware.iter())
            .filter(|e| !e.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_entry_is_valid() {
        let e = FirmwareEntry { component: String::new(), version: String::new(), url: String::new() };
        assert!(e.validate().is_ok());
    }

    #[test]
    fn version_without_url_is_invalid() {
        let e = FirmwareEntry { component: "bios".into(), version: "1.2.3".into(), url: String::new() };
        assert!(e.validate().is_err());
    }

    #[test]
    fn version_with_malformed_url_is_invalid() {
        let e = FirmwareEntry { component: "bios".into(), version: "1.2.3".into(), url: "not-a-url".into() };
        assert!(e.validate().is_err());
    }

    #[test]
    fn version_with_well_formed_url_is_valid() {
        let e = FirmwareEntry {
            component: "bios".into(),
            version: "1.2.3".into(),
            url: "https://example.com/fw.bin".into(),
        };
        assert!(e.validate().is_ok());
    }
}
