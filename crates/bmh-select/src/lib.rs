pub mod error;
pub mod hardware;
pub mod primary;

pub use error::SelectError;

use bmh_domain::keys::HARDWAREDATA_PREFIX;
use bmh_domain::{BareMetalHost, NodeGroup};

/// Full §4.D evaluation: the label-only primary filter, then (only if that
/// passes) the hardware-data secondary filter over the group's
/// `hardwaredata/…` selector entries.
pub fn matches(host: &BareMetalHost, group: &NodeGroup, nar_site_id: Option<&str>) -> Result<bool, SelectError> {
    if !primary::matches_primary(host, group, nar_site_id) {
        return Ok(false);
    }
    let entries = group
        .selector
        .iter()
        .filter(|(k, _)| k.starts_with(HARDWAREDATA_PREFIX))
        .map(|(k, v)| (k.as_str(), v.as_str()));
    hardware::matches_hardware(host.hardware.as_ref(), entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmh_domain::HostRef;
    use std::collections::HashMap;

    fn host(labels: &[(&str, &str)], hw: Option<bmh_domain::HardwareDetails>) -> BareMetalHost {
        BareMetalHost {
            host_ref: HostRef::new("metal3", "host-1"),
            provisioning_state: bmh_domain::ProvisioningState::Available,
            operational_status: bmh_domain::OperationalStatus::Ok,
            error_type: None,
            hardware: hw,
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            annotations: HashMap::new(),
            online: true,
        }
    }

    #[test]
    fn primary_and_secondary_both_required() {
        let h = host(
            &[("clcm.openshift.io/siteId", "site-a")],
            Some(bmh_domain::HardwareDetails { cpu_arch: "x86_64".into(), ..Default::default() }),
        );
        let group = NodeGroup {
            name: "workers".into(),
            role: "worker".into(),
            size: 1,
            hardware_profile_ref: "p".into(),
            resource_pool_id: None,
            selector: [("hardwaredata/cpuArch".to_string(), "x86_64".to_string())].into_iter().collect(),
        };
        assert!(matches(&h, &group, Some("site-a")).unwrap());
        assert!(!matches(&h, &group, Some("site-b")).unwrap());
    }
}
