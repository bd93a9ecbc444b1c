use bmh_domain::keys::{
    ALLOCATED_LABEL, HARDWAREDATA_PREFIX, RESOURCE_POOL_ID_LABEL, RESOURCE_SELECTOR_PREFIX, SITE_ID_LABEL,
};
use bmh_domain::{BareMetalHost, NodeGroup};

/// True if `host` satisfies the label-only primary filter for `group` within
/// a NAR whose site is `nar_site_id`. Selector-map entries with neither the
/// `resource-selector/` nor `hardwaredata/` prefix are treated as direct
/// label-equality requirements against their literal key — the NAR selector
/// map doubles as a catch-all label filter, with the two prefixes carving
/// out the two typed escapes the spec calls out by name.
pub fn matches_primary(host: &BareMetalHost, group: &NodeGroup, nar_site_id: Option<&str>) -> bool {
    if let Some(site_id) = nar_site_id {
        if host.labels.get(SITE_ID_LABEL).map(String::as_str) != Some(site_id) {
            return false;
        }
    }

    if let Some(pool_id) = &group.resource_pool_id {
        if host.labels.get(RESOURCE_POOL_ID_LABEL).map(String::as_str) != Some(pool_id.as_str()) {
            return false;
        }
    }

    if host.labels.get(ALLOCATED_LABEL).map(String::as_str) == Some("true") {
        return false;
    }

    for (key, value) in &group.selector {
        if key.starts_with(HARDWAREDATA_PREFIX) {
            continue;
        }
        let label_key = key.strip_prefix(RESOURCE_SELECTOR_PREFIX).unwrap_or(key.as_str());
        if host.labels.get(label_key).map(String::as_str) != Some(value.as_str()) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmh_domain::HostRef;
    use std::collections::HashMap;

    fn host_with_labels(labels: &[(&str, &str)]) -> BareMetalHost {
        BareMetalHost {
            host_ref: HostRef::new("metal3", "host-1"),
            provisioning_state: bmh_domain::ProvisioningState::Available,
            operational_status: bmh_domain::OperationalStatus::Ok,
            error_type: None,
            hardware: None,
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            annotations: HashMap::new(),
            online: true,
        }
    }

    fn group(selector: &[(&str, &str)]) -> NodeGroup {
        NodeGroup {
            name: "workers".into(),
            role: "worker".into(),
            size: 1,
            hardware_profile_ref: "profile".into(),
            resource_pool_id: None,
            selector: selector.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn rejects_already_allocated_host() {
        let host = host_with_labels(&[(ALLOCATED_LABEL, "true")]);
        assert!(!matches_primary(&host, &group(&[]), None));
    }

    #[test]
    fn requires_matching_site_id() {
        let host = host_with_labels(&[(SITE_ID_LABEL, "site-a")]);
        assert!(matches_primary(&host, &group(&[]), Some("site-a")));
        assert!(!matches_primary(&host, &group(&[]), Some("site-b")));
    }

    #[test]
    fn resource_selector_prefix_strips_to_label_key() {
        let host = host_with_labels(&[("rack", "r1")]);
        let g = group(&[("resource-selector/rack", "r1")]);
        assert!(matches_primary(&host, &g, None));

        let g_wrong = group(&[("resource-selector/rack", "r2")]);
        assert!(!matches_primary(&host, &g_wrong, None));
    }

    #[test]
    fn hardwaredata_keys_are_ignored_by_primary_filter() {
        let host = host_with_labels(&[]);
        let g = group(&[("hardwaredata/cpuArch", "x86_64")]);
        assert!(matches_primary(&host, &g, None));
    }
}
