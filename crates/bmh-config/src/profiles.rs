use std::collections::HashMap;
use std::path::Path;

use bmh_domain::HardwareProfile;
use tracing::debug;

use crate::error::ConfigError;

/// Load every `*.yml`/`*.yaml` file in `dir` as a [`HardwareProfile`], keyed
/// by its declared name. Siblings to the controller's own operational config
/// file rather than anything the external bare-metal operator owns.
pub fn load_profiles(dir: &Path) -> Result<HashMap<String, HardwareProfile>, ConfigError> {
    let mut profiles = HashMap::new();

    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::Io { path: dir.display().to_string(), source: e })?;
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::Io { path: dir.display().to_string(), source: e })?;
        let path = entry.path();
        let is_yaml = path.extension().and_then(|e| e.to_str()).map(|e| e == "yml" || e == "yaml").unwrap_or(false);
        if !path.is_file() || !is_yaml {
            continue;
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
        let profile: HardwareProfile =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse { path: path.display().to_string(), source: e })?;
        if profile.name.is_empty() {
            return Err(ConfigError::Conversion { path: path.display().to_string(), message: "profile must declare a name".to_string() });
        }
        profile.validate().map_err(|e| ConfigError::Conversion { path: path.display().to_string(), message: e.to_string() })?;
        debug!(path = %path.display(), name = %profile.name, "loaded hardware profile");
        profiles.insert(profile.name.clone(), profile);
    }

    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scratch_dir(label: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("bmh-config-test-{}-{}", std::process::id(), label));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_named_profiles_keyed_by_name() {
        let dir = scratch_dir("loads-named");
        let mut f = std::fs::File::create(dir.join("gold.yml")).unwrap();
        writeln!(f, "name: gold\nbios_attributes: {{}}").unwrap();

        let profiles = load_profiles(&dir).unwrap();
        assert_eq!(profiles.len(), 1);
        assert!(profiles.contains_key("gold"));
    }

    #[test]
    fn rejects_profile_without_a_name() {
        let dir = scratch_dir("rejects-nameless");
        let mut f = std::fs::File::create(dir.join("nameless.yml")).unwrap();
        writeln!(f, "bios_attributes: {{}}").unwrap();

        assert!(load_profiles(&dir).is_err());
    }
}
