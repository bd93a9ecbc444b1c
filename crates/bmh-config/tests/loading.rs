use std::path::Path;

use bmh_config::load;

#[test]
fn load_valid_fixture() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/config.yml");
    let cfg = load(&path).expect("should load without error");
    assert_eq!(cfg.plugin_id, "clcm");
    assert_eq!(cfg.admin_bind_addr, "0.0.0.0:9090");
    assert_eq!(cfg.medium_requeue_secs, 60);
}

#[test]
fn missing_file_returns_error() {
    let path = Path::new("/nonexistent/path/does/not/exist.yml");
    assert!(load(path).is_err());
}
