//! Checks file loading tests

use std::fs;

use tempfile::tempdir;
use urlcheck::{CheckError, ScheduleRegistry, load_checks_file};

const CHECKS: &str = r#"
homepage:
  cron-expression: "0 */5 * * * ?"
  url: https://example.com/
  accepted-code: 200
  timeout: 5
  login: monitor
  password: $URLCHECK_CONFIG_TEST_PASSWORD
api:
  cron-expression: "*/30 * * * * *"
  url: https://api.example.com/health
  accepted-code: 204
  timeout: 3
typo:
  cron-expression: "0 */5 * * * MONDAY-ISH"
  url: https://example.com/
  accepted-code: 200
  timeout: 5
no-timeout:
  cron-expression: "0 * * * * *"
  url: https://example.com/
  accepted-code: 200
"#;

#[test]
fn test_load_yaml_checks_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("checks.yml");
    fs::write(&path, CHECKS).unwrap();

    let loaded = load_checks_file(&path).unwrap();
    assert_eq!(loaded.definitions.len(), 3);
    assert_eq!(loaded.rejected.len(), 1);
    assert_eq!(loaded.rejected[0].0, "no-timeout");

    let registry = ScheduleRegistry::load(loaded.definitions);
    let names: Vec<_> = registry.checks().iter().map(|c| c.definition.name.as_str()).collect();
    assert_eq!(names, vec!["api", "homepage"]);
    assert_eq!(registry.rejected(), ["typo".to_string()]);
}

#[test]
fn test_password_indirection_resolved_from_environment() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("checks.yaml");
    fs::write(&path, CHECKS).unwrap();

    // SAFETY: the variable name is unique to this test
    unsafe { std::env::set_var("URLCHECK_CONFIG_TEST_PASSWORD", "secret") };

    let loaded = load_checks_file(&path).unwrap();
    let homepage = loaded.definitions.iter().find(|d| d.name == "homepage").unwrap();
    let credentials = homepage.scoped_credentials().unwrap();

    assert_eq!(credentials.username, "monitor");
    assert_eq!(credentials.password, "secret");
    assert_eq!(credentials.scope.host, "example.com");
}

#[test]
fn test_load_toml_checks_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("checks.toml");
    fs::write(
        &path,
        r#"
[status]
cron-expression = "@every 30s"
url = "http://status.internal/"
accepted-code = 200
timeout = 2
email = "ops@example.com"
"#,
    )
    .unwrap();

    let loaded = load_checks_file(&path).unwrap();
    assert_eq!(loaded.definitions.len(), 1);
    assert_eq!(loaded.definitions[0].recipient.as_deref(), Some("ops@example.com"));
}

#[test]
fn test_missing_file_is_fatal() {
    let dir = tempdir().unwrap();
    let result = load_checks_file(dir.path().join("absent.yml"));
    assert!(matches!(result, Err(CheckError::ChecksFile(_))));
}
