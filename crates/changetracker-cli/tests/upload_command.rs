use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(deprecated)]
fn get_changetracker_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("changetracker")
}

const CONFIGURED: &str = r#"{
    "clientId": "00000000-0000-0000-0000-000000000001",
    "tenantId": "contoso.onmicrosoft.com",
    "sharepoint": { "siteUrl": "https://contoso.sharepoint.com/sites/tracker" }
}"#;

fn upload_cmd(dir: &TempDir, config: Option<&str>, dump_name: &str) -> Command {
    let config_path = dir.path().join("config.json");
    if let Some(content) = config {
        std::fs::write(&config_path, content).unwrap();
    }
    let dump = dir.path().join(dump_name);
    std::fs::write(&dump, r#"[{"title":"Passkeys","url":"","description":"","overview":""}]"#)
        .unwrap();

    let mut cmd = Command::new(get_changetracker_bin());
    cmd.env_remove("CHANGETRACKER_CONFIG")
        .arg("--config")
        .arg(config_path)
        .arg("upload")
        .arg(dump);
    cmd
}

#[test]
fn test_upload_requires_sharepoint_settings() {
    let dir = TempDir::new().unwrap();

    upload_cmd(&dir, None, "roadmap-2025-03-04T09-15-00.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "SharePoint upload is not configured",
        ));
}

#[test]
fn test_upload_needs_view_for_unrecognized_file() {
    let dir = TempDir::new().unwrap();

    upload_cmd(&dir, Some(CONFIGURED), "items.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pass --view"));
}

#[test]
fn test_upload_rejects_unknown_view() {
    let dir = TempDir::new().unwrap();

    upload_cmd(&dir, Some(CONFIGURED), "items.json")
        .arg("--view")
        .arg("blog")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
