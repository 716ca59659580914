use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(deprecated)]
fn get_changetracker_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("changetracker")
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.json");
    std::fs::write(&path, content).unwrap();
    path
}

fn config_cmd(config: &PathBuf) -> Command {
    let mut cmd = Command::new(get_changetracker_bin());
    cmd.env_remove("CHANGETRACKER_CONFIG")
        .arg("--config")
        .arg(config)
        .arg("config");
    cmd
}

#[test]
fn test_config_summarizes_valid_file() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"{
            "dateFilter": "Last 3 months",
            "clientId": "00000000-0000-0000-0000-000000000001",
            "tenantId": "contoso.onmicrosoft.com",
            "sharepoint": { "siteUrl": "https://contoso.sharepoint.com/sites/tracker" },
            "browserScraping": {
                "roadmap": {
                    "tab": "Roadmap",
                    "sharepointList": {
                        "name": "EntraRoadmapItems",
                        "mapping": { "Title": "title", "ReleaseDate": "releaseDate" },
                        "dateField": "ReleaseDate"
                    }
                }
            }
        }"#,
    );

    config_cmd(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("Last 3 months"))
        .stdout(predicate::str::contains("EntraRoadmapItems (2 mapped fields)"))
        .stdout(predicate::str::contains("EntraChangeAnnouncements (no mapping)"))
        .stdout(predicate::str::contains(
            "https://contoso.sharepoint.com/sites/tracker",
        ));
}

#[test]
fn test_config_without_credentials_is_local_only() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, r#"{ "saveToFile": false }"#);

    config_cmd(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("data saved locally only"))
        .stdout(predicate::str::contains("Save to file: yes"));
}

#[test]
fn test_config_rejects_partial_credentials() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, r#"{ "clientId": "abc" }"#);

    config_cmd(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "missing: tenantId, sharepoint.siteUrl",
        ));
}

#[test]
fn test_config_rejects_unknown_date_filter() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, r#"{ "dateFilter": "Last week" }"#);

    config_cmd(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date filter"));
}

#[test]
fn test_config_missing_file_fails() {
    let dir = TempDir::new().unwrap();

    config_cmd(&dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}
