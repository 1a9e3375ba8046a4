//! Integration tests for config, metadata and repository descriptors.

use dockwright::config::Config;
use dockwright::engine::MockEngine;
use dockwright::metadata::Value;
use dockwright::repo::{Repo, Workspace};
use dockwright::Error;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn workspace(global: Option<&str>, repos: &[(&str, &str)]) -> (TempDir, Workspace) {
    let temp = TempDir::new().unwrap();
    if let Some(global) = global {
        fs::write(temp.path().join("opts.yml"), global).unwrap();
    }
    for (name, opts) in repos {
        let dir = temp.path().join("repos").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Dockerfile"), "FROM alpine\n").unwrap();
        fs::write(dir.join("opts.yml"), opts).unwrap();
    }
    let config = Config::load(temp.path()).unwrap();
    let ws = Workspace::new(temp.path(), Arc::new(config));
    (temp, ws)
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_list()
        .unwrap_or_default()
        .iter()
        .map(Value::to_plain_string)
        .collect()
}

#[test]
fn env_resolves_all_then_group_then_tag() {
    let (_temp, ws) = workspace(
        None,
        &[(
            "demo",
            r#"
tags:
  latest: stable
env:
  tag:
    latest: [A=1]
  type:
    stable: [B=2]
  all: [C=3]
"#,
        )],
    );

    let repo = Repo::parse("demo:latest", &ws).unwrap();

    assert_eq!(repo.group(), "stable");
    assert_eq!(strings(&repo.metadata().get("env")), ["C=3", "B=2", "A=1"]);
}

#[test]
fn repository_overrides_win_over_global_file() {
    let (_temp, ws) = workspace(
        Some("user: acme\nmaintainer: ops@acme.test\n"),
        &[("web", "user: web-team\n"), ("api", "{}\n")],
    );

    let web = Repo::parse("web:latest", &ws).unwrap();
    let api = Repo::parse("api:latest", &ws).unwrap();

    assert_eq!(web.reference(), "web-team/web:latest");
    assert_eq!(api.reference(), "acme/api:latest");
    assert_eq!(
        api.metadata().get_str("maintainer").as_deref(),
        Some("ops@acme.test")
    );
}

#[test]
fn identifier_user_overrides_config() {
    let (_temp, ws) = workspace(Some("user: acme\n"), &[("web", "{}\n")]);

    let repo = Repo::parse("registry.example.com/web:2.0", &ws).unwrap();
    assert_eq!(repo.reference(), "registry.example.com/web:2.0");

    let err = Repo::parse("Web:2.0", &ws).unwrap_err();
    assert!(matches!(err, Error::InvalidRepoName { .. }));
}

#[test]
fn untagged_descriptor_expands_to_every_tag() {
    let (_temp, ws) = workspace(
        None,
        &[("web", "tags: { latest: {}, '1.0': {} }\naliases: { edge: latest }\n")],
    );

    let repo = Repo::parse("web", &ws).unwrap();
    assert!(!repo.is_concrete());

    let tags: Vec<String> = repo
        .to_repos()
        .unwrap()
        .iter()
        .map(|r| r.tag().to_string())
        .collect();
    assert_eq!(tags, ["1.0", "edge", "latest"]);
}

#[test]
fn unknown_build_type_fails_construction() {
    let (_temp, ws) = workspace(None, &[("web", "type: bogus\n")]);
    let err = Repo::parse("web:latest", &ws).unwrap_err();
    assert!(matches!(err, Error::UnknownBuildType { .. }));
}

#[test]
fn malformed_global_config_fails_before_engine_calls() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("opts.yml"), "- just\n- a list\n").unwrap();
    let engine = MockEngine::new();

    let err = Config::load(temp.path()).unwrap_err();

    assert!(matches!(err, Error::ConfigNotMapping { .. }));
    assert!(engine.calls().is_empty());
}

#[test]
fn json_override_file_is_accepted() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("opts.json"), r#"{"user": "json-user"}"#).unwrap();

    let config = Config::load(temp.path()).unwrap();
    assert_eq!(config.get_str("user"), Some("json-user"));
    assert!(config.source().unwrap().ends_with("opts.json"));
}
