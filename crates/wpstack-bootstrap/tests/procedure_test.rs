// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the bootstrap procedure against the mock engine.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use wpstack_bootstrap::datadir::{self, MARKER_DIR};
use wpstack_bootstrap::engine::{Engine, EngineCall, EngineError, MockEngine};
use wpstack_bootstrap::{Bootstrap, BootstrapConfig, BootstrapError, BootstrapOutcome};
use wpstack_core::CredentialPaths;
use wpstack_core::retry::RetryPolicy;

const ROOT_PASSWORD: &str = "rootpw123";
const USER: &str = "wpuser";
const USER_PASSWORD: &str = "wppass456";

fn write_secrets(dir: &Path) -> CredentialPaths {
    let secrets = dir.join("secrets");
    fs::create_dir_all(&secrets).unwrap();
    let paths = CredentialPaths {
        root_password: secrets.join("db_root_password"),
        user: secrets.join("db_user"),
        user_password: secrets.join("db_password"),
    };
    fs::write(&paths.root_password, format!("{}\n", ROOT_PASSWORD)).unwrap();
    fs::write(&paths.user, format!("{}\n", USER)).unwrap();
    fs::write(&paths.user_password, format!("{}\n", USER_PASSWORD)).unwrap();
    paths
}

fn test_config(dir: &Path) -> BootstrapConfig {
    BootstrapConfig {
        data_dir: dir.join("data"),
        run_dir: dir.join("run"),
        log_dir: dir.join("log"),
        socket: dir.join("run").join("mysqld.sock"),
        service_user: None,
        credentials: write_secrets(dir),
        readiness: RetryPolicy {
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            max_attempts: 5,
        },
        ..BootstrapConfig::default()
    }
}

fn expected_statements() -> Vec<String> {
    vec![
        "ALTER USER 'root'@'localhost' IDENTIFIED BY 'rootpw123'".to_string(),
        "CREATE DATABASE IF NOT EXISTS `wordpress`".to_string(),
        "CREATE USER IF NOT EXISTS 'wpuser'@'%' IDENTIFIED BY 'wppass456'".to_string(),
        "GRANT ALL PRIVILEGES ON `wordpress`.* TO 'wpuser'@'%'".to_string(),
        "FLUSH PRIVILEGES".to_string(),
    ]
}

// ============================================================================
// First boot
// ============================================================================

#[tokio::test]
async fn test_fresh_volume_is_provisioned() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let data_dir = config.data_dir.clone();

    let bootstrap = Bootstrap::new(config, MockEngine::new());
    let outcome = bootstrap.run().await.unwrap();

    assert_eq!(outcome, BootstrapOutcome::Provisioned);
    assert!(datadir::is_initialized(&data_dir));
    assert_eq!(
        bootstrap.engine().calls(),
        vec![
            EngineCall::Initialize,
            EngineCall::StartBackground,
            EngineCall::Probe,
            EngineCall::Apply(expected_statements()),
            EngineCall::Shutdown,
        ]
    );
    assert_eq!(bootstrap.engine().running(), 0);
}

#[tokio::test]
async fn test_slow_engine_is_waited_for() {
    let tmp = TempDir::new().unwrap();
    let bootstrap = Bootstrap::new(test_config(tmp.path()), MockEngine::new().ready_after(3));

    assert_eq!(bootstrap.run().await.unwrap(), BootstrapOutcome::Provisioned);
    assert_eq!(bootstrap.engine().probes(), 3);
}

#[tokio::test]
async fn test_custom_database_name() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.db_name = "blog".to_string();

    let bootstrap = Bootstrap::new(config, MockEngine::new());
    bootstrap.run().await.unwrap();

    let applied = bootstrap
        .engine()
        .calls()
        .into_iter()
        .find_map(|c| match c {
            EngineCall::Apply(sql) => Some(sql),
            _ => None,
        })
        .unwrap();
    assert_eq!(applied[1], "CREATE DATABASE IF NOT EXISTS `blog`");
    assert_eq!(applied[3], "GRANT ALL PRIVILEGES ON `blog`.* TO 'wpuser'@'%'");
}

// ============================================================================
// Idempotency
// ============================================================================

#[tokio::test]
async fn test_second_run_skips_provisioning() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());

    let first = Bootstrap::new(config.clone(), MockEngine::new());
    assert_eq!(first.run().await.unwrap(), BootstrapOutcome::Provisioned);

    let second = Bootstrap::new(config, MockEngine::new());
    assert_eq!(
        second.run().await.unwrap(),
        BootstrapOutcome::AlreadyInitialized
    );
    assert!(second.engine().calls().is_empty());
}

#[tokio::test]
async fn test_initialized_volume_does_not_need_credentials() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    fs::create_dir_all(config.data_dir.join(MARKER_DIR)).unwrap();
    fs::remove_dir_all(tmp.path().join("secrets")).unwrap();

    let bootstrap = Bootstrap::new(config, MockEngine::new());
    assert_eq!(
        bootstrap.run().await.unwrap(),
        BootstrapOutcome::AlreadyInitialized
    );
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_missing_credentials_abort_before_engine() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    fs::remove_file(&config.credentials.user_password).unwrap();

    let bootstrap = Bootstrap::new(config, MockEngine::new());
    let err = bootstrap.run().await.unwrap_err();

    assert!(matches!(err, BootstrapError::Secret(_)));
    assert!(bootstrap.engine().calls().is_empty());
}

#[tokio::test]
async fn test_empty_credential_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    fs::write(&config.credentials.root_password, "\n").unwrap();

    let bootstrap = Bootstrap::new(config, MockEngine::new());
    assert!(matches!(
        bootstrap.run().await.unwrap_err(),
        BootstrapError::Secret(_)
    ));
}

#[tokio::test]
async fn test_invalid_database_name_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.db_name = "x".repeat(65);

    let bootstrap = Bootstrap::new(config, MockEngine::new());
    assert!(matches!(
        bootstrap.run().await.unwrap_err(),
        BootstrapError::Plan(_)
    ));
    assert!(bootstrap.engine().calls().is_empty());
}

#[tokio::test]
async fn test_failed_initialization_is_rolled_back() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let data_dir = config.data_dir.clone();

    let bootstrap = Bootstrap::new(config, MockEngine::new().fail_initialize());
    let err = bootstrap.run().await.unwrap_err();

    assert!(matches!(
        err,
        BootstrapError::Engine(EngineError::CommandFailed { .. })
    ));
    assert_eq!(bootstrap.engine().calls(), vec![EngineCall::Initialize]);
    assert!(!datadir::is_initialized(&data_dir));
    assert!(!data_dir.join("ibdata1").exists());
}

#[tokio::test]
async fn test_failed_provisioning_stops_engine_and_rolls_back() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let data_dir = config.data_dir.clone();
    fs::create_dir_all(data_dir.join("lost+found")).unwrap();

    let bootstrap = Bootstrap::new(config.clone(), MockEngine::new().fail_apply());
    let err = bootstrap.run().await.unwrap_err();

    assert!(matches!(err, BootstrapError::Engine(_)));
    assert_eq!(bootstrap.engine().calls().last(), Some(&EngineCall::Shutdown));
    assert_eq!(bootstrap.engine().running(), 0);
    assert!(!datadir::is_initialized(&data_dir));
    assert!(data_dir.join("lost+found").is_dir());

    // The next start retries provisioning from scratch.
    let retry = Bootstrap::new(config, MockEngine::new());
    assert_eq!(retry.run().await.unwrap(), BootstrapOutcome::Provisioned);
}

#[tokio::test]
async fn test_engine_crash_during_startup() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let data_dir = config.data_dir.clone();

    let bootstrap = Bootstrap::new(config, MockEngine::new().exit_after(1, 1));
    let err = bootstrap.run().await.unwrap_err();

    assert!(matches!(err, BootstrapError::EngineExited { code: 1 }));
    let calls = bootstrap.engine().calls();
    assert!(!calls.iter().any(|c| matches!(c, EngineCall::Apply(_))));
    assert_eq!(calls.last(), Some(&EngineCall::Shutdown));
    assert!(!datadir::is_initialized(&data_dir));
}

#[tokio::test]
async fn test_engine_never_ready() {
    let tmp = TempDir::new().unwrap();
    let bootstrap = Bootstrap::new(test_config(tmp.path()), MockEngine::new().never_ready());

    let err = bootstrap.run().await.unwrap_err();
    match err {
        BootstrapError::NotReady { attempts, .. } => assert_eq!(attempts, 5),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(bootstrap.engine().probes(), 5);
    assert_eq!(bootstrap.engine().running(), 0);
}

#[tokio::test]
async fn test_errors_do_not_leak_credentials() {
    let tmp = TempDir::new().unwrap();
    let bootstrap = Bootstrap::new(test_config(tmp.path()), MockEngine::new().fail_apply());

    let err = bootstrap.run().await.unwrap_err();
    let rendered = format!("{} {:?}", err, err);
    assert!(!rendered.contains(ROOT_PASSWORD));
    assert!(!rendered.contains(USER_PASSWORD));
}

// ============================================================================
// Handoff
// ============================================================================

#[tokio::test]
async fn test_handoff_follows_run() {
    let tmp = TempDir::new().unwrap();
    let bootstrap = Bootstrap::new(test_config(tmp.path()), MockEngine::new());

    bootstrap.run().await.unwrap();
    let err = bootstrap.engine().serve_foreground();

    assert!(matches!(err, EngineError::Other(_)));
    assert_eq!(
        bootstrap.engine().calls().last(),
        Some(&EngineCall::ServeForeground)
    );
}

#[test]
fn test_prepare_directories_creates_missing_dirs() {
    use std::os::unix::fs::MetadataExt;
    // Handing directories to "root" only works when we are root.
    if fs::metadata("/proc/self").map(|m| m.uid()).unwrap_or(u32::MAX) != 0 {
        eprintln!("Skipping: not running as root");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.service_user = Some("root".to_string());

    let bootstrap = Bootstrap::new(config.clone(), MockEngine::new());
    bootstrap.prepare_directories().unwrap();
    assert!(config.data_dir.is_dir());
    assert!(config.run_dir.is_dir());
    assert!(config.log_dir.is_dir());
}

#[test]
fn test_prepare_directories_unknown_user() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.service_user = Some("wpstack-no-such-user".to_string());

    let bootstrap = Bootstrap::new(config, MockEngine::new());
    assert!(matches!(
        bootstrap.prepare_directories().unwrap_err(),
        BootstrapError::Ownership(_)
    ));
}
