// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task flows against a recording shell.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};

use tempfile::TempDir;
use wpstack_core::ownership::{ServiceAccount, ensure_owned};
use wpstack_ctl::certs;
use wpstack_ctl::shell::{CommandOutput, RecordingShell};
use wpstack_ctl::{CtlError, StackConfig, Tasks};

fn config(tmp: &TempDir) -> StackConfig {
    let mut config = StackConfig::with_data_root(tmp.path().join("data"));
    config.domain = "example.test".to_string();
    config.secrets_dir = tmp.path().join("secrets");
    config.env_file = tmp.path().join("absent.env");
    config
}

// ============================================================================
// Reset safety
// ============================================================================

#[tokio::test]
async fn test_reset_on_bare_host_succeeds() {
    let tmp = TempDir::new().unwrap();
    // Nothing running, nothing to list, every removal would fail.
    let shell = RecordingShell::new()
        .fail("down", 1)
        .fail(" rm", 1)
        .fail("rmi", 1);
    let tasks = Tasks::new(config(&tmp), shell).unwrap();

    let report = tasks.fclean().await.unwrap();
    assert_eq!(report.skipped.len(), 1);

    // Idempotent.
    tasks.fclean().await.unwrap();
}

#[tokio::test]
async fn test_reset_continues_after_failed_step() {
    let tmp = TempDir::new().unwrap();
    let shell = RecordingShell::new()
        .respond("docker ps -qa", CommandOutput::ok("c1\n"))
        .fail("docker rm -f", 1)
        .respond("docker images -qa", CommandOutput::ok("i1\ni2\n"));
    let tasks = Tasks::new(config(&tmp), shell).unwrap();

    let report = tasks.clean().await;
    assert_eq!(report.skipped, vec!["docker rm -f c1".to_string()]);
    assert!(
        tasks
            .shell()
            .commands()
            .contains(&"docker rmi -f i1 i2".to_string())
    );
}

#[tokio::test]
async fn test_fclean_without_privileges_asks_for_sudo() {
    if ServiceAccount::current().uid == 0 {
        eprintln!("Skipping test: permission checks do not apply to root");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let tasks = Tasks::new(config(&tmp), RecordingShell::new()).unwrap();
    let mariadb = tasks.layout().mariadb.clone();
    let tables = mariadb.join("mysql");
    fs::create_dir_all(&tables).unwrap();
    fs::write(tables.join("ibdata1"), b"x").unwrap();
    // Stands in for a directory the database account owns.
    fs::set_permissions(&tables, fs::Permissions::from_mode(0o555)).unwrap();

    let err = tasks.fclean().await.unwrap_err();
    fs::set_permissions(&tables, fs::Permissions::from_mode(0o755)).unwrap();

    match &err {
        CtlError::NeedsPrivileges { path } => assert_eq!(path, &mariadb),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("rerun with sudo"));
}

// ============================================================================
// Full cycle
// ============================================================================

#[tokio::test]
async fn test_second_all_leaves_service_data_alone() {
    let tmp = TempDir::new().unwrap();
    let tasks = Tasks::new(config(&tmp), RecordingShell::new()).unwrap();

    let first = tasks.all().await.unwrap();
    assert_eq!(first.created.len(), 3);

    // What the database container leaves behind after its first start.
    let tables = tasks.layout().mariadb.join("mysql");
    fs::create_dir_all(&tables).unwrap();
    fs::write(tables.join("user.frm"), b"x").unwrap();
    fs::set_permissions(&tables, fs::Permissions::from_mode(0o700)).unwrap();

    let running_as_root = ServiceAccount::current().uid == 0;
    if running_as_root {
        let engine = ServiceAccount {
            uid: 64_999,
            gid: 64_999,
        };
        ensure_owned(&tasks.layout().mariadb, engine).unwrap();
    }
    let before = fs::metadata(tables.join("user.frm")).unwrap();

    let second = tasks.all().await.unwrap();
    assert!(second.created.is_empty());
    assert!(!second.certificate_generated);

    let after = fs::metadata(tables.join("user.frm")).unwrap();
    assert_eq!((after.uid(), after.gid()), (before.uid(), before.gid()));
    assert_eq!(
        fs::metadata(&tables).unwrap().permissions().mode() & 0o777,
        0o700
    );
    if running_as_root {
        assert_eq!(after.uid(), 64_999);
        assert_eq!(fs::metadata(&tasks.layout().mariadb).unwrap().uid(), 64_999);
    }
}

#[tokio::test]
async fn test_re_rebuilds_from_scratch() {
    let tmp = TempDir::new().unwrap();
    let tasks = Tasks::new(config(&tmp), RecordingShell::new()).unwrap();

    let first = tasks.all().await.unwrap();
    assert!(first.certificate_generated);
    let old_cert = fs::read(tasks.layout().certs.join(certs::CERT_FILE)).unwrap();

    let second = tasks.re().await.unwrap();
    assert!(second.certificate_generated);
    let new_cert = fs::read(tasks.layout().certs.join(certs::CERT_FILE)).unwrap();
    assert_ne!(old_cert, new_cert);

    let commands = tasks.shell().commands();
    let builds = commands.iter().filter(|c| c.ends_with(" build")).count();
    let ups = commands.iter().filter(|c| c.ends_with(" up -d")).count();
    assert_eq!((builds, ups), (2, 2));
}

#[tokio::test]
async fn test_all_stops_at_failed_build() {
    let tmp = TempDir::new().unwrap();
    let tasks = Tasks::new(config(&tmp), RecordingShell::new().fail(" build", 1)).unwrap();

    assert!(tasks.all().await.is_err());
    assert!(!tasks.shell().commands().iter().any(|c| c.ends_with("up -d")));
}

#[tokio::test]
async fn test_compose_never_sees_secret_values() {
    let tmp = TempDir::new().unwrap();
    let secrets = tmp.path().join("secrets");
    fs::create_dir_all(&secrets).unwrap();
    fs::write(secrets.join("db_root_password.txt"), "rootpw123\n").unwrap();
    fs::write(secrets.join("db_user.txt"), "wpuser\n").unwrap();
    fs::write(secrets.join("db_password.txt"), "wppass456\n").unwrap();

    let tasks = Tasks::new(config(&tmp), RecordingShell::new()).unwrap();
    let report = tasks.all().await.unwrap();
    assert!(report.missing_secrets.is_empty());

    for inv in tasks.shell().invocations() {
        let rendered = format!("{} {:?}", inv, inv.envs);
        assert!(!rendered.contains("rootpw123"));
        assert!(!rendered.contains("wppass456"));
    }
}
