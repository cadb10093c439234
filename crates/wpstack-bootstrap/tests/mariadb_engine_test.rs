// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end bootstrap against a real MariaDB installation.
//!
//! Requires `mariadb-install-db` and `mariadbd` on PATH and root privileges
//! (the server refuses to run as root without `--user=root`). Opt in with
//! `TEST_WPSTACK_MARIADB=1`.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use sqlx::mysql::MySqlConnectOptions;
use sqlx::{ConnectOptions, Connection, Row};
use tempfile::TempDir;
use wpstack_bootstrap::engine::{Engine, MariaDbEngine};
use wpstack_bootstrap::{Bootstrap, BootstrapConfig, BootstrapOutcome};
use wpstack_core::CredentialPaths;

fn check_binary(name: &str) -> bool {
    Command::new(name)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

macro_rules! skip_if_no_mariadb {
    () => {
        if std::env::var("TEST_WPSTACK_MARIADB").is_err() {
            eprintln!("Skipping test: TEST_WPSTACK_MARIADB not set");
            return;
        }
        if !check_binary("mariadbd") || !check_binary("mariadb-install-db") {
            eprintln!("Skipping test: MariaDB not installed");
            return;
        }
    };
}

fn config_in(dir: &Path) -> BootstrapConfig {
    let secrets = dir.join("secrets");
    fs::create_dir_all(&secrets).unwrap();
    fs::write(secrets.join("db_root_password"), "rootpw123\n").unwrap();
    fs::write(secrets.join("db_user"), "wpuser\n").unwrap();
    fs::write(secrets.join("db_password"), "wppass456\n").unwrap();

    BootstrapConfig {
        data_dir: dir.join("data"),
        run_dir: dir.join("run"),
        log_dir: dir.join("log"),
        socket: dir.join("run").join("mysqld.sock"),
        port: 33061,
        service_user: Some("root".to_string()),
        credentials: CredentialPaths {
            root_password: secrets.join("db_root_password"),
            user: secrets.join("db_user"),
            user_password: secrets.join("db_password"),
        },
        shutdown_timeout: Duration::from_secs(60),
        ..BootstrapConfig::default()
    }
}

#[tokio::test]
async fn test_first_boot_provisions_and_second_boot_skips() {
    skip_if_no_mariadb!();

    let tmp = TempDir::new().unwrap();
    let config = config_in(tmp.path());

    let bootstrap = Bootstrap::new(config.clone(), MariaDbEngine::from_config(&config));
    assert_eq!(bootstrap.run().await.unwrap(), BootstrapOutcome::Provisioned);

    // Bring the server up again and log in as the application user.
    let engine = MariaDbEngine::from_config(&config);
    let handle = engine.start_background().await.unwrap();
    let mut attempts = 0;
    let mut conn = loop {
        let options = MySqlConnectOptions::new()
            .socket(&config.socket)
            .username("wpuser")
            .password("wppass456")
            .database("wordpress")
            .disable_statement_logging();
        match options.connect().await {
            Ok(conn) => break conn,
            Err(_) if attempts < 50 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Err(e) => panic!("application user cannot connect: {e}"),
        }
    };
    let row = sqlx::query("SELECT DATABASE()")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    let db: String = row.get(0);
    assert_eq!(db, "wordpress");
    conn.close().await.unwrap();

    // The administrative account now takes the configured password only.
    let root = |password: Option<&str>| {
        let mut options = MySqlConnectOptions::new()
            .socket(&config.socket)
            .username("root")
            .disable_statement_logging();
        if let Some(password) = password {
            options = options.password(password);
        }
        options
    };
    assert!(
        root(None).connect().await.is_err(),
        "root logged in without a password"
    );
    assert!(
        root(Some("not-the-password")).connect().await.is_err(),
        "root logged in with a wrong password"
    );
    let mut admin = root(Some("rootpw123"))
        .connect()
        .await
        .expect("root cannot log in with the configured password");

    let grants: Vec<String> = sqlx::query("SHOW GRANTS FOR 'wpuser'@'%'")
        .fetch_all(&mut admin)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get(0))
        .collect();
    assert!(
        grants
            .iter()
            .any(|g| g.contains("ALL PRIVILEGES ON `wordpress`.*")),
        "unexpected grants: {grants:?}"
    );
    admin.close().await.unwrap();

    engine.shutdown(handle).await.unwrap();

    let again = Bootstrap::new(config.clone(), MariaDbEngine::from_config(&config));
    assert_eq!(
        again.run().await.unwrap(),
        BootstrapOutcome::AlreadyInitialized
    );
}
