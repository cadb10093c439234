// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the database bootstrap.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use wpstack_core::CredentialPaths;
use wpstack_core::retry::RetryPolicy;

/// Bootstrap configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Data directory inspected for the marker and initialized on first boot
    pub data_dir: PathBuf,
    /// Directory holding the socket and pid file
    pub run_dir: PathBuf,
    /// Log directory
    pub log_dir: PathBuf,
    /// Local socket used for readiness probes and provisioning
    pub socket: PathBuf,
    /// TCP port of the server
    pub port: u16,
    /// Account owning the directories; `None` skips the ownership step
    pub service_user: Option<String>,
    /// Application database name
    pub db_name: String,
    /// Credential file locations
    pub credentials: CredentialPaths,
    /// Engine initialization routine
    pub install_bin: String,
    /// Engine server binary
    pub server_bin: String,
    /// Readiness probe policy
    pub readiness: RetryPolicy,
    /// Grace period for the temporary engine to exit after SIGTERM
    pub shutdown_timeout: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        let run_dir = PathBuf::from("/run/mysqld");
        Self {
            data_dir: PathBuf::from("/var/lib/mysql"),
            socket: run_dir.join("mysqld.sock"),
            run_dir,
            log_dir: PathBuf::from("/var/log/mysql"),
            port: 3306,
            service_user: Some("mysql".to_string()),
            db_name: "wordpress".to_string(),
            credentials: CredentialPaths::default(),
            install_bin: "mariadb-install-db".to_string(),
            server_bin: "mariadbd".to_string(),
            readiness: RetryPolicy::default(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl BootstrapConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let path = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);

        let run_dir = path("DB_RUN_DIR", defaults.run_dir);
        let socket = path("DB_SOCKET", run_dir.join("mysqld.sock"));

        let service_user = match lookup("DB_SERVICE_USER") {
            Some(user) if user.trim().is_empty() => None,
            Some(user) => Some(user),
            None => defaults.service_user,
        };

        let db_name = lookup("DB_NAME").unwrap_or(defaults.db_name);
        if db_name.is_empty() {
            return Err(ConfigError::Empty("DB_NAME"));
        }

        let attempts: usize = parse_var(&lookup, "DB_READY_ATTEMPTS", 30)?;
        if attempts == 0 {
            return Err(ConfigError::InvalidValue {
                var: "DB_READY_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            data_dir: path("DB_DATA_DIR", defaults.data_dir),
            run_dir,
            log_dir: path("DB_LOG_DIR", defaults.log_dir),
            socket,
            port: parse_var(&lookup, "DB_PORT", defaults.port)?,
            service_user,
            db_name,
            credentials: CredentialPaths {
                root_password: path("DB_ROOT_PASSWORD_FILE", defaults.credentials.root_password),
                user: path("DB_USER_FILE", defaults.credentials.user),
                user_password: path("DB_PASSWORD_FILE", defaults.credentials.user_password),
            },
            install_bin: lookup("DB_INSTALL_BIN").unwrap_or(defaults.install_bin),
            server_bin: lookup("DB_SERVER_BIN").unwrap_or(defaults.server_bin),
            readiness: RetryPolicy::with_attempts(attempts),
            shutdown_timeout: Duration::from_secs(parse_var(
                &lookup,
                "DB_SHUTDOWN_TIMEOUT_SECS",
                30,
            )?),
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable holds a value that cannot be parsed.
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
    /// A variable that must not be empty is empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}
