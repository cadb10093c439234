// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! MariaDB engine implementation.
//!
//! Drives `mariadb-install-db` and `mariadbd` as child processes. Probes and
//! provisioning go over the local socket as `root`, which the installer
//! leaves password-less (`--auth-root-authentication-method=normal`) until
//! the first provisioning statement sets the administrative password.
//!
//! Credentials only ever travel inside the SQL session: they are never put
//! on a command line or into a child's environment, where `ps` or
//! `/proc/<pid>/environ` would expose them.

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};
use wpstack_core::handoff;

use crate::config::BootstrapConfig;
use crate::engine::{Engine, EngineError, Result};
use crate::provision::ProvisionPlan;

/// Number of stderr lines kept in [`EngineError::CommandFailed`].
const STDERR_TAIL_LINES: usize = 20;

/// MariaDB engine configuration.
#[derive(Debug, Clone)]
pub struct MariaDbConfig {
    /// Initialization routine
    pub install_bin: String,
    /// Server binary
    pub server_bin: String,
    /// Data directory
    pub data_dir: PathBuf,
    /// Local socket
    pub socket: PathBuf,
    /// TCP port
    pub port: u16,
    /// Account the server drops privileges to
    pub service_user: Option<String>,
    /// Grace period after SIGTERM before the temporary server is killed
    pub shutdown_timeout: Duration,
}

impl MariaDbConfig {
    /// Derive the engine configuration from the bootstrap configuration.
    pub fn from_bootstrap(config: &BootstrapConfig) -> Self {
        Self {
            install_bin: config.install_bin.clone(),
            server_bin: config.server_bin.clone(),
            data_dir: config.data_dir.clone(),
            socket: config.socket.clone(),
            port: config.port,
            service_user: config.service_user.clone(),
            shutdown_timeout: config.shutdown_timeout,
        }
    }
}

/// A temporary background `mariadbd`.
#[derive(Debug)]
pub struct MariaDbHandle {
    child: Child,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
}

impl MariaDbHandle {
    /// PID of the server process, captured at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// When the server was started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// MariaDB engine.
pub struct MariaDbEngine {
    config: MariaDbConfig,
}

impl MariaDbEngine {
    /// Create a new engine.
    pub fn new(config: MariaDbConfig) -> Self {
        Self { config }
    }

    /// Create from the bootstrap configuration.
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self::new(MariaDbConfig::from_bootstrap(config))
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &MariaDbConfig {
        &self.config
    }

    /// Arguments of the initialization routine.
    pub fn install_args(&self, data_dir: &Path) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(user) = &self.config.service_user {
            args.push(format!("--user={}", user));
        }
        args.push(format!("--datadir={}", data_dir.display()));
        args.push("--skip-test-db".to_string());
        args.push("--auth-root-authentication-method=normal".to_string());
        args
    }

    /// Arguments of the server, shared by the temporary and the foreground run.
    pub fn server_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(user) = &self.config.service_user {
            args.push(format!("--user={}", user));
        }
        args.push(format!("--datadir={}", self.config.data_dir.display()));
        args.push(format!("--socket={}", self.config.socket.display()));
        args.push(format!("--port={}", self.config.port));
        args.push("--bind-address=0.0.0.0".to_string());
        args
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        // Statement logging would print the provisioning SQL, passwords included.
        MySqlConnectOptions::new()
            .socket(&self.config.socket)
            .username("root")
            .disable_statement_logging()
    }

    async fn connect(&self) -> Result<MySqlConnection> {
        self.connect_options()
            .connect()
            .await
            .map_err(EngineError::Connect)
    }
}

/// Shell-style exit code: the code itself, or 128 + signal number.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl Engine for MariaDbEngine {
    type Handle = MariaDbHandle;

    fn engine_type(&self) -> &'static str {
        "mariadb"
    }

    async fn initialize(&self, data_dir: &Path) -> Result<()> {
        let program = &self.config.install_bin;
        info!(program = %program, data_dir = %data_dir.display(), "Initializing data directory");

        let output = Command::new(program)
            .args(self.install_args(data_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            let exit_code = exit_code(output.status);
            let stderr = stderr_tail(&output.stderr);
            error!(program = %program, exit_code = exit_code, stderr = %stderr, "Initialization failed");
            return Err(EngineError::CommandFailed {
                program: program.clone(),
                exit_code,
                stderr,
            });
        }

        info!(data_dir = %data_dir.display(), "Data directory initialized");
        Ok(())
    }

    async fn start_background(&self) -> Result<MariaDbHandle> {
        if let Some(dir) = self.config.socket.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let program = &self.config.server_bin;
        let child = Command::new(program)
            .args(self.server_args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: program.clone(),
                source,
            })?;

        let pid = child.id();
        info!(program = %program, pid = ?pid, "Started temporary engine");

        Ok(MariaDbHandle {
            child,
            pid,
            started_at: Utc::now(),
        })
    }

    async fn probe(&self, _handle: &mut MariaDbHandle) -> Result<()> {
        let mut conn = self.connect().await?;
        conn.ping().await.map_err(EngineError::Connect)?;
        let _ = conn.close().await;
        Ok(())
    }

    fn has_exited(&self, handle: &mut MariaDbHandle) -> Result<Option<i32>> {
        Ok(handle.child.try_wait()?.map(exit_code))
    }

    async fn apply(&self, _handle: &mut MariaDbHandle, plan: &ProvisionPlan) -> Result<()> {
        let mut conn = self.connect().await?;

        for statement in plan.statements() {
            sqlx::Executor::execute(&mut conn, sqlx::raw_sql(&statement.sql))
                .await
                .map_err(|source| EngineError::Statement {
                    label: statement.label,
                    source,
                })?;
            debug!(statement = statement.label, "Applied provisioning statement");
        }

        // The session may already reject a clean close after the root password change.
        if let Err(e) = conn.close().await {
            debug!(error = %e, "Closing provisioning session failed");
        }

        info!(
            database = %plan.database(),
            statements = plan.statements().len(),
            "Provisioning statements applied"
        );
        Ok(())
    }

    async fn shutdown(&self, mut handle: MariaDbHandle) -> Result<()> {
        let uptime_ms = (Utc::now() - handle.started_at).num_milliseconds();

        if let Some(status) = handle.child.try_wait()? {
            return check_stopped(&self.config.server_bin, status, uptime_ms);
        }

        if let Some(pid) = handle.child.id() {
            match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => debug!(pid = pid, "Sent SIGTERM to temporary engine"),
                Err(nix::errno::Errno::ESRCH) => debug!(pid = pid, "Temporary engine already gone"),
                Err(e) => return Err(e.into()),
            }
        }

        match tokio::time::timeout(self.config.shutdown_timeout, handle.child.wait()).await {
            Ok(status) => check_stopped(&self.config.server_bin, status?, uptime_ms),
            Err(_) => {
                warn!(
                    pid = ?handle.pid,
                    timeout_secs = self.config.shutdown_timeout.as_secs_f64(),
                    "Temporary engine ignored SIGTERM, killing"
                );
                handle.child.kill().await?;
                Err(EngineError::ShutdownTimeout(self.config.shutdown_timeout))
            }
        }
    }

    fn serve_foreground(&self) -> EngineError {
        let mut command = std::process::Command::new(&self.config.server_bin);
        command.args(self.server_args());
        handoff::exec_command(command).into()
    }
}

fn check_stopped(program: &str, status: ExitStatus, uptime_ms: i64) -> Result<()> {
    if status.success() {
        info!(uptime_ms = uptime_ms, "Temporary engine stopped");
        Ok(())
    } else {
        Err(EngineError::CommandFailed {
            program: program.to_string(),
            exit_code: exit_code(status),
            stderr: String::new(),
        })
    }
}
