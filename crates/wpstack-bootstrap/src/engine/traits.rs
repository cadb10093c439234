// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine trait definitions.
//!
//! Defines the abstract interface the bootstrap procedure drives.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use wpstack_core::handoff::HandoffError;

use crate::provision::ProvisionPlan;

/// Errors from engine operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// An engine binary could not be started.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An engine command exited unsuccessfully.
    #[error("{program} exited with code {exit_code}: {stderr}")]
    CommandFailed {
        /// Program that failed.
        program: String,
        /// Exit code.
        exit_code: i32,
        /// Tail of the standard error output.
        stderr: String,
    },

    /// Connecting to the engine failed.
    #[error("Connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    /// A provisioning statement was rejected.
    #[error("Statement '{label}' failed: {source}")]
    Statement {
        /// Label of the rejected statement.
        label: &'static str,
        /// Error reported by the engine.
        source: sqlx::Error,
    },

    /// The temporary engine did not exit within its grace period and was killed.
    #[error("Engine did not stop within {0:?} and was killed")]
    ShutdownTimeout(Duration),

    /// Sending a signal to the engine failed.
    #[error("Failed to signal engine: {0}")]
    Signal(#[from] nix::errno::Errno),

    /// Replacing the process with the foreground engine failed.
    #[error(transparent)]
    Handoff(#[from] HandoffError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Trait for database engines.
///
/// An engine knows how to initialize a data directory, run a temporary
/// server for provisioning, and finally become the long-lived server
/// process. Engines do not decide *whether* to provision; the
/// [`Bootstrap`](crate::procedure::Bootstrap) procedure does.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Handle for a temporary background server.
    type Handle: Send;

    /// Engine type identifier (e.g., "mariadb", "mock").
    fn engine_type(&self) -> &'static str;

    /// Run the engine's initialization routine against an empty data directory,
    /// without test databases.
    async fn initialize(&self, data_dir: &Path) -> Result<()>;

    /// Start a temporary server in the background, listening on all interfaces.
    async fn start_background(&self) -> Result<Self::Handle>;

    /// One lightweight connection attempt against the temporary server.
    async fn probe(&self, handle: &mut Self::Handle) -> Result<()>;

    /// Exit code of the temporary server if it has already exited.
    fn has_exited(&self, handle: &mut Self::Handle) -> Result<Option<i32>>;

    /// Run all statements of `plan`, in order, in one administrative session.
    async fn apply(&self, handle: &mut Self::Handle, plan: &ProvisionPlan) -> Result<()>;

    /// Stop the temporary server and wait for it to exit.
    async fn shutdown(&self, handle: Self::Handle) -> Result<()>;

    /// Become the steady-state server process.
    ///
    /// Returns only if the handoff failed.
    fn serve_foreground(&self) -> EngineError;
}
