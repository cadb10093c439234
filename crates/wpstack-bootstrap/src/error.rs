// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the database bootstrap.

use thiserror::Error;

/// Bootstrap errors. Every variant aborts the procedure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A credential file could not be read.
    #[error("Credential error: {0}")]
    Secret(#[from] wpstack_core::secrets::SecretError),

    /// Directory ownership could not be fixed.
    #[error("Ownership error: {0}")]
    Ownership(#[from] wpstack_core::ownership::OwnershipError),

    /// Credentials or database name are not usable for provisioning.
    #[error("Provisioning plan error: {0}")]
    Plan(#[from] crate::provision::ProvisionError),

    /// The engine failed an operation.
    #[error("Engine error: {0}")]
    Engine(#[from] crate::engine::EngineError),

    /// The temporary engine exited before it accepted connections.
    #[error("Engine exited with code {code} before becoming ready")]
    EngineExited {
        /// Exit code (128 + signal number when killed by a signal).
        code: i32,
    },

    /// The temporary engine did not accept connections within the probe budget.
    #[error("Engine not ready after {attempts} attempts: {last_error}")]
    NotReady {
        /// Number of probes made.
        attempts: usize,
        /// Error of the last probe.
        last_error: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type using the bootstrap error.
pub type Result<T> = std::result::Result<T, BootstrapError>;
