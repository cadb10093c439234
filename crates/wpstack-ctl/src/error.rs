// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the task runner.

use thiserror::Error;

/// Task runner errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CtlError {
    /// No data root given and `HOME` is not set.
    #[error("HOME is not set; pass --data-root or set WPSTACK_DATA_ROOT")]
    NoDataRoot,

    /// An external command failed.
    #[error(transparent)]
    Shell(#[from] crate::shell::ShellError),

    /// Certificate generation or inspection failed.
    #[error("Certificate error: {0}")]
    Cert(#[from] crate::certs::CertError),

    /// Host directory ownership could not be fixed.
    #[error("Ownership error: {0}")]
    Ownership(#[from] wpstack_core::ownership::OwnershipError),

    /// `docker compose ps` output could not be parsed.
    #[error("Failed to parse service status: {0}")]
    Status(#[from] serde_json::Error),

    /// One or more smoke checks failed.
    #[error("{failed} of {total} smoke checks failed")]
    SmokeFailed {
        /// Failed checks.
        failed: usize,
        /// Checks run.
        total: usize,
    },

    /// The data directories hold files owned by the service accounts.
    #[error(
        "Permission denied removing {path}: the containers own its contents; rerun with sudo"
    )]
    NeedsPrivileges {
        /// Directory that could not be removed.
        path: std::path::PathBuf,
    },

    /// I/O operation failed.
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result type using the task runner error.
pub type Result<T> = std::result::Result<T, CtlError>;
