// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! wpstack ctl - operator task runner
//!
//! Drives a wpstack deployment from the host: image builds, service
//! lifecycle, host-wide resets, first-time host setup (data directories and
//! a self-signed certificate), smoke tests and status reporting.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Command-line/environment configuration and host directory layout |
//! | [`shell`] | External command execution seam (`SystemShell`, `RecordingShell`) |
//! | [`compose`] | `docker compose` and `docker` invocations |
//! | [`certs`] | Self-signed certificate generation and inspection |
//! | [`smoke`] | Database, HTTPS and redirect checks |
//! | [`status`] | Parsing and rendering of `docker compose ps` |
//! | [`tasks`] | The named operator tasks |

#![deny(missing_docs)]

/// Self-signed certificate generation.
pub mod certs;

/// `docker compose` command construction.
pub mod compose;

/// Operator configuration.
pub mod config;

/// Error types for the task runner.
pub mod error;

/// External command execution.
pub mod shell;

/// Smoke tests against a running deployment.
pub mod smoke;

/// Service status reporting.
pub mod status;

/// Operator tasks.
pub mod tasks;

pub use config::{HostLayout, StackConfig};
pub use error::{CtlError, Result};
pub use tasks::Tasks;
