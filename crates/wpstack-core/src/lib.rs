// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! wpstack core - building blocks shared by the service entrypoints.
//!
//! The three services of a wpstack deployment (database, application, edge)
//! each start through a small Rust entrypoint. This crate holds the pieces
//! they have in common:
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`secrets`] | Read credential material from mounted secret files |
//! | [`template`] | `${NAME}` substitution into configuration templates |
//! | [`ownership`] | Ownership fix-up of service directories, claiming new host directories |
//! | [`retry`] | Bounded exponential backoff and TCP readiness probes |
//! | [`handoff`] | Replace the entrypoint with the long-lived service process |
//!
//! Secrets never travel through environment variables. Services receive the
//! *path* of a secret file (`DB_PASSWORD_FILE=/run/secrets/db_password`) and
//! the value is read only into memory or into a rendered template.

#![deny(missing_docs)]

/// Process image replacement for the steady-state service process.
pub mod handoff;

/// Directory ownership for service accounts.
pub mod ownership;

/// Retry policy and readiness probes.
pub mod retry;

/// Secret file loading and redacted secret values.
pub mod secrets;

/// Configuration template rendering.
pub mod template;

pub use secrets::{CredentialPaths, Credentials, SecretValue};
pub use template::Variables;
