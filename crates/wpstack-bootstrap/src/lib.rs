// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! wpstack Bootstrap - Database First-Boot Provisioning
//!
//! Brings a database engine from an uninitialized data directory to a running
//! server with an application database, an application user and a known
//! administrative password, exactly once per data volume, then hands off to
//! the steady-state server process.
//!
//! # Procedure
//!
//! ```text
//!   fix ownership of data/run/log dirs          (every start)
//!              │
//!              ▼
//!   <data_dir>/mysql exists? ──── yes ───────────────────────┐
//!              │ no                                          │
//!              ▼                                             │
//!   initialize data dir (no test database)                   │
//!              │                                             │
//!              ▼                                             │
//!   start temporary engine in background                     │
//!              │                                             │
//!              ▼                                             │
//!   probe socket with bounded backoff ── engine exited ──► abort
//!              │ ready                                       │
//!              ▼                                             │
//!   one admin session: root password, database,              │
//!   user, grant, flush privileges ─────── failure ────────► abort
//!              │                                             │
//!              ▼                                             │
//!   SIGTERM temporary engine, wait for exit                  │
//!              │                                             │
//!              ▼                                             ▼
//!   exec engine as the foreground process (same PID)
//! ```
//!
//! Every abort stops the temporary engine and removes what initialization
//! wrote, so a restarted container retries from a clean volume instead of
//! skipping provisioning because the marker already exists.
//!
//! # Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DB_DATA_DIR` | `/var/lib/mysql` | Data directory |
//! | `DB_RUN_DIR` | `/run/mysqld` | Socket and pid directory |
//! | `DB_LOG_DIR` | `/var/log/mysql` | Log directory |
//! | `DB_SOCKET` | `$DB_RUN_DIR/mysqld.sock` | Local socket |
//! | `DB_PORT` | `3306` | Listening port |
//! | `DB_SERVICE_USER` | `mysql` | Owner of the directories (empty: skip) |
//! | `DB_NAME` | `wordpress` | Application database |
//! | `DB_ROOT_PASSWORD_FILE` | `/run/secrets/db_root_password` | Administrative password |
//! | `DB_USER_FILE` | `/run/secrets/db_user` | Application user name |
//! | `DB_PASSWORD_FILE` | `/run/secrets/db_password` | Application user password |
//! | `DB_INSTALL_BIN` | `mariadb-install-db` | Initialization routine |
//! | `DB_SERVER_BIN` | `mariadbd` | Server binary |
//! | `DB_READY_ATTEMPTS` | `30` | Readiness probe budget |
//! | `DB_SHUTDOWN_TIMEOUT_SECS` | `30` | Grace period before SIGKILL |

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Data directory inspection.
pub mod datadir;

/// Database engine backends.
pub mod engine;

/// Error types for the bootstrap procedure.
pub mod error;

/// The bootstrap procedure.
pub mod procedure;

/// Provisioning statements.
pub mod provision;

/// Engine readiness polling.
pub mod readiness;

pub use config::BootstrapConfig;
pub use error::{BootstrapError, Result};
pub use procedure::{Bootstrap, BootstrapOutcome};
