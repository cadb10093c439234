// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database bootstrap
//!
//! Entrypoint of the database container. Provisions the data volume on
//! first boot, then replaces itself with the database server.
//!
//! Usage:
//!   db-bootstrap
//!
//! Environment variables:
//!   DB_DATA_DIR            - Data directory (default: /var/lib/mysql)
//!   DB_NAME                - Application database (default: wordpress)
//!   DB_ROOT_PASSWORD_FILE  - Administrative password file (default: /run/secrets/db_root_password)
//!   DB_USER_FILE           - Application user file (default: /run/secrets/db_user)
//!   DB_PASSWORD_FILE       - Application password file (default: /run/secrets/db_password)
//!   DB_READY_ATTEMPTS      - Readiness probe budget (default: 30)
//!   RUST_LOG               - Log level (default: db_bootstrap=info,wpstack_bootstrap=info)

use tracing::{info, warn};
use wpstack_bootstrap::engine::{Engine, MariaDbEngine};
use wpstack_bootstrap::{Bootstrap, BootstrapConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "db_bootstrap=info,wpstack_bootstrap=info".into()),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        warn!("Failed to load .env file: {}", e);
    }

    let config = BootstrapConfig::from_env()?;
    info!(
        data_dir = %config.data_dir.display(),
        socket = %config.socket.display(),
        port = config.port,
        "Loaded configuration"
    );

    let engine = MariaDbEngine::from_config(&config);
    let bootstrap = Bootstrap::new(config, engine);
    let outcome = bootstrap.run().await?;
    info!(outcome = ?outcome, "Handing off to database server");

    Err(bootstrap.engine().serve_foreground().into())
}
