// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The bootstrap procedure.

use tracing::{debug, error, info, warn};
use wpstack_core::Credentials;
use wpstack_core::ownership::{ServiceAccount, ensure_owned};

use crate::config::BootstrapConfig;
use crate::datadir::{self, Snapshot};
use crate::engine::Engine;
use crate::error::Result;
use crate::provision::ProvisionPlan;
use crate::readiness::wait_until_ready;

/// What a bootstrap run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The data directory was already initialized; nothing was provisioned.
    AlreadyInitialized,
    /// The data directory was initialized and provisioned in this run.
    Provisioned,
}

/// Drives an [`Engine`] through first-boot provisioning.
pub struct Bootstrap<E: Engine> {
    config: BootstrapConfig,
    engine: E,
}

impl<E: Engine> Bootstrap<E> {
    /// Create a new bootstrap.
    pub fn new(config: BootstrapConfig, engine: E) -> Self {
        Self { config, engine }
    }

    /// Get the configuration.
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Get the engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Hand the data, run and log directories to the service account.
    ///
    /// Runs on every start, initialized or not.
    pub fn prepare_directories(&self) -> Result<()> {
        let Some(user) = &self.config.service_user else {
            debug!("No service user configured, leaving directory ownership alone");
            return Ok(());
        };

        let account = ServiceAccount::lookup(user)?;
        for dir in [
            &self.config.data_dir,
            &self.config.run_dir,
            &self.config.log_dir,
        ] {
            let changed = ensure_owned(dir, account)?;
            if changed > 0 {
                info!(dir = %dir.display(), user = %user, changed = changed, "Fixed directory ownership");
            }
        }
        Ok(())
    }

    /// Run the procedure up to, but not including, the foreground handoff.
    ///
    /// On failure after initialization started, the temporary engine is
    /// stopped and the entries initialization added to the data directory
    /// are removed, so the next start provisions again.
    pub async fn run(&self) -> Result<BootstrapOutcome> {
        let data_dir = &self.config.data_dir;
        info!(
            engine = self.engine.engine_type(),
            data_dir = %data_dir.display(),
            "Starting database bootstrap"
        );

        self.prepare_directories()?;

        if datadir::is_initialized(data_dir) {
            info!(data_dir = %data_dir.display(), "Data directory already initialized, skipping provisioning");
            return Ok(BootstrapOutcome::AlreadyInitialized);
        }

        let credentials = Credentials::load(&self.config.credentials)?;
        let plan = ProvisionPlan::new(&self.config.db_name, &credentials)?;
        drop(credentials);

        let snapshot = Snapshot::take(data_dir)?;

        match self.provision(&plan).await {
            Ok(()) => {
                info!(database = %plan.database(), "Database provisioned");
                Ok(BootstrapOutcome::Provisioned)
            }
            Err(e) => {
                error!(error = %e, "Provisioning failed, rolling back data directory");
                match snapshot.restore(data_dir) {
                    Ok(removed) => warn!(removed = removed, "Data directory rolled back"),
                    Err(re) => error!(error = %re, "Data directory rollback failed"),
                }
                Err(e)
            }
        }
    }

    async fn provision(&self, plan: &ProvisionPlan) -> Result<()> {
        self.engine.initialize(&self.config.data_dir).await?;

        let mut handle = self.engine.start_background().await?;
        let result = self.configure(&mut handle, plan).await;
        let stopped = self.engine.shutdown(handle).await;

        match (result, stopped) {
            (Ok(()), stopped) => Ok(stopped?),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(stop_err)) => {
                warn!(error = %stop_err, "Failed to stop temporary engine");
                Err(e)
            }
        }
    }

    async fn configure(&self, handle: &mut E::Handle, plan: &ProvisionPlan) -> Result<()> {
        wait_until_ready(&self.engine, handle, self.config.readiness).await?;
        self.engine.apply(handle, plan).await?;
        Ok(())
    }
}
