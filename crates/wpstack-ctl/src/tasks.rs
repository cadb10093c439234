// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operator tasks.
//!
//! Lifecycle tasks fail on the first failing command. The host-wide reset
//! (`clean`) is the exception: it must be safe to run on a host with nothing
//! left to remove, so every step logs its failure and carries on.

use std::path::PathBuf;

use tracing::{info, warn};
use wpstack_core::ownership::{ServiceAccount, claim_dir, hand_over};

use crate::certs::{self, CertificateInfo, CertificateRequest};
use crate::compose::{Compose, docker};
use crate::config::{HostLayout, StackConfig};
use crate::error::{CtlError, Result};
use crate::shell::{Invocation, Shell};
use crate::smoke::{self, SmokeOptions, SmokeReport};
use crate::status::{self, ServiceStatus};

/// What `setup` found and did.
#[derive(Debug, Clone)]
pub struct SetupReport {
    /// Volume directories.
    pub directories: Vec<PathBuf>,
    /// Volume directories this run created.
    pub created: Vec<PathBuf>,
    /// Whether a new certificate was generated.
    pub certificate_generated: bool,
    /// The certificate now in place.
    pub certificate: CertificateInfo,
    /// Secret files that do not exist yet.
    pub missing_secrets: Vec<PathBuf>,
}

/// What `clean` could not do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Steps that failed and were skipped.
    pub skipped: Vec<String>,
}

/// Runs the named tasks through a [`Shell`].
pub struct Tasks<S: Shell> {
    config: StackConfig,
    layout: HostLayout,
    compose: Compose,
    shell: S,
}

impl<S: Shell> Tasks<S> {
    /// Create the task runner.
    pub fn new(config: StackConfig, shell: S) -> Result<Self> {
        let layout = config.layout()?;
        let compose = Compose::new(&config, &layout);
        Ok(Self {
            config,
            layout,
            compose,
            shell,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Get the host layout.
    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    /// Get the shell.
    pub fn shell(&self) -> &S {
        &self.shell
    }

    /// Build all images.
    pub async fn build(&self) -> Result<()> {
        self.shell.check(&self.compose.build()).await?;
        Ok(())
    }

    /// Start all services detached.
    pub async fn up(&self) -> Result<()> {
        self.shell.check(&self.compose.up()).await?;
        info!(url = %self.config.access_url(), "Services started");
        Ok(())
    }

    /// Setup, build and start.
    pub async fn all(&self) -> Result<SetupReport> {
        let report = self.setup(false).await?;
        self.build().await?;
        self.up().await?;
        Ok(report)
    }

    /// Stop and remove the services and their volumes.
    pub async fn down(&self) -> Result<()> {
        self.shell.check(&self.compose.down()).await?;
        Ok(())
    }

    /// Full system reset: every container, image, volume and network on the host.
    ///
    /// Never fails; failing steps are reported in the returned [`CleanReport`].
    pub async fn clean(&self) -> CleanReport {
        let mut report = CleanReport::default();

        self.swallow(&mut report, self.compose.down()).await;

        let steps: [(&[&str], &[&str]); 4] = [
            (&["ps", "-qa"], &["rm", "-f"]),
            (&["images", "-qa"], &["rmi", "-f"]),
            (&["volume", "ls", "-q"], &["volume", "rm", "-f"]),
            (&["network", "ls", "-q", "--filter", "type=custom"], &["network", "rm"]),
        ];

        for (list, remove) in steps {
            let Some(ids) = self.swallow(&mut report, docker(list.iter().copied())).await else {
                continue;
            };
            let ids: Vec<&str> = ids.split_whitespace().collect();
            if ids.is_empty() {
                continue;
            }
            let inv = docker(remove.iter().copied()).args(ids.iter().copied());
            self.swallow(&mut report, inv).await;
        }

        if report.skipped.is_empty() {
            info!("Host reset complete");
        } else {
            warn!(skipped = report.skipped.len(), "Host reset finished with skipped steps");
        }
        report
    }

    /// [`clean`](Self::clean), then delete the host volume directories.
    pub async fn fclean(&self) -> Result<CleanReport> {
        let report = self.clean().await;
        for dir in self.layout.volume_dirs() {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => info!(dir = %dir.display(), "Removed data directory"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                    return Err(CtlError::NeedsPrivileges {
                        path: dir.to_path_buf(),
                    });
                }
                Err(source) => {
                    return Err(CtlError::Io {
                        path: dir.to_path_buf(),
                        source,
                    });
                }
            }
        }
        Ok(report)
    }

    /// [`fclean`](Self::fclean), then [`all`](Self::all).
    pub async fn re(&self) -> Result<SetupReport> {
        self.fclean().await?;
        self.all().await
    }

    /// Prepare the host: volume directories, certificate, secret check.
    ///
    /// Missing volume directories are created for the invoking user. Existing
    /// ones are left as they are: once the services ran, their contents belong
    /// to the container accounts. An existing certificate is kept unless
    /// `force` is set.
    pub async fn setup(&self, force: bool) -> Result<SetupReport> {
        let account = ServiceAccount::invoking();
        let mut directories = Vec::new();
        let mut created = Vec::new();
        for dir in self.layout.volume_dirs() {
            if claim_dir(dir, account)? {
                info!(dir = %dir.display(), "Created data directory");
                created.push(dir.to_path_buf());
            }
            directories.push(dir.to_path_buf());
        }

        let certs_dir = &self.layout.certs;
        let certificate_generated = force || !certs::pair_exists(certs_dir);
        if certificate_generated {
            let pair = certs::generate(&CertificateRequest::new(self.config.domain.as_str()))?;
            certs::write_pair(certs_dir, &pair)?;
            // Files written under sudo still belong to the operator.
            for file in [certs::CERT_FILE, certs::KEY_FILE] {
                hand_over(&certs_dir.join(file), account)?;
            }
        }
        let certificate = certs::inspect_dir(certs_dir)?;
        if certificate.common_name != self.config.domain {
            warn!(
                certificate = %certificate.common_name,
                domain = %self.config.domain,
                "Existing certificate was issued for another domain; rerun setup with --force"
            );
        }

        let missing_secrets: Vec<PathBuf> = self
            .config
            .secret_paths()
            .into_iter()
            .filter(|p| !p.is_file())
            .collect();
        for path in &missing_secrets {
            warn!(path = %path.display(), "Secret file missing");
        }

        Ok(SetupReport {
            directories,
            created,
            certificate_generated,
            certificate,
            missing_secrets,
        })
    }

    /// Run the smoke tests.
    ///
    /// The report is returned whatever the outcome; see
    /// [`SmokeReport::ensure_passed`].
    pub async fn test(&self, options: &SmokeOptions) -> SmokeReport {
        smoke::run(&self.shell, &self.compose, &self.config.domain, options).await
    }

    /// Current state of the services.
    pub async fn status(&self) -> Result<Vec<ServiceStatus>> {
        let output = self.shell.check(&self.compose.ps()).await?;
        Ok(status::parse_ps(&output.stdout)?)
    }

    async fn swallow(&self, report: &mut CleanReport, inv: Invocation) -> Option<String> {
        match self.shell.check(&inv).await {
            Ok(output) => Some(output.stdout),
            Err(e) => {
                warn!(command = %inv, error = %e, "Ignoring failed cleanup step");
                report.skipped.push(inv.to_string());
                None
            }
        }
    }
}
