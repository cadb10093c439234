// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! `docker compose` and `docker` invocations.

use std::path::PathBuf;

use crate::config::{HostLayout, StackConfig};
use crate::shell::Invocation;

/// Builds `docker compose` invocations for one project.
#[derive(Debug, Clone)]
pub struct Compose {
    project: String,
    file: PathBuf,
    env_file: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl Compose {
    /// Compose wrapper for the configured project.
    ///
    /// The env file is passed only when it exists. `DOMAIN_NAME` and
    /// `DATA_ROOT` are exported for interpolation in the service file.
    pub fn new(config: &StackConfig, layout: &HostLayout) -> Self {
        Self {
            project: config.project.clone(),
            file: config.compose_file.clone(),
            env_file: config
                .env_file
                .is_file()
                .then(|| config.env_file.clone()),
            envs: vec![
                ("DOMAIN_NAME".to_string(), config.domain.clone()),
                (
                    "DATA_ROOT".to_string(),
                    layout.data_root.display().to_string(),
                ),
            ],
        }
    }

    /// `docker compose <global options> <args>`.
    pub fn command<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inv = Invocation::new("docker")
            .args(["compose", "--project-name"])
            .arg(self.project.as_str())
            .arg("-f")
            .arg(self.file.display().to_string());
        if let Some(env_file) = &self.env_file {
            inv = inv.arg("--env-file").arg(env_file.display().to_string());
        }
        for (key, value) in &self.envs {
            inv = inv.env(key.as_str(), value.as_str());
        }
        inv.args(args)
    }

    /// Build all images.
    pub fn build(&self) -> Invocation {
        self.command(["build"])
    }

    /// Start all services detached.
    pub fn up(&self) -> Invocation {
        self.command(["up", "-d"])
    }

    /// Stop and remove the services and their volumes.
    pub fn down(&self) -> Invocation {
        self.command(["down", "--volumes", "--remove-orphans"])
    }

    /// Service status as JSON.
    pub fn ps(&self) -> Invocation {
        self.command(["ps", "--all", "--format", "json"]).captured()
    }

    /// Run `program` inside a running service, without a TTY.
    pub fn exec<I, S>(&self, service: &str, program: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command(["exec", "-T", service]).args(program).captured()
    }
}

/// `docker <args>`, captured.
pub fn docker<I, S>(args: I) -> Invocation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Invocation::new("docker").args(args).captured()
}
