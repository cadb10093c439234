// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operator configuration.
//!
//! Every flag falls back to an environment variable, so the same settings
//! can live in a `.env` file next to the repository.

use std::path::{Path, PathBuf};

use clap::Args;

use crate::error::{CtlError, Result};

/// Secret files the services expect, relative to the secrets directory.
pub const SECRET_FILES: [&str; 3] = ["db_root_password.txt", "db_user.txt", "db_password.txt"];

/// Stack-wide settings shared by every task.
#[derive(Debug, Clone, Args)]
pub struct StackConfig {
    /// Compose service file.
    #[arg(
        long,
        env = "WPSTACK_COMPOSE_FILE",
        default_value = "deploy/docker-compose.yml",
        global = true
    )]
    pub compose_file: PathBuf,

    /// Environment file handed to compose when it exists.
    #[arg(long, env = "WPSTACK_ENV_FILE", default_value = "deploy/.env", global = true)]
    pub env_file: PathBuf,

    /// Compose project name.
    #[arg(long, env = "WPSTACK_PROJECT", default_value = "wpstack", global = true)]
    pub project: String,

    /// Public domain name, used for the certificate and the server block.
    #[arg(
        long,
        env = "DOMAIN_NAME",
        default_value = "wpstack.local",
        value_parser = parse_domain,
        global = true
    )]
    pub domain: String,

    /// Host directory holding the persistent volumes [default: $HOME/data].
    #[arg(long, env = "WPSTACK_DATA_ROOT", global = true)]
    pub data_root: Option<PathBuf>,

    /// Directory holding the secret files.
    #[arg(long, env = "WPSTACK_SECRETS_DIR", default_value = "secrets", global = true)]
    pub secrets_dir: PathBuf,
}

impl StackConfig {
    /// Configuration with every default, for the given data root.
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            compose_file: PathBuf::from("deploy/docker-compose.yml"),
            env_file: PathBuf::from("deploy/.env"),
            project: "wpstack".to_string(),
            domain: "wpstack.local".to_string(),
            data_root: Some(data_root.into()),
            secrets_dir: PathBuf::from("secrets"),
        }
    }

    /// Resolve the host directory layout.
    pub fn layout(&self) -> Result<HostLayout> {
        let root = match &self.data_root {
            Some(root) => root.clone(),
            None => std::env::var_os("HOME")
                .filter(|h| !h.is_empty())
                .map(|home| PathBuf::from(home).join("data"))
                .ok_or(CtlError::NoDataRoot)?,
        };
        Ok(HostLayout::new(root))
    }

    /// Paths of the three secret files.
    pub fn secret_paths(&self) -> Vec<PathBuf> {
        SECRET_FILES
            .iter()
            .map(|name| self.secrets_dir.join(name))
            .collect()
    }

    /// The URL operators open in a browser.
    pub fn access_url(&self) -> String {
        format!("https://{}", self.domain)
    }
}

/// Host-side persistent storage locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    /// Parent of all volumes.
    pub data_root: PathBuf,
    /// Database files.
    pub mariadb: PathBuf,
    /// Application files.
    pub wordpress: PathBuf,
    /// Certificate material, mounted read-only into the edge service.
    pub certs: PathBuf,
}

impl HostLayout {
    /// Layout under `data_root`.
    pub fn new(data_root: PathBuf) -> Self {
        Self {
            mariadb: data_root.join("mariadb"),
            wordpress: data_root.join("wordpress"),
            certs: data_root.join("certs"),
            data_root,
        }
    }

    /// The volume directories.
    pub fn volume_dirs(&self) -> [&Path; 3] {
        [&self.mariadb, &self.wordpress, &self.certs]
    }
}

fn parse_domain(raw: &str) -> std::result::Result<String, String> {
    let domain = raw.trim().trim_end_matches('.');
    if domain.is_empty() {
        return Err("domain must not be empty".to_string());
    }
    if domain.len() > 253 {
        return Err("domain is longer than 253 characters".to_string());
    }
    let valid_label = |label: &str| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if !domain.split('.').all(valid_label) {
        return Err(format!("'{}' is not a valid host name", raw));
    }
    Ok(domain.to_ascii_lowercase())
}
