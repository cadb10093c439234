// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Secret files.
//!
//! Each secret is a flat file holding one value, mounted read-only into the
//! service at a fixed path. Values are kept in [`SecretValue`], whose `Debug`
//! output is redacted so a stray `?credentials` in a log line cannot leak them.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from reading secret files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SecretError {
    /// The secret file could not be read.
    #[error("Failed to read secret file {path}: {source}")]
    Read {
        /// Path of the secret file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The secret file exists but holds no value.
    #[error("Secret file {0} is empty")]
    Empty(PathBuf),

    /// The secret file is not valid UTF-8.
    #[error("Secret file {0} is not valid UTF-8")]
    NotUtf8(PathBuf),
}

/// Result type for secret operations.
pub type Result<T> = std::result::Result<T, SecretError>;

/// A secret string. Printing it with `{:?}` never reveals the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wrap a value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the underlying value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(<redacted>)")
    }
}

/// Read a secret file.
///
/// A single trailing newline (`\n` or `\r\n`) is stripped, since secret
/// files are usually written with `echo`. Any other whitespace is part of
/// the value.
pub fn read_secret(path: &Path) -> Result<SecretValue> {
    let bytes = std::fs::read(path).map_err(|source| SecretError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut value =
        String::from_utf8(bytes).map_err(|_| SecretError::NotUtf8(path.to_path_buf()))?;

    if value.ends_with('\n') {
        value.pop();
        if value.ends_with('\r') {
            value.pop();
        }
    }

    if value.is_empty() {
        return Err(SecretError::Empty(path.to_path_buf()));
    }

    Ok(SecretValue(value))
}

/// Locations of the three credential files.
#[derive(Debug, Clone)]
pub struct CredentialPaths {
    /// Administrative (root) password.
    pub root_password: PathBuf,
    /// Application database user name.
    pub user: PathBuf,
    /// Application database user password.
    pub user_password: PathBuf,
}

impl Default for CredentialPaths {
    fn default() -> Self {
        Self {
            root_password: PathBuf::from("/run/secrets/db_root_password"),
            user: PathBuf::from("/run/secrets/db_user"),
            user_password: PathBuf::from("/run/secrets/db_password"),
        }
    }
}

/// Credential material for one deployment. Read once, never modified.
#[derive(Clone)]
pub struct Credentials {
    /// Administrative password.
    pub root_password: SecretValue,
    /// Application user name.
    pub user: SecretValue,
    /// Application user password.
    pub user_password: SecretValue,
}

impl Credentials {
    /// Load all three credentials. Fails on the first unreadable or empty file.
    pub fn load(paths: &CredentialPaths) -> Result<Self> {
        Ok(Self {
            root_password: read_secret(&paths.root_password)?,
            user: read_secret(&paths.user)?,
            user_password: read_secret(&paths.user_password)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("root_password", &self.root_password)
            .field("user", &self.user)
            .field("user_password", &self.user_password)
            .finish()
    }
}
