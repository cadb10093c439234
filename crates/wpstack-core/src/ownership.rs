// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ownership of service directories.
//!
//! The database engine drops privileges to its service account, so its
//! data, run and log directories must belong to that account before every
//! start. Host-side setup only claims what it creates: a data directory that
//! already exists may hold files the containers own, and those stay theirs.

use std::os::unix::fs::lchown;
use std::path::{Path, PathBuf};

use nix::unistd::User;
use thiserror::Error;
use tracing::debug;

/// Errors from ownership operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OwnershipError {
    /// The named account does not exist.
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// Account lookup failed.
    #[error("Failed to look up user {name}: {source}")]
    Lookup {
        /// Account name.
        name: String,
        /// Underlying errno.
        source: nix::errno::Errno,
    },

    /// A filesystem operation failed.
    #[error("Failed to update ownership of {path}: {source}")]
    Io {
        /// Path being updated.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result type for ownership operations.
pub type Result<T> = std::result::Result<T, OwnershipError>;

/// A uid/gid pair that directories are handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceAccount {
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
}

impl ServiceAccount {
    /// Resolve a system account by name (primary group is used).
    pub fn lookup(name: &str) -> Result<Self> {
        let user = User::from_name(name)
            .map_err(|source| OwnershipError::Lookup {
                name: name.to_string(),
                source,
            })?
            .ok_or_else(|| OwnershipError::UnknownUser(name.to_string()))?;

        Ok(Self {
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
        })
    }

    /// The account running this process.
    pub fn current() -> Self {
        Self {
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
        }
    }

    /// The account that invoked `sudo`, falling back to the current one.
    pub fn invoking() -> Self {
        let parse = |var: &str| std::env::var(var).ok().and_then(|v| v.parse::<u32>().ok());
        let current = Self::current();
        Self {
            uid: parse("SUDO_UID").unwrap_or(current.uid),
            gid: parse("SUDO_GID").unwrap_or(current.gid),
        }
    }
}

/// Create `dir` if needed and hand it, and everything below it, to `account`.
///
/// Symlinks are re-owned themselves and never followed. Entries that already
/// carry the right owner are not touched, so repeating the call on a large
/// data directory is cheap.
pub fn ensure_owned(dir: &Path, account: ServiceAccount) -> Result<u64> {
    std::fs::create_dir_all(dir).map_err(|source| OwnershipError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut changed = 0u64;
    let mut pending = vec![dir.to_path_buf()];

    while let Some(path) = pending.pop() {
        let meta = std::fs::symlink_metadata(&path).map_err(|source| OwnershipError::Io {
            path: path.clone(),
            source,
        })?;

        if owner_differs(&meta, account) {
            lchown(&path, Some(account.uid), Some(account.gid)).map_err(|source| {
                OwnershipError::Io {
                    path: path.clone(),
                    source,
                }
            })?;
            changed += 1;
        }

        if meta.is_dir() {
            let entries = std::fs::read_dir(&path).map_err(|source| OwnershipError::Io {
                path: path.clone(),
                source,
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| OwnershipError::Io {
                    path: path.clone(),
                    source,
                })?;
                pending.push(entry.path());
            }
        }
    }

    debug!(
        dir = %dir.display(),
        uid = account.uid,
        gid = account.gid,
        changed = changed,
        "Ensured directory ownership"
    );
    Ok(changed)
}

/// Create `dir` if needed, handing every directory this call creates to
/// `account`.
///
/// Nothing that already exists is touched, neither `dir` nor anything
/// below it. Returns whether `dir` was created.
pub fn claim_dir(dir: &Path, account: ServiceAccount) -> Result<bool> {
    let mut missing = Vec::new();
    let mut cursor = Some(dir);
    while let Some(path) = cursor {
        if path.as_os_str().is_empty() || std::fs::symlink_metadata(path).is_ok() {
            break;
        }
        missing.push(path.to_path_buf());
        cursor = path.parent();
    }
    if missing.is_empty() {
        return Ok(false);
    }

    std::fs::create_dir_all(dir).map_err(|source| OwnershipError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for path in missing.iter().rev() {
        hand_over(path, account)?;
    }

    debug!(
        dir = %dir.display(),
        uid = account.uid,
        gid = account.gid,
        created = missing.len(),
        "Claimed new directory"
    );
    Ok(true)
}

/// Hand a single path to `account` without following symlinks.
///
/// Returns whether the owner changed.
pub fn hand_over(path: &Path, account: ServiceAccount) -> Result<bool> {
    let io_err = |source| OwnershipError::Io {
        path: path.to_path_buf(),
        source,
    };
    let meta = std::fs::symlink_metadata(path).map_err(io_err)?;
    if !owner_differs(&meta, account) {
        return Ok(false);
    }
    lchown(path, Some(account.uid), Some(account.gid)).map_err(io_err)?;
    Ok(true)
}

fn owner_differs(meta: &std::fs::Metadata, account: ServiceAccount) -> bool {
    use std::os::unix::fs::MetadataExt;
    meta.uid() != account.uid || meta.gid() != account.gid
}
