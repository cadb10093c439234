// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Data directory inspection.
//!
//! The engine creates a `mysql` system schema directory when it initializes
//! a data directory. Its presence is the only state the bootstrap branches
//! on: a single existence test at process start, without locking. Only one
//! bootstrap runs against a volume at a time (one container per service).

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::Path;

use tracing::{debug, warn};

/// Marker subdirectory created by engine initialization.
pub const MARKER_DIR: &str = "mysql";

/// Whether `data_dir` has already been initialized.
pub fn is_initialized(data_dir: &Path) -> bool {
    data_dir.join(MARKER_DIR).is_dir()
}

/// Names present in a directory before initialization.
///
/// Used to undo a failed first boot: whatever initialization added is
/// removed again, anything that was there before (e.g. `lost+found` on a
/// fresh filesystem) is kept.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: BTreeSet<OsString>,
}

impl Snapshot {
    /// Record the current entries of `dir`. A missing directory is empty.
    pub fn take(dir: &Path) -> std::io::Result<Self> {
        let mut entries = BTreeSet::new();
        match std::fs::read_dir(dir) {
            Ok(read) => {
                for entry in read {
                    entries.insert(entry?.file_name());
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok(Self { entries })
    }

    /// Remove every entry of `dir` that is not part of the snapshot.
    ///
    /// The directory itself is kept, it is usually a mount point.
    pub fn restore(&self, dir: &Path) -> std::io::Result<usize> {
        let mut removed = 0;
        let read = match std::fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        for entry in read {
            let entry = entry?;
            if self.entries.contains(&entry.file_name()) {
                continue;
            }
            let path = entry.path();
            let result = if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed partial initialization entry");
                    removed += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove entry");
                    return Err(e);
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_marker_detection() {
        let tmp = TempDir::new().unwrap();
        assert!(!is_initialized(tmp.path()));

        // A plain file named like the marker does not count.
        std::fs::write(tmp.path().join(MARKER_DIR), b"").unwrap();
        assert!(!is_initialized(tmp.path()));

        std::fs::remove_file(tmp.path().join(MARKER_DIR)).unwrap();
        std::fs::create_dir(tmp.path().join(MARKER_DIR)).unwrap();
        assert!(is_initialized(tmp.path()));
    }

    #[test]
    fn test_missing_data_dir_is_uninitialized() {
        let tmp = TempDir::new().unwrap();
        assert!(!is_initialized(&tmp.path().join("absent")));
    }

    #[test]
    fn test_snapshot_restore_keeps_preexisting_entries() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("lost+found")).unwrap();

        let snapshot = Snapshot::take(tmp.path()).unwrap();

        std::fs::create_dir_all(tmp.path().join(MARKER_DIR).join("db")).unwrap();
        std::fs::write(tmp.path().join("ibdata1"), b"x").unwrap();

        assert_eq!(snapshot.restore(tmp.path()).unwrap(), 2);
        assert!(tmp.path().join("lost+found").is_dir());
        assert!(!is_initialized(tmp.path()));
        assert!(!tmp.path().join("ibdata1").exists());
    }
}
