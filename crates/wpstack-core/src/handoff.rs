// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Handoff to the steady-state service process.
//!
//! Entrypoints finish by replacing themselves with the real service
//! (`mariadbd`, `php-fpm`, `nginx`). The PID stays the same, so the
//! container supervisor tracks the service directly and its signals reach
//! the service without a forwarding layer.

use std::ffi::OsStr;
use std::os::unix::process::CommandExt;
use std::process::Command;

use thiserror::Error;
use tracing::info;

/// The handoff did not happen.
#[derive(Debug, Error)]
#[error("Failed to exec {program}: {source}")]
pub struct HandoffError {
    /// Program that could not be executed.
    pub program: String,
    /// Underlying I/O error.
    pub source: std::io::Error,
}

/// Replace the current process with `program args...`.
///
/// Returns only if the exec failed.
pub fn exec<I, S>(program: impl AsRef<OsStr>, args: I) -> HandoffError
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    let mut command = Command::new(program);
    command.args(args);
    exec_command(command)
}

/// Replace the current process with a prepared command.
pub fn exec_command(mut command: Command) -> HandoffError {
    let program = command.get_program().to_string_lossy().into_owned();
    info!(program = %program, "Handing off to service process");
    let source = command.exec();
    HandoffError { program, source }
}
