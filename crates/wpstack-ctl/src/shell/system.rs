// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shell backed by real child processes.

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::traits::*;

/// Runs commands as child processes of the task runner.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

#[async_trait]
impl Shell for SystemShell {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        debug!(command = %invocation, "Running command");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null());

        let spawn_err = |source| ShellError::Spawn {
            program: invocation.program.clone(),
            source,
        };

        if invocation.capture {
            let output = cmd.output().await.map_err(spawn_err)?;
            Ok(CommandOutput {
                code: exit_code(output.status),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        } else {
            let status = cmd.status().await.map_err(spawn_err)?;
            Ok(CommandOutput {
                code: exit_code(status),
                ..CommandOutput::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_output_and_env() {
        let inv = Invocation::new("sh")
            .args(["-c", "echo \"$GREETING\"; echo oops >&2; exit 3"])
            .env("GREETING", "hello")
            .captured();

        let output = SystemShell.run(&inv).await.unwrap();
        assert_eq!(output.code, 3);
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_check_fails_on_nonzero_exit() {
        let inv = Invocation::new("false");
        let err = SystemShell.check(&inv).await.unwrap_err();
        assert!(matches!(err, ShellError::Failed { code: 1, .. }));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let inv = Invocation::new("wpstack-no-such-program");
        let err = SystemShell.run(&inv).await.unwrap_err();
        assert!(matches!(err, ShellError::Spawn { .. }));
    }
}
