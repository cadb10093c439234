// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shell trait definitions.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from running external commands.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShellError {
    /// The program could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The command exited unsuccessfully.
    #[error("`{command}` exited with code {code}{}", stderr_suffix(.stderr))]
    Failed {
        /// Command line.
        command: String,
        /// Exit code.
        code: i32,
        /// Captured standard error, if any.
        stderr: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// Result type for shell operations.
pub type Result<T> = std::result::Result<T, ShellError>;

/// A command to run.
///
/// Only non-secret values belong in `args` and `envs`: both are visible to
/// every local user through the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program name or path.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub envs: Vec<(String, String)>,
    /// Capture stdout/stderr instead of passing them through to the terminal.
    pub capture: bool,
}

impl Invocation {
    /// New invocation of `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            capture: false,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Capture the output.
    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Outcome of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (128 + signal number when killed by a signal).
    pub code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Trait for external command execution.
#[async_trait]
pub trait Shell: Send + Sync {
    /// Run a command to completion. A non-zero exit is not an error here.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Run a command and fail on a non-zero exit.
    async fn check(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let output = self.run(invocation).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ShellError::Failed {
                command: invocation.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}
