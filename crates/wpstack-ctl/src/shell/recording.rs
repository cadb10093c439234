// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recording shell for testing.
//!
//! Records every invocation without running anything. Responses are
//! scripted by substring of the command line; unmatched commands succeed
//! with empty output.

use std::sync::Mutex;

use async_trait::async_trait;

use super::traits::*;

#[derive(Debug, Clone)]
enum Response {
    Output(CommandOutput),
    Missing,
}

/// Shell that records invocations and returns scripted results.
#[derive(Debug, Default)]
pub struct RecordingShell {
    invocations: Mutex<Vec<Invocation>>,
    responses: Vec<(String, Response)>,
}

impl RecordingShell {
    /// A shell where every command succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `needle` with `output`.
    pub fn respond(mut self, needle: impl Into<String>, output: CommandOutput) -> Self {
        self.responses.push((needle.into(), Response::Output(output)));
        self
    }

    /// Make commands containing `needle` exit with `code`.
    pub fn fail(self, needle: impl Into<String>, code: i32) -> Self {
        self.respond(needle, CommandOutput::failed(code, "scripted failure"))
    }

    /// Make commands containing `needle` fail to start, as if not installed.
    pub fn missing(mut self, needle: impl Into<String>) -> Self {
        self.responses.push((needle.into(), Response::Missing));
        self
    }

    /// Invocations received so far.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().clone()
    }

    /// Command lines received so far.
    pub fn commands(&self) -> Vec<String> {
        self.lock().iter().map(ToString::to_string).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Invocation>> {
        self.invocations.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Shell for RecordingShell {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.lock().push(invocation.clone());

        let line = invocation.to_string();
        let response = self
            .responses
            .iter()
            .find(|(needle, _)| line.contains(needle.as_str()))
            .map(|(_, response)| response.clone());

        match response {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::Missing) => Err(ShellError::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
            None => Ok(CommandOutput::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_matching_response_wins() {
        let shell = RecordingShell::new()
            .respond("ps -qa", CommandOutput::ok("abc\n"))
            .fail("docker", 1);

        let out = shell
            .run(&Invocation::new("docker").args(["ps", "-qa"]))
            .await
            .unwrap();
        assert_eq!(out.stdout, "abc\n");

        let out = shell
            .run(&Invocation::new("docker").arg("info"))
            .await
            .unwrap();
        assert_eq!(out.code, 1);

        assert_eq!(shell.commands(), vec!["docker ps -qa", "docker info"]);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let shell = RecordingShell::new().missing("docker");
        let err = shell.run(&Invocation::new("docker")).await.unwrap_err();
        assert!(matches!(err, ShellError::Spawn { .. }));
    }
}
