// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock engine for testing.
//!
//! Records every call and can be scripted to fail at any step of the
//! bootstrap procedure.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::datadir::MARKER_DIR;
use crate::engine::{Engine, EngineError, Result};
use crate::provision::ProvisionPlan;

/// A call received by [`MockEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `initialize`
    Initialize,
    /// `start_background`
    StartBackground,
    /// `probe`
    Probe,
    /// `apply`, with the SQL of every statement.
    Apply(Vec<String>),
    /// `shutdown`
    Shutdown,
    /// `serve_foreground`
    ServeForeground,
}

/// Handle of a mock temporary server.
#[derive(Debug)]
pub struct MockHandle {
    probes: usize,
}

/// Scripted engine.
#[derive(Debug, Default)]
pub struct MockEngine {
    calls: Mutex<Vec<EngineCall>>,
    running: AtomicUsize,
    fail_initialize: bool,
    ready_after: Option<usize>,
    exit_after: Option<(usize, i32)>,
    fail_apply: bool,
}

impl MockEngine {
    /// An engine that succeeds at everything and is ready on the first probe.
    pub fn new() -> Self {
        Self {
            ready_after: Some(1),
            ..Default::default()
        }
    }

    /// Make `initialize` fail after writing part of the data directory.
    pub fn fail_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    /// Accept connections from the `n`th probe on.
    pub fn ready_after(mut self, probes: usize) -> Self {
        self.ready_after = Some(probes);
        self
    }

    /// Never accept connections.
    pub fn never_ready(mut self) -> Self {
        self.ready_after = None;
        self
    }

    /// Report the server as exited with `code` after `probes` failed probes.
    pub fn exit_after(mut self, probes: usize, code: i32) -> Self {
        self.exit_after = Some((probes, code));
        self.ready_after = None;
        self
    }

    /// Reject the provisioning session.
    pub fn fail_apply(mut self) -> Self {
        self.fail_apply = true;
        self
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().clone()
    }

    /// Temporary servers started and not yet shut down.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of probes made.
    pub fn probes(&self) -> usize {
        self.lock()
            .iter()
            .filter(|c| **c == EngineCall::Probe)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EngineCall>> {
        // A test that panicked while holding the lock already failed.
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: EngineCall) {
        self.lock().push(call);
    }
}

#[async_trait]
impl Engine for MockEngine {
    type Handle = MockHandle;

    fn engine_type(&self) -> &'static str {
        "mock"
    }

    async fn initialize(&self, data_dir: &Path) -> Result<()> {
        self.record(EngineCall::Initialize);
        tokio::fs::create_dir_all(data_dir.join(MARKER_DIR)).await?;
        tokio::fs::write(data_dir.join("ibdata1"), b"mock").await?;
        if self.fail_initialize {
            return Err(EngineError::CommandFailed {
                program: "mock-install-db".to_string(),
                exit_code: 1,
                stderr: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    async fn start_background(&self) -> Result<MockHandle> {
        self.record(EngineCall::StartBackground);
        self.running.fetch_add(1, Ordering::SeqCst);
        Ok(MockHandle { probes: 0 })
    }

    async fn probe(&self, handle: &mut MockHandle) -> Result<()> {
        self.record(EngineCall::Probe);
        handle.probes += 1;
        match self.ready_after {
            Some(n) if handle.probes >= n => Ok(()),
            _ => Err(EngineError::Other("connection refused".to_string())),
        }
    }

    fn has_exited(&self, handle: &mut MockHandle) -> Result<Option<i32>> {
        Ok(match self.exit_after {
            Some((probes, code)) if handle.probes >= probes => Some(code),
            _ => None,
        })
    }

    async fn apply(&self, _handle: &mut MockHandle, plan: &ProvisionPlan) -> Result<()> {
        let sql = plan.statements().iter().map(|s| s.sql.clone()).collect();
        self.record(EngineCall::Apply(sql));
        if self.fail_apply {
            return Err(EngineError::Other("access denied".to_string()));
        }
        Ok(())
    }

    async fn shutdown(&self, _handle: MockHandle) -> Result<()> {
        self.record(EngineCall::Shutdown);
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn serve_foreground(&self) -> EngineError {
        self.record(EngineCall::ServeForeground);
        EngineError::Other("mock engine does not serve".to_string())
    }
}
