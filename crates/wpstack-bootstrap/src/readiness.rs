// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine readiness polling.
//!
//! The temporary engine is probed with bounded exponential backoff. Before
//! every probe the engine process is checked, so a server that crashed
//! during startup is reported as such instead of exhausting the budget.

use backon::BackoffBuilder;
use tracing::{debug, info};
use wpstack_core::retry::RetryPolicy;

use crate::engine::Engine;
use crate::error::{BootstrapError, Result};

/// Wait until the temporary engine accepts connections.
///
/// Returns the number of probes made.
pub async fn wait_until_ready<E: Engine>(
    engine: &E,
    handle: &mut E::Handle,
    policy: RetryPolicy,
) -> Result<usize> {
    let mut delays = policy.to_backoff().build();
    let mut attempts = 0;

    loop {
        if let Some(code) = engine.has_exited(handle)? {
            return Err(BootstrapError::EngineExited { code });
        }

        attempts += 1;
        let err = match engine.probe(handle).await {
            Ok(()) => {
                info!(attempts = attempts, "Engine accepts connections");
                return Ok(attempts);
            }
            Err(e) => e,
        };

        match delays.next() {
            Some(delay) => {
                debug!(attempt = attempts, error = %err, retry_in = ?delay, "Engine not ready yet");
                tokio::time::sleep(delay).await;
            }
            None => {
                if let Some(code) = engine.has_exited(handle)? {
                    return Err(BootstrapError::EngineExited { code });
                }
                return Err(BootstrapError::NotReady {
                    attempts,
                    last_error: err.to_string(),
                });
            }
        }
    }
}
