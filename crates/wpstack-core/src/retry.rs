// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded exponential backoff.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tokio::net::TcpStream;
use tracing::debug;

/// How often and how long to retry a readiness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub min_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
    /// Total number of attempts, including the first one.
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            max_attempts: 30,
        }
    }
}

impl RetryPolicy {
    /// Policy with the default delays and the given attempt budget.
    pub fn with_attempts(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Backoff builder for `backon`.
    pub fn to_backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts.saturating_sub(1))
    }
}

/// Wait until a TCP connection to `target` (`host:port`) succeeds.
///
/// Returns the last connection error once the attempt budget is spent.
pub async fn wait_for_tcp(target: &str, policy: RetryPolicy) -> std::io::Result<()> {
    (|| async move { TcpStream::connect(target).await.map(drop) })
        .retry(policy.to_backoff())
        .notify(|err: &std::io::Error, dur: Duration| {
            debug!(target = %target, error = %err, retry_in = ?dur, "Target not reachable yet");
        })
        .await
}
