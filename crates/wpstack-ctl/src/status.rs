// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service status reporting.
//!
//! `docker compose ps --format json` prints a JSON array on older Compose
//! releases and one JSON object per line on newer ones; both are accepted.

use serde::Deserialize;

/// A published port of a service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Publisher {
    /// Host address.
    #[serde(rename = "URL", default)]
    pub url: String,
    /// Container port.
    #[serde(default)]
    pub target_port: u16,
    /// Host port, 0 when not published.
    #[serde(default)]
    pub published_port: u16,
    /// Protocol.
    #[serde(default)]
    pub protocol: String,
}

/// One service container as reported by compose.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceStatus {
    /// Compose service name.
    pub service: String,
    /// Container name.
    #[serde(default)]
    pub name: String,
    /// Container state (`running`, `exited`, ...).
    pub state: String,
    /// Human readable status (`Up 3 minutes`).
    #[serde(default)]
    pub status: String,
    /// Health check result, empty without a health check.
    #[serde(default)]
    pub health: String,
    /// Port mappings.
    #[serde(default)]
    pub publishers: Vec<Publisher>,
}

impl ServiceStatus {
    /// Whether the container is running.
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }

    /// Published ports as `host->container/proto`, deduplicated.
    pub fn ports(&self) -> String {
        let mut ports: Vec<String> = self
            .publishers
            .iter()
            .filter(|p| p.published_port != 0)
            .map(|p| format!("{}->{}/{}", p.published_port, p.target_port, p.protocol))
            .collect();
        ports.dedup();
        ports.join(", ")
    }
}

/// Parse `docker compose ps --format json` output.
pub fn parse_ps(output: &str) -> Result<Vec<ServiceStatus>, serde_json::Error> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed);
    }
    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}

/// Render a fixed-width table of services.
pub fn render_table(services: &[ServiceStatus]) -> String {
    let headers = ["SERVICE", "STATE", "STATUS", "PORTS"];
    let rows: Vec<[String; 4]> = services
        .iter()
        .map(|s| {
            [
                s.service.clone(),
                s.state.clone(),
                s.status.clone(),
                s.ports(),
            ]
        })
        .collect();

    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: [&str; 4]| {
        let mut out = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i + 1 == cells.len() {
                out.push_str(cell);
            } else {
                out.push_str(&format!("{:<width$}  ", cell, width = widths[i]));
            }
        }
        out.trim_end().to_string()
    };

    let mut table = line(headers);
    for row in &rows {
        table.push('\n');
        table.push_str(&line([&row[0], &row[1], &row[2], &row[3]]));
    }
    table
}
