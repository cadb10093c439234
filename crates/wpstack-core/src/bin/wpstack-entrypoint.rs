// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! wpstack service entrypoint
//!
//! Entrypoint of the edge and application containers. Renders configuration
//! templates, optionally waits for upstream services, then replaces itself
//! with the service process.
//!
//! Usage:
//!   wpstack-entrypoint [--template SRC:DST]... [--wait-for HOST:PORT]... -- PROGRAM [ARGS...]
//!
//! Examples:
//!   # Edge: render the server block for $DOMAIN_NAME, then run nginx
//!   wpstack-entrypoint \
//!     --template /etc/wpstack/default.conf.template:/etc/nginx/http.d/default.conf \
//!     -- nginx -g 'daemon off;'
//!
//!   # Application: render wp-config.php from secret files, wait for the database
//!   wpstack-entrypoint \
//!     --template /etc/wpstack/wp-config.php.template:/var/www/html/wp-config.php \
//!     --wait-for mariadb:3306 -- php-fpm83 -F

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use wpstack_core::handoff;
use wpstack_core::retry::{RetryPolicy, wait_for_tcp};
use wpstack_core::template::{Variables, render_file};

/// One `--template SRC:DST` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TemplateSpec {
    src: PathBuf,
    dst: PathBuf,
}

fn parse_template_spec(raw: &str) -> Result<TemplateSpec, String> {
    let (src, dst) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected SRC:DST, got '{}'", raw))?;
    if src.is_empty() || dst.is_empty() {
        return Err(format!("expected SRC:DST, got '{}'", raw));
    }
    Ok(TemplateSpec {
        src: PathBuf::from(src),
        dst: PathBuf::from(dst),
    })
}

#[derive(Debug, Parser)]
#[command(
    name = "wpstack-entrypoint",
    about = "Render service configuration templates and hand off to the service process"
)]
struct Args {
    /// Template to render before starting, as SRC:DST. Repeatable.
    #[arg(long = "template", value_name = "SRC:DST", value_parser = parse_template_spec)]
    templates: Vec<TemplateSpec>,

    /// Wait until HOST:PORT accepts TCP connections before starting. Repeatable.
    #[arg(long = "wait-for", value_name = "HOST:PORT")]
    wait_for: Vec<String>,

    /// Connection attempts per --wait-for target.
    #[arg(long, env = "WPSTACK_WAIT_ATTEMPTS", default_value_t = 60)]
    wait_attempts: usize,

    /// Service command and its arguments.
    #[arg(last = true, required = true, value_name = "PROGRAM")]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wpstack_entrypoint=info,wpstack_core=info".into()),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file loaded: {}", e);
    }

    let args = Args::parse();

    let vars = Variables::from_env().context("Failed to collect template variables")?;
    debug!(variables = ?vars, "Collected template variables");

    for spec in &args.templates {
        render_file(&spec.src, &spec.dst, &vars)
            .await
            .with_context(|| format!("Failed to render {}", spec.src.display()))?;
        info!(
            src = %spec.src.display(),
            dst = %spec.dst.display(),
            "Rendered configuration"
        );
    }

    let policy = RetryPolicy::with_attempts(args.wait_attempts);
    for target in &args.wait_for {
        wait_for_tcp(target, policy)
            .await
            .with_context(|| format!("{} did not become reachable", target))?;
        info!(target = %target, "Upstream reachable");
    }

    let (program, rest) = args
        .command
        .split_first()
        .context("No service command given")?;
    Err(handoff::exec(program, rest).into())
}
