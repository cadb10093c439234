// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! wpstack
//!
//! Operator task runner for a wpstack deployment.
//!
//! Usage:
//!   wpstack [OPTIONS] [TASK]
//!
//! Tasks:
//!   all      setup, build and start (default)
//!   build    build the service images
//!   up       start the services detached
//!   down     stop and remove the services and their volumes
//!   clean    remove every container, image, volume and network on the host
//!   fclean   clean, then delete the host data directories
//!   re       fclean, then all
//!   setup    create data directories and the self-signed certificate
//!   test     run the smoke tests
//!   status   print the service table and the access URL
//!
//! Environment variables:
//!   DOMAIN_NAME          - Public domain (default: wpstack.local)
//!   WPSTACK_DATA_ROOT    - Host volume root (default: $HOME/data)
//!   WPSTACK_SECRETS_DIR  - Secret files (default: secrets)
//!   RUST_LOG             - Log level (default: wpstack=info,wpstack_ctl=info)

use std::net::IpAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::warn;
use wpstack_ctl::shell::SystemShell;
use wpstack_ctl::smoke::SmokeOptions;
use wpstack_ctl::status;
use wpstack_ctl::tasks::SetupReport;
use wpstack_ctl::{StackConfig, Tasks};

#[derive(Debug, Parser)]
#[command(name = "wpstack", version, about = "Operator task runner for wpstack deployments")]
struct Cli {
    #[command(flatten)]
    config: StackConfig,

    #[command(subcommand)]
    task: Option<Task>,
}

#[derive(Debug, Subcommand)]
enum Task {
    /// Setup, build and start
    All,
    /// Build the service images
    Build,
    /// Start the services detached
    Up,
    /// Stop and remove the services and their volumes
    Down,
    /// Remove every container, image, volume and network on the host
    Clean,
    /// Clean, then delete the host data directories
    Fclean,
    /// Fclean, then all
    Re,
    /// Create data directories and the self-signed certificate
    Setup {
        /// Regenerate the certificate even if one exists
        #[arg(long)]
        force: bool,
    },
    /// Run the smoke tests against the running deployment
    Test(SmokeArgs),
    /// Print the service table and the access URL
    Status,
}

#[derive(Debug, Args)]
struct SmokeArgs {
    /// Address the domain resolves to for the HTTP checks
    #[arg(long, env = "WPSTACK_TARGET", default_value = "127.0.0.1")]
    target: IpAddr,

    /// HTTPS port of the edge service
    #[arg(long, default_value_t = 443)]
    https_port: u16,

    /// Plain HTTP port of the edge service
    #[arg(long, default_value_t = 80)]
    http_port: u16,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

impl From<SmokeArgs> for SmokeOptions {
    fn from(args: SmokeArgs) -> Self {
        Self {
            target: args.target,
            https_port: args.https_port,
            http_port: args.http_port,
            timeout: Duration::from_secs(args.timeout_secs),
        }
    }
}

fn print_setup(report: &SetupReport) {
    for dir in &report.directories {
        let state = if report.created.contains(dir) {
            "created"
        } else {
            "kept"
        };
        println!("data directory  {} ({})", dir.display(), state);
    }
    let cert = &report.certificate;
    println!(
        "certificate     CN={} RSA-{} {} ({} days left)",
        cert.common_name,
        cert.key_bits,
        if report.certificate_generated {
            "generated"
        } else {
            "kept"
        },
        cert.days_remaining
    );
    for path in &report.missing_secrets {
        println!("missing secret  {}", path.display());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wpstack=info,wpstack_ctl=info".into()),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    let tasks = Tasks::new(cli.config, SystemShell)?;

    match cli.task.unwrap_or(Task::All) {
        Task::All => {
            print_setup(&tasks.all().await?);
            println!("{}", tasks.config().access_url());
        }
        Task::Build => tasks.build().await?,
        Task::Up => {
            tasks.up().await?;
            println!("{}", tasks.config().access_url());
        }
        Task::Down => tasks.down().await?,
        Task::Clean => {
            let report = tasks.clean().await;
            for step in &report.skipped {
                warn!(step = %step, "Skipped");
            }
        }
        Task::Fclean => {
            tasks.fclean().await?;
        }
        Task::Re => {
            print_setup(&tasks.re().await?);
            println!("{}", tasks.config().access_url());
        }
        Task::Setup { force } => print_setup(&tasks.setup(force).await?),
        Task::Test(args) => {
            let report = tasks.test(&args.into()).await;
            print!("{}", report);
            report.ensure_passed()?;
        }
        Task::Status => {
            let services = tasks.status().await?;
            println!("{}", status::render_table(&services));
            println!();
            println!("Access: {}", tasks.config().access_url());
        }
    }

    Ok(())
}
