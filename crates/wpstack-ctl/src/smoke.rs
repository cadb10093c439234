// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Smoke tests against a running deployment.
//!
//! Three checks: the application user can query its database, the edge
//! serves the application over HTTPS, and plain HTTP answers with a
//! permanent redirect to the HTTPS URL.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use reqwest::{StatusCode, Url, header, redirect};
use tracing::debug;

use crate::compose::Compose;
use crate::error::CtlError;
use crate::shell::Shell;

/// Database check run inside the database container.
///
/// The client options are piped through stdin, so the credentials read
/// from the mounted secret files never show up in an argument list.
pub const DB_CHECK_SCRIPT: &str = r#"printf '[client]\nuser=%s\npassword=%s\n' "$(cat /run/secrets/db_user)" "$(cat /run/secrets/db_password)" | mariadb --defaults-extra-file=/dev/stdin --protocol=socket -N -e 'SELECT 1' "${DB_NAME:-wordpress}""#;

/// Where and how to reach the edge service.
#[derive(Debug, Clone)]
pub struct SmokeOptions {
    /// Address the domain is resolved to.
    pub target: IpAddr,
    /// HTTPS port.
    pub https_port: u16,
    /// Plain HTTP port.
    pub http_port: u16,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for SmokeOptions {
    fn default() -> Self {
        Self {
            target: IpAddr::V4(Ipv4Addr::LOCALHOST),
            https_port: 443,
            http_port: 80,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Check name.
    pub name: &'static str,
    /// Whether it passed.
    pub passed: bool,
    /// What was observed.
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            detail: detail.into(),
        }
    }
}

/// All check results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmokeReport {
    /// Results in execution order.
    pub checks: Vec<CheckResult>,
}

impl SmokeReport {
    /// Number of failed checks.
    pub fn failures(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    /// Whether every check passed.
    pub fn passed(&self) -> bool {
        self.failures() == 0
    }

    /// Turn failed checks into an error.
    pub fn ensure_passed(&self) -> crate::Result<()> {
        match self.failures() {
            0 => Ok(()),
            failed => Err(CtlError::SmokeFailed {
                failed,
                total: self.checks.len(),
            }),
        }
    }
}

impl fmt::Display for SmokeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            let mark = if check.passed { "PASS" } else { "FAIL" };
            writeln!(f, "[{}] {}: {}", mark, check.name, check.detail)?;
        }
        Ok(())
    }
}

/// Query the application database as the application user.
pub async fn check_database<S: Shell>(shell: &S, compose: &Compose) -> CheckResult {
    const NAME: &str = "database";
    let inv = compose.exec("mariadb", ["sh", "-c", DB_CHECK_SCRIPT]);
    match shell.run(&inv).await {
        Ok(out) if out.success() && out.stdout.trim() == "1" => {
            CheckResult::pass(NAME, "application user can query its database")
        }
        Ok(out) if out.success() => {
            CheckResult::fail(NAME, format!("unexpected output: {}", out.stdout.trim()))
        }
        Ok(out) => CheckResult::fail(
            NAME,
            format!("exit code {}: {}", out.code, out.stderr.trim()),
        ),
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

/// Fetch the landing page over HTTPS, accepting the self-signed certificate.
///
/// Redirects are followed: a fresh installation sends `/` to its installer.
pub async fn check_https(domain: &str, options: &SmokeOptions) -> CheckResult {
    const NAME: &str = "https";
    let client = match client(domain, options, redirect::Policy::limited(5)) {
        Ok(client) => client,
        Err(e) => return CheckResult::fail(NAME, e.to_string()),
    };

    let url = format!("https://{}:{}/", domain, options.https_port);
    debug!(url = %url, target = %options.target, "Checking HTTPS endpoint");
    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            CheckResult::pass(NAME, format!("{} from {}", resp.status(), resp.url()))
        }
        Ok(resp) => CheckResult::fail(NAME, format!("{} from {}", resp.status(), resp.url())),
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

/// Expect a permanent redirect from plain HTTP to the HTTPS URL.
pub async fn check_redirect(domain: &str, options: &SmokeOptions) -> CheckResult {
    const NAME: &str = "http-redirect";
    let client = match client(domain, options, redirect::Policy::none()) {
        Ok(client) => client,
        Err(e) => return CheckResult::fail(NAME, e.to_string()),
    };

    let url = format!("http://{}:{}/", domain, options.http_port);
    debug!(url = %url, target = %options.target, "Checking HTTP redirect");
    let resp = match client.get(&url).send().await {
        Ok(resp) => resp,
        Err(e) => return CheckResult::fail(NAME, e.to_string()),
    };

    let location = resp
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let expected = format!("https://{}", domain);

    if resp.status() == StatusCode::MOVED_PERMANENTLY && points_to_https(&location, domain) {
        CheckResult::pass(NAME, format!("301 to {}", location))
    } else {
        CheckResult::fail(
            NAME,
            format!(
                "expected 301 to {}, got {} to '{}'",
                expected,
                resp.status(),
                location
            ),
        )
    }
}

/// Run every check.
pub async fn run<S: Shell>(
    shell: &S,
    compose: &Compose,
    domain: &str,
    options: &SmokeOptions,
) -> SmokeReport {
    SmokeReport {
        checks: vec![
            check_database(shell, compose).await,
            check_https(domain, options).await,
            check_redirect(domain, options).await,
        ],
    }
}

/// Whether `location` is an https URL on exactly `domain`.
fn points_to_https(location: &str, domain: &str) -> bool {
    match Url::parse(location) {
        Ok(url) => {
            url.scheme() == "https"
                && url
                    .host_str()
                    .is_some_and(|host| host.eq_ignore_ascii_case(domain))
        }
        Err(_) => false,
    }
}

fn client(
    domain: &str,
    options: &SmokeOptions,
    policy: redirect::Policy,
) -> reqwest::Result<reqwest::Client> {
    // The port of a resolve override is ignored; the URL carries the port.
    reqwest::Client::builder()
        .resolve(domain, SocketAddr::new(options.target, 0))
        .no_proxy()
        .danger_accept_invalid_certs(true)
        .redirect(policy)
        .timeout(options.timeout)
        .build()
}
