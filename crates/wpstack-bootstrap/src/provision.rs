// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provisioning statements.
//!
//! Account statements (`ALTER USER`, `CREATE USER`) do not accept parameter
//! markers, so values are embedded as escaped literals. Everything that
//! reaches SQL text goes through [`quote_literal`] or [`quote_identifier`].

use std::fmt;

use thiserror::Error;
use wpstack_core::Credentials;

/// Longest database name the engine accepts.
pub const MAX_DB_NAME_LEN: usize = 64;

/// Longest user name the engine accepts.
pub const MAX_USER_LEN: usize = 80;

/// Errors from building a provisioning plan.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProvisionError {
    /// The database name cannot be used.
    #[error("Invalid database name: {0}")]
    InvalidDatabase(&'static str),

    /// The application user name cannot be used.
    #[error("Invalid user name: {0}")]
    InvalidUser(&'static str),
}

/// One provisioning statement.
///
/// The SQL text embeds credentials, so `Debug` shows the label only.
#[derive(Clone, PartialEq, Eq)]
pub struct Statement {
    /// Short, secret-free description used in logs and errors.
    pub label: &'static str,
    /// SQL text.
    pub sql: String,
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// The statements run in a single administrative session on first boot.
#[derive(Clone)]
pub struct ProvisionPlan {
    database: String,
    user: String,
    statements: Vec<Statement>,
}

impl ProvisionPlan {
    /// Build the plan for `database` and the given credentials.
    pub fn new(database: &str, credentials: &Credentials) -> Result<Self, ProvisionError> {
        validate_database(database)?;
        let user = credentials.user.expose();
        validate_user(user)?;

        let db = quote_identifier(database);
        let account = format!("{}@'%'", quote_literal(user));

        let statements = vec![
            Statement {
                label: "set administrative password",
                sql: format!(
                    "ALTER USER 'root'@'localhost' IDENTIFIED BY {}",
                    quote_literal(credentials.root_password.expose())
                ),
            },
            Statement {
                label: "create application database",
                sql: format!("CREATE DATABASE IF NOT EXISTS {}", db),
            },
            Statement {
                label: "create application user",
                sql: format!(
                    "CREATE USER IF NOT EXISTS {} IDENTIFIED BY {}",
                    account,
                    quote_literal(credentials.user_password.expose())
                ),
            },
            Statement {
                label: "grant application privileges",
                sql: format!("GRANT ALL PRIVILEGES ON {}.* TO {}", db, account),
            },
            Statement {
                label: "reload privilege tables",
                sql: "FLUSH PRIVILEGES".to_string(),
            },
        ];

        Ok(Self {
            database: database.to_string(),
            user: user.to_string(),
            statements,
        })
    }

    /// Application database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Application user name.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Statements in execution order.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

impl fmt::Debug for ProvisionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionPlan")
            .field("database", &self.database)
            .field("user", &"<redacted>")
            .field("statements", &self.statements.len())
            .finish()
    }
}

fn validate_database(name: &str) -> Result<(), ProvisionError> {
    if name.is_empty() {
        return Err(ProvisionError::InvalidDatabase("empty"));
    }
    if name.chars().count() > MAX_DB_NAME_LEN {
        return Err(ProvisionError::InvalidDatabase("longer than 64 characters"));
    }
    if name.contains('\0') {
        return Err(ProvisionError::InvalidDatabase("contains NUL"));
    }
    if name.ends_with(' ') {
        return Err(ProvisionError::InvalidDatabase("ends with a space"));
    }
    Ok(())
}

fn validate_user(name: &str) -> Result<(), ProvisionError> {
    if name.is_empty() {
        return Err(ProvisionError::InvalidUser("empty"));
    }
    if name.chars().count() > MAX_USER_LEN {
        return Err(ProvisionError::InvalidUser("longer than 80 characters"));
    }
    if name.contains('\0') {
        return Err(ProvisionError::InvalidUser("contains NUL"));
    }
    Ok(())
}

/// Quote a string literal, escaping the characters the server treats specially.
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
