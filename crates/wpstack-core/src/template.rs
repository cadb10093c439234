// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration templates.
//!
//! Templates use `${NAME}` placeholders, where `NAME` matches
//! `[A-Za-z_][A-Za-z0-9_]*`. Every other `$` is copied verbatim, so server
//! configuration variables such as nginx's `$uri` or
//! `$fastcgi_script_name` survive rendering untouched. `$${NAME}` renders a
//! literal `${NAME}`.
//!
//! `${NAME|php}` renders the value escaped for a single-quoted PHP string,
//! so credentials containing `'` or `\` cannot break out of the literal.
//!
//! Unlike `envsubst`, an undefined variable is an error rather than an empty
//! string: a half-rendered server block is worse than a container that
//! refuses to start.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::secrets::{SecretError, read_secret};

/// Suffix marking a variable whose value lives in a file.
pub const FILE_SUFFIX: &str = "_FILE";

/// Errors from template rendering.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TemplateError {
    /// A placeholder names a variable that is not defined.
    #[error("Undefined variable ${{{name}}} on line {line}")]
    Undefined {
        /// Variable name.
        name: String,
        /// 1-based line of the placeholder.
        line: usize,
    },

    /// A `${` was never closed.
    #[error("Unterminated placeholder on line {line}")]
    Unterminated {
        /// 1-based line of the placeholder.
        line: usize,
    },

    /// A placeholder asks for a filter that does not exist.
    #[error("Unknown filter '{filter}' on line {line}")]
    UnknownFilter {
        /// Filter name.
        filter: String,
        /// 1-based line of the placeholder.
        line: usize,
    },

    /// Both `NAME` and `NAME_FILE` are set.
    #[error("Both {0} and {0}_FILE are set; use only one")]
    Ambiguous(String),

    /// A `NAME_FILE` variable points at an unreadable secret.
    #[error(transparent)]
    Secret(#[from] SecretError),

    /// Template I/O failed.
    #[error("Template I/O error on {path}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Variables available to templates.
///
/// Values may hold secrets, so `Debug` lists variable names only.
#[derive(Clone, Default)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    /// Empty variable set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or replace a variable.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Number of defined variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no variable is defined.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build the variable set from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_pairs(std::env::vars())
    }

    /// Build the variable set from `(name, value)` pairs.
    ///
    /// For every `NAME_FILE` pair, `NAME` is defined from the contents of
    /// the named file. The secret value only ever lives in this set, never
    /// in the environment handed to child processes.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut vars = Self::new();
        let mut indirect = Vec::new();

        for (name, value) in pairs {
            if let Some(target) = name.strip_suffix(FILE_SUFFIX) {
                if is_valid_name(target) {
                    indirect.push((target.to_string(), PathBuf::from(&value)));
                }
            }
            vars.insert(name, value);
        }

        for (target, path) in indirect {
            if vars.get(&target).is_some() {
                return Err(TemplateError::Ambiguous(target));
            }
            let secret = read_secret(&path)?;
            debug!(variable = %target, path = %path.display(), "Loaded variable from file");
            vars.insert(target, secret.expose());
        }

        Ok(vars)
    }
}

impl fmt::Debug for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Render a template string.
pub fn render(template: &str, vars: &Variables) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut line = 1;

    while let Some(pos) = rest.find('$') {
        let (before, after) = rest.split_at(pos);
        out.push_str(before);
        line += before.matches('\n').count();

        if let Some(escaped) = after.strip_prefix("$${") {
            out.push_str("${");
            rest = escaped;
            continue;
        }

        let Some(body) = after.strip_prefix("${") else {
            out.push('$');
            rest = &after[1..];
            continue;
        };

        let Some(end) = body.find('}') else {
            return Err(TemplateError::Unterminated { line });
        };

        let (name, filter) = match body[..end].split_once('|') {
            Some((name, filter)) => (name, Some(filter)),
            None => (&body[..end], None),
        };
        if !is_valid_name(name) {
            // Not one of ours; keep it literally.
            out.push_str("${");
            rest = body;
            continue;
        }

        let value = vars.get(name).ok_or_else(|| TemplateError::Undefined {
            name: name.to_string(),
            line,
        })?;
        match filter {
            None => out.push_str(value),
            Some("php") => push_php_literal(&mut out, value),
            Some(other) => {
                return Err(TemplateError::UnknownFilter {
                    filter: other.to_string(),
                    line,
                });
            }
        }
        rest = &body[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Body of a single-quoted PHP string: only `\` and `'` are special there.
fn push_php_literal(out: &mut String, value: &str) {
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Render `src` into `dst`.
///
/// The output is written to a temporary file next to `dst` and renamed into
/// place, so a reader never observes a partially written file. The output
/// takes the permission bits of the template.
pub async fn render_file(src: &Path, dst: &Path, vars: &Variables) -> Result<()> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| TemplateError::Io { path, source }
    };

    let template = fs::read_to_string(src).await.map_err(io_err(src))?;
    let rendered = render(&template, vars)?;

    let parent = match dst.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).await.map_err(io_err(&parent))?;

    let file_name = dst
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rendered".to_string());
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, std::process::id()));

    fs::write(&tmp, rendered.as_bytes())
        .await
        .map_err(io_err(&tmp))?;
    let permissions = fs::metadata(src).await.map_err(io_err(src))?.permissions();
    fs::set_permissions(&tmp, permissions)
        .await
        .map_err(io_err(&tmp))?;
    fs::rename(&tmp, dst).await.map_err(io_err(dst))?;

    debug!(src = %src.display(), dst = %dst.display(), "Rendered template");
    Ok(())
}
