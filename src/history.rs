//! Persistence of the last exchange, used by follow-up commands.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logging;
use crate::utils::ensure_parent_dir;

/// The command that produced an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Cmd,
    Write,
    Explain,
    Check,
    Commit,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Cmd => "cmd",
            Action::Write => "write",
            Action::Explain => "explain",
            Action::Check => "check",
            Action::Commit => "commit",
        }
    }
}

/// One request and the reply it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub input: String,
    pub action: Action,
    pub output: String,
    pub created_at: DateTime<Utc>,
}

impl Exchange {
    pub fn new(input: impl Into<String>, action: Action, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            action,
            output: output.into(),
            created_at: Utc::now(),
        }
    }

    /// The exchange as conversation turns: the input, then the reply.
    #[must_use]
    pub fn turns(&self) -> [&str; 2] {
        [&self.input, &self.output]
    }
}

pub trait HistoryStore {
    fn load_last(&self) -> Result<Option<Exchange>>;
    fn save_last(&self, exchange: &Exchange) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Keeps the last exchange as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for FileHistoryStore {
    /// A missing or unreadable file means there is no history.
    fn load_last(&self) -> Result<Option<Exchange>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                logging::warn(format!(
                    "Ignoring unreadable history {}: {err}",
                    self.path.display()
                ));
                return Ok(None);
            }
        };

        match serde_json::from_str(&content) {
            Ok(exchange) => Ok(Some(exchange)),
            Err(err) => {
                logging::warn(format!(
                    "Ignoring malformed history {}: {err}",
                    self.path.display()
                ));
                Ok(None)
            }
        }
    }

    fn save_last(&self, exchange: &Exchange) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        let content =
            serde_json::to_string_pretty(exchange).context("Failed to serialize history")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write history to {}", self.path.display()))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("Failed to remove history {}", self.path.display())),
        }
    }
}
