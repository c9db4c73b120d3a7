//! Git plumbing for `pls check` and `pls commit`, plus the workspace context
//! sent with shell-command requests.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};

use crate::utils::floor_char_boundary;

const TRUNCATION_MARKER: &str = "\n...[truncated]\n";

/// Runs git inside one working directory.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `git diff` (or `git diff --cached`), cut to `max_chars` bytes on a
    /// char boundary with a marker appended.
    pub fn diff(&self, staged: bool, max_chars: usize) -> Result<String> {
        let mut args = vec!["diff"];
        if staged {
            args.push("--cached");
        }
        let mut diff = self.run(&args)?;
        if diff.len() > max_chars {
            diff.truncate(floor_char_boundary(&diff, max_chars));
            diff.push_str(TRUNCATION_MARKER);
        }
        Ok(diff)
    }

    pub fn stage_all(&self) -> Result<()> {
        self.run(&["add", "."]).map(|_| ())
    }

    /// Commit staged changes. Returns git's own summary output.
    pub fn commit(&self, message: &str) -> Result<String> {
        self.run(&["commit", "-m", message])
    }

    /// The checked-out branch, `None` outside a repository or when detached.
    #[must_use]
    pub fn current_branch(&self) -> Option<String> {
        self.run(&["branch", "--show-current"])
            .ok()
            .map(|branch| branch.trim().to_string())
            .filter(|branch| !branch.is_empty())
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .with_context(|| format!("Failed to run git {}. Is git installed?", args[0]))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {} failed: {}", args.join(" "), stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Where the user is standing when asking for shell commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceContext {
    pub cwd: String,
    /// Comma-separated directory entries, sorted.
    pub listing: String,
    pub branch: Option<String>,
}

impl WorkspaceContext {
    /// Gather context for `dir`. Every part is best effort.
    #[must_use]
    pub fn probe(dir: &Path) -> Self {
        let mut entries: Vec<String> = fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .filter(|name| !name.starts_with('.'))
                    .collect()
            })
            .unwrap_or_default();
        entries.sort();

        Self {
            cwd: dir.display().to_string(),
            listing: entries.join(", "),
            branch: Git::new(dir).current_branch(),
        }
    }
}
