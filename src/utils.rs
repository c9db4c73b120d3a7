//! Utility helpers shared across the `pls` CLI.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

// === Filesystem Helpers ===

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Expand a leading `~` in a user-supplied path.
#[must_use]
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

/// `~/.pls/<name>`, or a relative `.pls/<name>` when there is no home directory.
#[must_use]
pub fn pls_home_path(name: &str) -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".pls").join(name))
        .unwrap_or_else(|| PathBuf::from(".pls").join(name))
}

// === String Helpers ===

/// Largest byte index `<= index` that falls on a char boundary.
#[must_use]
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut idx = index;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Truncate a string to at most `max_len` bytes, adding an ellipsis if truncated.
#[must_use]
pub fn truncate_with_ellipsis(s: &str, max_len: usize, ellipsis: &str) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let truncate_at = floor_char_boundary(s, max_len.saturating_sub(ellipsis.len()));
        format!("{}{}", &s[..truncate_at], ellipsis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let out = truncate_with_ellipsis(s, 4, "…");
        assert!(out.ends_with('…'));
        assert!(out.len() <= 4 + "…".len());
    }

    #[test]
    fn truncate_leaves_short_strings_alone() {
        assert_eq!(truncate_with_ellipsis("short", 10, "..."), "short");
    }

    #[test]
    fn ensure_parent_dir_creates_nested_dirs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a").join("b").join("file.json");
        ensure_parent_dir(&path)?;
        assert!(path.parent().is_some_and(Path::exists));
        Ok(())
    }
}
