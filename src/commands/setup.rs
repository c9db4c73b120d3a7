//! Local setup commands: `pls set`, `pls login`, `pls logout` and `pls clear`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::config::{remove_value, render_setting, save_value};
use crate::history::HistoryStore;
use crate::provider::ProviderKind;

/// Validate and persist one setting.
pub fn set(config_path: &Path, key: &str, value: &str) -> Result<()> {
    let value = render_setting(key, value)?;
    let shown = value.to_string();
    let path = save_value(config_path, key, value)?;
    println!("Set {key} = {} in {}", shown.trim(), path.display());
    Ok(())
}

/// Prompt for an API key and store it. With `make_default` the provider also
/// becomes the configured default.
pub fn login(config_path: &Path, provider: ProviderKind, make_default: bool) -> Result<()> {
    println!(
        "Get your {provider} API key from {}",
        provider.key_console_url().underline()
    );
    let mut editor = DefaultEditor::new().context("Failed to open the terminal for input")?;
    let key = match editor.readline("Enter API key: ") {
        Ok(line) => line,
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => bail!("Login cancelled"),
        Err(err) => return Err(err).context("Failed to read API key"),
    };

    store_api_key(config_path, provider, &key, make_default)?;
    println!("{}", "Successfully logged in".green());
    Ok(())
}

fn store_api_key(
    config_path: &Path,
    provider: ProviderKind,
    key: &str,
    make_default: bool,
) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        bail!("API key cannot be empty");
    }
    save_value(config_path, provider.config_key(), key)?;
    if make_default {
        save_value(config_path, "provider", provider.to_string())?;
    }
    Ok(())
}

/// Forget the stored key for `provider`, and the shared fallback key.
pub fn logout(config_path: &Path, provider: ProviderKind) -> Result<()> {
    remove_value(config_path, provider.config_key())?;
    remove_value(config_path, "api_key")?;
    println!("Successfully logged out.");
    Ok(())
}

pub fn clear(history: &dyn HistoryStore) -> Result<()> {
    history.clear()?;
    println!("History cleared.");
    Ok(())
}
