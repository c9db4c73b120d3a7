//! Configuration loading and defaults for pls.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use toml_edit::{DocumentMut, Item, Value};

use crate::provider::ProviderKind;
use crate::utils::{ensure_parent_dir, expand_path, pls_home_path};

// === Types ===

/// Raw retry configuration loaded from config files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetryConfig {
    pub enabled: Option<bool>,
    pub max_retries: Option<u32>,
    pub initial_delay: Option<f64>,
    pub max_delay: Option<f64>,
    pub exponential_base: Option<f64>,
}

/// Upper bound for a single backoff, whatever the retry settings say.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Resolved retry policy with defaults applied.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_retries: u32,
    pub initial_delay: f64,
    pub max_delay: f64,
    pub exponential_base: f64,
}

impl RetryPolicy {
    /// Compute the backoff delay for a retry attempt. Overflowing or
    /// non-finite settings fall back to [`MAX_RETRY_DELAY`].
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial_delay * self.exponential_base.powi(exponent);
        let delay = delay.min(self.max_delay).max(0.0);
        Duration::try_from_secs_f64(delay)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }
}

/// Resolved CLI configuration, including defaults and environment overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub provider: Option<ProviderKind>,
    /// Fallback key used when no provider-specific key is set.
    pub api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Extra instructions appended to every system prompt.
    pub prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub markdown: Option<bool>,
    pub color: Option<bool>,
    pub history_path: Option<String>,
    /// Per-request timeout in seconds (0 disables it).
    pub request_timeout: Option<u64>,
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(flatten)]
    base: Config,
    profiles: Option<HashMap<String, Config>>,
}

// === Config Loading ===

impl Config {
    /// Load configuration from disk and merge with environment overrides.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// # use crate::config::Config;
    /// let config = Config::load(None, None)?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn load(path: Option<PathBuf>, profile: Option<&str>) -> Result<Self> {
        let path = path.or_else(default_config_path);
        let mut config = match path.as_deref() {
            Some(path) => Self::load_file(path, profile)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config, |name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load a config file (without environment overrides). A missing file is
    /// an empty config.
    pub fn load_file(path: &Path, profile: Option<&str>) -> Result<Self> {
        if !path.exists() {
            return match profile {
                Some(name) => anyhow::bail!(
                    "Profile '{name}' not found. Available profiles: none (no config file at {})",
                    path.display()
                ),
                None => Ok(Config::default()),
            };
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let parsed: ConfigFile = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        apply_profile(parsed, profile)
    }

    /// Validate that critical config fields are usable.
    pub fn validate(&self) -> Result<()> {
        let keys = [
            ("api_key", &self.api_key),
            ("anthropic_api_key", &self.anthropic_api_key),
            ("openai_api_key", &self.openai_api_key),
            ("groq_api_key", &self.groq_api_key),
        ];
        for (name, key) in keys {
            if let Some(key) = key
                && key.trim().is_empty()
            {
                anyhow::bail!("{name} cannot be empty string");
            }
        }
        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            anyhow::bail!("temperature must be between 0 and 2, got {temperature}");
        }
        if self.max_tokens == Some(0) {
            anyhow::bail!("max_tokens must be greater than 0");
        }
        Ok(())
    }

    #[must_use]
    pub fn provider(&self) -> ProviderKind {
        self.provider.unwrap_or_default()
    }

    /// Read the API key for the active provider.
    pub fn api_key(&self) -> Result<String> {
        let provider = self.provider();
        let specific = match provider {
            ProviderKind::Anthropic => &self.anthropic_api_key,
            ProviderKind::OpenAi => &self.openai_api_key,
            ProviderKind::Groq => &self.groq_api_key,
        };
        specific
            .clone()
            .or_else(|| self.api_key.clone())
            .filter(|key| !key.trim().is_empty())
            .with_context(|| {
                format!(
                    "No API key for {provider}. Run 'pls login' or set {} in the environment.",
                    provider.api_key_env()
                )
            })
    }

    /// Return the provider base URL (trailing slashes removed).
    #[must_use]
    pub fn base_url(&self) -> String {
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| self.provider().default_base_url().to_string());
        base.trim_end_matches('/').to_string()
    }

    #[must_use]
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider().default_model().to_string())
    }

    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(0.7)
    }

    #[must_use]
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(1000)
    }

    #[must_use]
    pub fn top_p(&self) -> f64 {
        self.top_p.unwrap_or(0.9)
    }

    #[must_use]
    pub fn markdown_enabled(&self) -> bool {
        self.markdown.unwrap_or(true)
    }

    /// ANSI styling is on unless disabled in config or via `NO_COLOR`.
    #[must_use]
    pub fn color_enabled(&self) -> bool {
        self.color.unwrap_or(true) && std::env::var_os("NO_COLOR").is_none()
    }

    /// Resolve the follow-up history file path.
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.history_path
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| pls_home_path("last_output.json"))
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout.unwrap_or(120) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Resolve the effective retry policy with defaults applied.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy {
            enabled: true,
            max_retries: 3,
            initial_delay: 1.0,
            max_delay: 60.0,
            exponential_base: 2.0,
        };

        let Some(cfg) = &self.retry else {
            return defaults;
        };

        RetryPolicy {
            enabled: cfg.enabled.unwrap_or(defaults.enabled),
            max_retries: cfg.max_retries.unwrap_or(defaults.max_retries),
            initial_delay: cfg.initial_delay.unwrap_or(defaults.initial_delay),
            max_delay: cfg.max_delay.unwrap_or(defaults.max_delay),
            exponential_base: cfg.exponential_base.unwrap_or(defaults.exponential_base),
        }
    }
}

// === Defaults ===

/// `PLS_CONFIG_PATH`, else `~/.pls/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PLS_CONFIG_PATH")
        && !path.trim().is_empty()
    {
        return Some(expand_path(&path));
    }
    dirs::home_dir().map(|home| home.join(".pls").join("config.toml"))
}

// === Environment Overrides ===

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(value) = var("PLS_PROVIDER") {
        match value.parse::<ProviderKind>() {
            Ok(provider) => config.provider = Some(provider),
            Err(err) => crate::logging::warn(format!("Ignoring PLS_PROVIDER: {err}")),
        }
    }
    if let Some(value) = var("PLS_API_KEY") {
        config.api_key = Some(value);
    }
    if let Some(value) = var("ANTHROPIC_API_KEY") {
        config.anthropic_api_key = Some(value);
    }
    if let Some(value) = var("OPENAI_API_KEY") {
        config.openai_api_key = Some(value);
    }
    if let Some(value) = var("GROQ_API_KEY") {
        config.groq_api_key = Some(value);
    }
    if let Some(value) = var("PLS_BASE_URL") {
        config.base_url = Some(value);
    }
    if let Some(value) = var("PLS_MODEL") {
        config.model = Some(value);
    }
    if let Some(value) = var("PLS_HISTORY_PATH") {
        config.history_path = Some(value);
    }
}

fn apply_profile(config: ConfigFile, profile: Option<&str>) -> Result<Config> {
    let Some(profile_name) = profile else {
        return Ok(config.base);
    };
    let profiles = config.profiles.as_ref();
    match profiles.and_then(|profiles| profiles.get(profile_name)) {
        Some(override_cfg) => Ok(merge_config(config.base, override_cfg.clone())),
        None => {
            let available = profiles
                .map(|profiles| {
                    let mut keys = profiles.keys().cloned().collect::<Vec<_>>();
                    keys.sort();
                    if keys.is_empty() {
                        "none".to_string()
                    } else {
                        keys.join(", ")
                    }
                })
                .unwrap_or_else(|| "none".to_string());
            anyhow::bail!("Profile '{profile_name}' not found. Available profiles: {available}")
        }
    }
}

fn merge_config(base: Config, override_cfg: Config) -> Config {
    Config {
        provider: override_cfg.provider.or(base.provider),
        api_key: override_cfg.api_key.or(base.api_key),
        anthropic_api_key: override_cfg.anthropic_api_key.or(base.anthropic_api_key),
        openai_api_key: override_cfg.openai_api_key.or(base.openai_api_key),
        groq_api_key: override_cfg.groq_api_key.or(base.groq_api_key),
        base_url: override_cfg.base_url.or(base.base_url),
        model: override_cfg.model.or(base.model),
        prompt: override_cfg.prompt.or(base.prompt),
        temperature: override_cfg.temperature.or(base.temperature),
        max_tokens: override_cfg.max_tokens.or(base.max_tokens),
        top_p: override_cfg.top_p.or(base.top_p),
        markdown: override_cfg.markdown.or(base.markdown),
        color: override_cfg.color.or(base.color),
        history_path: override_cfg.history_path.or(base.history_path),
        request_timeout: override_cfg.request_timeout.or(base.request_timeout),
        retry: override_cfg.retry.or(base.retry),
    }
}

// === Persisting Single Keys ===

/// Keys `pls set` is allowed to write.
pub const SETTABLE_KEYS: &[&str] = &[
    "model",
    "provider",
    "prompt",
    "temperature",
    "max_tokens",
    "top_p",
    "markdown",
];

/// Validate a `pls set` value and convert it to its TOML type.
pub fn render_setting(key: &str, value: &str) -> Result<Value> {
    let value = value.trim();
    let rendered = match key {
        "model" | "prompt" => Value::from(value),
        "provider" => {
            let provider: ProviderKind = value.parse().map_err(anyhow::Error::msg)?;
            Value::from(provider.to_string())
        }
        "temperature" | "top_p" => Value::from(
            value
                .parse::<f64>()
                .with_context(|| format!("{key} must be a number, got '{value}'"))?,
        ),
        "max_tokens" => Value::from(i64::from(
            value
                .parse::<u32>()
                .with_context(|| format!("max_tokens must be a positive integer, got '{value}'"))?,
        )),
        "markdown" => Value::from(
            value
                .parse::<bool>()
                .with_context(|| format!("markdown must be true or false, got '{value}'"))?,
        ),
        other => anyhow::bail!(
            "Unknown setting '{other}'. Expected one of: {}",
            SETTABLE_KEYS.join(", ")
        ),
    };
    Ok(rendered)
}

/// Set `key` in the top-level table of the config file, creating the file if
/// needed. Everything else in the file is kept as written. Returns the path
/// written.
pub fn save_value(path: &Path, key: &str, value: impl Into<Value>) -> Result<PathBuf> {
    let mut doc = read_document(path)?;
    doc[key] = Item::Value(value.into());
    write_document(path, &doc)?;
    Ok(path.to_path_buf())
}

/// Remove `key` from the top-level table of the config file (no-op if absent).
pub fn remove_value(path: &Path, key: &str) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let mut doc = read_document(path)?;
    if doc.remove(key).is_some() {
        write_document(path, &doc)?;
    }
    Ok(())
}

fn read_document(path: &Path) -> Result<DocumentMut> {
    if !path.exists() {
        return Ok("# pls configuration\n".parse::<DocumentMut>()?);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    contents
        .parse::<DocumentMut>()
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn write_document(path: &Path, doc: &DocumentMut) -> Result<()> {
    ensure_parent_dir(path)?;
    fs::write(path, doc.to_string())
        .with_context(|| format!("Failed to write config to {}", path.display()))
}
