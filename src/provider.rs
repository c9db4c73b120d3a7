//! Hosted LLM providers and their wire shapes.
//!
//! Each provider knows its endpoint, auth headers and request body layout, and
//! hands out the SSE decoder for its response stream. Groq speaks the OpenAI
//! chat-completions protocol under an `/openai` prefix.

use std::fmt;
use std::str::FromStr;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, InvalidHeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::models::{ChatRequest, Role};
use crate::sse::{AnthropicDecoder, EventDecoder, OpenAiDecoder};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Config files and the environment accept the same names, see [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(try_from = "String", into = "String")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    #[value(name = "openai")]
    OpenAi,
    Groq,
}

impl ProviderKind {
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-sonnet-4-20250514",
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Groq => "llama3-70b-8192",
        }
    }

    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Groq => "https://api.groq.com",
        }
    }

    /// Environment variable that carries this provider's key.
    #[must_use]
    pub const fn api_key_env(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
        }
    }

    /// Where users obtain a key, shown by `pls login`.
    #[must_use]
    pub const fn key_console_url(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "https://console.anthropic.com/settings/keys",
            ProviderKind::OpenAi => "https://platform.openai.com/api-keys",
            ProviderKind::Groq => "https://console.groq.com/keys",
        }
    }

    /// Config key `pls login` writes for this provider.
    #[must_use]
    pub const fn config_key(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic_api_key",
            ProviderKind::OpenAi => "openai_api_key",
            ProviderKind::Groq => "groq_api_key",
        }
    }

    #[must_use]
    pub fn endpoint(self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            ProviderKind::Anthropic => format!("{base}/v1/messages"),
            ProviderKind::OpenAi => format!("{base}/v1/chat/completions"),
            ProviderKind::Groq => format!("{base}/openai/v1/chat/completions"),
        }
    }

    pub fn headers(self, api_key: &str) -> Result<HeaderMap, InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match self {
            ProviderKind::Anthropic => {
                headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
                headers.insert(
                    "anthropic-version",
                    HeaderValue::from_static(ANTHROPIC_VERSION),
                );
            }
            ProviderKind::OpenAi | ProviderKind::Groq => {
                let mut value = HeaderValue::from_str(&format!("Bearer {api_key}"))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }
        Ok(headers)
    }

    /// Build the streaming request body for this provider.
    #[must_use]
    pub fn request_body(self, request: &ChatRequest) -> Value {
        match self {
            ProviderKind::Anthropic => {
                let messages: Vec<Value> = request
                    .messages
                    .iter()
                    .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
                    .collect();
                let mut body = json!({
                    "model": request.model,
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                    "messages": messages,
                    "stream": true,
                });
                if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
                    body["system"] = Value::String(system.to_string());
                }
                body
            }
            ProviderKind::OpenAi | ProviderKind::Groq => {
                let mut messages = Vec::with_capacity(request.messages.len() + 1);
                if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
                    messages.push(json!({ "role": Role::System.as_str(), "content": system }));
                }
                messages.extend(
                    request
                        .messages
                        .iter()
                        .map(|m| json!({ "role": m.role.as_str(), "content": m.content })),
                );
                json!({
                    "model": request.model,
                    "messages": messages,
                    "temperature": request.temperature,
                    "max_tokens": request.max_tokens,
                    "top_p": request.top_p,
                    "stream": true,
                })
            }
        }
    }

    /// Decoder for this provider's SSE payloads.
    #[must_use]
    pub fn decoder(self) -> Box<dyn EventDecoder + Send + Sync> {
        match self {
            ProviderKind::Anthropic => Box::new(AnthropicDecoder),
            ProviderKind::OpenAi | ProviderKind::Groq => Box::new(OpenAiDecoder),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Groq => "groq",
        };
        f.write_str(name)
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAi),
            "groq" => Ok(ProviderKind::Groq),
            other => Err(format!(
                "unknown provider '{other}' (expected anthropic, openai or groq)"
            )),
        }
    }
}

impl TryFrom<String> for ProviderKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProviderKind> for String {
    fn from(provider: ProviderKind) -> Self {
        provider.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "m".to_string(),
            system: Some("be brief".to_string()),
            messages: vec![
                ChatMessage::user("first"),
                ChatMessage::assistant("answer"),
                ChatMessage::user("again"),
            ],
            temperature: 0.5,
            max_tokens: 100,
            top_p: 0.9,
        }
    }

    #[test]
    fn anthropic_body_keeps_system_top_level() {
        let body = ProviderKind::Anthropic.request_body(&request());
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["stream"], true);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
    }

    #[test]
    fn openai_body_prepends_system_message() {
        let body = ProviderKind::Groq.request_body(&request());
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "be brief");
        assert!(body.get("system").is_none());
    }

    #[test]
    fn endpoints_per_provider() {
        assert_eq!(
            ProviderKind::Groq.endpoint("https://api.groq.com/"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert_eq!(
            ProviderKind::Anthropic.endpoint("http://localhost:1234"),
            "http://localhost:1234/v1/messages"
        );
    }

    #[test]
    fn headers_use_provider_auth_scheme() {
        let headers = ProviderKind::Anthropic.headers("k").unwrap();
        assert_eq!(headers["x-api-key"], "k");
        assert!(headers.get(AUTHORIZATION).is_none());

        let headers = ProviderKind::OpenAi.headers("k").unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer k");
    }

    #[test]
    fn parses_provider_names() {
        assert_eq!("OpenAI".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!("claude".parse::<ProviderKind>(), Ok(ProviderKind::Anthropic));
        assert!("bard".parse::<ProviderKind>().is_err());
    }
}
