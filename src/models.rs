//! Provider-neutral chat and stream types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single streamed chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
}

/// Build alternating user/assistant turns from earlier texts, followed by
/// the new user prompt.
#[must_use]
pub fn conversation(history: &[&str], prompt: &str) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = history
        .iter()
        .enumerate()
        .map(|(index, text)| {
            if index % 2 == 0 {
                ChatMessage::user(*text)
            } else {
                ChatMessage::assistant(*text)
            }
        })
        .collect();
    messages.push(ChatMessage::user(prompt));
    messages
}

/// Provider error sub-kinds, named after the provider's `error.type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    RateLimit,
    Overloaded,
    Authentication,
    InsufficientCredit,
    Permission,
    InvalidRequest,
    Other(String),
}

impl ProviderErrorKind {
    #[must_use]
    pub fn from_type(kind: &str) -> Self {
        match kind {
            "rate_limit_error" | "rate_limit_exceeded" => ProviderErrorKind::RateLimit,
            "overloaded_error" | "server_overloaded" => ProviderErrorKind::Overloaded,
            "authentication_error" | "invalid_api_key" => ProviderErrorKind::Authentication,
            "insufficient_credit_error" | "insufficient_quota" => {
                ProviderErrorKind::InsufficientCredit
            }
            "permission_error" => ProviderErrorKind::Permission,
            "invalid_request_error" => ProviderErrorKind::InvalidRequest,
            other => ProviderErrorKind::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ProviderErrorKind::RateLimit => "rate_limit_error",
            ProviderErrorKind::Overloaded => "overloaded_error",
            ProviderErrorKind::Authentication => "authentication_error",
            ProviderErrorKind::InsufficientCredit => "insufficient_credit_error",
            ProviderErrorKind::Permission => "permission_error",
            ProviderErrorKind::InvalidRequest => "invalid_request_error",
            ProviderErrorKind::Other(kind) => kind,
        }
    }
}

/// One decoded unit of a provider stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    ContentDelta(String),
    Error {
        kind: ProviderErrorKind,
        message: String,
    },
    Done,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_alternates_roles() {
        let messages = conversation(&["how do I list files", "ls -la"], "explain");
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages[2].content, "explain");
    }

    #[test]
    fn known_error_kinds_keep_wire_names() {
        for name in [
            "rate_limit_error",
            "overloaded_error",
            "authentication_error",
            "insufficient_credit_error",
            "permission_error",
            "invalid_request_error",
        ] {
            assert_eq!(ProviderErrorKind::from_type(name).as_str(), name);
        }
        assert_eq!(
            ProviderErrorKind::from_type("weird_error"),
            ProviderErrorKind::Other("weird_error".to_string())
        );
    }
}
