//! User-facing messages and recovery hints for failed requests.

use crate::models::ProviderErrorKind;
use crate::streaming::StreamError;

/// Classification of errors for targeted hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    RateLimit,
    Overloaded,
    InvalidApiKey,
    InsufficientCredit,
    PermissionDenied,
    InvalidRequest,
    Provider,
    NetworkError,
    Interrupted,
}

/// A hint containing an error type, message, and suggested fix.
#[derive(Debug, Clone)]
pub struct ErrorHint {
    pub error_type: ErrorType,
    /// A user-friendly error message
    pub message: String,
    /// A suggested fix or recovery action, empty when there is none
    pub suggestion: String,
}

impl ErrorHint {
    #[must_use]
    pub fn new(
        error_type: ErrorType,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            error_type,
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }
}

impl ErrorType {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ErrorType::RateLimit => "rate limit",
            ErrorType::Overloaded => "overloaded",
            ErrorType::InvalidApiKey => "auth",
            ErrorType::InsufficientCredit => "billing",
            ErrorType::PermissionDenied => "permission",
            ErrorType::InvalidRequest => "request",
            ErrorType::Provider => "provider",
            ErrorType::NetworkError => "network",
            ErrorType::Interrupted => "interrupted",
        }
    }
}

/// Map a failed stream onto the message shown to the user.
#[must_use]
pub fn hint_for(error: &StreamError) -> ErrorHint {
    match error {
        StreamError::Provider { kind, message } => provider_hint(kind, message),
        StreamError::Connection(detail) => ErrorHint::new(
            ErrorType::NetworkError,
            format!("Connection error: {detail}"),
            "Please try again.",
        ),
        StreamError::Interrupted => ErrorHint::new(ErrorType::Interrupted, "Cancelled.", ""),
    }
}

fn provider_hint(kind: &ProviderErrorKind, message: &str) -> ErrorHint {
    match kind {
        ProviderErrorKind::RateLimit => ErrorHint::new(
            ErrorType::RateLimit,
            detailed("Rate limit exceeded", message),
            "Please wait a moment and try again.",
        ),
        ProviderErrorKind::Overloaded => ErrorHint::new(
            ErrorType::Overloaded,
            detailed("The provider is temporarily overloaded", message),
            "Please try again in a few minutes.",
        ),
        ProviderErrorKind::Authentication => ErrorHint::new(
            ErrorType::InvalidApiKey,
            detailed("Your API key was rejected", message),
            "Run `pls login` to set your API key.",
        ),
        ProviderErrorKind::InsufficientCredit => ErrorHint::new(
            ErrorType::InsufficientCredit,
            detailed("Your account is out of credit", message),
            "Add credit in your provider's billing console, then try again.",
        ),
        ProviderErrorKind::Permission => ErrorHint::new(
            ErrorType::PermissionDenied,
            detailed("Your API key does not have permission for this request", message),
            "Check the key's permissions or pick another model with `pls set model <name>`.",
        ),
        ProviderErrorKind::InvalidRequest => ErrorHint::new(
            ErrorType::InvalidRequest,
            detailed("The provider rejected the request", message),
            "Check the configured model and parameters with `pls set`.",
        ),
        ProviderErrorKind::Other(kind) => ErrorHint::new(
            ErrorType::Provider,
            format!("Provider error ({kind}): {message}"),
            "Please try again.",
        ),
    }
}

/// `summary: message`, or just the summary when the provider sent no text.
fn detailed(summary: &str, message: &str) -> String {
    match message.trim() {
        "" => summary.to_string(),
        message => format!("{summary}: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_provider_kind_has_distinct_message() {
        let kinds = [
            ProviderErrorKind::RateLimit,
            ProviderErrorKind::Overloaded,
            ProviderErrorKind::Authentication,
            ProviderErrorKind::InsufficientCredit,
            ProviderErrorKind::Permission,
            ProviderErrorKind::InvalidRequest,
            ProviderErrorKind::Other("api_error".to_string()),
        ];
        let messages: Vec<String> = kinds
            .iter()
            .map(|kind| provider_hint(kind, "details").message)
            .collect();
        for (index, message) in messages.iter().enumerate() {
            assert!(!messages[index + 1..].contains(message), "{message}");
        }
    }

    #[test]
    fn auth_errors_point_at_login() {
        let hint = hint_for(&StreamError::Provider {
            kind: ProviderErrorKind::Authentication,
            message: "invalid x-api-key".to_string(),
        });
        assert_eq!(hint.error_type, ErrorType::InvalidApiKey);
        assert!(hint.suggestion.contains("pls login"));
    }

    #[test]
    fn provider_messages_are_shown() {
        let hint = hint_for(&StreamError::Provider {
            kind: ProviderErrorKind::RateLimit,
            message: "50 requests per minute exceeded".to_string(),
        });
        assert_eq!(
            hint.message,
            "Rate limit exceeded: 50 requests per minute exceeded"
        );

        let hint = hint_for(&StreamError::Provider {
            kind: ProviderErrorKind::Overloaded,
            message: "  ".to_string(),
        });
        assert_eq!(hint.message, "The provider is temporarily overloaded");
    }

    #[test]
    fn connection_errors_ask_for_retry() {
        let hint = hint_for(&StreamError::Connection("reset by peer".to_string()));
        assert_eq!(hint.error_type.label(), "network");
        assert!(hint.message.contains("reset by peer"));
        assert_eq!(hint.suggestion, "Please try again.");
    }

    #[test]
    fn unknown_kinds_keep_their_name() {
        let hint = hint_for(&StreamError::Provider {
            kind: ProviderErrorKind::Other("api_error".to_string()),
            message: "Internal server error".to_string(),
        });
        assert!(hint.message.contains("api_error"));
        assert!(hint.message.contains("Internal server error"));
    }
}
