//! HTTP client for streamed chat completions.
//!
//! This module centralizes retry behavior, provider headers and the hand-off
//! from the HTTP body to the stream consumer.

use std::io;

use anyhow::{Context, Result};
use futures_util::TryStreamExt;
use reqwest::StatusCode;
use tokio_util::io::StreamReader;

use crate::config::{Config, RetryPolicy};
use crate::logging;
use crate::models::{ChatRequest, ProviderErrorKind};
use crate::provider::ProviderKind;
use crate::sse;
use crate::streaming::{self, ParagraphSink, StreamError};
use crate::utils::truncate_with_ellipsis;

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Client bound to one provider, endpoint and API key.
#[derive(Clone)]
#[must_use]
pub struct ChatClient {
    http_client: reqwest::Client,
    provider: ProviderKind,
    endpoint: String,
    retry: RetryPolicy,
}

impl ChatClient {
    pub fn new(config: &Config) -> Result<Self> {
        let provider = config.provider();
        let base_url = config.base_url();
        let api_key = config.api_key()?;
        let retry = config.retry_policy();

        logging::info(format!("Provider: {provider}, base URL: {base_url}"));
        logging::info(format!(
            "Retry policy: enabled={}, max_retries={}, initial_delay={}s, max_delay={}s",
            retry.enabled, retry.max_retries, retry.initial_delay, retry.max_delay
        ));

        let headers = provider
            .headers(&api_key)
            .context("API key contains characters that are not valid in a header")?;
        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.read_timeout(timeout);
        }
        let http_client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            provider,
            endpoint: provider.endpoint(&base_url),
            retry,
        })
    }

    /// Send `request` and consume the streamed reply, passing completed
    /// paragraphs to `sink`. Returns the full reply text.
    pub async fn stream_chat(
        &self,
        request: &ChatRequest,
        sink: &mut dyn ParagraphSink,
    ) -> Result<String, StreamError> {
        let body = self.provider.request_body(request);
        logging::payload("->", &body.to_string());

        let response = send_with_retry(&self.retry, || {
            self.http_client.post(&self.endpoint).json(&body)
        })
        .await?;

        let bytes = response.bytes_stream().map_err(io::Error::other);
        let reader = StreamReader::new(Box::pin(bytes));
        let decoder = self.provider.decoder();
        streaming::consume(reader, decoder.as_ref(), sink).await
    }
}

// === Retry ===

async fn send_with_retry<F>(
    policy: &RetryPolicy,
    mut build: F,
) -> Result<reqwest::Response, StreamError>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut attempt: u32 = 0;

    loop {
        match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                if !policy.enabled || !retryable || attempt >= policy.max_retries {
                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|e| format!("(failed to read body: {e})"));
                    return Err(http_error(status, &text));
                }
                logging::warn(format!(
                    "Retryable HTTP {} (attempt {} of {})",
                    status.as_u16(),
                    attempt + 1,
                    policy.max_retries + 1
                ));
            }
            Err(err) => {
                if !policy.enabled || attempt >= policy.max_retries {
                    return Err(StreamError::Connection(err.to_string()));
                }
                logging::warn(format!(
                    "Request error: {} (attempt {} of {})",
                    err,
                    attempt + 1,
                    policy.max_retries + 1
                ));
            }
        }

        let delay = policy.delay_for_attempt(attempt);
        attempt += 1;
        logging::info(format!("Retrying after {:.2}s", delay.as_secs_f64()));
        tokio::time::sleep(delay).await;
    }
}

/// Map a failed response onto a provider error. The body's `error.type`
/// wins unless the status code is more specific.
fn http_error(status: StatusCode, body: &str) -> StreamError {
    logging::warn(format!("HTTP {status}: {body}"));
    let by_status = status_kind(status);

    match sse::error_body(body) {
        Some((kind, message)) => {
            let kind = match (kind, by_status) {
                (
                    ProviderErrorKind::InvalidRequest | ProviderErrorKind::Other(_),
                    Some(specific),
                ) => specific,
                (kind, _) => kind,
            };
            StreamError::Provider { kind, message }
        }
        None => {
            let message = match body.trim() {
                "" => status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
                text => truncate_with_ellipsis(text, MAX_ERROR_BODY_CHARS, "…"),
            };
            let kind = by_status
                .unwrap_or_else(|| ProviderErrorKind::Other(format!("http_{}", status.as_u16())));
            StreamError::Provider { kind, message }
        }
    }
}

fn status_kind(status: StatusCode) -> Option<ProviderErrorKind> {
    match status.as_u16() {
        401 => Some(ProviderErrorKind::Authentication),
        402 => Some(ProviderErrorKind::InsufficientCredit),
        403 => Some(ProviderErrorKind::Permission),
        429 => Some(ProviderErrorKind::RateLimit),
        503 | 529 => Some(ProviderErrorKind::Overloaded),
        _ => None,
    }
}
