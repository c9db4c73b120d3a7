//! Command implementations behind the `pls` CLI.
//!
//! Every model-backed command goes through [`App::ask`], which owns the
//! spinner, progressive printing, Ctrl-C handling and final rendering.

pub mod ask;
pub mod review;
pub mod setup;

use std::io::{self, Write};

use anyhow::Result;
use colored::Colorize;

use crate::client::ChatClient;
use crate::config::Config;
use crate::history::{Exchange, HistoryStore};
use crate::logging;
use crate::models::{ChatRequest, conversation};
use crate::prompts::with_user_prompt;
use crate::render::{RenderConfig, Renderer, TerminalSink};
use crate::streaming::{Discard, ParagraphSink, StreamError};
use crate::ui::Spinner;

/// Whether a reply is shown to the user or only returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Print,
    Silent,
}

/// One request to the model.
#[derive(Debug, Clone)]
pub struct Query {
    pub system: String,
    /// Earlier turns, alternating user/assistant, starting with user.
    pub history: Vec<String>,
    pub prompt: String,
    pub diff_coloring: bool,
    /// The reply is shell commands and must be printed exactly as sent.
    pub verbatim: bool,
}

impl Query {
    pub fn new(system: String, prompt: impl Into<String>) -> Self {
        Self {
            system,
            history: Vec::new(),
            prompt: prompt.into(),
            diff_coloring: false,
            verbatim: false,
        }
    }

    #[must_use]
    pub fn with_history(mut self, exchange: &Exchange) -> Self {
        self.history = exchange.turns().iter().map(|turn| (*turn).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_diff_coloring(mut self) -> Self {
        self.diff_coloring = true;
        self
    }

    #[must_use]
    pub fn verbatim(mut self) -> Self {
        self.verbatim = true;
        self
    }
}

/// Everything a command needs: resolved config, output settings and the
/// follow-up history.
pub struct App {
    config: Config,
    render: RenderConfig,
    history: Box<dyn HistoryStore>,
}

impl App {
    pub fn new(config: Config, render: RenderConfig, history: Box<dyn HistoryStore>) -> Self {
        Self {
            config,
            render,
            history,
        }
    }

    #[must_use]
    pub fn history(&self) -> &dyn HistoryStore {
        self.history.as_ref()
    }

    /// Send `query` and return the full reply. Printed replies stream
    /// paragraph by paragraph when markdown is off and are rendered once at
    /// the end otherwise.
    pub async fn ask(&self, query: Query, output: Output) -> Result<String> {
        self.ask_into(query, output, io::stdout()).await
    }

    async fn ask_into<W: Write>(
        &self,
        query: Query,
        output: Output,
        mut out: W,
    ) -> Result<String> {
        let client = ChatClient::new(&self.config)?;
        let request = self.request(&query);

        let mut render = self.render;
        if query.diff_coloring {
            render = render.with_diff_coloring();
        }
        if query.verbatim {
            render = render.with_verbatim();
        }
        let renderer = Renderer::new(render);
        let progressive = output == Output::Print && renderer.is_progressive();

        let mut spinner = Spinner::start("Thinking...");
        let result = if progressive {
            let mut sink = TerminalSink::new(&renderer, &mut spinner, &mut out);
            stream_until_interrupted(&client, &request, &mut sink).await
        } else {
            stream_until_interrupted(&client, &request, &mut Discard).await
        };
        spinner.stop();

        let text = result?;
        if output == Output::Print && !progressive && !text.is_empty() {
            writeln!(out, "{}", renderer.render_final(&text))?;
        }
        Ok(text)
    }

    /// Persist the exchange for follow-ups. Failures only warn.
    pub fn remember(&self, exchange: &Exchange) {
        if let Err(err) = self.history.save_last(exchange) {
            eprintln!(
                "Error saving history: {err:#}. Run {} to reset.",
                "pls clear".bold()
            );
        }
    }

    fn request(&self, query: &Query) -> ChatRequest {
        let history: Vec<&str> = query.history.iter().map(String::as_str).collect();
        ChatRequest {
            model: self.config.model(),
            system: Some(with_user_prompt(query.system.clone(), self.config.prompt.as_deref())),
            messages: conversation(&history, &query.prompt),
            temperature: self.config.temperature(),
            max_tokens: self.config.max_tokens(),
            top_p: self.config.top_p(),
        }
    }
}

async fn stream_until_interrupted(
    client: &ChatClient,
    request: &ChatRequest,
    sink: &mut dyn ParagraphSink,
) -> Result<String, StreamError> {
    tokio::select! {
        result = client.stream_chat(request, sink) => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            logging::info("Interrupted, dropping the response");
            Err(StreamError::Interrupted)
        }
    }
}

/// Italic hint printed after an answer.
pub(crate) fn print_footer(text: &str) {
    println!("{}", text.italic());
    println!();
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use serde_json::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::RetryConfig;
    use crate::history::FileHistoryStore;
    use crate::provider::ProviderKind;

    /// A mock Anthropic endpoint that streams `reply` once per request.
    pub async fn mock_reply(reply: &str) -> MockServer {
        mock_stream(&[reply]).await
    }

    /// A mock Anthropic endpoint that streams `deltas` in order.
    pub async fn mock_stream(deltas: &[&str]) -> MockServer {
        let server = MockServer::start().await;
        let mut body = String::new();
        for text in deltas {
            let delta = serde_json::json!({
                "type": "content_block_delta",
                "index": 0,
                "delta": { "type": "text_delta", "text": text }
            });
            body.push_str(&format!("event: content_block_delta\ndata: {delta}\n\n"));
        }
        body.push_str("event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;
        server
    }

    pub fn app_for(server: &MockServer, dir: &Path) -> App {
        let config = Config {
            provider: Some(ProviderKind::Anthropic),
            api_key: Some("test-key".to_string()),
            base_url: Some(server.uri()),
            retry: Some(RetryConfig {
                enabled: Some(false),
                ..RetryConfig::default()
            }),
            ..Config::default()
        };
        let render = RenderConfig {
            terminal_width: 80,
            markdown: true,
            diff_coloring: false,
            verbatim: false,
            ansi: false,
        };
        let history = FileHistoryStore::new(dir.join("last_output.json"));
        App::new(config, render, Box::new(history))
    }

    /// JSON bodies of every request the mock server received.
    pub async fn request_bodies(server: &MockServer) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::test_support::{app_for, mock_reply, mock_stream, request_bodies};
    use super::*;
    use crate::history::Action;

    #[tokio::test]
    async fn ask_sends_history_and_user_prompt() {
        let server = mock_reply("Sure.").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app_for(&server, dir.path());
        app.config.prompt = Some("Answer in French.".to_string());

        let previous = Exchange::new("list files", Action::Cmd, "ls -la");
        let query = Query::new("system text".to_string(), "what is -a?").with_history(&previous);
        let reply = app.ask(query, Output::Silent).await.expect("reply");
        assert_eq!(reply, "Sure.");

        let bodies = request_bodies(&server).await;
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["system"], "system text\n\nAnswer in French.");
        assert_eq!(
            bodies[0]["messages"],
            json!([
                { "role": "user", "content": "list files" },
                { "role": "assistant", "content": "ls -la" },
                { "role": "user", "content": "what is -a?" }
            ])
        );
    }

    #[tokio::test]
    async fn progressive_output_is_written_once() {
        let server = mock_stream(&["First para", "graph.\n\nSecond ", "one."]).await;
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app_for(&server, dir.path());
        app.render.markdown = false;

        let mut out = Vec::new();
        let reply = app
            .ask_into(Query::new(String::new(), "hi"), Output::Print, &mut out)
            .await
            .expect("reply");
        assert_eq!(reply, "First paragraph.\n\nSecond one.");

        let printed = String::from_utf8(out).expect("utf8");
        assert_eq!(printed, "First paragraph.\n\nSecond one.\n");
        assert_eq!(printed.matches("First paragraph.").count(), 1);
    }

    #[tokio::test]
    async fn markdown_output_is_rendered_at_the_end() {
        let server = mock_reply("Use **care**.").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_for(&server, dir.path());

        let mut out = Vec::new();
        app.ask_into(Query::new(String::new(), "hi"), Output::Print, &mut out)
            .await
            .expect("reply");
        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.contains("care"));
        assert!(!printed.contains("**"));
        assert_eq!(printed.lines().count(), 1);
    }

    #[tokio::test]
    async fn shell_commands_print_verbatim_with_markdown_on() {
        let commands = "find . -size +100M\nrm *tmp*\n# clean cache\nls -la";
        let server = mock_reply(commands).await;
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_for(&server, dir.path());

        let mut out = Vec::new();
        app.ask_into(
            Query::new(String::new(), "clean up").verbatim(),
            Output::Print,
            &mut out,
        )
        .await
        .expect("reply");
        assert_eq!(String::from_utf8(out).expect("utf8"), format!("{commands}\n"));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_sending() {
        let server = mock_reply("unused").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app_for(&server, dir.path());
        app.config.api_key = None;

        let err = app
            .ask(Query::new(String::new(), "hi"), Output::Silent)
            .await
            .expect_err("no key");
        assert!(err.to_string().contains("pls login"));
        assert!(request_bodies(&server).await.is_empty());
    }
}
