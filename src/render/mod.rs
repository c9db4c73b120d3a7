//! Terminal rendering of model replies.
//!
//! Two paths share the same layout rules. Progressive output prints each
//! paragraph as soon as the stream completes it, wrapped as plain text.
//! Final output renders the whole reply as markdown and falls back to the
//! plain path whenever markdown rendering fails. Verbatim output (shell
//! commands meant to be pasted) skips both and keeps every line as sent.

mod diff;
mod markdown;
mod wrap;

use std::io::Write;

pub use diff::apply_diff_coloring;
pub use markdown::{MarkdownRenderer, RenderError, TerminalMarkdown};
pub use wrap::{render_plain, style_inline_code, wrap, wrap_text};

use crate::logging;
use crate::streaming::ParagraphSink;
use crate::ui::{self, Spinner};

/// Columns kept free on the right edge.
const MARGIN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    pub terminal_width: usize,
    pub markdown: bool,
    pub diff_coloring: bool,
    /// Print text exactly as received: no markdown, wrapping or styling.
    pub verbatim: bool,
    pub ansi: bool,
}

impl RenderConfig {
    /// Probe the terminal once for this invocation.
    #[must_use]
    pub fn probe(markdown: bool, color: bool) -> Self {
        Self {
            terminal_width: ui::terminal_width(),
            markdown,
            diff_coloring: false,
            verbatim: false,
            ansi: color && ui::stdout_is_terminal(),
        }
    }

    #[must_use]
    pub fn with_diff_coloring(mut self) -> Self {
        self.diff_coloring = true;
        self
    }

    #[must_use]
    pub fn with_verbatim(mut self) -> Self {
        self.verbatim = true;
        self
    }

    /// Width available to text after the margin.
    #[must_use]
    pub fn content_width(&self) -> usize {
        self.terminal_width.saturating_sub(MARGIN).max(1)
    }

    /// Make every styled string honor [`RenderConfig::ansi`].
    pub fn apply_color_mode(&self) {
        colored::control::set_override(self.ansi);
    }
}

pub struct Renderer {
    config: RenderConfig,
    markdown: Box<dyn MarkdownRenderer>,
}

impl Renderer {
    #[must_use]
    pub fn new(config: RenderConfig) -> Self {
        Self::with_markdown(config, Box::new(TerminalMarkdown))
    }

    #[must_use]
    pub fn with_markdown(config: RenderConfig, markdown: Box<dyn MarkdownRenderer>) -> Self {
        Self { config, markdown }
    }

    /// Markdown needs the whole document, so replies stream paragraph by
    /// paragraph only when markdown is off or the reply is verbatim.
    #[must_use]
    pub fn is_progressive(&self) -> bool {
        !self.config.markdown || self.config.verbatim
    }

    pub fn render_markdown(&self, text: &str) -> Result<String, RenderError> {
        if !self.config.markdown || self.config.verbatim {
            return Err(RenderError::Unavailable);
        }
        self.markdown.render(text, self.config.content_width())
    }

    /// Render a complete reply. Never fails: markdown errors fall back to
    /// wrapped plain text.
    #[must_use]
    pub fn render_final(&self, text: &str) -> String {
        if self.config.verbatim {
            return text.trim_end().to_string();
        }
        match self.render_markdown(text) {
            Ok(rendered) if self.config.diff_coloring => apply_diff_coloring(&rendered),
            Ok(rendered) => rendered,
            Err(err) => {
                if err != RenderError::Unavailable {
                    logging::info(format!("Falling back to plain output: {err}"));
                }
                render_plain(text, self.config.content_width())
            }
        }
    }

    /// Render one flushed paragraph for progressive output.
    #[must_use]
    pub fn render_paragraph(&self, text: &str) -> String {
        if self.config.verbatim {
            return text.to_string();
        }
        render_plain(text, self.config.content_width())
    }
}

/// Prints paragraphs as they complete, stopping the spinner before the
/// first write.
pub struct TerminalSink<'a, W: Write> {
    renderer: &'a Renderer,
    spinner: &'a mut Spinner,
    out: W,
    broken: bool,
}

impl<'a, W: Write> TerminalSink<'a, W> {
    pub fn new(renderer: &'a Renderer, spinner: &'a mut Spinner, out: W) -> Self {
        Self {
            renderer,
            spinner,
            out,
            broken: false,
        }
    }

    fn write(&mut self, text: &str) {
        self.spinner.stop();
        if self.broken {
            return;
        }
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(err) = result {
            logging::warn(format!("Failed to write output: {err}"));
            self.broken = true;
        }
    }
}

impl<W: Write> ParagraphSink for TerminalSink<'_, W> {
    fn paragraph(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let rendered = self.renderer.render_paragraph(text);
        self.write(&format!("{rendered}\n\n"));
    }

    fn finish(&mut self, remainder: &str) {
        if remainder.trim().is_empty() {
            self.spinner.stop();
            return;
        }
        let rendered = self.renderer.render_paragraph(remainder);
        self.write(&format!("{rendered}\n"));
    }
}

#[cfg(test)]
pub(crate) fn force_ansi() {
    colored::control::set_override(true);
}

#[cfg(test)]
mod tests {
    use colored::Colorize;
    use pretty_assertions::assert_eq;

    use super::*;

    struct Broken;

    impl MarkdownRenderer for Broken {
        fn render(&self, _text: &str, _width: usize) -> Result<String, RenderError> {
            Err(RenderError::TooNarrow { width: 0, min: 1 })
        }
    }

    fn config(markdown: bool) -> RenderConfig {
        RenderConfig {
            terminal_width: 44,
            markdown,
            diff_coloring: false,
            verbatim: false,
            ansi: true,
        }
    }

    #[test]
    fn content_width_keeps_margin() {
        assert_eq!(config(true).content_width(), 40);
        let tiny = RenderConfig {
            terminal_width: 2,
            ..config(true)
        };
        assert_eq!(tiny.content_width(), 1);
    }

    #[test]
    fn disabled_markdown_falls_back_to_plain() {
        force_ansi();
        let renderer = Renderer::new(config(false));
        assert_eq!(
            renderer.render_markdown("# hi"),
            Err(RenderError::Unavailable)
        );
        let text = "run `ls` now";
        assert_eq!(renderer.render_final(text), render_plain(text, 40));
        assert!(renderer.is_progressive());
    }

    #[test]
    fn failing_markdown_falls_back_to_plain() {
        force_ansi();
        let renderer = Renderer::with_markdown(config(true), Box::new(Broken));
        let text = "one two three\n\nfour";
        assert_eq!(renderer.render_final(text), render_plain(text, 40));
    }

    #[test]
    fn narrow_terminal_falls_back_to_plain() {
        force_ansi();
        let narrow = RenderConfig {
            terminal_width: 12,
            ..config(true)
        };
        let renderer = Renderer::new(narrow);
        let text = "- item with several words";
        assert_eq!(renderer.render_final(text), render_plain(text, 8));
    }

    #[test]
    fn diff_coloring_runs_after_markdown() {
        force_ansi();
        let renderer = Renderer::new(config(true).with_diff_coloring());
        let out = renderer.render_final("- bullet\n\n```diff\n+new\n-old\n```");
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines[0], "• bullet");
        assert!(lines.contains(&"+new".black().on_green().to_string().as_str()));
        assert!(lines.contains(&"-old".white().on_red().to_string().as_str()));
    }

    #[test]
    fn verbatim_keeps_shell_commands_intact() {
        force_ansi();
        let renderer = Renderer::new(config(true).with_verbatim());
        let commands = "find . -size +100M\nrm *tmp*\n# clean cache\nls -la `pwd`";

        assert!(renderer.is_progressive());
        assert_eq!(renderer.render_markdown(commands), Err(RenderError::Unavailable));
        assert_eq!(renderer.render_final(&format!("{commands}\n")), commands);
        assert_eq!(renderer.render_paragraph(commands), commands);
    }

    #[test]
    fn sink_prints_paragraphs_and_stops_spinner() {
        force_ansi();
        let renderer = Renderer::new(config(false));
        let mut spinner = Spinner::hidden();
        let mut out = Vec::new();
        {
            let mut sink = TerminalSink::new(&renderer, &mut spinner, &mut out);
            sink.paragraph("first paragraph");
            sink.paragraph("");
            sink.finish("last");
        }
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "first paragraph\n\nlast\n"
        );
        assert!(!spinner.is_running());
    }
}
