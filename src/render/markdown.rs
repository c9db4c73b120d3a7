//! Markdown to styled terminal text.
//!
//! Renders a whole reply at once: headings, emphasis, inline code, lists,
//! block quotes, rules and fenced code. Paragraphs are re-wrapped to the
//! available width. Code blocks are emitted line for line and never wrapped,
//! so diffs keep their `+`/`-` markers in the first column.

use colored::Colorize;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, LinkType, Options, Parser, Tag, TagEnd};
use unicode_width::UnicodeWidthStr;

/// Narrowest layout width the renderer accepts.
pub const MIN_WIDTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("markdown rendering is disabled")]
    Unavailable,
    #[error("terminal width {width} is below the {min} columns markdown needs")]
    TooNarrow { width: usize, min: usize },
}

/// Turns a complete markdown document into printable text.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, text: &str, width: usize) -> Result<String, RenderError>;
}

/// Default renderer built on pulldown-cmark.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalMarkdown;

impl MarkdownRenderer for TerminalMarkdown {
    fn render(&self, text: &str, width: usize) -> Result<String, RenderError> {
        if width < MIN_WIDTH {
            return Err(RenderError::TooNarrow {
                width,
                min: MIN_WIDTH,
            });
        }
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut writer = Writer::new(width);
        for event in Parser::new_ext(text, options) {
            writer.handle(event);
        }
        Ok(writer.finish())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct InlineStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    strike: bool,
    dim: bool,
}

impl InlineStyle {
    fn union(self, other: InlineStyle) -> InlineStyle {
        InlineStyle {
            bold: self.bold || other.bold,
            italic: self.italic || other.italic,
            underline: self.underline || other.underline,
            strike: self.strike || other.strike,
            dim: self.dim || other.dim,
        }
    }

    fn paint(self, text: &str) -> String {
        if self == InlineStyle::default() {
            return text.to_string();
        }
        let mut styled = text.normal();
        if self.bold {
            styled = styled.bold();
        }
        if self.italic {
            styled = styled.italic();
        }
        if self.underline {
            styled = styled.underline();
        }
        if self.strike {
            styled = styled.strikethrough();
        }
        if self.dim {
            styled = styled.dimmed();
        }
        styled.to_string()
    }
}

enum Inline {
    Text(String, InlineStyle),
    Code(String),
    Break,
}

/// A word ready for packing: its styled form and its display width.
enum Token {
    Word { rendered: String, width: usize },
    Break,
}

struct ListLevel {
    next_number: Option<u64>,
    indent: usize,
}

struct CodeBlock {
    plain: bool,
    text: String,
}

struct Writer {
    width: usize,
    lines: Vec<String>,
    inline: Vec<Inline>,
    styles: Vec<InlineStyle>,
    links: Vec<Option<String>>,
    lists: Vec<ListLevel>,
    quote_depth: usize,
    pending_marker: Option<String>,
    code_block: Option<CodeBlock>,
}

impl Writer {
    fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
            inline: Vec::new(),
            styles: Vec::new(),
            links: Vec::new(),
            lists: Vec::new(),
            quote_depth: 0,
            pending_marker: None,
            code_block: None,
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match self.code_block.as_mut() {
                Some(block) => block.text.push_str(&text),
                None => self.push_text(&text),
            },
            Event::Code(code) => self.inline.push(Inline::Code(code.to_string())),
            Event::Html(html) | Event::InlineHtml(html) => self.push_text(&html),
            Event::SoftBreak => self.push_text(" "),
            Event::HardBreak => self.inline.push(Inline::Break),
            Event::Rule => {
                self.flush_inline();
                self.start_block();
                let prefix = self.content_prefix();
                let rule = "─".repeat(self.width.saturating_sub(prefix.width()));
                self.lines.push(format!("{prefix}{}", rule.dimmed()));
            }
            Event::TaskListMarker(checked) => {
                self.push_text(if checked { "[x] " } else { "[ ] " });
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.start_block(),
            Tag::Heading { level, .. } => {
                self.flush_inline();
                self.start_block();
                self.styles.push(InlineStyle {
                    bold: true,
                    underline: level == HeadingLevel::H1,
                    ..InlineStyle::default()
                });
            }
            Tag::BlockQuote(_) => {
                self.flush_inline();
                self.start_block();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush_inline();
                self.start_block();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or_default().to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                self.code_block = Some(CodeBlock {
                    plain: matches!(lang.as_str(), "diff" | "patch"),
                    text: String::new(),
                });
            }
            Tag::List(start) => {
                self.flush_inline();
                if self.lists.is_empty() {
                    self.start_block();
                }
                self.lists.push(ListLevel {
                    next_number: start,
                    indent: 2,
                });
            }
            Tag::Item => {
                self.flush_inline();
                if let Some(level) = self.lists.last_mut() {
                    let marker = match level.next_number.as_mut() {
                        Some(number) => {
                            let marker = format!("{number}. ");
                            *number += 1;
                            marker
                        }
                        None => "• ".to_string(),
                    };
                    level.indent = marker.width();
                    self.pending_marker = Some(marker);
                }
            }
            Tag::Emphasis => self.push_style(InlineStyle {
                italic: true,
                ..InlineStyle::default()
            }),
            Tag::Strong => self.push_style(InlineStyle {
                bold: true,
                ..InlineStyle::default()
            }),
            Tag::Strikethrough => self.push_style(InlineStyle {
                strike: true,
                ..InlineStyle::default()
            }),
            Tag::Link {
                link_type,
                dest_url,
                ..
            } => {
                self.push_style(InlineStyle {
                    underline: true,
                    ..InlineStyle::default()
                });
                let shown = !matches!(link_type, LinkType::Autolink | LinkType::Email)
                    && !dest_url.is_empty();
                self.links.push(shown.then(|| dest_url.to_string()));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush_inline(),
            TagEnd::Heading(_) => {
                self.flush_inline();
                self.styles.pop();
            }
            TagEnd::BlockQuote(_) => {
                self.flush_inline();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock => self.flush_code_block(),
            TagEnd::List(_) => {
                self.flush_inline();
                self.lists.pop();
            }
            TagEnd::Item => {
                self.flush_inline();
                if let Some(marker) = self.pending_marker.take() {
                    let prefix = self.marker_prefix(&marker);
                    self.lines.push(prefix.trim_end().to_string());
                }
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link => {
                self.styles.pop();
                if let Some(Some(url)) = self.links.pop() {
                    self.inline.push(Inline::Text(
                        format!(" ({url})"),
                        InlineStyle {
                            dim: true,
                            ..InlineStyle::default()
                        },
                    ));
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> String {
        self.flush_inline();
        if self.code_block.is_some() {
            self.flush_code_block();
        }
        while self.lines.last().is_some_and(String::is_empty) {
            self.lines.pop();
        }
        self.lines.join("\n")
    }

    fn push_style(&mut self, style: InlineStyle) {
        self.styles.push(style);
    }

    fn current_style(&self) -> InlineStyle {
        self.styles
            .iter()
            .fold(InlineStyle::default(), |acc, style| acc.union(*style))
    }

    fn push_text(&mut self, text: &str) {
        let style = self.current_style();
        self.inline.push(Inline::Text(text.to_string(), style));
    }

    /// Separate top-level blocks with one blank line. List items stay tight.
    fn start_block(&mut self) {
        if !self.lists.is_empty() {
            return;
        }
        if self.lines.last().is_some_and(|line| !line.is_empty()) {
            self.lines.push(String::new());
        }
    }

    fn quote_prefix(&self) -> String {
        "│ ".repeat(self.quote_depth)
    }

    fn content_prefix(&self) -> String {
        let indent: usize = self.lists.iter().map(|level| level.indent).sum();
        format!("{}{}", self.quote_prefix(), " ".repeat(indent))
    }

    fn marker_prefix(&self, marker: &str) -> String {
        let outer: usize = self
            .lists
            .iter()
            .rev()
            .skip(1)
            .map(|level| level.indent)
            .sum();
        format!("{}{}{marker}", self.quote_prefix(), " ".repeat(outer))
    }

    fn flush_inline(&mut self) {
        if self.inline.is_empty() {
            return;
        }
        let tokens = tokenize(std::mem::take(&mut self.inline));
        let rest_prefix = self.content_prefix();
        let first_prefix = match self.pending_marker.take() {
            Some(marker) => self.marker_prefix(&marker),
            None => rest_prefix.clone(),
        };
        let available = self.width.saturating_sub(rest_prefix.width()).max(1);

        for (index, line) in pack(tokens, available).into_iter().enumerate() {
            let prefix = if index == 0 { &first_prefix } else { &rest_prefix };
            self.lines.push(format!("{prefix}{line}").trim_end().to_string());
        }
    }

    fn flush_code_block(&mut self) {
        let Some(block) = self.code_block.take() else {
            return;
        };
        let prefix = self.content_prefix();
        for line in block.text.trim_end_matches('\n').split('\n') {
            let body = if block.plain {
                line.to_string()
            } else {
                line.cyan().to_string()
            };
            self.lines.push(format!("{prefix}{body}"));
        }
    }
}

/// Split inline content into words. Styles may change inside a word; inline
/// code spans never break.
fn tokenize(inline: Vec<Inline>) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rendered = String::new();
    let mut width = 0;

    fn end_word(tokens: &mut Vec<Token>, rendered: &mut String, width: &mut usize) {
        if *width > 0 || !rendered.is_empty() {
            tokens.push(Token::Word {
                rendered: std::mem::take(rendered),
                width: std::mem::take(width),
            });
        }
    }

    for piece in inline {
        match piece {
            Inline::Text(text, style) => {
                let mut segment = String::new();
                for ch in text.chars() {
                    if ch.is_whitespace() {
                        if !segment.is_empty() {
                            width += segment.width();
                            rendered.push_str(&style.paint(&segment));
                            segment.clear();
                        }
                        end_word(&mut tokens, &mut rendered, &mut width);
                    } else {
                        segment.push(ch);
                    }
                }
                if !segment.is_empty() {
                    width += segment.width();
                    rendered.push_str(&style.paint(&segment));
                }
            }
            Inline::Code(code) => {
                width += code.width();
                rendered.push_str(&code.bold().cyan().to_string());
            }
            Inline::Break => {
                end_word(&mut tokens, &mut rendered, &mut width);
                tokens.push(Token::Break);
            }
        }
    }
    end_word(&mut tokens, &mut rendered, &mut width);
    tokens
}

fn pack(tokens: Vec<Token>, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for token in tokens {
        match token {
            Token::Word {
                rendered,
                width: word_width,
            } => {
                if current.is_empty() {
                    current = rendered;
                    current_width = word_width;
                } else if current_width + 1 + word_width <= width {
                    current.push(' ');
                    current.push_str(&rendered);
                    current_width += 1 + word_width;
                } else {
                    lines.push(std::mem::replace(&mut current, rendered));
                    current_width = word_width;
                }
            }
            Token::Break => {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
