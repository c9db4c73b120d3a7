//! Plain-text wrapping and inline code styling.

use colored::Colorize;
use unicode_width::UnicodeWidthStr;

/// Greedily pack whitespace-separated words into lines of at most `width`
/// columns. Words wider than `width` get a line of their own and are never
/// split. Every `\n`-separated paragraph starts a new line; empty paragraphs
/// become empty lines.
#[must_use]
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut words = paragraph.split_whitespace();
        let Some(first) = words.next() else {
            lines.push(String::new());
            continue;
        };

        let mut current = first.to_string();
        let mut current_width = first.width();
        for word in words {
            let word_width = word.width();
            if current_width + 1 + word_width <= width {
                current.push(' ');
                current.push_str(word);
                current_width += 1 + word_width;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
                current_width = word_width;
            }
        }
        lines.push(current);
    }

    lines
}

/// [`wrap`] joined back into one string.
#[must_use]
pub fn wrap_text(text: &str, width: usize) -> String {
    wrap(text, width).join("\n")
}

/// Bold every backtick-delimited span. Triple-backtick fences count as a
/// single backtick; an unmatched backtick styles everything after it.
#[must_use]
pub fn style_inline_code(text: &str) -> String {
    let collapsed = text.replace("```", "`");
    let mut styled = String::with_capacity(collapsed.len());
    for (index, span) in collapsed.split('`').enumerate() {
        if index % 2 == 1 {
            styled.push_str(&span.bold().to_string());
        } else {
            styled.push_str(span);
        }
    }
    styled
}

/// Fallback rendering: wrap each paragraph, then style inline code within it.
#[must_use]
pub fn render_plain(text: &str, width: usize) -> String {
    text.split('\n')
        .map(|paragraph| style_inline_code(&wrap_text(paragraph, width)))
        .collect::<Vec<_>>()
        .join("\n")
}
