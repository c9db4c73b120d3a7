//! Added/removed line highlighting for rendered diff reviews.

use colored::Colorize;

/// Color every line that starts with `+` (black on green) or `-` (white on
/// red). Other lines pass through untouched. Apply to rendered output only.
#[must_use]
pub fn apply_diff_coloring(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.starts_with('+') {
                line.black().on_green().to_string()
            } else if line.starts_with('-') {
                line.white().on_red().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
