//! Leveled stderr logging for the CLI.
//!
//! `-v` turns on info and warnings, `-vv` additionally dumps raw stream
//! payloads. Everything is a no-op at the default level so logging never
//! interleaves with the answer on stdout.

use std::sync::atomic::{AtomicU8, Ordering};

use colored::Colorize;

use crate::palette;
use crate::utils::truncate_with_ellipsis;

static VERBOSITY: AtomicU8 = AtomicU8::new(0);

const MAX_PAYLOAD_CHARS: usize = 400;

/// Set the verbosity level from the number of `-v` flags.
pub fn set_verbosity(level: u8) {
    VERBOSITY.store(level, Ordering::SeqCst);
}

#[must_use]
pub fn verbosity() -> u8 {
    VERBOSITY.load(Ordering::SeqCst)
}

/// Check whether info/warn output is enabled.
#[must_use]
pub fn is_verbose() -> bool {
    verbosity() >= 1
}

/// Emit an info message (`-v`).
pub fn info(message: impl AsRef<str>) {
    if is_verbose() {
        emit("info", palette::BLUE_RGB, message.as_ref());
    }
}

/// Emit a warning (`-v`).
pub fn warn(message: impl AsRef<str>) {
    if is_verbose() {
        emit("warn", palette::ORANGE_RGB, message.as_ref());
    }
}

/// Emit a raw wire payload (`-vv`), truncated to keep the terminal readable.
pub fn payload(direction: &str, raw: &str) {
    if verbosity() >= 2 {
        let shown = truncate_with_ellipsis(raw, MAX_PAYLOAD_CHARS, "…");
        emit("wire", palette::SILVER_RGB, &format!("{direction} {shown}"));
    }
}

fn emit(label: &str, (r, g, b): (u8, u8, u8), message: &str) {
    eprintln!("{} {}", label.truecolor(r, g, b).bold(), message);
}
