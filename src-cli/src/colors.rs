//! Terminal styling for launcher output.
//!
//! Styles apply only when the target stream is a terminal, so piped output
//! and `--json` consumers see plain text.

use std::io::IsTerminal;

use owo_colors::OwoColorize;

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn is_terminal(self) -> bool {
        match self {
            Stream::Stdout => std::io::stdout().is_terminal(),
            Stream::Stderr => std::io::stderr().is_terminal(),
        }
    }
}

fn paint<F>(stream: Stream, msg: &str, style: F) -> String
where
    F: FnOnce(&str) -> String,
{
    if stream.is_terminal() {
        style(msg)
    } else {
        msg.to_string()
    }
}

/// Pad to `width` before styling so escape codes do not break alignment.
pub fn pad_left<F>(msg: &str, width: usize, color_fn: F) -> String
where
    F: FnOnce(&str) -> String,
{
    color_fn(&format!("{:<width$}", msg))
}

pub fn error(msg: &str) -> String {
    let label = paint(Stream::Stderr, "error:", |s| s.red().bold().to_string());
    format!("{} {}", label, msg)
}

pub fn warning(msg: &str) -> String {
    let label = paint(Stream::Stderr, "warning:", |s| s.yellow().bold().to_string());
    format!("{} {}", label, msg)
}

pub fn success(msg: &str) -> String {
    paint(Stream::Stdout, msg, |s| s.green().bold().to_string())
}

pub fn dim(msg: &str) -> String {
    paint(Stream::Stdout, msg, |s| s.dimmed().to_string())
}

pub fn bold(msg: &str) -> String {
    paint(Stream::Stdout, msg, |s| s.bold().to_string())
}

pub fn header(msg: &str) -> String {
    paint(Stream::Stdout, msg, |s| s.bold().blue().to_string())
}

/// File paths and URLs.
pub fn path(msg: &str) -> String {
    paint(Stream::Stdout, msg, |s| s.underline().to_string())
}

/// Channel codes and pids.
pub fn number(msg: &str) -> String {
    paint(Stream::Stdout, msg, |s| s.cyan().to_string())
}
