//! Destination path construction.
//!
//! Layout: `<root>/<folder>/<date>_<start>_<stop>/<base>.ts`. The result is
//! a pure function of its inputs, so a resume successor started on the same
//! date computes the same path as its predecessor.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::tags::extract_tags;
use crate::time::TimeOfDay;
use crate::types::ChannelMeta;

/// Recording container extension.
pub const FILE_EXTENSION: &str = ".ts";

/// Longest file name allowed, extension included.
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Replacement for sanitized-away empty names.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Poster file written next to the recording.
pub const POSTER_FILE: &str = "poster.jpg";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// Make a string safe as a single path component.
pub fn sanitize(input: &str) -> String {
    if input.is_empty() {
        return UNKNOWN_NAME.to_string();
    }
    let s = WHITESPACE.replace_all(input, "_");
    let s = UNSAFE.replace_all(&s, "_");
    let s = UNDERSCORES.replace_all(&s, "_");
    s.trim_matches('_').to_string()
}

/// Where a recording and its poster go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Per-channel folder directly under the root
    pub channel_dir: PathBuf,
    /// Per-event folder holding the recording and its poster
    pub event_dir: PathBuf,
    /// The `.ts` file
    pub file: PathBuf,
}

impl Destination {
    pub fn poster_path(&self) -> PathBuf {
        self.event_dir.join(POSTER_FILE)
    }
}

/// Compute the destination for a recording made today (in `tz`).
pub fn destination_path(
    root: &Path,
    channel: &ChannelMeta,
    tz: Tz,
    start: TimeOfDay,
    stop: TimeOfDay,
    now: DateTime<Utc>,
) -> Destination {
    let date = now.with_timezone(&tz).format("%Y_%m_%d").to_string();
    let window = format!("{}_{}_{}", date, start.compact(), stop.compact());

    let group = sanitize(channel.group_title.trim());
    let display = channel.display_name.trim();

    let (folder, mut base) = if channel.tvg_id.trim().is_empty() {
        let mut base = group.clone();
        for tag in extract_tags(display) {
            base.push('_');
            base.push_str(&tag);
        }
        base.push('_');
        base.push_str(&window);
        (group, base)
    } else if !display.is_empty() {
        let folder = sanitize(display);
        let base = format!("{}_{}", folder, window);
        (folder, base)
    } else {
        let base = format!("{}_{}", group, window);
        (group, base)
    };

    let limit = MAX_FILENAME_LENGTH - FILE_EXTENSION.len();
    if base.len() > limit {
        // sanitized output is ASCII
        base.truncate(limit);
    }
    let file_name = format!("{}{}", base, FILE_EXTENSION).replace('+', "plus");

    let channel_dir = root.join(&folder);
    let event_dir = channel_dir.join(&window);
    Destination {
        file: event_dir.join(file_name),
        channel_dir,
        event_dir,
    }
}
