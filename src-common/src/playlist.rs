//! M3U playlist parsing and channel search.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::time::TimeOfDay;
use crate::types::ChannelInfo;

const EXTINF_PREFIX: &str = "#EXTINF";

static GROUP_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)group-title="(.*?)""#).unwrap());
static TVG_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)tvg-id="(.*?)""#).unwrap());
static TVG_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)tvg-name="(.*?)""#).unwrap());
static TVG_LOGO: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)tvg-logo="(.*?)""#).unwrap());
static TIME_IN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2}:\d{2})").unwrap());

/// Error type for playlist loading.
#[derive(Debug)]
pub enum PlaylistError {
    /// The playlist file could not be read
    Io(std::io::Error),
    /// The playlist contained no channels
    Empty,
}

impl std::fmt::Display for PlaylistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaylistError::Io(e) => write!(f, "Failed to read playlist: {}", e),
            PlaylistError::Empty => write!(f, "Playlist contains no channels"),
        }
    }
}

impl std::error::Error for PlaylistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlaylistError::Io(e) => Some(e),
            PlaylistError::Empty => None,
        }
    }
}

impl From<std::io::Error> for PlaylistError {
    fn from(e: std::io::Error) -> Self {
        PlaylistError::Io(e)
    }
}

fn attribute(re: &Regex, line: &str) -> String {
    re.captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn channel_name(line: &str) -> String {
    match line.split_once(',') {
        Some((_, name)) if !name.trim().is_empty() => name.trim().to_string(),
        _ => "Unknown".to_string(),
    }
}

/// Trailing digits of the URL with any file extension removed.
pub fn channel_code(url: &str) -> String {
    let mut stem = url;
    if let Some(dot) = url.rfind('.') {
        if url.rfind('/').map_or(true, |slash| dot > slash) {
            stem = &url[..dot];
        }
    }
    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);
    let digits = digits_start.map(|i| &stem[i..]).unwrap_or("");
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse M3U text into channel records, in file order.
///
/// Each `#EXTINF` line is paired with the line after it; entries whose URL
/// line is missing or blank are dropped.
pub fn parse(content: &str) -> Vec<ChannelInfo> {
    let mut channels = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        if !line.starts_with(EXTINF_PREFIX) {
            continue;
        }
        let url = match lines.next() {
            Some(u) if !u.trim().is_empty() => u.trim(),
            _ => continue,
        };
        channels.push(ChannelInfo {
            name: channel_name(line),
            url: url.to_string(),
            code: channel_code(url),
            group_title: attribute(&GROUP_TITLE, line),
            tvg_id: attribute(&TVG_ID, line),
            tvg_name: attribute(&TVG_NAME, line),
            tvg_logo: attribute(&TVG_LOGO, line),
        });
    }

    channels
}

/// Read and parse a playlist file.
pub fn parse_file(path: &Path) -> Result<Vec<ChannelInfo>, PlaylistError> {
    let content = std::fs::read_to_string(path)?;
    let channels = parse(&content);
    if channels.is_empty() {
        return Err(PlaylistError::Empty);
    }
    Ok(channels)
}

/// Keep channels whose group title matches one of `groups` (case-insensitive).
///
/// An empty group list keeps everything.
pub fn filter_groups(channels: Vec<ChannelInfo>, groups: &[String]) -> Vec<ChannelInfo> {
    if groups.is_empty() {
        return channels;
    }
    channels
        .into_iter()
        .filter(|c| groups.iter().any(|g| g.trim().eq_ignore_ascii_case(c.group_title.trim())))
        .collect()
}

/// Channels whose display name contains every whitespace-separated term.
pub fn search<'a>(channels: &'a [ChannelInfo], query: &str) -> Vec<&'a ChannelInfo> {
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    channels
        .iter()
        .filter(|c| {
            let name = c.display_name().to_lowercase();
            terms.iter().all(|t| name.contains(t.as_str()))
        })
        .collect()
}

/// A `H:MM` time embedded in a programme name, e.g. `"20:45 Golf"`.
pub fn start_time_in_name(name: &str) -> Option<TimeOfDay> {
    let caps = TIME_IN_NAME.captures(name)?;
    TimeOfDay::parse(&caps[1], crate::types::ClockFormat::TwentyFourHour).ok()
}
