//! Shared types for scheduled recordings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A channel record parsed from an M3U playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Text after the first comma of the `#EXTINF` line
    pub name: String,
    /// Stream URL
    pub url: String,
    /// Trailing digits of the URL (`"0"` when there are none)
    pub code: String,
    #[serde(default)]
    pub group_title: String,
    #[serde(default)]
    pub tvg_id: String,
    #[serde(default)]
    pub tvg_name: String,
    #[serde(default)]
    pub tvg_logo: String,
}

impl ChannelInfo {
    /// Name shown to users: `tvg-name` when present, else the `#EXTINF` name.
    pub fn display_name(&self) -> &str {
        if self.tvg_name.trim().is_empty() {
            &self.name
        } else {
            &self.tvg_name
        }
    }

    /// The subset of channel data a recording carries.
    pub fn meta(&self) -> ChannelMeta {
        ChannelMeta {
            display_name: self.display_name().trim().to_string(),
            group_title: self.group_title.trim().to_string(),
            tvg_id: self.tvg_id.trim().to_string(),
            tvg_logo: self.tvg_logo.trim().to_string(),
        }
    }
}

/// Channel metadata attached to a recording request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMeta {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub group_title: String,
    #[serde(default)]
    pub tvg_id: String,
    #[serde(default)]
    pub tvg_logo: String,
}

/// How the stream is persisted to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Remux through an external ffmpeg process
    #[serde(rename = "ffmpeg")]
    ExternalMux,
    /// Copy the HTTP body to a file in-process
    #[serde(rename = "regular")]
    StreamCopy,
}

impl CaptureMode {
    /// Token used on the scheduler command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::ExternalMux => "ffmpeg",
            CaptureMode::StreamCopy => "regular",
        }
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ffmpeg" => Ok(CaptureMode::ExternalMux),
            "regular" => Ok(CaptureMode::StreamCopy),
            other => Err(format!(
                "Unknown capture mode '{}' (expected 'ffmpeg' or 'regular')",
                other
            )),
        }
    }
}

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_secs: 60,
        }
    }
}

/// Clock used when interpreting user-entered times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClockFormat {
    #[default]
    TwentyFourHour,
    TwelveHour,
}

impl ClockFormat {
    pub fn from_is_24_hour(is_24_hour: bool) -> Self {
        if is_24_hour {
            ClockFormat::TwentyFourHour
        } else {
            ClockFormat::TwelveHour
        }
    }

    pub fn is_24_hour(&self) -> bool {
        matches!(self, ClockFormat::TwentyFourHour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> ChannelInfo {
        ChannelInfo {
            name: "SE: Sport 1".to_string(),
            url: "http://example.com/live/1234.ts".to_string(),
            code: "1234".to_string(),
            group_title: " Sports ".to_string(),
            tvg_id: String::new(),
            tvg_name: String::new(),
            tvg_logo: String::new(),
        }
    }

    #[test]
    fn test_display_name_falls_back_to_name() {
        let mut ch = channel();
        assert_eq!(ch.display_name(), "SE: Sport 1");
        ch.tvg_name = "Sport One".to_string();
        assert_eq!(ch.display_name(), "Sport One");
    }

    #[test]
    fn test_meta_trims_fields() {
        let meta = channel().meta();
        assert_eq!(meta.group_title, "Sports");
        assert_eq!(meta.display_name, "SE: Sport 1");
    }

    #[test]
    fn test_capture_mode_tokens() {
        assert_eq!("ffmpeg".parse::<CaptureMode>(), Ok(CaptureMode::ExternalMux));
        assert_eq!("REGULAR".parse::<CaptureMode>(), Ok(CaptureMode::StreamCopy));
        assert!("vlc".parse::<CaptureMode>().is_err());
        assert_eq!(CaptureMode::StreamCopy.to_string(), "regular");
    }

    #[test]
    fn test_capture_mode_serde() {
        let json = serde_json::to_string(&CaptureMode::ExternalMux).unwrap();
        assert_eq!(json, "\"ffmpeg\"");
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay(), Duration::from_secs(60));
    }
}
