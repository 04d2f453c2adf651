//! Parser for the scheduler's versioned argument vector.
//!
//! The vector is produced by `iptv_recorder_common::handoff::to_args`; the
//! positional order here must match it exactly.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use iptv_recorder_common::handoff::WIRE_VERSION;
use iptv_recorder_common::request::{RequestError, DEFAULT_TIMEZONE};
use iptv_recorder_common::time::TimeParseError;
use iptv_recorder_common::{
    CaptureMode, ChannelMeta, ClockFormat, RecordingRequest, RetryPolicy, TimeOfDay,
};

/// Record one IPTV stream between two wall-clock times.
#[derive(Parser, Debug)]
#[command(name = "iptv-scheduler")]
#[command(version, about, long_about = None)]
pub struct SchedulerArgs {
    /// Argument layout version
    #[arg(long = "wire-version", default_value_t = WIRE_VERSION)]
    pub wire_version: u32,

    /// Webhook for failure alerts
    #[arg(long = "notify-url")]
    pub notify_url: Option<String>,

    /// Stream URL
    pub url: String,

    /// Root directory for recordings
    pub destination: PathBuf,

    /// Start time (HH:MM)
    pub start: String,

    /// Stop time (HH:MM)
    pub stop: String,

    /// Capture mode: ffmpeg or regular
    pub mode: CaptureMode,

    #[arg(default_value = "")]
    pub display_name: String,

    #[arg(default_value = DEFAULT_TIMEZONE)]
    pub timezone: String,

    #[arg(default_value = "true", action = ArgAction::Set, value_parser = parse_bool)]
    pub is_24_hour: bool,

    /// Log file; empty for stderr only
    #[arg(default_value = "")]
    pub log_file: String,

    #[arg(default_value = "")]
    pub group_title: String,

    #[arg(default_value = "")]
    pub tvg_id: String,

    /// Connectivity attempts before giving up
    #[arg(default_value = "5")]
    pub retries: u32,

    /// Seconds between attempts
    #[arg(default_value = "60")]
    pub retry_delay_secs: u64,

    #[arg(default_value = "")]
    pub tvg_logo: String,

    /// Set by the resume controller on successor processes
    #[arg(default_value = "false", action = ArgAction::Set, value_parser = parse_bool)]
    pub is_resume: bool,
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(format!("expected 'true' or 'false', got '{}'", other)),
    }
}

/// Error type for turning arguments into a request.
#[derive(Debug)]
pub enum ArgsError {
    UnsupportedWireVersion(u32),
    Time(TimeParseError),
    Request(RequestError),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgsError::UnsupportedWireVersion(v) => write!(
                f,
                "Unsupported wire version {} (this scheduler speaks {})",
                v, WIRE_VERSION
            ),
            ArgsError::Time(e) => write!(f, "{}", e),
            ArgsError::Request(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<TimeParseError> for ArgsError {
    fn from(e: TimeParseError) -> Self {
        ArgsError::Time(e)
    }
}

impl From<RequestError> for ArgsError {
    fn from(e: RequestError) -> Self {
        ArgsError::Request(e)
    }
}

impl SchedulerArgs {
    /// Log file path, if one was given.
    pub fn log_path(&self) -> Option<PathBuf> {
        let trimmed = self.log_file.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    /// Build and validate the recording request.
    pub fn into_request(self) -> Result<(RecordingRequest, Option<String>), ArgsError> {
        if self.wire_version != WIRE_VERSION {
            return Err(ArgsError::UnsupportedWireVersion(self.wire_version));
        }

        let clock = ClockFormat::from_is_24_hour(self.is_24_hour);
        let start = TimeOfDay::parse(&self.start, clock)?;
        let stop = TimeOfDay::parse(&self.stop, clock)?;
        let log_file = self.log_path();

        let request = RecordingRequest {
            source_url: self.url.trim().to_string(),
            destination_root: self.destination,
            start,
            stop,
            timezone: self.timezone.trim().to_string(),
            clock,
            mode: self.mode,
            channel: ChannelMeta {
                display_name: self.display_name,
                group_title: self.group_title,
                tvg_id: self.tvg_id,
                tvg_logo: self.tvg_logo,
            },
            retry: RetryPolicy {
                max_attempts: self.retries,
                delay_secs: self.retry_delay_secs,
            },
            log_file,
            is_resume: self.is_resume,
        };
        request.validate()?;

        let notify_url = self.notify_url.filter(|u| !u.trim().is_empty());
        Ok((request, notify_url))
    }
}
