//! The immutable description of one scheduled recording.

use std::path::PathBuf;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::time::{parse_timezone, TimeOfDay};
use crate::types::{CaptureMode, ChannelMeta, ClockFormat, RetryPolicy};

/// Timezone used when none is given.
pub const DEFAULT_TIMEZONE: &str = "Europe/Stockholm";

/// Error type for request validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    EmptyUrl,
    EmptyDestination,
    UnknownTimezone(String),
    InvalidRetryPolicy(String),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::EmptyUrl => write!(f, "Stream URL is empty"),
            RequestError::EmptyDestination => write!(f, "Destination directory is empty"),
            RequestError::UnknownTimezone(tz) => write!(f, "Unknown timezone: {}", tz),
            RequestError::InvalidRetryPolicy(msg) => write!(f, "Invalid retry policy: {}", msg),
        }
    }
}

impl std::error::Error for RequestError {}

/// Everything a scheduler process needs to run one recording window.
///
/// Built once per process and never mutated; a resume successor receives
/// an identical copy with `is_resume` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingRequest {
    pub source_url: String,
    pub destination_root: PathBuf,
    pub start: TimeOfDay,
    pub stop: TimeOfDay,
    /// IANA timezone name
    pub timezone: String,
    pub clock: ClockFormat,
    pub mode: CaptureMode,
    pub channel: ChannelMeta,
    pub retry: RetryPolicy,
    /// Scheduler log file; empty means stderr only
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub is_resume: bool,
}

impl RecordingRequest {
    /// Check the request for values no scheduler run could succeed with.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.source_url.trim().is_empty() {
            return Err(RequestError::EmptyUrl);
        }
        if self.destination_root.as_os_str().is_empty() {
            return Err(RequestError::EmptyDestination);
        }
        self.tz()?;
        if self.retry.max_attempts == 0 {
            return Err(RequestError::InvalidRetryPolicy(
                "max attempts must be greater than zero".to_string(),
            ));
        }
        if self.retry.delay_secs == 0 {
            return Err(RequestError::InvalidRetryPolicy(
                "retry delay must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The parsed timezone.
    pub fn tz(&self) -> Result<Tz, RequestError> {
        parse_timezone(&self.timezone)
            .map_err(|_| RequestError::UnknownTimezone(self.timezone.clone()))
    }

    /// A copy of this request flagged as a resume continuation.
    pub fn resumed(&self) -> Self {
        Self {
            is_resume: true,
            ..self.clone()
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn request() -> RecordingRequest {
        RecordingRequest {
            source_url: "http://example.com/live/42.ts".to_string(),
            destination_root: PathBuf::from("/tmp/recordings"),
            start: TimeOfDay::new(20, 0, 0).unwrap(),
            stop: TimeOfDay::new(22, 30, 0).unwrap(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            clock: ClockFormat::TwentyFourHour,
            mode: CaptureMode::StreamCopy,
            channel: ChannelMeta {
                display_name: "20:00 Fotboll | Allsvenskan".to_string(),
                group_title: "Sports".to_string(),
                tvg_id: String::new(),
                tvg_logo: String::new(),
            },
            retry: RetryPolicy::default(),
            log_file: None,
            is_resume: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::request;
    use super::*;

    #[test]
    fn test_valid_request() {
        assert_eq!(request().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_empty_url() {
        let mut req = request();
        req.source_url = "  ".to_string();
        assert_eq!(req.validate(), Err(RequestError::EmptyUrl));
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let mut req = request();
        req.timezone = "Nowhere/City".to_string();
        assert!(matches!(
            req.validate(),
            Err(RequestError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn test_rejects_zero_retries() {
        let mut req = request();
        req.retry.max_attempts = 0;
        assert!(matches!(
            req.validate(),
            Err(RequestError::InvalidRetryPolicy(_))
        ));
    }

    #[test]
    fn test_resumed_only_flips_flag() {
        let req = request();
        let resumed = req.resumed();
        assert!(resumed.is_resume);
        assert!(!req.is_resume);
        assert_eq!(RecordingRequest { is_resume: false, ..resumed }, req);
    }
}
