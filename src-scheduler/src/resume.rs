//! Cross-process resume.
//!
//! After a stream copy drops before the stop time, the recording is handed
//! to a fresh scheduler process started with the same request and
//! `is-resume = true`. The caller exits with `Failure` afterwards whatever
//! the successor does.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use iptv_recorder_common::handoff::to_args;
use iptv_recorder_common::RecordingRequest;
use tracing::{error, info, warn};

/// How long to wait before checking that the successor is alive.
pub const VERIFY_DELAY: Duration = Duration::from_secs(2);

/// Error type for starting a successor.
#[derive(Debug)]
pub enum ResumeError {
    CurrentExe(std::io::Error),
    Spawn(std::io::Error),
}

impl std::fmt::Display for ResumeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResumeError::CurrentExe(e) => write!(f, "Cannot locate scheduler executable: {}", e),
            ResumeError::Spawn(e) => write!(f, "Failed to start resume process: {}", e),
        }
    }
}

impl std::error::Error for ResumeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResumeError::CurrentExe(e) | ResumeError::Spawn(e) => Some(e),
        }
    }
}

/// What the one-shot liveness check saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessorStatus {
    Running { pid: u32 },
    Exited { pid: u32, code: Option<i32> },
    Unknown { pid: u32 },
}

pub struct ResumeController {
    program: PathBuf,
    notify_url: Option<String>,
    verify_delay: Duration,
}

impl ResumeController {
    /// Re-invoke the running executable.
    pub fn for_current_exe(notify_url: Option<String>) -> Result<Self, ResumeError> {
        let program = std::env::current_exe().map_err(ResumeError::CurrentExe)?;
        Ok(Self::with_program(program, notify_url, VERIFY_DELAY))
    }

    pub fn with_program(
        program: PathBuf,
        notify_url: Option<String>,
        verify_delay: Duration,
    ) -> Self {
        Self {
            program,
            notify_url,
            verify_delay,
        }
    }

    /// Arguments the successor is started with.
    pub fn successor_args(&self, request: &RecordingRequest) -> Vec<String> {
        to_args(&request.resumed(), self.notify_url.as_deref())
    }

    /// Start the successor and check once that it is still alive.
    pub fn hand_off(&self, request: &RecordingRequest) -> Result<SuccessorStatus, ResumeError> {
        let args = self.successor_args(request);
        info!(
            "[RESUME] Starting successor for '{}' ({} - {})",
            request.channel.display_name, request.start, request.stop
        );

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(ResumeError::Spawn)?;
        let pid = child.id();

        std::thread::sleep(self.verify_delay);

        let status = match child.try_wait() {
            Ok(Some(exit)) => {
                error!(
                    "[RESUME] Successor {} exited immediately with code {:?}",
                    pid,
                    exit.code()
                );
                SuccessorStatus::Exited {
                    pid,
                    code: exit.code(),
                }
            }
            Ok(None) => {
                info!("[RESUME] Successor {} is running", pid);
                SuccessorStatus::Running { pid }
            }
            Err(e) => {
                warn!("[RESUME] Could not check successor {}: {}", pid, e);
                SuccessorStatus::Unknown { pid }
            }
        };
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iptv_recorder_common::{CaptureMode, ChannelMeta, ClockFormat, RetryPolicy, TimeOfDay};

    fn request() -> RecordingRequest {
        RecordingRequest {
            source_url: "http://example.com/live/5.ts".to_string(),
            destination_root: PathBuf::from("/rec"),
            start: TimeOfDay::new(18, 0, 0).unwrap(),
            stop: TimeOfDay::new(19, 0, 0).unwrap(),
            timezone: "UTC".to_string(),
            clock: ClockFormat::TwentyFourHour,
            mode: CaptureMode::StreamCopy,
            channel: ChannelMeta::default(),
            retry: RetryPolicy::default(),
            log_file: None,
            is_resume: false,
        }
    }

    /// Every successor carries the resume flag and the original window.
    #[test]
    fn test_successor_args_are_resume() {
        let controller = ResumeController::with_program(PathBuf::from("x"), None, Duration::ZERO);
        let args = controller.successor_args(&request());
        assert_eq!(args.last().map(String::as_str), Some("true"));
        assert!(args.contains(&"http://example.com/live/5.ts".to_string()));
        assert!(args.contains(&"18:00".to_string()));
        assert!(args.contains(&"19:00".to_string()));

        // Resuming a resumed request does not change anything.
        assert_eq!(controller.successor_args(&request().resumed()), args);
    }

    #[cfg(unix)]
    #[test]
    fn test_hand_off_reports_early_exit() {
        let program = which::which("true").unwrap();
        let controller = ResumeController::with_program(program, None, Duration::from_millis(300));
        let status = controller.hand_off(&request()).unwrap();
        assert!(matches!(status, SuccessorStatus::Exited { code: Some(0), .. }));
    }

    #[test]
    fn test_hand_off_spawn_failure() {
        let controller = ResumeController::with_program(
            PathBuf::from("/nonexistent/iptv-scheduler"),
            None,
            Duration::ZERO,
        );
        assert!(matches!(
            controller.hand_off(&request()),
            Err(ResumeError::Spawn(_))
        ));
    }
}
