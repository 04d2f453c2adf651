//! Exit codes for the launcher.
//!
//! Scripts can tell a bad configuration from an unreachable playlist or a
//! search that matched nothing.

/// Exit codes for launcher commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Operation completed successfully
    Success = 0,
    /// General/unspecified error
    GeneralError = 1,
    /// Invalid command-line arguments or configuration
    InvalidArguments = 2,
    /// The playlist could not be loaded
    PlaylistUnavailable = 3,
    /// The search matched no channel
    NoChannelMatched = 4,
    /// The scheduler process could not be started
    SchedulerFailedToStart = 5,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCode::Success => write!(f, "success"),
            ExitCode::GeneralError => write!(f, "general error"),
            ExitCode::InvalidArguments => write!(f, "invalid arguments"),
            ExitCode::PlaylistUnavailable => write!(f, "playlist unavailable"),
            ExitCode::NoChannelMatched => write!(f, "no channel matched"),
            ExitCode::SchedulerFailedToStart => write!(f, "scheduler failed to start"),
        }
    }
}
