//! Exit codes for the scheduler process.
//!
//! The exit code is the only success signal automation sees: anything
//! other than `Success` means this process did not finish the recording
//! itself (a resume successor may still be carrying it).

/// Exit codes for a scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Window completed, or the watchdog ended it on time
    Success = 0,
    /// Unrecoverable failure, or yielded to a resume successor
    Failure = 1,
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
            ExitCode::Failure => write!(f, "failure"),
        }
    }
}
