//! Capture strategies.
//!
//! Both strategies share one contract: run until the stop boundary, then
//! report how the window ended. The scheduler picks one per request.

pub mod external_mux;
pub mod stream_copy;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use iptv_recorder_common::{CaptureMode, RecordingRequest};

use crate::context::RecorderContext;

pub use external_mux::ExternalMux;
pub use stream_copy::StreamCopy;

/// How often the main thread checks the wall clock while capturing.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Error type for capture attempts.
#[derive(Debug)]
pub enum CaptureError {
    /// The external process could not be started
    Spawn(std::io::Error),
    /// HTTP client could not be constructed
    Client(String),
    /// Connecting to the source failed
    Connect(String),
    /// Source answered with a non-success status
    Status(u16),
    /// Destination file could not be opened
    OpenDestination {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Reading from the source failed mid-copy
    Read(std::io::Error),
    /// Writing to the destination failed
    Write(std::io::Error),
    /// The copy worker could not be started or vanished
    Worker(String),
}

impl CaptureError {
    /// Source-side failures: worth handing to a successor process.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            CaptureError::Connect(_) | CaptureError::Status(_) | CaptureError::Read(_)
        )
    }
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::Spawn(e) => write!(f, "Failed to start FFmpeg: {}", e),
            CaptureError::Client(e) => write!(f, "HTTP client error: {}", e),
            CaptureError::Connect(e) => write!(f, "Connection failed: {}", e),
            CaptureError::Status(code) => write!(f, "Source returned HTTP {}", code),
            CaptureError::OpenDestination { path, source } => {
                write!(f, "Cannot open {}: {}", path.display(), source)
            }
            CaptureError::Read(e) => write!(f, "Network read failed: {}", e),
            CaptureError::Write(e) => write!(f, "Write failed: {}", e),
            CaptureError::Worker(e) => write!(f, "Copy worker failed: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Spawn(e) | CaptureError::Read(e) | CaptureError::Write(e) => Some(e),
            CaptureError::OpenDestination { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// How a capture window ended.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// Ran to the stop boundary
    Completed,
    /// Source went away before the boundary; `cause` is set for I/O errors
    Dropped { cause: Option<CaptureError> },
    /// Could not capture at all
    Failed(CaptureError),
}

/// A way of persisting the stream until a wall-clock boundary.
pub trait CaptureStrategy {
    /// Log tag for this strategy.
    fn tag(&self) -> &'static str;

    /// Capture until `boundary`, a drop, or a failure.
    fn run_until(&mut self, ctx: &RecorderContext, boundary: DateTime<Utc>) -> CaptureOutcome;
}

/// Build the strategy selected by the request.
pub fn for_request(
    request: &RecordingRequest,
    destination: &Path,
) -> Result<Box<dyn CaptureStrategy>, CaptureError> {
    match request.mode {
        CaptureMode::ExternalMux => Ok(Box::new(ExternalMux::new(
            &request.source_url,
            destination,
            request.retry,
        ))),
        CaptureMode::StreamCopy => Ok(Box::new(StreamCopy::new(
            &request.source_url,
            destination,
        )?)),
    }
}

/// Sleep in poll-sized steps until `boundary` or shutdown.
///
/// Returns true when the boundary was reached.
pub(crate) fn wait_for_boundary(ctx: &RecorderContext, boundary: DateTime<Utc>) -> bool {
    loop {
        let now = Utc::now();
        if now >= boundary {
            return true;
        }
        if ctx.is_shutdown_requested() {
            return false;
        }
        let remaining = (boundary - now).to_std().unwrap_or(Duration::ZERO);
        std::thread::sleep(remaining.min(POLL_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_are_handoff_worthy() {
        assert!(CaptureError::Connect("refused".into()).is_network());
        assert!(CaptureError::Status(503).is_network());
        assert!(CaptureError::Read(std::io::ErrorKind::ConnectionReset.into()).is_network());
        assert!(!CaptureError::Write(std::io::ErrorKind::Other.into()).is_network());
        assert!(!CaptureError::OpenDestination {
            path: PathBuf::from("/x"),
            source: std::io::ErrorKind::PermissionDenied.into(),
        }
        .is_network());
    }

    #[test]
    fn test_wait_for_boundary_in_past_returns_immediately() {
        let ctx = RecorderContext::new();
        let started = std::time::Instant::now();
        assert!(wait_for_boundary(&ctx, Utc::now() - chrono::Duration::seconds(5)));
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_wait_for_boundary_stops_on_shutdown() {
        let ctx = RecorderContext::new();
        ctx.request_shutdown();
        assert!(!wait_for_boundary(&ctx, Utc::now() + chrono::Duration::hours(1)));
    }
}
