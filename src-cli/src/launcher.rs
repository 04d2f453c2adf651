//! Starting the background scheduler process.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use iptv_recorder_common::handoff;
use iptv_recorder_common::RecordingRequest;

#[cfg(windows)]
const SCHEDULER_BINARY: &str = "iptv-scheduler.exe";
#[cfg(not(windows))]
const SCHEDULER_BINARY: &str = "iptv-scheduler";

/// Error type for launching the scheduler.
#[derive(Debug)]
pub enum LaunchError {
    /// No scheduler binary was found
    NotFound,
    /// The binary was found but could not be started
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::NotFound => write!(f, "{} binary not found", SCHEDULER_BINARY),
            LaunchError::Spawn { binary, source } => {
                write!(f, "Failed to start {}: {}", binary.display(), source)
            }
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::NotFound => None,
            LaunchError::Spawn { source, .. } => Some(source),
        }
    }
}

/// Find the scheduler: next to this executable, then `PATH`, then the usual
/// install locations.
pub fn find_scheduler_binary() -> Result<PathBuf, LaunchError> {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(dir) = exe_path.parent() {
            let path = dir.join(SCHEDULER_BINARY);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Ok(path) = which::which(SCHEDULER_BINARY) {
        return Ok(path);
    }

    #[cfg(windows)]
    let common_dirs = [r"C:\Program Files\iptv-recorder"];
    #[cfg(not(windows))]
    let common_dirs = ["/usr/bin", "/usr/local/bin"];

    common_dirs
        .iter()
        .map(|dir| Path::new(dir).join(SCHEDULER_BINARY))
        .find(|path| path.exists())
        .ok_or(LaunchError::NotFound)
}

/// Start `binary` for `request`, detached from this terminal.
///
/// Returns the child's pid. The launcher does not wait for it.
pub fn spawn_scheduler(
    binary: &Path,
    request: &RecordingRequest,
    notify_url: Option<&str>,
) -> Result<u32, LaunchError> {
    let child = Command::new(binary)
        .args(handoff::to_args(request, notify_url))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            binary: binary.to_path_buf(),
            source,
        })?;
    Ok(child.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use iptv_recorder_common::{CaptureMode, TimeOfDay};

    fn request() -> RecordingRequest {
        RecordingRequest {
            source_url: "http://example.com/live/1.ts".to_string(),
            destination_root: PathBuf::from("/tmp/recordings"),
            start: TimeOfDay::new(20, 0, 0).unwrap(),
            stop: TimeOfDay::new(21, 0, 0).unwrap(),
            timezone: "UTC".to_string(),
            clock: Default::default(),
            mode: CaptureMode::StreamCopy,
            channel: Default::default(),
            retry: Default::default(),
            log_file: None,
            is_resume: false,
        }
    }

    #[test]
    fn test_spawn_missing_binary() {
        let err = spawn_scheduler(Path::new("/nonexistent/iptv-scheduler"), &request(), None)
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/iptv-scheduler"));
    }

    /// `true` ignores its arguments and exits, standing in for the scheduler.
    #[cfg(unix)]
    #[test]
    fn test_spawn_returns_pid() {
        let Ok(binary) = which::which("true") else {
            return;
        };
        let pid = spawn_scheduler(&binary, &request(), Some("http://hooks/1")).unwrap();
        assert!(pid > 0);
    }
}
