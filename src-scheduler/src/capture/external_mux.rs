//! External remux through FFmpeg via ffmpeg-sidecar.
//!
//! FFmpeg gets the URL and output path as discrete arguments (no shell).
//! Its stderr is drained on a background thread. The child is not watched
//! for early exit; the scheduler stops it at the boundary.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{DateTime, Utc};
use ffmpeg_sidecar::command::FfmpegCommand;
use iptv_recorder_common::RetryPolicy;
use tracing::{debug, error, info, warn};

use super::{wait_for_boundary, CaptureError, CaptureOutcome, CaptureStrategy};
use crate::context::RecorderContext;

/// Resolve the FFmpeg binary: `PATH` first, then ffmpeg-sidecar's location
/// next to the executable.
pub fn resolve_ffmpeg_path() -> PathBuf {
    which::which("ffmpeg").unwrap_or_else(|_| ffmpeg_sidecar::paths::ffmpeg_path())
}

/// `ffmpeg -hide_banner -loglevel panic -y -i <url> -c copy <dest>`
pub fn build_command(ffmpeg: &Path, url: &str, dest: &Path) -> FfmpegCommand {
    let mut command = FfmpegCommand::new_with_path(ffmpeg);
    command
        .hide_banner()
        .args(["-loglevel", "panic"])
        .overwrite()
        .input(url)
        .args(["-c", "copy"])
        .output(dest);
    command
}

pub struct ExternalMux {
    url: String,
    dest: PathBuf,
    ffmpeg: PathBuf,
    retry: RetryPolicy,
}

impl ExternalMux {
    pub fn new(url: &str, dest: &Path, retry: RetryPolicy) -> Self {
        Self {
            url: url.to_string(),
            dest: dest.to_path_buf(),
            ffmpeg: resolve_ffmpeg_path(),
            retry,
        }
    }

    /// Use a specific FFmpeg binary.
    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    /// Launch FFmpeg and hand it to the context. Returns the child's pid.
    ///
    /// Returns once the process exists, not once it is recording.
    pub fn start(&self, ctx: &RecorderContext) -> Result<u32, CaptureError> {
        let mut command = build_command(&self.ffmpeg, &self.url, &self.dest);

        let inner_command = command.as_inner_mut();
        inner_command.stdin(Stdio::piped());
        inner_command.stdout(Stdio::null());
        inner_command.stderr(Stdio::piped());

        let mut child = inner_command.spawn().map_err(CaptureError::Spawn)?;
        let pid = child.id();

        if let Some(stderr) = child.stderr.take() {
            let drained = ctx.spawn("ffmpeg-stderr", move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    debug!("[FFMPEG] {}", line);
                }
                debug!("[FFMPEG] stderr reader thread exiting");
            });
            if let Err(e) = drained {
                warn!("[FFMPEG] Could not start stderr reader: {}", e);
            }
        }

        ctx.set_child(child);
        info!(
            "[FFMPEG] Started {} (pid {}) writing {}",
            self.ffmpeg.display(),
            pid,
            self.dest.display()
        );
        Ok(pid)
    }

    /// Stop FFmpeg. Safe to call more than once.
    pub fn stop(&self, ctx: &RecorderContext) -> bool {
        ctx.stop_child()
    }

    fn start_with_retries(&self, ctx: &RecorderContext) -> Result<u32, CaptureError> {
        let max = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.start(ctx) {
                Ok(pid) => return Ok(pid),
                Err(e) if attempt >= max => {
                    error!("[FFMPEG] Start attempt {}/{} failed: {}", attempt, max, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "[FFMPEG] Start attempt {}/{} failed: {}. Retrying in {}s",
                        attempt, max, e, self.retry.delay_secs
                    );
                }
            }
            std::thread::sleep(self.retry.delay());
            attempt += 1;
        }
    }
}

impl CaptureStrategy for ExternalMux {
    fn tag(&self) -> &'static str {
        "[FFMPEG]"
    }

    fn run_until(&mut self, ctx: &RecorderContext, boundary: DateTime<Utc>) -> CaptureOutcome {
        if let Err(e) = self.start_with_retries(ctx) {
            return CaptureOutcome::Failed(e);
        }

        if wait_for_boundary(ctx, boundary) {
            info!("[FFMPEG] Stop time reached, stopping FFmpeg");
        } else {
            info!("[FFMPEG] Shutdown requested, stopping FFmpeg");
        }
        self.stop(ctx);
        CaptureOutcome::Completed
    }
}
