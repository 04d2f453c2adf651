//! Top-level orchestration of one recording window.
//!
//! wait for start -> preflight -> probe with retries -> watchdog ->
//! capture until stop -> exit code. A stream copy that drops before the
//! stop time hands the recording to a successor process instead.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use iptv_recorder_common::naming::{destination_path, Destination};
use iptv_recorder_common::notify::NotificationSink;
use iptv_recorder_common::RecordingRequest;
use tracing::{debug, error, info, warn};

use crate::capture::{self, CaptureOutcome};
use crate::context::RecorderContext;
use crate::exit_codes::ExitCode;
use crate::poster::fetch_poster;
use crate::preflight;
use crate::probe::{probe_with_retries, HttpProbe, PROBE_TIMEOUT};
use crate::resume::{ResumeController, SuccessorStatus};
use crate::watchdog::Watchdog;

/// Longest single sleep while waiting for the start time.
const START_POLL: Duration = Duration::from_secs(1);

/// Time left until `start`, or `None` when it has already passed.
pub fn time_until_start(start: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    if start <= now {
        return None;
    }
    (start - now).to_std().ok()
}

pub struct Scheduler<'a> {
    ctx: &'a RecorderContext,
    request: RecordingRequest,
    tz: Tz,
    notifier: Box<dyn NotificationSink>,
    notify_url: Option<String>,
}

impl<'a> Scheduler<'a> {
    /// The request must already be validated.
    pub fn new(
        ctx: &'a RecorderContext,
        request: RecordingRequest,
        tz: Tz,
        notifier: Box<dyn NotificationSink>,
        notify_url: Option<String>,
    ) -> Self {
        Self {
            ctx,
            request,
            tz,
            notifier,
            notify_url,
        }
    }

    fn channel_label(&self) -> &str {
        let name = self.request.channel.display_name.trim();
        if name.is_empty() {
            &self.request.source_url
        } else {
            name
        }
    }

    fn alert(&self, subject: &str, detail: &str) {
        let body = format!(
            "{}\n\nChannel: {}\nWindow: {} - {} ({})\nURL: {}",
            detail,
            self.channel_label(),
            self.request.start,
            self.request.stop,
            self.request.timezone,
            self.request.source_url
        );
        self.notifier.notify(subject, &body);
    }

    /// Run the whole window and return the exit code.
    pub fn run(self) -> ExitCode {
        let request = &self.request;

        if request.is_resume {
            info!(
                "[RESUME] Resuming '{}' until {}",
                self.channel_label(),
                request.stop
            );
        } else {
            info!(
                "[STARTUP] Logging started for '{}' ({} - {} {}, mode {})",
                self.channel_label(),
                request.start,
                request.stop,
                request.timezone,
                request.mode
            );
            if !self.wait_for_start() {
                return ExitCode::Failure;
            }
        }

        let boundary = request
            .stop
            .stop_instant(self.tz, Utc::now())
            .with_timezone(&Utc);
        if self.window_over(boundary) {
            return ExitCode::Success;
        }

        if let Err(e) = preflight::check(&request.source_url, &request.destination_root) {
            error!("[SCHEDULER] {}", e);
            self.alert("Recording preflight failed", &e.to_string());
            return ExitCode::Failure;
        }

        if let Err(e) = self.probe() {
            error!("[SCHEDULER] {}", e);
            self.alert("Recording source unreachable", &e);
            return ExitCode::Failure;
        }

        // Probe retries can run past the stop time.
        if self.window_over(boundary) {
            return ExitCode::Success;
        }

        let force = self.ctx.force_exit();
        if let Err(e) = Watchdog::start(self.ctx, request.stop, self.tz, move || {
            force.exit(ExitCode::Success)
        }) {
            // The boundary polling below still ends the window.
            warn!("[WATCHDOG] Could not start watchdog: {}", e);
        }

        let destination = destination_path(
            &request.destination_root,
            &request.channel,
            self.tz,
            request.start,
            request.stop,
            Utc::now(),
        );
        if let Err(e) = std::fs::create_dir_all(&destination.event_dir) {
            error!(
                "[SCHEDULER] Cannot create {}: {}",
                destination.event_dir.display(),
                e
            );
            self.alert("Recording failed", &e.to_string());
            return ExitCode::Failure;
        }

        if !request.is_resume {
            fetch_poster(&request.channel.tvg_logo, &destination.poster_path());
        }

        self.capture(&destination, boundary)
    }

    /// True once today's stop time has passed; nothing is recorded then.
    fn window_over(&self, boundary: DateTime<Utc>) -> bool {
        if Utc::now() < boundary {
            return false;
        }
        info!(
            "[SCHEDULER] Stop time {} has already passed, nothing to record for '{}'",
            self.request.stop,
            self.channel_label()
        );
        true
    }

    /// Sleep until the start time. Returns false if shut down while waiting.
    fn wait_for_start(&self) -> bool {
        let start = self
            .request
            .start
            .start_instant(self.tz, Utc::now())
            .with_timezone(&Utc);

        if time_until_start(start, Utc::now()).is_none() {
            warn!(
                "[SCHEDULER] Start time {} has already passed, starting immediately",
                self.request.start
            );
            return true;
        }

        info!("[SCHEDULER] Waiting until {}", start.with_timezone(&self.tz).to_rfc3339());
        while let Some(remaining) = time_until_start(start, Utc::now()) {
            if self.ctx.is_shutdown_requested() {
                info!("[SCHEDULER] Shutdown requested before start time");
                return false;
            }
            std::thread::sleep(remaining.min(START_POLL));
        }
        true
    }

    fn probe(&self) -> Result<u32, String> {
        let probe = HttpProbe::new(PROBE_TIMEOUT).map_err(|e| e.to_string())?;
        let ctx = self.ctx;
        probe_with_retries(
            &probe,
            &self.request.source_url,
            self.request.retry,
            self.channel_label(),
            |delay| sleep_unless_shutdown(ctx, delay),
            || ctx.is_shutdown_requested(),
        )
        .map_err(|e| e.to_string())
    }

    fn capture(&self, destination: &Destination, boundary: DateTime<Utc>) -> ExitCode {
        let request = &self.request;
        let mut strategy = match capture::for_request(request, &destination.file) {
            Ok(s) => s,
            Err(e) => {
                error!("[SCHEDULER] {}", e);
                self.alert("Recording failed to start", &e.to_string());
                return ExitCode::Failure;
            }
        };

        info!(
            "{} Recording '{}' to {} until {}",
            strategy.tag(),
            self.channel_label(),
            destination.file.display(),
            boundary.with_timezone(&self.tz).to_rfc3339()
        );

        match strategy.run_until(self.ctx, boundary) {
            CaptureOutcome::Completed => {
                info!("{} Recording completed", strategy.tag());
                ExitCode::Success
            }
            CaptureOutcome::Dropped { cause } => {
                if let Some(e) = cause {
                    warn!("{} Stream dropped by I/O error: {}", strategy.tag(), e);
                }
                self.resume();
                ExitCode::Failure
            }
            CaptureOutcome::Failed(e) => {
                error!("{} Recording failed: {}", strategy.tag(), e);
                remove_empty_dirs(destination);
                self.alert("Recording failed", &e.to_string());
                ExitCode::Failure
            }
        }
    }

    fn resume(&self) {
        let controller = match ResumeController::for_current_exe(self.notify_url.clone()) {
            Ok(c) => c,
            Err(e) => {
                error!("[RESUME] {}", e);
                self.alert("Recording resume failed", &e.to_string());
                return;
            }
        };
        match controller.hand_off(&self.request) {
            Ok(SuccessorStatus::Running { pid }) => {
                info!("[RESUME] Recording handed off to pid {}", pid);
            }
            Ok(SuccessorStatus::Exited { pid, code }) => {
                self.alert(
                    "Recording resume failed",
                    &format!("Successor {} exited immediately with code {:?}", pid, code),
                );
            }
            Ok(SuccessorStatus::Unknown { pid }) => {
                warn!("[RESUME] Handed off to pid {} without confirming it runs", pid);
            }
            Err(e) => {
                error!("[RESUME] {}", e);
                self.alert("Recording resume failed", &e.to_string());
            }
        }
    }
}

fn sleep_unless_shutdown(ctx: &RecorderContext, total: Duration) {
    let step = Duration::from_millis(250);
    let mut slept = Duration::ZERO;
    while slept < total && !ctx.is_shutdown_requested() {
        let chunk = step.min(total - slept);
        std::thread::sleep(chunk);
        slept += chunk;
    }
}

/// Remove the event and channel folders if the failed attempt left them empty.
fn remove_empty_dirs(destination: &Destination) {
    for dir in [&destination.event_dir, &destination.channel_dir] {
        if is_empty_dir(dir) {
            match std::fs::remove_dir(dir) {
                Ok(()) => debug!("[SCHEDULER] Removed empty folder {}", dir.display()),
                Err(e) => warn!("[SCHEDULER] Could not remove {}: {}", dir.display(), e),
            }
        }
    }
}

fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iptv_recorder_common::notify::LogSink;
    use crate::test_support::serve_endless;
    use iptv_recorder_common::{CaptureMode, ChannelMeta, ClockFormat, RetryPolicy, TimeOfDay};

    /// Past start times never cause a sleep.
    #[test]
    fn test_elapsed_start_means_no_wait() {
        let now = Utc::now();
        assert_eq!(time_until_start(now - chrono::Duration::minutes(1), now), None);
        assert_eq!(time_until_start(now, now), None);
        assert_eq!(
            time_until_start(now + chrono::Duration::seconds(5), now),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_remove_empty_dirs_keeps_content() {
        let root = tempfile::tempdir().unwrap();
        let channel_dir = root.path().join("News");
        let event_dir = channel_dir.join("2026_01_01_1000_1100");
        std::fs::create_dir_all(&event_dir).unwrap();
        std::fs::write(channel_dir.join("other.ts"), b"x").unwrap();

        let dest = Destination {
            file: event_dir.join("News.ts"),
            channel_dir: channel_dir.clone(),
            event_dir: event_dir.clone(),
        };
        remove_empty_dirs(&dest);
        assert!(!event_dir.exists());
        assert!(channel_dir.exists());
    }

    /// Today's time of day `offset` from now, clamped to today.
    fn today_at(now: DateTime<Utc>, offset: chrono::Duration) -> TimeOfDay {
        let at = now + offset;
        if at.date_naive() == now.date_naive() {
            TimeOfDay::from(at.time())
        } else if offset < chrono::Duration::zero() {
            TimeOfDay::new(0, 0, 0).unwrap()
        } else {
            TimeOfDay::new(23, 59, 59).unwrap()
        }
    }

    fn request(url: String, root: &Path, start: TimeOfDay, stop: TimeOfDay) -> RecordingRequest {
        RecordingRequest {
            source_url: url,
            destination_root: root.to_path_buf(),
            start,
            stop,
            timezone: "UTC".to_string(),
            clock: ClockFormat::TwentyFourHour,
            mode: CaptureMode::StreamCopy,
            channel: ChannelMeta {
                group_title: "News".to_string(),
                ..ChannelMeta::default()
            },
            retry: RetryPolicy {
                max_attempts: 2,
                delay_secs: 1,
            },
            log_file: None,
            is_resume: true,
        }
    }

    /// An unreachable source exhausts retries and never creates the event folder.
    #[test]
    fn test_unreachable_source_fails_without_files() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/live/1.ts", listener.local_addr().unwrap());
        drop(listener);

        let root = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let request = request(
            url,
            root.path(),
            today_at(now, chrono::Duration::minutes(-1)),
            today_at(now, chrono::Duration::minutes(5)),
        );

        let ctx = RecorderContext::new();
        let code = Scheduler::new(&ctx, request, chrono_tz::UTC, Box::new(LogSink), None).run();
        assert_eq!(code, ExitCode::Failure);
        assert!(!root.path().join("News").exists());
    }

    /// A stop time already behind us today ends the window at once, even for
    /// a resumed recording of a live source. It never rolls to tomorrow.
    #[test]
    fn test_stop_time_already_passed_records_nothing() {
        let url = serve_endless(vec![0x47; 188], Duration::from_millis(10));
        let root = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let request = request(
            url,
            root.path(),
            today_at(now, chrono::Duration::minutes(-3)),
            today_at(now, chrono::Duration::minutes(-1)),
        );

        let ctx = RecorderContext::new();
        let started = std::time::Instant::now();
        let code = Scheduler::new(&ctx, request, chrono_tz::UTC, Box::new(LogSink), None).run();
        assert_eq!(code, ExitCode::Success);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!root.path().join("News").exists());
        assert!(!ctx.has_child());
    }
}
