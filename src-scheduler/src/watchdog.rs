//! Failsafe watchdog.
//!
//! Independent of everything else in the process: once the wall clock
//! passes the stop instant it fires, no matter what the capture is doing.

use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use iptv_recorder_common::TimeOfDay;
use tracing::{info, warn};

use crate::context::RecorderContext;

/// Poll interval for the watchdog thread.
pub const WATCHDOG_POLL: Duration = Duration::from_secs(1);

pub struct Watchdog;

impl Watchdog {
    /// Start watching `stop` in `tz`, rolled to tomorrow if already past.
    ///
    /// Returns the absolute instant being watched.
    pub fn start<F>(
        ctx: &RecorderContext,
        stop: TimeOfDay,
        tz: Tz,
        on_fire: F,
    ) -> std::io::Result<DateTime<Utc>>
    where
        F: FnOnce() + Send + 'static,
    {
        let stop_at = stop.stop_boundary(tz, Utc::now()).with_timezone(&Utc);
        Self::spawn_until(ctx, stop_at, WATCHDOG_POLL, on_fire)?;
        Ok(stop_at)
    }

    /// Fire `on_fire` once `Utc::now() >= stop_at`, polling every `poll`.
    ///
    /// The thread ends quietly if the context shuts down first.
    pub fn spawn_until<F>(
        ctx: &RecorderContext,
        stop_at: DateTime<Utc>,
        poll: Duration,
        on_fire: F,
    ) -> std::io::Result<DateTime<Utc>>
    where
        F: FnOnce() + Send + 'static,
    {
        let shutdown = ctx.shutdown_flag();
        info!("[WATCHDOG] Armed for {}", stop_at.to_rfc3339());

        ctx.spawn("watchdog", move || loop {
            if Utc::now() >= stop_at {
                warn!("[WATCHDOG] Stop time {} reached, forcing exit", stop_at.to_rfc3339());
                on_fire();
                return;
            }
            if shutdown.load(Ordering::SeqCst) {
                return;
            }
            std::thread::sleep(poll);
        })?;
        Ok(stop_at)
    }
}
