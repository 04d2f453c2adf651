//! IPTV Recorder Scheduler
//!
//! One process per recording window. Started by the launcher (or by a
//! predecessor handing off a dropped stream) with the versioned argument
//! vector from `iptv_recorder_common::handoff`, it waits for the start time,
//! records until the stop time and exits 0 on success, 1 otherwise.

mod args;
mod capture;
mod context;
mod exit_codes;
mod poster;
mod preflight;
mod probe;
mod resume;
mod scheduler;
#[cfg(test)]
mod test_support;
mod watchdog;

use std::path::Path;

use args::SchedulerArgs;
use clap::Parser;
use context::RecorderContext;
use exit_codes::ExitCode;
use iptv_recorder_common::notify;
use scheduler::Scheduler;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let args = match SchedulerArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() {
                ExitCode::Failure
            } else {
                ExitCode::Success
            };
            let _ = e.print();
            std::process::exit(code.as_i32());
        }
    };

    init_logging(args.log_path().as_deref());
    info!(
        "[STARTUP] iptv-scheduler {} starting (pid: {})",
        env!("CARGO_PKG_VERSION"),
        std::process::id()
    );

    let (request, notify_url) = match args.into_request() {
        Ok(parsed) => parsed,
        Err(e) => {
            error!("[STARTUP] Invalid arguments: {}", e);
            std::process::exit(ExitCode::Failure.as_i32());
        }
    };
    let tz = match request.tz() {
        Ok(tz) => tz,
        Err(e) => {
            error!("[STARTUP] {}", e);
            std::process::exit(ExitCode::Failure.as_i32());
        }
    };

    let ctx = RecorderContext::new();
    setup_signal_handlers(&ctx);

    let notifier = notify::sink_for(notify_url.as_deref());
    let code = Scheduler::new(&ctx, request, tz, notifier, notify_url).run();
    ctx.exit(code)
}

/// Log to stderr, plus a plain-text file when one is given.
///
/// The file writer is synchronous so a forced exit never loses lines.
fn init_logging(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let mut file_error = None;
    let file_layer = log_file.and_then(|path| match file_appender(path) {
        Ok(appender) => Some(fmt::layer().with_ansi(false).with_writer(appender)),
        Err(e) => {
            file_error = Some(format!("{}: {}", path.display(), e));
            None
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!("[STARTUP] Could not open log file {}", e);
    }
}

fn file_appender(
    path: &Path,
) -> Result<tracing_appender::rolling::RollingFileAppender, Box<dyn std::error::Error>> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .ok_or("log file path has no file name")?
        .to_string_lossy()
        .into_owned();
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)?;
    Ok(appender)
}

/// SIGINT/SIGTERM stop the capture and exit with `Failure`.
fn setup_signal_handlers(ctx: &RecorderContext) {
    let ctx = ctx.clone();
    let result = ctrlc::set_handler(move || {
        info!("[STARTUP] Received termination signal");
        ctx.exit(ExitCode::Failure)
    });
    if let Err(e) = result {
        warn!("[STARTUP] Could not install signal handler: {}", e);
    }
}
