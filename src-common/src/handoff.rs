//! Scheduler command-line wire contract.
//!
//! The launcher and the resume controller both start `iptv-scheduler` with
//! an argument vector produced here. The argument order is versioned: any
//! change to positions or meaning must bump [`WIRE_VERSION`] and the
//! scheduler's parser together.
//!
//! ```text
//! iptv-scheduler --wire-version 1 [--notify-url URL] --
//!     <url> <destination-root> <start> <stop> <ffmpeg|regular>
//!     [display-name] [timezone] [is-24-hour] [log-file] [group-title]
//!     [tvg-id] [retries] [retry-delay-secs] [tvg-logo] [is-resume]
//! ```

use crate::request::RecordingRequest;

/// Current argument layout version.
pub const WIRE_VERSION: u32 = 1;

/// Flag carrying the wire version.
pub const WIRE_VERSION_FLAG: &str = "--wire-version";

/// Flag carrying the optional webhook URL.
pub const NOTIFY_URL_FLAG: &str = "--notify-url";

/// Flatten a request into scheduler arguments (program name excluded).
///
/// Every optional positional is always written so the layout stays fixed.
/// Positionals follow a `--` so display names starting with `-` survive.
pub fn to_args(request: &RecordingRequest, notify_url: Option<&str>) -> Vec<String> {
    let mut args = vec![WIRE_VERSION_FLAG.to_string(), WIRE_VERSION.to_string()];

    if let Some(url) = notify_url.filter(|u| !u.trim().is_empty()) {
        args.push(NOTIFY_URL_FLAG.to_string());
        args.push(url.to_string());
    }

    args.push("--".to_string());

    let log_file = request
        .log_file
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    args.extend([
        request.source_url.clone(),
        request.destination_root.to_string_lossy().into_owned(),
        request.start.to_string(),
        request.stop.to_string(),
        request.mode.as_str().to_string(),
        request.channel.display_name.clone(),
        request.timezone.clone(),
        request.clock.is_24_hour().to_string(),
        log_file,
        request.channel.group_title.clone(),
        request.channel.tvg_id.clone(),
        request.retry.max_attempts.to_string(),
        request.retry.delay_secs.to_string(),
        request.channel.tvg_logo.clone(),
        request.is_resume.to_string(),
    ]);

    args
}
