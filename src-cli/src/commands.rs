//! CLI command implementations.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use iptv_recorder_common::naming::destination_path;
use iptv_recorder_common::notify::{NotificationSink, WebhookSink};
use iptv_recorder_common::{handoff, playlist};
use iptv_recorder_common::{CaptureMode, ChannelInfo, RecordingRequest, TimeOfDay};
use serde::Serialize;
use serde_json::json;

use crate::colors;
use crate::config::{Config, PlaylistSource, Settings};
use crate::exit_codes::ExitCode;
use crate::launcher;

const PLAYLIST_TIMEOUT: Duration = Duration::from_secs(60);

/// Arguments of `schedule`.
#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    pub search: String,
    pub start: String,
    pub stop: String,
    pub mode: Option<CaptureMode>,
    pub dry_run: bool,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("{}", colors::error(&format!("Failed to serialize output: {}", e)));
            ExitCode::GeneralError
        }
    }
}

fn fetch_playlist(url: &str) -> Result<String, reqwest::Error> {
    let client = reqwest::blocking::Client::builder()
        .timeout(PLAYLIST_TIMEOUT)
        .build()?;
    client.get(url).send()?.error_for_status()?.text()
}

/// Load the playlist and keep the configured groups.
pub fn load_channels(settings: &Settings) -> Result<Vec<ChannelInfo>, String> {
    let channels = match &settings.playlist {
        PlaylistSource::File(path) => playlist::parse_file(path).map_err(|e| e.to_string())?,
        PlaylistSource::Url(url) => {
            let content =
                fetch_playlist(url).map_err(|e| format!("Failed to download playlist: {}", e))?;
            let channels = playlist::parse(&content);
            if channels.is_empty() {
                return Err(playlist::PlaylistError::Empty.to_string());
            }
            channels
        }
    };
    Ok(playlist::filter_groups(channels, &settings.groups))
}

/// List channels, optionally narrowed by a search.
pub fn channels(settings: &Settings, search: Option<&str>, json: bool) -> ExitCode {
    let all = match load_channels(settings) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", colors::error(&e));
            return ExitCode::PlaylistUnavailable;
        }
    };
    let shown: Vec<&ChannelInfo> = match search {
        Some(query) => playlist::search(&all, query),
        None => all.iter().collect(),
    };

    if json {
        return print_json(&shown);
    }
    if shown.is_empty() {
        println!("{}", colors::dim("No channels found."));
        return ExitCode::Success;
    }

    let code_width = shown.iter().map(|c| c.code.len()).max().unwrap_or(4).max(4);
    let group_width = shown
        .iter()
        .map(|c| c.group_title.chars().count())
        .max()
        .unwrap_or(5)
        .clamp(5, 24);

    println!(
        "{}  {}  {}",
        colors::pad_left("CODE", code_width, colors::header),
        colors::pad_left("GROUP", group_width, colors::header),
        colors::header("NAME")
    );
    println!(
        "{}  {}  {}",
        "-".repeat(code_width),
        "-".repeat(group_width),
        "-".repeat(4)
    );
    for channel in shown {
        let group: String = channel.group_title.chars().take(group_width).collect();
        println!(
            "{}  {:<group_width$}  {}",
            colors::pad_left(&channel.code, code_width, colors::number),
            group,
            channel.display_name()
        );
    }
    ExitCode::Success
}

fn notify(settings: &Settings, subject: &str, body: &str) {
    if let Some(url) = &settings.webhook_url {
        WebhookSink::new(url.clone()).notify(subject, body);
    }
}

/// Build the request for the first channel matching the search.
///
/// A `H:MM` time in the channel name overrides `start`.
pub fn build_request(
    settings: &Settings,
    channel: &ChannelInfo,
    start: &str,
    stop: &str,
    mode: Option<CaptureMode>,
) -> Result<RecordingRequest, String> {
    let start = match playlist::start_time_in_name(channel.display_name()) {
        Some(time) => time,
        None => TimeOfDay::parse(start, settings.clock)
            .map_err(|e| format!("Invalid start time: {}", e))?,
    };
    let stop =
        TimeOfDay::parse(stop, settings.clock).map_err(|e| format!("Invalid stop time: {}", e))?;

    let request = RecordingRequest {
        source_url: channel.url.clone(),
        destination_root: settings.destination.clone(),
        start,
        stop,
        timezone: settings.timezone.clone(),
        clock: settings.clock,
        mode: mode.unwrap_or(settings.mode),
        channel: channel.meta(),
        retry: settings.retry,
        log_file: Some(settings.log_file.clone()),
        is_resume: false,
    };
    request.validate().map_err(|e| e.to_string())?;
    Ok(request)
}

/// Find a channel and start a scheduler for it in the background.
pub fn schedule(settings: &Settings, options: &ScheduleOptions, json: bool) -> ExitCode {
    let all = match load_channels(settings) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", colors::error(&e));
            return ExitCode::PlaylistUnavailable;
        }
    };

    let Some(channel) = playlist::search(&all, &options.search).into_iter().next() else {
        let msg = format!("No channel matched '{}'", options.search);
        eprintln!("{}", colors::error(&msg));
        notify(settings, "No channel matched", &msg);
        return ExitCode::NoChannelMatched;
    };

    let request = match build_request(
        settings,
        channel,
        &options.start,
        &options.stop,
        options.mode,
    ) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", colors::error(&e));
            return ExitCode::InvalidArguments;
        }
    };

    let file = request
        .tz()
        .map(|tz| {
            destination_path(
                &request.destination_root,
                &request.channel,
                tz,
                request.start,
                request.stop,
                Utc::now(),
            )
            .file
        })
        .ok();

    if options.dry_run {
        let args = handoff::to_args(&request, settings.webhook_url.as_deref());
        if json {
            return print_json(&json!({
                "dry_run": true,
                "request": request,
                "file": file,
                "args": args,
            }));
        }
        print_summary("Dry run", &request, file.as_deref(), None);
        println!();
        println!("{} {}", colors::bold("iptv-scheduler"), shell_words(&args));
        return ExitCode::Success;
    }

    let pid = match launcher::find_scheduler_binary().and_then(|binary| {
        launcher::spawn_scheduler(&binary, &request, settings.webhook_url.as_deref())
    }) {
        Ok(pid) => pid,
        Err(e) => {
            eprintln!("{}", colors::error(&e.to_string()));
            return ExitCode::SchedulerFailedToStart;
        }
    };

    notify(
        settings,
        "Recording scheduled",
        &format!(
            "{} from {} to {} ({}), pid {}",
            request.channel.display_name, request.start, request.stop, request.timezone, pid
        ),
    );

    if json {
        return print_json(&json!({
            "dry_run": false,
            "request": request,
            "file": file,
            "pid": pid,
        }));
    }
    print_summary("Scheduled recording", &request, file.as_deref(), Some(pid));
    ExitCode::Success
}

fn print_summary(title: &str, request: &RecordingRequest, file: Option<&Path>, pid: Option<u32>) {
    println!("{}", colors::success(title));
    println!("  Channel:  {}", colors::bold(&request.channel.display_name));
    println!(
        "  Window:   {} - {} ({})",
        request.start, request.stop, request.timezone
    );
    println!("  Mode:     {}", request.mode);
    if let Some(file) = file {
        println!("  File:     {}", colors::path(&file.display().to_string()));
    }
    if let Some(log) = &request.log_file {
        println!("  Log:      {}", colors::path(&log.display().to_string()));
    }
    if let Some(pid) = pid {
        println!("  PID:      {}", colors::number(&pid.to_string()));
    }
}

/// Quote arguments for display so a dry run can be pasted into a shell.
fn shell_words(args: &[String]) -> String {
    args.iter()
        .map(|a| {
            if !a.is_empty()
                && a
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./:=@+,".contains(c))
            {
                a.clone()
            } else {
                format!("'{}'", a.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print the effective configuration.
pub fn config(path: &Path, config: &Config, json: bool) -> ExitCode {
    let exists = path.exists();
    let warnings = match config.resolve() {
        Ok(settings) => settings.warnings,
        Err(e) => vec![e.to_string()],
    };

    if json {
        return print_json(&json!({
            "path": path,
            "exists": exists,
            "config": config,
            "warnings": warnings,
        }));
    }

    let note = if exists { "" } else { " (not found, using defaults)" };
    println!(
        "{} {}{}",
        colors::header("Config file:"),
        colors::path(&path.display().to_string()),
        colors::dim(note)
    );
    for warning in &warnings {
        eprintln!("{}", colors::warning(warning));
    }
    print_json(config)
}

/// Show version information.
pub fn version(json: bool) -> ExitCode {
    let version = env!("CARGO_PKG_VERSION");
    if json {
        return print_json(&json!({ "version": version }));
    }
    println!("{} {}", colors::bold("iptv-recorder"), version);
    ExitCode::Success
}
