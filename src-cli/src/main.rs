//! IPTV Recorder Command-Line Interface
//!
//! Finds a channel in the configured M3U playlist and starts an
//! `iptv-scheduler` process in the background to record it.

mod colors;
mod commands;
mod config;
mod exit_codes;
mod launcher;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::ScheduleOptions;
use config::Config;
use exit_codes::ExitCode;
use iptv_recorder_common::CaptureMode;

/// IPTV Recorder - scheduled stream recording
#[derive(Parser, Debug)]
#[command(name = "iptv-recorder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List channels from the configured playlist
    Channels {
        /// Only show channels whose name contains every term
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Schedule a recording of the first channel matching a search
    Schedule {
        /// Search terms matched against channel names
        search: String,

        /// Start time (HH:MM); a time in the channel name takes precedence
        start: String,

        /// Stop time (HH:MM), on the same day as the start time
        stop: String,

        /// Capture mode: ffmpeg or regular (overrides the config)
        #[arg(short, long)]
        mode: Option<CaptureMode>,

        /// Print what would be started without starting it
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the effective configuration
    Config,
    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = run(cli);
    std::process::exit(exit_code.as_i32());
}

fn run(cli: Cli) -> ExitCode {
    if let Commands::Version = cli.command {
        return commands::version(cli.json);
    }

    let path = cli.config.clone().unwrap_or_else(config::config_path);
    let mut config = match Config::load(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", colors::error(&e.to_string()));
            return ExitCode::InvalidArguments;
        }
    };
    config.apply_env(|key| std::env::var(key).ok());

    if let Commands::Config = cli.command {
        return commands::config(&path, &config, cli.json);
    }

    let settings = match config.resolve() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", colors::error(&e.to_string()));
            return ExitCode::InvalidArguments;
        }
    };
    for warning in &settings.warnings {
        eprintln!("{}", colors::warning(warning));
    }

    match cli.command {
        Commands::Channels { search } => commands::channels(&settings, search.as_deref(), cli.json),
        Commands::Schedule {
            search,
            start,
            stop,
            mode,
            dry_run,
        } => commands::schedule(
            &settings,
            &ScheduleOptions {
                search,
                start,
                stop,
                mode,
                dry_run,
            },
            cli.json,
        ),
        Commands::Config | Commands::Version => ExitCode::Success,
    }
}
