//! Launcher configuration.
//!
//! Read from `config.json` in the platform config directory, then
//! overridden by `IPTV_*` environment variables. [`Config::resolve`]
//! validates the result into the [`Settings`] a schedule run uses.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use iptv_recorder_common::request::DEFAULT_TIMEZONE;
use iptv_recorder_common::time::parse_timezone;
use iptv_recorder_common::{logging, CaptureMode, ClockFormat, RetryPolicy};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.json";

/// Error type for configuration loading and validation.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file exists but could not be read
    Read { path: PathBuf, source: std::io::Error },
    /// The config file is not valid JSON for [`Config`]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A value failed validation
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse {}: {}", path.display(), source)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistConfig {
    /// M3U download URL
    #[serde(default)]
    pub url: String,
    /// Local M3U file, preferred over `url` when set
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Recording root; `~` is expanded
    #[serde(default = "default_output_directory")]
    pub directory: String,
}

fn default_output_directory() -> String {
    "~/Recordings".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Record through ffmpeg instead of copying the HTTP body
    #[serde(default)]
    pub use_ffmpeg: bool,
    #[serde(default = "default_clock_24h")]
    pub clock_24h: bool,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_clock_24h() -> bool {
    true
}

fn default_retries() -> u32 {
    RetryPolicy::default().max_attempts
}

fn default_retry_delay_secs() -> u64 {
    RetryPolicy::default().delay_secs
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            use_ffmpeg: false,
            clock_24h: default_clock_24h(),
            retries: default_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Contents of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playlist: PlaylistConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    /// Playlist groups to keep; empty keeps every channel
    #[serde(default)]
    pub groups: Vec<String>,
    /// Scheduler log file; defaults to the platform log directory
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Where the channel list comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistSource {
    File(PathBuf),
    Url(String),
}

/// Validated configuration for one launcher run.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub playlist: PlaylistSource,
    pub destination: PathBuf,
    pub timezone: String,
    pub mode: CaptureMode,
    pub clock: ClockFormat,
    pub retry: RetryPolicy,
    pub groups: Vec<String>,
    pub log_file: PathBuf,
    pub webhook_url: Option<String>,
    /// Problems that were corrected rather than rejected
    #[serde(skip)]
    pub warnings: Vec<String>,
}

/// Default location of `config.json`.
pub fn config_path() -> PathBuf {
    match ProjectDirs::from("", "", logging::APP_NAME) {
        Some(dirs) => dirs.config_dir().join(CONFIG_FILE),
        None => PathBuf::from(CONFIG_FILE),
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path.trim()).into_owned())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    /// Load `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `IPTV_*` overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = non_empty(lookup("IPTV_DESTINATION")) {
            self.output.directory = v;
        }
        if let Some(v) = non_empty(lookup("IPTV_PLAYLIST_URL")) {
            self.playlist.url = v;
        }
        if let Some(v) = non_empty(lookup("IPTV_PLAYLIST_FILE")) {
            self.playlist.file = Some(v);
        }
        if let Some(v) = non_empty(lookup("IPTV_USE_FFMPEG")) {
            self.recording.use_ffmpeg = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = non_empty(lookup("IPTV_GROUPS")) {
            self.groups = v
                .split('|')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = non_empty(lookup("IPTV_TIMEZONE")) {
            self.recording.timezone = v;
        }
        if let Some(v) = non_empty(lookup("IPTV_WEBHOOK_URL")) {
            self.notify.webhook_url = Some(v);
        }
    }

    /// Validate and resolve paths. An unknown timezone falls back to the
    /// default with a warning; everything else invalid is an error.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let mut warnings = Vec::new();

        if self.output.directory.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "output directory is empty".to_string(),
            ));
        }

        let playlist = match non_empty(self.playlist.file.clone()) {
            Some(file) => PlaylistSource::File(expand(&file)),
            None if !self.playlist.url.trim().is_empty() => {
                PlaylistSource::Url(self.playlist.url.trim().to_string())
            }
            None => {
                return Err(ConfigError::Invalid(
                    "no playlist configured (set playlist.file or playlist.url)".to_string(),
                ))
            }
        };

        if self.recording.retries == 0 {
            return Err(ConfigError::Invalid("retries must be at least 1".to_string()));
        }
        if self.recording.retry_delay_secs == 0 {
            return Err(ConfigError::Invalid(
                "retry_delay_secs must be at least 1".to_string(),
            ));
        }

        let timezone = match parse_timezone(&self.recording.timezone) {
            Ok(_) => self.recording.timezone.trim().to_string(),
            Err(e) => {
                warnings.push(format!("{}, using {}", e, DEFAULT_TIMEZONE));
                DEFAULT_TIMEZONE.to_string()
            }
        };

        let mode = if self.recording.use_ffmpeg {
            CaptureMode::ExternalMux
        } else {
            CaptureMode::StreamCopy
        };

        let log_file = match non_empty(self.log_file.clone()) {
            Some(path) => expand(&path),
            None => logging::scheduler_log_path(),
        };

        Ok(Settings {
            playlist,
            destination: expand(&self.output.directory),
            timezone,
            mode,
            clock: ClockFormat::from_is_24_hour(self.recording.clock_24h),
            retry: RetryPolicy {
                max_attempts: self.recording.retries,
                delay_secs: self.recording.retry_delay_secs,
            },
            groups: self.groups.clone(),
            log_file,
            webhook_url: non_empty(self.notify.webhook_url.clone()),
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_playlist() -> Config {
        let mut config = Config::default();
        config.playlist.url = "http://example.com/get.php?type=m3u".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output.directory, "~/Recordings");
        assert_eq!(config.recording.timezone, "Europe/Stockholm");
        assert!(!config.recording.use_ffmpeg);
        assert!(config.recording.clock_24h);
        assert_eq!(config.recording.retries, 5);
        assert_eq!(config.recording.retry_delay_secs, 60);
        assert!(config.groups.is_empty());
    }

    /// Missing sections and fields fall back to their defaults.
    #[test]
    fn test_partial_file_uses_defaults() {
        let json = r#"{ "playlist": { "url": "http://x/list.m3u" }, "recording": { "use_ffmpeg": true } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.playlist.url, "http://x/list.m3u");
        assert!(config.recording.use_ffmpeg);
        assert_eq!(config.recording.retries, 5);
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("IPTV_DESTINATION", "/srv/tv"),
            ("IPTV_USE_FFMPEG", "TRUE"),
            ("IPTV_GROUPS", "Sports | News|"),
            ("IPTV_TIMEZONE", "UTC"),
            ("IPTV_WEBHOOK_URL", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = with_playlist();
        config.notify.webhook_url = Some("http://hooks/1".to_string());
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.output.directory, "/srv/tv");
        assert!(config.recording.use_ffmpeg);
        assert_eq!(config.groups, vec!["Sports", "News"]);
        assert_eq!(config.recording.timezone, "UTC");
        // Blank values do not override.
        assert_eq!(config.notify.webhook_url.as_deref(), Some("http://hooks/1"));
    }

    #[test]
    fn test_resolve_prefers_playlist_file() {
        let mut config = with_playlist();
        config.playlist.file = Some("/tmp/list.m3u".to_string());
        let settings = config.resolve().unwrap();
        assert_eq!(
            settings.playlist,
            PlaylistSource::File(PathBuf::from("/tmp/list.m3u"))
        );
        assert_eq!(settings.mode, CaptureMode::StreamCopy);
        assert!(settings.warnings.is_empty());
    }

    #[test]
    fn test_resolve_requires_playlist() {
        assert!(matches!(
            Config::default().resolve(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_zero_retries() {
        let mut config = with_playlist();
        config.recording.retries = 0;
        assert!(config.resolve().is_err());

        let mut config = with_playlist();
        config.recording.retry_delay_secs = 0;
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_resolve_unknown_timezone_falls_back() {
        let mut config = with_playlist();
        config.recording.timezone = "Mars/Olympus".to_string();
        let settings = config.resolve().unwrap();
        assert_eq!(settings.timezone, DEFAULT_TIMEZONE);
        assert_eq!(settings.warnings.len(), 1);
    }

    #[test]
    fn test_resolve_expands_tilde() {
        let mut config = with_playlist();
        config.output.directory = "~/tv".to_string();
        config.log_file = Some("~/logs/rec.log".to_string());
        let settings = config.resolve().unwrap();
        assert!(!settings.destination.to_string_lossy().starts_with('~'));
        assert!(settings.destination.ends_with("tv"));
        assert!(settings.log_file.ends_with("logs/rec.log"));
    }
}
