//! Platform-specific logging directory resolution.

use std::path::PathBuf;

pub const APP_NAME: &str = "iptv-recorder";

/// Returns the platform-appropriate directory for log files.
///
/// | Platform | Directory |
/// |----------|-----------|
/// | Linux | `$XDG_STATE_HOME/iptv-recorder/logs` or `~/.local/state/iptv-recorder/logs` |
/// | macOS | `~/Library/Logs/iptv-recorder` |
/// | Windows | `%LOCALAPPDATA%\iptv-recorder\iptv-recorder\logs` |
///
/// Falls back to `./logs` when no home directory can be determined.
pub fn log_dir() -> PathBuf {
    let Some(base) = directories::ProjectDirs::from("", "", APP_NAME) else {
        return PathBuf::from("logs");
    };

    #[cfg(target_os = "linux")]
    {
        base.state_dir()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| base.data_local_dir().join("state"))
            .join("logs")
    }

    #[cfg(target_os = "macos")]
    {
        // data_local_dir is ~/Library/Application Support/<app>; walk up to ~/Library.
        let library = base
            .data_local_dir()
            .parent()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| base.data_local_dir().to_path_buf());
        library.join("Logs").join(APP_NAME)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        base.data_local_dir().join("logs")
    }
}

/// Default log file for scheduler processes started by the launcher.
pub fn scheduler_log_path() -> PathBuf {
    log_dir().join("scheduler.log")
}
