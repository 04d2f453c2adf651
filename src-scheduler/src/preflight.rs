//! Checks run once before any connection attempt.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Minimum free space on the destination filesystem.
pub const MIN_FREE_BYTES: u64 = 100 * 1024 * 1024;

/// Error type for preflight checks. All variants are fatal.
#[derive(Debug)]
pub enum PreflightError {
    InvalidUrl(String),
    CreateDestination {
        path: PathBuf,
        source: std::io::Error,
    },
    InsufficientSpace {
        path: PathBuf,
        available: u64,
    },
}

impl std::fmt::Display for PreflightError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreflightError::InvalidUrl(msg) => write!(f, "Invalid stream URL: {}", msg),
            PreflightError::CreateDestination { path, source } => write!(
                f,
                "Cannot create destination {}: {}",
                path.display(),
                source
            ),
            PreflightError::InsufficientSpace { path, available } => write!(
                f,
                "Not enough free space at {}: {} MiB available, {} MiB required",
                path.display(),
                available / (1024 * 1024),
                MIN_FREE_BYTES / (1024 * 1024)
            ),
        }
    }
}

impl std::error::Error for PreflightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PreflightError::CreateDestination { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Accept only absolute `http`/`https` URLs.
pub fn validate_url(url: &str) -> Result<reqwest::Url, PreflightError> {
    let parsed = reqwest::Url::parse(url.trim())
        .map_err(|e| PreflightError::InvalidUrl(format!("{} ({})", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(PreflightError::InvalidUrl(format!(
            "unsupported scheme '{}' in {}",
            other, url
        ))),
    }
}

/// Bytes available to unprivileged users on the filesystem holding `path`.
#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
pub fn available_space(path: &Path) -> std::io::Result<Option<u64>> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(Some(stat.f_bavail as u64 * stat.f_frsize as u64))
}

#[cfg(not(unix))]
pub fn available_space(_path: &Path) -> std::io::Result<Option<u64>> {
    Ok(None)
}

/// Create the destination root if needed and make sure it has room.
pub fn prepare_destination(root: &Path) -> Result<(), PreflightError> {
    std::fs::create_dir_all(root).map_err(|source| PreflightError::CreateDestination {
        path: root.to_path_buf(),
        source,
    })?;

    match available_space(root) {
        Ok(Some(available)) if available < MIN_FREE_BYTES => {
            Err(PreflightError::InsufficientSpace {
                path: root.to_path_buf(),
                available,
            })
        }
        Ok(Some(available)) => {
            debug!("{} MiB free at {}", available / (1024 * 1024), root.display());
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => {
            // Unknown free space never blocks a recording.
            debug!("Free space check failed for {}: {}", root.display(), e);
            Ok(())
        }
    }
}

/// Run every preflight check.
pub fn check(url: &str, root: &Path) -> Result<(), PreflightError> {
    validate_url(url)?;
    prepare_destination(root)?;
    info!("[SCHEDULER] Preflight passed for {}", root.display());
    Ok(())
}
