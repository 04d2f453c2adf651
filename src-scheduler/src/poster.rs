//! Channel logo download, stored as `poster.jpg` beside the recording.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

const POSTER_TIMEOUT: Duration = Duration::from_secs(15);

/// Download `logo_url` to `dest`.
///
/// Returns the number of bytes written, or `None` when the URL is not
/// `http(s)`. Failures are logged and never propagate.
pub fn fetch_poster(logo_url: &str, dest: &Path) -> Option<u64> {
    let url = logo_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return None;
    }

    match download(url, dest) {
        Ok(bytes) => {
            info!("[SCHEDULER] Saved poster ({} bytes) to {}", bytes, dest.display());
            Some(bytes)
        }
        Err(e) => {
            warn!("[SCHEDULER] Could not fetch poster from {}: {}", url, e);
            None
        }
    }
}

fn download(url: &str, dest: &Path) -> Result<u64, Box<dyn std::error::Error>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(POSTER_TIMEOUT)
        .build()?;
    let body = client.get(url).send()?.error_for_status()?.bytes()?;
    let mut file = std::fs::File::create(dest)?;
    file.write_all(&body)?;
    Ok(body.len() as u64)
}
