//! Connectivity probe with bounded retries.

use std::time::Duration;

use iptv_recorder_common::RetryPolicy;
use tracing::{error, info, warn};

/// Connect and read timeout for a single probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for connectivity probing.
#[derive(Debug)]
pub enum ProbeError {
    /// HTTP client could not be constructed
    Client(String),
    /// Connection failed or timed out
    Connect(String),
    /// Server answered with a non-success status
    Status(u16),
    /// Every configured attempt failed
    Exhausted { attempts: u32, last: Box<ProbeError> },
    /// Shutdown was requested while retrying
    Cancelled,
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::Client(e) => write!(f, "HTTP client error: {}", e),
            ProbeError::Connect(e) => write!(f, "Connection failed: {}", e),
            ProbeError::Status(code) => write!(f, "Server returned HTTP {}", code),
            ProbeError::Exhausted { attempts, last } => {
                write!(f, "Source unreachable after {} attempts: {}", attempts, last)
            }
            ProbeError::Cancelled => write!(f, "Probe cancelled by shutdown"),
        }
    }
}

impl std::error::Error for ProbeError {}

/// A single reachability check.
pub trait Probe {
    fn attempt(&self, url: &str) -> Result<(), ProbeError>;
}

/// Opens an HTTP connection and drops it as soon as headers arrive.
pub struct HttpProbe {
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Probe for HttpProbe {
    fn attempt(&self, url: &str) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ProbeError::Connect(e.to_string()))?;
        let status = response.status();
        drop(response);
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}

/// Probe until the first success or until the policy runs out.
///
/// Sleeps `policy.delay()` between attempts, never after the last one.
/// Returns the number of attempts made.
pub fn probe_with_retries<P, S, C>(
    probe: &P,
    url: &str,
    policy: RetryPolicy,
    channel: &str,
    mut sleep: S,
    cancelled: C,
) -> Result<u32, ProbeError>
where
    P: Probe + ?Sized,
    S: FnMut(Duration),
    C: Fn() -> bool,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match probe.attempt(url) {
            Ok(()) => {
                info!(
                    "[SCHEDULER] Source reachable for '{}' (attempt {}/{})",
                    channel, attempt, max
                );
                return Ok(attempt);
            }
            Err(e) if attempt >= max => {
                error!(
                    "[SCHEDULER] Attempt {}/{} for '{}' failed: {}. Giving up",
                    attempt, max, channel, e
                );
                return Err(ProbeError::Exhausted {
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                warn!(
                    "[SCHEDULER] Attempt {}/{} for '{}' failed: {}. Retrying in {}s",
                    attempt, max, channel, e, policy.delay_secs
                );
            }
        }
        sleep(policy.delay());
        if cancelled() {
            return Err(ProbeError::Cancelled);
        }
        attempt += 1;
    }
}
