//! In-process stream copy.
//!
//! A worker thread opens the source, truncates the destination and copies
//! fixed-size chunks. The main thread only watches the clock and the
//! worker's result channel.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::{CaptureError, CaptureOutcome, CaptureStrategy, POLL_INTERVAL};
use crate::context::RecorderContext;

/// Bytes per read.
pub const CHUNK_SIZE: usize = 8192;

/// Timeout for establishing the source connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest wait for the response head or for any single read. A source that
/// goes silent for this long counts as dropped.
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// How one copy attempt ended without an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The boundary passed, either mid-stream or by the time the source ended
    ReachedBoundary,
    /// The source ended strictly before the boundary
    SourceEnded,
    /// The cancel flag was raised
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    pub outcome: CopyOutcome,
    pub bytes: u64,
}

/// Copy `reader` into `writer` until EOF, the boundary, or cancellation.
///
/// EOF at or after the boundary counts as reaching it.
pub fn copy_until<R, W, N>(
    reader: &mut R,
    writer: &mut W,
    boundary: DateTime<Utc>,
    cancel: &AtomicBool,
    now: N,
) -> Result<CopyReport, CaptureError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    N: Fn() -> DateTime<Utc>,
{
    let mut buf = [0u8; CHUNK_SIZE];
    let mut bytes = 0u64;

    let outcome = loop {
        if cancel.load(Ordering::SeqCst) {
            break CopyOutcome::Cancelled;
        }
        if now() >= boundary {
            break CopyOutcome::ReachedBoundary;
        }
        let n = match reader.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CaptureError::Read(e)),
        };
        if n == 0 {
            break if now() >= boundary {
                CopyOutcome::ReachedBoundary
            } else {
                CopyOutcome::SourceEnded
            };
        }
        writer.write_all(&buf[..n]).map_err(CaptureError::Write)?;
        bytes += n as u64;
    };

    writer.flush().map_err(CaptureError::Write)?;
    Ok(CopyReport { outcome, bytes })
}

/// One connection, one file: connect, truncate `dest`, copy.
pub fn run_once(
    client: &reqwest::blocking::Client,
    url: &str,
    dest: &Path,
    boundary: DateTime<Utc>,
    cancel: &AtomicBool,
) -> Result<CopyReport, CaptureError> {
    let mut response = client
        .get(url)
        .send()
        .map_err(|e| CaptureError::Connect(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(CaptureError::Status(status.as_u16()));
    }

    let mut file = File::create(dest).map_err(|source| CaptureError::OpenDestination {
        path: dest.to_path_buf(),
        source,
    })?;
    info!("[REGULAR] Writing stream to {}", dest.display());

    copy_until(&mut response, &mut file, boundary, cancel, Utc::now)
}

/// In-process byte copy of the HTTP body.
pub struct StreamCopy {
    url: String,
    dest: PathBuf,
    client: reqwest::blocking::Client,
}

impl StreamCopy {
    pub fn new(url: &str, dest: &Path) -> Result<Self, CaptureError> {
        Self::with_read_timeout(url, dest, READ_TIMEOUT)
    }

    /// The blocking client applies `timeout` per read, not to the whole body.
    pub fn with_read_timeout(
        url: &str,
        dest: &Path,
        read_timeout: Duration,
    ) -> Result<Self, CaptureError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(read_timeout)
            .build()
            .map_err(|e| CaptureError::Client(e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            dest: dest.to_path_buf(),
            client,
        })
    }
}

impl CaptureStrategy for StreamCopy {
    fn tag(&self) -> &'static str {
        "[REGULAR]"
    }

    fn run_until(&mut self, ctx: &RecorderContext, boundary: DateTime<Utc>) -> CaptureOutcome {
        let (tx, rx) = mpsc::channel();
        let client = self.client.clone();
        let url = self.url.clone();
        let dest = self.dest.clone();
        let cancel = ctx.shutdown_flag();

        let spawned = ctx.spawn("stream-copy", move || {
            let result = run_once(&client, &url, &dest, boundary, &cancel);
            let _ = tx.send(result);
        });
        if let Err(e) = spawned {
            return CaptureOutcome::Failed(CaptureError::Worker(e.to_string()));
        }

        loop {
            if Utc::now() >= boundary {
                info!("[REGULAR] Stop time reached, cancelling copy");
                ctx.request_shutdown();
                return CaptureOutcome::Completed;
            }

            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(report)) => {
                    return match report.outcome {
                        CopyOutcome::ReachedBoundary | CopyOutcome::Cancelled => {
                            info!("[REGULAR] Copy finished, {} bytes written", report.bytes);
                            CaptureOutcome::Completed
                        }
                        CopyOutcome::SourceEnded => {
                            warn!(
                                "[REGULAR] Stream ended before stop time after {} bytes",
                                report.bytes
                            );
                            CaptureOutcome::Dropped { cause: None }
                        }
                    };
                }
                Ok(Err(e)) if e.is_network() => {
                    warn!("[REGULAR] Network error during copy: {}", e);
                    return CaptureOutcome::Dropped { cause: Some(e) };
                }
                Ok(Err(e)) => {
                    error!("[REGULAR] {}", e);
                    return CaptureOutcome::Failed(e);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return CaptureOutcome::Failed(CaptureError::Worker(
                        "copy worker ended without reporting".to_string(),
                    ));
                }
            }
        }
    }
}
