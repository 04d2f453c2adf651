//! Process-lifetime context.
//!
//! Owns every background thread, the shutdown flag and the external child
//! process. All exit paths go through [`RecorderContext::exit`], except the
//! watchdog, which uses [`ForceExit`] so a wedged thread cannot hold it up.

use std::io::Write;
use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::exit_codes::ExitCode;

/// How long all threads get to finish once shutdown starts.
pub const JOIN_DEADLINE: Duration = Duration::from_secs(5);

/// How long the external process gets to quit after `q` before it is killed.
pub const CHILD_STOP_GRACE: Duration = Duration::from_secs(5);

/// Attempts [`ForceExit`] makes to take the child slot.
const KILL_LOCK_ATTEMPTS: usize = 20;

type ChildSlot = Arc<Mutex<Option<Child>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Inner {
    shutdown: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    child: ChildSlot,
}

/// Shared handle to the process-lifetime state.
#[derive(Clone)]
pub struct RecorderContext {
    inner: Arc<Inner>,
}

impl Default for RecorderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderContext {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                shutdown: Arc::new(AtomicBool::new(false)),
                threads: Mutex::new(Vec::new()),
                child: Arc::new(Mutex::new(None)),
            }),
        }
    }

    /// The flag background loops poll to know when to stop.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.inner.shutdown)
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
    }

    /// Spawn a named thread owned by this context.
    pub fn spawn<F>(&self, name: &str, f: F) -> std::io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(f)?;
        lock(&self.inner.threads).push(handle);
        Ok(())
    }

    /// Hand the external process to the context.
    ///
    /// A process already in the slot is stopped first.
    pub fn set_child(&self, child: Child) {
        self.stop_child();
        *lock(&self.inner.child) = Some(child);
    }

    #[cfg(test)]
    pub fn has_child(&self) -> bool {
        lock(&self.inner.child).is_some()
    }

    /// Stop the external process: `q` on stdin, then kill after the grace period.
    ///
    /// Returns false when there was nothing to stop.
    pub fn stop_child(&self) -> bool {
        self.stop_child_within(CHILD_STOP_GRACE)
    }

    /// The child stays in its slot until it has exited, so [`ForceExit`] can
    /// still kill it during the grace period.
    pub fn stop_child_within(&self, grace: Duration) -> bool {
        let pid = {
            let mut slot = lock(&self.inner.child);
            let Some(child) = slot.as_mut() else {
                return false;
            };
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(b"q\n").and_then(|_| stdin.flush()) {
                    debug!("Could not send quit to pid {}: {}", child.id(), e);
                }
            }
            child.id()
        };

        let deadline = Instant::now() + grace;
        loop {
            let polled = match lock(&self.inner.child).as_mut() {
                Some(child) => child.try_wait(),
                None => return true,
            };
            match polled {
                Ok(Some(status)) => {
                    info!("External process {} exited: {}", pid, status);
                    lock(&self.inner.child).take();
                    return true;
                }
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(100));
                }
                Ok(None) => {
                    warn!("External process {} ignored quit, killing", pid);
                    break;
                }
                Err(e) => {
                    warn!("Could not poll external process {}: {}", pid, e);
                    break;
                }
            }
        }

        if let Some(mut child) = lock(&self.inner.child).take() {
            if let Err(e) = child.kill() {
                warn!("Failed to kill external process {}: {}", pid, e);
            }
            let _ = child.wait();
        }
        true
    }

    /// Raise the flag, stop the child and join threads until `deadline`.
    ///
    /// Returns the number of threads still running at the deadline.
    pub fn shutdown(&self, deadline: Duration) -> usize {
        self.request_shutdown();
        self.stop_child();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.inner.threads));
        let until = Instant::now() + deadline;
        while Instant::now() < until && !handles.iter().all(|h| h.is_finished()) {
            std::thread::sleep(Duration::from_millis(50));
        }

        let mut stragglers = 0;
        for handle in handles {
            if handle.is_finished() {
                let name = handle.thread().name().unwrap_or("unnamed").to_string();
                if handle.join().is_err() {
                    warn!("Thread '{}' panicked", name);
                }
            } else {
                warn!(
                    "Thread '{}' still running at shutdown",
                    handle.thread().name().unwrap_or("unnamed")
                );
                stragglers += 1;
            }
        }
        stragglers
    }

    /// Tear everything down and end the process.
    pub fn exit(&self, code: ExitCode) -> ! {
        self.shutdown(JOIN_DEADLINE);
        info!("Exiting with code {} ({})", code.as_i32(), code);
        std::process::exit(code.as_i32())
    }

    pub fn force_exit(&self) -> ForceExit {
        ForceExit {
            child: Arc::clone(&self.inner.child),
            shutdown: Arc::clone(&self.inner.shutdown),
        }
    }
}

/// Unconditional exit that never waits on another thread.
#[derive(Clone)]
pub struct ForceExit {
    child: ChildSlot,
    shutdown: Arc<AtomicBool>,
}

impl ForceExit {
    pub fn exit(&self, code: ExitCode) -> ! {
        self.shutdown.store(true, Ordering::SeqCst);
        self.kill_child();
        std::process::exit(code.as_i32())
    }

    /// Kill the external process if there is one. The slot lock is only ever
    /// held briefly, so a few attempts are enough; a wedged holder is skipped.
    ///
    /// Returns true when a child was found.
    pub fn kill_child(&self) -> bool {
        for _ in 0..KILL_LOCK_ATTEMPTS {
            let mut slot = match self.child.try_lock() {
                Ok(slot) => slot,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    std::thread::sleep(Duration::from_millis(10));
                    continue;
                }
            };
            return match slot.as_mut() {
                Some(child) => {
                    let _ = child.kill();
                    true
                }
                None => false,
            };
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_shutdown_joins_cooperative_threads() {
        let ctx = RecorderContext::new();
        let flag = ctx.shutdown_flag();
        let (tx, rx) = mpsc::channel();
        ctx.spawn("worker", move || {
            while !flag.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(10));
            }
            tx.send(()).unwrap();
        })
        .unwrap();

        assert_eq!(ctx.shutdown(Duration::from_secs(2)), 0);
        assert!(rx.try_recv().is_ok());
        assert!(ctx.is_shutdown_requested());
    }

    #[test]
    fn test_shutdown_reports_stragglers() {
        let ctx = RecorderContext::new();
        ctx.spawn("stuck", || std::thread::sleep(Duration::from_secs(2)))
            .unwrap();
        let started = Instant::now();
        assert_eq!(ctx.shutdown(Duration::from_millis(100)), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_stop_child_without_child() {
        let ctx = RecorderContext::new();
        assert!(!ctx.stop_child());
    }

    /// A child that ignores `q` is killed once the grace period runs out.
    #[cfg(unix)]
    #[test]
    fn test_stop_child_kills_after_grace() {
        use std::process::{Command, Stdio};

        let child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::piped())
            .spawn()
            .unwrap();
        let ctx = RecorderContext::new();
        ctx.set_child(child);
        assert!(ctx.has_child());

        let started = Instant::now();
        assert!(ctx.stop_child_within(Duration::from_millis(200)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!ctx.has_child());
        // Idempotent.
        assert!(!ctx.stop_child());
    }

    /// While a graceful stop is still waiting, the forced exit can reach and
    /// kill the child, which ends the wait early.
    #[cfg(unix)]
    #[test]
    fn test_force_exit_kills_child_during_grace() {
        use std::process::{Command, Stdio};

        let child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::piped())
            .spawn()
            .unwrap();
        let ctx = RecorderContext::new();
        ctx.set_child(child);
        let force = ctx.force_exit();

        let stopping = ctx.clone();
        let stopper =
            std::thread::spawn(move || stopping.stop_child_within(Duration::from_secs(20)));
        std::thread::sleep(Duration::from_millis(300));
        assert!(ctx.has_child());

        let started = Instant::now();
        assert!(force.kill_child());
        assert!(stopper.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!ctx.has_child());
        assert!(!force.kill_child());
    }
}
