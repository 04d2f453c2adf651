//! End-to-end runs of the `iptv-scheduler` binary against local HTTP sources.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Timelike, Utc};
use iptv_recorder_common::handoff::to_args;
use iptv_recorder_common::{
    CaptureMode, ChannelMeta, ClockFormat, RecordingRequest, RetryPolicy, TimeOfDay,
};

const SCHEDULER: &str = env!("CARGO_BIN_EXE_iptv-scheduler");

/// How the test source treats each connection.
#[derive(Clone, Copy)]
enum Behaviour {
    /// Stream TS packets until the client disconnects
    Live,
    /// Send one byte, then close
    OneByte,
}

struct TestSource {
    url: String,
    connections: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
}

impl TestSource {
    fn start(behaviour: Behaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let url = format!("http://{}/live/user/pass/4242.ts", listener.local_addr().unwrap());
        let connections = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let (conns, halt) = (Arc::clone(&connections), Arc::clone(&stop));
        std::thread::spawn(move || {
            while !halt.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        conns.fetch_add(1, Ordering::SeqCst);
                        let halt = Arc::clone(&halt);
                        std::thread::spawn(move || serve(stream, behaviour, &halt));
                    }
                    Err(_) => std::thread::sleep(Duration::from_millis(20)),
                }
            }
        });

        Self {
            url,
            connections,
            stop,
        }
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for TestSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn serve(mut stream: TcpStream, behaviour: Behaviour, halt: &AtomicBool) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut head = Vec::new();
    let mut buf = [0u8; 512];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    let headers = b"HTTP/1.1 200 OK\r\ncontent-type: video/mp2t\r\nconnection: close\r\n\r\n";
    if stream.write_all(headers).is_err() {
        return;
    }
    match behaviour {
        Behaviour::OneByte => {
            let _ = stream.write_all(&[0x47]);
        }
        Behaviour::Live => {
            let packet = [0x47u8; 188];
            while !halt.load(Ordering::SeqCst) && stream.write_all(&packet).is_ok() {
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

/// Stop times are same-day, so a window that would cross midnight waits for
/// the new day first.
fn wait_out_midnight(stop_in: ChronoDuration) {
    let now = Utc::now();
    let end = now + stop_in + ChronoDuration::seconds(30);
    if end.date_naive() != now.date_naive() {
        let wait = end.date_naive().and_hms_opt(0, 0, 1).unwrap().and_utc() - now;
        std::thread::sleep(wait.to_std().unwrap());
    }
}

/// Start one minute ago (clamped to midnight), stop `stop_in` from now. UTC.
fn request(url: &str, root: &Path, stop_in: ChronoDuration, retry: RetryPolicy) -> RecordingRequest {
    wait_out_midnight(stop_in);
    let now = Utc::now();
    let earlier = now - ChronoDuration::minutes(1);
    let start = if earlier.date_naive() == now.date_naive() {
        TimeOfDay::new(earlier.hour(), earlier.minute(), earlier.second()).unwrap()
    } else {
        TimeOfDay::new(0, 0, 0).unwrap()
    };
    let stop_at = now + stop_in;
    let stop = TimeOfDay::new(stop_at.hour(), stop_at.minute(), stop_at.second()).unwrap();

    RecordingRequest {
        source_url: url.to_string(),
        destination_root: root.to_path_buf(),
        start,
        stop,
        timezone: "UTC".to_string(),
        clock: ClockFormat::TwentyFourHour,
        mode: CaptureMode::StreamCopy,
        channel: ChannelMeta {
            display_name: "Test Channel".to_string(),
            group_title: "Tests".to_string(),
            tvg_id: String::new(),
            tvg_logo: String::new(),
        },
        retry,
        log_file: None,
        is_resume: false,
    }
}

fn run(request: &RecordingRequest) -> i32 {
    Command::new(SCHEDULER)
        .args(to_args(request, None))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap()
        .code()
        .unwrap_or(-1)
}

fn ts_files(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|e| e == "ts") {
                found.push(path);
            }
        }
    }
    found
}

#[test]
fn live_source_records_until_stop_time() {
    let source = TestSource::start(Behaviour::Live);
    let root = tempfile::tempdir().unwrap();
    let req = request(
        &source.url,
        root.path(),
        ChronoDuration::seconds(5),
        RetryPolicy {
            max_attempts: 3,
            delay_secs: 1,
        },
    );

    assert_eq!(run(&req), 0);

    let files = ts_files(root.path());
    assert_eq!(files.len(), 1, "expected one recording, found {:?}", files);
    assert!(std::fs::metadata(&files[0]).unwrap().len() > 0);
}

#[test]
fn unreachable_source_exits_without_recording() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/live/1.ts", listener.local_addr().unwrap());
    drop(listener);

    let root = tempfile::tempdir().unwrap();
    let req = request(
        &url,
        root.path(),
        ChronoDuration::minutes(5),
        RetryPolicy {
            max_attempts: 3,
            delay_secs: 1,
        },
    );

    assert_eq!(run(&req), 1);
    assert!(ts_files(root.path()).is_empty());
}

/// One byte then EOF, well before the stop time: the process hands off to a
/// resume successor and exits 1.
#[test]
fn early_eof_hands_off_to_successor() {
    let source = TestSource::start(Behaviour::OneByte);
    let root = tempfile::tempdir().unwrap();
    let log = root.path().join("scheduler.log");
    let mut req = request(
        &source.url,
        root.path(),
        ChronoDuration::seconds(10),
        RetryPolicy {
            max_attempts: 1,
            delay_secs: 1,
        },
    );
    req.log_file = Some(log.clone());

    assert_eq!(run(&req), 1);

    // Predecessor: probe + copy. Anything beyond that came from the successor.
    assert!(
        source.connections() >= 3,
        "successor never connected ({} connections)",
        source.connections()
    );

    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("[RESUME] Starting successor for 'Test Channel'"));
    assert!(text.contains(&format!("{} - {}", req.start, req.stop)));
    assert!(text.contains("[RESUME] Resuming 'Test Channel'"));
}
