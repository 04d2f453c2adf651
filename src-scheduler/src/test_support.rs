//! Minimal HTTP sources for unit tests.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

const OK_HEAD: &[u8] = b"HTTP/1.1 200 OK\r\ncontent-type: video/mp2t\r\nconnection: close\r\n\r\n";

fn read_request_head(stream: &mut TcpStream) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut head = Vec::new();
    let mut buf = [0u8; 512];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
}

/// Serve `response` verbatim to the first connection, then close it.
pub fn serve_once(response: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/live/1.ts", listener.local_addr().unwrap());
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            read_request_head(&mut stream);
            let _ = stream.write_all(&response);
        }
    });
    url
}

/// Serve a 200 response with `body` and no content length, then close.
pub fn serve_body(body: Vec<u8>) -> String {
    let mut response = OK_HEAD.to_vec();
    response.extend_from_slice(&body);
    serve_once(response)
}

/// Stream `chunk` every `interval` until the client goes away.
pub fn serve_endless(chunk: Vec<u8>, interval: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/live/1.ts", listener.local_addr().unwrap());
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            read_request_head(&mut stream);
            if stream.write_all(OK_HEAD).is_err() {
                return;
            }
            while stream.write_all(&chunk).is_ok() {
                std::thread::sleep(interval);
            }
        }
    });
    url
}

/// Send the response head, then hold the connection open for `hold` without
/// writing a body.
pub fn serve_stalled(hold: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/live/1.ts", listener.local_addr().unwrap());
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            read_request_head(&mut stream);
            if stream.write_all(OK_HEAD).is_ok() {
                std::thread::sleep(hold);
            }
        }
    });
    url
}
