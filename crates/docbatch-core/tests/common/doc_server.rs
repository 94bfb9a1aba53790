//! Minimal HTTP/1.1 server standing in for the document portal.
//!
//! Routes by path: `/docs/<name>` serves a PDF body, `/missing` is 404,
//! `/busy` is 503, `/private` redirects to the login page and `/page` serves
//! HTML. Each connection handles one request.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

pub const PDF_BODY: &[u8] = b"%PDF-1.4\n1 0 obj <<>> endobj\ntrailer <<>>\n%%EOF\n";

/// Starts the server in a background thread. Returns the base URL without a
/// trailing slash (e.g. "http://127.0.0.1:12345"). Runs until the process exits.
pub fn start() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || handle(stream));
        }
    });
    format!("http://127.0.0.1:{}", port)
}

fn respond(stream: &mut std::net::TcpStream, status: &str, headers: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n",
        status,
        body.len(),
        headers
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn handle(mut stream: std::net::TcpStream) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let path = request
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/");

    if path.starts_with("/docs/") {
        respond(&mut stream, "200 OK", "Content-Type: application/pdf\r\n", PDF_BODY);
    } else if path == "/missing" {
        respond(&mut stream, "404 Not Found", "", b"");
    } else if path == "/busy" {
        respond(&mut stream, "503 Service Unavailable", "", b"");
    } else if path == "/private" {
        respond(&mut stream, "302 Found", "Location: /dang-nhap?next=/private\r\n", b"");
    } else if path.starts_with("/dang-nhap") || path == "/page" {
        respond(
            &mut stream,
            "200 OK",
            "Content-Type: text/html; charset=utf-8\r\n",
            b"<!DOCTYPE html><html><body>login</body></html>",
        );
    } else {
        respond(&mut stream, "400 Bad Request", "", b"");
    }
}
