//! Minimal HTTP/1.1 media server for integration tests.
//!
//! Serves one static body and can be told to ignore ranges, use chunked or
//! gzip framing, redirect, demand Basic auth, stall, or drop the first
//! response part-way. Every request head is recorded.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    pub chunked: bool,
    pub gzip: bool,
    /// Answer `Connection: keep-alive` and serve several requests per link.
    pub keep_alive: bool,
    /// Require these Basic credentials.
    pub basic_auth: Option<(String, String)>,
    /// First media response sends this many body bytes, then goes quiet.
    pub stall_first_after: Option<usize>,
    /// First media response sends this many body bytes, then closes.
    pub close_first_after: Option<usize>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            chunked: false,
            gzip: false,
            keep_alive: true,
            basic_auth: None,
            stall_first_after: None,
            close_first_after: None,
        }
    }
}

#[derive(Default)]
struct ServerState {
    requests: Mutex<Vec<String>>,
    connections: AtomicUsize,
    media_responses: AtomicUsize,
}

pub struct MediaServer {
    base: String,
    state: Arc<ServerState>,
}

impl MediaServer {
    /// URL for `path` (leading slash included).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Base URL with credentials embedded.
    pub fn url_with_auth(&self, user: &str, pass: &str, path: &str) -> String {
        self.url(path)
            .replacen("http://", &format!("http://{user}:{pass}@"), 1)
    }

    /// Request heads received so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread serving `body`. The server runs
/// until the process exits.
pub fn start(body: Vec<u8>) -> MediaServer {
    start_with_options(body, ServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: ServerOptions) -> MediaServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base = format!("http://127.0.0.1:{port}");
    let state = Arc::new(ServerState::default());
    let body = Arc::new(body);
    let opts = Arc::new(opts);
    {
        let state = Arc::clone(&state);
        let base = base.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                state.connections.fetch_add(1, Ordering::SeqCst);
                let body = Arc::clone(&body);
                let opts = Arc::clone(&opts);
                let state = Arc::clone(&state);
                let base = base.clone();
                thread::spawn(move || serve_connection(stream, &body, &opts, &state, &base));
            }
        });
    }
    MediaServer { base, state }
}

struct Request {
    head: String,
    method: String,
    path: String,
    range: Option<u64>,
    authorization: Option<String>,
    content_length: Option<usize>,
    chunked: bool,
}

fn serve_connection(
    mut stream: TcpStream,
    body: &[u8],
    opts: &ServerOptions,
    state: &ServerState,
    base: &str,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut pending = Vec::new();
    loop {
        let Some(req) = read_request(&mut stream, &mut pending) else {
            return;
        };
        state.requests.lock().unwrap().push(req.head.clone());
        let keep = match handle(&mut stream, &mut pending, &req, body, opts, state, base) {
            Some(keep) => keep,
            None => return,
        };
        if !keep {
            return;
        }
    }
}

fn read_request(stream: &mut TcpStream, pending: &mut Vec<u8>) -> Option<Request> {
    let mut buf = [0u8; 4096];
    let end = loop {
        if let Some(i) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
            break i + 4;
        }
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return None,
            Ok(n) => pending.extend_from_slice(&buf[..n]),
        }
    };
    let head = String::from_utf8_lossy(&pending[..end]).into_owned();
    pending.drain(..end);

    let mut lines = head.split("\r\n");
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();
    let mut req = Request {
        head: head.clone(),
        method,
        path,
        range: None,
        authorization: None,
        content_length: None,
        chunked: false,
    };
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.eq_ignore_ascii_case("range") {
            req.range = value
                .strip_prefix("bytes=")
                .and_then(|v| v.trim_end_matches('-').parse().ok());
        } else if name.eq_ignore_ascii_case("authorization") {
            req.authorization = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-length") {
            req.content_length = value.parse().ok();
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            req.chunked = value.eq_ignore_ascii_case("chunked");
        }
    }
    Some(req)
}

/// Returns whether the link stays open, or `None` if it was dropped.
fn handle(
    stream: &mut TcpStream,
    pending: &mut Vec<u8>,
    req: &Request,
    body: &[u8],
    opts: &ServerOptions,
    state: &ServerState,
    base: &str,
) -> Option<bool> {
    let connection = if opts.keep_alive { "keep-alive" } else { "close" };

    if let Some((user, pass)) = &opts.basic_auth {
        let expected = format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")));
        if req.authorization.as_deref() != Some(expected.as_str()) {
            let resp = format!(
                "HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"media\"\r\n\
                 Content-Length: 0\r\nConnection: {connection}\r\n\r\n"
            );
            stream.write_all(resp.as_bytes()).ok()?;
            return Some(opts.keep_alive);
        }
    }

    if req.method == "POST" {
        let received = read_post_body(stream, pending, req)?;
        let resp = format!(
            "HTTP/1.1 201 Created\r\nContent-Length: {}\r\nConnection: {connection}\r\n\r\n",
            received.len()
        );
        stream.write_all(resp.as_bytes()).ok()?;
        stream.write_all(&received).ok()?;
        return Some(opts.keep_alive);
    }

    if let Some(n) = req.path.strip_prefix("/hop/") {
        let n: usize = n.parse().unwrap_or(0);
        if n > 0 {
            let resp = format!(
                "HTTP/1.1 302 Found\r\nLocation: /hop/{}\r\nContent-Length: 0\r\n\
                 Connection: {connection}\r\n\r\n",
                n - 1
            );
            stream.write_all(resp.as_bytes()).ok()?;
            return Some(opts.keep_alive);
        }
    }
    match req.path.as_str() {
        "/moved" => {
            let resp = format!(
                "HTTP/1.1 301 Moved Permanently\r\nLocation: {base}/media.ts\r\n\
                 Content-Length: 0\r\nConnection: {connection}\r\n\r\n"
            );
            stream.write_all(resp.as_bytes()).ok()?;
            return Some(opts.keep_alive);
        }
        "/missing" => {
            let resp = format!(
                "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: {connection}\r\n\r\nnot found"
            );
            stream.write_all(resp.as_bytes()).ok()?;
            return Some(opts.keep_alive);
        }
        "/garbage" => {
            stream.write_all(b"ICY 200 OK\r\n\r\n").ok()?;
            return None;
        }
        _ => {}
    }

    serve_media(stream, req, body, opts, state, connection)
}

fn serve_media(
    stream: &mut TcpStream,
    req: &Request,
    body: &[u8],
    opts: &ServerOptions,
    state: &ServerState,
    connection: &str,
) -> Option<bool> {
    let first = state.media_responses.fetch_add(1, Ordering::SeqCst) == 0;
    let total = body.len() as u64;
    let start = match req.range {
        Some(s) if opts.support_ranges && !opts.gzip => s.min(total),
        _ => 0,
    };
    let slice = &body[start as usize..];

    let mut head = String::new();
    if start > 0 || (req.range.is_some() && opts.support_ranges && !opts.gzip) {
        head.push_str("HTTP/1.1 206 Partial Content\r\n");
        head.push_str(&format!(
            "Content-Range: bytes {}-{}/{}\r\n",
            start,
            total.saturating_sub(1),
            total
        ));
    } else {
        head.push_str("HTTP/1.1 200 OK\r\n");
    }
    let payload = if opts.gzip {
        head.push_str("Content-Encoding: gzip\r\n");
        let mut enc =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(slice).ok()?;
        enc.finish().ok()?
    } else {
        slice.to_vec()
    };
    if opts.chunked {
        head.push_str("Transfer-Encoding: chunked\r\n");
    } else {
        head.push_str(&format!("Content-Length: {}\r\n", payload.len()));
    }
    head.push_str(&format!("Connection: {connection}\r\n\r\n"));

    let wire = if opts.chunked {
        let mut out = Vec::with_capacity(payload.len() + 64);
        for piece in payload.chunks(1000) {
            out.extend_from_slice(format!("{:x}\r\n", piece.len()).as_bytes());
            out.extend_from_slice(piece);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"0\r\n\r\n");
        out
    } else {
        payload
    };

    stream.write_all(head.as_bytes()).ok()?;
    if first {
        if let Some(n) = opts.stall_first_after {
            stream.write_all(&wire[..n.min(wire.len())]).ok()?;
            let _ = stream.flush();
            thread::sleep(Duration::from_secs(3));
            return None;
        }
        if let Some(n) = opts.close_first_after {
            stream.write_all(&wire[..n.min(wire.len())]).ok()?;
            let _ = stream.flush();
            let _ = stream.shutdown(std::net::Shutdown::Both);
            return None;
        }
    }
    stream.write_all(&wire).ok()?;
    Some(opts.keep_alive)
}

fn read_post_body(stream: &mut TcpStream, pending: &mut Vec<u8>, req: &Request) -> Option<Vec<u8>> {
    let mut buf = [0u8; 4096];
    let mut fill = |pending: &mut Vec<u8>| -> Option<()> {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => None,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                Some(())
            }
        }
    };
    if !req.chunked {
        let len = req.content_length.unwrap_or(0);
        while pending.len() < len {
            fill(&mut *pending)?;
        }
        return Some(pending.drain(..len).collect());
    }
    let mut out = Vec::new();
    loop {
        let line_end = loop {
            if let Some(i) = pending.windows(2).position(|w| w == b"\r\n") {
                break i;
            }
            fill(&mut *pending)?;
        };
        let size_line = String::from_utf8_lossy(&pending[..line_end]).into_owned();
        pending.drain(..line_end + 2);
        let size = usize::from_str_radix(size_line.trim(), 16).ok()?;
        while pending.len() < size + 2 {
            fill(&mut *pending)?;
        }
        if size == 0 {
            pending.drain(..2);
            return Some(out);
        }
        out.extend(pending.drain(..size));
        pending.drain(..2);
    }
}
