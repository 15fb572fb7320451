//! HTTP/JSON front end for the score store.
//!
//! `GET /api/leaderboard` returns the top ten, `POST /api/leaderboard` appends one
//! entry. Every response is `{"success": bool, "data" | "error": ...}` and the
//! connection is closed after it.

use super::{NewScore, ScoreStore, StoreError, TOP_N};
use serde_json::{Value, json};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::timeout;

pub const API_PATH: &str = "/api/leaderboard";

/// Longest accepted request line or header line, terminator included.
pub const MAX_LINE: usize = 8 * 1024;
pub const MAX_HEADERS: usize = 64;
pub const MAX_BODY: usize = 16 * 1024;

/// How long a rejected peer gets to finish sending before the socket closes.
const LINGER: Duration = Duration::from_secs(1);
const LINGER_BYTES: u64 = 1024 * 1024;

pub type SharedStore = Arc<Mutex<ScoreStore>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    fn ok(status: u16, data: Value) -> Self {
        Response {
            status,
            body: json!({ "success": true, "data": data }),
        }
    }

    fn fail(status: u16, error: impl Into<String>) -> Self {
        let error: String = error.into();
        Response {
            status,
            body: json!({ "success": false, "error": error }),
        }
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            201 => "Created",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            431 => "Request Header Fields Too Large",
            _ => "Internal Server Error",
        }
    }
}

/// Dispatches one parsed request against the store.
pub fn route(method: &str, target: &str, body: &[u8], store: &mut ScoreStore) -> Response {
    let path = target.split('?').next().unwrap_or(target);
    if path.trim_end_matches('/') != API_PATH {
        return Response::fail(404, format!("No route for {path}"));
    }
    match method {
        "GET" => match serde_json::to_value(store.top(TOP_N)) {
            Ok(data) => Response::ok(200, data),
            Err(e) => {
                log::error!("failed to encode scores: {e}");
                Response::fail(400, "Failed to fetch scores")
            }
        },
        "POST" => {
            let entry: NewScore = match serde_json::from_slice(body) {
                Ok(entry) => entry,
                Err(e) => return Response::fail(400, format!("Invalid request body: {e}")),
            };
            match store.append(&entry) {
                Ok(record) => {
                    log::info!("recorded {} for {:?}", record.score, record.name);
                    match serde_json::to_value(record) {
                        Ok(data) => Response::ok(201, data),
                        Err(e) => Response::fail(400, e.to_string()),
                    }
                }
                Err(StoreError::Invalid(e)) => Response::fail(400, e.to_string()),
                Err(e) => {
                    log::error!("failed to create score: {e}");
                    Response::fail(400, "Failed to create score")
                }
            }
        }
        other => Response::fail(405, format!("Method {other} not allowed")),
    }
}

pub async fn bind(addr: &str) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("leaderboard listening on http://{}{}", listener.local_addr()?, API_PATH);
    Ok(listener)
}

/// Accepts connections forever, one task per connection. A peer gets
/// `read_timeout` to deliver its whole request.
pub async fn serve(listener: TcpListener, store: SharedStore, read_timeout: Duration) -> io::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, store, read_timeout).await {
                        log::warn!("connection error from {addr}: {e}");
                    }
                });
            }
            Err(e) => {
                log::error!("accept error: {e}");
            }
        }
    }
}

#[derive(Debug)]
struct Request {
    method: String,
    target: String,
    body: Vec<u8>,
}

#[derive(Debug)]
enum Incoming {
    Request(Request),
    /// Answered without reaching the router; the peer may still be sending.
    Reject(Response),
    Closed,
}

async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    store: SharedStore,
    read_timeout: Duration,
) -> io::Result<()> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);

    let incoming = match timeout(read_timeout, read_request(&mut reader)).await {
        Ok(incoming) => incoming?,
        Err(_) => Incoming::Reject(Response::fail(408, "Request timed out")),
    };

    let request = match incoming {
        Incoming::Closed => return Ok(()),
        Incoming::Reject(response) => {
            log::debug!("{addr} rejected with {}", response.status);
            write_response(&mut writer, &response).await?;
            writer.shutdown().await?;
            linger(&mut reader).await;
            return Ok(());
        }
        Incoming::Request(request) => request,
    };

    // The store writes to disk under the lock; keep that off the async workers.
    let Request {
        method,
        target,
        body,
    } = request;
    let response = tokio::task::spawn_blocking(move || {
        let mut store = store.blocking_lock();
        let response = route(&method, &target, &body, &mut store);
        log::debug!("{addr} {method} {target} -> {}", response.status);
        response
    })
    .await
    .unwrap_or_else(|e| {
        log::error!("request handler failed: {e}");
        Response::fail(500, "Internal server error")
    });
    write_response(&mut writer, &response).await?;
    writer.shutdown().await
}

/// Reads one request head and body. Every line is bounded by `MAX_LINE`, the head
/// by `MAX_HEADERS` and the body by `MAX_BODY`.
async fn read_request<R>(reader: &mut R) -> io::Result<Incoming>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    match read_line_bounded(reader, &mut line).await? {
        None => return Ok(Incoming::Reject(Response::fail(414, "Request line too long"))),
        Some(0) => return Ok(Incoming::Closed),
        Some(_) => {}
    }
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Ok(Incoming::Reject(Response::fail(400, "Malformed request line")));
    };
    let (method, target) = (method.to_string(), target.to_string());

    let mut content_length = 0usize;
    let mut headers = 0;
    loop {
        match read_line_bounded(reader, &mut line).await? {
            None => {
                return Ok(Incoming::Reject(Response::fail(431, "Header line too long")));
            }
            Some(0) => break,
            Some(_) if line.trim().is_empty() => break,
            Some(_) => {}
        }
        headers += 1;
        if headers > MAX_HEADERS {
            let resp = Response::fail(431, format!("More than {MAX_HEADERS} headers"));
            return Ok(Incoming::Reject(resp));
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = match value.trim().parse() {
                    Ok(n) => n,
                    Err(_) => {
                        return Ok(Incoming::Reject(Response::fail(400, "Invalid Content-Length")));
                    }
                };
            }
        }
    }

    if content_length > MAX_BODY {
        let resp = Response::fail(413, format!("Request body over {MAX_BODY} bytes"));
        return Ok(Incoming::Reject(resp));
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;
    Ok(Incoming::Request(Request {
        method,
        target,
        body,
    }))
}

/// Reads one line into `line`, replacing its contents. `None` when the line runs
/// past `MAX_LINE` without a newline.
async fn read_line_bounded<R>(reader: &mut R, line: &mut String) -> io::Result<Option<usize>>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let n = (&mut *reader).take(MAX_LINE as u64).read_line(line).await?;
    if n == MAX_LINE && !line.ends_with('\n') {
        return Ok(None);
    }
    Ok(Some(n))
}

/// Drains what a rejected peer is still sending, so that closing the socket does
/// not reset the connection before the response is read.
async fn linger<R>(reader: &mut R)
where
    R: AsyncRead + Unpin,
{
    let mut rest = (&mut *reader).take(LINGER_BYTES);
    let _ = timeout(LINGER, tokio::io::copy(&mut rest, &mut tokio::io::sink())).await;
}

async fn write_response<W>(writer: &mut W, response: &Response) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = response.body.to_string();
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.reason(),
        body.len()
    );
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(body.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_then_get() {
        let mut store = ScoreStore::in_memory();
        let created = route("POST", API_PATH, br#"{"name":"AAA","score":7}"#, &mut store);
        assert_eq!(created.status, 201);
        assert_eq!(created.body["success"], true);
        assert_eq!(created.body["data"]["name"], "AAA");
        assert!(created.body["data"]["createdAt"].is_string());

        let listed = route("GET", "/api/leaderboard?x=1", b"", &mut store);
        assert_eq!(listed.status, 200);
        assert_eq!(listed.body["data"][0]["score"], 7);
    }

    #[test]
    fn get_returns_at_most_ten_descending() {
        let mut store = ScoreStore::in_memory();
        for s in 0..15 {
            store.append(&NewScore::new(format!("P{s}"), s)).unwrap();
        }
        let listed = route("GET", API_PATH, b"", &mut store);
        let data = listed.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 10);
        assert_eq!(data[0]["score"], 14);
        assert_eq!(data[9]["score"], 5);
    }

    #[test]
    fn validation_failures_are_structured() {
        let mut store = ScoreStore::in_memory();
        let resp = route("POST", API_PATH, br#"{"score":7}"#, &mut store);
        assert_eq!(resp.status, 400);
        assert_eq!(resp.body["success"], false);
        assert_eq!(resp.body["error"], "Please provide a name for this score.");

        let resp = route("POST", API_PATH, br#"{"name":"ABCDEFGHIJKL","score":7}"#, &mut store);
        assert_eq!(resp.body["error"], "Name cannot be more than 10 characters");

        let resp = route("POST", API_PATH, b"not json", &mut store);
        assert_eq!(resp.status, 400);
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_routes_and_methods() {
        let mut store = ScoreStore::in_memory();
        assert_eq!(route("GET", "/", b"", &mut store).status, 404);
        assert_eq!(route("DELETE", API_PATH, b"", &mut store).status, 405);
    }

    async fn parse(raw: &[u8]) -> Incoming {
        let mut reader = raw;
        read_request(&mut reader).await.unwrap()
    }

    fn rejected(incoming: Incoming) -> Response {
        match incoming {
            Incoming::Reject(response) => response,
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reads_head_and_body() {
        let raw = b"POST /api/leaderboard HTTP/1.1\r\nHost: x\r\ncontent-length: 5\r\n\r\nhello";
        match parse(raw).await {
            Incoming::Request(req) => {
                assert_eq!(req.method, "POST");
                assert_eq!(req.target, API_PATH);
                assert_eq!(req.body, b"hello");
            }
            other => panic!("expected a request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_connection_is_closed_quietly() {
        assert!(matches!(parse(b"").await, Incoming::Closed));
    }

    #[tokio::test]
    async fn overlong_lines_stop_at_the_limit() {
        let raw = vec![b'A'; MAX_LINE * 4];
        assert_eq!(rejected(parse(&raw).await).status, 414);

        let mut raw = b"GET / HTTP/1.1\r\nX-Big: ".to_vec();
        raw.extend(vec![b'a'; MAX_LINE]);
        raw.extend(b"\r\n\r\n");
        assert_eq!(rejected(parse(&raw).await).status, 431);
    }

    #[tokio::test]
    async fn header_count_is_capped() {
        let mut raw = b"GET /api/leaderboard HTTP/1.1\r\n".to_vec();
        for i in 0..=MAX_HEADERS {
            raw.extend(format!("X-{i}: 1\r\n").bytes());
        }
        raw.extend(b"\r\n");
        assert_eq!(rejected(parse(&raw).await).status, 431);

        let mut raw = b"GET /api/leaderboard HTTP/1.1\r\n".to_vec();
        for i in 0..MAX_HEADERS {
            raw.extend(format!("X-{i}: 1\r\n").bytes());
        }
        raw.extend(b"\r\n");
        assert!(matches!(parse(&raw).await, Incoming::Request(_)));
    }

    #[tokio::test]
    async fn bad_content_length_is_a_client_error() {
        let raw = b"POST /api/leaderboard HTTP/1.1\r\nContent-Length: abc\r\n\r\n{}";
        let resp = rejected(parse(raw).await);
        assert_eq!(resp.status, 400);
        assert_eq!(resp.body["error"], "Invalid Content-Length");

        let raw = b"POST /api/leaderboard HTTP/1.1\r\nContent-Length: 99999\r\n\r\n";
        assert_eq!(rejected(parse(raw).await).status, 413);
    }

    #[tokio::test]
    async fn malformed_request_line() {
        let resp = rejected(parse(b"garbage\r\n\r\n").await);
        assert_eq!(resp.status, 400);
        assert_eq!(resp.body["success"], false);
    }
}
