use flappy_board::leaderboard::{
    HttpLeaderboard, Leaderboard, LeaderboardError, NewScore, ScoreStore, server,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

async fn spawn_server_with(read_timeout: Duration) -> SocketAddr {
    let listener = server::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let store = Arc::new(Mutex::new(ScoreStore::in_memory()));
    tokio::spawn(server::serve(listener, store, read_timeout));
    addr
}

async fn spawn_server() -> SocketAddr {
    spawn_server_with(Duration::from_secs(5)).await
}

/// Splits a raw HTTP response into its status and JSON body.
fn parse_response(raw: &[u8]) -> (u16, Value) {
    let text = std::str::from_utf8(raw).unwrap();
    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
    (status, serde_json::from_str(body).unwrap())
}

/// Sends `request` as-is, closes the write side and reads the whole response.
async fn exchange(addr: SocketAddr, request: &[u8]) -> (u16, Value) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    parse_response(&raw)
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_then_list_over_http() {
    let base = format!("http://{}", spawn_server().await);

    let top = tokio::task::spawn_blocking(move || {
        let board = HttpLeaderboard::new(&base, Duration::from_secs(5));
        let record = board.submit(&NewScore::new("AAA", 7)).unwrap();
        assert_eq!(record.name, "AAA");
        assert_eq!(record.score, 7);
        board.submit(&NewScore::new("BBB", 12)).unwrap();
        board.top(10).unwrap()
    })
    .await
    .unwrap();

    let scores: Vec<_> = top.iter().map(|r| (r.name.as_str(), r.score)).collect();
    assert_eq!(scores, [("BBB", 12), ("AAA", 7)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_submission_carries_the_server_message() {
    let base = format!("http://{}", spawn_server().await);

    let err = tokio::task::spawn_blocking(move || {
        let board = HttpLeaderboard::new(&base, Duration::from_secs(5));
        board.submit(&NewScore::new("ABCDEFGHIJK", 1)).unwrap_err()
    })
    .await
    .unwrap();

    match err {
        LeaderboardError::Rejected(msg) => {
            assert_eq!(msg, "Name cannot be more than 10 characters")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn raw_post_and_get_use_the_envelope() {
    let addr = spawn_server().await;
    let body = r#"{"name":"AAA","score":7}"#;
    let post = format!(
        "POST /api/leaderboard HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let (status, json) = exchange(addr, post.as_bytes()).await;
    assert_eq!(status, 201);
    assert_eq!(json["success"], true);

    let (status, json) = exchange(addr, b"GET /api/leaderboard HTTP/1.1\r\n\r\n").await;
    assert_eq!(status, 200);
    assert_eq!(json["data"][0]["name"], "AAA");
    assert_eq!(json["data"][0]["score"], 7);
    assert!(json["data"][0]["createdAt"].is_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_paths_and_methods_over_the_wire() {
    let addr = spawn_server().await;

    let (status, json) = exchange(addr, b"GET /nope HTTP/1.1\r\n\r\n").await;
    assert_eq!(status, 404);
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());

    let (status, json) = exchange(addr, b"DELETE /api/leaderboard HTTP/1.1\r\n\r\n").await;
    assert_eq!(status, 405);
    assert_eq!(json["success"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_and_oversized_requests_are_refused() {
    let addr = spawn_server().await;

    let (status, json) = exchange(addr, b"garbage\r\n\r\n").await;
    assert_eq!(status, 400);
    assert_eq!(json["error"], "Malformed request line");

    let (status, json) = exchange(
        addr,
        b"POST /api/leaderboard HTTP/1.1\r\nContent-Length: nope\r\n\r\n{}",
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(json["error"], "Invalid Content-Length");

    let (status, json) = exchange(
        addr,
        b"POST /api/leaderboard HTTP/1.1\r\nContent-Length: 1000000\r\n\r\n",
    )
    .await;
    assert_eq!(status, 413);
    assert_eq!(json["success"], false);

    let mut many = b"GET /api/leaderboard HTTP/1.1\r\n".to_vec();
    for i in 0..100 {
        many.extend(format!("X-{i}: 1\r\n").bytes());
    }
    many.extend(b"\r\n");
    let (status, _) = exchange(addr, &many).await;
    assert_eq!(status, 431);
}

#[tokio::test(flavor = "multi_thread")]
async fn endless_request_line_is_cut_off() {
    let addr = spawn_server().await;
    let flood = vec![b'A'; 256 * 1024];
    let (status, json) = exchange(addr, &flood).await;
    assert_eq!(status, 414);
    assert_eq!(json["success"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn stalled_request_times_out() {
    let addr = spawn_server_with(Duration::from_millis(200)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    // Half a request, then nothing; the write side stays open.
    stream.write_all(b"GET /api/leaderboard HTTP/1.1\r\n").await.unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
        .await
        .expect("server answers within its read timeout")
        .unwrap();
    let (status, json) = parse_response(&raw);
    assert_eq!(status, 408);
    assert_eq!(json["error"], "Request timed out");
}
