//! Push connection against a real WebSocket server on a random local port.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracker_client::ws::{ConnectionState, EventChannel, ReconnectConfig, WsConnection};
use tracker_client::Credentials;

const WAIT: Duration = Duration::from_secs(5);

/// What the test server saw.
#[derive(Default)]
struct Seen {
    accepted: AtomicUsize,
    authorization: Mutex<Vec<Option<String>>>,
}

/// Accepts connections one at a time, records their handshakes and sends
/// each string from the returned sender to the current client. The string
/// `"close"` makes the server drop that client instead.
async fn start_server() -> (String, Arc<Seen>, mpsc::UnboundedSender<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Seen::default());
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<String>();

    let server_seen = seen.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let seen = server_seen.clone();
            let callback = move |request: &Request, response: Response| {
                let auth = request
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                seen.authorization.lock().unwrap().push(auth);
                Ok::<_, ErrorResponse>(response)
            };
            let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                continue;
            };
            server_seen.accepted.fetch_add(1, Ordering::SeqCst);

            // Serve this client until it leaves or the test asks us to drop it.
            loop {
                tokio::select! {
                    frame = frames_rx.recv() => match frame.as_deref() {
                        Some("close") => {
                            let _ = ws.close(None).await;
                            break;
                        }
                        Some(text) => {
                            if ws.send(Message::Text(text.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        None => return,
                    },
                    incoming = ws.next() => match incoming {
                        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                        Some(Ok(_)) => {}
                    },
                }
            }
        }
    });

    (format!("ws://{addr}/ws"), seen, frames_tx)
}

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        ..ReconnectConfig::default()
    }
}

async fn wait_for_state(conn: &WsConnection, expected: ConnectionState) {
    let mut rx = conn.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == expected))
        .await
        .unwrap_or_else(|_| panic!("state never became {expected:?}"))
        .unwrap();
}

#[tokio::test]
async fn connecting_twice_opens_one_socket() {
    let (url, seen, _frames) = start_server().await;
    let credentials = Credentials::default();
    credentials.set(Some("session-token".into()));
    let conn = WsConnection::new(url, credentials, fast_reconnect());

    conn.connect();
    conn.connect();
    wait_for_state(&conn, ConnectionState::Connected).await;
    conn.connect();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(seen.accepted.load(Ordering::SeqCst), 1);
    assert_eq!(
        seen.authorization.lock().unwrap().as_slice(),
        &[Some("Bearer session-token".to_string())]
    );

    conn.disconnect();
    conn.disconnect();
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn pushed_frames_reach_registered_handlers() {
    let (url, _seen, frames) = start_server().await;
    let conn = WsConnection::new(url, Credentials::default(), fast_reconnect());

    let (got_tx, mut got_rx) = mpsc::unbounded_channel::<Value>();
    conn.on(
        "leave-update",
        Arc::new(move |data: &Value| {
            let _ = got_tx.send(data.clone());
        }),
    );

    conn.connect();
    wait_for_state(&conn, ConnectionState::Connected).await;

    frames.send("not json".to_string()).unwrap();
    frames
        .send(json!({ "event": "shift-update", "data": {} }).to_string())
        .unwrap();
    frames
        .send(json!({ "event": "leave-update", "data": { "id": "l1" } }).to_string())
        .unwrap();

    let data = tokio::time::timeout(WAIT, got_rx.recv()).await.unwrap().unwrap();
    assert_eq!(data, json!({ "id": "l1" }));
    assert!(got_rx.try_recv().is_err());
}

#[tokio::test]
async fn dropped_connection_is_reestablished() {
    let (url, seen, frames) = start_server().await;
    let conn = WsConnection::new(url, Credentials::default(), fast_reconnect());

    conn.connect();
    wait_for_state(&conn, ConnectionState::Connected).await;

    frames.send("close".to_string()).unwrap();
    tokio::time::timeout(WAIT, async {
        while seen.accepted.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("client never came back");

    wait_for_state(&conn, ConnectionState::Connected).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(seen.accepted.load(Ordering::SeqCst), 2);
}
