use std::sync::{Arc, Mutex};
use std::time::Duration;

use edge_agent::edge::credentials::TunnelCredentials;
use edge_agent::tunnel::client::ReverseTunnelClient;
use edge_agent::tunnel::transport::{
    decode_frame, encode_frame, TunnelTransport, WsTransport, FINGERPRINT_HEADER, REMOTE_HEADER,
};
use edge_agent::tunnel::{TunnelClient, TunnelConfig};
use futures::{SinkExt, StreamExt};
use secrecy::SecretString;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::Message;

#[derive(Debug, Default, Clone)]
struct Handshake {
    path: String,
    authorization: Option<String>,
    remote: Option<String>,
    fingerprint: Option<String>,
}

/// Local service the tunnel forwards to; echoes everything back
async fn spawn_echo_service() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

/// Tunnel server accepting one session. It records the handshake, echoes
/// `fingerprint` back if given, pushes one frame and returns the frame it
/// gets back.
async fn spawn_tunnel_server(
    fingerprint: Option<&'static str>,
) -> (
    String,
    Arc<Mutex<Handshake>>,
    tokio::task::JoinHandle<Option<Vec<u8>>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handshake = Arc::new(Mutex::new(Handshake::default()));
    let recorded = handshake.clone();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.ok()?;
        let callback = |request: &Request, mut response: Response| {
            let header = |name: &str| {
                request
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            *recorded.lock().unwrap() = Handshake {
                path: request.uri().path().to_string(),
                authorization: header("authorization"),
                remote: header(REMOTE_HEADER),
                fingerprint: header(FINGERPRINT_HEADER),
            };
            if let Some(fingerprint) = fingerprint {
                response
                    .headers_mut()
                    .insert(FINGERPRINT_HEADER, fingerprint.parse().unwrap());
            }
            Ok::<_, ErrorResponse>(response)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(socket, callback)
            .await
            .ok()?;

        ws.send(Message::Binary(encode_frame(1, b"hello").into()))
            .await
            .ok()?;
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Binary(data) = message {
                return Some(data.to_vec());
            }
        }
        None
    });

    (addr, handshake, handle)
}

fn config(server_addr: String, local_addr: String, fingerprint: &str) -> TunnelConfig {
    TunnelConfig {
        local_addr,
        server_addr,
        server_fingerprint: fingerprint.to_string(),
        credentials: TunnelCredentials {
            username: "agent".to_string(),
            password: SecretString::from("s3cret".to_string()),
        },
        remote_port: 4100,
    }
}

#[tokio::test]
async fn test_frames_are_forwarded_to_local_service() {
    let local = spawn_echo_service().await;
    let (server, handshake, handle) = spawn_tunnel_server(Some("aa:bb")).await;

    let session = WsTransport::new()
        .connect(&config(server, local.clone(), "aa:bb"))
        .await
        .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let (id, payload) = decode_frame(&frame).unwrap();
    assert_eq!(id, 1);
    assert_eq!(payload, b"hello");

    let handshake = handshake.lock().unwrap().clone();
    assert_eq!(handshake.path, "/tunnel");
    assert_eq!(handshake.authorization.as_deref(), Some("Basic YWdlbnQ6czNjcmV0"));
    assert_eq!(handshake.remote, Some(format!("R:4100:{}", local)));
    assert_eq!(handshake.fingerprint.as_deref(), Some("aa:bb"));

    session.close().await;
}

#[tokio::test]
async fn test_mismatched_fingerprint_is_refused() {
    let local = spawn_echo_service().await;
    let (server, _, _) = spawn_tunnel_server(Some("ff:ff")).await;

    let result = WsTransport::new()
        .connect(&config(server, local, "aa:bb"))
        .await;
    tokio_test::assert_err!(result);
}

#[tokio::test]
async fn test_missing_fingerprint_echo_is_refused() {
    let local = spawn_echo_service().await;
    let (server, _, _) = spawn_tunnel_server(None).await;

    let result = WsTransport::new()
        .connect(&config(server, local, "aa:bb"))
        .await;
    tokio_test::assert_err!(result);
}

/// Local service whose connections echo when they start with "ping" and
/// otherwise stop reading
async fn spawn_stalling_service() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut greeting = [0u8; 4];
                if socket.read_exact(&mut greeting).await.is_err() {
                    return;
                }
                if &greeting == b"ping" {
                    let _ = socket.write_all(&greeting).await;
                }
                std::future::pending::<()>().await;
            });
        }
    });
    addr
}

#[tokio::test]
async fn test_stalled_stream_does_not_block_others() {
    let local = spawn_stalling_service().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = listener.local_addr().unwrap().to_string();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.ok()?;
        let mut ws = tokio_tungstenite::accept_async(socket).await.ok()?;

        // Far more than the local socket buffers take for stream 1
        ws.send(Message::Binary(encode_frame(1, b"hold").into())).await.ok()?;
        let chunk = vec![0u8; 64 * 1024];
        for _ in 0..400 {
            ws.send(Message::Binary(encode_frame(1, &chunk).into())).await.ok()?;
        }
        ws.send(Message::Binary(encode_frame(2, b"ping").into())).await.ok()?;

        while let Some(Ok(message)) = ws.next().await {
            if let Message::Binary(data) = message {
                if let Some((2, payload)) = decode_frame(&data) {
                    if !payload.is_empty() {
                        return Some(payload.to_vec());
                    }
                }
            }
        }
        None
    });

    let session = WsTransport::new()
        .connect(&config(server, local, ""))
        .await
        .unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.as_deref(), Some(&b"ping"[..]));

    session.close().await;
}

#[tokio::test]
async fn test_client_opens_and_closes_tunnel() {
    let local = spawn_echo_service().await;
    let (server, _, _) = spawn_tunnel_server(Some("aa:bb")).await;
    let client = ReverseTunnelClient::new(Box::new(WsTransport::new()));

    tokio_test::assert_ok!(client.create_tunnel(config(server, local, "aa:bb")).await);
    assert!(client.is_tunnel_open());

    tokio_test::assert_ok!(client.close_tunnel().await);
    assert!(!client.is_tunnel_open());
}

#[tokio::test]
async fn test_unreachable_server_leaves_tunnel_closed() {
    let local = spawn_echo_service().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = listener.local_addr().unwrap().to_string();
    drop(listener);

    let client = ReverseTunnelClient::new(Box::new(WsTransport::new()));
    assert!(client
        .create_tunnel(config(server, local, ""))
        .await
        .is_err());
    assert!(!client.is_tunnel_open());
}
