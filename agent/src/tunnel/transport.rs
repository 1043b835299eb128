//! WebSocket tunnel transport
//!
//! One WebSocket session multiplexes any number of TCP streams. Every binary
//! frame is `[stream id: u32 big-endian][payload]`. The first frame for an
//! unknown stream id opens a TCP connection to the local agent address; an
//! empty payload closes the stream in either direction.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use futures::{SinkExt, StreamExt};
use http::HeaderValue;
use secrecy::ExposeSecret;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::errors::AgentError;
use crate::tunnel::TunnelConfig;

pub const FINGERPRINT_HEADER: &str = "x-tunnel-fingerprint";
pub const REMOTE_HEADER: &str = "x-tunnel-remote";

const READ_BUFFER_SIZE: usize = 16 * 1024;
const STREAM_QUEUE_DEPTH: usize = 64;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Establishes tunnel sessions
#[async_trait]
pub trait TunnelTransport: Send + Sync {
    async fn connect(&self, config: &TunnelConfig) -> Result<TunnelSession, AgentError>;
}

/// Handle on a running tunnel session task
#[derive(Debug)]
pub struct TunnelSession {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TunnelSession {
    /// Spawn a session task; the task receives the shutdown receiver
    pub fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        Self {
            shutdown: Some(tx),
            handle: tokio::spawn(task(rx)),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn close(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if tokio::time::timeout(CLOSE_TIMEOUT, &mut self.handle)
            .await
            .is_err()
        {
            warn!("Tunnel session did not stop in time, aborting");
            self.handle.abort();
        }
    }
}

/// Tunnel transport over a WebSocket connection
#[derive(Debug, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

fn tunnel_url(server_addr: &str) -> String {
    if server_addr.starts_with("ws://") || server_addr.starts_with("wss://") {
        format!("{}/tunnel", server_addr.trim_end_matches('/'))
    } else {
        format!("ws://{}/tunnel", server_addr.trim_end_matches('/'))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, AgentError> {
    HeaderValue::from_str(value)
        .map_err(|e| AgentError::TunnelError(format!("invalid header value: {}", e)))
}

#[async_trait]
impl TunnelTransport for WsTransport {
    async fn connect(&self, config: &TunnelConfig) -> Result<TunnelSession, AgentError> {
        let url = tunnel_url(&config.server_addr);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| AgentError::TunnelError(format!("invalid tunnel address: {}", e)))?;

        let auth = STANDARD.encode(config.credentials.basic().expose_secret());
        let headers = request.headers_mut();
        headers.insert(
            http::header::AUTHORIZATION,
            header_value(&format!("Basic {}", auth))?,
        );
        let remote = format!("R:{}:{}", config.remote_port, config.local_addr);
        headers.insert(REMOTE_HEADER, header_value(&remote)?);
        if !config.server_fingerprint.is_empty() {
            headers.insert(FINGERPRINT_HEADER, header_value(&config.server_fingerprint)?);
        }

        debug!("Connecting tunnel: {}", url);
        let (ws_stream, response) = connect_async(request)
            .await
            .map_err(|e| AgentError::TunnelError(format!("failed to connect tunnel: {}", e)))?;

        verify_fingerprint(
            &config.server_fingerprint,
            response.headers().get(FINGERPRINT_HEADER),
        )?;

        info!("Tunnel connected to {}", config.server_addr);
        let local_addr = config.local_addr.clone();
        Ok(TunnelSession::spawn(move |shutdown| {
            run_session(ws_stream, local_addr, shutdown)
        }))
    }
}

/// A configured fingerprint must be echoed back unchanged by the server.
/// Without one configured, any server is accepted.
fn verify_fingerprint(expected: &str, echoed: Option<&HeaderValue>) -> Result<(), AgentError> {
    if expected.is_empty() {
        return Ok(());
    }
    match echoed {
        Some(echoed) if echoed.as_bytes() == expected.as_bytes() => Ok(()),
        Some(_) => Err(AgentError::TunnelError(
            "server fingerprint does not match the edge key".to_string(),
        )),
        None => Err(AgentError::TunnelError(
            "server did not present a fingerprint".to_string(),
        )),
    }
}

/// Encode one multiplexed frame
pub fn encode_frame(stream_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&stream_id.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Split a frame into stream id and payload
pub fn decode_frame(frame: &[u8]) -> Option<(u32, &[u8])> {
    if frame.len() < 4 {
        return None;
    }
    let (id, payload) = frame.split_at(4);
    let id = u32::from_be_bytes([id[0], id[1], id[2], id[3]]);
    Some((id, payload))
}

enum Outbound {
    Data(u32, Vec<u8>),
    Closed(u32),
}

async fn run_session(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    local_addr: String,
    mut shutdown: oneshot::Receiver<()>,
) {
    let (mut sink, mut stream) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(STREAM_QUEUE_DEPTH);
    let mut streams: HashMap<u32, mpsc::Sender<Vec<u8>>> = HashMap::new();
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Tunnel session shutting down");
                let _ = sink.close().await;
                break;
            }
            Some(outbound) = out_rx.recv() => {
                let frame = match outbound {
                    Outbound::Data(id, data) => encode_frame(id, &data),
                    Outbound::Closed(id) => {
                        streams.remove(&id);
                        encode_frame(id, &[])
                    }
                };
                if let Err(e) = sink.send(Message::Binary(frame.into())).await {
                    warn!("Failed to write tunnel frame: {}", e);
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        let Some((id, payload)) = decode_frame(&data) else {
                            warn!("Dropping short tunnel frame ({} bytes)", data.len());
                            continue;
                        };
                        if payload.is_empty() {
                            streams.remove(&id);
                            continue;
                        }
                        let payload = payload.to_vec();
                        let Some(tx) = streams.get(&id) else {
                            let (tx, rx) = mpsc::channel(STREAM_QUEUE_DEPTH);
                            let _ = tx.try_send(payload);
                            streams.insert(id, tx);
                            tasks.spawn(forward_stream(id, local_addr.clone(), rx, out_tx.clone()));
                            continue;
                        };
                        // Never wait on a single stream here
                        match tx.try_send(payload) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                warn!("Tunnel stream {} is not draining, closing it", id);
                                streams.remove(&id);
                                let frame = encode_frame(id, &[]);
                                if let Err(e) = sink.send(Message::Binary(frame.into())).await {
                                    warn!("Failed to write tunnel frame: {}", e);
                                    break;
                                }
                            }
                            Err(TrySendError::Closed(_)) => {
                                streams.remove(&id);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Tunnel closed by server");
                        break;
                    }
                    Some(Err(e)) => {
                        error!("Tunnel WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    tasks.abort_all();
}

async fn forward_stream(
    id: u32,
    local_addr: String,
    mut inbound: mpsc::Receiver<Vec<u8>>,
    outbound: mpsc::Sender<Outbound>,
) {
    let socket = match TcpStream::connect(&local_addr).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!("Tunnel stream {} could not reach {}: {}", id, local_addr, e);
            let _ = outbound.send(Outbound::Closed(id)).await;
            return;
        }
    };
    let (mut reader, mut writer) = socket.into_split();

    let write_half = async move {
        while let Some(data) = inbound.recv().await {
            if writer.write_all(&data).await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    };

    let read_outbound = outbound.clone();
    let read_half = async move {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if read_outbound
                        .send(Outbound::Data(id, buf[..n].to_vec()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
    };

    tokio::join!(write_half, read_half);
    let _ = outbound.send(Outbound::Closed(id)).await;
}
