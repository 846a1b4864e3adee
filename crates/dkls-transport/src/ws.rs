//! The persistent WebSocket envelope channel (§4.2 "WebSocket").
//!
//! One [`RelayConnection`] is a single logical socket: a background task
//! owns the `tokio-tungstenite` stream and drives reconnect/heartbeat;
//! the foreground half exchanges [`dkls_types::envelope::Envelope`]
//! values with it over bounded channels, matching the single-task,
//! bounded-channel hand-off the whole workspace uses to avoid locks in
//! the core state machines (§5).

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;

use dkls_types::envelope::Envelope;
use dkls_types::party::BearerToken;

use crate::wire::{ping_frame_json, ControlFrameType, WireEnvelope, WireFrame};
use crate::{Result, TransportError};

/// Outbound envelopes buffer up to this many entries before `send`
/// fails with [`TransportError::Backpressure`] (§4.2).
pub const MAX_PENDING: usize = 1024;

/// Inbound envelope delivery buffer, between the socket task and the
/// caller's `recv` loop.
const INBOUND_BUFFER: usize = 1024;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const PONG_TIMEOUT: Duration = Duration::from_secs(30);
const BACKOFF_INITIAL: Duration = Duration::from_millis(200);
const BACKOFF_FACTOR: f64 = 1.5;
const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// A live, reconnecting WebSocket envelope channel.
pub struct RelayConnection {
    outbound_tx: mpsc::Sender<Envelope>,
    inbound_rx: Mutex<mpsc::Receiver<Envelope>>,
    shutdown_tx: mpsc::Sender<()>,
}

impl RelayConnection {
    /// Open the socket and start the background driver task.
    ///
    /// `group_id_hex` is included as a query parameter so a reconnect
    /// re-subscribes to the same group (§4.2 "on reconnect ... does not
    /// replay already-sent envelopes").
    pub async fn connect(
        ws_url: url::Url,
        token: BearerToken,
        group_id_hex: Option<String>,
    ) -> Result<Self> {
        let (outbound_tx, outbound_rx) = mpsc::channel(MAX_PENDING);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let socket_url = build_url(&ws_url, group_id_hex.as_deref());
        let stream = dial(&socket_url, &token).await?;

        tokio::spawn(driver_loop(
            socket_url,
            token,
            stream,
            outbound_rx,
            inbound_tx,
            shutdown_rx,
        ));

        Ok(Self {
            outbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            shutdown_tx,
        })
    }

    /// Enqueue an already-sealed envelope for transmission.
    ///
    /// Fails with [`TransportError::Backpressure`] once [`MAX_PENDING`]
    /// envelopes are outstanding; never blocks.
    pub fn send(&self, envelope: Envelope) -> Result<()> {
        self.outbound_tx
            .try_send(envelope)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TransportError::Backpressure,
                mpsc::error::TrySendError::Closed(_) => {
                    TransportError::Transport("connection task exited".into())
                }
            })
    }

    /// Await the next inbound envelope. Returns `None` once the
    /// connection is closed for good (shutdown requested).
    pub async fn recv(&self) -> Option<Envelope> {
        self.inbound_rx.lock().await.recv().await
    }

    /// Stop the background task and drop the socket.
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

fn build_url(base: &url::Url, group_id_hex: Option<&str>) -> url::Url {
    let mut url = base.clone();
    if let Some(gid) = group_id_hex {
        url.query_pairs_mut().append_pair("group_id", gid);
    }
    url
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn dial(url: &url::Url, token: &BearerToken) -> Result<WsStream> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::Transport(e.to_string()))?;
    let header_value = format!("Bearer {}", token.as_str())
        .parse()
        .map_err(|e: http::header::InvalidHeaderValue| TransportError::Transport(e.to_string()))?;
    request
        .headers_mut()
        .insert(http::header::AUTHORIZATION, header_value);

    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| TransportError::Transport(e.to_string()))?;
    Ok(stream)
}

/// The background task: owns the socket, forwards outbound envelopes,
/// dispatches inbound envelopes and heartbeat frames, and reconnects
/// with exponential backoff on failure.
async fn driver_loop(
    url: url::Url,
    token: BearerToken,
    mut stream: WsStream,
    mut outbound_rx: mpsc::Receiver<Envelope>,
    inbound_tx: mpsc::Sender<Envelope>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut backoff = BACKOFF_INITIAL;
    let mut last_pong = tokio::time::Instant::now();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                let _ = stream.close(None).await;
                return;
            }

            _ = heartbeat.tick() => {
                if last_pong.elapsed() > PONG_TIMEOUT {
                    tracing::warn!("relay heartbeat timed out, reconnecting");
                    match reconnect(&url, &token, &mut backoff, &mut shutdown_rx).await {
                        Some(new_stream) => {
                            stream = new_stream;
                            last_pong = tokio::time::Instant::now();
                        }
                        None => return,
                    }
                    continue;
                }
                if stream.send(Message::Text(ping_frame_json().into())).await.is_err() {
                    match reconnect(&url, &token, &mut backoff, &mut shutdown_rx).await {
                        Some(new_stream) => {
                            stream = new_stream;
                            last_pong = tokio::time::Instant::now();
                        }
                        None => return,
                    }
                }
            }

            outbound = outbound_rx.recv() => {
                let Some(envelope) = outbound else {
                    let _ = stream.close(None).await;
                    return;
                };
                let wire = WireEnvelope::from_envelope(&envelope);
                let Ok(json) = serde_json::to_string(&wire) else {
                    tracing::error!("failed to serialize outbound envelope");
                    continue;
                };
                if stream.send(Message::Text(json.into())).await.is_err() {
                    tracing::warn!("send failed, reconnecting");
                    match reconnect(&url, &token, &mut backoff, &mut shutdown_rx).await {
                        Some(new_stream) => {
                            stream = new_stream;
                            last_pong = tokio::time::Instant::now();
                        }
                        None => return,
                    }
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        backoff = BACKOFF_INITIAL;
                        match serde_json::from_str::<WireFrame>(&text) {
                            Ok(WireFrame::Control { r#type: ControlFrameType::Pong }) => {
                                last_pong = tokio::time::Instant::now();
                            }
                            Ok(WireFrame::Control { r#type: ControlFrameType::Ping }) => {
                                let _ = stream
                                    .send(Message::Text(crate::wire::pong_frame_json().into()))
                                    .await;
                            }
                            Ok(WireFrame::Envelope(wire)) => match wire.into_envelope() {
                                Ok(envelope) => {
                                    if inbound_tx.send(envelope).await.is_err() {
                                        return;
                                    }
                                }
                                Err(e) => tracing::warn!(error = %e, "dropping malformed envelope"),
                            },
                            Err(e) => tracing::warn!(error = %e, "dropping unparseable frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::warn!("relay closed connection, reconnecting");
                        match reconnect(&url, &token, &mut backoff, &mut shutdown_rx).await {
                            Some(new_stream) => {
                                stream = new_stream;
                                last_pong = tokio::time::Instant::now();
                            }
                            None => return,
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "relay read error, reconnecting");
                        match reconnect(&url, &token, &mut backoff, &mut shutdown_rx).await {
                            Some(new_stream) => {
                                stream = new_stream;
                                last_pong = tokio::time::Instant::now();
                            }
                            None => return,
                        }
                    }
                }
            }
        }
    }
}

/// Reconnect with exponential backoff (200 ms, ×1.5, cap 5 s), honoring
/// shutdown requests while waiting. Returns `None` if shutdown fires
/// first.
async fn reconnect(
    url: &url::Url,
    token: &BearerToken,
    backoff: &mut Duration,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Option<WsStream> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => return None,
            _ = tokio::time::sleep(*backoff) => {}
        }
        match dial(url, token).await {
            Ok(stream) => return Some(stream),
            Err(e) => {
                tracing::warn!(error = %e, backoff_ms = backoff.as_millis(), "reconnect attempt failed");
                *backoff = BACKOFF_CAP.min(backoff.mul_f64(BACKOFF_FACTOR));
            }
        }
    }
}
