use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

use super::packet::{EnginePacket, SocketPacket, SocketPacketKind, DEFAULT_NAMESPACE};
use super::{events, Listener, ListenerId, ListenerRegistry, Transport};
use crate::error::TransportError;

const CLOSE_GRACE: Duration = Duration::from_secs(1);

enum Outbound {
    Frame(String),
    Close,
}

/// Socket.IO over a single WebSocket, no long-polling. One background task
/// owns the socket.
pub struct SocketIoTransport {
    registry: Arc<ListenerRegistry>,
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SocketIoTransport {
    /// Start connecting to `server_url` in the background.
    ///
    /// Returns as soon as the URL is validated. Events emitted before the
    /// handshake completes are queued and flushed once the namespace is
    /// connected.
    pub fn spawn(server_url: &str) -> Result<Self, TransportError> {
        let url = websocket_url(server_url)?;
        let registry = Arc::new(ListenerRegistry::new());
        let closed = Arc::new(AtomicBool::new(false));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        info!(%url, "Connecting to backend");
        let task = tokio::spawn(run_connection(
            url,
            Arc::clone(&registry),
            outbound_rx,
            Arc::clone(&closed),
        ));

        Ok(Self {
            registry,
            outbound,
            closed,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Disconnect from the namespace and close the socket, waiting briefly
    /// for the close frames to be flushed.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.outbound.send(Outbound::Close);

        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                debug!("Connection task did not finish within close grace period");
            }
        }
    }
}

impl Drop for SocketIoTransport {
    fn drop(&mut self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl Transport for SocketIoTransport {
    fn on(&self, event: &str, listener: Listener) -> ListenerId {
        self.registry.add(event, listener)
    }

    fn off(&self, id: ListenerId) -> bool {
        self.registry.remove(id)
    }

    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let frame = EnginePacket::Message(SocketPacket::event(event, payload).encode()).encode();
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::Closed)
    }
}

/// Map the backend's HTTP base URL to its Socket.IO websocket endpoint.
pub fn websocket_url(server_url: &str) -> Result<String, TransportError> {
    let base = server_url.trim().trim_end_matches('/');

    let converted = if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(TransportError::InvalidUrl(server_url.to_string()));
    };

    let host = converted.split("://").nth(1).unwrap_or("");
    if host.is_empty() {
        return Err(TransportError::InvalidUrl(server_url.to_string()));
    }

    Ok(format!("{}/socket.io/?EIO=4&transport=websocket", converted))
}

async fn run_connection(
    url: String,
    registry: Arc<ListenerRegistry>,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    closed: Arc<AtomicBool>,
) {
    let mut connected = false;
    let result = drive(&url, &registry, &mut outbound_rx, &mut connected).await;
    closed.store(true, Ordering::SeqCst);

    match (result, connected) {
        (Ok(reason), _) => {
            info!(reason, "Disconnected from backend");
            registry.dispatch(events::DISCONNECT, Value::String(reason.to_string()));
        }
        (Err(e), true) => {
            warn!(error = %e, "Connection lost");
            registry.dispatch(events::DISCONNECT, Value::String(e.to_string()));
        }
        (Err(e), false) => {
            warn!(error = %e, "Could not connect to backend");
            registry.dispatch(events::CONNECT_ERROR, Value::String(e.to_string()));
        }
    }
}

/// Runs the connection until it ends. `Ok` carries the disconnect reason.
async fn drive(
    url: &str,
    registry: &ListenerRegistry,
    outbound_rx: &mut mpsc::UnboundedReceiver<Outbound>,
    connected: &mut bool,
) -> Result<&'static str, TransportError> {
    let (ws, _) = connect_async(url).await?;
    let (mut sink, mut stream) = ws.split();

    let open = loop {
        match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => match EnginePacket::decode(&text)? {
                EnginePacket::Open(open) => break open,
                other => {
                    return Err(TransportError::Handshake(format!(
                        "expected open packet, got {:?}",
                        other
                    )))
                }
            },
            Some(Ok(WsMessage::Close(_))) | None => return Err(TransportError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    };
    debug!(sid = %open.sid, ping_interval = open.ping_interval, "Engine.IO session opened");

    let heartbeat = Duration::from_millis(open.ping_interval + open.ping_timeout);
    let mut last_seen = Instant::now();
    let mut pending: Vec<String> = Vec::new();

    sink.send(WsMessage::Text(
        EnginePacket::Message(SocketPacket::connect().encode()).encode(),
    ))
    .await?;

    loop {
        tokio::select! {
            frame = stream.next() => {
                last_seen = Instant::now();
                let text = match frame {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | None => return Ok("transport close"),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                };

                let packet = match EnginePacket::decode(&text) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!(error = %e, "Dropping malformed engine.io packet");
                        continue;
                    }
                };

                match packet {
                    EnginePacket::Ping(data) => {
                        sink.send(WsMessage::Text(EnginePacket::Pong(data).encode())).await?;
                    }
                    EnginePacket::Close => return Ok("transport close"),
                    EnginePacket::Message(body) => {
                        let socket = match SocketPacket::decode(&body) {
                            Ok(socket) => socket,
                            Err(e) => {
                                warn!(error = %e, "Dropping malformed socket.io packet");
                                continue;
                            }
                        };
                        if socket.namespace != DEFAULT_NAMESPACE {
                            debug!(namespace = %socket.namespace, "Ignoring packet for other namespace");
                            continue;
                        }

                        match socket.kind {
                            SocketPacketKind::Connect => {
                                *connected = true;
                                for frame in pending.drain(..) {
                                    sink.send(WsMessage::Text(frame)).await?;
                                }
                                registry.dispatch(events::CONNECT, socket.data.unwrap_or(Value::Null));
                            }
                            SocketPacketKind::Disconnect => return Ok("io server disconnect"),
                            SocketPacketKind::ConnectError => {
                                let reason = socket
                                    .data
                                    .map(|d| d.to_string())
                                    .unwrap_or_else(|| "connection refused".to_string());
                                return Err(TransportError::Handshake(reason));
                            }
                            SocketPacketKind::Event => match socket.into_event() {
                                Ok((name, payload)) => {
                                    if registry.dispatch(&name, payload) == 0 {
                                        debug!(event = %name, "No listener for event");
                                    }
                                }
                                Err(e) => warn!(error = %e, "Dropping malformed event"),
                            },
                            SocketPacketKind::Ack => {}
                        }
                    }
                    EnginePacket::Open(_) | EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
                }
            }
            outbound = outbound_rx.recv() => match outbound {
                Some(Outbound::Frame(frame)) => {
                    if *connected {
                        sink.send(WsMessage::Text(frame)).await?;
                    } else {
                        pending.push(frame);
                    }
                }
                Some(Outbound::Close) | None => {
                    if *connected {
                        let disconnect = EnginePacket::Message(SocketPacket::disconnect().encode()).encode();
                        sink.send(WsMessage::Text(disconnect)).await?;
                    }
                    sink.send(WsMessage::Close(None)).await?;
                    return Ok("io client disconnect");
                }
            },
            _ = tokio::time::sleep_until(last_seen + heartbeat) => {
                return Ok("ping timeout");
            }
        }
    }
}
