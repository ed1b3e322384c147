use thiserror::Error;

/// Failures of the real-time channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed packet: {0}")]
    Packet(#[from] PacketError),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("connection closed")]
    Closed,
}

/// Engine.IO / Socket.IO wire decoding failures.
#[derive(Debug, Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,

    #[error("unknown engine.io packet type '{0}'")]
    UnknownEngineType(char),

    #[error("unknown socket.io packet type '{0}'")]
    UnknownSocketType(char),

    #[error("binary packets are not supported")]
    Binary,

    #[error("event packet without a name")]
    MissingEventName,

    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the multipart upload round trip.
///
/// An application-level rejection (`ok: false`) is not an error here, it
/// comes back as an [`crate::upload::UploadAck`].
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server responded with status {status}")]
    Status { status: u16 },

    #[error("invalid response body: {0}")]
    Body(#[from] serde_json::Error),
}
