use serde::Deserialize;
use serde_json::Value;

use crate::error::PacketError;

pub const DEFAULT_NAMESPACE: &str = "/";

/// Payload of the Engine.IO `open` packet sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// One Engine.IO packet, carried by a single WebSocket text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self, PacketError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let body = chars.as_str();

        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(body)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_string())),
            '3' => Ok(EnginePacket::Pong(body.to_string())),
            '4' => Ok(EnginePacket::Message(body.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            'b' => Err(PacketError::Binary),
            other => Err(PacketError::UnknownEngineType(other)),
        }
    }

    /// Encode for the client side of the connection. The client never sends
    /// `open`, so that variant only carries its type digit.
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
}

impl SocketPacketKind {
    fn digit(self) -> char {
        match self {
            SocketPacketKind::Connect => '0',
            SocketPacketKind::Disconnect => '1',
            SocketPacketKind::Event => '2',
            SocketPacketKind::Ack => '3',
            SocketPacketKind::ConnectError => '4',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: SocketPacketKind,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    pub fn connect() -> Self {
        Self {
            kind: SocketPacketKind::Connect,
            namespace: DEFAULT_NAMESPACE.to_string(),
            ack_id: None,
            data: None,
        }
    }

    pub fn disconnect() -> Self {
        Self {
            kind: SocketPacketKind::Disconnect,
            namespace: DEFAULT_NAMESPACE.to_string(),
            ack_id: None,
            data: None,
        }
    }

    pub fn event(name: &str, payload: Value) -> Self {
        Self {
            kind: SocketPacketKind::Event,
            namespace: DEFAULT_NAMESPACE.to_string(),
            ack_id: None,
            data: Some(Value::Array(vec![Value::String(name.to_string()), payload])),
        }
    }

    pub fn decode(text: &str) -> Result<Self, PacketError> {
        let mut chars = text.chars();
        let kind = match chars.next().ok_or(PacketError::Empty)? {
            '0' => SocketPacketKind::Connect,
            '1' => SocketPacketKind::Disconnect,
            '2' => SocketPacketKind::Event,
            '3' => SocketPacketKind::Ack,
            '4' => SocketPacketKind::ConnectError,
            '5' | '6' => return Err(PacketError::Binary),
            other => return Err(PacketError::UnknownSocketType(other)),
        };
        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(comma) => {
                    let ns = rest[..comma].to_string();
                    rest = &rest[comma + 1..];
                    ns
                }
                None => {
                    let ns = rest.to_string();
                    rest = "";
                    ns
                }
            }
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits].parse().ok();
            rest = &rest[digits..];
            id
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        Ok(Self {
            kind,
            namespace,
            ack_id,
            data,
        })
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());
        if self.namespace != DEFAULT_NAMESPACE {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Split an event packet into its name and first argument.
    pub fn into_event(self) -> Result<(String, Value), PacketError> {
        let Some(Value::Array(mut args)) = self.data else {
            return Err(PacketError::MissingEventName);
        };
        if args.is_empty() {
            return Err(PacketError::MissingEventName);
        }
        let name = match args.remove(0) {
            Value::String(name) => name,
            _ => return Err(PacketError::MissingEventName),
        };
        let payload = if args.is_empty() {
            Value::Null
        } else {
            args.remove(0)
        };
        Ok((name, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open_handshake() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingTimeout":20000,"pingInterval":25000,"maxPayload":1000000}"#,
        )
        .unwrap();

        match packet {
            EnginePacket::Open(open) => {
                assert_eq!(open.sid, "lv_VI97HAXpY6yYWAAAC");
                assert_eq!(open.ping_interval, 25000);
                assert_eq!(open.ping_timeout, 20000);
                assert_eq!(open.max_payload, Some(1_000_000));
            }
            other => panic!("expected open, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_bot_response_event() {
        let engine = EnginePacket::decode(r#"42["bot_response",{"text":"**Hi**"}]"#).unwrap();
        let EnginePacket::Message(body) = engine else {
            panic!("expected message packet");
        };

        let socket = SocketPacket::decode(&body).unwrap();
        assert_eq!(socket.kind, SocketPacketKind::Event);
        assert_eq!(socket.namespace, "/");

        let (name, payload) = socket.into_event().unwrap();
        assert_eq!(name, "bot_response");
        assert_eq!(payload, json!({"text": "**Hi**"}));
    }

    #[test]
    fn test_decode_namespace_and_ack_id() {
        let socket = SocketPacket::decode(r#"2/admin,17["ping",1]"#).unwrap();
        assert_eq!(socket.namespace, "/admin");
        assert_eq!(socket.ack_id, Some(17));
        assert_eq!(socket.data, Some(json!(["ping", 1])));
    }

    #[test]
    fn test_decode_connect_confirmation() {
        let socket = SocketPacket::decode(r#"0{"sid":"abc"}"#).unwrap();
        assert_eq!(socket.kind, SocketPacketKind::Connect);
        assert_eq!(socket.data, Some(json!({"sid": "abc"})));

        let bare = SocketPacket::decode("1").unwrap();
        assert_eq!(bare.kind, SocketPacketKind::Disconnect);
        assert!(bare.data.is_none());
    }

    #[test]
    fn test_event_without_argument_yields_null() {
        let socket = SocketPacket::decode(r#"2["error"]"#).unwrap();
        let (name, payload) = socket.into_event().unwrap();
        assert_eq!(name, "error");
        assert_eq!(payload, Value::Null);
    }

    #[test]
    fn test_event_without_name_is_rejected() {
        let socket = SocketPacket::decode("2[42]").unwrap();
        assert!(matches!(socket.into_event(), Err(PacketError::MissingEventName)));
    }

    #[test]
    fn test_binary_packets_are_rejected() {
        assert!(matches!(SocketPacket::decode("51-[\"f\",{}]"), Err(PacketError::Binary)));
        assert!(matches!(EnginePacket::decode("bAQID"), Err(PacketError::Binary)));
    }

    #[test]
    fn test_encode_user_message() {
        let packet = SocketPacket::event("user_message", json!({"message": "fix my loop"}));
        let frame = EnginePacket::Message(packet.encode()).encode();
        assert_eq!(frame, r#"42["user_message",{"message":"fix my loop"}]"#);
    }

    #[test]
    fn test_encode_connect_and_pong() {
        assert_eq!(EnginePacket::Message(SocketPacket::connect().encode()).encode(), "40");
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
    }
}
