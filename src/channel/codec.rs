//! Engine.IO v4 / Socket.IO v4 text packet codec.
//!
//! Only text framing over the WebSocket transport is handled; binary
//! attachments are rejected.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CodecError {
    #[error("empty packet")]
    Empty,

    #[error("unknown engine packet type {0:?}")]
    UnknownEngineType(char),

    #[error("unknown socket packet type {0:?}")]
    UnknownSocketType(char),

    #[error("binary packets are not supported")]
    Binary,

    #[error("malformed payload: {0}")]
    Malformed(String),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Contents of the Engine.IO `open` packet.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

impl SocketPacket {
    /// Connect to the default namespace.
    pub fn connect() -> Self {
        SocketPacket::Connect {
            namespace: "/".to_string(),
            data: None,
        }
    }

    /// Event on the default namespace with one string argument.
    pub fn event(name: &str, arg: &str) -> Self {
        SocketPacket::Event {
            namespace: "/".to_string(),
            id: None,
            name: name.to_string(),
            args: vec![Value::String(arg.to_string())],
        }
    }
}

pub fn encode(packet: &EnginePacket) -> String {
    match packet {
        EnginePacket::Open(_) => "0".to_string(),
        EnginePacket::Close => "1".to_string(),
        EnginePacket::Ping(data) => format!("2{data}"),
        EnginePacket::Pong(data) => format!("3{data}"),
        EnginePacket::Message(socket) => format!("4{}", encode_socket(socket)),
        EnginePacket::Upgrade => "5".to_string(),
        EnginePacket::Noop => "6".to_string(),
    }
}

fn encode_socket(packet: &SocketPacket) -> String {
    let (kind, namespace) = match packet {
        SocketPacket::Connect { namespace, .. } => ('0', namespace),
        SocketPacket::Disconnect { namespace } => ('1', namespace),
        SocketPacket::Event { namespace, .. } => ('2', namespace),
        SocketPacket::Ack { namespace, .. } => ('3', namespace),
        SocketPacket::ConnectError { namespace, .. } => ('4', namespace),
    };

    let mut out = String::new();
    out.push(kind);
    if namespace != "/" && !namespace.is_empty() {
        out.push_str(namespace);
        out.push(',');
    }

    match packet {
        SocketPacket::Connect { data, .. } | SocketPacket::ConnectError { data, .. } => {
            if let Some(data) = data {
                out.push_str(&data.to_string());
            }
        }
        SocketPacket::Disconnect { .. } => {}
        SocketPacket::Event { id, name, args, .. } => {
            if let Some(id) = id {
                out.push_str(&id.to_string());
            }
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(Value::String(name.clone()));
            items.extend(args.iter().cloned());
            out.push_str(&Value::Array(items).to_string());
        }
        SocketPacket::Ack { id, args, .. } => {
            out.push_str(&id.to_string());
            out.push_str(&Value::Array(args.clone()).to_string());
        }
    }
    out
}

pub fn decode(frame: &str) -> CodecResult<EnginePacket> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|e| CodecError::Malformed(format!("open packet: {e}"))),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(rest.to_string())),
        '3' => Ok(EnginePacket::Pong(rest.to_string())),
        '4' => decode_socket(rest).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(CodecError::UnknownEngineType(other)),
    }
}

fn decode_socket(body: &str) -> CodecResult<SocketPacket> {
    let mut chars = body.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let mut rest = chars.as_str();

    if matches!(kind, '5' | '6') {
        return Err(CodecError::Binary);
    }
    if !matches!(kind, '0'..='4') {
        return Err(CodecError::UnknownSocketType(kind));
    }

    let namespace = if rest.starts_with('/') {
        match rest.split_once(',') {
            Some((ns, tail)) => {
                rest = tail;
                ns.to_string()
            }
            None => {
                let ns = rest.to_string();
                rest = "";
                ns
            }
        }
    } else {
        "/".to_string()
    };

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let id = if digits > 0 {
        let (raw, tail) = rest.split_at(digits);
        rest = tail;
        Some(
            raw.parse::<u64>()
                .map_err(|e| CodecError::Malformed(format!("ack id: {e}")))?,
        )
    } else {
        None
    };

    let payload = if rest.is_empty() {
        None
    } else {
        Some(
            serde_json::from_str::<Value>(rest)
                .map_err(|e| CodecError::Malformed(format!("payload: {e}")))?,
        )
    };

    match kind {
        '0' => Ok(SocketPacket::Connect {
            namespace,
            data: payload,
        }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let mut items = match payload {
                Some(Value::Array(items)) => items.into_iter(),
                _ => return Err(CodecError::Malformed("event payload must be an array".into())),
            };
            let name = match items.next() {
                Some(Value::String(name)) => name,
                _ => return Err(CodecError::Malformed("event name must be a string".into())),
            };
            Ok(SocketPacket::Event {
                namespace,
                id,
                name,
                args: items.collect(),
            })
        }
        '3' => {
            let id = id.ok_or_else(|| CodecError::Malformed("ack without id".into()))?;
            let args = match payload {
                Some(Value::Array(items)) => items,
                None => Vec::new(),
                Some(_) => return Err(CodecError::Malformed("ack payload must be an array".into())),
            };
            Ok(SocketPacket::Ack {
                namespace,
                id,
                args,
            })
        }
        _ => Ok(SocketPacket::ConnectError {
            namespace,
            data: payload,
        }),
    }
}
