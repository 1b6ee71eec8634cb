//! Realtime channel between this client and the group server.
//!
//! A [`ChannelHandle`] is owned by whoever opened it. Dropping or closing the
//! handle stops the transport task and closes the socket; events emitted
//! afterwards fail with [`ChannelError::Closed`].

pub mod codec;
#[cfg(not(target_arch = "wasm32"))]
mod socket;

use crate::config::ChannelConfig;
use crate::types::{ChannelEvent, OutboundEvent};
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use url::Url;

pub use codec::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,

    #[error("invalid channel endpoint {0}")]
    Endpoint(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connect timed out")]
    Timeout,

    #[error("connection lost: {0}")]
    Dropped(String),

    #[error("server refused connection: {0}")]
    Refused(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("realtime channel is not available on this platform")]
    Unsupported,
}

pub type ChannelResult<T> = Result<T, ChannelError>;

pub type EventReceiver = mpsc::UnboundedReceiver<ChannelEvent>;

pub struct ChannelHandle {
    outgoing: mpsc::UnboundedSender<OutboundEvent>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    closed: AtomicBool,
}

impl ChannelHandle {
    fn new(
        outgoing: mpsc::UnboundedSender<OutboundEvent>,
        shutdown: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            outgoing,
            shutdown: Mutex::new(shutdown),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue an event for the server. Events queued while the socket is
    /// still connecting go out once it is up.
    pub fn emit(&self, event: OutboundEvent) -> ChannelResult<()> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }
        tracing::debug!(event = event.name(), payload = event.payload(), "emit");
        self.outgoing.send(event).map_err(|_| ChannelError::Closed)
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.outgoing.is_closed()
    }

    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let sender = match self.shutdown.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tx) = sender {
            tracing::info!("closing realtime channel");
            let _ = tx.send(());
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open the realtime channel described by `config`.
///
/// Returns immediately; the connection is made by a background task which
/// reports progress as [`ChannelEvent::Status`] on the receiver. The task
/// reconnects after every failure until the handle is closed.
#[cfg(not(target_arch = "wasm32"))]
pub fn open(config: &ChannelConfig) -> ChannelResult<(ChannelHandle, EventReceiver)> {
    let endpoint = socket_endpoint(&config.url)?;
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(socket::run(
        endpoint,
        config.connect_timeout,
        outgoing_rx,
        events_tx,
        shutdown_rx,
    ));

    Ok((ChannelHandle::new(outgoing_tx, Some(shutdown_tx)), events_rx))
}

#[cfg(target_arch = "wasm32")]
pub fn open(_config: &ChannelConfig) -> ChannelResult<(ChannelHandle, EventReceiver)> {
    Err(ChannelError::Unsupported)
}

/// The far end of a [`loopback`] channel.
pub struct LoopbackPeer {
    events: mpsc::UnboundedSender<ChannelEvent>,
    emitted: mpsc::UnboundedReceiver<OutboundEvent>,
}

impl LoopbackPeer {
    /// Deliver an event to the client side.
    pub fn push(&self, event: ChannelEvent) -> ChannelResult<()> {
        self.events.send(event).map_err(|_| ChannelError::Closed)
    }

    /// Events the client has emitted so far.
    pub fn drain(&mut self) -> Vec<OutboundEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.emitted.try_recv() {
            out.push(event);
        }
        out
    }
}

/// In-process channel with no server behind it.
pub fn loopback() -> (ChannelHandle, EventReceiver, LoopbackPeer) {
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let handle = ChannelHandle::new(outgoing_tx, None);
    let peer = LoopbackPeer {
        events: events_tx,
        emitted: outgoing_rx,
    };
    (handle, events_rx, peer)
}

/// Map a Socket.IO event onto a [`ChannelEvent`]. Events this client does
/// not handle, or whose first argument is not a string, yield `None`.
pub fn inbound_event(name: &str, args: &[Value]) -> Option<ChannelEvent> {
    let arg = args.first()?.as_str()?.to_string();
    match name {
        "newFile" => Some(ChannelEvent::NewFile(arg)),
        "newChatRequest" => Some(ChannelEvent::NewChatRequest(arg)),
        _ => None,
    }
}

/// Turn a server address such as `http://localhost:5000` into the
/// Socket.IO WebSocket endpoint.
pub fn socket_endpoint(raw: &str) -> ChannelResult<Url> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let mut url = Url::parse(&with_scheme).map_err(|e| ChannelError::Endpoint(format!("{raw}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ChannelError::Endpoint(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| ChannelError::Endpoint(raw.to_string()))?;

    if url.path() == "/" || url.path().is_empty() {
        url.set_path("/socket.io/");
    }
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_endpoint() {
        let url = socket_endpoint("http://localhost:5000").unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );

        let url = socket_endpoint("https://chat.example.org").unwrap();
        assert_eq!(url.scheme(), "wss");

        let url = socket_endpoint("127.0.0.1:5000").unwrap();
        assert_eq!(url.host_str(), Some("127.0.0.1"));

        assert!(socket_endpoint("ftp://example.org").is_err());
    }

    #[test]
    fn test_loopback_emit_and_close() {
        let (handle, _events, mut peer) = loopback();
        handle
            .emit(OutboundEvent::SendChatRequest("User123".into()))
            .unwrap();
        assert_eq!(
            peer.drain(),
            vec![OutboundEvent::SendChatRequest("User123".into())]
        );

        handle.close();
        assert!(!handle.is_open());
        assert!(matches!(
            handle.emit(OutboundEvent::UploadFile("late.pdf".into())),
            Err(ChannelError::Closed)
        ));
        assert!(peer.drain().is_empty());
    }

    #[test]
    fn test_inbound_event_mapping() {
        use serde_json::json;

        assert_eq!(
            inbound_event("newFile", &[json!("syllabus.pdf")]),
            Some(ChannelEvent::NewFile("syllabus.pdf".into()))
        );
        assert_eq!(
            inbound_event("newChatRequest", &[json!("Alice"), json!({"extra": true})]),
            Some(ChannelEvent::NewChatRequest("Alice".into()))
        );
        assert_eq!(inbound_event("newFile", &[json!(42)]), None);
        assert_eq!(inbound_event("newFile", &[]), None);
        assert_eq!(inbound_event("typing", &[json!("Bob")]), None);
    }

    #[test]
    fn test_loopback_delivers_events() {
        let (_handle, mut events, peer) = loopback();
        peer.push(ChannelEvent::NewFile("syllabus.pdf".into())).unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            ChannelEvent::NewFile("syllabus.pdf".into())
        );
    }
}
