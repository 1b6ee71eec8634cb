use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Where a file record entered this client from.
///
/// Only kept in memory; the store never sees it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Origin {
    /// Uploaded from this client.
    Local,
    /// Announced by another client over the channel.
    Remote,
    /// Loaded from the document store.
    #[default]
    Stored,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    #[serde(skip)]
    pub origin: Origin,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, origin: Origin) -> Self {
        Self {
            name: name.into(),
            origin,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub text: String,
    pub created_at: Option<OffsetDateTime>,
}

impl Notification {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            created_at: Some(OffsetDateTime::now_utc()),
        }
    }

    pub fn remote_file(name: &str) -> Self {
        Self::new(format!("New file uploaded: {name}"))
    }

    pub fn remote_chat_request(user: &str) -> Self {
        Self::new(format!("New chat request from {user}"))
    }

    pub fn local_file(name: &str) -> Self {
        Self::new(format!("You uploaded: {name}"))
    }

    pub fn local_chat_request(user: &str) -> Self {
        Self::new(format!("Chat request sent to {user}"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected(String),
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected(_) => "Offline",
        }
    }
}

/// Events the channel delivers to the view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    NewFile(String),
    NewChatRequest(String),
    Status(ConnectionStatus),
}

/// Events this client emits on the channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundEvent {
    UploadFile(String),
    SendChatRequest(String),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::UploadFile(_) => "uploadFile",
            OutboundEvent::SendChatRequest(_) => "sendChatRequest",
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            OutboundEvent::UploadFile(value) | OutboundEvent::SendChatRequest(value) => value,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Files,
    ChatRequests,
    Notifications,
}
