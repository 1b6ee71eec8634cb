//! View state and its transitions.
//!
//! Everything the UI draws comes from [`ViewState`]; every mutation goes
//! through one of the methods below so the notification log stays in step
//! with the lists it describes.

use crate::config::EchoPolicy;
use crate::types::{ChannelEvent, ConnectionStatus, FileRecord, Notification, Origin, Tab};

/// What the renderer should show at the top level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Login,
    Workspace,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewState {
    pub chat_requests: Vec<String>,
    pub group_files: Vec<FileRecord>,
    pub authenticated: bool,
    pub notifications: Vec<Notification>,
    pub connection: ConnectionStatus,
    pub active_tab: Tab,
    pub errors: Vec<String>,
    /// Set once the current outage has been reported; cleared on reconnect.
    offline_reported: bool,
}

impl ViewState {
    /// State for a freshly mounted view. `channel_failure` is set when the
    /// realtime channel could not be opened at all.
    pub fn starting(errors: Vec<String>, channel_failure: Option<String>) -> Self {
        let offline_reported = channel_failure.is_some();
        let connection = match channel_failure {
            Some(reason) => ConnectionStatus::Disconnected(reason),
            None => ConnectionStatus::Connecting,
        };
        Self {
            connection,
            errors,
            offline_reported,
            ..Self::default()
        }
    }

    pub fn screen(&self) -> Screen {
        if self.authenticated {
            Screen::Workspace
        } else {
            Screen::Login
        }
    }

    /// There is no way back to the login screen once this has run.
    pub fn authenticate(&mut self) {
        if !self.authenticated {
            tracing::info!("user authenticated");
        }
        self.authenticated = true;
    }

    /// Replace the file list with what the store holds.
    pub fn load_files(&mut self, records: Vec<FileRecord>) {
        tracing::debug!(count = records.len(), "file list loaded");
        self.group_files = records;
    }

    /// Apply one channel event. Returns the record to write to the store,
    /// if the echo policy asks for one.
    pub fn apply(&mut self, event: ChannelEvent, echo: EchoPolicy) -> Option<FileRecord> {
        match event {
            ChannelEvent::NewFile(name) => {
                let record = FileRecord::new(name, Origin::Remote);
                self.notifications.push(Notification::remote_file(&record.name));
                self.group_files.push(record.clone());
                match echo {
                    EchoPolicy::Persist => Some(record),
                    EchoPolicy::Skip => None,
                }
            }
            ChannelEvent::NewChatRequest(user) => {
                self.notifications.push(Notification::remote_chat_request(&user));
                self.chat_requests.push(user);
                None
            }
            ChannelEvent::Status(status) => {
                match &status {
                    ConnectionStatus::Connected => self.offline_reported = false,
                    ConnectionStatus::Disconnected(reason) if !self.offline_reported => {
                        self.offline_reported = true;
                        self.report(format!("Realtime channel offline: {reason}"));
                    }
                    _ => {}
                }
                self.connection = status;
                None
            }
        }
    }

    /// Optimistically add a file this client is uploading.
    pub fn add_local_file(&mut self, name: &str) -> FileRecord {
        let record = FileRecord::new(name, Origin::Local);
        self.group_files.push(record.clone());
        self.notifications.push(Notification::local_file(name));
        record
    }

    pub fn add_local_chat_request(&mut self, user: &str) {
        self.chat_requests.push(user.to_string());
        self.notifications.push(Notification::local_chat_request(user));
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.active_tab = tab;
    }

    pub fn report(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn dismiss_error(&mut self, index: usize) {
        if index < self.errors.len() {
            self.errors.remove(index);
        }
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.group_files.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn notification_texts(&self) -> Vec<&str> {
        self.notifications.iter().map(|n| n.text.as_str()).collect()
    }
}
