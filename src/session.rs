use crate::channel::{ChannelError, ChannelHandle};
use crate::config::AppConfig;
use crate::state::ViewState;
use crate::store::{DocumentStore, RetryPolicy, StoreError, StoreResult, append_with_retry};
use crate::types::{ChannelEvent, FileRecord, OutboundEvent};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{name} is not an accepted file type (accepted: {accepted})")]
    Rejected { name: String, accepted: String },

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A file added to the view by [`Session::upload`], waiting to be stored.
#[derive(Debug)]
pub struct Upload {
    pub record: FileRecord,
    /// Set when the channel would not take the `uploadFile` event.
    pub emit_error: Option<ChannelError>,
}

/// One view's connection to the group: its channel and its store.
///
/// The session never owns the [`ViewState`]; callers pass it in so the UI
/// can keep it in a signal.
pub struct Session {
    config: AppConfig,
    store: Arc<dyn DocumentStore>,
    channel: ChannelHandle,
}

impl Session {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>, channel: ChannelHandle) -> Self {
        Self {
            config,
            store,
            channel,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    /// Read the whole file collection.
    pub async fn load(&self) -> StoreResult<Vec<FileRecord>> {
        self.store.fetch_all(&self.config.collection).await
    }

    /// Mirror a channel event into the view. A returned record still has to
    /// go through [`Session::persist`].
    pub fn receive(&self, state: &mut ViewState, event: ChannelEvent) -> Option<FileRecord> {
        state.apply(event, self.config.echo_policy)
    }

    /// Add the first selected file to the view and announce it.
    ///
    /// The view is updated before the channel or the store is touched.
    /// Returns `Ok(None)` when nothing usable was selected.
    pub fn upload(&self, state: &mut ViewState, selected: &[String]) -> SessionResult<Option<Upload>> {
        let Some(name) = selected.first().map(|path| display_file_name(path)) else {
            return Ok(None);
        };
        if name.trim().is_empty() {
            return Ok(None);
        }
        if !self.config.accepts(&name) {
            return Err(SessionError::Rejected {
                name,
                accepted: self.config.accept_attribute(),
            });
        }

        let record = state.add_local_file(&name);
        let emit_error = self.channel.emit(OutboundEvent::UploadFile(name)).err();
        if let Some(err) = &emit_error {
            tracing::warn!(name = %record.name, error = %err, "upload not announced");
        }
        Ok(Some(Upload { record, emit_error }))
    }

    /// Write a record to the store, retrying transient failures.
    pub async fn persist(&self, record: &FileRecord) -> StoreResult<String> {
        append_with_retry(
            self.store.as_ref(),
            &self.config.collection,
            record,
            RetryPolicy::new(self.config.write_attempts),
        )
        .await
    }

    /// Record a chat request to the configured target and send it.
    /// The request is listed even if the channel refuses it.
    pub fn send_chat_request(&self, state: &mut ViewState) -> SessionResult<()> {
        let target = self.config.chat_target.clone();
        state.add_local_chat_request(&target);
        self.channel
            .emit(OutboundEvent::SendChatRequest(target))
            .map_err(SessionError::from)
    }

    pub fn close(&self) {
        self.channel.close();
    }
}

/// Last path component of a selected file, which is all that is shared.
pub fn display_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_file_name() {
        assert_eq!(display_file_name("/home/ana/Downloads/notes.pptx"), "notes.pptx");
        assert_eq!(display_file_name("syllabus.pdf"), "syllabus.pdf");
    }
}
