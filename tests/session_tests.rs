//! Integration tests for the group session
//!
//! Drives a session over the loopback channel with in-process stores.

use async_trait::async_trait;
use groupshare::channel::{self, ChannelError, EventReceiver, LoopbackPeer};
use groupshare::config::{AppConfig, EchoPolicy, StoreBackend};
use groupshare::session::{Session, SessionError};
use groupshare::state::{Screen, ViewState};
use groupshare::store::{DocumentStore, MemoryStore, StoreError, StoreResult};
use groupshare::types::{ChannelEvent, FileRecord, OutboundEvent, Origin};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

fn test_config() -> AppConfig {
    AppConfig {
        store: StoreBackend::Memory,
        ..AppConfig::default()
    }
}

fn open_session(
    store: Arc<dyn DocumentStore>,
    config: AppConfig,
) -> (Session, EventReceiver, LoopbackPeer) {
    let (handle, events, peer) = channel::loopback();
    (Session::new(config, store, handle), events, peer)
}

/// Fails the first `failures` appends with the given status.
struct FlakyStore {
    failures: u32,
    status: u16,
    calls: AtomicU32,
    inner: MemoryStore,
}

impl FlakyStore {
    fn new(failures: u32, status: u16) -> Self {
        Self {
            failures,
            status,
            calls: AtomicU32::new(0),
            inner: MemoryStore::default(),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn fetch_all(&self, collection: &str) -> StoreResult<Vec<FileRecord>> {
        self.inner.fetch_all(collection).await
    }

    async fn append(&self, collection: &str, record: &FileRecord) -> StoreResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(StoreError::Status {
                status: self.status,
                body: "unavailable".into(),
            });
        }
        self.inner.append(collection, record).await
    }
}

mod bootstrap_tests {
    use super::*;

    #[tokio::test]
    async fn test_load_replaces_file_list() {
        let store = Arc::new(MemoryStore::with_files("files", ["week1.pdf", "slides.ppt"]));
        let (session, _events, _peer) = open_session(store, test_config());

        let mut state = ViewState::default();
        state.apply(ChannelEvent::NewFile("early.pdf".into()), EchoPolicy::Skip);

        let records = session.load().await.expect("load");
        state.load_files(records);

        assert_eq!(state.file_names(), vec!["week1.pdf", "slides.ppt"]);
        assert!(state.group_files.iter().all(|f| f.origin == Origin::Stored));
    }

    #[tokio::test]
    async fn test_load_uses_configured_collection() {
        let store = Arc::new(MemoryStore::with_files("handouts", ["a.pdf"]));
        let config = AppConfig {
            collection: "handouts".into(),
            ..test_config()
        };
        let (session, _events, _peer) = open_session(store, config);
        assert_eq!(session.load().await.unwrap().len(), 1);
    }
}

mod inbound_tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_events_reach_the_view() {
        let store = Arc::new(MemoryStore::default());
        let (session, mut events, peer) = open_session(store.clone(), test_config());
        let mut state = ViewState::default();

        peer.push(ChannelEvent::NewFile("syllabus.pdf".into())).unwrap();
        peer.push(ChannelEvent::NewChatRequest("Alice".into())).unwrap();

        for _ in 0..2 {
            let event = events.recv().await.expect("event");
            assert!(session.receive(&mut state, event).is_none());
        }

        assert_eq!(state.file_names(), vec!["syllabus.pdf"]);
        assert_eq!(state.chat_requests, vec!["Alice"]);
        assert_eq!(
            state.notification_texts(),
            vec!["New file uploaded: syllabus.pdf", "New chat request from Alice"]
        );
        // Default policy: remote announcements are not written again.
        assert_eq!(store.len("files"), 0);
    }

    #[tokio::test]
    async fn test_persist_policy_writes_remote_files_once() {
        let store = Arc::new(MemoryStore::default());
        let config = AppConfig {
            echo_policy: EchoPolicy::Persist,
            ..test_config()
        };
        let (session, _events, _peer) = open_session(store.clone(), config);
        let mut state = ViewState::default();

        let record = session
            .receive(&mut state, ChannelEvent::NewFile("lab.pdf".into()))
            .expect("record to persist");
        session.persist(&record).await.unwrap();

        assert_eq!(store.len("files"), 1);
    }

    #[tokio::test]
    async fn test_every_creation_adds_one_notification() {
        let (session, _events, _peer) = open_session(Arc::new(MemoryStore::default()), test_config());
        let mut state = ViewState::default();

        session.receive(&mut state, ChannelEvent::NewFile("a.pdf".into()));
        session.upload(&mut state, &["b.pptx".to_string()]).unwrap();
        session.receive(&mut state, ChannelEvent::NewChatRequest("Bea".into()));
        session.send_chat_request(&mut state).unwrap();
        session.receive(&mut state, ChannelEvent::Status(Default::default()));

        assert_eq!(
            state.notification_texts(),
            vec![
                "New file uploaded: a.pdf",
                "You uploaded: b.pptx",
                "New chat request from Bea",
                "Chat request sent to User123",
            ]
        );
    }
}

mod outbound_tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_is_optimistic() {
        let store = Arc::new(MemoryStore::default());
        let (session, _events, mut peer) = open_session(store.clone(), test_config());
        let mut state = ViewState::default();

        let upload = session
            .upload(&mut state, &["/home/sam/Downloads/notes.pptx".to_string()])
            .expect("accepted")
            .expect("selected");

        // Listed and announced before anything reaches the store.
        assert_eq!(state.file_names(), vec!["notes.pptx"]);
        assert_eq!(store.len("files"), 0);
        assert!(upload.emit_error.is_none());
        assert_eq!(
            peer.drain(),
            vec![OutboundEvent::UploadFile("notes.pptx".into())]
        );

        session.persist(&upload.record).await.unwrap();
        let stored = store.fetch_all("files").await.unwrap();
        assert_eq!(stored, vec![FileRecord::new("notes.pptx", Origin::Stored)]);
    }

    #[test]
    fn test_upload_ignores_empty_selection() {
        let (session, _events, mut peer) = open_session(Arc::new(MemoryStore::default()), test_config());
        let mut state = ViewState::default();

        assert!(session.upload(&mut state, &[]).unwrap().is_none());
        assert!(session.upload(&mut state, &["".to_string()]).unwrap().is_none());
        assert!(state.group_files.is_empty());
        assert!(peer.drain().is_empty());
    }

    #[test]
    fn test_upload_rejects_unaccepted_type() {
        let (session, _events, mut peer) = open_session(Arc::new(MemoryStore::default()), test_config());
        let mut state = ViewState::default();

        let err = session
            .upload(&mut state, &["setup.exe".to_string()])
            .unwrap_err();
        assert!(matches!(err, SessionError::Rejected { ref name, .. } if name == "setup.exe"));
        assert!(state.group_files.is_empty());
        assert!(state.notifications.is_empty());
        assert!(peer.drain().is_empty());
    }

    #[test]
    fn test_upload_uses_first_selected_file() {
        let (session, _events, _peer) = open_session(Arc::new(MemoryStore::default()), test_config());
        let mut state = ViewState::default();

        session
            .upload(&mut state, &["first.pdf".to_string(), "second.pdf".to_string()])
            .unwrap();
        assert_eq!(state.file_names(), vec!["first.pdf"]);
    }

    #[test]
    fn test_chat_request_goes_to_configured_target() {
        let config = AppConfig {
            chat_target: "Mentor".into(),
            ..test_config()
        };
        let (session, _events, mut peer) = open_session(Arc::new(MemoryStore::default()), config);
        let mut state = ViewState::default();

        session.send_chat_request(&mut state).unwrap();
        assert_eq!(state.chat_requests, vec!["Mentor"]);
        assert_eq!(
            peer.drain(),
            vec![OutboundEvent::SendChatRequest("Mentor".into())]
        );
    }

    #[test]
    fn test_authentication_gates_the_workspace() {
        let mut state = ViewState::default();
        assert_eq!(state.screen(), Screen::Login);
        state.authenticate();
        assert_eq!(state.screen(), Screen::Workspace);
    }
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_closed_session_surfaces_channel_errors() {
        let (session, _events, mut peer) = open_session(Arc::new(MemoryStore::default()), test_config());
        let mut state = ViewState::default();

        session.close();
        assert!(!session.is_open());

        let err = session.send_chat_request(&mut state).unwrap_err();
        assert!(matches!(err, SessionError::Channel(ChannelError::Closed)));
        // Still listed locally.
        assert_eq!(state.chat_requests, vec!["User123"]);

        let upload = session
            .upload(&mut state, &["late.pdf".to_string()])
            .unwrap()
            .unwrap();
        assert!(matches!(upload.emit_error, Some(ChannelError::Closed)));
        assert!(peer.drain().is_empty());
    }
}

mod persistence_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let store = Arc::new(FlakyStore::new(2, 503));
        let (session, _events, _peer) = open_session(store.clone(), test_config());

        let id = session
            .persist(&FileRecord::new("retry.pdf", Origin::Local))
            .await
            .expect("third attempt succeeds");
        assert_eq!(id, "mem-1");
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_is_returned() {
        let store = Arc::new(FlakyStore::new(10, 503));
        let (session, _events, _peer) = open_session(store.clone(), test_config());

        let err = session
            .persist(&FileRecord::new("never.pdf", Origin::Local))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 503, .. }));
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let store = Arc::new(FlakyStore::new(10, 403));
        let (session, _events, _peer) = open_session(store.clone(), test_config());

        assert!(
            session
                .persist(&FileRecord::new("denied.pdf", Origin::Local))
                .await
                .is_err()
        );
        assert_eq!(store.calls(), 1);
    }
}
