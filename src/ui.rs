use crate::channel::{self, EventReceiver};
use crate::config::AppConfig;
use crate::session::Session;
use crate::state::{Screen, ViewState};
use crate::store;
use crate::types::{ConnectionStatus, FileRecord, Tab};
use crate::views::{ChatRequestsView, FilesView, LoginView, NotificationsView};
use dioxus::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

const APP_CSS: Asset = asset!("/assets/groupshare.css");

/// Everything the root component builds once per mount.
struct Boot {
    session: Rc<Session>,
    events: RefCell<Option<EventReceiver>>,
    errors: Vec<String>,
    /// Why the realtime channel could not be opened, if it could not.
    channel_failure: Option<String>,
}

fn boot() -> Boot {
    let mut errors = Vec::new();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration, using defaults");
            errors.push(format!("Configuration error: {err}"));
            AppConfig::default()
        }
    };

    let store = store::from_config(&config);
    let mut channel_failure = None;
    let (handle, events) = match channel::open(&config.channel) {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(error = %err, "realtime channel could not be opened");
            errors.push(format!("Realtime channel unavailable: {err}"));
            channel_failure = Some(err.to_string());
            // Nothing on the far side: emits fail with `Closed` and no events arrive.
            let (handle, events, _peer) = channel::loopback();
            (handle, events)
        }
    };

    Boot {
        session: Rc::new(Session::new(config, store, handle)),
        events: RefCell::new(Some(events)),
        errors,
        channel_failure,
    }
}

#[component]
pub fn App() -> Element {
    let boot = use_hook(|| Rc::new(boot()));
    let session = use_context_provider(|| boot.session.clone());
    let state = use_signal(|| {
        ViewState::starting(boot.errors.clone(), boot.channel_failure.clone())
    });

    use_channel_events(&boot, state);
    use_initial_load(session.clone(), state);

    use_drop(move || {
        session.close();
    });

    let screen = state.read().screen();
    rsx! {
        document::Link { rel: "stylesheet", href: APP_CSS }
        div { class: "app",
            ErrorBanner { state }
            if screen == Screen::Login {
                LoginView { state }
            } else {
                Workspace { state }
            }
        }
    }
}

/// Feed channel events into the view for as long as the component lives.
fn use_channel_events(boot: &Rc<Boot>, mut state: Signal<ViewState>) {
    let boot = boot.clone();
    use_hook(move || {
        let Some(mut events) = boot.events.borrow_mut().take() else {
            return;
        };
        let session = boot.session.clone();
        spawn(async move {
            while let Some(event) = events.recv().await {
                let pending = session.receive(&mut state.write(), event);
                if let Some(record) = pending {
                    spawn(persist_record(session.clone(), record, state));
                }
            }
            tracing::debug!("channel event stream ended");
        });
    });
}

fn use_initial_load(session: Rc<Session>, mut state: Signal<ViewState>) {
    use_future(move || {
        let session = session.clone();
        async move {
            match session.load().await {
                Ok(records) => state.write().load_files(records),
                Err(err) => {
                    tracing::error!(error = %err, "failed to load shared files");
                    state.write().report(format!("Could not load shared files: {err}"));
                }
            }
        }
    });
}

/// Store a file record and surface the outcome.
pub(crate) async fn persist_record(
    session: Rc<Session>,
    record: FileRecord,
    mut state: Signal<ViewState>,
) {
    if let Err(err) = session.persist(&record).await {
        state
            .write()
            .report(format!("Could not save {}: {err}", record.name));
    }
}

#[component]
fn Workspace(state: Signal<ViewState>) -> Element {
    rsx! {
        div { class: "header no-divider",
            div { class: "header-content",
                h1 { class: "header-title", "Study Group" }
                TabNavigation { state }
                ConnectionPill { state }
            }
        }
        TabPanels { state }
    }
}

#[component]
fn TabPanels(state: Signal<ViewState>) -> Element {
    rsx! {
        div { class: "tab-panels",
            TabPanel {
                state,
                tab: Tab::Files,
                children: rsx!( FilesView { state } ),
            }
            TabPanel {
                state,
                tab: Tab::ChatRequests,
                children: rsx!( ChatRequestsView { state } ),
            }
            TabPanel {
                state,
                tab: Tab::Notifications,
                children: rsx!( NotificationsView { state } ),
            }
        }
    }
}

#[component]
fn TabPanel(state: Signal<ViewState>, tab: Tab, children: Element) -> Element {
    let is_active = state.read().active_tab == tab;
    let class_suffix = if is_active { "active" } else { "" };
    rsx! {
        div {
            class: format_args!("tab-panel {}", class_suffix),
            aria_hidden: (!is_active).to_string(),
            {children}
        }
    }
}

#[component]
fn TabNavigation(state: Signal<ViewState>) -> Element {
    rsx! {
        div { class: "tabs",
            TabButton { state, tab: Tab::Files, label: "📁 Group Files" }
            TabButton { state, tab: Tab::ChatRequests, label: "💬 Chat Requests" }
            TabButton { state, tab: Tab::Notifications, label: "🔔 Notifications" }
        }
    }
}

#[component]
fn TabButton(state: Signal<ViewState>, tab: Tab, label: &'static str) -> Element {
    let mut state = state;
    let class = if state.read().active_tab == tab {
        "tab active"
    } else {
        "tab"
    };
    rsx! {
        button {
            class: class,
            r#type: "button",
            onclick: move |_| state.write().select_tab(tab),
            "{label}"
        }
    }
}

#[component]
fn ConnectionPill(state: Signal<ViewState>) -> Element {
    let status = state.read().connection.clone();
    let label = status.label();
    let class = match status {
        ConnectionStatus::Connected => "status-pill online",
        ConnectionStatus::Connecting => "status-pill pending",
        ConnectionStatus::Disconnected(_) => "status-pill offline",
    };
    rsx! {
        span { class: class, title: "Realtime channel", "{label}" }
    }
}

#[component]
fn ErrorBanner(state: Signal<ViewState>) -> Element {
    let mut state = state;
    let errors = state.read().errors.clone();
    if errors.is_empty() {
        return rsx! {};
    }
    rsx! {
        div { class: "error-banner", role: "alert",
            for (index, message) in errors.into_iter().enumerate() {
                div { class: "error-row", key: "{index}",
                    span { class: "error-text", "{message}" }
                    button {
                        class: "action-btn",
                        r#type: "button",
                        title: "Dismiss",
                        onclick: move |_| state.write().dismiss_error(index),
                        "✕"
                    }
                }
            }
        }
    }
}
