use crate::state::ViewState;
use dioxus::prelude::*;
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};

const NOTIFICATION_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]");

fn format_timestamp(timestamp: Option<OffsetDateTime>) -> Option<String> {
    let mut datetime = timestamp?;
    if let Ok(offset) = UtcOffset::current_local_offset() {
        datetime = datetime.to_offset(offset);
    }
    datetime.format(NOTIFICATION_TIME_FORMAT).ok()
}

#[component]
pub fn NotificationsView(state: Signal<ViewState>) -> Element {
    let notifications = state.read().notifications.clone();

    rsx! {
        div { class: "main-container",
            div { class: "card",
                h3 { class: "section-title", "Notifications" }
                if notifications.is_empty() {
                    p { class: "text-muted", "Nothing yet." }
                }
                ul { class: "item-list",
                    for (index, note) in notifications.iter().enumerate() {
                        li { class: "item notice", key: "{index}",
                            span { "🔔 {note.text}" }
                            if let Some(ts) = format_timestamp(note.created_at) {
                                span { class: "item-timestamp", "{ts}" }
                            }
                        }
                    }
                }
            }
        }
    }
}
