use crate::session::Session;
use crate::state::ViewState;
use dioxus::prelude::*;
use std::rc::Rc;

#[component]
pub fn ChatRequestsView(state: Signal<ViewState>) -> Element {
    let mut state = state;
    let session = use_context::<Rc<Session>>();
    let target = session.config().chat_target.clone();
    let requests = state.read().chat_requests.clone();

    let send_request = move |_| {
        let sent = session.send_chat_request(&mut state.write());
        if let Err(err) = sent {
            tracing::warn!(error = %err, "chat request not delivered");
            state
                .write()
                .report(format!("Chat request not delivered: {err}"));
        }
    };

    rsx! {
        div { class: "main-container",
            div { class: "card",
                h3 { class: "section-title", "Chat Requests" }
                button {
                    class: "btn btn-primary",
                    r#type: "button",
                    onclick: send_request,
                    "👤 Send Request to {target}"
                }
                ul { class: "item-list",
                    for (index, user) in requests.iter().enumerate() {
                        li { class: "item", key: "{index}", "💬 Request sent to {user}" }
                    }
                }
            }
        }
    }
}
