use crate::state::ViewState;
use dioxus::prelude::*;

#[component]
pub fn LoginView(state: Signal<ViewState>) -> Element {
    let mut state = state;
    rsx! {
        div { class: "main-container login",
            h2 { class: "section-title", "User Authentication" }
            button {
                class: "btn btn-primary",
                r#type: "button",
                onclick: move |_| state.write().authenticate(),
                "🔑 Login with Email"
            }
        }
    }
}
