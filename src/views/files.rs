use crate::session::Session;
use crate::state::ViewState;
use crate::ui::persist_record;
use dioxus::prelude::*;
use std::rc::Rc;

#[component]
pub fn FilesView(state: Signal<ViewState>) -> Element {
    let mut state = state;
    let session = use_context::<Rc<Session>>();
    let accept = session.config().accept_attribute();
    let files = state.read().group_files.clone();

    let on_select = move |evt: FormEvent| {
        let Some(engine) = evt.files() else {
            return;
        };
        let selected = engine.files();
        let uploaded = session.upload(&mut state.write(), &selected);
        match uploaded {
            Ok(Some(upload)) => {
                if let Some(err) = upload.emit_error {
                    state.write().report(format!(
                        "{} was not announced to the group: {err}",
                        upload.record.name
                    ));
                }
                spawn(persist_record(session.clone(), upload.record, state));
            }
            Ok(None) => {}
            Err(err) => {
                tracing::info!(error = %err, "upload rejected");
                state.write().report(err.to_string());
            }
        }
    };

    rsx! {
        div { class: "main-container",
            div { class: "card",
                h3 { class: "section-title", "Shared Materials" }
                input {
                    class: "file-input",
                    r#type: "file",
                    accept: "{accept}",
                    onchange: on_select,
                }
                ul { class: "item-list",
                    for (index, file) in files.iter().enumerate() {
                        li { class: "item", key: "{index}", "📄 {file.name}" }
                    }
                }
            }
        }
    }
}
