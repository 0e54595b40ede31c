use super::super::Model;
use yew::prelude::*;

/// Renders the application header with the labels the classifier knows.
pub fn render_header(model: &Model) -> Html {
    html! {
        <header class="app-header">
            <h1><i class="fa-solid fa-camera-retro"></i> {" Image Classifier: Camera Snapshot or Upload"}</h1>
            {
                match &model.info {
                    Some(info) => html! {
                        <p class="subtitle">
                            <strong>{"Classifiable labels: "}</strong>
                            <code>{ info.labels.join(", ") }</code>
                        </p>
                    },
                    None => html! { <p class="subtitle">{"Loading the model..."}</p> },
                }
            }
        </header>
    }
}
