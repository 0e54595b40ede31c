use super::super::Model;
use super::super::Msg;
use super::utils::extract_image_file;
use shared::InputSource;
use web_sys::HtmlInputElement;
use yew::prelude::*;

pub fn render_upload_section(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();
    let tab_button = |source: InputSource, icon: &'static str, title: &'static str| {
        let active = model.active_tab == source;
        html! {
            <button
                class={classes!("tab", active.then_some("active"))}
                onclick={link.callback(move |_| Msg::SelectTab(source))}
            >
                <i class={classes!("fa-solid", icon)}></i>{ title }
            </button>
        }
    };

    html! {
        <div class="upload-section">
            <div class="tabs">
                { tab_button(InputSource::Camera, "fa-camera", " Take a snapshot") }
                { tab_button(InputSource::Upload, "fa-folder-open", " Upload a file") }
            </div>
            { render_file_input(model, ctx) }
        </div>
    }
}

fn render_file_input(model: &Model, ctx: &Context<Model>) -> Html {
    let handle_change = ctx.link().batch_callback(move |e: Event| {
        let input: HtmlInputElement = e.target_unchecked_into();
        let selected = input.files().map(|files| extract_image_file(&files));
        input.set_value("");

        match selected {
            Some(Ok(Some(file))) => Some(Msg::ImageSelected(
                file.clone().into(),
                file.name(),
                InputSource::Upload,
            )),
            Some(Err(message)) => Some(Msg::SetError(Some(message))),
            _ => None,
        }
    });

    match model.active_tab {
        InputSource::Camera => render_camera(model, ctx),
        InputSource::Upload => html! {
            <div class="upload-area">
                <p>{"Upload an image (jpg, png, jpeg, webp, tiff)"}</p>
                <input
                    type="file"
                    id="file-input"
                    accept=".jpg,.jpeg,.png,.webp,.tiff"
                    disabled={model.session_id.is_none() || model.loading}
                    onchange={handle_change}
                />
            </div>
        },
    }
}

fn render_camera(model: &Model, ctx: &Context<Model>) -> Html {
    let busy = model.session_id.is_none() || model.loading;

    if model.camera.is_none() {
        return html! {
            <div class="upload-area">
                <p>{"Allow camera access, then take a snapshot."}</p>
                <button
                    class="tab active"
                    disabled={busy}
                    onclick={ctx.link().callback(|_| Msg::StartCamera)}
                >
                    <i class="fa-solid fa-video"></i>{" Start camera"}
                </button>
            </div>
        };
    }

    html! {
        <div class="upload-area">
            <video
                class="camera-view"
                ref={model.video_ref.clone()}
                autoplay=true
                playsinline=true
                muted=true
            />
            <button
                class="tab active"
                disabled={busy}
                onclick={ctx.link().callback(|_| Msg::TakeSnapshot)}
            >
                <i class="fa-solid fa-camera"></i>{" Take snapshot"}
            </button>
        </div>
    }
}
