use super::super::Model;
use super::super::Msg;
use super::utils::debounce;
use shared::{MAX_TARGET_SIZE, MIN_TARGET_SIZE, TARGET_SIZE_STEP};
use web_sys::HtmlInputElement;
use yew::prelude::*;

pub fn render_sidebar(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link().clone();
    let options = model.options;

    let toggle_resize = link.callback(|e: Event| {
        let input: HtmlInputElement = e.target_unchecked_into();
        Msg::ToggleResize(input.checked())
    });

    let set_size = debounce(250, {
        let link = link.clone();
        move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            if let Ok(size) = input.value().parse::<u32>() {
                link.send_message(Msg::SetTargetSize(size));
            }
        }
    });

    html! {
        <aside class="sidebar">
            <h2>{"Settings"}</h2>
            <label class="toggle" title="Turn on if analysis feels slow.">
                <input type="checkbox" checked={options.resize_enabled} onchange={toggle_resize} />
                {" Resize input"}
            </label>
            <label class="slider">
                { format!("Side length: {}px", options.target_size) }
                <input
                    type="range"
                    min={MIN_TARGET_SIZE.to_string()}
                    max={MAX_TARGET_SIZE.to_string()}
                    step={TARGET_SIZE_STEP.to_string()}
                    value={options.target_size.to_string()}
                    oninput={set_size}
                />
            </label>
            <p class="caption">{"The model file is downloaded once and cached."}</p>
            {
                match &model.info {
                    Some(info) => html! {
                        <>
                            <p><strong>{"Model file: "}</strong><code>{ &info.model_path }</code></p>
                            <p><strong>{"Drive file id: "}</strong><code>{ &info.file_id }</code></p>
                        </>
                    },
                    None => html! {},
                }
            }
        </aside>
    }
}
