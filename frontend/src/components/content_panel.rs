use super::super::Model;
use super::super::Msg;
use shared::{ContentPanel, VideoCard};
use web_sys::HtmlSelectElement;
use yew::prelude::*;

pub fn render_content_panel(panel: &ContentPanel, model: &Model, ctx: &Context<Model>) -> Html {
    let on_select = ctx.link().callback(|e: Event| {
        let select: HtmlSelectElement = e.target_unchecked_into();
        Msg::SelectContentLabel(select.value())
    });

    html! {
        <section class="content-panel">
            <div class="content-header">
                <h3>{"Reference material"}</h3>
                <select onchange={on_select} disabled={model.loading}>
                    { for panel.label_options.iter().map(|label| html! {
                        <option value={label.clone()} selected={*label == panel.selected_label}>
                            { label }
                        </option>
                    })}
                </select>
            </div>
            if panel.is_empty {
                <p class="info-message">
                    { format!("No reference material for \"{}\" yet.", panel.selected_label) }
                </p>
            } else {
                <div class="content-grid">
                    <div class="content-texts">
                        { for panel.texts.iter().map(|text| html! { <p class="content-text">{ text }</p> }) }
                    </div>
                    <div class="content-images">
                        { for panel.images.iter().map(|src| html! {
                            <img class="content-image" src={src.clone()} alt={panel.selected_label.clone()} />
                        })}
                    </div>
                    <div class="content-videos">
                        { for panel.videos.iter().map(render_video) }
                    </div>
                </div>
            }
        </section>
    }
}

fn render_video(video: &VideoCard) -> Html {
    match &video.thumbnail_url {
        Some(thumbnail) => html! {
            <a class="video-card" href={video.url.clone()} target="_blank" rel="noopener noreferrer">
                <img src={thumbnail.clone()} alt="Video thumbnail" />
                <span class="play-icon"><i class="fa-solid fa-play"></i></span>
            </a>
        },
        None => html! {
            <a class="video-link" href={video.url.clone()} target="_blank" rel="noopener noreferrer">
                <i class="fa-solid fa-film"></i>{ format!(" {}", video.url) }
            </a>
        },
    }
}
