use super::super::Model;
use super::content_panel::render_content_panel;
use shared::{FailedFrame, FailureStage, Frame, ProbabilityBar, ReadyFrame};
use yew::prelude::*;

pub fn render_results(model: &Model, ctx: &Context<Model>) -> Html {
    match &model.frame {
        None => html! {},
        Some(Frame::Idle { prompt }) => html! {
            <p class="info-message"><i class="fa-solid fa-circle-info"></i>{ format!(" {}", prompt) }</p>
        },
        Some(Frame::Ready(ready)) => render_ready(ready, model, ctx),
        Some(Frame::Failed(failed)) => render_failed(failed),
    }
}

fn render_ready(ready: &ReadyFrame, model: &Model, ctx: &Context<Model>) -> Html {
    html! {
        <>
            <div class="results-container">
                <div class="column">
                    if let Some(preview) = &ready.preview {
                        <img class="input-preview" src={preview.clone()} alt="Input image" />
                    }
                    <div class="prediction-box">
                        <span class="prediction-caption">{"Prediction:"}</span>
                        <h2>{ &ready.predicted_label }</h2>
                    </div>
                </div>
                <div class="column">
                    <h3>{"Detailed probabilities"}</h3>
                    { for ready.bars.iter().map(render_bar) }
                </div>
            </div>
            { render_content_panel(&ready.content, model, ctx) }
        </>
    }
}

fn render_bar(bar: &ProbabilityBar) -> Html {
    html! {
        <div class="prob-card">
            <span class="prob-label">{ &bar.label }</span>
            <div class="prob-bar-bg">
                <div
                    class={classes!("prob-bar-fg", bar.highlighted.then_some("highlight"))}
                    style={format!("width: {:.4}%;", bar.percent)}
                >
                    { format!("{:.2}%", bar.percent) }
                </div>
            </div>
        </div>
    }
}

fn render_failed(failed: &FailedFrame) -> Html {
    let title = match failed.stage {
        FailureStage::Decode => "The image could not be read",
        FailureStage::Inference => "The model could not analyze the image",
    };

    html! {
        <div class="results-container failed">
            {
                match &failed.preview {
                    Some(preview) => html! { <img class="input-preview" src={preview.clone()} alt="Input image" /> },
                    None => html! {},
                }
            }
            <div class="error-message">
                <i class="fa-solid fa-triangle-exclamation"></i>
                <h3>{ title }</h3>
                <pre>{ &failed.message }</pre>
            </div>
        </div>
    }
}
