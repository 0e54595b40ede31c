mod api;
mod camera;
mod components;

use components::header::render_header;
use components::results::render_results;
use components::sidebar::render_sidebar;
use components::upload_section::render_upload_section;
use components::utils::{render_error_message, render_spinner};
use shared::{ClassifierInfo, Frame, InputSource, NormalizeOptions, SessionView};
use std::future::Future;
use uuid::Uuid;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Blob, HtmlVideoElement, MediaStream};
use yew::prelude::*;

pub enum Msg {
    ClassifierLoaded(ClassifierInfo),
    SessionUpdated(SessionView),

    SelectTab(InputSource),
    StartCamera,
    CameraStarted(MediaStream),
    TakeSnapshot,
    ImageSelected(Blob, String, InputSource),
    ToggleResize(bool),
    SetTargetSize(u32),
    SelectContentLabel(String),

    SetError(Option<String>),
}

pub struct Model {
    session_id: Option<Uuid>,
    frame: Option<Frame>,
    info: Option<ClassifierInfo>,
    active_tab: InputSource,
    camera: Option<MediaStream>,
    video_ref: NodeRef,
    options: NormalizeOptions,
    loading: bool,
    error: Option<String>,
}

impl Component for Model {
    type Message = Msg;
    type Properties = ();

    fn create(ctx: &Context<Self>) -> Self {
        let link = ctx.link().clone();
        spawn_local(async move {
            match api::fetch_classifier().await {
                Ok(info) => link.send_message(Msg::ClassifierLoaded(info)),
                Err(e) => link.send_message(Msg::SetError(Some(e))),
            }
            match api::create_session().await {
                Ok(view) => link.send_message(Msg::SessionUpdated(view)),
                Err(e) => link.send_message(Msg::SetError(Some(e))),
            }
        });

        Self {
            session_id: None,
            frame: None,
            info: None,
            active_tab: InputSource::Camera,
            camera: None,
            video_ref: NodeRef::default(),
            options: NormalizeOptions::default(),
            loading: true,
            error: None,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::ClassifierLoaded(info) => {
                log::info!("Classifier labels: {}", info.labels.join(", "));
                self.info = Some(info);
                true
            }
            Msg::SessionUpdated(view) => self.handle_session_updated(view),

            Msg::SelectTab(source) => {
                if source != InputSource::Camera {
                    self.stop_camera();
                }
                self.active_tab = source;
                true
            }
            Msg::StartCamera => {
                let link = ctx.link().clone();
                spawn_local(async move {
                    match camera::open().await {
                        Ok(stream) => link.send_message(Msg::CameraStarted(stream)),
                        Err(e) => link.send_message(Msg::SetError(Some(e))),
                    }
                });
                false
            }
            Msg::CameraStarted(stream) => {
                if self.active_tab != InputSource::Camera {
                    camera::stop(&stream);
                    return false;
                }
                self.stop_camera();
                self.camera = Some(stream);
                self.error = None;
                true
            }
            Msg::TakeSnapshot => {
                let Some(video) = self.video_ref.cast::<HtmlVideoElement>() else {
                    self.error = Some("The camera is not ready yet.".into());
                    return true;
                };
                let link = ctx.link().clone();
                spawn_local(async move {
                    match camera::snapshot(&video).await {
                        Ok(blob) => link.send_message(Msg::ImageSelected(
                            blob,
                            camera::SNAPSHOT_NAME.to_string(),
                            InputSource::Camera,
                        )),
                        Err(e) => link.send_message(Msg::SetError(Some(e))),
                    }
                });
                false
            }
            Msg::ImageSelected(image, file_name, source) => {
                log::info!("Sending {} ({} bytes) from {}", file_name, image.size(), source);
                self.send(ctx, move |id| api::upload_image(id, image, file_name, source))
            }
            Msg::ToggleResize(enabled) => {
                let options = NormalizeOptions {
                    resize_enabled: enabled,
                    ..self.options
                };
                self.options = options;
                self.send(ctx, move |id| api::update_options(id, options))
            }
            Msg::SetTargetSize(size) => {
                let Some(options) = NormalizeOptions::new(self.options.resize_enabled, size) else {
                    self.error = Some(format!("Unsupported side length: {}", size));
                    return true;
                };
                self.options = options;
                self.send(ctx, move |id| api::update_options(id, options))
            }
            Msg::SelectContentLabel(label) => {
                self.send(ctx, move |id| api::select_content_label(id, Some(label)))
            }

            Msg::SetError(error) => {
                self.error = error;
                self.loading = false;
                true
            }
        }
    }

    fn rendered(&mut self, _ctx: &Context<Self>, _first_render: bool) {
        if let (Some(stream), Some(video)) = (&self.camera, self.video_ref.cast::<HtmlVideoElement>()) {
            camera::attach(&video, stream);
        }
    }

    fn destroy(&mut self, _ctx: &Context<Self>) {
        self.stop_camera();
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        html! {
            <div class="container">
                { render_header(self) }

                <div class="layout">
                    { render_sidebar(self, ctx) }

                    <main class="main-content">
                        { render_upload_section(self, ctx) }
                        { render_spinner(self) }
                        { render_error_message(self) }
                        { render_results(self, ctx) }
                    </main>
                </div>

                <footer class="app-footer">
                    <p>{"Snapshot Image Classifier | Fullstack Rust WASM"}</p>
                </footer>
            </div>
        }
    }
}

impl Model {
    fn stop_camera(&mut self) {
        if let Some(stream) = self.camera.take() {
            camera::stop(&stream);
        }
    }

    fn handle_session_updated(&mut self, view: SessionView) -> bool {
        self.session_id = Some(view.session_id);
        self.options = view.options;
        self.frame = Some(view.frame);
        self.loading = false;
        self.error = None;
        true
    }

    /// Runs one session request; the reply replaces the whole frame.
    fn send<F, Fut>(&mut self, ctx: &Context<Self>, request: F) -> bool
    where
        F: FnOnce(Uuid) -> Fut + 'static,
        Fut: Future<Output = Result<SessionView, String>> + 'static,
    {
        let Some(session_id) = self.session_id else {
            self.error = Some("The session is not ready yet.".into());
            return true;
        };

        self.loading = true;
        self.error = None;

        let link = ctx.link().clone();
        spawn_local(async move {
            match request(session_id).await {
                Ok(view) => link.send_message(Msg::SessionUpdated(view)),
                Err(e) => link.send_message(Msg::SetError(Some(e))),
            }
        });
        true
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("App starting...");
    yew::Renderer::<Model>::new().render();
}
