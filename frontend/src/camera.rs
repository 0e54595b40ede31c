use js_sys::{Object, Promise, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Blob, CanvasRenderingContext2d, HtmlCanvasElement, HtmlVideoElement, MediaStream,
    MediaStreamConstraints, MediaStreamTrack,
};

pub const SNAPSHOT_NAME: &str = "snapshot.jpg";
const SNAPSHOT_TYPE: &str = "image/jpeg";
const SNAPSHOT_QUALITY: f64 = 0.92;

fn js_error(context: &str, value: JsValue) -> String {
    let detail = value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{:?}", value));
    format!("{}: {}", context, detail)
}

/// Asks the browser for a video-only stream, preferring the rear camera.
pub async fn open() -> Result<MediaStream, String> {
    let window = web_sys::window().ok_or_else(|| "No browser window".to_string())?;
    let devices = window
        .navigator()
        .media_devices()
        .map_err(|e| js_error("Camera is unavailable", e))?;

    let video = Object::new();
    Reflect::set(&video, &"facingMode".into(), &"environment".into())
        .map_err(|e| js_error("Invalid camera constraints", e))?;
    let constraints = MediaStreamConstraints::new();
    constraints.set_video(&video);
    constraints.set_audio(&JsValue::FALSE);

    let request = devices
        .get_user_media_with_constraints(&constraints)
        .map_err(|e| js_error("Camera is unavailable", e))?;
    let stream = JsFuture::from(request)
        .await
        .map_err(|e| js_error("Camera access was denied", e))?;
    stream
        .dyn_into::<MediaStream>()
        .map_err(|_| "The browser returned no camera stream".to_string())
}

/// Shows the stream in the element unless it already plays one.
pub fn attach(video: &HtmlVideoElement, stream: &MediaStream) {
    if video.src_object().is_some() {
        return;
    }
    video.set_src_object(Some(stream));
    if let Err(e) = video.play() {
        log::warn!("{}", js_error("Camera preview did not start", e));
    }
}

pub fn stop(stream: &MediaStream) {
    for track in stream.get_tracks().iter() {
        if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
            track.stop();
        }
    }
}

/// Draws the current video frame on a canvas and encodes it as JPEG.
pub async fn snapshot(video: &HtmlVideoElement) -> Result<Blob, String> {
    let (width, height) = (video.video_width(), video.video_height());
    if width == 0 || height == 0 {
        return Err("The camera is not ready yet.".into());
    }

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| "No document".to_string())?;
    let canvas = document
        .create_element("canvas")
        .map_err(|e| js_error("Failed to create canvas", e))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| "Failed to create canvas".to_string())?;
    canvas.set_width(width);
    canvas.set_height(height);

    let context = canvas
        .get_context("2d")
        .map_err(|e| js_error("Canvas is unavailable", e))?
        .ok_or_else(|| "Canvas is unavailable".to_string())?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| "Canvas is unavailable".to_string())?;
    context
        .draw_image_with_html_video_element(video, 0.0, 0.0)
        .map_err(|e| js_error("Failed to capture the frame", e))?;

    let encoded = Promise::new(&mut |resolve, reject| {
        let on_error = reject.clone();
        let on_blob = Closure::once_into_js(move |blob: JsValue| {
            let _ = if blob.is_null() {
                reject.call1(&JsValue::NULL, &"the frame could not be encoded".into())
            } else {
                resolve.call1(&JsValue::NULL, &blob)
            };
        });
        if let Err(e) = canvas.to_blob_with_type_and_encoder_options(
            on_blob.unchecked_ref(),
            SNAPSHOT_TYPE,
            &JsValue::from_f64(SNAPSHOT_QUALITY),
        ) {
            let _ = on_error.call1(&JsValue::NULL, &e);
        }
    });

    JsFuture::from(encoded)
        .await
        .map_err(|e| js_error("Snapshot encoding failed", e))?
        .dyn_into::<Blob>()
        .map_err(|_| "Snapshot encoding failed".to_string())
}
