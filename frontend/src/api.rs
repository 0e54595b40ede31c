use gloo_console::error;
use gloo_net::http::{Request, Response};
use serde::de::DeserializeOwned;
use shared::{ClassifierInfo, ContentLabelRequest, ErrorResponse, InputSource, NormalizeOptions, SessionView};
use uuid::Uuid;

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, String> {
    if response.ok() {
        return response
            .json::<T>()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e));
    }

    let status = response.status();
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => response.status_text(),
    };
    error!(format!("Server error {}: {}", status, message));
    Err(format!("Server error: {} - {}", status, message))
}

fn network_error(e: gloo_net::Error) -> String {
    error!(format!("Network error: {:?}", e));
    format!("Network error: {}", e)
}

pub async fn fetch_classifier() -> Result<ClassifierInfo, String> {
    let response = Request::get("/api/classifier").send().await.map_err(network_error)?;
    read_json(response).await
}

pub async fn create_session() -> Result<SessionView, String> {
    let response = Request::post("/api/sessions").send().await.map_err(network_error)?;
    read_json(response).await
}

pub async fn upload_image(
    session_id: Uuid,
    image: web_sys::Blob,
    file_name: String,
    source: InputSource,
) -> Result<SessionView, String> {
    let form_data = web_sys::FormData::new().map_err(|_| "Failed to build form data".to_string())?;
    form_data
        .append_with_str("source", &source.to_string())
        .map_err(|_| "Failed to build form data".to_string())?;
    form_data
        .append_with_blob_and_filename("image", &image, &file_name)
        .map_err(|_| "Failed to attach image".to_string())?;

    let response = Request::post(&format!("/api/sessions/{}/image", session_id))
        .body(form_data)
        .map_err(network_error)?
        .send()
        .await
        .map_err(network_error)?;
    read_json(response).await
}

pub async fn update_options(
    session_id: Uuid,
    options: NormalizeOptions,
) -> Result<SessionView, String> {
    let response = Request::put(&format!("/api/sessions/{}/options", session_id))
        .json(&options)
        .map_err(network_error)?
        .send()
        .await
        .map_err(network_error)?;
    read_json(response).await
}

pub async fn select_content_label(
    session_id: Uuid,
    label: Option<String>,
) -> Result<SessionView, String> {
    let response = Request::put(&format!("/api/sessions/{}/content-label", session_id))
        .json(&ContentLabelRequest { label })
        .map_err(network_error)?
        .send()
        .await
        .map_err(network_error)?;
    read_json(response).await
}
