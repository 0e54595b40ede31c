use crate::classifier::Classifier;
use crate::content::ContentTable;
use crate::pipeline::render_frame;
use crate::session::store::{SessionStore, SharedSession};
use crate::session::{ImageInput, SessionState};
use actix_files::Files;
use actix_multipart::{Field, Multipart};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use futures::{StreamExt, TryStreamExt};
use log::{info, warn};
use shared::{
    ClassifierInfo, ContentLabelRequest, ErrorResponse, InputSource, NormalizeOptions, SessionView,
    MAX_TARGET_SIZE, MIN_TARGET_SIZE,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "tiff"];
const ALLOWED_CONTENT_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/tiff",
    "application/octet-stream",
];

/// Everything the handlers share.
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub content: Arc<ContentTable>,
    pub sessions: SessionStore,
    pub info: ClassifierInfo,
    pub upload_limit: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),
    #[error("No image was provided")]
    MissingImage,
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("Image exceeds the upload limit of {limit} bytes")]
    TooLarge { limit: usize },
    #[error("Unknown input source: {0}")]
    InvalidSource(String),
    #[error("Target size {0} must be between {MIN_TARGET_SIZE} and {MAX_TARGET_SIZE}")]
    InvalidOptions(u32),
    #[error("Unknown label: {0}")]
    UnknownLabel(String),
    #[error("Upload failed: {0}")]
    Multipart(String),
    #[error("Render task failed: {0}")]
    Blocking(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MissingImage
            | ApiError::InvalidSource(_)
            | ApiError::InvalidOptions(_)
            | ApiError::UnknownLabel(_)
            | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/classifier").route(web::get().to(get_classifier)))
        .service(web::resource("/api/sessions").route(web::post().to(create_session)))
        .service(
            web::resource("/api/sessions/{session_id}")
                .route(web::get().to(get_session))
                .route(web::delete().to(delete_session)),
        )
        .service(web::resource("/api/sessions/{session_id}/image").route(web::post().to(upload_image)))
        .service(web::resource("/api/sessions/{session_id}/options").route(web::put().to(update_options)))
        .service(
            web::resource("/api/sessions/{session_id}/content-label")
                .route(web::put().to(select_content_label)),
        );
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, frontend_dir: PathBuf) {
    configure_api(cfg);
    cfg.service(Files::new("/", frontend_dir).index_file("index.html"));
}

async fn get_classifier(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(&state.info)
}

async fn create_session(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let (session_id, session) = state.sessions.create();
    let view = render(state, session_id, session, |_| {}).await?;
    Ok(HttpResponse::Created().json(view))
}

async fn get_session(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    let session = find(&state, session_id)?;
    let view = render(state, session_id, session, SessionState::touch).await?;
    Ok(HttpResponse::Ok().json(view))
}

async fn delete_session(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    if state.sessions.remove(session_id) {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(ApiError::SessionNotFound(session_id))
    }
}

async fn upload_image(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    let session = find(&state, session_id)?;

    let mut image: Option<Vec<u8>> = None;
    let mut source = InputSource::default();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "source" => {
                let raw = read_field(&mut field, 64).await?;
                let raw = String::from_utf8_lossy(&raw).trim().to_string();
                source = InputSource::from_str(&raw).map_err(|_| ApiError::InvalidSource(raw))?;
            }
            _ => {
                if let Err(e) = check_upload_type(&field) {
                    warn!("Rejected upload for session {}: {}", session_id, e);
                    return Err(e);
                }
                let bytes = read_field(&mut field, state.upload_limit).await.inspect_err(|e| {
                    warn!("Rejected upload for session {}: {}", session_id, e);
                })?;
                if !bytes.is_empty() {
                    image = Some(bytes);
                }
            }
        }
    }

    let bytes = image.ok_or(ApiError::MissingImage)?;
    info!(
        "Session {} received {} bytes from {}",
        session_id,
        bytes.len(),
        source
    );

    let input = ImageInput::new(bytes, source);
    let view = render(state, session_id, session, move |s| s.set_input(input)).await?;
    Ok(HttpResponse::Ok().json(view))
}

async fn update_options(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<NormalizeOptions>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    let requested = body.into_inner();
    let options = NormalizeOptions::new(requested.resize_enabled, requested.target_size)
        .ok_or(ApiError::InvalidOptions(requested.target_size))?;
    let session = find(&state, session_id)?;

    let view = render(state, session_id, session, move |s| s.set_options(options)).await?;
    Ok(HttpResponse::Ok().json(view))
}

async fn select_content_label(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<ContentLabelRequest>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    let label = body.into_inner().label.map(|l| l.trim().to_string());
    if let Some(label) = label.as_deref().filter(|l| !l.is_empty()) {
        if !state.classifier.labels().iter().any(|known| known == label) {
            return Err(ApiError::UnknownLabel(label.to_string()));
        }
    }
    let session = find(&state, session_id)?;

    let view = render(state, session_id, session, move |s| {
        s.set_selected_content_label(label)
    })
    .await?;
    Ok(HttpResponse::Ok().json(view))
}

fn find(state: &AppState, session_id: Uuid) -> Result<SharedSession, ApiError> {
    state
        .sessions
        .get(session_id)
        .ok_or(ApiError::SessionNotFound(session_id))
}

/// Applies `update` and renders the session on the blocking pool.
async fn render<F>(
    state: web::Data<AppState>,
    session_id: Uuid,
    session: SharedSession,
    update: F,
) -> Result<SessionView, ApiError>
where
    F: FnOnce(&mut SessionState) + Send + 'static,
{
    web::block(move || {
        let mut guard = session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        update(&mut guard);
        let frame = render_frame(&mut guard, state.classifier.as_ref(), &state.content);
        SessionView {
            session_id,
            options: guard.options(),
            frame,
        }
    })
    .await
    .map_err(|e| ApiError::Blocking(e.to_string()))
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| ApiError::Multipart(e.to_string()))?;
        if data.len() + chunk.len() > limit {
            return Err(ApiError::TooLarge { limit });
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

fn check_upload_type(field: &Field) -> Result<(), ApiError> {
    let filename = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .map(str::to_string);

    if let Some(name) = filename.as_deref() {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension {
            Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
            _ => return Err(ApiError::UnsupportedType(name.to_string())),
        }
    }

    if let Some(mime) = field.content_type() {
        let essence = mime.essence_str().to_ascii_lowercase();
        if !ALLOWED_CONTENT_TYPES.contains(&essence.as_str()) {
            return Err(ApiError::UnsupportedType(essence));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::fake::FakeClassifier;
    use crate::content::ContentEntry;
    use actix_web::http::header;
    use actix_web::{test, App};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage};
    use shared::{FailureStage, Frame};
    use std::io::Cursor;
    use std::time::Duration;

    const BOUNDARY: &str = "snapshot-test-boundary";

    struct Part<'a> {
        name: &'a str,
        filename: Option<&'a str>,
        content_type: Option<&'a str>,
        data: &'a [u8],
    }

    fn multipart(parts: &[Part]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
            if let Some(filename) = part.filename {
                disposition.push_str(&format!("; filename=\"{}\"", filename));
            }
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(content_type) = part.content_type {
                body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn image_part(data: &[u8]) -> Part<'_> {
        Part {
            name: "image",
            filename: Some("snapshot.png"),
            content_type: Some("image/png"),
            data,
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img: RgbImage = ImageBuffer::from_pixel(16, 16, Rgb([200, 40, 40]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn app_state(classifier: Arc<FakeClassifier>, upload_limit: usize) -> web::Data<AppState> {
        let content = ContentTable::from_entries([(
            "A".to_string(),
            ContentEntry {
                texts: vec!["about A".into()],
                ..ContentEntry::default()
            },
        )]);
        let labels = classifier.labels().to_vec();
        web::Data::new(AppState {
            classifier,
            content: Arc::new(content),
            sessions: SessionStore::new(Duration::from_secs(600)),
            info: ClassifierInfo {
                labels,
                model_path: "model.onnx".into(),
                file_id: "file-id".into(),
            },
            upload_limit,
        })
    }

    fn upload_request(session_id: Uuid, body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri(&format!("/api/sessions/{}/image", session_id))
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn test_session_starts_idle() {
        let classifier = Arc::new(FakeClassifier::with_scores(&["A", "B", "C"], &[0.7, 0.2, 0.1]));
        let app = test::init_service(
            App::new()
                .app_data(app_state(classifier.clone(), MAX_UPLOAD_BYTES))
                .configure(configure_api),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/sessions").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let view: SessionView = test::read_body_json(resp).await;

        assert!(matches!(view.frame, Frame::Idle { .. }));
        assert_eq!(view.options, NormalizeOptions::default());
        assert_eq!(classifier.calls(), 0);
    }

    #[actix_web::test]
    async fn test_frame_is_tagged_by_state() {
        let classifier = Arc::new(FakeClassifier::with_scores(&["A", "B"], &[0.5, 0.5]));
        let app = test::init_service(
            App::new()
                .app_data(app_state(classifier, MAX_UPLOAD_BYTES))
                .configure(configure_api),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/sessions").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(value["frame"]["state"], "idle");
        assert_eq!(value["options"]["resize_enabled"], false);
        assert_eq!(value["options"]["target_size"], 384);
    }

    #[actix_web::test]
    async fn test_classifier_info() {
        let classifier = Arc::new(FakeClassifier::with_scores(&["A", "B"], &[0.5, 0.5]));
        let app = test::init_service(
            App::new()
                .app_data(app_state(classifier, MAX_UPLOAD_BYTES))
                .configure(configure_api),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/classifier").to_request();
        let info: ClassifierInfo = test::call_and_read_body_json(&app, req).await;
        assert_eq!(info.labels, vec!["A", "B"]);
        assert_eq!(info.file_id, "file-id");
    }

    #[actix_web::test]
    async fn test_upload_then_reselect_content() {
        let classifier = Arc::new(FakeClassifier::with_scores(&["A", "B", "C"], &[0.7, 0.2, 0.1]));
        let app = test::init_service(
            App::new()
                .app_data(app_state(classifier.clone(), MAX_UPLOAD_BYTES))
                .configure(configure_api),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/sessions").to_request();
        let view: SessionView = test::call_and_read_body_json(&app, req).await;
        let id = view.session_id;

        let png = png_bytes();
        let body = multipart(&[
            Part {
                name: "source",
                filename: None,
                content_type: None,
                data: b"camera",
            },
            image_part(&png),
        ]);
        let resp = test::call_service(&app, upload_request(id, body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let view: SessionView = test::read_body_json(resp).await;
        let Frame::Ready(ready) = view.frame else {
            panic!("expected a ready frame");
        };
        assert_eq!(ready.predicted_label, "A");
        assert_eq!(ready.content.texts, vec!["about A".to_string()]);
        assert_eq!(classifier.calls(), 1);

        let req = test::TestRequest::put()
            .uri(&format!("/api/sessions/{}/content-label", id))
            .set_json(ContentLabelRequest {
                label: Some("B".into()),
            })
            .to_request();
        let view: SessionView = test::call_and_read_body_json(&app, req).await;
        let Frame::Ready(ready) = view.frame else {
            panic!("expected a ready frame");
        };
        assert_eq!(ready.predicted_label, "A");
        assert_eq!(ready.content.selected_label, "B");
        assert!(ready.content.is_empty);
        assert_eq!(classifier.calls(), 1);
    }

    #[actix_web::test]
    async fn test_options_are_validated() {
        let classifier = Arc::new(FakeClassifier::with_scores(&["A", "B"], &[0.5, 0.5]));
        let app = test::init_service(
            App::new()
                .app_data(app_state(classifier, MAX_UPLOAD_BYTES))
                .configure(configure_api),
        )
        .await;
        let req = test::TestRequest::post().uri("/api/sessions").to_request();
        let view: SessionView = test::call_and_read_body_json(&app, req).await;
        let uri = format!("/api/sessions/{}/options", view.session_id);

        let req = test::TestRequest::put()
            .uri(&uri)
            .set_json(NormalizeOptions {
                resize_enabled: true,
                target_size: 4096,
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::put()
            .uri(&uri)
            .set_json(NormalizeOptions {
                resize_enabled: true,
                target_size: 256,
            })
            .to_request();
        let view: SessionView = test::call_and_read_body_json(&app, req).await;
        assert_eq!(view.options, NormalizeOptions::new(true, 256).unwrap());
    }

    #[actix_web::test]
    async fn test_upload_rejections() {
        let classifier = Arc::new(FakeClassifier::with_scores(&["A", "B"], &[0.5, 0.5]));
        let app = test::init_service(
            App::new()
                .app_data(app_state(classifier.clone(), 1024))
                .configure(configure_api),
        )
        .await;
        let req = test::TestRequest::post().uri("/api/sessions").to_request();
        let view: SessionView = test::call_and_read_body_json(&app, req).await;
        let id = view.session_id;

        let gif = multipart(&[Part {
            name: "image",
            filename: Some("anim.gif"),
            content_type: Some("image/gif"),
            data: b"GIF89a",
        }]);
        let resp = test::call_service(&app, upload_request(id, gif).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let big = vec![0u8; 4096];
        let resp = test::call_service(&app, upload_request(id, multipart(&[image_part(&big)])).to_request()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let no_image = multipart(&[Part {
            name: "source",
            filename: None,
            content_type: None,
            data: b"upload",
        }]);
        let resp = test::call_service(&app, upload_request(id, no_image).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let error: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(error.error, "No image was provided");

        assert_eq!(classifier.calls(), 0);
    }

    #[actix_web::test]
    async fn test_undecodable_upload_renders_failure() {
        let classifier = Arc::new(FakeClassifier::with_scores(&["A", "B"], &[0.5, 0.5]));
        let app = test::init_service(
            App::new()
                .app_data(app_state(classifier.clone(), MAX_UPLOAD_BYTES))
                .configure(configure_api),
        )
        .await;
        let req = test::TestRequest::post().uri("/api/sessions").to_request();
        let view: SessionView = test::call_and_read_body_json(&app, req).await;

        let body = multipart(&[image_part(b"definitely not a png")]);
        let view: SessionView =
            test::call_and_read_body_json(&app, upload_request(view.session_id, body).to_request()).await;
        match view.frame {
            Frame::Failed(failed) => assert_eq!(failed.stage, FailureStage::Decode),
            other => panic!("expected a failed frame, got {:?}", other),
        }
        assert_eq!(classifier.calls(), 0);
    }

    #[actix_web::test]
    async fn test_unknown_and_deleted_sessions() {
        let classifier = Arc::new(FakeClassifier::with_scores(&["A", "B"], &[0.5, 0.5]));
        let app = test::init_service(
            App::new()
                .app_data(app_state(classifier, MAX_UPLOAD_BYTES))
                .configure(configure_api),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/sessions/{}", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post().uri("/api/sessions").to_request();
        let view: SessionView = test::call_and_read_body_json(&app, req).await;
        let uri = format!("/api/sessions/{}", view.session_id);

        let req = test::TestRequest::delete().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
