// Guestbook request handlers
//
// Each handler returns `Result<_, ApiError>`; the router turns errors into
// the failure envelope.

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_TYPE;
use hyper::{Request, Response};

use super::error::ApiError;
use super::response::success;
use crate::config::AppState;
use crate::http::{build_file_response, mime, parse_multipart, read_body, FormData};
use crate::logger;
use crate::messages::{Message, NewMessage};
use crate::upload::{self, parse_data_url, UploadedFile};

pub type HandlerResult = Result<Response<Full<Bytes>>, ApiError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// GET /api/messages
pub async fn list_messages(state: &AppState) -> HandlerResult {
    let messages = state.messages.list().await?;
    Ok(success(&messages))
}

/// POST /api/messages with a JSON body
pub async fn create_message<B>(req: Request<B>, state: &AppState) -> HandlerResult
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let body = read_body(req.into_body(), state.config.http.max_body_size).await?;
    let input: NewMessage = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;
    let message = store_message(state, input).await?;
    Ok(success(&message))
}

/// POST /api/submit with a multipart form, optionally carrying one attachment
pub async fn submit_form<B>(req: Request<B>, state: &AppState) -> HandlerResult
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let mut form = read_form(req, state).await?;

    let name = form.text("nickname").unwrap_or_default();
    let content = form.text("message").unwrap_or_default();
    if name.trim().is_empty() || content.trim().is_empty() {
        // Validate before anything is uploaded
        return Err(ApiError::Validation(
            "name and content must not be empty".to_string(),
        ));
    }
    let mut input = NewMessage {
        name: Some(name.to_string()),
        content: Some(content.to_string()),
        files: Vec::new(),
        is_public: Some(form.text("isPublic") == Some("true")),
    };

    if let Some(file) = form_attachment(&mut form)? {
        let stored = upload::upload(state.uploader.as_ref(), &file).await?;
        input.files.push(stored.url);
    }

    let message = store_message(state, input).await?;
    Ok(success(&message))
}

/// POST /api/upload with a multipart `file` part
pub async fn upload_file<B>(req: Request<B>, state: &AppState) -> HandlerResult
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let mut form = read_form(req, state).await?;
    let part = form
        .take_file("file")
        .ok_or_else(|| ApiError::Validation("missing file field".to_string()))?;

    let file = UploadedFile::new(part.filename, part.content_type.as_deref(), part.data);
    let stored = upload::upload(state.uploader.as_ref(), &file).await?;
    Ok(success(&stored))
}

/// GET /api/files/{id}
pub async fn get_file(id: &str, state: &AppState, is_head: bool) -> HandlerResult {
    let file = upload::load_file(state.store.as_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("file".to_string()))?;

    Ok(build_file_response(
        file.data,
        &file.metadata.content_type,
        &file.metadata.filename,
        is_head,
    ))
}

/// GET /api/b2-auth
pub async fn b2_auth(state: &AppState) -> HandlerResult {
    let credentials = state.uploader.upload_credentials().await?;
    Ok(success(&credentials))
}

async fn store_message(state: &AppState, input: NewMessage) -> Result<Message, ApiError> {
    let message = state.messages.create(input).await?;
    logger::log_info(&format!(
        "[Messages] New message {} from {:?} ({} file(s))",
        message.id,
        message.name,
        message.files.len()
    ));
    if let Some(notifier) = &state.notifier {
        notifier.notify(&message);
    }
    Ok(message)
}

async fn read_form<B>(req: Request<B>, state: &AppState) -> Result<FormData, ApiError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = read_body(req.into_body(), state.config.http.max_body_size).await?;
    Ok(parse_multipart(content_type.as_deref(), body).await?)
}

/// The form's attachment: a non-empty `file` part, else an `imageData` data URL
fn form_attachment(form: &mut FormData) -> Result<Option<UploadedFile>, ApiError> {
    if let Some(part) = form.take_file("file").filter(|p| !p.data.is_empty()) {
        return Ok(Some(UploadedFile::new(
            part.filename,
            part.content_type.as_deref(),
            part.data,
        )));
    }

    match form.text("imageData").map(str::trim) {
        Some(data_url) if !data_url.is_empty() => {
            let (content_type, data) = parse_data_url(data_url)?;
            let ext = mime::extension_for(&content_type).unwrap_or("bin");
            Ok(Some(UploadedFile::new(
                format!("image.{ext}"),
                Some(&content_type),
                data,
            )))
        }
        _ => Ok(None),
    }
}
