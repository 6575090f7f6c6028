//! Image sharing endpoints
//!
//! POST /upload - Store a multipart `image` field, answer with its share id
//! GET /share/{share_id} - Serve an unexpired image
//! DELETE /delete/{share_id} - Remove an image

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use super::error::ApiError;
use super::AppState;
use crate::images::{NewImage, MAX_UPLOAD_BYTES};

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// Cache directive for served images
pub const SHARE_CACHE_CONTROL: &str = "public, max-age=3600";

/// Request body cap; leaves room for multipart framing around a full-size image
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

/// Build the images router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/share/{share_id}", get(share))
        .route("/delete/{share_id}", delete(delete_image))
}

/// Upload response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub share_id: String,
}

/// Delete response
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// A file pulled out of the multipart body
struct UploadedFile {
    original_name: String,
    mime_type: String,
    data: Vec<u8>,
}

/// Store an uploaded image
async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    // A body that is not multipart carries no file
    let mut multipart = multipart.map_err(|_| ApiError::NoImage)?;
    let file = read_image_field(&mut multipart)
        .await?
        .ok_or(ApiError::NoImage)?;

    let image = NewImage::from_upload(file.original_name, file.mime_type, file.data);
    let share_id = image.share_id.clone();
    let size = image.size();

    match state.store.insert(image).await {
        Ok(Some(_)) => {
            info!("Shared image {} ({} bytes)", share_id, size);
            Ok(Json(UploadResponse {
                success: true,
                share_id,
            }))
        }
        Ok(None) => {
            error!("Upload error: insert returned no row for {}", share_id);
            Err(ApiError::NotSaved)
        }
        Err(e) => {
            error!("Upload error: {}", e);
            Err(ApiError::upload(&e))
        }
    }
}

/// Find the `image` file part, checking its type before reading and its size while reading
async fn read_image_field(multipart: &mut Multipart) -> Result<Option<UploadedFile>, ApiError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        // A part without a filename is a plain text field, not a file
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let mime_type = field.content_type().unwrap_or_default().to_string();
        if !mime_type.starts_with("image/") {
            return Err(ApiError::NotAnImage);
        }

        // Oversized files are drained, not kept, so the client sees a clean 400
        let mut data = Vec::new();
        let mut too_large = false;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if too_large || data.len() + chunk.len() > MAX_UPLOAD_BYTES {
                too_large = true;
                continue;
            }
            data.extend_from_slice(&chunk);
        }
        if too_large {
            return Err(ApiError::TooLarge);
        }

        return Ok(Some(UploadedFile {
            original_name,
            mime_type,
            data,
        }));
    }

    Ok(None)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::TooLarge
    } else {
        ApiError::BadUpload(err.body_text())
    }
}

/// Serve an image by share id
async fn share(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
) -> Result<Response, ApiError> {
    match state.store.find_active(&share_id, Utc::now()).await {
        Ok(Some(image)) => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, image.mime_type),
                (header::CACHE_CONTROL, SHARE_CACHE_CONTROL.to_string()),
            ],
            image.data,
        )
            .into_response()),
        Ok(None) => Err(ApiError::ImageUnavailable),
        Err(e) => {
            error!("Share error: {}", e);
            Err(ApiError::Lookup)
        }
    }
}

/// Delete an image by share id, expired or not
async fn delete_image(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    match state.store.delete(&share_id).await {
        Ok(true) => {
            info!("Deleted image {}", share_id);
            Ok(Json(DeleteResponse { success: true }))
        }
        Ok(false) => Err(ApiError::ImageNotFound),
        Err(e) => {
            error!("Delete error: {}", e);
            Err(ApiError::DeleteFailed)
        }
    }
}
