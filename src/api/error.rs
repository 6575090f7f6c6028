//! API error responses
//!
//! Every failure is answered with `{ "success": false, "message": ... }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::images::StoreError;

/// Errors returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No image file uploaded")]
    NoImage,

    #[error("Only image files are allowed!")]
    NotAnImage,

    #[error("File too large")]
    TooLarge,

    #[error("{0}")]
    BadUpload(String),

    #[error("{0}")]
    UploadFailed(String),

    #[error("Failed to save image metadata")]
    NotSaved,

    #[error("Image not found or expired")]
    ImageUnavailable,

    #[error("Image not found")]
    ImageNotFound,

    #[error("Server error")]
    Lookup,

    #[error("Delete failed")]
    DeleteFailed,

    #[error("The CORS policy for this site does not allow access from the specified Origin: {0}")]
    OriginNotAllowed(String),

    #[error("Not found")]
    RouteNotFound,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Upload failures echo the underlying error text
    pub fn upload(err: &StoreError) -> Self {
        let message = err.to_string();
        if message.is_empty() {
            Self::UploadFailed("Upload failed".to_string())
        } else {
            Self::UploadFailed(message)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoImage | Self::NotAnImage | Self::TooLarge | Self::BadUpload(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ImageUnavailable | Self::ImageNotFound | Self::RouteNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::UploadFailed(_)
            | Self::NotSaved
            | Self::Lookup
            | Self::DeleteFailed
            | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ErrorResponse {
                success: false,
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}
