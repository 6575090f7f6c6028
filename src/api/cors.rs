//! Cross-origin policy
//!
//! Requests without an `Origin` header pass. Requests with one must name an
//! allow-listed origin or they are refused before reaching any handler.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use super::error::ApiError;

/// Origins allowed to make cross-origin requests
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Arc<Vec<String>>,
}

impl AllowedOrigins {
    pub fn new(origins: Vec<String>) -> Self {
        Self {
            origins: Arc::new(origins),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }

    /// CORS response headers for allowed origins, credentials included
    pub fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
    }
}

/// Reject requests whose `Origin` is not allow-listed
pub async fn enforce_origin(
    State(allowed): State<AllowedOrigins>,
    request: Request,
    next: Next,
) -> Response {
    let origin = match request.headers().get(header::ORIGIN) {
        None => return next.run(request).await,
        Some(value) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
    };

    if allowed.is_allowed(&origin) {
        next.run(request).await
    } else {
        warn!("Rejected request from disallowed origin {}", origin);
        ApiError::OriginNotAllowed(origin).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_allowed_exact_match() {
        let allowed = AllowedOrigins::new(vec![
            "http://localhost:5200".to_string(),
            "https://share.example.com".to_string(),
        ]);
        assert!(allowed.is_allowed("http://localhost:5200"));
        assert!(allowed.is_allowed("https://share.example.com"));
        assert!(!allowed.is_allowed("https://share.example.com.evil.test"));
        assert!(!allowed.is_allowed("http://localhost:5201"));
    }
}
