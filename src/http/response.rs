//! JSON error bodies.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::i18n::Localizer;

/// Errors the HTTP front answers by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TooManyRequests,
    NotFound,
    InternalServerError,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Catalog key of the message shown to clients.
    pub fn message_key(&self) -> &'static str {
        match self {
            ErrorKind::TooManyRequests => "too_many_requests",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InternalServerError => "internal_server_error",
        }
    }
}

/// Error body: `{"code": 429, "message": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    #[serde(skip)]
    retry_after: Option<Duration>,
}

impl ApiError {
    /// Build the body for `kind` with its message in `lang`.
    pub fn localized(kind: ErrorKind, localizer: &Localizer, lang: &str) -> Self {
        Self {
            code: kind.status().as_u16(),
            message: localizer.localize(kind.message_key(), lang),
            retry_after: None,
        }
    }

    /// Attach a `Retry-After` hint, rounded up to whole seconds.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = self.retry_after;
        let mut response = (status, Json(self)).into_response();

        if let Some(wait) = retry_after {
            let secs = wait.as_secs_f64().ceil().max(1.0) as u64;
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}
