//! Client identity and language of incoming requests.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, Extensions, HeaderMap};

use crate::i18n::{parse_accept_language, DEFAULT_LANGUAGE};

/// Key shared by requests whose address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Determine the rate limiting key for a request.
///
/// Uses the peer address of the connection. With `trust_proxy`, the first
/// `X-Forwarded-For` address or `X-Real-IP` takes precedence.
pub fn client_key(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> String {
    let forwarded = if trust_proxy {
        forwarded_address(headers)
    } else {
        None
    };

    forwarded
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_address(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
}

/// Language requested through `Accept-Language`, defaulting to English.
pub fn request_language(headers: &HeaderMap) -> String {
    headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_accept_language)
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

/// Extractor for the request language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lang(pub String);

impl<S> FromRequestParts<S> for Lang
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Lang(request_language(&parts.headers)))
    }
}
