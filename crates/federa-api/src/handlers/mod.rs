//! API request handlers

pub mod admin;
pub mod authorize;
pub mod discovery;
pub mod health;
pub mod logout;
pub mod userinfo;

pub use health::*;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// `302 Found` to `location`, or to `fallback` when `location` cannot be
/// sent as a header value.
pub(crate) fn found(location: &str, fallback: &str) -> Response {
    let value = HeaderValue::from_str(location).or_else(|_| {
        tracing::warn!("Redirect target is not header-safe, using {}", fallback);
        HeaderValue::from_str(fallback)
    });
    match value {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::error!("Fallback redirect target is not header-safe");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
