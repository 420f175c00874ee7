pub mod create;
pub mod delete;
pub mod dispatch;
pub mod get;
pub mod health;
pub mod list;
pub mod update;

pub use create::create_handler;
pub use delete::delete_handler;
pub use dispatch::dispatch_handler;
pub use get::get_handler;
pub use health::health_handler;
pub use list::list_handler;
pub use update::update_handler;

use axum::body::Bytes;
use axum::http::{HeaderMap, header::{CONTENT_TYPE, HOST}};
use serde_json::Value as JsonValue;

use crate::error::ApiError;
use crate::jsonapi;
use crate::routes;

/// Mutating requests must carry exactly the JSON:API media type
fn require_jsonapi(headers: &HeaderMap) -> Result<(), ApiError> {
    match headers.get(CONTENT_TYPE) {
        Some(value) if value.as_bytes() == jsonapi::MEDIA_TYPE.as_bytes() => Ok(()),
        _ => Err(ApiError::UnsupportedMediaType),
    }
}

/// Parse a request document. A blank body counts as an empty document.
fn parse_body(body: &Bytes) -> Result<JsonValue, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(JsonValue::Object(Default::default()));
    }

    let document: JsonValue = serde_json::from_slice(body).map_err(|_| ApiError::InvalidRequest)?;
    if !document.is_object() {
        return Err(ApiError::InvalidParameters("data".to_string()));
    }
    Ok(document)
}

/// Absolute URL of an endpoint resource when the request names its host
fn resource_url(headers: &HeaderMap, id: impl std::fmt::Display) -> String {
    let path = routes::endpoint_path(id);
    match headers.get(HOST).and_then(|host| host.to_str().ok()) {
        Some(host) => format!("http://{}{}", host, path),
        None => path,
    }
}
