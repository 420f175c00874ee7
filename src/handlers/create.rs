use crate::auth::Authenticated;
use crate::error::{ApiError, ErrorResponse};
use crate::jsonapi::{self, EndpointDocument};
use crate::routes;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, StatusCode, header::LOCATION},
    Json,
};

use super::{parse_body, require_jsonapi, resource_url};

/// POST /endpoints handler - Register a new mock endpoint
///
/// Requires `Content-Type: application/vnd.api+json`. The new resource's URL
/// is returned in the `Location` header.
#[utoipa::path(
    post,
    path = routes::ENDPOINTS,
    request_body(content = serde_json::Value, content_type = "application/vnd.api+json",
        description = "JSON:API document with verb, path and response attributes"),
    responses(
        (status = 201, description = "Endpoint created", body = EndpointDocument),
        (status = 400, description = "Malformed JSON body", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API token", body = ErrorResponse),
        (status = 415, description = "Wrong content type", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "endpoints"
)]
pub async fn create_handler(
    _auth: Authenticated,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, [(HeaderName, String); 1], Json<EndpointDocument>), ApiError> {
    require_jsonapi(&headers)?;
    let document = parse_body(&body)?;

    let endpoint = state.registry.create(jsonapi::deserialize(&document)).await?;

    Ok((
        StatusCode::CREATED,
        [(LOCATION, resource_url(&headers, endpoint.id))],
        Json(jsonapi::serialize_one(&endpoint)),
    ))
}
