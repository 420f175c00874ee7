use crate::auth::Authenticated;
use crate::error::{ApiError, ErrorResponse};
use crate::jsonapi::{self, EndpointDocument};
use crate::routes;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use super::{parse_body, require_jsonapi};

/// PATCH /endpoints/{id} handler - Update an endpoint
///
/// Only the attributes present in the document are changed.
#[utoipa::path(
    patch,
    path = routes::ENDPOINT_ITEM,
    params(
        ("id" = String, Path, description = "Endpoint id")
    ),
    request_body(content = serde_json::Value, content_type = "application/vnd.api+json",
        description = "JSON:API document with the attributes to change"),
    responses(
        (status = 200, description = "Endpoint updated", body = EndpointDocument),
        (status = 400, description = "Malformed JSON body", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API token", body = ErrorResponse),
        (status = 404, description = "Endpoint not found", body = ErrorResponse),
        (status = 415, description = "Wrong content type", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "endpoints"
)]
pub async fn update_handler(
    _auth: Authenticated,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<EndpointDocument>), ApiError> {
    let existing = state.registry.get(&id).await?;

    require_jsonapi(&headers)?;
    let document = parse_body(&body)?;

    let endpoint = state
        .registry
        .update(&existing, jsonapi::deserialize(&document))
        .await?;

    Ok((StatusCode::OK, Json(jsonapi::serialize_one(&endpoint))))
}
