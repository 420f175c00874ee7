use crate::auth::Authenticated;
use crate::error::{ApiError, ErrorResponse};
use crate::routes;
use crate::state::AppState;
use axum::{extract::Path, extract::State, http::StatusCode};

/// DELETE /endpoints/{id} handler - Remove an endpoint
#[utoipa::path(
    delete,
    path = routes::ENDPOINT_ITEM,
    params(
        ("id" = String, Path, description = "Endpoint id")
    ),
    responses(
        (status = 204, description = "Endpoint deleted"),
        (status = 401, description = "Missing or invalid API token", body = ErrorResponse),
        (status = 404, description = "Endpoint not found", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "endpoints"
)]
pub async fn delete_handler(
    _auth: Authenticated,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
