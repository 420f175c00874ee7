use crate::auth::Authenticated;
use crate::error::{ApiError, ErrorResponse};
use crate::jsonapi::{self, EndpointCollection};
use crate::routes;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};

/// GET /endpoints handler - List all registered endpoints in creation order
#[utoipa::path(
    get,
    path = routes::ENDPOINTS,
    responses(
        (status = 200, description = "All registered endpoints", body = EndpointCollection),
        (status = 401, description = "Missing or invalid API token", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "endpoints"
)]
pub async fn list_handler(
    _auth: Authenticated,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<EndpointCollection>), ApiError> {
    let endpoints = state.registry.list().await?;

    tracing::info!("Listed {} endpoints", endpoints.len());
    Ok((StatusCode::OK, Json(jsonapi::serialize_many(&endpoints))))
}
