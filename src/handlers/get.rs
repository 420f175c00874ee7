use crate::auth::Authenticated;
use crate::error::{ApiError, ErrorResponse};
use crate::jsonapi::{self, EndpointDocument};
use crate::routes;
use crate::state::AppState;
use axum::{extract::Path, extract::State, http::StatusCode, Json};

/// GET /endpoints/{id} handler - Retrieve a single endpoint
#[utoipa::path(
    get,
    path = routes::ENDPOINT_ITEM,
    params(
        ("id" = String, Path, description = "Endpoint id")
    ),
    responses(
        (status = 200, description = "Endpoint found", body = EndpointDocument),
        (status = 401, description = "Missing or invalid API token", body = ErrorResponse),
        (status = 404, description = "Endpoint not found", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "endpoints"
)]
pub async fn get_handler(
    _auth: Authenticated,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<EndpointDocument>), ApiError> {
    let endpoint = state.registry.get(&id).await?;

    tracing::info!("Retrieved endpoint {}", endpoint.id);
    Ok((StatusCode::OK, Json(jsonapi::serialize_one(&endpoint))))
}
