use crate::error::{HealthResponse, UnhealthyResponse};
use crate::routes;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};

/// GET /health - Reports whether the endpoint store answers
#[utoipa::path(
    get,
    path = routes::HEALTH,
    responses(
        (status = 200, description = "Endpoint store reachable", body = HealthResponse),
        (status = 503, description = "Endpoint store unreachable", body = UnhealthyResponse)
    ),
    tag = "health"
)]
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<UnhealthyResponse>)> {
    if let Err(e) = state.registry.store().health_check().await {
        tracing::error!("Endpoint store unreachable: {}", e);
        let body = UnhealthyResponse {
            status: "unhealthy".to_string(),
            error: format!("Cannot reach endpoint store: {}", e),
        };
        return Err((StatusCode::SERVICE_UNAVAILABLE, Json(body)));
    }

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
    }))
}
