use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Method, StatusCode, Uri, header::CONTENT_TYPE},
    response::Response,
};

/// Catch-all handler - Replay the response registered for this method and path
///
/// Matching is exact on method and path. Unauthenticated, and no content-type rules.
pub async fn dispatch_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Result<Response, ApiError> {
    let path = uri.path();

    let Some(endpoint) = state.registry.resolve(method.as_str(), path).await? else {
        tracing::info!("No endpoint registered for {} {}", method, path);
        return Err(ApiError::PageNotFound(path.to_string()));
    };

    let status = StatusCode::from_u16(endpoint.response_code)
        .map_err(|e| anyhow::anyhow!("endpoint {} has invalid status: {}", endpoint.id, e))?;

    // stored text goes out as is, never re-serialized
    let body = endpoint.response_body.clone().unwrap_or_default();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in &endpoint.response_headers {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!("Skipping invalid header {:?} on endpoint {}", name, endpoint.id),
        }
    }

    tracing::info!("Dispatched {} {} -> {}", method, path, status.as_u16());
    Ok(response)
}
