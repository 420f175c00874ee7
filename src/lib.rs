//! HTTP server that serves canned responses registered through a management API.
//!
//! `/endpoints` is a token-protected JSON:API resource for registering
//! (verb, path, response) triples. Every request not claimed by a management
//! route is looked up by exact method and path and answered with the stored response.

pub mod api_doc;
pub mod auth;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod jsonapi;
pub mod registry;
pub mod routes;
pub mod state;
pub mod store;

use axum::{
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_doc::ApiDoc;
use handlers::{
    create_handler, delete_handler, dispatch_handler, get_handler, health_handler, list_handler,
    update_handler,
};
use state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route(routes::HEALTH, get(health_handler))
        .route(routes::ENDPOINTS, get(list_handler).post(create_handler))
        .route(
            routes::ENDPOINT_ITEM,
            get(get_handler).patch(update_handler).delete(delete_handler),
        )
        .merge(SwaggerUi::new(routes::SWAGGER_UI).url(routes::OPENAPI_JSON, ApiDoc::openapi()))
        .method_not_allowed_fallback(dispatch_handler)
        .fallback(dispatch_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
