use utoipa::OpenApi;

use crate::endpoint::{ResponseConfig, Verb};
use crate::error::{ErrorObject, ErrorResponse, HealthResponse, UnhealthyResponse};
use crate::handlers;
use crate::jsonapi::{EndpointCollection, EndpointDocument, EndpointResource, ResourceAttributes};

/// OpenAPI documentation for the management API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "mock-endpoints API",
        version = "1.0.0",
        description = "Register canned HTTP responses and serve them on arbitrary paths. \
            Management routes require an `Authorization: Bearer <token>` header."
    ),
    paths(
        handlers::health::health_handler,
        handlers::list::list_handler,
        handlers::get::get_handler,
        handlers::create::create_handler,
        handlers::update::update_handler,
        handlers::delete::delete_handler
    ),
    components(
        schemas(
            Verb,
            ResponseConfig,
            ResourceAttributes,
            EndpointResource,
            EndpointDocument,
            EndpointCollection,
            ErrorObject,
            ErrorResponse,
            HealthResponse,
            UnhealthyResponse
        )
    ),
    tags(
        (name = "health", description = "Health check operations"),
        (name = "endpoints", description = "Mock endpoint management")
    )
)]
pub struct ApiDoc;
