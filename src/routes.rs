// Route path constants - single source of truth for all API paths

pub const HEALTH: &str = "/health";
pub const ENDPOINTS: &str = "/endpoints";
pub const ENDPOINT_ITEM: &str = "/endpoints/{id}";
pub const OPENAPI_JSON: &str = "/api-docs/openapi.json";
pub const SWAGGER_UI: &str = "/swagger-ui";

/// Path of a single endpoint resource
pub fn endpoint_path(id: impl std::fmt::Display) -> String {
    format!("{}/{}", ENDPOINTS, id)
}
