//! JSON:API translation for endpoint resources.
//!
//! ```json
//! {
//!   "data": {
//!     "type": "endpoints",
//!     "id": "...",
//!     "attributes": {
//!       "verb": "GET",
//!       "path": "/hello",
//!       "response": {"code": 200, "headers": {}, "body": {"message": "Hello"}}
//!     }
//!   }
//! }
//! ```

use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::endpoint::{Endpoint, EndpointAttributes, ResponseConfig, Verb};

/// Media type required on mutating management requests
pub const MEDIA_TYPE: &str = "application/vnd.api+json";

pub const RESOURCE_TYPE: &str = "endpoints";

/// Attributes of an endpoint resource
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ResourceAttributes {
    pub verb: Verb,
    pub path: String,
    pub response: ResponseConfig,
}

/// A single resource object
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct EndpointResource {
    #[serde(rename = "type")]
    #[schema(example = "endpoints")]
    pub resource_type: String,
    pub id: Uuid,
    pub attributes: ResourceAttributes,
}

/// Top-level document holding one endpoint
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct EndpointDocument {
    pub data: EndpointResource,
}

/// Top-level document holding a list of endpoints
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct EndpointCollection {
    pub data: Vec<EndpointResource>,
}

fn resource(endpoint: &Endpoint) -> EndpointResource {
    EndpointResource {
        resource_type: RESOURCE_TYPE.to_string(),
        id: endpoint.id,
        attributes: ResourceAttributes {
            verb: endpoint.verb,
            path: endpoint.path.clone(),
            response: endpoint.response(),
        },
    }
}

pub fn serialize_one(endpoint: &Endpoint) -> EndpointDocument {
    EndpointDocument {
        data: resource(endpoint),
    }
}

/// Serialize a list of endpoints, preserving their order
pub fn serialize_many(endpoints: &[Endpoint]) -> EndpointCollection {
    EndpointCollection {
        data: endpoints.iter().map(resource).collect(),
    }
}

/// Extract the writable attributes from an inbound document.
///
/// A document without an object under `data` yields no attributes at all.
/// Only supplied fields are returned, so partial updates leave the rest alone.
pub fn deserialize(document: &JsonValue) -> EndpointAttributes {
    let Some(data) = document.get("data").and_then(JsonValue::as_object) else {
        return EndpointAttributes::default();
    };
    let Some(attributes) = data.get("attributes").and_then(JsonValue::as_object) else {
        return EndpointAttributes::default();
    };

    let mut attrs = attributes
        .get("response")
        .map(EndpointAttributes::from_response)
        .unwrap_or_default();

    let supplied = |key: &str| attributes.get(key).filter(|v| !v.is_null()).cloned();
    attrs.verb = supplied("verb");
    attrs.path = supplied("path");

    attrs
}
