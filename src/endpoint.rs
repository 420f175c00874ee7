use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use axum::http::{HeaderName, HeaderValue};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::routes;

/// Paths owned by the management API that can never be registered
pub const RESERVED_PATHS: &[&str] = &[routes::ENDPOINTS];

static PATH_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A/[a-zA-Z0-9_/-]*\z").expect("path pattern is valid"));

/// HTTP methods an endpoint can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub const ALL: [Verb; 5] = [Verb::Get, Verb::Post, Verb::Put, Verb::Patch, Verb::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP verb: {0}")]
pub struct UnknownVerb(pub String);

impl FromStr for Verb {
    type Err = UnknownVerb;

    // Matching is case-sensitive: "get" is not a registered verb.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|verb| verb.as_str() == s)
            .ok_or_else(|| UnknownVerb(s.to_string()))
    }
}

/// A stored response body, either a JSON document or arbitrary text
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(JsonValue),
    Raw(String),
}

impl ResponseBody {
    /// Decode stored text. JSON documents come back structured, anything else verbatim.
    pub fn decode(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Raw(text.to_string()),
        }
    }

    /// Encode a client-supplied value for storage. Strings are kept verbatim,
    /// every other value is stored as its JSON text.
    pub fn encode(value: &JsonValue) -> String {
        match value {
            JsonValue::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

impl Serialize for ResponseBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResponseBody::Json(value) => value.serialize(serializer),
            ResponseBody::Raw(text) => serializer.serialize_str(text),
        }
    }
}

/// The canned response of an endpoint as exposed to clients
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ResponseConfig {
    pub code: u16,
    pub headers: BTreeMap<String, String>,
    #[schema(value_type = Object)]
    pub body: Option<ResponseBody>,
}

/// A registered endpoint as persisted in the store
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub id: Uuid,
    pub verb: Verb,
    pub path: String,
    pub response_code: u16,
    pub response_headers: BTreeMap<String, String>,
    pub response_body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Endpoint {
    /// Full response configuration with the body decoded from its stored text
    pub fn response(&self) -> ResponseConfig {
        ResponseConfig {
            code: self.response_code,
            headers: self.response_headers.clone(),
            body: self.body(),
        }
    }

    pub fn body(&self) -> Option<ResponseBody> {
        self.response_body
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .map(ResponseBody::decode)
    }
}

/// Attributes extracted from an inbound document. `None` means "not supplied".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointAttributes {
    pub verb: Option<JsonValue>,
    pub path: Option<JsonValue>,
    pub response_code: Option<JsonValue>,
    pub response_headers: Option<JsonValue>,
    pub response_body: Option<String>,
}

impl EndpointAttributes {
    /// Attributes carried by a `{code, headers, body}` structure.
    ///
    /// Non-object input yields nothing and only supplied keys are set. A blank
    /// body is treated as not supplied, so it never clears a stored body.
    pub fn from_response(value: &JsonValue) -> Self {
        let Some(response) = value.as_object() else {
            return Self::default();
        };
        let supplied = |key: &str| response.get(key).filter(|v| !v.is_null()).cloned();

        Self {
            response_code: supplied("code"),
            response_headers: supplied("headers"),
            response_body: response
                .get("body")
                .filter(|v| !is_blank(v))
                .map(ResponseBody::encode),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Verb,
    Path,
    ResponseCode,
    ResponseHeaders,
}

impl Field {
    fn human_name(self) -> &'static str {
        match self {
            Field::Verb => "Verb",
            Field::Path => "Path",
            Field::ResponseCode => "Response code",
            Field::ResponseHeaders => "Response headers",
        }
    }
}

/// A single failed validation rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn route_conflict() -> Self {
        Self::new(Field::Path, "and verb combination must be unique")
    }

    pub fn full_message(&self) -> String {
        format!("{} {}", self.field.human_name(), self.message)
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_message())
    }
}

/// Unvalidated endpoint state: a new record or an existing one with pending changes.
///
/// Values are kept as raw JSON so that malformed client input surfaces as
/// field errors instead of decode failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointDraft {
    id: Option<Uuid>,
    created_at: Option<DateTime<Utc>>,
    pub verb: Option<JsonValue>,
    pub path: Option<JsonValue>,
    pub response_code: Option<JsonValue>,
    pub response_headers: Option<JsonValue>,
    pub response_body: Option<String>,
}

impl From<&Endpoint> for EndpointDraft {
    fn from(endpoint: &Endpoint) -> Self {
        let headers = endpoint
            .response_headers
            .iter()
            .map(|(name, value)| (name.clone(), JsonValue::String(value.clone())))
            .collect();

        Self {
            id: Some(endpoint.id),
            created_at: Some(endpoint.created_at),
            verb: Some(JsonValue::String(endpoint.verb.to_string())),
            path: Some(JsonValue::String(endpoint.path.clone())),
            response_code: Some(JsonValue::from(endpoint.response_code)),
            response_headers: Some(JsonValue::Object(headers)),
            response_body: endpoint.response_body.clone(),
        }
    }
}

impl EndpointDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    /// Overwrite the fields present in `attrs`, leaving the rest untouched
    pub fn assign(&mut self, attrs: EndpointAttributes) {
        let EndpointAttributes {
            verb,
            path,
            response_code,
            response_headers,
            response_body,
        } = attrs;

        if verb.is_some() {
            self.verb = verb;
        }
        if path.is_some() {
            self.path = path;
        }
        if response_code.is_some() {
            self.response_code = response_code;
        }
        if response_headers.is_some() {
            self.response_headers = response_headers;
        }
        if response_body.is_some() {
            self.response_body = response_body;
        }
    }

    /// The (verb, path) pair this draft would occupy, when both are strings
    pub fn route_key(&self) -> Option<(&str, &str)> {
        let verb = self.verb.as_ref()?.as_str()?;
        let path = self.path.as_ref()?.as_str()?;
        Some((verb, path))
    }

    /// Check every field rule that does not need the store
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        validate_verb(self.verb.as_ref(), &mut errors);
        validate_path(self.path.as_ref(), &mut errors);
        validate_response_code(self.response_code.as_ref(), &mut errors);
        validate_response_headers(self.response_headers.as_ref(), &mut errors);
        errors
    }

    /// Turn the draft into a persistable endpoint, assigning an id on first save
    pub fn into_endpoint(self) -> Result<Endpoint, Vec<FieldError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        // validate() guarantees every conversion below succeeds
        let verb = self
            .verb
            .as_ref()
            .and_then(JsonValue::as_str)
            .and_then(|v| v.parse::<Verb>().ok());
        let path = self.path.as_ref().and_then(JsonValue::as_str);
        let code = self.response_code.as_ref().map(integer_code);
        let (Some(verb), Some(path), Some(Ok(code))) = (verb, path, code) else {
            return Err(errors);
        };
        let Ok(response_code) = u16::try_from(code) else {
            return Err(errors);
        };

        let response_headers = match &self.response_headers {
            Some(JsonValue::Object(map)) => map
                .iter()
                .filter_map(|(name, value)| Some((name.clone(), value.as_str()?.to_string())))
                .collect(),
            _ => BTreeMap::new(),
        };

        let now = Utc::now();
        Ok(Endpoint {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            verb,
            path: path.to_string(),
            response_code,
            response_headers,
            response_body: self.response_body,
            created_at: self.created_at.unwrap_or(now),
            updated_at: now,
        })
    }
}

fn is_blank(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null | JsonValue::Bool(false) => true,
        JsonValue::String(text) => text.trim().is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn validate_verb(verb: Option<&JsonValue>, errors: &mut Vec<FieldError>) {
    match verb {
        None => errors.push(FieldError::new(Field::Verb, "can't be blank")),
        Some(value) if is_blank(value) => {
            errors.push(FieldError::new(Field::Verb, "can't be blank"))
        }
        Some(value) => {
            if value.as_str().and_then(|v| v.parse::<Verb>().ok()).is_none() {
                errors.push(FieldError::new(Field::Verb, "is not included in the list"));
            }
        }
    }
}

fn validate_path(path: Option<&JsonValue>, errors: &mut Vec<FieldError>) {
    let value = match path {
        Some(value) if !is_blank(value) => value,
        _ => {
            errors.push(FieldError::new(Field::Path, "can't be blank"));
            return;
        }
    };

    let Some(path) = value.as_str().filter(|p| PATH_FORMAT.is_match(p)) else {
        errors.push(FieldError::new(
            Field::Path,
            "must start with / and can only contain letters, numbers, underscores, and hyphens",
        ));
        return;
    };

    if RESERVED_PATHS.contains(&path) {
        errors.push(FieldError::new(
            Field::Path,
            format!("cannot use reserved path {}", path),
        ));
    }
}

/// Ok(code) for integer input, Err(message) for anything else that is present
fn integer_code(value: &JsonValue) -> Result<i64, &'static str> {
    match value {
        JsonValue::Number(number) => number.as_i64().ok_or("must be an integer"),
        JsonValue::String(text) => {
            let text = text.trim();
            if let Ok(code) = text.parse::<i64>() {
                Ok(code)
            } else if text.parse::<f64>().is_ok() {
                Err("must be an integer")
            } else {
                Err("is not a number")
            }
        }
        _ => Err("is not a number"),
    }
}

fn validate_response_code(code: Option<&JsonValue>, errors: &mut Vec<FieldError>) {
    let value = match code {
        Some(value) if !value.is_null() && value.as_str().is_none_or(|s| !s.trim().is_empty()) => {
            value
        }
        _ => {
            errors.push(FieldError::new(Field::ResponseCode, "can't be blank"));
            return;
        }
    };

    match integer_code(value) {
        Err(message) => errors.push(FieldError::new(Field::ResponseCode, message)),
        Ok(code) if code < 100 => errors.push(FieldError::new(
            Field::ResponseCode,
            "must be greater than or equal to 100",
        )),
        Ok(code) if code >= 600 => {
            errors.push(FieldError::new(Field::ResponseCode, "must be less than 600"))
        }
        Ok(_) => {}
    }
}

fn validate_response_headers(headers: Option<&JsonValue>, errors: &mut Vec<FieldError>) {
    let map = match headers {
        None | Some(JsonValue::Null) => return,
        Some(JsonValue::Object(map)) => map,
        Some(_) => {
            errors.push(FieldError::new(Field::ResponseHeaders, "must be an object"));
            return;
        }
    };

    for (name, value) in map {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(FieldError::new(
                Field::ResponseHeaders,
                format!("contain an invalid header name: {}", name),
            ));
            return;
        }
        let valid_value = value
            .as_str()
            .is_some_and(|v| HeaderValue::from_str(v).is_ok());
        if !valid_value {
            errors.push(FieldError::new(
                Field::ResponseHeaders,
                format!("must map {} to a valid string value", name),
            ));
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_draft() -> EndpointDraft {
        let mut draft = EndpointDraft::new();
        draft.verb = Some(json!("GET"));
        draft.path = Some(json!("/test"));
        draft.assign(EndpointAttributes::from_response(&json!({
            "code": 200,
            "body": {"message": "test response"},
            "headers": {"Content-Type": "application/vnd.api+json"}
        })));
        draft
    }

    fn messages(errors: &[FieldError]) -> Vec<String> {
        errors.iter().map(FieldError::full_message).collect()
    }

    #[test]
    fn test_valid_paths() {
        for path in [
            "/valid/path",
            "/path-with-hyphens",
            "/path_with_underscore",
            "/path/with/multiple/segments",
            "/123/numeric",
            "/endpoints-test",
            "/endpoints/nested",
        ] {
            let mut draft = valid_draft();
            draft.path = Some(json!(path));
            assert!(draft.validate().is_empty(), "{} should be valid", path);
        }
    }

    #[test]
    fn test_invalid_paths() {
        for path in [
            json!("path-without-slash"),
            json!("/path with spaces"),
            json!("/path$special@chars"),
            json!(""),
            JsonValue::Null,
            json!(42),
        ] {
            let mut draft = valid_draft();
            draft.path = Some(path.clone());
            let errors = draft.validate();
            assert!(
                errors.iter().any(|e| e.field == Field::Path),
                "{} should be rejected",
                path
            );
        }
    }

    #[test]
    fn test_reserved_path_rejected() {
        let mut draft = valid_draft();
        draft.path = Some(json!("/endpoints"));
        assert_eq!(
            messages(&draft.validate()),
            vec!["Path cannot use reserved path /endpoints"]
        );
    }

    #[test]
    fn test_verbs() {
        for verb in ["GET", "POST", "PUT", "PATCH", "DELETE"] {
            let mut draft = valid_draft();
            draft.verb = Some(json!(verb));
            assert!(draft.validate().is_empty(), "{} should be valid", verb);
        }

        for verb in [json!("INVALID"), json!("get"), json!(""), JsonValue::Null] {
            let mut draft = valid_draft();
            draft.verb = Some(verb.clone());
            let errors = draft.validate();
            assert_eq!(errors.len(), 1, "{} should be rejected", verb);
            assert_eq!(errors[0].field, Field::Verb);
        }
    }

    #[test]
    fn test_missing_fields_reported_individually() {
        let errors = EndpointDraft::new().validate();
        assert_eq!(
            messages(&errors),
            vec![
                "Verb can't be blank",
                "Path can't be blank",
                "Response code can't be blank"
            ]
        );
    }

    #[test]
    fn test_response_code_range() {
        for code in [99, 600, 1000, -1] {
            let mut draft = valid_draft();
            draft.response_code = Some(json!(code));
            let errors = draft.validate();
            assert_eq!(errors.len(), 1, "{} should be rejected", code);
            assert_eq!(errors[0].field, Field::ResponseCode);
        }

        for code in [100, 200, 404, 500, 599] {
            let mut draft = valid_draft();
            draft.response_code = Some(json!(code));
            assert!(draft.validate().is_empty(), "{} should be valid", code);
        }
    }

    #[test]
    fn test_response_code_type_checks() {
        let cases = [
            (json!("201"), None),
            (json!(200.5), Some("Response code must be an integer")),
            (json!("12.5"), Some("Response code must be an integer")),
            (json!("abc"), Some("Response code is not a number")),
            (json!(true), Some("Response code is not a number")),
            (json!(""), Some("Response code can't be blank")),
        ];

        for (code, expected) in cases {
            let mut draft = valid_draft();
            draft.response_code = Some(code.clone());
            let errors = messages(&draft.validate());
            match expected {
                None => assert!(errors.is_empty(), "{} should be valid", code),
                Some(message) => assert_eq!(errors, vec![message.to_string()]),
            }
        }
    }

    #[test]
    fn test_response_headers_must_be_string_map() {
        let mut draft = valid_draft();
        draft.response_headers = Some(json!(["X-Test"]));
        assert_eq!(
            messages(&draft.validate()),
            vec!["Response headers must be an object"]
        );

        draft.response_headers = Some(json!({"X-Count": 5}));
        assert_eq!(draft.validate().len(), 1);

        draft.response_headers = Some(json!({"bad header": "x"}));
        assert_eq!(draft.validate().len(), 1);

        draft.response_headers = Some(json!({"X-Ok": "fine"}));
        assert!(draft.validate().is_empty());
    }

    #[test]
    fn test_into_endpoint_assigns_id_and_types() {
        let endpoint = valid_draft().into_endpoint().unwrap();

        assert_eq!(endpoint.verb, Verb::Get);
        assert_eq!(endpoint.path, "/test");
        assert_eq!(endpoint.response_code, 200);
        assert_eq!(
            endpoint.response_headers.get("Content-Type").map(String::as_str),
            Some("application/vnd.api+json")
        );
        assert_eq!(endpoint.created_at, endpoint.updated_at);
    }

    #[test]
    fn test_into_endpoint_keeps_identity_of_existing_record() {
        let endpoint = valid_draft().into_endpoint().unwrap();

        let mut draft = EndpointDraft::from(&endpoint);
        draft.assign(EndpointAttributes::from_response(&json!({"code": 201})));
        let updated = draft.into_endpoint().unwrap();

        assert_eq!(updated.id, endpoint.id);
        assert_eq!(updated.created_at, endpoint.created_at);
        assert_eq!(updated.response_code, 201);
        assert_eq!(updated.response_body, endpoint.response_body);
    }

    #[test]
    fn test_into_endpoint_returns_errors() {
        let mut draft = valid_draft();
        draft.verb = Some(json!("INVALID"));
        let errors = draft.into_endpoint().unwrap_err();
        assert_eq!(messages(&errors), vec!["Verb is not included in the list"]);
    }

    #[test]
    fn test_response_decodes_json_body() {
        let mut endpoint = valid_draft().into_endpoint().unwrap();
        endpoint.response_headers =
            BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())]);
        endpoint.response_body = Some(json!({"message": "test"}).to_string());

        let response = endpoint.response();
        assert_eq!(response.code, 200);
        assert_eq!(response.headers["Content-Type"], "application/json");
        assert_eq!(
            response.body,
            Some(ResponseBody::Json(json!({"message": "test"})))
        );
    }

    #[test]
    fn test_response_returns_raw_text_unchanged() {
        let mut endpoint = valid_draft().into_endpoint().unwrap();
        endpoint.response_body = Some("<html>not json</html>".to_string());
        assert_eq!(
            endpoint.response().body,
            Some(ResponseBody::Raw("<html>not json</html>".to_string()))
        );

        endpoint.response_body = Some("   ".to_string());
        assert_eq!(endpoint.response().body, None);
    }

    #[test]
    fn test_response_headers_default_to_empty() {
        let mut draft = valid_draft();
        draft.response_headers = None;
        let endpoint = draft.into_endpoint().unwrap();
        assert!(endpoint.response().headers.is_empty());
    }

    #[test]
    fn test_from_response_writes_supplied_fields() {
        let mut draft = valid_draft();
        draft.assign(EndpointAttributes::from_response(&json!({
            "code": 404,
            "headers": {"X-Error": "true"},
            "body": {"error": "not found"}
        })));

        assert_eq!(draft.response_code, Some(json!(404)));
        assert_eq!(draft.response_headers, Some(json!({"X-Error": "true"})));
        let body: JsonValue = serde_json::from_str(draft.response_body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"error": "not found"}));
    }

    #[test]
    fn test_from_response_stores_strings_verbatim() {
        let mut draft = valid_draft();
        draft.assign(EndpointAttributes::from_response(&json!({"body": "plain text"})));
        assert_eq!(draft.response_body.as_deref(), Some("plain text"));
        assert_eq!(draft.response_code, Some(json!(200)));
    }

    #[test]
    fn test_from_response_ignores_blank_body_and_non_objects() {
        let mut draft = valid_draft();
        let before = draft.clone();

        draft.assign(EndpointAttributes::from_response(&json!({"body": ""})));
        draft.assign(EndpointAttributes::from_response(&json!({"body": {}})));
        draft.assign(EndpointAttributes::from_response(&json!({"body": null})));
        draft.assign(EndpointAttributes::from_response(&json!("not a map")));
        draft.assign(EndpointAttributes::from_response(&json!([1, 2, 3])));

        assert_eq!(draft, before);
    }

    #[test]
    fn test_assign_only_overwrites_supplied_attributes() {
        let mut draft = valid_draft();
        draft.assign(EndpointAttributes {
            path: Some(json!("/other")),
            ..Default::default()
        });

        assert_eq!(draft.path, Some(json!("/other")));
        assert_eq!(draft.verb, Some(json!("GET")));
        assert_eq!(draft.route_key(), Some(("GET", "/other")));
    }

    #[test]
    fn test_response_body_encoding() {
        assert_eq!(ResponseBody::encode(&json!("raw")), "raw");
        assert_eq!(ResponseBody::encode(&json!({"a": [1, 2]})), r#"{"a":[1,2]}"#);
        assert_eq!(ResponseBody::encode(&json!(12)), "12");
        assert_eq!(
            serde_json::to_value(ResponseBody::Raw("hi".to_string())).unwrap(),
            json!("hi")
        );
    }
}
