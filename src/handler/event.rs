use std::collections::HashMap;

use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

use super::HandlerError;

/// Path parameter carrying the user identifier.
pub const USER_ID_PARAM: &str = "userId";

/// API-Gateway-style event as delivered by the invocation runtime.
///
/// Fields we do not use (`httpMethod`, `queryStringParameters`, ...) are
/// ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default)]
    headers: Option<HashMap<String, String>>,
    #[serde(default)]
    path_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    request_context: Option<Value>,
}

/// A request as seen by the permissions handler, independent of transport.
#[derive(Debug, Clone, Default)]
pub struct InvocationEvent {
    pub headers: HeaderMap,
    pub path_parameters: HashMap<String, String>,
    /// Opaque; carried for logging only.
    pub request_context: Option<Value>,
}

impl InvocationEvent {
    pub fn new(headers: HeaderMap, path_parameters: HashMap<String, String>) -> Self {
        Self {
            headers,
            path_parameters,
            request_context: None,
        }
    }

    /// Parse a JSON invocation event. Anything that does not fit the event
    /// shape is an internal error, not a bad request.
    pub fn from_json(value: Value) -> Result<Self, HandlerError> {
        let raw: RawEvent = serde_json::from_value(value)
            .map_err(|e| HandlerError::Internal(format!("Malformed invocation event: {e}")))?;

        Ok(Self {
            headers: header_map(raw.headers.unwrap_or_default())?,
            path_parameters: raw.path_parameters.unwrap_or_default(),
            request_context: raw.request_context,
        })
    }

    /// The `userId` path parameter, if present and not blank.
    pub fn user_id(&self) -> Option<&str> {
        self.path_parameters
            .get(USER_ID_PARAM)
            .map(String::as_str)
            .filter(|id| !id.trim().is_empty())
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.path_parameters
            .insert(USER_ID_PARAM.to_string(), user_id.into());
        self
    }
}

/// Event headers arrive as a plain map whose keys may differ only in case.
/// Keys that are already lowercase are inserted last so they take priority.
/// Mixed-case spellings are applied in byte order, so among those the
/// greatest spelling wins.
fn header_map(headers: HashMap<String, String>) -> Result<HeaderMap, HandlerError> {
    let (lowercase, mut mixed): (Vec<_>, Vec<_>) = headers
        .into_iter()
        .partition(|(name, _)| name.bytes().all(|b| !b.is_ascii_uppercase()));
    mixed.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

    let mut map = HeaderMap::with_capacity(lowercase.len() + mixed.len());
    for (name, value) in mixed.into_iter().chain(lowercase) {
        let header = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            HandlerError::Internal(format!("Malformed invocation event: invalid header name '{name}'"))
        })?;
        let value = HeaderValue::from_str(&value).map_err(|_| {
            HandlerError::Internal(format!(
                "Malformed invocation event: invalid value for header '{name}'"
            ))
        })?;
        map.insert(header, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_full_event() {
        let event = InvocationEvent::from_json(json!({
            "httpMethod": "GET",
            "headers": {"X-API-Key": "k", "Accept": "application/json"},
            "pathParameters": {"userId": "analyst@denodo.com"},
            "requestContext": {"requestId": "abc"}
        }))
        .unwrap();

        assert_eq!(event.headers["x-api-key"], "k");
        assert_eq!(event.user_id(), Some("analyst@denodo.com"));
        assert_eq!(event.request_context.unwrap()["requestId"], "abc");
    }

    #[test]
    fn test_null_maps_are_empty() {
        let event = InvocationEvent::from_json(json!({
            "headers": null,
            "pathParameters": null
        }))
        .unwrap();

        assert!(event.headers.is_empty());
        assert_eq!(event.user_id(), None);
    }

    #[test]
    fn test_lowercase_header_wins_over_mixed_case() {
        let event = InvocationEvent::from_json(json!({
            "headers": {"X-API-Key": "canonical", "x-api-key": "lower"}
        }))
        .unwrap();

        assert_eq!(event.headers.get_all("x-api-key").iter().count(), 1);
        assert_eq!(event.headers["x-api-key"], "lower");
    }

    #[test]
    fn test_mixed_case_duplicates_resolve_in_byte_order() {
        for _ in 0..16 {
            let event = InvocationEvent::from_json(json!({
                "headers": {"X-API-Key": "upper", "X-Api-Key": "title", "x-API-key": "odd"}
            }))
            .unwrap();

            assert_eq!(event.headers.get_all("x-api-key").iter().count(), 1);
            assert_eq!(event.headers["x-api-key"], "odd");
        }
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    fn test_blank_user_id_is_absent(#[case] user_id: &str) {
        let event = InvocationEvent::default().with_user_id(user_id);
        assert_eq!(event.user_id(), None);
    }

    #[rstest]
    #[case::not_an_object(json!("GET /users"))]
    #[case::headers_not_a_map(json!({"headers": ["X-API-Key"]}))]
    #[case::non_string_header(json!({"headers": {"X-API-Key": 42}}))]
    #[case::path_not_a_map(json!({"pathParameters": "analyst@denodo.com"}))]
    #[case::invalid_header_name(json!({"headers": {"bad header": "v"}}))]
    #[case::invalid_header_value(json!({"headers": {"X-API-Key": "line\nbreak"}}))]
    fn test_malformed_events_are_internal_errors(#[case] value: Value) {
        let err = InvocationEvent::from_json(value).unwrap_err();
        assert!(matches!(err, HandlerError::Internal(_)));
        assert!(err.to_string().starts_with("Malformed invocation event"));
    }
}
