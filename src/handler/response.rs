use std::collections::BTreeMap;

use axum::{
    body::Body,
    response::{IntoResponse, Response},
};
use http::{
    HeaderName, HeaderValue, StatusCode,
    header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE},
};
use serde::Serialize;

use super::HandlerError;

/// Body used if even the error body cannot be serialized.
const FALLBACK_ERROR_BODY: &str =
    "{\n  \"error\": \"Internal Server Error\",\n  \"message\": \"Failed to serialize error response\"\n}";

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

/// A fully shaped response: status, headers and a pretty-printed JSON body.
///
/// Produced by the request handler on every path and rendered either as an
/// HTTP response or as an [`InvocationResponse`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: String,
}

impl ApiResponse {
    /// 200 with `value` as the body. Successful responses must not be cached.
    pub fn ok<T: Serialize + ?Sized>(value: &T) -> Result<Self, HandlerError> {
        let body = serde_json::to_string_pretty(value)?;
        let mut headers = base_headers();
        headers.push((CACHE_CONTROL, HeaderValue::from_static("no-cache")));

        Ok(Self {
            status: StatusCode::OK,
            headers,
            body,
        })
    }

    pub fn error(err: &HandlerError) -> Self {
        let message = err.to_string();
        let body = serde_json::to_string_pretty(&ErrorBody {
            error: err.error_name(),
            message: &message,
        })
        .unwrap_or_else(|_| FALLBACK_ERROR_BODY.to_string());

        Self {
            status: err.status(),
            headers: base_headers(),
            body,
        }
    }

    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    pub fn into_invocation(self) -> InvocationResponse {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    canonical_header_name(name),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        InvocationResponse {
            status_code: self.status.as_u16(),
            headers,
            body: self.body,
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}

/// API-Gateway-style response returned to event invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

fn base_headers() -> Vec<(HeaderName, HeaderValue)> {
    vec![
        (CONTENT_TYPE, HeaderValue::from_static("application/json")),
        (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
    ]
}

/// `content-type` → `Content-Type`.
fn canonical_header_name(name: &HeaderName) -> String {
    name.as_str()
        .split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn test_ok_is_pretty_printed_with_no_cache() {
        let response = ApiResponse::ok(&json!({"userId": "a", "roles": ["viewer"]})).unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.contains("\n  \"userId\": \"a\""));
        assert_eq!(response.header(&CACHE_CONTROL).unwrap().to_str().unwrap(), "no-cache");
        assert_eq!(response.header(&CONTENT_TYPE).unwrap().to_str().unwrap(), "application/json");
        assert_eq!(response.header(&ACCESS_CONTROL_ALLOW_ORIGIN).unwrap().to_str().unwrap(), "*");
    }

    #[test]
    fn test_error_body_shape() {
        let response = ApiResponse::error(&HandlerError::Unauthorized);
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert!(response.header(&CACHE_CONTROL).is_none());
        assert!(response.header(&CONTENT_TYPE).is_some());
        assert!(response.header(&ACCESS_CONTROL_ALLOW_ORIGIN).is_some());

        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(
            body,
            json!({"error": "Unauthorized", "message": "Invalid or missing API key"})
        );
    }

    #[test]
    fn test_fallback_error_body_is_valid_json() {
        let body: Value = serde_json::from_str(FALLBACK_ERROR_BODY).unwrap();
        assert_eq!(body["error"], "Internal Server Error");
    }

    #[test]
    fn test_invocation_response_uses_canonical_header_names() {
        let invocation = ApiResponse::ok(&json!({})).unwrap().into_invocation();

        assert_eq!(invocation.status_code, 200);
        assert_eq!(invocation.headers["Content-Type"], "application/json");
        assert_eq!(invocation.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(invocation.headers["Cache-Control"], "no-cache");

        let serialized = serde_json::to_value(&invocation).unwrap();
        assert_eq!(serialized["statusCode"], 200);
        assert_eq!(serialized["body"], "{}");
    }

    #[test]
    fn test_into_response_keeps_status_and_headers() {
        let response = ApiResponse::error(&HandlerError::missing_user_id()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
