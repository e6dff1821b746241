//! Response envelope
//!
//! Wraps both HTTP-level responses and transport-level failures in one
//! shape, so the retry logic in the pipeline can treat them uniformly.
//! Also parses the API's structured error list into a normalized,
//! human-readable message.

use crate::error::{Error, Result};
use crate::types::{JsonValue, Method, StringMap};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

/// Matches the detail segment of gRPC-style `Status(... Detail="…")`
/// messages some backends bubble up verbatim.
static STATUS_DETAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"Detail="([^"\\]*(?:\\.[^"\\]*)*)""#).expect("valid regex"));

/// Category of a transport-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    /// Name resolution failed; usually transient
    Dns,
    /// TCP/TLS connection failed
    Connect,
    /// The configured timeout elapsed
    Timeout,
    /// Anything else below the HTTP layer
    Other,
}

/// A failure below the HTTP layer, captured as response state rather
/// than thrown
#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    pub message: String,
}

impl TransportFailure {
    /// Classify a reqwest error into a transport failure
    pub fn classify(err: &reqwest::Error) -> Self {
        let message = err.to_string();
        let kind = if err.is_timeout() {
            TransportFailureKind::Timeout
        } else if err.is_connect() {
            if message.to_ascii_lowercase().contains("dns") {
                TransportFailureKind::Dns
            } else {
                TransportFailureKind::Connect
            }
        } else {
            TransportFailureKind::Other
        };
        Self { kind, message }
    }

    /// Transient failures are worth retrying without caller involvement
    pub fn is_transient(&self) -> bool {
        self.kind == TransportFailureKind::Dns
    }
}

/// One entry of the API's structured error list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorDetail {
    pub code: i64,
    pub message: String,
}

/// The response to one logical call.
///
/// Always constructed, never thrown: transport failures appear with
/// `status == -1` and a `transport_failure` classification so the retry
/// path can inspect them like any other non-successful response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub method: Method,
    pub url: String,
    pub ok: bool,
    /// HTTP status, or -1 for a transport failure
    pub status: i32,
    pub status_text: String,
    pub headers: StringMap,
    /// Raw body text
    pub body: String,
    /// Parsed body, when it is valid JSON
    pub json: Option<JsonValue>,
    /// Structured error list parsed from the body
    pub errors: Vec<ApiErrorDetail>,
    /// Error messages joined for humans, trailing punctuation trimmed
    pub error_messages: String,
    /// Final URL when the transport followed redirects
    pub redirected_to: Option<String>,
    pub transport_failure: Option<TransportFailure>,
}

impl ApiResponse {
    /// Build from an HTTP-level response
    pub fn from_http(
        method: Method,
        url: impl Into<String>,
        status: StatusCode,
        headers: StringMap,
        body: String,
        redirected_to: Option<String>,
    ) -> Self {
        let ok = status.is_success();
        let json: Option<JsonValue> = serde_json::from_str(&body).ok();

        // Only a structured error list gets message normalization; a raw
        // failure body passes through untouched.
        let (errors, error_messages) = match json.as_ref().and_then(|j| j.get("errors")) {
            Some(JsonValue::Array(raw)) => {
                let errors: Vec<ApiErrorDetail> = raw.iter().filter_map(parse_error).collect();
                let messages = join_messages(&errors);
                (errors, messages)
            }
            _ if !ok => (
                vec![ApiErrorDetail {
                    code: -1,
                    message: body.clone(),
                }],
                body.clone(),
            ),
            _ => (Vec::new(), String::new()),
        };

        Self {
            method,
            url: url.into(),
            ok,
            status: i32::from(status.as_u16()),
            status_text: status
                .canonical_reason()
                .unwrap_or("Unknown Status")
                .to_string(),
            headers,
            body,
            json,
            errors,
            error_messages,
            redirected_to,
            transport_failure: None,
        }
    }

    /// Build from a transport-level failure
    pub fn from_transport_failure(
        method: Method,
        url: impl Into<String>,
        err: &reqwest::Error,
    ) -> Self {
        let failure = TransportFailure::classify(err);
        let message = failure.message.clone();
        Self {
            method,
            url: url.into(),
            ok: false,
            status: -1,
            status_text: format!("{:?}", failure.kind),
            headers: StringMap::new(),
            body: message.clone(),
            json: None,
            errors: vec![ApiErrorDetail { code: -1, message: message.clone() }],
            error_messages: message,
            redirected_to: None,
            transport_failure: Some(failure),
        }
    }

    /// Header lookup, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the server signalled rate limiting
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Deserialize the body into a typed value
    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(Error::from)
    }

    /// Convert a non-successful response into the error surfaced to the
    /// caller
    pub fn into_error(self) -> Error {
        let messages = if self.error_messages.is_empty() {
            format!("{} {}", self.status, self.status_text)
        } else {
            self.error_messages
        };
        Error::Request {
            status: self.status,
            status_text: self.status_text,
            url: self.url,
            messages,
        }
    }
}

/// Parse one entry of the structured error list.
///
/// Entries come in three shapes: a bare string, a bare code, or an
/// object with `code`/`message` fields.
fn parse_error(raw: &JsonValue) -> Option<ApiErrorDetail> {
    match raw {
        JsonValue::String(message) => Some(ApiErrorDetail {
            code: -1,
            message: message.clone(),
        }),
        JsonValue::Number(code) => {
            let code = code.as_i64().unwrap_or(-1);
            Some(ApiErrorDetail {
                code,
                message: format!("Something went wrong (Code: {code})"),
            })
        }
        JsonValue::Object(fields) => {
            let code = fields.get("code").and_then(JsonValue::as_i64).unwrap_or(-1);
            let mut message = fields
                .get("message")
                .and_then(JsonValue::as_str)
                .unwrap_or("Something went wrong")
                .to_string();
            if message.starts_with("Status(") {
                if let Some(detail) = STATUS_DETAIL
                    .captures(&message)
                    .and_then(|caps| caps.get(1))
                {
                    message = detail.as_str().to_string();
                }
            }
            Some(ApiErrorDetail { code, message })
        }
        _ => None,
    }
}

/// Join error messages for humans, trimming one trailing punctuation
/// mark per entry
fn join_messages(errors: &[ApiErrorDetail]) -> String {
    errors
        .iter()
        .map(|error| {
            let trimmed = error
                .message
                .strip_suffix(['.', '!', '?', ',', ';'])
                .unwrap_or(&error.message);
            if trimmed.is_empty() {
                "Something went wrong"
            } else {
                trimmed
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response_with_body(status: StatusCode, body: &str) -> ApiResponse {
        ApiResponse::from_http(
            Method::GET,
            "https://users.example.com/v1/users/1",
            status,
            StringMap::new(),
            body.to_string(),
            None,
        )
    }

    #[test]
    fn test_success_parses_json() {
        let res = response_with_body(StatusCode::OK, r#"{"id": 1, "name": "builder"}"#);
        assert!(res.ok);
        assert_eq!(res.status, 200);
        assert_eq!(res.json.as_ref().unwrap()["name"], json!("builder"));
        assert!(res.errors.is_empty());
        assert_eq!(res.error_messages, "");
    }

    #[test]
    fn test_error_list_parsing() {
        let body = json!({
            "errors": [
                {"code": 4, "message": "Invalid birthday."},
                "flat message!",
                7,
            ]
        })
        .to_string();
        let res = response_with_body(StatusCode::BAD_REQUEST, &body);

        assert_eq!(res.errors.len(), 3);
        assert_eq!(res.errors[0].code, 4);
        assert_eq!(res.errors[0].message, "Invalid birthday.");
        assert_eq!(res.errors[1].code, -1);
        assert_eq!(res.errors[2].code, 7);
        assert_eq!(
            res.error_messages,
            "Invalid birthday, flat message, Something went wrong (Code: 7)"
        );
    }

    #[test]
    fn test_status_detail_unwrapping() {
        let body = json!({
            "errors": [{"code": 2, "message": "Status(StatusCode=\"Internal\", Detail=\"quota exhausted\")"}]
        })
        .to_string();
        let res = response_with_body(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert_eq!(res.errors[0].message, "quota exhausted");
    }

    #[test]
    fn test_non_json_failure_body() {
        let res = response_with_body(StatusCode::BAD_GATEWAY, "upstream unavailable");
        assert!(!res.ok);
        assert!(res.json.is_none());
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.error_messages, "upstream unavailable");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = StringMap::new();
        headers.insert("X-CSRF-Token".to_string(), "fresh".to_string());
        let res = ApiResponse::from_http(
            Method::POST,
            "https://auth.example.com/v2/login",
            StatusCode::FORBIDDEN,
            headers,
            String::new(),
            None,
        );
        assert_eq!(res.header("x-csrf-token"), Some("fresh"));
        assert_eq!(res.header("missing"), None);
    }

    #[test]
    fn test_into_error_prefers_parsed_messages() {
        let body = json!({"errors": [{"code": 1, "message": "Token expired."}]}).to_string();
        let err = response_with_body(StatusCode::UNAUTHORIZED, &body).into_error();
        assert_eq!(
            err.to_string(),
            "Request to https://users.example.com/v1/users/1 failed: Token expired"
        );

        let err = response_with_body(StatusCode::NOT_FOUND, "").into_error();
        assert!(err.to_string().contains("404 Not Found"));
    }

    #[test]
    fn test_json_as_typed() {
        #[derive(serde::Deserialize)]
        struct Payload {
            id: i64,
        }
        let res = response_with_body(StatusCode::OK, r#"{"id": 9}"#);
        let payload: Payload = res.json_as().unwrap();
        assert_eq!(payload.id, 9);
    }
}
