//! Response interpretation
//!
//! Turns a buffered [`TransportResponse`] into either the parsed body or a
//! typed error. The remote API reports failures as `{"errors": [...]}`, and
//! does so even on 200 responses; a non-empty `errors` field is a failure
//! regardless of status.

use super::transport::TransportResponse;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::warn;

/// Parse the body, classify the status and surface in-band errors.
///
/// `fallback_retry_after` is used for a 429 without a usable `retry-after`.
pub(crate) fn interpret(
    response: TransportResponse,
    fallback_retry_after: Duration,
) -> Result<JsonValue> {
    if response.status == 429 {
        let retry_after = response
            .header("retry-after")
            .and_then(|value| parse_retry_after(value, Utc::now()))
            .unwrap_or(fallback_retry_after);
        return Err(Error::rate_limited(retry_after, lenient_body(&response)));
    }

    if !response.is_success() {
        let body = lenient_body(&response);
        let message = error_message(&body).unwrap_or_else(|| reason_phrase(response.status));
        return Err(Error::from_status(response.status, message, body));
    }

    let body = parse_body(&response)?;
    if let Some(message) = error_message(&body) {
        return Err(Error::from_status(response.status, message, body));
    }
    Ok(body)
}

/// Canonical reason for a status, e.g. "Service Unavailable"
fn reason_phrase(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status")
        .to_string()
}

/// JSON when the content type says so, otherwise the body as a string
pub fn parse_body(response: &TransportResponse) -> Result<JsonValue> {
    let declared_json = response.content_type().is_some_and(is_json_content_type);
    if !declared_json {
        return Ok(JsonValue::String(
            String::from_utf8_lossy(&response.body).into_owned(),
        ));
    }
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(JsonValue::Null);
    }
    serde_json::from_slice(&response.body)
        .map_err(|e| Error::network("response declared JSON but could not be parsed", e))
}

/// Error bodies are kept even when they lie about being JSON
fn lenient_body(response: &TransportResponse) -> JsonValue {
    parse_body(response).unwrap_or_else(|_| {
        JsonValue::String(String::from_utf8_lossy(&response.body).into_owned())
    })
}

/// `application/json` or any `+json` media type
pub fn is_json_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media_type == "application/json" || media_type.ends_with("+json")
}

/// Message carried by a non-empty `errors` field, if any
pub fn error_message(body: &JsonValue) -> Option<String> {
    let messages: Vec<String> = match body.get("errors")? {
        JsonValue::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                JsonValue::String(s) => Some(s.clone()),
                JsonValue::Object(obj) => obj
                    .get("message")
                    .and_then(JsonValue::as_str)
                    .map(String::from),
                JsonValue::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        JsonValue::String(s) => vec![s.clone()],
        _ => Vec::new(),
    };

    let messages: Vec<String> = messages.into_iter().filter(|m| !m.is_empty()).collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}

/// Parse a `retry-after` value: integer seconds or an HTTP date.
///
/// Dates in the past yield zero. Unparsable values yield `None`.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    match DateTime::parse_from_rfc2822(value) {
        Ok(date) => {
            let remaining = date.with_timezone(&Utc) - now;
            Some(remaining.to_std().unwrap_or(Duration::ZERO))
        }
        Err(_) => {
            warn!(value, "could not parse retry-after header");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    const FALLBACK: Duration = Duration::from_millis(1500);

    #[test_case("application/json", true ; "plain")]
    #[test_case("application/json; charset=utf-8", true ; "with charset")]
    #[test_case("Application/JSON", true ; "mixed case")]
    #[test_case("application/problem+json", true ; "structured suffix")]
    #[test_case("text/plain", false ; "text")]
    #[test_case("text/html; charset=utf-8", false ; "html")]
    fn test_is_json_content_type(content_type: &str, expected: bool) {
        assert_eq!(is_json_content_type(content_type), expected);
    }

    #[test]
    fn test_success_returns_parsed_json() {
        let body = json!({"user": {"id": 42, "name": "Alice"}});
        let parsed = interpret(TransportResponse::json(200, &body), FALLBACK).unwrap();
        assert_eq!(parsed, body);
    }

    #[test]
    fn test_non_json_body_is_text() {
        let response = TransportResponse::new(200)
            .with_header("content-type", "text/plain")
            .with_body("pong");
        assert_eq!(interpret(response, FALLBACK).unwrap(), json!("pong"));
    }

    #[test]
    fn test_empty_json_body_is_null() {
        let response = TransportResponse::new(204).with_header("content-type", "application/json");
        assert_eq!(interpret(response, FALLBACK).unwrap(), JsonValue::Null);
    }

    #[test]
    fn test_invalid_json_on_success_is_network_error() {
        let response = TransportResponse::new(200)
            .with_header("content-type", "application/json")
            .with_body("{truncated");
        let err = interpret(response, FALLBACK).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[test]
    fn test_error_status_uses_body_message() {
        let body = json!({"errors": ["Game not found"]});
        let err = interpret(TransportResponse::json(404, &body), FALLBACK).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ApiClient);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "HTTP 404: Game not found");
        assert_eq!(err.body(), Some(&body));
    }

    #[test]
    fn test_error_status_without_message_is_generic() {
        let response = TransportResponse::new(503).with_body("upstream down");
        let err = interpret(response, FALLBACK).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ApiServer);
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
        assert_eq!(err.body(), Some(&json!("upstream down")));
    }

    #[test]
    fn test_unregistered_status_has_fallback_reason() {
        let err = interpret(TransportResponse::new(599), FALLBACK).unwrap_err();
        assert_eq!(err.to_string(), "HTTP 599: Unknown Status");
    }

    #[test]
    fn test_unauthorized_is_auth_error() {
        let body = json!({"errors": ["invalid api key"]});
        let err = interpret(TransportResponse::json(401, &body), FALLBACK).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[test]
    fn test_in_band_error_on_200_is_failure() {
        let body = json!({"errors": ["purchase already verified"], "data": null});
        let err = interpret(TransportResponse::json(200, &body), FALLBACK).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ApiClient);
        assert_eq!(err.status(), Some(200));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_errors_array_is_success() {
        let body = json!({"errors": [], "data": {"ok": true}});
        assert_eq!(interpret(TransportResponse::json(200, &body), FALLBACK).unwrap(), body);
    }

    #[test]
    fn test_rate_limited_with_seconds_header() {
        let response = TransportResponse::json(429, &json!({"errors": ["slow down"]}))
            .with_header("Retry-After", "2");
        match interpret(response, FALLBACK).unwrap_err() {
            Error::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Duration::from_secs(2));
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn test_rate_limited_without_header_uses_fallback() {
        let response = TransportResponse::new(429);
        match interpret(response, FALLBACK).unwrap_err() {
            Error::RateLimited { retry_after, .. } => assert_eq!(retry_after, FALLBACK),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(&json!({"errors": ["a", "b"]})), Some("a; b".into()));
        assert_eq!(error_message(&json!({"errors": "flat"})), Some("flat".into()));
        assert_eq!(
            error_message(&json!({"errors": [{"message": "nested"}]})),
            Some("nested".into())
        );
        assert_eq!(error_message(&json!({"errors": [""]})), None);
        assert_eq!(error_message(&json!({"data": 1})), None);
        assert_eq!(error_message(&json!("text body")), None);
    }

    #[test]
    fn test_parse_retry_after_forms() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();

        assert_eq!(parse_retry_after("2", now), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 45 ", now), Some(Duration::from_secs(45)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:30 GMT", now),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:27:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon", now), None);
        assert_eq!(parse_retry_after("", now), None);
    }
}
