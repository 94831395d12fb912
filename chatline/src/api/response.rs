use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{Error, Result};

/// Decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

/// Apply the backend's response conventions.
///
/// `204` and empty bodies mean "no data". Bodies that are not JSON are kept as
/// text. Non-2xx responses become `Error::Rejected` carrying the `detail`
/// field, the status reason, or a generic message, in that order.
pub fn decode_response(status: StatusCode, text: &str) -> Result<Option<ResponseBody>> {
    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let body = if text.trim().is_empty() {
        None
    } else {
        Some(
            serde_json::from_str::<Value>(text)
                .map(ResponseBody::Json)
                .unwrap_or_else(|_| ResponseBody::Text(text.to_string())),
        )
    };

    if status.is_success() {
        return Ok(body);
    }

    let detail = match &body {
        Some(ResponseBody::Json(value)) => detail_of(value),
        _ => None,
    }
    .or_else(|| status.canonical_reason().map(String::from))
    .unwrap_or_else(|| "Request failed".to_string());

    Err(Error::Rejected {
        status: status.as_u16(),
        detail,
    })
}

fn detail_of(value: &Value) -> Option<String> {
    match value.get("detail")? {
        Value::String(detail) if !detail.is_empty() => Some(detail.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_content_is_no_data() {
        assert_eq!(decode_response(StatusCode::NO_CONTENT, "").unwrap(), None);
        assert_eq!(decode_response(StatusCode::OK, "  ").unwrap(), None);
    }

    #[test]
    fn test_json_and_text_bodies() {
        assert_eq!(
            decode_response(StatusCode::OK, r#"{"id": 1}"#).unwrap(),
            Some(ResponseBody::Json(json!({"id": 1})))
        );
        assert_eq!(
            decode_response(StatusCode::OK, "plain").unwrap(),
            Some(ResponseBody::Text("plain".to_string()))
        );
    }

    #[test]
    fn test_detail_becomes_error_message() {
        let err = decode_response(StatusCode::NOT_FOUND, r#"{"detail": "User not found."}"#)
            .unwrap_err();
        match err {
            Error::Rejected { status, detail } => {
                assert_eq!(status, 404);
                assert_eq!(detail, "User not found.");
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_detail_uses_status_reason() {
        let err = decode_response(StatusCode::BAD_GATEWAY, "<html>oops</html>").unwrap_err();
        assert_eq!(err.to_string(), "Bad Gateway");

        let err = decode_response(StatusCode::BAD_REQUEST, r#"{"chat": ["required"]}"#).unwrap_err();
        assert_eq!(err.to_string(), "Bad Request");
    }

    #[test]
    fn test_unknown_status_falls_back_to_generic() {
        let status = StatusCode::from_u16(599).unwrap();
        let err = decode_response(status, "").unwrap_err();
        assert_eq!(err.to_string(), "Request failed");
    }
}
