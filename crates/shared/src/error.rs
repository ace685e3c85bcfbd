//! Shared error types and the server's structured error payload.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the Tracker API on 4xx/5xx responses.
///
/// The API is not fully consistent: validation failures send `message` as a
/// list of strings, everything else sends a single string. `error` carries
/// the status reason phrase and is only used when `message` is missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ErrorMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `message` field of an [`ErrorPayload`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ErrorMessage {
    Single(String),
    Many(Vec<String>),
}

impl ErrorMessage {
    fn into_text(self) -> Option<String> {
        let text = match self {
            ErrorMessage::Single(s) => s,
            ErrorMessage::Many(list) => list
                .into_iter()
                .filter(|s| !s.trim().is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Attempt to parse an error body into a user-facing message.
/// Prefers `message`, falls back to `error`.
pub fn server_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorPayload>(body).ok()?;
    if let Some(text) = parsed.message.and_then(ErrorMessage::into_text) {
        return Some(text);
    }
    parsed.error.filter(|e| !e.trim().is_empty())
}

/// API error type for client-side use
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("deserialization error: {0}")]
    Deserialize(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// HTTP status of the failed request, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message the server put in its error payload, verbatim.
    pub fn server_message(&self) -> Option<String> {
        match self {
            ApiError::Http { body, .. } => server_message(body),
            _ => None,
        }
    }

    /// Message to show the user: the server's own message when it sent one,
    /// otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message().unwrap_or_else(|| fallback.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_message_is_returned_verbatim() {
        let body = r#"{"statusCode":409,"message":"Leave overlaps an existing request","error":"Conflict"}"#;
        assert_eq!(
            server_message(body).as_deref(),
            Some("Leave overlaps an existing request")
        );
    }

    #[test]
    fn message_list_is_joined() {
        let body = r#"{"statusCode":400,"message":["startDate must be a date","reason should not be empty"],"error":"Bad Request"}"#;
        assert_eq!(
            server_message(body).as_deref(),
            Some("startDate must be a date, reason should not be empty")
        );
    }

    #[test]
    fn falls_back_to_error_field() {
        let body = r#"{"statusCode":500,"error":"Internal Server Error"}"#;
        assert_eq!(server_message(body).as_deref(), Some("Internal Server Error"));
    }

    #[test]
    fn blank_or_foreign_bodies_have_no_message() {
        assert_eq!(server_message(r#"{"message":"   "}"#), None);
        assert_eq!(server_message("<html>bad gateway</html>"), None);
        assert_eq!(server_message(""), None);
    }

    #[test]
    fn user_message_uses_fallback_without_payload() {
        let err = ApiError::Network("connection refused".into());
        assert_eq!(err.user_message("Something went wrong"), "Something went wrong");

        let err = ApiError::Http {
            status: 502,
            body: "upstream unavailable".into(),
        };
        assert_eq!(err.user_message("Something went wrong"), "Something went wrong");
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn user_message_prefers_server_payload() {
        let err = ApiError::Http {
            status: 403,
            body: r#"{"message":"Only managers can approve leave"}"#.into(),
        };
        assert_eq!(
            err.user_message("Something went wrong"),
            "Only managers can approve leave"
        );
    }
}
