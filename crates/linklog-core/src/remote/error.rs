//! Remote failure taxonomy.

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::UpsertReceipt;
use crate::models::RemoteRowId;

/// Longest slice of a raw error body kept in a message.
const MAX_BODY_CHARS: usize = 180;

/// Failure classes of a remote write, in handling priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// Credentials rejected (401/403)
    Auth,
    /// Remote asked us to slow down (429)
    RateLimited,
    /// Remote-side failure (5xx)
    Server,
    /// Malformed request (other 4xx)
    Client,
    /// No response obtained
    Network,
    /// Response did not carry a usable success envelope
    Protocol,
}

impl RemoteErrorKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::RateLimited => "rate_limited",
            Self::Server => "server",
            Self::Client => "client",
            Self::Network => "network",
            Self::Protocol => "protocol",
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified remote write failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    kind: RemoteErrorKind,
    message: String,
    terminal: bool,
}

impl RemoteError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::with_kind(RemoteErrorKind::Auth, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::with_kind(RemoteErrorKind::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::with_kind(RemoteErrorKind::Server, message)
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self::with_kind(RemoteErrorKind::Client, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::with_kind(RemoteErrorKind::Network, message)
    }

    /// A protocol failure; `terminal` is set when the envelope said so.
    pub fn protocol(message: impl Into<String>, terminal: bool) -> Self {
        Self {
            kind: RemoteErrorKind::Protocol,
            message: message.into(),
            terminal,
        }
    }

    fn with_kind(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            terminal: false,
        }
    }

    /// Map a transport-level failure (no usable response).
    pub fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::network(format!("Request timed out: {error}"))
        } else {
            Self::network(format!("Request failed: {error}"))
        }
    }

    pub const fn kind(&self) -> RemoteErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether a later attempt could succeed.
    ///
    /// This is the only retry decision in the engine; the immediate write
    /// path and the drain pass both defer to it.
    pub const fn is_retryable(&self) -> bool {
        match self.kind {
            RemoteErrorKind::Auth | RemoteErrorKind::Client => false,
            RemoteErrorKind::Protocol => !self.terminal,
            RemoteErrorKind::RateLimited | RemoteErrorKind::Server | RemoteErrorKind::Network => {
                true
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseEnvelope {
    ok: bool,
    #[serde(default)]
    row_id: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    terminal: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Classify a complete HTTP response from the remote endpoint.
pub fn classify_response(status: StatusCode, body: &str) -> Result<UpsertReceipt, RemoteError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteError::auth(format!(
            "Authentication failed - check your token ({})",
            status.as_u16()
        )));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(RemoteError::rate_limited(parse_api_error(status, body)));
    }
    if status.is_server_error() {
        return Err(RemoteError::server(format!(
            "Server error: {}",
            parse_api_error(status, body)
        )));
    }
    if status.is_client_error() {
        return Err(RemoteError::client(format!(
            "HTTP error: {}",
            parse_api_error(status, body)
        )));
    }
    if !status.is_success() {
        return Err(RemoteError::protocol(
            format!("Unexpected response status {}", status.as_u16()),
            false,
        ));
    }

    let envelope: ResponseEnvelope = serde_json::from_str(body).map_err(|error| {
        RemoteError::protocol(format!("Invalid response envelope: {error}"), false)
    })?;

    if !envelope.ok {
        let message = envelope
            .error
            .or(envelope.message)
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| "Unknown error from remote".to_string());
        return Err(RemoteError::protocol(message, envelope.terminal));
    }

    Ok(UpsertReceipt {
        remote_id: envelope.row_id.and_then(row_id_from_json),
        message: envelope.message,
    })
}

fn row_id_from_json(value: serde_json::Value) -> Option<RemoteRowId> {
    match value {
        serde_json::Value::String(id) if !id.trim().is_empty() => {
            Some(RemoteRowId::new(id.trim()))
        }
        serde_json::Value::Number(id) => Some(RemoteRowId::new(id.to_string())),
        _ => None,
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = payload.error.or(payload.message) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed: String = body.trim().chars().take(MAX_BODY_CHARS).collect();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kind_of(status: u16, body: &str) -> RemoteErrorKind {
        let status = StatusCode::from_u16(status).unwrap();
        classify_response(status, body).unwrap_err().kind()
    }

    #[test]
    fn status_codes_map_to_kinds() {
        assert_eq!(kind_of(401, ""), RemoteErrorKind::Auth);
        assert_eq!(kind_of(403, ""), RemoteErrorKind::Auth);
        assert_eq!(kind_of(429, ""), RemoteErrorKind::RateLimited);
        assert_eq!(kind_of(500, ""), RemoteErrorKind::Server);
        assert_eq!(kind_of(503, ""), RemoteErrorKind::Server);
        assert_eq!(kind_of(400, ""), RemoteErrorKind::Client);
        assert_eq!(kind_of(404, ""), RemoteErrorKind::Client);
    }

    #[test]
    fn retryability_follows_kind() {
        assert!(!RemoteError::auth("x").is_retryable());
        assert!(!RemoteError::client("x").is_retryable());
        assert!(RemoteError::rate_limited("x").is_retryable());
        assert!(RemoteError::server("x").is_retryable());
        assert!(RemoteError::network("x").is_retryable());
        assert!(RemoteError::protocol("x", false).is_retryable());
        assert!(!RemoteError::protocol("x", true).is_retryable());
    }

    #[test]
    fn success_envelope_yields_row_id() {
        let receipt =
            classify_response(StatusCode::OK, r#"{"ok":true,"rowId":42,"message":"added"}"#)
                .unwrap();
        assert_eq!(receipt.remote_id, Some(RemoteRowId::new("42")));
        assert_eq!(receipt.message.as_deref(), Some("added"));

        let receipt = classify_response(StatusCode::OK, r#"{"ok":true,"rowId":"r-7"}"#).unwrap();
        assert_eq!(receipt.remote_id, Some(RemoteRowId::new("r-7")));
    }

    #[test]
    fn success_envelope_without_row_id_is_accepted() {
        let receipt = classify_response(StatusCode::OK, r#"{"ok":true}"#).unwrap();
        assert_eq!(receipt.remote_id, None);
    }

    #[test]
    fn unparseable_body_is_retryable_protocol_error() {
        let error = classify_response(StatusCode::OK, "<html>login</html>").unwrap_err();
        assert_eq!(error.kind(), RemoteErrorKind::Protocol);
        assert!(error.is_retryable());
    }

    #[test]
    fn failure_envelope_respects_terminal_flag() {
        let error =
            classify_response(StatusCode::OK, r#"{"ok":false,"error":"sheet locked"}"#).unwrap_err();
        assert_eq!(error.message(), "sheet locked");
        assert!(error.is_retryable());

        let error = classify_response(
            StatusCode::OK,
            r#"{"ok":false,"error":"unknown column","terminal":true}"#,
        )
        .unwrap_err();
        assert!(!error.is_retryable());
    }

    #[test]
    fn error_messages_prefer_json_error_field() {
        let error = classify_response(StatusCode::BAD_REQUEST, r#"{"error":"missing name"}"#)
            .unwrap_err();
        assert_eq!(error.message(), "HTTP error: missing name (400)");

        let error = classify_response(StatusCode::BAD_GATEWAY, "").unwrap_err();
        assert_eq!(error.message(), "Server error: HTTP 502");
    }

    #[test]
    fn long_error_pages_are_cut_short() {
        let page = format!("  <html>{}</html>", "x".repeat(500));
        let error = classify_response(StatusCode::BAD_GATEWAY, &page).unwrap_err();

        let expected = format!("Server error: <html>{} (502)", "x".repeat(MAX_BODY_CHARS - 6));
        assert_eq!(error.message(), expected);
    }
}
