//! Gateway-level error types.

use thiserror::Error;

/// Errors that can occur while talking to the transaction gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway answered with a non-success status code.
    ///
    /// `message` carries the server's error detail when the body was a JSON
    /// error envelope, otherwise the raw response text.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (connection refused, DNS, reset).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The event stream broke after it was opened.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response body could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// Response parsed but is missing something the caller requires.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// Build a [`GatewayError::Status`] from a failed response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            message: error_detail(body),
        }
    }

    /// Returns `true` if this error is transient and the call may be repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` for a 404 response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Extract a human-readable detail from an error response body.
///
/// Understands `{"error": "..."}`, `{"message": "..."}` and `{"detail": "..."}`
/// envelopes (also when `error` is itself an object with a `message`); any
/// other body is returned trimmed as-is.
pub fn error_detail(body: &str) -> String {
    let trimmed = body.trim();
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return trimmed.to_string();
    };
    for key in ["error", "message", "detail"] {
        match value.get(key) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(serde_json::Value::Object(obj)) => {
                if let Some(s) = obj.get("message").and_then(|m| m.as_str()) {
                    return s.to_string();
                }
            }
            _ => {}
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_from_error_envelope() {
        assert_eq!(error_detail(r#"{"error":"unknown kind"}"#), "unknown kind");
        assert_eq!(error_detail(r#"{"message":"bad input"}"#), "bad input");
        assert_eq!(
            error_detail(r#"{"error":{"code":7,"message":"utxo spent"}}"#),
            "utxo spent"
        );
    }

    #[test]
    fn detail_falls_back_to_raw_text() {
        assert_eq!(error_detail("  gateway exploded\n"), "gateway exploded");
        assert_eq!(error_detail(r#"{"status":"nope"}"#), r#"{"status":"nope"}"#);
    }

    #[test]
    fn retryable_classification() {
        assert!(GatewayError::Http("reset".into()).is_retryable());
        assert!(GatewayError::Timeout { ms: 10 }.is_retryable());
        assert!(GatewayError::from_response(503, "").is_retryable());
        assert!(GatewayError::from_response(429, "").is_retryable());
        assert!(!GatewayError::from_response(400, "").is_retryable());
        assert!(!GatewayError::MalformedResponse("x".into()).is_retryable());
    }

    #[test]
    fn not_found() {
        let err = GatewayError::from_response(404, r#"{"error":"unknown kind"}"#);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "HTTP 404: unknown kind");
    }
}
