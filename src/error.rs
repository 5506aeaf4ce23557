//! Crate-level error types.
//!
//! [`SpendwiseError`] unifies every error source (configuration, HTTP,
//! WebSocket, JSON, local storage) behind a single enum so callers can
//! match on the variant they care about while still using the `?`
//! operator for easy propagation.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SpendwiseError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum SpendwiseError {
    /// Configuration was missing, inconsistent, or unparseable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The initial snapshot could not be fetched after every retry.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend answered with a non-success status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// An HTTP request could not be sent or its body could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A payload parsed as JSON but did not match any known shape.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A request was rejected locally before reaching the backend.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The local key-value store could not be read or written.
    #[error("store error: {0}")]
    Store(String),

    /// Terminal or filesystem I/O failed.
    #[error("io error: {0}")]
    Io(String),
}

impl SpendwiseError {
    /// Creates an [`SpendwiseError::Api`] from a status code and message.
    pub fn api(status: reqwest::StatusCode, message: impl Into<String>) -> Self {
        SpendwiseError::Api {
            status: status.as_u16(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_carries_status_and_message() {
        let err = SpendwiseError::api(reqwest::StatusCode::UNAUTHORIZED, "Invalid password");
        match &err {
            SpendwiseError::Api { status, message } => {
                assert_eq!(*status, 401);
                assert_eq!(message, "Invalid password");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert_eq!(err.to_string(), "api error (401): Invalid password");
    }
}
