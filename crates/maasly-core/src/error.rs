// ── Core error types ──
//
// User-facing errors from maasly-core. Consumers never see raw frame
// or cookie failures; the `From<maasly_api::Error>` impl translates
// wire-layer errors into session-level variants.
//
// Application errors reported by the server are NOT errors here: they
// land in the collection's `errors` field. Only `Session::call` turns
// one into `CoreError::Rejected`.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session is not connected")]
    NotConnected,

    #[error("Session is already connected")]
    AlreadyConnected,

    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Model errors ─────────────────────────────────────────────────
    #[error("Unknown model '{name}'")]
    UnknownModel { name: String },

    #[error("Model '{model}' has no method '{method}'")]
    UnknownMethod { model: String, method: String },

    #[error("Parameters for {model} must include '{field}'")]
    MissingPrimaryKey { model: String, field: String },

    #[error("{model} not found: {key}")]
    NotFound { model: String, key: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Request rejected by server: {message}")]
    Rejected { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Protocol errors ──────────────────────────────────────────────
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<maasly_api::Error> for CoreError {
    fn from(err: maasly_api::Error) -> Self {
        match err {
            maasly_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            maasly_api::Error::MissingCsrfToken => CoreError::AuthenticationFailed {
                message: "session has no csrftoken cookie".into(),
            },
            maasly_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                }
            }
            maasly_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            maasly_api::Error::UnsupportedScheme { scheme } => CoreError::Config {
                message: format!("Unsupported URL scheme '{scheme}'"),
            },
            maasly_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            maasly_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            maasly_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            maasly_api::Error::TransportShutdown => CoreError::NotConnected,
            maasly_api::Error::MalformedFrame { message, frame: _ } => {
                CoreError::Protocol { message }
            }
            maasly_api::Error::UnknownNotification { name } => CoreError::Protocol {
                message: format!("unrecognized notification '{name}'"),
            },
            maasly_api::Error::Encode(e) => CoreError::Internal(format!("frame encoding: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_csrf_maps_to_auth_failure() {
        let err = CoreError::from(maasly_api::Error::MissingCsrfToken);
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    }

    #[test]
    fn shutdown_maps_to_not_connected() {
        let err = CoreError::from(maasly_api::Error::TransportShutdown);
        assert!(matches!(err, CoreError::NotConnected));
    }

    #[test]
    fn malformed_frame_keeps_message() {
        let err = CoreError::from(maasly_api::Error::MalformedFrame {
            message: "expected value".into(),
            frame: "{".into(),
        });
        assert_eq!(err.to_string(), "Protocol error: expected value");
    }
}
