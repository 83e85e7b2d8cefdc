use thiserror::Error;

/// Top-level error type for the `maasly-api` crate.
///
/// Covers every failure mode of the wire layer: session login, the
/// WebSocket transport, and frame encoding/decoding.
/// `maasly-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, account locked, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The session cookies carry no `csrftoken`, so no WebSocket URL
    /// can be built.
    #[error("Session has no csrftoken cookie -- log in again")]
    MissingCsrfToken,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL cannot be mapped onto a WebSocket scheme.
    #[error("Unsupported URL scheme '{scheme}' (expected http, https, ws or wss)")]
    UnsupportedScheme { scheme: String },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// The transport task is gone; nothing can be sent any more.
    #[error("Transport is shut down")]
    TransportShutdown,

    // ── Protocol ────────────────────────────────────────────────────
    /// An inbound frame could not be parsed, with the raw text for debugging.
    #[error("Malformed frame: {message}")]
    MalformedFrame { message: String, frame: String },

    /// A notification name that is not `<model>.<verb>`.
    #[error("Unrecognized notification '{name}'")]
    UnknownNotification { name: String },

    /// Outgoing frame serialization failed.
    #[error("Frame encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
}

impl Error {
    /// Returns `true` if this error indicates the session has expired
    /// and logging in again might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::MissingCsrfToken)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` for frames that were dropped on the inbound path.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame { .. } | Self::UnknownNotification { .. }
        )
    }
}
