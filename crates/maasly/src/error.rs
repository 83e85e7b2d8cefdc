//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use maasly_config::ConfigError;
use maasly_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to server at {url}")]
    #[diagnostic(
        code(maasly::connection_failed),
        help(
            "Check that the server is running and reachable.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Not connected to the server")]
    #[diagnostic(code(maasly::disconnected))]
    Disconnected,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(maasly::auth_failed),
        help(
            "Verify your username and password, or refresh the session cookie.\n\
             Run: maasly config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(maasly::no_credentials),
        help(
            "Configure credentials with: maasly config init\n\
             Or set MAASLY_USERNAME and MAASLY_PASSWORD (or MAASLY_COOKIE)."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{model} '{key}' not found")]
    #[diagnostic(
        code(maasly::not_found),
        help("Run: maasly list {model} to see available entries")
    )]
    NotFound { model: String, key: String },

    #[error("Unknown model '{name}'")]
    #[diagnostic(
        code(maasly::unknown_model),
        help("Run: maasly models to see supported models")
    )]
    UnknownModel { name: String },

    #[error("Model '{model}' has no method '{method}'")]
    #[diagnostic(
        code(maasly::unknown_method),
        help("Run: maasly models to see each model's methods")
    )]
    UnknownMethod { model: String, method: String },

    // ── Server ───────────────────────────────────────────────────────
    #[error("Server rejected the request: {message}")]
    #[diagnostic(code(maasly::rejected))]
    Rejected { message: String },

    #[error("Protocol error: {message}")]
    #[diagnostic(code(maasly::protocol))]
    Protocol { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(maasly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(maasly::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: maasly config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(maasly::no_config),
        help(
            "Create a profile with: maasly config init\n\
             Or pass --server. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(maasly::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(maasly::timeout),
        help("Increase the limit with --request-timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(maasly::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(maasly::json), help("Check the JSON contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::UnknownModel { .. } | Self::UnknownMethod { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::NotConnected => CliError::Disconnected,
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::UnknownModel { name } => CliError::UnknownModel { name },
            CoreError::UnknownMethod { model, method } => CliError::UnknownMethod { model, method },
            CoreError::MissingPrimaryKey { model, field } => CliError::Validation {
                field,
                reason: format!("{model} parameters must include it"),
            },
            CoreError::NotFound { model, key } => CliError::NotFound { model, key },
            CoreError::Rejected { message } => CliError::Rejected { message },
            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Protocol { message } => CliError::Protocol { message },
            CoreError::Config { message } => CliError::Validation {
                field: "server".into(),
                reason: message,
            },
            CoreError::AlreadyConnected => CliError::Internal("session already connected".into()),
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::ProfileNotFound { name, available } => CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            },
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                CoreError::ConnectionFailed {
                    url: "http://maas".into(),
                    reason: "refused".into(),
                },
                exit_code::CONNECTION,
            ),
            (
                CoreError::AuthenticationFailed {
                    message: "bad password".into(),
                },
                exit_code::AUTH,
            ),
            (
                CoreError::NotFound {
                    model: "machine".into(),
                    key: "abc123".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::Rejected {
                    message: "name: taken".into(),
                },
                exit_code::REJECTED,
            ),
            (CoreError::Timeout { timeout_secs: 60 }, exit_code::TIMEOUT),
            (
                CoreError::UnknownModel {
                    name: "toaster".into(),
                },
                exit_code::USAGE,
            ),
        ];

        for (core, expected) in cases {
            let label = core.to_string();
            assert_eq!(CliError::from(core).exit_code(), expected, "{label}");
        }
    }

    #[test]
    fn profile_not_found_lists_available() {
        let err = CliError::from(ConfigError::ProfileNotFound {
            name: "prod".into(),
            available: vec![],
        });
        let CliError::ProfileNotFound { available, .. } = err else {
            panic!("expected ProfileNotFound");
        };
        assert_eq!(available, "(none)");
    }
}
