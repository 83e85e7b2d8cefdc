// ── Runtime session configuration ──
//
// These types describe *how* to reach a server. They carry credential
// data and connection tuning, but never touch disk. The CLI builds a
// `SessionConfig` from a profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use maasly_api::ReconnectConfig;
use maasly_api::http::{HttpConfig, TlsMode};
use secrecy::SecretString;
use url::Url;

/// How to authenticate the session.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Log in through the account views to obtain session cookies.
    Password {
        username: String,
        password: SecretString,
    },
    /// A ready-made `Cookie` header holding `sessionid` and `csrftoken`.
    Cookie(SecretString),
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

impl TlsVerification {
    pub(crate) fn to_tls_mode(&self) -> TlsMode {
        match self {
            Self::SystemDefaults => TlsMode::System,
            Self::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Configuration for one server session.
///
/// Built by the CLI, passed to `Session` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server base URL including its path prefix (e.g. `http://maas:5240/MAAS`).
    pub url: Url,
    /// Authentication method and credentials.
    pub auth: AuthCredentials,
    /// TLS verification strategy (login requests and the socket upgrade).
    pub tls: TlsVerification,
    /// Login timeout, and how long to wait for the first socket open.
    pub timeout: Duration,
    /// How long `Session::request` waits for a response.
    pub request_timeout: Duration,
    /// Socket reconnect backoff.
    pub reconnect: ReconnectConfig,
}

impl SessionConfig {
    pub fn new(url: Url, auth: AuthCredentials) -> Self {
        Self {
            url,
            auth,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            reconnect: ReconnectConfig::default(),
        }
    }

    pub(crate) fn http_config(&self) -> HttpConfig {
        HttpConfig {
            tls: self.tls.to_tls_mode(),
            timeout: self.timeout,
        }
    }
}
