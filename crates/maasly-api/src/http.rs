// Shared HTTP configuration for building reqwest::Client instances.
//
// Only the session login/logout flow talks plain HTTP; everything else
// goes over the WebSocket.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;

use crate::error::Error;

/// TLS verification mode (api-level mirror of core's TlsVerification).
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (for self-signed servers).
    DangerAcceptInvalid,
}

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
        }
    }
}

impl HttpConfig {
    /// Build a `reqwest::Client` that stores cookies in `jar`.
    ///
    /// Redirects are not followed: a successful login answers with one.
    pub fn build_client(&self, jar: Arc<Jar>) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("maasly/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .cookie_provider(jar);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ca_file_is_a_tls_error() {
        let config = HttpConfig {
            tls: TlsMode::CustomCa(PathBuf::from("/nonexistent/maasly-ca.pem")),
            ..HttpConfig::default()
        };
        let result = config.build_client(Arc::new(Jar::default()));
        assert!(matches!(result, Err(Error::Tls(_))));
    }
}
