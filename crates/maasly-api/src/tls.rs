// TLS client configuration for the WebSocket upgrade.
//
// The login flow gets its TLS settings through reqwest (see `http.rs`);
// the socket needs the same `TlsMode` expressed as a rustls config.

use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};

use crate::error::Error;
use crate::http::TlsMode;

/// Rustls client config for `mode`.
///
/// `None` means the transport's built-in connector (webpki roots) is
/// used unchanged.
pub fn client_config(mode: &TlsMode) -> Result<Option<Arc<ClientConfig>>, Error> {
    match mode {
        TlsMode::System => Ok(None),
        TlsMode::CustomCa(path) => {
            let roots = load_roots(path)?;
            let config = builder()?
                .with_root_certificates(roots)
                .with_no_client_auth();
            Ok(Some(Arc::new(config)))
        }
        TlsMode::DangerAcceptInvalid => {
            tracing::warn!("TLS certificate verification disabled for the WebSocket");
            let config = builder()?
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
                .with_no_client_auth();
            Ok(Some(Arc::new(config)))
        }
    }
}

fn builder() -> Result<rustls::ConfigBuilder<ClientConfig, rustls::WantsVerifier>, Error> {
    ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("unsupported TLS protocol set: {e}")))
}

/// Trust anchors from every certificate in a PEM file.
fn load_roots(path: &Path) -> Result<RootCertStore, Error> {
    let certs = CertificateDer::pem_file_iter(path).map_err(|e| {
        Error::Tls(format!("failed to read CA cert {}: {e}", path.display()))
    })?;

    let mut roots = RootCertStore::empty();
    for cert in certs {
        let cert = cert.map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
        roots
            .add(cert)
            .map_err(|e| Error::Tls(format!("unusable CA cert: {e}")))?;
    }

    if roots.is_empty() {
        return Err(Error::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(roots)
}

// ── Verification bypass ─────────────────────────────────────────────

#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
