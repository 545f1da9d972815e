//! rustls connector for IMAP clients.

use std::sync::Arc;

/// TLS stream type used for IMAP connections.
pub type TlsStream = tokio_rustls::client::TlsStream<tokio::net::TcpStream>;

/// How the server certificate is checked.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CertVerification {
    /// Validate the chain against the system roots and the server name.
    #[default]
    Verify,

    /// Accept any certificate.
    ///
    /// Only meant for test servers with self-signed certificates.
    Insecure,
}

/// Errors returned while preparing or establishing a TLS connection.
#[derive(Debug, thiserror::Error)]
pub enum TlsConnectError {
    /// Failed to load system root certificates.
    #[error("failed to load system root certificates: {0}")]
    RootCerts(#[from] rustls_native_certs::Error),

    /// No usable root certificates were found on the system.
    #[error("no usable system root certificates")]
    NoRootCerts,

    /// Invalid DNS name for TLS verification.
    #[error("invalid DNS name: {0}")]
    InvalidDnsName(String),

    /// TLS handshake or I/O error.
    #[error("TLS I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build a rustls connector for the given verification mode.
pub fn connector(
    verification: CertVerification,
) -> Result<tokio_rustls::TlsConnector, TlsConnectError> {
    let config = match verification {
        CertVerification::Verify => {
            let mut root_store = rustls::RootCertStore::empty();
            let rustls_native_certs::CertificateResult { certs, errors, .. } =
                rustls_native_certs::load_native_certs();
            if let Some(err) = errors.into_iter().next() {
                return Err(TlsConnectError::RootCerts(err));
            }
            let (added, ignored) = root_store.add_parsable_certificates(certs);
            if added == 0 {
                return Err(TlsConnectError::NoRootCerts);
            }
            if ignored > 0 {
                tracing::debug!(added, ignored, "skipped unparsable system root certificates");
            }
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        }
        CertVerification::Insecure => rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
            .with_no_client_auth(),
    };

    Ok(tokio_rustls::TlsConnector::from(Arc::new(config)))
}

/// Establish a TLS connection over an existing TCP stream.
pub async fn connect(
    connector: &tokio_rustls::TlsConnector,
    server: &str,
    stream: tokio::net::TcpStream,
) -> Result<TlsStream, TlsConnectError> {
    let server_name = rustls::pki_types::ServerName::try_from(server.to_owned())
        .map_err(|_| TlsConnectError::InvalidDnsName(server.to_owned()))?;
    let tls_stream = connector.connect(server_name, stream).await?;
    Ok(tls_stream)
}

/// Certificate verifier that accepts everything.
#[derive(Debug)]
struct AcceptAnyCert;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
