//! High-level IMAP connection utilities.

use std::time::Duration;

use imap_failure::{Classify, FailureKind};

/// The effective data stream type we use.
pub type Stream = imap_tls::Stream;

/// The effective client type we use.
pub type Client = async_imap::Client<Stream>;

/// IMAP connect params.
#[derive(Debug, Clone, PartialEq)]
pub struct Params<'a> {
    /// Hostname or IP address of the IMAP server.
    pub host: &'a str,

    /// IMAP port.
    pub port: u16,

    /// TLS mode.
    pub tls_mode: imap_tls::TlsMode,

    /// TLS server name (SNI).
    pub tls_server_name: &'a str,

    /// Server certificate checking.
    pub cert_verification: imap_tls::CertVerification,

    /// Bound for the TCP connect, and separately for the TLS negotiation
    /// and greeting.
    pub io_timeout: Duration,
}

/// Errors returned while connecting to an IMAP server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// TCP connection error.
    #[error("TCP connection error: {0}")]
    TcpConnect(#[source] std::io::Error),

    /// TCP connection did not complete in time.
    #[error("TCP connection timed out after {0:?}")]
    TcpConnectTimeout(Duration),

    /// IMAP TLS connection error.
    #[error("IMAP TLS connection error: {0}")]
    ImapTlsConnect(#[source] imap_tls::ConnectError),

    /// TLS negotiation or the greeting did not complete in time.
    #[error("IMAP TLS connection timed out after {0:?}")]
    ImapTlsConnectTimeout(Duration),
}

impl Classify for Error {
    fn classify(&self) -> FailureKind {
        match self {
            Self::TcpConnect(err) => err.classify(),
            Self::TcpConnectTimeout(_) | Self::ImapTlsConnectTimeout(_) => FailureKind::Transient,
            Self::ImapTlsConnect(err) => match err {
                imap_tls::ConnectError::Tls(
                    imap_tls_rustls::TlsConnectError::RootCerts(_)
                    | imap_tls_rustls::TlsConnectError::NoRootCerts
                    | imap_tls_rustls::TlsConnectError::InvalidDnsName(_),
                ) => FailureKind::Fatal,
                imap_tls::ConnectError::Tls(imap_tls_rustls::TlsConnectError::Io(err)) => {
                    err.classify()
                }
                imap_tls::ConnectError::Io(err) => err.classify(),
                imap_tls::ConnectError::Imap(err) => err.classify(),
                imap_tls::ConnectError::MissingGreeting => FailureKind::Transient,
            },
        }
    }
}

/// Connect to an IMAP server and produce an IMAP client.
pub async fn connect(params: Params<'_>) -> Result<Client, Error> {
    let Params {
        host,
        port,
        tls_mode,
        tls_server_name,
        cert_verification,
        io_timeout,
    } = params;

    tracing::debug!(
        imap_host = %host,
        imap_port = port,
        imap_tls_mode = ?tls_mode,
        tls_server_name = %tls_server_name,
        ?cert_verification,
        "connecting to an IMAP server"
    );

    let tcp_stream = tokio::time::timeout(io_timeout, tokio::net::TcpStream::connect((host, port)))
        .await
        .map_err(|_| Error::TcpConnectTimeout(io_timeout))?
        .map_err(Error::TcpConnect)?;

    let client = tokio::time::timeout(
        io_timeout,
        imap_tls::connect(tcp_stream, tls_server_name, tls_mode, cert_verification),
    )
    .await
    .map_err(|_| Error::ImapTlsConnectTimeout(io_timeout))?
    .map_err(Error::ImapTlsConnect)?;

    Ok(client)
}
