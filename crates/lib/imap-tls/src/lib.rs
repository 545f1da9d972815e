//! IMAP transport security negotiation.

pub use imap_tls_rustls::CertVerification;

/// The data stream of an IMAP connection: TLS, or plaintext when explicitly
/// configured.
pub type Stream = tokio_util::either::Either<imap_tls_rustls::TlsStream, tokio::net::TcpStream>;

/// Errors returned while connecting to the IMAP server.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Network I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup or handshake error.
    #[error("TLS error: {0}")]
    Tls(#[source] imap_tls_rustls::TlsConnectError),

    /// IMAP protocol error.
    #[error("IMAP error: {0}")]
    Imap(#[from] async_imap::error::Error),

    /// The server did not send the expected greeting.
    #[error("IMAP server sent no greeting")]
    MissingGreeting,
}

/// How to secure the IMAP connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TlsMode {
    /// Implicit TLS (usually port 993).
    Implicit,

    /// Start with plaintext and upgrade using STARTTLS (usually port 143).
    StartTls,

    /// No TLS at all. Test environments only.
    Plain,
}

impl TlsMode {
    /// The conventional port for this mode.
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Implicit => 993,
            Self::StartTls | Self::Plain => 143,
        }
    }
}

/// Negotiate the transport over the TCP stream and read the server greeting.
pub async fn connect(
    tcp_stream: tokio::net::TcpStream,
    tls_server_name: &str,
    tls_mode: TlsMode,
    verification: CertVerification,
) -> Result<async_imap::Client<Stream>, ConnectError> {
    let client = match tls_mode {
        TlsMode::Implicit => {
            let connector = imap_tls_rustls::connector(verification).map_err(ConnectError::Tls)?;
            let stream = imap_tls_rustls::connect(&connector, tls_server_name, tcp_stream)
                .await
                .map_err(ConnectError::Tls)?;
            let mut client = async_imap::Client::new(Stream::Left(stream));
            client
                .read_response()
                .await
                .transpose()?
                .ok_or(ConnectError::MissingGreeting)?;
            client
        }
        TlsMode::StartTls => {
            let connector = imap_tls_rustls::connector(verification).map_err(ConnectError::Tls)?;
            let mut client = async_imap::Client::new(tcp_stream);
            client
                .read_response()
                .await
                .transpose()?
                .ok_or(ConnectError::MissingGreeting)?;
            client.run_command_and_check_ok("STARTTLS", None).await?;
            let tcp_stream = client.into_inner();
            let stream = imap_tls_rustls::connect(&connector, tls_server_name, tcp_stream)
                .await
                .map_err(ConnectError::Tls)?;
            async_imap::Client::new(Stream::Left(stream))
        }
        TlsMode::Plain => {
            tracing::warn!("connecting without TLS, credentials are sent in the clear");
            let mut client = async_imap::Client::new(Stream::Right(tcp_stream));
            client
                .read_response()
                .await
                .transpose()?
                .ok_or(ConnectError::MissingGreeting)?;
            client
        }
    };

    Ok(client)
}
