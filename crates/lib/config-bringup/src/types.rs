//! Config types.

use std::sync::Arc;
use std::time::Duration;

/// Fully resolved server configuration shared across mailboxes.
#[derive(Debug)]
pub struct Server {
    /// Human-friendly name for logging and identification.
    pub server_name: String,

    /// Hostname or IP address of the IMAP server.
    pub host: String,

    /// IMAP port.
    pub port: u16,

    /// TLS mode.
    pub tls_mode: imap_tls::TlsMode,

    /// TLS server name (SNI).
    pub tls_server_name: String,

    /// Server certificate checking.
    pub cert_verification: imap_tls::CertVerification,

    /// IMAP authentication.
    pub auth: ServerAuth,
}

/// Fully-resolved IMAP authentication config.
pub enum ServerAuth {
    /// Login with username/password.
    Login {
        /// Username for IMAP authentication.
        username: String,

        /// Password for IMAP authentication.
        password: String,
    },

    /// Authenticate with the static OAuth 2 credentials.
    OAuth2Credentials {
        /// Username for OAuth 2 IMAP authentication.
        user: String,

        /// Access token for OAuth 2 IMAP authentication.
        access_token: String,
    },
}

impl std::fmt::Debug for ServerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::OAuth2Credentials { user, .. } => f
                .debug_struct("OAuth2Credentials")
                .field("user", user)
                .finish_non_exhaustive(),
        }
    }
}

/// Resolved timing of one mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Upper bound of one IDLE wait.
    pub idle_timeout: Duration,

    /// Session age at which the session is proactively replaced.
    pub renewal_threshold: Duration,

    /// The cooldown before reconnecting after a failure.
    pub reconnect_cooldown: Duration,

    /// The cap for a growing cooldown.
    pub reconnect_cooldown_max: Duration,

    /// Factor the cooldown grows by after each consecutive failure.
    pub reconnect_backoff_factor: u32,

    /// Bound for every network operation.
    pub io_timeout: Duration,
}

/// Fully resolved mailbox configuration.
#[derive(Debug, Clone)]
pub struct Mailbox {
    /// A shared server.
    pub server: Arc<Server>,

    /// Mailbox name as sent on the wire (e.g. INBOX).
    pub mailbox: String,

    /// Timing.
    pub timing: Timing,
}
