//! Shared configuration types for imap-idle-notifier.

/// Root configuration.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// IMAP servers to watch.
    pub servers: Vec<ServerConfig>,
}

/// A watched IMAP server.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Human-friendly name for logging and identification.
    pub name: String,

    /// Hostname or IP address of the IMAP server.
    pub host: String,

    /// Optional port override.
    pub port: Option<u16>,

    /// TLS settings.
    pub tls: TlsConfig,

    /// Authentication settings.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub auth: Auth,

    /// Timing defaults for the mailboxes of this server.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub timing: TimingConfig,

    /// Mailboxes to watch on this server.
    pub mailboxes: Vec<MailboxConfig>,
}

/// TLS configuration for a server.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub struct TlsConfig {
    /// TLS mode.
    pub mode: TlsMode,

    /// Optional override for the TLS server name (SNI).
    pub server_name: Option<String>,

    /// Whether to check the server certificate. Defaults to `true`.
    pub verify_certificates: Option<bool>,
}

/// Supported TLS modes.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TlsMode {
    /// Implicit TLS (usually port 993).
    Implicit,

    /// STARTTLS upgrade (usually port 143).
    #[cfg_attr(feature = "serde", serde(rename = "starttls", alias = "start_tls"))]
    StartTls,

    /// No TLS at all. For test servers only.
    Plain,
}

/// IMAP authentication settings.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub enum Auth {
    /// Login via username/password.
    Login(LoginCredentials),

    /// Authenticate via static OAuth 2 credentials.
    #[cfg_attr(feature = "serde", serde(rename = "oauth2_credentials"))]
    OAuth2Credentials(OAuth2Credentials),
}

/// Login credentials for IMAP authentication.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub struct LoginCredentials {
    /// Username for IMAP authentication.
    pub username: String,

    /// Password for IMAP authentication.
    pub password: PasswordSource,
}

/// OAuth 2 credentials for IMAP authentication.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub struct OAuth2Credentials {
    /// Username for OAuth 2 IMAP authentication.
    pub user: String,

    /// Access token for OAuth 2 IMAP authentication.
    pub access_token: String,
}

/// Source for a password value.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq)]
pub enum PasswordSource {
    /// Plaintext password stored directly in config.
    Plain(String),

    /// The name of an environment variable holding the password.
    Env {
        /// The variable name.
        env: String,
    },
}

/// Timing knobs, all in seconds.
///
/// Unset values fall back to the enclosing level, then to the built-in
/// defaults.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingConfig {
    /// Upper bound of one IDLE wait.
    pub idle_timeout_secs: Option<u64>,

    /// Session age at which the session is proactively replaced.
    pub renewal_threshold_secs: Option<u64>,

    /// The cooldown before reconnecting after a failure.
    pub reconnect_cooldown_secs: Option<u64>,

    /// The cap for a growing cooldown.
    pub reconnect_cooldown_max_secs: Option<u64>,

    /// Factor the cooldown grows by after each consecutive failure.
    pub reconnect_backoff_factor: Option<u32>,

    /// Bound for every network operation.
    pub io_timeout_secs: Option<u64>,
}

/// A mailbox to watch.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub struct MailboxConfig {
    /// Mailbox name as sent on the wire (e.g. INBOX).
    pub name: String,

    /// Timing overrides for this mailbox.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub timing: TimingConfig,
}
