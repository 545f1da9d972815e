//! Internal utils.

use std::sync::Arc;
use std::time::Duration;

use crate::*;

/// Bringup the server config.
pub fn server(server: &config_core::ServerConfig) -> Result<Server, ServerError> {
    let tls_mode = match server.tls.mode {
        config_core::TlsMode::Implicit => imap_tls::TlsMode::Implicit,
        config_core::TlsMode::StartTls => imap_tls::TlsMode::StartTls,
        config_core::TlsMode::Plain => imap_tls::TlsMode::Plain,
    };

    let port = server.port.unwrap_or_else(|| tls_mode.default_port());

    let tls_server_name = server
        .tls
        .server_name
        .clone()
        .unwrap_or_else(|| server.host.clone());

    let cert_verification = if server.tls.verify_certificates.unwrap_or(true) {
        imap_tls::CertVerification::Verify
    } else {
        imap_tls::CertVerification::Insecure
    };

    if tls_mode == imap_tls::TlsMode::Plain {
        tracing::warn!(server_name = %server.name, "TLS is disabled, credentials travel in the clear");
    } else if cert_verification == imap_tls::CertVerification::Insecure {
        tracing::warn!(server_name = %server.name, "server certificate verification is disabled");
    }

    let auth = server_auth(&server.auth).map_err(ServerError::ServerAuth)?;

    Ok(Server {
        server_name: server.name.clone(),
        host: server.host.clone(),
        port,
        tls_mode,
        tls_server_name,
        cert_verification,
        auth,
    })
}

/// Bringup the server auth config.
pub fn server_auth(auth: &config_core::Auth) -> Result<ServerAuth, ServerAuthError> {
    Ok(match auth {
        config_core::Auth::Login(credentials) => {
            let password =
                resolve_password(&credentials.password).map_err(ServerAuthError::ResolvePassword)?;

            ServerAuth::Login {
                username: credentials.username.clone(),
                password,
            }
        }
        config_core::Auth::OAuth2Credentials(oauth2) => ServerAuth::OAuth2Credentials {
            user: oauth2.user.clone(),
            access_token: oauth2.access_token.clone(),
        },
    })
}

/// Resolve the password from config, including env lookups.
pub fn resolve_password(
    source: &config_core::PasswordSource,
) -> Result<String, ResolvePasswordError> {
    match source {
        config_core::PasswordSource::Plain(password) => Ok(password.clone()),
        config_core::PasswordSource::Env { env } => {
            let password: Option<String> =
                envfury::maybe(env.as_str()).map_err(|source| ResolvePasswordError::Env {
                    var: env.clone(),
                    source,
                })?;
            password.ok_or_else(|| ResolvePasswordError::EnvMissing { var: env.clone() })
        }
    }
}

/// Layer the timing config: mailbox over server over defaults.
pub fn timing(
    server: &config_core::TimingConfig,
    mailbox: &config_core::TimingConfig,
) -> Result<Timing, TimingError> {
    /// Pick the most specific value.
    fn pick<T: Copy>(
        field: impl Fn(&config_core::TimingConfig) -> Option<T>,
        mailbox: &config_core::TimingConfig,
        server: &config_core::TimingConfig,
        default: T,
    ) -> T {
        field(mailbox).or_else(|| field(server)).unwrap_or(default)
    }

    /// Reject zero.
    fn positive(knob: &'static str, secs: u64) -> Result<Duration, TimingError> {
        if secs == 0 {
            return Err(TimingError::Zero { knob });
        }
        Ok(Duration::from_secs(secs))
    }

    let idle_timeout = positive(
        "idle_timeout_secs",
        pick(|t| t.idle_timeout_secs, mailbox, server, DEFAULT_IDLE_TIMEOUT_SECS),
    )?;
    let renewal_threshold = positive(
        "renewal_threshold_secs",
        pick(
            |t| t.renewal_threshold_secs,
            mailbox,
            server,
            DEFAULT_RENEWAL_THRESHOLD_SECS,
        ),
    )?;
    let reconnect_cooldown = positive(
        "reconnect_cooldown_secs",
        pick(
            |t| t.reconnect_cooldown_secs,
            mailbox,
            server,
            DEFAULT_RECONNECT_COOLDOWN_SECS,
        ),
    )?;
    let reconnect_cooldown_max = pick(
        |t| t.reconnect_cooldown_max_secs,
        mailbox,
        server,
        reconnect_cooldown.as_secs(),
    );
    let reconnect_backoff_factor = pick(
        |t| t.reconnect_backoff_factor,
        mailbox,
        server,
        DEFAULT_RECONNECT_BACKOFF_FACTOR,
    );
    let io_timeout = positive(
        "io_timeout_secs",
        pick(|t| t.io_timeout_secs, mailbox, server, DEFAULT_IO_TIMEOUT_SECS),
    )?;

    Ok(Timing {
        idle_timeout,
        renewal_threshold,
        reconnect_cooldown,
        reconnect_cooldown_max: Duration::from_secs(reconnect_cooldown_max)
            .max(reconnect_cooldown),
        reconnect_backoff_factor: reconnect_backoff_factor.max(1),
        io_timeout,
    })
}

/// Build an IMAP mailbox config.
pub fn mailbox(
    server: Arc<Server>,
    core_server: &config_core::ServerConfig,
    core_mailbox: &config_core::MailboxConfig,
) -> Result<Mailbox, TimingError> {
    let timing = timing(&core_server.timing, &core_mailbox.timing)?;

    Ok(Mailbox {
        server,
        mailbox: core_mailbox.name.clone(),
        timing,
    })
}
