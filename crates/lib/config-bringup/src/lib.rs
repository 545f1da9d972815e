//! Lift raw config into per-mailbox runtime parameters.

use std::sync::Arc;

mod error;
mod internal;
mod types;

pub use error::*;
pub use types::*;

/// Default IDLE wait bound (seconds).
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 45;

/// Default session age at which it is renewed (seconds): 29 minutes, under
/// the usual 30 minute server cap.
pub const DEFAULT_RENEWAL_THRESHOLD_SECS: u64 = 29 * 60;

/// Default reconnect cooldown (seconds).
pub const DEFAULT_RECONNECT_COOLDOWN_SECS: u64 = 60;

/// Default cooldown growth factor; `1` keeps the cooldown fixed.
pub const DEFAULT_RECONNECT_BACKOFF_FACTOR: u32 = 1;

/// Default network operation bound (seconds).
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 30;

/// Resolve every configured mailbox.
///
/// Secrets are looked up and timing is validated here, so nothing is
/// connected to with a half-valid configuration.
pub fn mailboxes(config: &config_core::Config) -> Result<Vec<Mailbox>, ConfigError> {
    let mut mailboxes = Vec::new();

    for core_server in &config.servers {
        let server = internal::server(core_server).map_err(|source| ConfigError::Server {
            name: core_server.name.clone(),
            source,
        })?;
        let server = Arc::new(server);

        for core_mailbox in &core_server.mailboxes {
            let mailbox = internal::mailbox(Arc::clone(&server), core_server, core_mailbox)
                .map_err(|source| ConfigError::Mailbox {
                    server: core_server.name.clone(),
                    mailbox: core_mailbox.name.clone(),
                    source,
                })?;
            mailboxes.push(mailbox);
        }
    }

    Ok(mailboxes)
}

/// Resolve every configured server, without their mailboxes.
pub fn servers(config: &config_core::Config) -> Result<Vec<Server>, ConfigError> {
    config
        .servers
        .iter()
        .map(|core_server| {
            internal::server(core_server).map_err(|source| ConfigError::Server {
                name: core_server.name.clone(),
                source,
            })
        })
        .collect()
}
