//! Mailbox watching entrypoint.

use std::time::Duration;

use imap_failure::Failure;
use imap_idle::IdleOutcome;
use imap_session::AuthenticatedSession;
use message_processor::{DrainReport, Sink};

/// Opens sessions to one configured mailbox.
#[derive(Debug, Clone)]
pub struct ImapTransport {
    /// The mailbox.
    mailbox: config_bringup::Mailbox,
}

impl ImapTransport {
    /// A transport for the mailbox.
    pub const fn new(mailbox: config_bringup::Mailbox) -> Self {
        Self { mailbox }
    }
}

impl supervisor::Transport for ImapTransport {
    type Session = MailboxSession;

    async fn open(&mut self) -> Result<MailboxSession, Failure> {
        let session = AuthenticatedSession::open(session_params(&self.mailbox)).await?;
        Ok(MailboxSession(session))
    }
}

/// A live session to the mailbox.
#[derive(Debug)]
pub struct MailboxSession(AuthenticatedSession);

impl supervisor::Session for MailboxSession {
    fn wait_for_activity(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = IdleOutcome> + Send {
        self.0.wait_for_activity(timeout)
    }

    fn drain_unseen<Consumer>(
        &mut self,
        sink: &mut Consumer,
    ) -> impl Future<Output = Result<DrainReport, Failure>> + Send
    where
        Consumer: Sink + Send,
    {
        message_processor::drain_unseen(&mut self.0, sink)
    }

    fn close(&mut self) -> impl Future<Output = ()> + Send {
        self.0.close()
    }
}

/// Build the session params for a mailbox.
pub fn session_params(mailbox: &config_bringup::Mailbox) -> imap_session::Params<'_> {
    imap_session::Params {
        connect: connect_params(&mailbox.server, mailbox.timing.io_timeout),
        auth: auth_params(&mailbox.server.auth),
        mailbox: &mailbox.mailbox,
    }
}

/// Build the connect params for a server.
pub fn connect_params(
    server: &config_bringup::Server,
    io_timeout: Duration,
) -> imap_connect::Params<'_> {
    let config_bringup::Server {
        server_name: _,
        host,
        port,
        tls_mode,
        tls_server_name,
        cert_verification,
        auth: _,
    } = server;

    imap_connect::Params {
        host,
        port: *port,
        tls_mode: *tls_mode,
        tls_server_name,
        cert_verification: *cert_verification,
        io_timeout,
    }
}

/// Build the auth params for a server.
pub fn auth_params(auth: &config_bringup::ServerAuth) -> imap_session::auth::Params<'_> {
    match auth {
        config_bringup::ServerAuth::Login { username, password } => {
            imap_session::auth::Params::Login { username, password }
        }
        config_bringup::ServerAuth::OAuth2Credentials { user, access_token } => {
            imap_session::auth::Params::OAuth2 { user, access_token }
        }
    }
}

/// The supervisor timing for a mailbox.
pub fn settings(timing: &config_bringup::Timing) -> supervisor::Settings {
    supervisor::Settings {
        idle_timeout: timing.idle_timeout,
        renewal_threshold: timing.renewal_threshold,
        cooldown: exp_backoff::State::new(
            timing.reconnect_cooldown,
            timing.reconnect_backoff_factor,
            timing.reconnect_cooldown_max,
        ),
    }
}

/// Watch a mailbox until cancelled or a fatal failure.
pub async fn watch_mailbox<Consumer, Notify, NotifyFut>(
    mailbox: config_bringup::Mailbox,
    sink: Consumer,
    notify: Notify,
    cancel: tokio_util::sync::CancellationToken,
) -> Result<(), supervisor::Terminated>
where
    Consumer: Sink + Send,
    Notify: FnMut(supervisor::SupervisorEvent) -> NotifyFut,
    NotifyFut: Future<Output = ()>,
{
    tracing::info!(
        server_name = %mailbox.server.server_name,
        imap_host = %mailbox.server.host,
        imap_port = mailbox.server.port,
        imap_mailbox = %mailbox.mailbox,
        imap_tls_mode = ?mailbox.server.tls_mode,
        "starting IMAP watcher"
    );

    let settings = settings(&mailbox.timing);

    supervisor::run(supervisor::Params {
        transport: ImapTransport::new(mailbox),
        sink,
        notifier: notify,
        sleep: tokio::time::sleep,
        settings,
        cancel,
    })
    .await
}
