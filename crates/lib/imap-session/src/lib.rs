//! An authenticated IMAP session with a selected folder.
//!
//! [`AuthenticatedSession::open`] either yields a session that is logged in,
//! known to support `IDLE` and has the folder selected, or an [`OpenError`].
//! No half-initialized session is ever handed out.

use std::time::Duration;

use imap_failure::{Classify, Failure, FailureKind};

pub mod auth;
mod mailbox;

pub use mailbox::CommandError;

/// The underlying async IMAP session type.
pub type Inner = async_imap::Session<imap_connect::Stream>;

/// IMAP session params.
#[derive(Debug, Clone, PartialEq)]
pub struct Params<'a> {
    /// Connect params.
    pub connect: imap_connect::Params<'a>,

    /// Auth params.
    pub auth: auth::Params<'a>,

    /// The folder to select, in wire form.
    pub mailbox: &'a str,
}

/// Errors returned while opening a session.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// IMAP connection error.
    #[error("connect: {0}")]
    Connect(#[source] imap_connect::Error),

    /// IMAP auth error.
    #[error("auth: {0}")]
    Auth(#[source] auth::Error),

    /// A step did not complete in time.
    #[error("{step} timed out after {after:?}")]
    Timeout {
        /// The step that timed out.
        step: &'static str,

        /// The bound that elapsed.
        after: Duration,
    },

    /// Capabilities query error.
    #[error("capabilities: {0}")]
    Capabilities(#[source] async_imap::error::Error),

    /// The server does not advertise the IDLE capability.
    #[error("IMAP server does not advertise IDLE capability")]
    IdleNotSupported,

    /// Folder selection error.
    #[error("select {mailbox:?}: {source}")]
    Select {
        /// The folder.
        mailbox: String,

        /// The underlying error.
        #[source]
        source: async_imap::error::Error,
    },
}

impl Classify for OpenError {
    fn classify(&self) -> FailureKind {
        match self {
            Self::Connect(err) => err.classify(),
            Self::Auth(err) => err.classify(),
            Self::Timeout { .. } => FailureKind::Transient,
            Self::Capabilities(err) => err.classify(),
            Self::IdleNotSupported => FailureKind::Fatal,
            // Servers answer NO to SELECT while a folder is being migrated.
            Self::Select { source, .. } => source.classify(),
        }
    }
}

impl From<OpenError> for Failure {
    fn from(err: OpenError) -> Self {
        Failure::classified(err)
    }
}

/// One live connection: logged in, `IDLE`-capable, folder selected.
pub struct AuthenticatedSession {
    /// The connection, `None` once closed.
    inner: Option<Inner>,

    /// `host:port`, for logs.
    server: String,

    /// The selected folder.
    mailbox: String,

    /// Bound for every command.
    io_timeout: Duration,

    /// When the session was established.
    opened_at: chrono::DateTime<chrono::Utc>,

    /// Monotonic counterpart of `opened_at`.
    started: tokio::time::Instant,
}

impl std::fmt::Debug for AuthenticatedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedSession")
            .field("server", &self.server)
            .field("mailbox", &self.mailbox)
            .field("open", &self.is_open())
            .field("opened_at", &self.opened_at)
            .finish()
    }
}

impl AuthenticatedSession {
    /// Connect, log in, check for `IDLE` and select the folder.
    pub async fn open(params: Params<'_>) -> Result<Self, OpenError> {
        let Params {
            connect,
            auth,
            mailbox,
        } = params;

        let io_timeout = connect.io_timeout;
        let server = format!("{}:{}", connect.host, connect.port);

        let mut inner = login(connect, auth).await?;

        if let Err(err) = prepare(&mut inner, mailbox, io_timeout).await {
            logout(inner, io_timeout).await;
            return Err(err);
        }

        tracing::info!(imap_server = %server, imap_mailbox = %mailbox, "session established");

        Ok(Self {
            inner: Some(inner),
            server,
            mailbox: mailbox.to_owned(),
            io_timeout,
            opened_at: chrono::Utc::now(),
            started: tokio::time::Instant::now(),
        })
    }

    /// Log out and drop the connection.
    ///
    /// Idempotent. Never fails; logout problems are only logged.
    pub async fn close(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        tracing::debug!(
            imap_server = %self.server,
            imap_mailbox = %self.mailbox,
            opened_at = %self.opened_at,
            live_for = ?self.live_for(),
            "closing session"
        );
        logout(inner, self.io_timeout).await;
    }

    /// Whether the connection is still held.
    pub const fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// How long the session has been live.
    pub fn live_for(&self) -> Duration {
        self.started.elapsed()
    }

    /// One bounded idle wait.
    ///
    /// A failed wait closes the session.
    pub async fn wait_for_activity(&mut self, timeout: Duration) -> imap_idle::IdleOutcome {
        let Some(inner) = self.inner.take() else {
            return imap_idle::IdleOutcome::Error(Failure::classified(CommandError::Closed));
        };
        let (inner, outcome) = imap_idle::wait_for_activity(inner, timeout, self.io_timeout).await;
        self.inner = inner;
        outcome
    }
}

/// Connect and log in, without selecting a folder.
pub async fn login(
    connect: imap_connect::Params<'_>,
    auth: auth::Params<'_>,
) -> Result<Inner, OpenError> {
    let io_timeout = connect.io_timeout;
    let host = connect.host;

    let client = imap_connect::connect(connect)
        .await
        .map_err(OpenError::Connect)?;

    let inner = tokio::time::timeout(io_timeout, auth::execute(client, auth))
        .await
        .map_err(|_| OpenError::Timeout {
            step: "login",
            after: io_timeout,
        })?
        .map_err(OpenError::Auth)?;

    tracing::debug!(imap_host = %host, "logged in");

    Ok(inner)
}

/// Check for `IDLE` support and select the folder.
async fn prepare(inner: &mut Inner, mailbox: &str, io_timeout: Duration) -> Result<(), OpenError> {
    let capabilities = tokio::time::timeout(io_timeout, inner.capabilities())
        .await
        .map_err(|_| OpenError::Timeout {
            step: "CAPABILITY",
            after: io_timeout,
        })?
        .map_err(OpenError::Capabilities)?;

    if !capabilities.has_str("IDLE") {
        return Err(OpenError::IdleNotSupported);
    }

    let selected = tokio::time::timeout(io_timeout, inner.select(mailbox))
        .await
        .map_err(|_| OpenError::Timeout {
            step: "SELECT",
            after: io_timeout,
        })?
        .map_err(|source| OpenError::Select {
            mailbox: mailbox.to_owned(),
            source,
        })?;

    tracing::debug!(
        imap_mailbox = %mailbox,
        exists = selected.exists,
        uid_validity = ?selected.uid_validity,
        "mailbox selected"
    );

    Ok(())
}

/// Best-effort `LOGOUT`, then drop the connection.
async fn logout(mut inner: Inner, io_timeout: Duration) {
    match tokio::time::timeout(io_timeout, inner.logout()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::debug!(%err, "logout failed"),
        Err(_) => tracing::debug!(?io_timeout, "logout timed out"),
    }
}
