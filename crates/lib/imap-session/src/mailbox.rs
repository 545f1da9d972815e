//! The unseen-mailbox commands against the selected folder.

use std::future::Future;
use std::time::Duration;

use futures::TryStreamExt as _;
use imap_failure::{Classify, FailureKind};
use message_processor::{Fetched, RawMessage, UnseenMailbox};

use crate::AuthenticatedSession;

/// Errors returned by mailbox commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The session was already closed.
    #[error("session is closed")]
    Closed,

    /// The server or the connection failed the command.
    #[error("{command}: {source}")]
    Imap {
        /// The command.
        command: &'static str,

        /// The underlying error.
        #[source]
        source: async_imap::error::Error,
    },

    /// The command did not complete in time.
    #[error("{command} timed out after {after:?}")]
    Timeout {
        /// The command.
        command: &'static str,

        /// The bound that elapsed.
        after: Duration,
    },
}

impl Classify for CommandError {
    fn classify(&self) -> FailureKind {
        match self {
            Self::Closed | Self::Timeout { .. } => FailureKind::Transient,
            Self::Imap { source, .. } => source.classify(),
        }
    }
}

/// Run a command under the I/O bound.
async fn bounded<T>(
    command: &'static str,
    io_timeout: Duration,
    fut: impl Future<Output = async_imap::error::Result<T>>,
) -> Result<T, CommandError> {
    tokio::time::timeout(io_timeout, fut)
        .await
        .map_err(|_| CommandError::Timeout {
            command,
            after: io_timeout,
        })?
        .map_err(|source| CommandError::Imap { command, source })
}

/// Split a failed `UID FETCH` into what concerns only that message and what
/// leaves the session unusable.
fn per_message(err: CommandError) -> Result<Fetched, CommandError> {
    use async_imap::error::Error;

    match err {
        CommandError::Imap {
            source: Error::No(_) | Error::Bad(_) | Error::Parse(_),
            ..
        } => Ok(Fetched::Refused(Box::new(err))),
        CommandError::Timeout { .. } => Ok(Fetched::Stalled(Box::new(err))),
        err => Err(err),
    }
}

impl AuthenticatedSession {
    /// The connection, if still open.
    fn inner_mut(&mut self) -> Result<&mut crate::Inner, CommandError> {
        self.inner.as_mut().ok_or(CommandError::Closed)
    }
}

impl UnseenMailbox for AuthenticatedSession {
    type Error = CommandError;

    async fn search_unseen(&mut self) -> Result<Vec<u32>, Self::Error> {
        let io_timeout = self.io_timeout;
        let inner = self.inner_mut()?;
        let uids = bounded("UID SEARCH", io_timeout, inner.uid_search("UNSEEN")).await?;
        Ok(uids.into_iter().collect())
    }

    async fn fetch(&mut self, uid: u32) -> Result<Fetched, Self::Error> {
        let io_timeout = self.io_timeout;
        let inner = self.inner_mut()?;
        let result = bounded("UID FETCH", io_timeout, async move {
            inner
                .uid_fetch(uid.to_string(), "(UID INTERNALDATE BODY.PEEK[])")
                .await?
                .try_collect::<Vec<_>>()
                .await
        })
        .await;

        let fetches = match result {
            Ok(fetches) => fetches,
            Err(err) => return per_message(err),
        };

        // Unsolicited FETCH responses for other messages may be interleaved.
        let Some(fetch) = fetches.into_iter().find(|fetch| fetch.uid == Some(uid)) else {
            return Ok(Fetched::Vanished);
        };

        Ok(Fetched::Message(RawMessage {
            uid,
            body: fetch.body().map(<[u8]>::to_vec),
            internal_date: fetch.internal_date(),
        }))
    }

    async fn mark_seen(&mut self, uid: u32) -> Result<(), Self::Error> {
        let io_timeout = self.io_timeout;
        let inner = self.inner_mut()?;
        bounded("UID STORE", io_timeout, async move {
            inner
                .uid_store(uid.to_string(), "+FLAGS (\\Seen)")
                .await?
                .try_collect::<Vec<_>>()
                .await
        })
        .await?;
        Ok(())
    }
}
