//! One bounded IMAP IDLE wait.

use std::time::Duration;

use async_imap::extensions::idle::IdleResponse;
use async_imap::types::UnsolicitedResponse;
use async_imap::imap_proto::{Response, Status};
use imap_failure::{Classify, Failure, FailureKind};

/// The result of one idle wait.
#[derive(Debug)]
pub enum IdleOutcome {
    /// The server reported a mailbox change.
    Activity,

    /// Nothing happened within the bound.
    Timeout,

    /// The wait failed; the session is gone.
    Error(Failure),
}

/// Errors returned while idling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Entering IDLE failed.
    #[error("IDLE init error: {0}")]
    Init(#[source] async_imap::error::Error),

    /// Waiting for the server failed.
    #[error("IDLE wait error: {0}")]
    Wait(#[source] async_imap::error::Error),

    /// Leaving IDLE failed.
    #[error("IDLE done error: {0}")]
    Done(#[source] async_imap::error::Error),

    /// Entering or leaving IDLE did not complete in time.
    #[error("IDLE {step} timed out after {after:?}")]
    Timeout {
        /// The step that timed out.
        step: &'static str,

        /// The bound that elapsed.
        after: Duration,
    },
}

impl Classify for Error {
    fn classify(&self) -> FailureKind {
        match self {
            Self::Init(err) | Self::Wait(err) | Self::Done(err) => err.classify(),
            Self::Timeout { .. } => FailureKind::Transient,
        }
    }
}

/// Enter IDLE, wait up to `timeout` for the server to push something, then
/// leave IDLE.
///
/// New mail the server announced while other commands ran is reported as
/// [`IdleOutcome::Activity`] right away, without idling.
///
/// `io_timeout` bounds entering and leaving IDLE. The session is handed back
/// unless the wait failed.
pub async fn wait_for_activity<T>(
    session: async_imap::Session<T>,
    timeout: Duration,
    io_timeout: Duration,
) -> (Option<async_imap::Session<T>>, IdleOutcome)
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + std::fmt::Debug,
{
    let pending = std::iter::from_fn(|| session.unsolicited_responses.try_recv().ok());
    if any_activity(pending) {
        tracing::debug!("new mail announced outside of idle");
        return (Some(session), IdleOutcome::Activity);
    }

    match idle_once(session, timeout, io_timeout).await {
        Ok((session, outcome)) => (Some(session), outcome),
        Err(err) => {
            tracing::debug!(%err, "idle wait failed");
            (None, IdleOutcome::Error(Failure::classified(err)))
        }
    }
}

/// The fallible part of [`wait_for_activity`].
async fn idle_once<T>(
    session: async_imap::Session<T>,
    timeout: Duration,
    io_timeout: Duration,
) -> Result<(async_imap::Session<T>, IdleOutcome), Error>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + std::fmt::Debug,
{
    let mut idle_handle = session.idle();

    tokio::time::timeout(io_timeout, idle_handle.init())
        .await
        .map_err(|_| Error::Timeout {
            step: "init",
            after: io_timeout,
        })?
        .map_err(Error::Init)?;

    let outcome = {
        // Dropping the stop source would interrupt the wait.
        let (idle_wait, _interrupt) = idle_handle.wait_with_timeout(timeout);
        outcome_of(&idle_wait.await.map_err(Error::Wait)?)
    };

    let session = tokio::time::timeout(io_timeout, idle_handle.done())
        .await
        .map_err(|_| Error::Timeout {
            step: "done",
            after: io_timeout,
        })?
        .map_err(Error::Done)?;

    Ok((session, outcome))
}

/// Map the way a wait ended to an outcome.
fn outcome_of(response: &IdleResponse) -> IdleOutcome {
    match response {
        IdleResponse::NewData(data) if is_activity(data.parsed()) => {
            tracing::debug!("idle notified of new data");
            IdleOutcome::Activity
        }
        IdleResponse::NewData(_) => {
            tracing::trace!("idle keepalive");
            IdleOutcome::Timeout
        }
        IdleResponse::Timeout | IdleResponse::ManualInterrupt => IdleOutcome::Timeout,
    }
}

/// Whether any of the responses queued outside of IDLE announce new or
/// changed messages. Consumes all of them.
fn any_activity(responses: impl Iterator<Item = UnsolicitedResponse>) -> bool {
    responses.fold(false, |found, response| {
        let announces = match &response {
            UnsolicitedResponse::Exists(_) => true,
            UnsolicitedResponse::Recent(count) => *count > 0,
            UnsolicitedResponse::Other(data) => matches!(data.parsed(), Response::Fetch(..)),
            _ => false,
        };
        tracing::trace!(?response, announces, "unsolicited response");
        found || announces
    })
}

/// Whether an unsolicited response says the mailbox changed.
///
/// Untagged `OK` status lines are keepalives. Anything else counts.
fn is_activity(response: &Response<'_>) -> bool {
    !matches!(
        response,
        Response::Data {
            status: Status::Ok,
            ..
        } | Response::Continue { .. }
    )
}
