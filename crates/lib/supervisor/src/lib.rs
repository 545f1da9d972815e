//! Always-reconnecting supervision of one mailbox.
//!
//! [`run`] keeps a session to the mailbox open, drains unseen mail into the
//! sink, idles between drains, renews the session before the server would
//! cut it off, and reconnects after every retryable failure. Only a fatal
//! failure or cancellation makes it return.

use std::future::Future;
use std::time::Duration;

use imap_failure::{Cause, Failure, FailureKind};
use imap_idle::IdleOutcome;
use message_processor::{DrainReport, Sink};
use tokio_util::sync::CancellationToken;

pub mod state;

pub use state::{Input, State, transition};

/// Something that can open sessions to the mailbox.
pub trait Transport {
    /// The session type.
    type Session: Session;

    /// Open a fully set up session.
    fn open(&mut self) -> impl Future<Output = Result<Self::Session, Failure>> + Send;
}

/// A live session to the mailbox.
pub trait Session {
    /// One bounded idle wait.
    fn wait_for_activity(&mut self, timeout: Duration) -> impl Future<Output = IdleOutcome> + Send;

    /// Deliver every unseen message to the sink.
    fn drain_unseen<Consumer>(
        &mut self,
        sink: &mut Consumer,
    ) -> impl Future<Output = Result<DrainReport, Failure>> + Send
    where
        Consumer: Sink + Send;

    /// Release the connection.
    ///
    /// Must be idempotent.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Event sent to the notifier.
#[derive(Debug)]
pub enum SupervisorEvent {
    /// A session is about to be opened.
    Connecting {
        /// Consecutive attempts since the last established session,
        /// starting at 1.
        attempt: u32,
    },

    /// A session was established.
    Connected {
        /// When.
        started_at: chrono::DateTime<chrono::Utc>,
    },

    /// Unseen messages were drained.
    Drained {
        /// What the drain did.
        report: DrainReport,
    },

    /// The session reached the renewal threshold and is being replaced.
    Renewing {
        /// How long it was live.
        live_for: Duration,
    },

    /// A retryable failure happened; the session is closed.
    Recovering {
        /// The failure.
        failure: Failure,

        /// The time to wait before the next attempt.
        next_retry_in: Duration,
    },

    /// A fatal failure happened; the supervisor is returning an error.
    Terminated {
        /// What went wrong.
        kind: FailureKind,
    },

    /// Cancellation was observed; the supervisor is returning.
    Stopped,
}

/// Timing of the supervisor.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Upper bound of one idle wait.
    pub idle_timeout: Duration,

    /// Session age at which it is proactively replaced.
    pub renewal_threshold: Duration,

    /// The cooldown before reconnecting after a failure.
    ///
    /// Reset whenever a session is established.
    pub cooldown: exp_backoff::State,
}

/// Parameters for [`run`].
pub struct Params<Link, Consumer, Notifier, Sleep> {
    /// Opens sessions.
    pub transport: Link,

    /// Receives message records.
    pub sink: Consumer,

    /// Notifier for events.
    pub notifier: Notifier,

    /// Sleep timer.
    pub sleep: Sleep,

    /// Timing.
    pub settings: Settings,

    /// Shutdown signal.
    pub cancel: CancellationToken,
}

/// The supervisor gave up on an unrecoverable failure.
#[derive(Debug, thiserror::Error)]
#[error(
    "{kind} failure (last session started: {}): {cause}",
    display_started_at(.last_session_started_at)
)]
pub struct Terminated {
    /// What went wrong.
    pub kind: FailureKind,

    /// The underlying cause.
    #[source]
    pub cause: Cause,

    /// When the last session was established, if any ever was.
    pub last_session_started_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Render the last session start for the error message.
fn display_started_at(started_at: &Option<chrono::DateTime<chrono::Utc>>) -> String {
    started_at.map_or_else(|| "never".to_owned(), |started_at| started_at.to_rfc3339())
}

/// Supervise the mailbox until cancelled or a fatal failure.
pub async fn run<Link, Consumer, Notifier, NotifierFut, Sleep, SleepFut>(
    params: Params<Link, Consumer, Notifier, Sleep>,
) -> Result<(), Terminated>
where
    Link: Transport,
    Consumer: Sink + Send,
    Notifier: FnMut(SupervisorEvent) -> NotifierFut,
    NotifierFut: Future<Output = ()>,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    let Params {
        mut transport,
        mut sink,
        mut notifier,
        mut sleep,
        settings,
        cancel,
    } = params;

    let Settings {
        idle_timeout,
        renewal_threshold,
        mut cooldown,
    } = settings;

    let mut state = State::Connecting;

    // At most one session at a time, and only while live.
    let mut slot: Option<Link::Session> = None;

    let mut started = tokio::time::Instant::now();
    let mut last_session_started_at = None;
    let mut pending_failure: Option<Failure> = None;
    let mut attempt: u32 = 0;

    loop {
        let input = match state {
            State::Connecting => {
                if cancel.is_cancelled() {
                    Input::Cancelled
                } else {
                    attempt = attempt.saturating_add(1);
                    (notifier)(SupervisorEvent::Connecting { attempt }).await;

                    match transport.open().await {
                        Ok(session) => {
                            slot = Some(session);
                            started = tokio::time::Instant::now();
                            let started_at = chrono::Utc::now();
                            last_session_started_at = Some(started_at);
                            attempt = 0;
                            cooldown.reset();
                            (notifier)(SupervisorEvent::Connected { started_at }).await;
                            Input::Opened
                        }
                        Err(failure) => fail(&mut pending_failure, failure),
                    }
                }
            }

            State::Fetching => match slot.as_mut() {
                Some(session) => match session.drain_unseen(&mut sink).await {
                    Ok(report) => {
                        (notifier)(SupervisorEvent::Drained { report }).await;
                        Input::Drained
                    }
                    Err(failure) => fail(&mut pending_failure, failure),
                },
                None => fail(&mut pending_failure, no_session()),
            },

            State::Idling => {
                let live_for = started.elapsed();
                if cancel.is_cancelled() {
                    Input::Cancelled
                } else if live_for >= renewal_threshold {
                    Input::RenewalDue
                } else {
                    match slot.as_mut() {
                        Some(session) => {
                            let timeout = idle_timeout.min(renewal_threshold - live_for);
                            match session.wait_for_activity(timeout).await {
                                IdleOutcome::Activity => Input::Activity,
                                IdleOutcome::Timeout => Input::IdleTimeout,
                                IdleOutcome::Error(failure) => {
                                    fail(&mut pending_failure, failure)
                                }
                            }
                        }
                        None => fail(&mut pending_failure, no_session()),
                    }
                }
            }

            State::Renewing => {
                (notifier)(SupervisorEvent::Renewing {
                    live_for: started.elapsed(),
                })
                .await;
                close(&mut slot).await;
                Input::Closed
            }

            State::Recovering { kind } => {
                close(&mut slot).await;

                let next_retry_in = cooldown.advance();
                let failure = pending_failure
                    .take()
                    .unwrap_or_else(|| Failure::new(kind, "failure cause unavailable"));
                (notifier)(SupervisorEvent::Recovering {
                    failure,
                    next_retry_in,
                })
                .await;

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => Input::Cancelled,
                    () = (sleep)(next_retry_in) => Input::CooldownElapsed,
                }
            }

            State::Terminated { kind } => {
                close(&mut slot).await;
                (notifier)(SupervisorEvent::Terminated { kind }).await;

                let cause = pending_failure.take().map_or_else(
                    || Cause::from("failure cause unavailable"),
                    Failure::into_cause,
                );
                return Err(Terminated {
                    kind,
                    cause,
                    last_session_started_at,
                });
            }

            State::Stopped => {
                close(&mut slot).await;
                (notifier)(SupervisorEvent::Stopped).await;
                return Ok(());
            }
        };

        let next = transition(state, input);
        tracing::trace!(?state, ?input, ?next, "supervisor transition");
        state = next;
    }
}

/// Keep the failure for the recovery step and turn it into an input.
fn fail(pending: &mut Option<Failure>, failure: Failure) -> Input {
    let kind = failure.kind();
    *pending = Some(failure);
    Input::Failed(kind)
}

/// The failure for a live state without a session.
fn no_session() -> Failure {
    Failure::transient("no live session")
}

/// Close the session in the slot, if any.
async fn close<S: Session>(slot: &mut Option<S>) {
    if let Some(mut session) = slot.take() {
        session.close().await;
    }
}

#[cfg(test)]
mod tests;
