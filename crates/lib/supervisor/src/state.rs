//! The per-mailbox connection state machine.

use imap_failure::FailureKind;

/// Where the supervisor is in a connection's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// About to open a new session.
    Connecting,

    /// Draining unseen messages on a live session.
    Fetching,

    /// Waiting for server activity on a live session.
    Idling,

    /// Closing a healthy session that reached its lifetime cap.
    Renewing,

    /// Closing a failed session and cooling down before reconnecting.
    Recovering {
        /// What went wrong.
        kind: FailureKind,
    },

    /// Stopped on an unrecoverable failure.
    Terminated {
        /// What went wrong.
        kind: FailureKind,
    },

    /// Stopped on request.
    Stopped,
}

/// What the last step of a state produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// A session was established.
    Opened,

    /// The step failed.
    Failed(FailureKind),

    /// The unseen messages were drained.
    Drained,

    /// The server reported a mailbox change.
    Activity,

    /// An idle wait ended without activity.
    IdleTimeout,

    /// The session has been live for the renewal threshold.
    RenewalDue,

    /// The session was closed.
    Closed,

    /// The reconnect cooldown is over.
    CooldownElapsed,

    /// Shutdown was requested.
    Cancelled,
}

/// Compute the next state.
///
/// Inputs that do not apply to a state leave it unchanged, and final states
/// absorb every input.
pub const fn transition(state: State, input: Input) -> State {
    match (state, input) {
        (State::Terminated { .. } | State::Stopped, _) => state,
        (_, Input::Cancelled) => State::Stopped,
        (State::Connecting | State::Fetching | State::Idling, Input::Failed(kind)) => {
            if kind.is_retryable() {
                State::Recovering { kind }
            } else {
                State::Terminated { kind }
            }
        }
        (State::Connecting, Input::Opened) => State::Fetching,
        (State::Fetching, Input::Drained) => State::Idling,
        (State::Idling, Input::Activity) => State::Fetching,
        (State::Idling, Input::IdleTimeout) => State::Idling,
        (State::Idling, Input::RenewalDue) => State::Renewing,
        (State::Renewing, Input::Closed) => State::Connecting,
        (State::Recovering { .. }, Input::CooldownElapsed) => State::Connecting,
        _ => state,
    }
}
