//! Failure taxonomy of the mail watcher.
//!
//! Every error surfaced by a session step is mapped into one of three
//! [`FailureKind`]s. The supervisor is the only place that reacts to the
//! kind; everything below it just classifies and propagates.

use std::error::Error as StdError;

/// The boxed underlying cause of a failure.
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// How the supervisor should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Network blip, timeout or protocol abort. Retried after a cooldown.
    Transient,

    /// Credentials rejected or session expired. Retried after a cooldown,
    /// but likely needs operator attention if it persists.
    Authentication,

    /// Unrecoverable local error. Terminates the supervisor.
    Fatal,
}

impl FailureKind {
    /// Whether the supervisor should reconnect after this kind of failure.
    pub const fn is_retryable(self) -> bool {
        match self {
            Self::Transient | Self::Authentication => true,
            Self::Fatal => false,
        }
    }

    /// A short lowercase name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Authentication => "authentication",
            Self::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an error into a [`FailureKind`].
///
/// Implementations must be pure and total. Anything an implementation does
/// not recognize should be [`FailureKind::Transient`]: halting an always-on
/// watcher is worse than one needless reconnect.
pub trait Classify {
    /// Classify the error.
    fn classify(&self) -> FailureKind;
}

impl Classify for std::io::Error {
    fn classify(&self) -> FailureKind {
        // DNS, TCP, socket timeouts and aborts all land here.
        FailureKind::Transient
    }
}

impl Classify for tokio::time::error::Elapsed {
    fn classify(&self) -> FailureKind {
        FailureKind::Transient
    }
}

impl Classify for async_imap::error::Error {
    fn classify(&self) -> FailureKind {
        // Out of context a protocol error is a connection or server problem.
        // Steps where a rejection means something else (login) classify
        // their own errors.
        FailureKind::Transient
    }
}

/// A classified failure with its underlying cause.
#[derive(Debug, thiserror::Error)]
#[error("{kind} failure: {cause}")]
pub struct Failure {
    /// The classification.
    kind: FailureKind,

    /// The underlying cause.
    #[source]
    cause: Cause,
}

impl Failure {
    /// Create a failure of an explicit kind.
    pub fn new(kind: FailureKind, cause: impl Into<Cause>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    /// Create a failure by classifying the error.
    pub fn classified<E>(error: E) -> Self
    where
        E: Classify + StdError + Send + Sync + 'static,
    {
        Self {
            kind: error.classify(),
            cause: Box::new(error),
        }
    }

    /// A transient failure.
    pub fn transient(cause: impl Into<Cause>) -> Self {
        Self::new(FailureKind::Transient, cause)
    }

    /// An authentication failure.
    pub fn authentication(cause: impl Into<Cause>) -> Self {
        Self::new(FailureKind::Authentication, cause)
    }

    /// A fatal failure.
    pub fn fatal(cause: impl Into<Cause>) -> Self {
        Self::new(FailureKind::Fatal, cause)
    }

    /// The classification.
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The underlying cause.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// Take the underlying cause.
    pub fn into_cause(self) -> Cause {
        self.cause
    }
}
