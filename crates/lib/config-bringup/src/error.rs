//! Error types.

/// Config bringup error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to bringup server.
    #[error("server \"{name}\": {source}")]
    Server {
        /// The server name.
        name: String,

        /// The underlying error.
        #[source]
        source: ServerError,
    },

    /// Failed to bringup mailbox.
    #[error("server \"{server}\" mailbox \"{mailbox}\": {source}")]
    Mailbox {
        /// The server name.
        server: String,

        /// The mailbox name.
        mailbox: String,

        /// The underlying error.
        #[source]
        source: TimingError,
    },
}

/// Server bringup error.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bringup server auth.
    #[error("server auth: {0}")]
    ServerAuth(#[source] ServerAuthError),
}

/// Server auth bringup error.
#[derive(Debug, thiserror::Error)]
pub enum ServerAuthError {
    /// Failed to resolve the password.
    #[error("resolve password: {0}")]
    ResolvePassword(#[source] ResolvePasswordError),
}

/// Errors returned while resolving password.
#[derive(Debug, thiserror::Error)]
pub enum ResolvePasswordError {
    /// Failed to read the env var.
    #[error("env var {var}: {source}")]
    Env {
        /// The variable name.
        var: String,

        /// The underlying error.
        #[source]
        source: envfury::Error<envfury::ValueError<std::convert::Infallible>>,
    },

    /// The env var is not set.
    #[error("env var {var} is not set")]
    EnvMissing {
        /// The variable name.
        var: String,
    },
}

/// Invalid timing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimingError {
    /// A knob that must be positive is zero.
    #[error("{knob} must be greater than zero")]
    Zero {
        /// The config key.
        knob: &'static str,
    },
}
