//! Authentication.

use imap_failure::{Classify, FailureKind};

/// An auth error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Login failed.
    #[error("login: {0}")]
    Login(#[source] async_imap::error::Error),

    /// OAuth2 failed.
    #[error("oauth2: {0}")]
    OAuth2(#[source] async_imap::error::Error),
}

impl Classify for Error {
    fn classify(&self) -> FailureKind {
        let (Self::Login(err) | Self::OAuth2(err)) = self;
        match err {
            // The connection broke before the server answered.
            async_imap::error::Error::Io(_) | async_imap::error::Error::ConnectionLost => {
                FailureKind::Transient
            }
            _ => FailureKind::Authentication,
        }
    }
}

/// Auth params.
#[derive(Clone, PartialEq)]
pub enum Params<'a> {
    /// Username/password login.
    Login {
        /// Username for IMAP authentication.
        ///
        /// Typically an email address.
        username: &'a str,

        /// Password for IMAP authentication.
        password: &'a str,
    },

    /// OAuth 2 authentication.
    OAuth2 {
        /// The user for IMAP authentication.
        ///
        /// Typically an email address.
        user: &'a str,

        /// The access token for IMAP authentication.
        access_token: &'a str,
    },
}

impl std::fmt::Debug for Params<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::OAuth2 { user, .. } => f
                .debug_struct("OAuth2")
                .field("user", user)
                .finish_non_exhaustive(),
        }
    }
}

/// Authenticate to the client to obtain a session.
pub(crate) async fn execute(
    client: imap_connect::Client,
    auth: Params<'_>,
) -> Result<crate::Inner, Error> {
    match auth {
        Params::Login { username, password } => client
            .login(username, password)
            .await
            .map_err(|(err, _client)| err)
            .map_err(Error::Login),
        Params::OAuth2 { user, access_token } => client
            .authenticate("XOAUTH2", OAuth2Authenticator { user, access_token })
            .await
            .map_err(|(err, _client)| err)
            .map_err(Error::OAuth2),
    }
}

/// An internal OAuth 2 authenticator for provided credentials.
struct OAuth2Authenticator<'a> {
    /// User.
    user: &'a str,

    /// Access token.
    access_token: &'a str,
}

impl async_imap::Authenticator for OAuth2Authenticator<'_> {
    type Response = String;

    fn process(&mut self, _: &[u8]) -> Self::Response {
        format!(
            "user={}\x01auth=Bearer {}\x01\x01",
            self.user, self.access_token
        )
    }
}
