//! Error types for share-code redemption and token handling

use reqwest::StatusCode;

/// Errors from establishing a session or reading the bearer token.
///
/// None of these are recoverable: a session that cannot be established or a
/// token that cannot be read leaves nothing to retry against.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid share code: {0}")]
    InvalidShareCode(String),

    #[error("{step} returned unexpected status {status}")]
    Handshake {
        step: &'static str,
        status: StatusCode,
    },

    #[error("invalid redemption response: {0}")]
    InvalidRedemption(String),

    #[error("sharing login did not set a session cookie")]
    MissingSessionCookie,

    #[error("token decode failed: {0}")]
    TokenDecode(String),

    #[error("HTTP request failed during {context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl Error {
    /// Wrap a transport failure with the step it happened in.
    pub fn transport(context: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Error::Transport { context, source }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
