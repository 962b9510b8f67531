//! Error types for authenticated portal operations

use reqwest::StatusCode;

/// Errors from the authenticated client, exports, and report rendering.
///
/// Every variant is fatal to the operation that produced it. Nothing in this
/// crate retries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] clarity_auth::Error),

    #[error("HTTP request failed during {context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned {status}: {body}")]
    Upstream {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("invalid {endpoint} response: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },

    #[error("invalid report request: {0}")]
    InvalidRequest(String),

    #[error("report still not complete after {attempts} polls")]
    PollLimit { attempts: u32 },

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Wrap a transport failure with the endpoint it happened on.
    pub fn transport(context: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Error::Transport { context, source }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
