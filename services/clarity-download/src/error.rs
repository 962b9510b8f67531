//! Command-level errors
//!
//! Portal and transport failures arrive as `clarity_client::Error` and are
//! reported through `anyhow` in `main`. These cover mistakes in the
//! invocation itself, caught before any request is made.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid period {input:?}: {reason}")]
    InvalidPeriod { input: String, reason: String },

    #[error("nothing to download: pass --csv and/or --report")]
    NothingToDownload,
}

pub type Result<T> = std::result::Result<T, Error>;
