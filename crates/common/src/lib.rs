//! Types shared by the Clarity download crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
