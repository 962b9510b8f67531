//! Share-code authentication for the Dexcom Clarity portal
//!
//! Turns a short, human-entered share code into the pair of credentials every
//! later portal call needs: a bearer token and a session cookie. Also reads the
//! subject identifier out of the (unverified) bearer token.
//!
//! Handshake:
//! 1. `ShareCode::parse()` strips separators from the user's input
//! 2. `session::redeem_access_code()` trades the bare code for a bearer token
//! 3. `session::sharing_login()` posts the dash-grouped code and reads the
//!    cookie off the `302` response
//! 4. `session::establish()` runs both and returns a `Session`

pub mod constants;
pub mod error;
pub mod session;
pub mod share_code;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use session::{Session, establish, http_client};
pub use share_code::{ShareCode, insert_dashes, strip_separators};
pub use token::{decode_claims, subject_id};
