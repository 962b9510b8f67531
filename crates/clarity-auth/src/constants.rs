//! Clarity portal constants shared by the handshake and the client
//!
//! Paths are relative to the portal base URL so that tests and alternate
//! deployments can point the client elsewhere.

/// Production portal origin
pub const DEFAULT_BASE_URL: &str = "https://clarity.dexcom.com";

/// Exchanges a share code for a bearer token (`?accesscode=<code>`)
pub const REDEEM_PATH: &str = "/api/access_code/redeem";

/// Browser-style sharing login; answers 302 with the session cookie
pub const SHARING_LOGIN_PATH: &str = "/user/sharing";

/// Referer presented on the sharing login, relative to the base URL
pub const SHARING_REFERER_PATH: &str = "/professional/";

/// Name of the cookie set by the sharing login
pub const SESSION_COOKIE_NAME: &str = "_rogue_material_session";

/// Header carrying the bearer token on authenticated requests
pub const ACCESS_TOKEN_HEADER: &str = "Access-Token";

/// Status the sharing login must answer with. Anything else, including 200,
/// means the code was not accepted.
pub const SHARING_LOGIN_STATUS: reqwest::StatusCode = reqwest::StatusCode::FOUND;
