//! Share-code session handshake
//!
//! Establishing a session takes two calls:
//! 1. `GET /api/access_code/redeem?accesscode=<code>` returns the bearer token
//! 2. `POST /user/sharing` with the dash-grouped code answers `302 Found` and
//!    sets the session cookie
//!
//! The second step only means something if the redirect is observed rather
//! than followed, so the HTTP client used here must have redirects disabled.
//! [`http_client`] builds one.

use std::time::Duration;

use common::Secret;
use reqwest::header::{HeaderMap, ORIGIN, REFERER, SET_COOKIE};
use serde::Deserialize;
use tracing::{debug, info};

use crate::constants::{
    REDEEM_PATH, SESSION_COOKIE_NAME, SHARING_LOGIN_PATH, SHARING_LOGIN_STATUS,
    SHARING_REFERER_PATH,
};
use crate::error::{Error, Result};
use crate::share_code::ShareCode;
use crate::token;

/// Credentials for one authenticated portal session.
///
/// Immutable once established. Both values are redacted in `Debug`.
#[derive(Debug, Clone)]
pub struct Session {
    access_token: Secret<String>,
    session_cookie: Secret<String>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, session_cookie: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            session_cookie: Secret::new(session_cookie.into()),
        }
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose()
    }

    pub fn session_cookie(&self) -> &str {
        self.session_cookie.expose()
    }

    /// Subject identifier from the bearer token's claims. No I/O.
    pub fn subject_id(&self) -> Result<String> {
        token::subject_id(self.access_token())
    }
}

/// Body of a successful redemption.
#[derive(Debug, Deserialize)]
struct RedeemResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Build an HTTP client suitable for the handshake and for authenticated calls.
///
/// Redirects are never followed.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(Error::transport("building HTTP client"))
}

/// Redeem a share code for a bearer token.
pub async fn redeem_access_code(
    client: &reqwest::Client,
    base_url: &str,
    code: &ShareCode,
) -> Result<String> {
    let url = format!("{}{REDEEM_PATH}", base_url.trim_end_matches('/'));
    let response = client
        .get(&url)
        .query(&[("accesscode", code.normalized())])
        .send()
        .await
        .map_err(Error::transport("share code redemption"))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Handshake {
            step: "share code redemption",
            status,
        });
    }

    let body: RedeemResponse = response
        .json()
        .await
        .map_err(|e| Error::InvalidRedemption(e.to_string()))?;
    if body.access_token.is_empty() {
        return Err(Error::InvalidRedemption("accessToken is empty".into()));
    }

    debug!("share code redeemed");
    Ok(body.access_token)
}

/// Perform the browser-style sharing login and return the session cookie value.
pub async fn sharing_login(
    client: &reqwest::Client,
    base_url: &str,
    code: &ShareCode,
) -> Result<String> {
    let base = base_url.trim_end_matches('/');
    let dashed = code.dashed();
    let response = client
        .post(format!("{base}{SHARING_LOGIN_PATH}"))
        .header(ORIGIN, base)
        .header(REFERER, format!("{base}{SHARING_REFERER_PATH}"))
        .form(&[("sharing_code", dashed.as_str()), ("commit", "")])
        .send()
        .await
        .map_err(Error::transport("sharing login"))?;

    let status = response.status();
    if status != SHARING_LOGIN_STATUS {
        return Err(Error::Handshake {
            step: "sharing login",
            status,
        });
    }

    let cookie = session_cookie_from_headers(response.headers())
        .ok_or(Error::MissingSessionCookie)?;
    debug!("sharing login issued session cookie");
    Ok(cookie)
}

/// Exchange a share code for a full [`Session`].
///
/// `client` must not follow redirects; see [`http_client`].
pub async fn establish(
    client: &reqwest::Client,
    base_url: &str,
    code: &ShareCode,
) -> Result<Session> {
    let access_token = redeem_access_code(client, base_url, code).await?;
    let session_cookie = sharing_login(client, base_url, code).await?;
    info!(base_url, code_len = code.len(), "portal session established");
    Ok(Session::new(access_token, session_cookie))
}

/// Pick the session cookie value out of `Set-Cookie` response headers.
///
/// Prefers the cookie named [`SESSION_COOKIE_NAME`]; falls back to the first
/// cookie present. The value is everything after the first `=` up to the
/// first `;`.
pub fn session_cookie_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies: Vec<(&str, &str)> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|raw| {
            let pair = raw.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            Some((name.trim(), value.trim()))
        })
        .collect();

    cookies
        .iter()
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .or_else(|| cookies.first())
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
