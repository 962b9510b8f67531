//! Authenticated portal client
//!
//! Every portal request carries the bearer token in `Access-Token` and the
//! session cookie in `Cookie`. The session is owned by the client and never
//! handed out mutably. Account metadata is fetched at most once per client
//! and kept for its lifetime.

use clarity_auth::{ACCESS_TOKEN_HEADER, SESSION_COOKIE_NAME, Session, ShareCode};
use reqwest::header::COOKIE;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::endpoints::{SUBJECT_INFO_PATH, analysis_session_path};
use crate::error::{Error, Result};
use crate::types::{AnalysisSession, GlucoseUnit, SubjectInfo};

/// Client bound to one established portal session.
///
/// Methods take `&self`; share it behind an `Arc` to drive several exports or
/// reports at once over the same session.
pub struct ClarityClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
    subject_info: OnceCell<SubjectInfo>,
}

impl ClarityClient {
    /// Wrap an already established session.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, session: Session) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            session,
            subject_info: OnceCell::new(),
        }
    }

    /// Run the share-code handshake and wrap the resulting session.
    ///
    /// `http` must not follow redirects; see [`clarity_auth::http_client`].
    pub async fn from_share_code(
        http: reqwest::Client,
        base_url: impl Into<String>,
        code: &ShareCode,
    ) -> Result<Self> {
        let base_url = base_url.into();
        let session = clarity_auth::establish(&http, &base_url, code).await?;
        Ok(Self::new(http, base_url, session))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Subject identifier from the bearer token. Pure; no request is made.
    pub fn subject_id(&self) -> Result<String> {
        Ok(self.session.subject_id()?)
    }

    /// Account metadata, fetched on first use and cached afterwards.
    pub async fn subject_info(&self) -> Result<&SubjectInfo> {
        self.subject_info
            .get_or_try_init(|| self.fetch_subject_info())
            .await
    }

    /// Cached account metadata, if it has been fetched.
    pub fn cached_subject_info(&self) -> Option<&SubjectInfo> {
        self.subject_info.get()
    }

    async fn fetch_subject_info(&self) -> Result<SubjectInfo> {
        let response = self
            .authorized(self.http.get(self.endpoint(SUBJECT_INFO_PATH)))
            .send()
            .await
            .map_err(Error::transport("subject info"))?;
        let info: SubjectInfo = read_json(response, "subject info").await?;
        debug!(locale = %info.locale, country = %info.country, unit = %info.glucose_unit, "fetched subject info");
        Ok(info)
    }

    /// Start a fresh analysis session. Each call creates a new one server-side.
    pub async fn begin_analysis_session(&self) -> Result<AnalysisSession> {
        let subject_id = self.subject_id()?;
        let response = self
            .authorized(self.http.post(self.endpoint(&analysis_session_path(&subject_id))))
            .send()
            .await
            .map_err(Error::transport("analysis session"))?;
        let session: AnalysisSession = read_json(response, "analysis session").await?;
        debug!(analysis_session_id = %session.analysis_session_id, "began analysis session");
        Ok(session)
    }

    /// Pick the caller's unit if given, the account preference otherwise.
    pub(crate) async fn resolve_units(
        &self,
        units: Option<GlucoseUnit>,
    ) -> Result<(GlucoseUnit, &SubjectInfo)> {
        let info = self.subject_info().await?;
        Ok((units.unwrap_or(info.glucose_unit), info))
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn access_token(&self) -> &str {
        self.session.access_token()
    }

    /// Absolute URL for a portal path.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Attach both session credentials to a request.
    pub(crate) fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(ACCESS_TOKEN_HEADER, self.session.access_token())
            .header(
                COOKIE,
                format!("{SESSION_COOKIE_NAME}={}", self.session.session_cookie()),
            )
    }

    /// Resolve a server-supplied URL against the portal base URL.
    ///
    /// Absolute URLs pass through unchanged. Paths and protocol-relative URLs
    /// (`//host/x`) follow the usual reference resolution rules.
    pub fn resolve_url(&self, url: &str) -> Result<Url> {
        let invalid = |e: url::ParseError| Error::Decode {
            endpoint: "server url",
            message: format!("{url:?}: {e}"),
        };
        Url::parse(&self.base_url)
            .and_then(|base| base.join(url))
            .map_err(invalid)
    }

    /// GET a server-supplied URL.
    ///
    /// Credentials are attached only when the URL is on the portal's origin.
    pub(crate) fn get_server_url(&self, url: &str) -> Result<RequestBuilder> {
        let absolute = self.resolve_url(url)?;
        let same_origin = self.shares_origin(&absolute);
        let request = self.http.get(absolute.clone());
        if same_origin {
            Ok(self.authorized(request))
        } else {
            debug!(url = %absolute, "fetching foreign-origin URL without credentials");
            Ok(request)
        }
    }

    fn shares_origin(&self, target: &Url) -> bool {
        Url::parse(&self.base_url).is_ok_and(|base| base.origin() == target.origin())
    }
}

/// Turn a non-success response into [`Error::Upstream`].
pub(crate) async fn check_status(response: Response, endpoint: &'static str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));
    Err(Error::Upstream {
        endpoint,
        status,
        body,
    })
}

/// Check the status, then decode the JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    endpoint: &'static str,
) -> Result<T> {
    let response = check_status(response, endpoint).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(Error::transport(endpoint))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Decode {
        endpoint,
        message: e.to_string(),
    })
}
