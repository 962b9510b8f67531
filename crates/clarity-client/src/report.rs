//! Report generation and completion polling
//!
//! Rendering a PDF is asynchronous on the portal side:
//! 1. `begin_analysis_session()` scopes the render
//! 2. `POST /reports/generate` queues it and returns the first progress
//!    snapshot, whose `url` is the poll URL
//! 3. The poll URL is fetched until `status == "complete"`, at which point
//!    `url` points at the finished asset
//!
//! Any status other than the literal `"complete"` counts as still pending;
//! the portal has no distinguishable failure state.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use crate::client::{ClarityClient, read_json};
use crate::endpoints::{REPORT_CALLBACK_PATH, REPORT_GENERATE_PATH};
use crate::error::{Error, Result};
use crate::types::{GlucoseUnit, ReportProgress, ReportType};

/// Parameters for one combined report.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub report_types: Vec<ReportType>,
    /// `YYYY-MM-DD/YYYY-MM-DD`
    pub date_interval: String,
    /// IANA zone name the renderer lays out days in
    pub time_zone: String,
    pub grayscale: bool,
    /// Falls back to the account preference when `None`
    pub units: Option<GlucoseUnit>,
}

/// How to wait for a render to finish.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Fixed delay between polls
    pub interval: Duration,
    /// Give up after this many polls. `None` polls until complete.
    pub max_attempts: Option<u32>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

/// Build the renderer callback path carried inside the generate request.
pub fn callback_path(
    report_types: &[ReportType],
    analysis_session_id: &str,
    date_interval: &str,
    grayscale: bool,
) -> Result<String> {
    let reports = serde_json::to_string(report_types).map_err(|e| {
        Error::InvalidRequest(format!("serializing report types: {e}"))
    })?;
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("reports", &reports)
        .append_pair("analysisSessionId", analysis_session_id)
        .append_pair("dates", date_interval)
        .append_pair("useGrayscale", if grayscale { "true" } else { "false" })
        .finish();
    Ok(format!("{REPORT_CALLBACK_PATH}?{query}"))
}

/// Drive `fetch` until it yields a complete snapshot.
///
/// Sleeps `options.interval` between fetches and never after the last one.
async fn wait_for_completion<Fetch, Fut, F>(
    mut fetch: Fetch,
    options: &PollOptions,
    mut on_progress: F,
) -> Result<ReportProgress>
where
    Fetch: FnMut() -> Fut,
    Fut: Future<Output = Result<ReportProgress>>,
    F: FnMut(&ReportProgress),
{
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        let progress = fetch().await?;

        on_progress(&progress);

        if progress.is_complete() {
            info!(attempts, "report render complete");
            return Ok(progress);
        }

        debug!(
            attempt = attempts,
            status = %progress.status,
            percent = ?progress.percent,
            "report still rendering"
        );

        if let Some(max) = options.max_attempts {
            if attempts >= max {
                return Err(Error::PollLimit { attempts });
            }
        }

        tokio::time::sleep(options.interval).await;
    }
}

impl ClarityClient {
    /// Queue a report render and return the initial progress snapshot.
    ///
    /// A fresh analysis session is started for every call.
    pub async fn generate_report(&self, request: &ReportRequest) -> Result<ReportProgress> {
        if request.report_types.is_empty() {
            return Err(Error::InvalidRequest("no report types selected".into()));
        }

        let analysis = self.begin_analysis_session().await?;
        let (units, info) = self.resolve_units(request.units).await?;

        let callback = callback_path(
            &request.report_types,
            &analysis.analysis_session_id,
            &request.date_interval,
            request.grayscale,
        )?;
        debug!(callback_path = %callback, "requesting report render");

        let response = self
            .authorized(self.http().post(self.endpoint(REPORT_GENERATE_PATH)))
            .query(&[
                ("locale", info.locale.as_str()),
                ("country", info.country.as_str()),
                ("units", units.as_str()),
            ])
            .json(&serde_json::json!({
                "callback_path": callback,
                "time_zone": request.time_zone,
            }))
            .send()
            .await
            .map_err(Error::transport("report generation"))?;

        let progress: ReportProgress = read_json(response, "report generation").await?;
        if !progress.is_complete() && progress.url.is_none() {
            return Err(Error::Decode {
                endpoint: "report generation",
                message: "pending report has no poll url".into(),
            });
        }

        info!(
            reports = request.report_types.len(),
            date_interval = %request.date_interval,
            %units,
            status = %progress.status,
            "report render queued"
        );
        Ok(progress)
    }

    /// Poll `url` until the report is complete.
    pub async fn poll_for_report_completion(
        &self,
        url: &str,
        options: &PollOptions,
    ) -> Result<ReportProgress> {
        self.poll_for_report_completion_with(url, options, |_| {})
            .await
    }

    /// Poll `url` until the report is complete, handing every snapshot to
    /// `on_progress` first.
    ///
    /// Returns the first snapshot whose status is `"complete"`. A transport
    /// error on any poll aborts the whole wait.
    pub async fn poll_for_report_completion_with<F>(
        &self,
        url: &str,
        options: &PollOptions,
        on_progress: F,
    ) -> Result<ReportProgress>
    where
        F: FnMut(&ReportProgress) + Send,
    {
        wait_for_completion(|| self.fetch_progress(url), options, on_progress).await
    }

    async fn fetch_progress(&self, url: &str) -> Result<ReportProgress> {
        let response = self
            .get_server_url(url)?
            .send()
            .await
            .map_err(Error::transport("report progress"))?;
        read_json(response, "report progress").await
    }

    /// Queue a render and wait for it, returning the completed snapshot.
    pub async fn generate_report_and_wait<F>(
        &self,
        request: &ReportRequest,
        options: &PollOptions,
        on_progress: F,
    ) -> Result<ReportProgress>
    where
        F: FnMut(&ReportProgress) + Send,
    {
        let initial = self.generate_report(request).await?;
        if initial.is_complete() {
            return Ok(initial);
        }
        let poll_url = initial.url.as_deref().ok_or_else(|| Error::Decode {
            endpoint: "report generation",
            message: "pending report has no poll url".into(),
        })?;
        self.poll_for_report_completion_with(poll_url, options, on_progress)
            .await
    }
}
