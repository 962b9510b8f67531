//! Download workflow
//!
//! Runs the CSV export and/or the report render for one interval and hands
//! the results to an `ArtifactSink`. CSV goes first; a failure there stops
//! the run before a report is requested.

use std::path::PathBuf;

use clarity_client::{
    ArtifactSink, ClarityClient, GlucoseUnit, PollOptions, ReportProgress, ReportRequest,
    ReportType,
};
use tracing::info;

use crate::period::DateInterval;

/// Everything one invocation asked for, after CLI and config are merged.
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub interval: DateInterval,
    pub units: Option<GlucoseUnit>,
    pub out_dir: PathBuf,
    pub csv: Option<CsvTarget>,
    pub report: Option<ReportTarget>,
}

#[derive(Debug, Clone)]
pub struct CsvTarget {
    pub file_name_template: String,
}

#[derive(Debug, Clone)]
pub struct ReportTarget {
    pub report_types: Vec<ReportType>,
    pub time_zone: String,
    pub grayscale: bool,
    pub file_name_template: String,
    pub poll: PollOptions,
}

/// Paths written by a run.
#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub csv_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub report_bytes: u64,
}

/// Execute `plan` against an authenticated client.
pub async fn run(
    client: &ClarityClient,
    sink: &dyn ArtifactSink,
    plan: &DownloadPlan,
) -> clarity_client::Result<DownloadSummary> {
    let date_interval = plan.interval.to_string();
    let mut summary = DownloadSummary::default();

    if let Some(csv) = &plan.csv {
        info!(%date_interval, "downloading csv");
        let body = client.export_csv(&date_interval, plan.units).await?;
        let path = plan
            .out_dir
            .join(plan.interval.render_file_name(&csv.file_name_template));
        sink.write_bytes(&path, body.as_bytes()).await?;
        summary.csv_path = Some(path);
    }

    if let Some(report) = &plan.report {
        info!(%date_interval, reports = report.report_types.len(), "requesting pdf report");
        let request = ReportRequest {
            report_types: report.report_types.clone(),
            date_interval: date_interval.clone(),
            time_zone: report.time_zone.clone(),
            grayscale: report.grayscale,
            units: plan.units,
        };

        info!("waiting for pdf generation to complete");
        let done = client
            .generate_report_and_wait(&request, &report.poll, log_progress)
            .await?;

        let asset_url = asset_url(client, &done)?;
        let path = plan
            .out_dir
            .join(plan.interval.render_file_name(&report.file_name_template));
        summary.report_bytes = sink.stream_url(&asset_url, &path).await?;
        summary.report_path = Some(path);
    }

    Ok(summary)
}

fn log_progress(progress: &ReportProgress) {
    match progress.percent {
        Some(percent) => info!(status = %progress.status, percent, "report progress"),
        None => info!(status = %progress.status, "report progress"),
    }
}

/// Absolute download URL of a completed report.
fn asset_url(client: &ClarityClient, done: &ReportProgress) -> clarity_client::Result<String> {
    let url = done
        .url
        .as_deref()
        .ok_or_else(|| clarity_client::Error::Decode {
            endpoint: "report progress",
            message: "completed report has no download url".into(),
        })?;
    Ok(client.resolve_url(url)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{Form, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::NaiveDate;
    use clarity_auth::ShareCode;
    use std::collections::HashMap;
    use std::future::Future;
    use std::path::Path;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::net::TcpListener;

    const SUBJECT: &str = "subj-9";
    const CSV: &str = "Index,Timestamp,Glucose Value\n1,2024-01-01T00:05:00,101\n";
    const PDF: &[u8] = b"%PDF-1.7 combined report";

    fn token() -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(format!(r#"{{"subjectId":"{SUBJECT}"}}"#))
        )
    }

    /// Sink that keeps everything in memory.
    #[derive(Default)]
    struct MemorySink {
        files: Mutex<HashMap<PathBuf, Vec<u8>>>,
        streamed_urls: Mutex<Vec<String>>,
    }

    impl ArtifactSink for MemorySink {
        fn write_bytes<'a>(
            &'a self,
            path: &'a Path,
            bytes: &'a [u8],
        ) -> Pin<Box<dyn Future<Output = clarity_client::Result<()>> + Send + 'a>> {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), bytes.to_vec());
            Box::pin(async { Ok(()) })
        }

        fn stream_url<'a>(
            &'a self,
            url: &'a str,
            path: &'a Path,
        ) -> Pin<Box<dyn Future<Output = clarity_client::Result<u64>> + Send + 'a>> {
            self.streamed_urls.lock().unwrap().push(url.to_string());
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), PDF.to_vec());
            Box::pin(async { Ok(PDF.len() as u64) })
        }
    }

    #[derive(Clone, Default)]
    struct Portal {
        export_forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
        polls: Arc<AtomicUsize>,
    }

    /// Full mock portal: handshake, subject info, export, and a render that
    /// completes on the second poll.
    async fn portal() -> (String, Portal) {
        let state = Portal::default();
        let app = Router::new()
            .route(
                "/api/access_code/redeem",
                get(|| async { axum::Json(serde_json::json!({ "accessToken": token() })) }),
            )
            .route(
                "/user/sharing",
                post(|| async {
                    (
                        StatusCode::FOUND,
                        [
                            ("location", "/home"),
                            ("set-cookie", "_rogue_material_session=S3SS; Path=/; HttpOnly"),
                        ],
                    )
                }),
            )
            .route(
                "/subject_info",
                get(|| async {
                    axum::Json(serde_json::json!({
                        "email": "pat@example.com",
                        "first_name": "Pat",
                        "last_name": "Doe",
                        "glucose_unit": "mmol",
                        "locale": "en-GB",
                        "country": "GB",
                    }))
                }),
            )
            .route(
                &format!("/api/subject/{SUBJECT}/export"),
                post(
                    |State(portal): State<Portal>, Form(form): Form<HashMap<String, String>>| async move {
                        portal.export_forms.lock().unwrap().push(form);
                        CSV
                    },
                ),
            )
            .route(
                &format!("/api/subject/{SUBJECT}/analysis_session"),
                post(|| async { axum::Json(serde_json::json!({ "analysisSessionId": "as-1" })) }),
            )
            .route(
                "/reports/generate",
                post(|| async {
                    axum::Json(serde_json::json!({
                        "percent": 0,
                        "status": "queued",
                        "url": "/reports/status/r-1",
                        "uuid": "r-1",
                    }))
                }),
            )
            .route(
                "/reports/status/r-1",
                get(|State(portal): State<Portal>| async move {
                    if portal.polls.fetch_add(1, Ordering::SeqCst) == 0 {
                        axum::Json(serde_json::json!({ "percent": 50, "status": "50%" }))
                    } else {
                        axum::Json(serde_json::json!({
                            "percent": 100,
                            "status": "complete",
                            "url": "/reports/files/r-1.pdf",
                        }))
                    }
                }),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), state)
    }

    fn plan(csv: bool, report: bool) -> DownloadPlan {
        DownloadPlan {
            interval: DateInterval {
                start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            },
            units: None,
            out_dir: PathBuf::from("/out"),
            csv: csv.then(|| CsvTarget {
                file_name_template: "clarity_data_DATERANGE.csv".into(),
            }),
            report: report.then(|| ReportTarget {
                report_types: vec![ReportType::Agp],
                time_zone: "UTC".into(),
                grayscale: false,
                file_name_template: "clarity_report_DATERANGE.pdf".into(),
                poll: PollOptions {
                    interval: Duration::from_millis(5),
                    max_attempts: Some(20),
                },
            }),
        }
    }

    async fn connect(base: &str) -> ClarityClient {
        let http = clarity_auth::http_client(Duration::from_secs(5)).unwrap();
        let code = ShareCode::parse("ABCD-1234-EF").unwrap();
        ClarityClient::from_share_code(http, base, &code).await.unwrap()
    }

    #[tokio::test]
    async fn share_code_to_csv_and_report() {
        let (base, portal) = portal().await;
        let client = connect(&base).await;
        let sink = MemorySink::default();

        let summary = run(&client, &sink, &plan(true, true)).await.unwrap();

        let csv_path = PathBuf::from("/out/clarity_data_2024-01-01:2024-01-31.csv");
        let report_path = PathBuf::from("/out/clarity_report_2024-01-01:2024-01-31.pdf");
        assert_eq!(summary.csv_path.as_deref(), Some(csv_path.as_path()));
        assert_eq!(summary.report_path.as_deref(), Some(report_path.as_path()));
        assert_eq!(summary.report_bytes, PDF.len() as u64);

        let files = sink.files.lock().unwrap();
        assert_eq!(files[&csv_path], CSV.as_bytes());
        assert_eq!(files[&report_path], PDF);

        let streamed = sink.streamed_urls.lock().unwrap();
        assert_eq!(*streamed, vec![format!("{base}/reports/files/r-1.pdf")]);

        let forms = portal.export_forms.lock().unwrap();
        assert_eq!(forms[0]["units"], "mmol");
        assert_eq!(forms[0]["dateInterval"], "2024-01-01/2024-01-31");
        assert_eq!(portal.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn csv_only_never_touches_reports() {
        let (base, portal) = portal().await;
        let client = connect(&base).await;
        let sink = MemorySink::default();

        let summary = run(&client, &sink, &plan(true, false)).await.unwrap();

        assert!(summary.csv_path.is_some());
        assert!(summary.report_path.is_none());
        assert!(sink.streamed_urls.lock().unwrap().is_empty());
        assert_eq!(portal.polls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn relative_asset_url_resolves_against_portal() {
        let client = ClarityClient::new(
            reqwest::Client::new(),
            "https://clarity.example.com",
            clarity_auth::Session::new(token(), "S3SS"),
        );
        let done = ReportProgress {
            status: "complete".into(),
            url: Some("/reports/files/r-1.pdf".into()),
            ..Default::default()
        };
        assert_eq!(
            asset_url(&client, &done).unwrap(),
            "https://clarity.example.com/reports/files/r-1.pdf"
        );

        let cdn = ReportProgress {
            status: "complete".into(),
            url: Some("//cdn.example.net/files/r-1.pdf".into()),
            ..Default::default()
        };
        assert_eq!(
            asset_url(&client, &cdn).unwrap(),
            "https://cdn.example.net/files/r-1.pdf"
        );

        let missing = ReportProgress {
            status: "complete".into(),
            ..Default::default()
        };
        assert!(asset_url(&client, &missing).is_err());
    }
}
