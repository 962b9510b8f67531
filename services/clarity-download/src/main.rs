//! Dexcom Clarity downloader
//!
//! Single-binary CLI that:
//! 1. Redeems a share code and establishes a portal session
//! 2. Exports glucose readings as CSV for a date range
//! 3. Renders the requested PDF reports, waits for them, and downloads them

mod config;
mod error;
mod period;
mod workflow;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use clap::builder::PossibleValuesParser;
use clarity_auth::ShareCode;
use clarity_client::{ClarityClient, FsSink, GlucoseUnit, ReportType, download_client};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, validate_base_url};
use crate::workflow::{CsvTarget, DownloadPlan, ReportTarget};

/// Download reports and data from Dexcom Clarity
#[derive(Debug, Parser)]
#[command(name = "clarity-download", version)]
#[command(after_help = "\
Examples:
  Download the CSV data for last month
    clarity-download --share-code ABCDEFHIJ --csv --period month
  Download the CSV data and all reports for last month
    clarity-download --share-code ABCDEFHIJ --csv --report all --period month
  Download the AGP report for the past 90 days
    clarity-download --share-code ABCDEFHIJ --report agp --period 90")]
struct Cli {
    /// Directory to save downloaded files
    #[arg(default_value = ".")]
    out: PathBuf,

    /// Clarity share code
    #[arg(long, short = 's', env = "DEXCOM_SHARE_CODE", hide_env_values = true)]
    share_code: String,

    /// Download glucose data as CSV
    #[arg(long, short = 'c', help_heading = "CSV data")]
    csv: bool,

    /// Filename for the CSV data; DATERANGE is replaced with the date range
    #[arg(long, help_heading = "CSV data")]
    csv_file_name: Option<String>,

    /// PDF report types to download (repeat for several, or pass 'all')
    #[arg(long, short = 'r', value_parser = report_choices(), help_heading = "PDF reports")]
    report: Vec<String>,

    /// Filename for the PDF report; DATERANGE is replaced with the date range
    #[arg(long, help_heading = "PDF reports")]
    report_file_name: Option<String>,

    /// Render reports in grayscale instead of color
    #[arg(long, help_heading = "PDF reports")]
    grayscale: bool,

    /// Time zone the report lays days out in (default: TZ, then the host's zone)
    #[arg(long, help_heading = "PDF reports")]
    time_zone: Option<String>,

    /// Date range: days back from today (e.g. '90'), 'YYYY-MM-DD/YYYY-MM-DD',
    /// or 'month' for the whole previous calendar month
    #[arg(long, short = 'p', default_value = "month")]
    period: String,

    /// Glucose units (default is the account's setting)
    #[arg(long, short = 'u', value_parser = ["mgdl", "mmol"])]
    units: Option<String>,

    /// Portal base URL, overriding the config file
    #[arg(long, env = "CLARITY_BASE_URL")]
    base_url: Option<String>,

    /// Config file (defaults to CONFIG_PATH or ./clarity-download.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn report_choices() -> PossibleValuesParser {
    PossibleValuesParser::new(
        std::iter::once(ReportType::WILDCARD).chain(ReportType::ALL.iter().map(|r| r.as_str())),
    )
}

/// Install the tracing subscriber. Logs go to stderr; `LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Pick the report time zone: the flag, then `TZ`, then the host's IANA zone.
///
/// A leading `:` (POSIX `TZ=:Area/City`) is stripped. UTC is the last resort.
fn resolve_time_zone(flag: Option<&str>, tz_env: Option<&str>) -> String {
    flag.or(tz_env)
        .map(|tz| tz.trim().trim_start_matches(':'))
        .filter(|tz| !tz.is_empty())
        .map(str::to_string)
        .or_else(|| iana_time_zone::get_timezone().ok())
        .unwrap_or_else(|| "UTC".to_string())
}

/// Merge CLI flags over the loaded config into a download plan.
///
/// `tz_env` is the value of `TZ`, if set.
fn build_plan(
    cli: &Cli,
    config: &Config,
    today: chrono::NaiveDate,
    tz_env: Option<&str>,
) -> Result<DownloadPlan> {
    if !cli.csv && cli.report.is_empty() {
        return Err(error::Error::NothingToDownload.into());
    }

    let interval = period::resolve_period(&cli.period, today)?;
    let units = cli
        .units
        .as_deref()
        .map(str::parse::<GlucoseUnit>)
        .transpose()?;

    let csv = cli.csv.then(|| CsvTarget {
        file_name_template: cli
            .csv_file_name
            .clone()
            .unwrap_or_else(|| config.output.csv_file_name.clone()),
    });

    let report = if cli.report.is_empty() {
        None
    } else {
        Some(ReportTarget {
            report_types: ReportType::resolve(&cli.report)?,
            time_zone: resolve_time_zone(cli.time_zone.as_deref(), tz_env),
            grayscale: cli.grayscale,
            file_name_template: cli
                .report_file_name
                .clone()
                .unwrap_or_else(|| config.output.report_file_name.clone()),
            poll: config.poll_options(),
        })
    };

    Ok(DownloadPlan {
        interval,
        units,
        out_dir: cli.out.clone(),
        csv,
        report,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(base_url) = &cli.base_url {
        validate_base_url(base_url)?;
        config.portal.base_url = base_url.clone();
    }

    let today = chrono::Local::now().date_naive();
    let tz_env = std::env::var("TZ").ok();
    let plan = build_plan(&cli, &config, today, tz_env.as_deref())?;
    let code = ShareCode::parse(&cli.share_code)?;

    info!(
        base_url = %config.portal.base_url,
        interval = %plan.interval,
        csv = plan.csv.is_some(),
        reports = plan.report.as_ref().map_or(0, |r| r.report_types.len()),
        out_dir = %plan.out_dir.display(),
        "starting clarity download"
    );

    let http = clarity_auth::http_client(config.request_timeout())?;
    let client = ClarityClient::from_share_code(http, config.portal.base_url.clone(), &code)
        .await
        .context("failed to establish portal session")?;

    // Asset downloads may redirect to storage, so this client follows redirects
    let asset_http =
        download_client(config.request_timeout()).context("failed to build download client")?;
    let sink = FsSink::new(asset_http);

    let summary = workflow::run(&client, &sink, &plan)
        .await
        .context("download failed")?;

    if let Some(path) = &summary.csv_path {
        info!(path = %path.display(), "csv saved");
    }
    if let Some(path) = &summary.report_path {
        info!(path = %path.display(), bytes = summary.report_bytes, "report saved");
    }
    info!("done");
    Ok(())
}
