//! Wire types for the authenticated portal endpoints

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Status string the report renderer reports once the asset is ready.
/// Every other value, including an empty string, means "still working".
pub const COMPLETE_STATUS: &str = "complete";

/// Glucose unit the portal renders values in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlucoseUnit {
    Mgdl,
    Mmol,
}

impl GlucoseUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlucoseUnit::Mgdl => "mgdl",
            GlucoseUnit::Mmol => "mmol",
        }
    }
}

impl fmt::Display for GlucoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GlucoseUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mgdl" => Ok(GlucoseUnit::Mgdl),
            "mmol" => Ok(GlucoseUnit::Mmol),
            other => Err(Error::InvalidRequest(format!(
                "unknown glucose unit {other:?} (expected mgdl or mmol)"
            ))),
        }
    }
}

/// One page type of the combined PDF report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportType {
    Overview,
    Patterns,
    Daily,
    Compare,
    Overlay,
    HourlyStatistics,
    DailyStatistics,
    Agp,
}

impl ReportType {
    /// Every report type, in the order the portal lists them.
    pub const ALL: [ReportType; 8] = [
        ReportType::Overview,
        ReportType::Patterns,
        ReportType::Daily,
        ReportType::Compare,
        ReportType::Overlay,
        ReportType::HourlyStatistics,
        ReportType::DailyStatistics,
        ReportType::Agp,
    ];

    /// Name accepted on the command line that stands for [`ReportType::ALL`].
    pub const WILDCARD: &'static str = "all";

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Overview => "overview",
            ReportType::Patterns => "patterns",
            ReportType::Daily => "daily",
            ReportType::Compare => "compare",
            ReportType::Overlay => "overlay",
            ReportType::HourlyStatistics => "hourlyStatistics",
            ReportType::DailyStatistics => "dailyStatistics",
            ReportType::Agp => "agp",
        }
    }

    /// Expand a list of names into report types.
    ///
    /// The wildcard pulls in every type. Duplicates are dropped, keeping the
    /// first occurrence. An empty result is an error.
    pub fn resolve<I, S>(names: I) -> Result<Vec<ReportType>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolved = Vec::new();
        for name in names {
            let name = name.as_ref();
            let batch: Vec<ReportType> = if name == Self::WILDCARD {
                Self::ALL.to_vec()
            } else {
                vec![name.parse()?]
            };
            for report in batch {
                if !resolved.contains(&report) {
                    resolved.push(report);
                }
            }
        }
        if resolved.is_empty() {
            return Err(Error::InvalidRequest("no report types selected".into()));
        }
        Ok(resolved)
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ReportType::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown report type {s:?}")))
    }
}

/// Account metadata from `/subject_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectInfo {
    #[serde(default)]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// The account's preferred unit; used whenever a caller doesn't pick one
    pub glucose_unit: GlucoseUnit,
    pub locale: String,
    pub country: String,
}

/// Server-side context scoping one report render. Never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSession {
    pub analysis_session_id: String,
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub default_report_end_date: Option<String>,
    #[serde(default)]
    pub event_dates: Option<serde_json::Value>,
    #[serde(default)]
    pub observation_dates: Option<serde_json::Value>,
    #[serde(default)]
    pub subject_id: Option<String>,
}

/// Progress of an asynchronous report render.
///
/// Only the server moves this forward; the client just reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportProgress {
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub status: String,
    /// Poll URL while pending, asset URL once complete
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

impl ReportProgress {
    pub fn is_complete(&self) -> bool {
        self.status == COMPLETE_STATUS
    }
}
