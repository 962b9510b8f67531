//! Authenticated client for the Dexcom Clarity portal
//!
//! Wraps an established [`clarity_auth::Session`] and drives the two portal
//! workflows:
//! - CSV export of glucose readings (`ClarityClient::export_csv`)
//! - PDF report rendering: `generate_report()` queues a render, then
//!   `poll_for_report_completion()` waits for `status == "complete"`
//!
//! Finished artifacts are handed to an [`ArtifactSink`].

pub mod client;
pub mod endpoints;
pub mod error;
mod export;
pub mod report;
pub mod sink;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::ClarityClient;
pub use error::{Error, Result};
pub use report::{PollOptions, ReportRequest, callback_path};
pub use sink::{ArtifactSink, FsSink, download_client};
pub use types::{
    AnalysisSession, COMPLETE_STATUS, GlucoseUnit, ReportProgress, ReportType, SubjectInfo,
};
