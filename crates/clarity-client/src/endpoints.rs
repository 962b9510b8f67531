//! Portal endpoints used by the authenticated client
//!
//! Relative to the portal base URL. The handshake endpoints live in
//! `clarity_auth::constants`.

/// Account metadata for the subject behind the session
pub const SUBJECT_INFO_PATH: &str = "/subject_info";

/// Starts an asynchronous report render
pub const REPORT_GENERATE_PATH: &str = "/reports/generate";

/// Path the renderer calls back into; carried inside the generate request
pub const REPORT_CALLBACK_PATH: &str = "/reports/combined";

/// Opens a fresh analysis session for `subject_id`
pub fn analysis_session_path(subject_id: &str) -> String {
    format!("/api/subject/{subject_id}/analysis_session")
}

/// CSV export of readings for `subject_id`
pub fn export_path(subject_id: &str) -> String {
    format!("/api/subject/{subject_id}/export")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_paths_live_under_api() {
        assert_eq!(
            analysis_session_path("subj-1"),
            "/api/subject/subj-1/analysis_session"
        );
        assert_eq!(export_path("subj-1"), "/api/subject/subj-1/export");
    }
}
