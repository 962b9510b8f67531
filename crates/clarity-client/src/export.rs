//! CSV export of raw glucose readings

use tracing::info;

use crate::client::{ClarityClient, check_status};
use crate::endpoints::export_path;
use crate::error::{Error, Result};
use crate::types::GlucoseUnit;

impl ClarityClient {
    /// Export readings for `date_interval` (`YYYY-MM-DD/YYYY-MM-DD`) as CSV.
    ///
    /// `units` falls back to the account preference. The response body is
    /// returned verbatim.
    pub async fn export_csv(
        &self,
        date_interval: &str,
        units: Option<GlucoseUnit>,
    ) -> Result<String> {
        let subject_id = self.subject_id()?;
        let (units, info) = self.resolve_units(units).await?;

        let form = [
            ("dateInterval", date_interval),
            ("accessToken", self.access_token()),
            ("firstName", info.first_name.as_str()),
            ("lastName", info.last_name.as_str()),
            ("locale", info.locale.as_str()),
            ("units", units.as_str()),
        ];

        let response = self
            .authorized(self.http().post(self.endpoint(&export_path(&subject_id))))
            .form(&form)
            .send()
            .await
            .map_err(Error::transport("csv export"))?;

        let csv = check_status(response, "csv export")
            .await?
            .text()
            .await
            .map_err(Error::transport("csv export"))?;

        info!(date_interval, %units, bytes = csv.len(), "exported csv");
        Ok(csv)
    }
}
