// Report data endpoints
//
// Every call re-fetches the report; nothing is cached between calls.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, preview};
use crate::report::Report;
use crate::session::client::{Session, error_body};

impl Session {
    /// Fetch and decode a whole report.
    ///
    /// `GET {dispatcher}/rds/reportData/report/{report_id}?fmt=DataSetJSON`
    pub async fn get_report(&self, report_id: &str) -> Result<Report, Error> {
        let active = self.active()?;
        let mut url = self.rds_url(["reportData", "report", report_id])?;
        url.query_pairs_mut().append_pair("fmt", "DataSetJSON");

        debug!("GET {}", url);
        let resp = active.http.get(url).send().await.map_err(Error::Transport)?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = error_body(resp).await;
            warn!(report_id, %status, body = preview(&body), "report fetch failed");
            return Err(Error::ReportFetch {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let report = Report::from_json(&body)?;
        debug!(report_id, tables = report.tables().len(), "report decoded");
        Ok(report)
    }

    /// Rows of the table at the 1-based `table_index`, as raw JSON values.
    pub async fn get_report_data(
        &self,
        report_id: &str,
        table_index: usize,
    ) -> Result<Vec<Value>, Error> {
        let report = self.get_report(report_id).await?;
        Ok(report.into_table(table_index)?.rows)
    }

    /// Rows of the table at the 1-based `table_index`, decoded into `T`.
    pub async fn get_report_rows<T: DeserializeOwned>(
        &self,
        report_id: &str,
        table_index: usize,
    ) -> Result<Vec<T>, Error> {
        let report = self.get_report(report_id).await?;
        report.table(table_index)?.rows_as()
    }
}
