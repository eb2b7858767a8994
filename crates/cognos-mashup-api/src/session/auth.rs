// Session logon / logoff
//
// Logon sends the filled credential template as the `xmlData` query
// parameter. The dispatcher answers with session cookies, which land in a
// jar created for that logon and ride along on every later request.

use std::sync::Arc;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::cookies::PublicSuffixJar;
use crate::credentials;
use crate::error::{Error, preview};
use crate::session::client::{ActiveSession, Session, error_body};

impl Session {
    /// Authenticate against the dispatcher.
    ///
    /// `GET {dispatcher}/rds/auth/logon?xmlData=...`
    ///
    /// Every call starts from a fresh cookie jar and HTTP client. Any
    /// previous logon state is dropped first, so a failed logon leaves the
    /// session without cookies. Template problems surface as
    /// [`Error::FileAccess`] / [`Error::TemplateParse`]; a rejected or
    /// unanswered request as [`Error::Authentication`].
    pub async fn logon(&mut self) -> Result<(), Error> {
        self.state = None;

        let config = self.config();
        let xml = credentials::materialize(
            &config.credential_template,
            &config.namespace,
            &config.username,
            &config.password,
        )?;

        let mut url = self.rds_url(["auth", "logon"])?;
        debug!("logging on at {}", url);
        url.query_pairs_mut().append_pair("xmlData", &xml);

        let jar = Arc::new(PublicSuffixJar::default());
        let http = self.transport().build_client(Arc::clone(&jar))?;

        // The request URL carries the password; keep it out of the error.
        let resp = http.get(url).send().await.map_err(|e| {
            let e = e.without_url();
            Error::Authentication {
                message: format!("logon request failed: {e}"),
                source: Some(e),
            }
        })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = error_body(resp).await;
            return Err(Error::auth(format!(
                "logon failed (HTTP {status}): {}",
                preview(&body)
            )));
        }

        self.state = Some(ActiveSession { http, jar });
        debug!("logon successful");
        Ok(())
    }

    /// End the session on the dispatcher.
    ///
    /// `GET {dispatcher}/rds/auth/logoff`
    ///
    /// Local cookie state is kept, so calling this twice simply sends the
    /// same (now invalid) cookies again; the dispatcher decides whether the
    /// second call fails.
    pub async fn logoff(&self) -> Result<(), Error> {
        let active = self.active()?;
        let url = self.rds_url(["auth", "logoff"])?;
        debug!("logging off at {}", url);

        let resp = active.http.get(url).send().await.map_err(|e| Error::Authentication {
            message: format!("logoff request failed: {e}"),
            source: Some(e),
        })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = error_body(resp).await;
            return Err(Error::auth(format!(
                "logoff failed (HTTP {status}): {}",
                preview(&body)
            )));
        }

        debug!("logoff complete");
        Ok(())
    }

    /// Run `work` inside a logon/logoff bracket.
    ///
    /// Logoff runs whenever logon succeeded, whether `work` succeeded or
    /// not. An error from `work` takes precedence over a logoff error.
    #[allow(clippy::future_not_send)]
    pub async fn with_logon<T>(
        &mut self,
        work: impl AsyncFnOnce(&Session) -> Result<T, Error>,
    ) -> Result<T, Error> {
        self.logon().await?;
        let result = work(&*self).await;
        let logoff = self.logoff().await;

        match (result, logoff) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
            (Err(e), Err(logoff_err)) => {
                warn!(error = %logoff_err, "logoff failed after session work error");
                Err(e)
            }
        }
    }
}
