// Session state and URL construction
//
// A `Session` owns its configuration, transport settings, and -- after a
// successful logon -- the HTTP client and cookie jar of that logon.
// Logon/logoff live in `auth.rs`, report fetching in `report.rs`.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::cookies::PublicSuffixJar;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Connection settings for one session. All fields are required.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Dispatcher base URL; every `/rds/...` path is appended to it
    /// (e.g. `https://cognos:9300/bi/v1/disp`).
    pub dispatcher_url: Url,
    pub namespace: String,
    pub username: String,
    pub password: SecretString,
    /// Path to the XML credential template.
    pub credential_template: PathBuf,
}

impl SessionConfig {
    pub fn new(
        dispatcher_url: Url,
        namespace: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
        credential_template: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dispatcher_url,
            namespace: namespace.into(),
            username: username.into(),
            password,
            credential_template: credential_template.into(),
        }
    }

    /// Reject empty fields and URLs that cannot carry a path.
    pub fn validate(&self) -> Result<(), Error> {
        let url = &self.dispatcher_url;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig {
                field: "dispatcher_url",
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(Error::InvalidConfig {
                field: "dispatcher_url",
                reason: format!("not a base URL: {url}"),
            });
        }

        let required = [
            ("namespace", self.namespace.is_empty()),
            ("username", self.username.is_empty()),
            ("password", self.password.expose_secret().is_empty()),
            (
                "credential_template",
                self.credential_template.as_os_str().is_empty(),
            ),
        ];
        if let Some((field, _)) = required.into_iter().find(|(_, empty)| *empty) {
            return Err(Error::InvalidConfig {
                field,
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// HTTP client and cookie jar of one successful logon.
pub(crate) struct ActiveSession {
    pub(crate) http: reqwest::Client,
    pub(crate) jar: Arc<PublicSuffixJar>,
}

/// One logon-to-logoff lifecycle against a Cognos dispatcher.
///
/// Each `Session` builds its own `reqwest::Client` and cookie jar on
/// logon; nothing is shared between sessions. Operations are meant to be
/// called in sequence: `logon`, any number of report fetches, `logoff`.
pub struct Session {
    config: SessionConfig,
    transport: TransportConfig,
    pub(crate) state: Option<ActiveSession>,
}

impl Session {
    /// Create a session with default transport settings.
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        Self::with_transport(config, TransportConfig::default())
    }

    /// Create a session with explicit TLS/timeout settings.
    pub fn with_transport(config: SessionConfig, transport: TransportConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            state: None,
        })
    }

    /// The session's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Whether the last logon succeeded.
    pub fn is_logged_on(&self) -> bool {
        self.state.is_some()
    }

    /// The `Cookie` header this session attaches to report requests.
    ///
    /// `None` before a successful logon or when the dispatcher set no cookies.
    pub fn cookie_header(&self) -> Option<String> {
        let active = self.state.as_ref()?;
        let url = self.rds_url(["reportData", "report"]).ok()?;
        active.jar.cookie_header(&url)
    }

    pub(crate) fn active(&self) -> Result<&ActiveSession, Error> {
        self.state.as_ref().ok_or(Error::NotLoggedOn)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{dispatcher}/rds/{segments...}`. Each segment is
    /// percent-encoded, so report IDs cannot escape their path slot.
    pub(crate) fn rds_url<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, Error> {
        let mut url = self.config.dispatcher_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| Error::InvalidConfig {
                field: "dispatcher_url",
                reason: format!("not a base URL: {}", self.config.dispatcher_url),
            })?
            .pop_if_empty()
            .push("rds")
            .extend(segments);
        Ok(url)
    }
}

/// Body of a non-200 response, for error context. A body that cannot be
/// read becomes an empty string; the read error is logged.
pub(crate) async fn error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    resp.text().await.unwrap_or_else(|e| {
        debug!(%status, error = %e, "could not read error response body");
        String::new()
    })
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("logged_on", &self.is_logged_on())
            .finish()
    }
}
