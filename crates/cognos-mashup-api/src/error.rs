use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the `cognos-mashup-api` crate.
///
/// Covers every failure mode of a session lifecycle: reading the
/// credential template, logon/logoff, transport, report fetches, and
/// decoding. Nothing is recovered locally; every variant reaches the caller.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// Session settings rejected at construction time.
    #[error("Invalid session configuration ({field}): {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or HTTP client construction failed.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Credential template ─────────────────────────────────────────
    /// The credential template could not be opened or read.
    #[error("Cannot read credential template {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credential template is not well-formed XML.
    #[error("Malformed credential template: {message}")]
    TemplateParse { message: String },

    // ── Authentication ──────────────────────────────────────────────
    /// Logon or logoff was rejected, or its request never got a response.
    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A data request was made on a session without a successful logon.
    #[error("No active session -- call logon() first")]
    NotLoggedOn,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    // ── Report data ─────────────────────────────────────────────────
    /// The report endpoint answered with a non-200 status.
    #[error("Report fetch failed (HTTP {status}): {}", preview(body))]
    ReportFetch { status: u16, body: String },

    /// The requested 1-based table index does not exist in the report.
    #[error("Table index {index} out of range: report has {count} data table(s)")]
    TableIndex { index: usize, count: usize },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    pub(crate) fn auth(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` for logon/logoff failures and missing sessions.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::NotLoggedOn)
    }

    /// Returns `true` if a payload (JSON body, row data, or credential
    /// template) could not be decoded.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::Deserialization { .. } | Self::TemplateParse { .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// The client itself never retries; this is a hint for callers.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) | Self::Authentication { source: Some(e), .. } => {
                e.is_timeout() || e.is_connect()
            }
            Self::ReportFetch { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// The HTTP status code behind this error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ReportFetch { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// At most the first 200 characters of a response body.
pub(crate) fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(idx, _)| idx);
    &body[..end]
}
