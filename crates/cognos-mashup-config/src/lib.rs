//! Profile configuration for Cognos Mashup clients.
//!
//! A TOML file of named dispatcher profiles, read from a path the caller
//! supplies, and its translation to the API crate's `SessionConfig` /
//! `TransportConfig`. Nothing is read from the environment and nothing is
//! written back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cognos_mashup_api::{Session, SessionConfig, TlsMode, TransportConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{name}'")]
    UnknownProfile { name: String },

    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error(transparent)]
    Session(#[from] cognos_mashup_api::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named explicitly.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named dispatcher profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds. Unset means no timeout.
    pub timeout: Option<u64>,
}

/// A named dispatcher profile.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// Dispatcher base URL (e.g., "https://cognos:9300/bi/v1/disp").
    pub dispatcher: String,

    /// CAM namespace ID.
    pub namespace: String,

    /// Path to the XML credential template.
    pub credential_template: PathBuf,

    /// CAM user name.
    pub username: String,

    /// CAM password.
    pub password: String,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl Config {
    /// Parse a config from TOML text, layered over the defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Ok(base().merge(Toml::string(toml)).extract()?)
    }

    /// Look up a profile, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .ok_or_else(|| ConfigError::Validation {
                field: "default_profile".into(),
                reason: "no profile named and no default configured".into(),
            })?;
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }

    /// Resolve a profile into a ready (not yet logged-on) `Session`.
    pub fn open_session(&self, name: Option<&str>) -> Result<Session, ConfigError> {
        let (_, profile) = self.profile(name)?;
        let (session, transport) = profile_to_session_config(profile, &self.defaults)?;
        Ok(Session::with_transport(session, transport)?)
    }
}

// ── Config loading ──────────────────────────────────────────────────

fn base() -> Figment {
    Figment::new().merge(Serialized::defaults(Config::default()))
}

/// Load config from the TOML file at `path`, layered over defaults.
///
/// A missing file is an error rather than an empty config.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    std::fs::metadata(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(base().merge(Toml::file(path)).extract()?)
}

// ── Profile translation ─────────────────────────────────────────────

/// Build session + transport settings from a profile.
pub fn profile_to_session_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<(SessionConfig, TransportConfig), ConfigError> {
    let url: url::Url = profile
        .dispatcher
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "dispatcher".into(),
            reason: format!("invalid URL: {}", profile.dispatcher),
        })?;

    let session = SessionConfig::new(
        url,
        profile.namespace.clone(),
        profile.username.clone(),
        SecretString::from(profile.password.clone()),
        profile.credential_template.clone(),
    );

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    let mut transport = TransportConfig::default().with_tls(tls);
    if let Some(secs) = profile.timeout.or(defaults.timeout) {
        transport = transport.with_timeout(Duration::from_secs(secs));
    }

    Ok((session, transport))
}
