//! Layered configuration.
//!
//! Values are merged in increasing order of precedence:
//!
//! 1. built-in defaults
//! 2. a configuration file (TOML, YAML or JSON, picked by extension); either
//!    the one given explicitly or `config.toml` in the platform config
//!    directory if it exists
//! 3. `MEDIAMIG_`-prefixed environment variables, with `__` separating
//!    nested keys (`MEDIAMIG_REMOTE__MAX_ATTEMPTS=6`)
//! 4. command-line [`Overrides`]
//!
//! # Examples
//!
//! ```toml
//! destination_suffix = "-jpg"
//! convert_other = true
//! jpeg_quality = 90
//! concurrency = 4
//!
//! [backend]
//! type = "dropbox"
//! page_size = 2000
//!
//! [credentials]
//! access_token_file = "dropbox_token.txt"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use mediamig_migrate::{EstimateFactors, Policy};
use mediamig_storage::backend::RetryPolicy;
use mediamig_storage::credentials::{Secret, SecretSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "MEDIAMIG_";
const DEFAULT_TOKEN_FILE: &str = "dropbox_token.txt";
/// Largest listing page Dropbox hands out.
const MAX_PAGE_SIZE: usize = 2000;

/// Which remote store to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Dropbox {
        #[serde(default = "default_page_size")]
        page_size: usize,
    },
    /// A directory on this machine standing in for the remote.
    Local { root: PathBuf },
}
impl Default for BackendConfig {
    fn default() -> Self {
        Self::Dropbox { page_size: default_page_size() }
    }
}
fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

/// Where the secrets live. Literal values win over files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub access_token: Option<String>,
    pub access_token_file: Option<PathBuf>,
    pub refresh_token: Option<String>,
    pub refresh_token_file: Option<PathBuf>,
    pub app_key: Option<String>,
    pub app_key_file: Option<PathBuf>,
    pub app_secret: Option<String>,
    pub app_secret_file: Option<PathBuf>,
}
impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            access_token_file: Some(PathBuf::from(DEFAULT_TOKEN_FILE)),
            refresh_token: None,
            refresh_token_file: None,
            app_key: None,
            app_key_file: None,
            app_secret: None,
            app_secret_file: None,
        }
    }
}
impl CredentialsConfig {
    fn secret(literal: &Option<String>, file: &Option<PathBuf>) -> Option<Secret> {
        match (literal, file) {
            (Some(value), _) => Some(Secret::Inline(value.clone())),
            (None, Some(path)) => Some(Secret::File(path.clone())),
            (None, None) => None,
        }
    }
}

/// Throughput figures feeding the pre-scan estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateConfig {
    pub dng_seconds_per_mb: f64,
    pub png_seconds_per_mb: f64,
    pub jpeg_copy_seconds: f64,
    pub video_copy_seconds: f64,
    pub overhead_ratio: f64,
}
impl Default for EstimateConfig {
    fn default() -> Self {
        let factors = EstimateFactors::default();
        Self {
            dng_seconds_per_mb: factors.dng_seconds_per_mb,
            png_seconds_per_mb: factors.png_seconds_per_mb,
            jpeg_copy_seconds: factors.jpeg_copy_seconds,
            video_copy_seconds: factors.video_copy_seconds,
            overhead_ratio: factors.overhead_ratio,
        }
    }
}

/// Retry, timeout and rate limiting for remote calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub max_attempts: u32,
    pub timeout_secs: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Remote calls in flight at once, across all items.
    pub max_in_flight: usize,
}
impl Default for RemoteConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            timeout_secs: policy.timeout.as_secs(),
            backoff_base_ms: u64::try_from(policy.backoff_base.as_millis()).unwrap_or(u64::MAX),
            backoff_max_ms: u64::try_from(policy.backoff_max.as_millis()).unwrap_or(u64::MAX),
            max_in_flight: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub credentials: CredentialsConfig,
    /// Appended to the source folder path to name the destination folder.
    pub destination_suffix: String,
    /// Convert PNG, WebP and other non-RAW images too, instead of skipping.
    pub convert_other: bool,
    pub jpeg_quality: u8,
    /// Items migrated at the same time.
    pub concurrency: usize,
    pub estimate: EstimateConfig,
    pub remote: RemoteConfig,
    /// Seconds to wait between showing the estimate and starting to write.
    pub start_delay_secs: u64,
    /// Read everything, write nothing.
    pub dry_run: bool,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            credentials: CredentialsConfig::default(),
            destination_suffix: "-jpg".to_string(),
            convert_other: true,
            jpeg_quality: 90,
            concurrency: 4,
            estimate: EstimateConfig::default(),
            remote: RemoteConfig::default(),
            start_delay_secs: 15,
            dry_run: false,
            log_level: "info".to_string(),
        }
    }
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_delay_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// `config.toml` in the platform's config directory for this application.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mediamig").map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Merge every layer and validate the result.
    ///
    /// An explicit `path` that does not exist is an error; the default path is
    /// only used when present.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        let file = match path {
            Some(path) if !path.is_file() => {
                exn::bail!(ErrorKind::Invalid(format!("configuration file not found: {}", path.display())));
            },
            Some(path) => Some(path.to_path_buf()),
            None => default_path().filter(|path| path.is_file()),
        };
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Loading configuration file");
            figment = match file.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
                Some("toml") => figment.merge(Toml::file_exact(&file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(&file)),
                Some("json") => figment.merge(Json::file_exact(&file)),
                _ => exn::bail!(ErrorKind::Invalid(format!("unsupported configuration format: {}", file.display()))),
            };
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| exn::Exn::from(ErrorKind::Invalid(message.to_string()));
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(invalid("jpeg_quality must be between 1 and 100"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency must be at least 1"));
        }
        if self.destination_suffix.is_empty() || self.destination_suffix.contains('/') {
            return Err(invalid("destination_suffix must be non-empty and must not contain '/'"));
        }
        if self.remote.max_attempts == 0 || self.remote.max_in_flight == 0 || self.remote.timeout_secs == 0 {
            return Err(invalid("remote.max_attempts, remote.max_in_flight and remote.timeout_secs must be at least 1"));
        }
        let factors = &self.estimate;
        let all_factors = [
            factors.dng_seconds_per_mb,
            factors.png_seconds_per_mb,
            factors.jpeg_copy_seconds,
            factors.video_copy_seconds,
            factors.overhead_ratio,
        ];
        if all_factors.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(invalid("estimate factors must be finite and non-negative"));
        }
        match &self.backend {
            BackendConfig::Dropbox { page_size } if !(1..=MAX_PAGE_SIZE).contains(page_size) => {
                Err(invalid("backend.page_size must be between 1 and 2000"))
            },
            BackendConfig::Local { root } if root.as_os_str().is_empty() => Err(invalid("backend.root must be set")),
            _ => Ok(()),
        }
    }

    /// Destination folder for `source`.
    pub fn destination_for(&self, source: &str) -> String {
        format!("{}{}", source.trim_end_matches('/'), self.destination_suffix)
    }

    pub fn policy(&self) -> Policy {
        Policy { convert_other: self.convert_other }
    }

    pub fn factors(&self) -> EstimateFactors {
        EstimateFactors {
            dng_seconds_per_mb: self.estimate.dng_seconds_per_mb,
            png_seconds_per_mb: self.estimate.png_seconds_per_mb,
            jpeg_copy_seconds: self.estimate.jpeg_copy_seconds,
            video_copy_seconds: self.estimate.video_copy_seconds,
            overhead_ratio: self.estimate.overhead_ratio,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.remote.max_attempts,
            timeout: Duration::from_secs(self.remote.timeout_secs),
            backoff_base: Duration::from_millis(self.remote.backoff_base_ms),
            backoff_max: Duration::from_millis(self.remote.backoff_max_ms),
        }
    }

    pub fn secret_set(&self) -> SecretSet {
        let creds = &self.credentials;
        SecretSet {
            access_token: CredentialsConfig::secret(&creds.access_token, &creds.access_token_file),
            refresh_token: CredentialsConfig::secret(&creds.refresh_token, &creds.refresh_token_file),
            app_key: CredentialsConfig::secret(&creds.app_key, &creds.app_key_file),
            app_secret: CredentialsConfig::secret(&creds.app_secret, &creds.app_secret_file),
        }
    }
}
