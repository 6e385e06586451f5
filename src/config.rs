//! Configuration types for service-archiver

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Fetch behavior (worker pool, timeouts)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FetchConfig {
    /// Number of URLs fetched at the same time across all batches (default: 8)
    ///
    /// The pool is shared by the synchronous path and every background job, so
    /// this caps outbound connections for the whole process.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Timeout for a single GET, connect through body (default: 60 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub fetch_timeout: Duration,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            fetch_timeout: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Archive assembly settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ArchiveConfig {
    /// Minimum line count for line-oriented payloads (default: 2, a header plus one row)
    #[serde(default = "default_min_content_lines")]
    pub min_content_lines: usize,

    /// Directory where background job archives are written (default: "./archives")
    #[serde(default = "default_work_dir")]
    #[schema(value_type = String)]
    pub work_dir: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            min_content_lines: default_min_content_lines(),
            work_dir: default_work_dir(),
        }
    }
}

/// Background job settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobConfig {
    /// Upper bound on a whole job, fetch through archive (default: 30 minutes, None = unlimited)
    #[serde(default = "default_job_timeout", with = "optional_duration_serde")]
    #[schema(value_type = Option<u64>)]
    pub job_timeout: Option<Duration>,

    /// How long finished jobs stay retrievable (default: None = until resubmission)
    #[serde(default, with = "optional_duration_serde")]
    #[schema(value_type = Option<u64>)]
    pub retention: Option<Duration>,

    /// How often the retention sweeper runs when retention is set (default: 60 seconds)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub sweep_interval: Duration,

    /// How long shutdown waits for running jobs to settle (default: 30 seconds)
    #[serde(default = "default_shutdown_grace", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub shutdown_grace: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            job_timeout: default_job_timeout(),
            retention: None,
            sweep_interval: default_sweep_interval(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for [`ArchiveService`](crate::ArchiveService)
///
/// Every field has a default, so `Config::default()` is a working local setup
/// and partial JSON documents deserialize cleanly.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Archive assembly settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Background job settings
    #[serde(default)]
    pub jobs: JobConfig,

    /// API server settings
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fetch.worker_pool_size == 0 {
            return Err(Error::Config {
                message: "worker_pool_size must be at least 1".into(),
                key: Some("worker_pool_size".into()),
            });
        }
        if self.fetch.fetch_timeout.is_zero() {
            return Err(Error::Config {
                message: "fetch_timeout must be greater than zero".into(),
                key: Some("fetch_timeout".into()),
            });
        }
        if self.jobs.retention.is_some() && self.jobs.sweep_interval.is_zero() {
            return Err(Error::Config {
                message: "sweep_interval must be greater than zero when retention is set".into(),
                key: Some("sweep_interval".into()),
            });
        }
        Ok(())
    }
}

fn default_worker_pool_size() -> usize {
    8
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    format!("service-archiver/{}", env!("CARGO_PKG_VERSION"))
}

fn default_min_content_lines() -> usize {
    2
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./archives")
}

fn default_job_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30 * 60))
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(30)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
