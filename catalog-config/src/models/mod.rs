pub mod sources;

use std::path::PathBuf;
use std::time::Duration;

/// Fully composed configuration for every catalog process.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub redis: RedisConfig,
    pub queue: QueueConfig,
    pub search: SearchConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL including credentials and database index.
    pub url: String,
    /// Key prefix shared by every broker key.
    pub namespace: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".into(),
            namespace: "catalog".into(),
        }
    }
}

/// How the retry delay grows with the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

impl std::str::FromStr for BackoffKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(BackoffKind::Fixed),
            "exponential" | "exp" => Ok(BackoffKind::Exponential),
            other => Err(format!(
                "expected `fixed` or `exponential`, got `{other}`"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub concurrency: usize,
    pub retry_delay: Duration,
    pub max_retry: u32,
    pub backoff: BackoffKind,
    pub backoff_max: Duration,
    pub lease_ttl: Duration,
    pub poll_interval: Duration,
    pub housekeeping_interval: Duration,
    pub shutdown_timeout: Duration,
    /// Dead letters kept before the oldest are discarded.
    pub dead_letter_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            retry_delay: Duration::from_secs(5),
            max_retry: 3,
            backoff: BackoffKind::Fixed,
            backoff_max: Duration::from_secs(300),
            lease_ttl: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
            housekeeping_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(5),
            dead_letter_limit: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub index_prefix: String,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl SearchConfig {
    /// Basic auth pair, present only when both halves are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some((user, pass))
            }
            _ => None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".into(),
            username: None,
            password: None,
            index_prefix: "th".into(),
            timeout: Duration::from_secs(30),
            accept_invalid_certs: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

/// S3-compatible object storage used for episode uploads.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub use_ssl: bool,
    pub presign_expiry: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:9000".into(),
            bucket: "episodes".into(),
            region: "us-east-1".into(),
            access_key: None,
            secret_key: None,
            use_ssl: false,
            presign_expiry: Duration::from_secs(20 * 60),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
