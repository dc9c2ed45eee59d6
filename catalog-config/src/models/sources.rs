use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
///
/// Durations are humantime strings such as `"5s"` or `"20m"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub redis: FileRedisConfig,
    #[serde(default)]
    pub queue: FileQueueConfig,
    #[serde(default)]
    pub search: FileSearchConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub storage: FileStorageConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileQueueConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retry: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_max: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub housekeeping_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_letter_limit: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSearchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_invalid_certs: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_ssl: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presign_expiry: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,

    pub redis_url: Option<String>,
    pub redis_addr: Option<String>,
    pub redis_password: Option<String>,
    pub redis_db: Option<u32>,
    pub redis_namespace: Option<String>,

    pub queue_concurrency: Option<usize>,
    pub queue_retry_delay: Option<String>,
    pub queue_max_retry: Option<u32>,
    pub queue_backoff: Option<String>,
    pub queue_backoff_max: Option<String>,
    pub queue_lease_ttl: Option<String>,
    pub queue_poll_interval: Option<String>,
    pub queue_housekeeping_interval: Option<String>,
    pub queue_shutdown_timeout: Option<String>,
    pub queue_dead_letter_limit: Option<usize>,

    pub search_url: Option<String>,
    pub search_username: Option<String>,
    pub search_password: Option<String>,
    pub search_index_prefix: Option<String>,
    pub search_timeout: Option<String>,
    pub search_insecure: Option<bool>,

    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,

    pub storage_endpoint: Option<String>,
    pub storage_bucket: Option<String>,
    pub storage_region: Option<String>,
    pub storage_access_key: Option<String>,
    pub storage_secret_key: Option<String>,
    pub storage_use_ssl: Option<bool>,
    pub storage_presign_expiry: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::gather_from(|key| std::env::var(key).ok())
    }

    /// Builds the environment layer from an arbitrary lookup so tests do not
    /// have to mutate the process environment.
    pub fn gather_from<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name).filter(|value| !value.trim().is_empty())
        };
        let flag = |name: &str| var(name).and_then(|raw| parse_bool(&raw));

        EnvConfig {
            config_path: var("CATALOG_CONFIG").map(PathBuf::from),

            redis_url: var("REDIS_URL"),
            redis_addr: var("REDIS_ADDR"),
            redis_password: var("REDIS_PASSWORD"),
            redis_db: parse_number(var("REDIS_DB")),
            redis_namespace: var("REDIS_NAMESPACE"),

            queue_concurrency: parse_number(var("QUEUE_CONCURRENCY")),
            queue_retry_delay: var("QUEUE_RETRY_DELAY"),
            queue_max_retry: parse_number(var("QUEUE_MAX_RETRY")),
            queue_backoff: var("QUEUE_BACKOFF"),
            queue_backoff_max: var("QUEUE_BACKOFF_MAX"),
            queue_lease_ttl: var("QUEUE_LEASE_TTL"),
            queue_poll_interval: var("QUEUE_POLL_INTERVAL"),
            queue_housekeeping_interval: var("QUEUE_HOUSEKEEPING_INTERVAL"),
            queue_shutdown_timeout: var("QUEUE_SHUTDOWN_TIMEOUT"),
            queue_dead_letter_limit: parse_number(var("QUEUE_DEAD_LETTER_LIMIT")),

            search_url: var("OPENSEARCH_URL"),
            search_username: var("OPENSEARCH_USERNAME"),
            search_password: var("OPENSEARCH_PASSWORD"),
            search_index_prefix: var("OPENSEARCH_INDEX_PREFIX"),
            search_timeout: var("OPENSEARCH_TIMEOUT"),
            search_insecure: flag("OPENSEARCH_INSECURE"),

            database_url: var("DATABASE_URL"),
            database_max_connections: parse_number(var("DATABASE_MAX_CONNECTIONS")),

            storage_endpoint: var("STORAGE_ENDPOINT"),
            storage_bucket: var("STORAGE_BUCKET"),
            storage_region: var("STORAGE_REGION"),
            storage_access_key: var("STORAGE_ACCESS_KEY"),
            storage_secret_key: var("STORAGE_SECRET_KEY"),
            storage_use_ssl: flag("STORAGE_USE_SSL"),
            storage_presign_expiry: var("STORAGE_PRESIGN_EXPIRY"),
        }
    }
}

fn parse_number<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|s| s.trim().parse().ok())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
