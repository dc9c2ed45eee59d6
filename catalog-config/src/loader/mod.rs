pub mod error;
pub mod redis_url;

use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    models::{
        BackoffKind, Config, ConfigMetadata, DatabaseConfig, QueueConfig,
        RedisConfig, SearchConfig, StorageConfig,
        sources::{EnvConfig, FileConfig},
    },
    validation::{self, ConfigWarnings},
};
use error::ConfigLoadError;

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("catalog.toml"),
        PathBuf::from("config/catalog.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env`, the process environment and the TOML file, in that
    /// order, and composes them with env taking precedence over file.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        self.load_with_env(EnvConfig::gather(), env_file_loaded)
    }

    /// Same as [`ConfigLoader::load`] but with a caller-provided environment
    /// layer and no `.env` handling.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
        env_file_loaded: bool,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            compose_config(file_config, env, config_path, env_file_loaded)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigLoadError::MissingConfig { path });
                }
                path
            }
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(path) => path.clone(),
                None => return Ok((None, None)),
            },
        };

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
    env_file_loaded: bool,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if file_config.is_none() {
        warnings.push_with_hint(
            "No catalog.toml detected; using environment variables and defaults",
            "Pass --config or set CATALOG_CONFIG to point at a config file",
        );
    }

    let FileConfig {
        redis: file_redis,
        queue: file_queue,
        search: file_search,
        database: file_database,
        storage: file_storage,
    } = file_config.unwrap_or_default();

    let redis_defaults = RedisConfig::default();
    let redis_url = match env.redis_url.clone().or(file_redis.url.clone()) {
        Some(url) => redis_url::check_redis_url(&url)?,
        None => {
            let addr = env
                .redis_addr
                .clone()
                .or(file_redis.addr.clone())
                .unwrap_or_else(|| "localhost:6379".to_string());
            let password =
                env.redis_password.clone().or(file_redis.password.clone());
            let db = env.redis_db.or(file_redis.db).unwrap_or(0);
            redis_url::compose_redis_url(&addr, password.as_deref(), db)?
        }
    };
    let redis = RedisConfig {
        url: redis_url,
        namespace: env
            .redis_namespace
            .clone()
            .or(file_redis.namespace)
            .unwrap_or(redis_defaults.namespace),
    };

    let queue_defaults = QueueConfig::default();
    let backoff = match env.queue_backoff.clone().or(file_queue.backoff) {
        Some(raw) => raw.parse::<BackoffKind>().map_err(|reason| {
            ConfigLoadError::InvalidValue {
                field: "queue.backoff",
                reason,
            }
        })?,
        None => queue_defaults.backoff,
    };
    let queue = QueueConfig {
        concurrency: env
            .queue_concurrency
            .or(file_queue.concurrency)
            .unwrap_or(queue_defaults.concurrency),
        retry_delay: duration_setting(
            "queue.retry_delay",
            env.queue_retry_delay.clone().or(file_queue.retry_delay),
            queue_defaults.retry_delay,
        )?,
        max_retry: env
            .queue_max_retry
            .or(file_queue.max_retry)
            .unwrap_or(queue_defaults.max_retry),
        backoff,
        backoff_max: duration_setting(
            "queue.backoff_max",
            env.queue_backoff_max.clone().or(file_queue.backoff_max),
            queue_defaults.backoff_max,
        )?,
        lease_ttl: duration_setting(
            "queue.lease_ttl",
            env.queue_lease_ttl.clone().or(file_queue.lease_ttl),
            queue_defaults.lease_ttl,
        )?,
        poll_interval: duration_setting(
            "queue.poll_interval",
            env.queue_poll_interval.clone().or(file_queue.poll_interval),
            queue_defaults.poll_interval,
        )?,
        housekeeping_interval: duration_setting(
            "queue.housekeeping_interval",
            env.queue_housekeeping_interval
                .clone()
                .or(file_queue.housekeeping_interval),
            queue_defaults.housekeeping_interval,
        )?,
        shutdown_timeout: duration_setting(
            "queue.shutdown_timeout",
            env.queue_shutdown_timeout
                .clone()
                .or(file_queue.shutdown_timeout),
            queue_defaults.shutdown_timeout,
        )?,
        dead_letter_limit: env
            .queue_dead_letter_limit
            .or(file_queue.dead_letter_limit)
            .unwrap_or(queue_defaults.dead_letter_limit),
    };

    let search_defaults = SearchConfig::default();
    let search = SearchConfig {
        url: env
            .search_url
            .clone()
            .or(file_search.url)
            .unwrap_or(search_defaults.url),
        username: env.search_username.clone().or(file_search.username),
        password: env.search_password.clone().or(file_search.password),
        index_prefix: env
            .search_index_prefix
            .clone()
            .or(file_search.index_prefix)
            .unwrap_or(search_defaults.index_prefix),
        timeout: duration_setting(
            "search.timeout",
            env.search_timeout.clone().or(file_search.timeout),
            search_defaults.timeout,
        )?,
        accept_invalid_certs: env
            .search_insecure
            .or(file_search.accept_invalid_certs)
            .unwrap_or(search_defaults.accept_invalid_certs),
    };

    let database = DatabaseConfig {
        url: env.database_url.clone().or(file_database.url),
        max_connections: env
            .database_max_connections
            .or(file_database.max_connections)
            .unwrap_or(DatabaseConfig::default().max_connections),
    };

    let storage_defaults = StorageConfig::default();
    let storage = StorageConfig {
        endpoint: env
            .storage_endpoint
            .clone()
            .or(file_storage.endpoint)
            .unwrap_or(storage_defaults.endpoint),
        bucket: env
            .storage_bucket
            .clone()
            .or(file_storage.bucket)
            .unwrap_or(storage_defaults.bucket),
        region: env
            .storage_region
            .clone()
            .or(file_storage.region)
            .unwrap_or(storage_defaults.region),
        access_key: env.storage_access_key.clone().or(file_storage.access_key),
        secret_key: env.storage_secret_key.clone().or(file_storage.secret_key),
        use_ssl: env
            .storage_use_ssl
            .or(file_storage.use_ssl)
            .unwrap_or(storage_defaults.use_ssl),
        presign_expiry: duration_setting(
            "storage.presign_expiry",
            env.storage_presign_expiry.clone().or(file_storage.presign_expiry),
            storage_defaults.presign_expiry,
        )?,
    };

    let mut config = Config {
        redis,
        queue,
        search,
        database,
        storage,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded,
        },
    };

    warnings.extend(validation::apply_guard_rails(&mut config));

    Ok((config, warnings))
}

fn duration_setting(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        Some(raw) => humantime::parse_duration(raw.trim()).map_err(|err| {
            ConfigLoadError::InvalidValue {
                field,
                reason: err.to_string(),
            }
        }),
        None => Ok(default),
    }
}
