use crate::models::Config;

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Normalizes values that would stall the workers and reports settings that
/// are legal but probably unintended.
pub fn apply_guard_rails(config: &mut Config) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();

    if config.queue.concurrency == 0 {
        config.queue.concurrency = 1;
        warnings.push_with_hint(
            "QUEUE_CONCURRENCY is 0; clamped to 1",
            "Set QUEUE_CONCURRENCY to the number of tasks a worker may run at once",
        );
    }

    if config.queue.max_retry == 0 {
        warnings.push(
            "QUEUE_MAX_RETRY is 0; failing tasks are dead-lettered on the first error",
        );
    }

    if config.queue.backoff_max < config.queue.retry_delay {
        warnings.push(
            "QUEUE_BACKOFF_MAX is below QUEUE_RETRY_DELAY; every retry waits the capped delay",
        );
    }

    if config.queue.dead_letter_limit == 0 {
        config.queue.dead_letter_limit = 1;
        warnings.push(
            "QUEUE_DEAD_LETTER_LIMIT is 0; clamped to 1",
        );
    }

    if config.queue.lease_ttl <= config.search.timeout {
        warnings.push_with_hint(
            "QUEUE_LEASE_TTL is not longer than OPENSEARCH_TIMEOUT; a slow index request can outlive its lease and run twice",
            "Keep QUEUE_LEASE_TTL comfortably above OPENSEARCH_TIMEOUT",
        );
    }

    let search = &config.search;
    if search.username.is_some() != search.password.is_some() {
        warnings.push_with_hint(
            "Only one of OPENSEARCH_USERNAME / OPENSEARCH_PASSWORD is set; requests go out unauthenticated",
            "Provide both values or neither",
        );
    }

    let storage = &config.storage;
    if storage.access_key.is_some() != storage.secret_key.is_some() {
        warnings.push(
            "Only one of STORAGE_ACCESS_KEY / STORAGE_SECRET_KEY is set; presigned URLs cannot be generated",
        );
    }

    if config.database.url.is_none() {
        warnings.push_with_hint(
            "DATABASE_URL not configured; the importer role cannot start",
            "Set DATABASE_URL when running `catalog-worker importer`",
        );
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_concurrency_is_clamped() {
        let mut config = Config::default();
        config.queue.concurrency = 0;
        let warnings = apply_guard_rails(&mut config);
        assert_eq!(config.queue.concurrency, 1);
        assert!(warnings.iter().any(|w| w.message.contains("clamped")));
    }

    #[test]
    fn half_configured_search_credentials_warn() {
        let mut config = Config::default();
        config.database.url = Some("postgres://localhost/catalog".into());
        config.search.username = Some("admin".into());
        let warnings = apply_guard_rails(&mut config);
        assert_eq!(warnings.items.len(), 1);
    }

    #[test]
    fn lease_shorter_than_search_timeout_warns() {
        let mut config = Config::default();
        config.database.url = Some("postgres://localhost/catalog".into());
        assert!(apply_guard_rails(&mut config).is_empty());

        config.queue.lease_ttl = config.search.timeout;
        let warnings = apply_guard_rails(&mut config);
        assert_eq!(warnings.items.len(), 1);
        assert!(warnings.items[0].message.contains("QUEUE_LEASE_TTL"));
    }

    #[test]
    fn zero_dead_letter_limit_is_clamped() {
        let mut config = Config::default();
        config.queue.dead_letter_limit = 0;
        let warnings = apply_guard_rails(&mut config);
        assert_eq!(config.queue.dead_letter_limit, 1);
        assert!(warnings.iter().any(|w| w.message.contains("QUEUE_DEAD_LETTER_LIMIT")));
    }
}
