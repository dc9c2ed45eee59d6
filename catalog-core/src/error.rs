use catalog_model::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "redis-broker")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Importer not found: {0:?}")]
    UnsupportedSource(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<CatalogError>,
    },
}

impl CatalogError {
    /// Wraps the error with a short description of what was being attempted.
    pub fn context(self, context: impl Into<String>) -> Self {
        CatalogError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether retrying the same operation could plausibly succeed.
    ///
    /// Malformed payloads, unknown import sources and invalid input never
    /// become valid by waiting. Client-side HTTP statuses are permanent too,
    /// except for timeouts and throttling.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::InvalidPayload(_)
            | CatalogError::InvalidInput(_)
            | CatalogError::UnsupportedSource(_)
            | CatalogError::Serialization(_) => false,
            CatalogError::HttpStatus { status, .. } => {
                !status.is_client_error()
                    || *status == reqwest::StatusCode::REQUEST_TIMEOUT
                    || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            CatalogError::Context { source, .. } => source.is_retryable(),
            _ => true,
        }
    }

    /// Whether the underlying cause is a missing entity.
    pub fn is_not_found(&self) -> bool {
        match self {
            CatalogError::NotFound(_) => true,
            CatalogError::HttpStatus { status, .. } => {
                *status == reqwest::StatusCode::NOT_FOUND
            }
            CatalogError::Context { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<ModelError> for CatalogError {
    fn from(err: ModelError) -> Self {
        CatalogError::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_errors_survive_context_wrapping() {
        let err = CatalogError::UnsupportedSource("vimeo".into())
            .context("import:content");
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "import:content: Importer not found: \"vimeo\""
        );
    }

    #[test]
    fn status_classification() {
        let status = |code: u16| CatalogError::HttpStatus {
            status: reqwest::StatusCode::from_u16(code).unwrap(),
            url: "http://search/idx".into(),
            body: String::new(),
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(status(404).is_not_found());
    }

    #[test]
    fn store_failures_are_transient() {
        assert!(CatalogError::Internal("pool timed out".into()).is_retryable());
        assert!(CatalogError::Broker("connection reset".into()).is_retryable());
    }
}
