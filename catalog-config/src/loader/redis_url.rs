use url::Url;

use crate::ConfigLoadError;

/// Builds `redis://[:password@]addr/db` from discrete settings.
pub fn compose_redis_url(
    addr: &str,
    password: Option<&str>,
    db: u32,
) -> Result<String, ConfigLoadError> {
    let mut url = Url::parse(&format!("redis://{}/{db}", addr.trim()))
        .map_err(|source| ConfigLoadError::InvalidRedisUrl { source })?;
    if let Some(password) = password.filter(|value| !value.is_empty()) {
        url.set_password(Some(password)).map_err(|_| {
            ConfigLoadError::InvalidValue {
                field: "redis.password",
                reason: "cannot be encoded into the connection URL".into(),
            }
        })?;
    }
    Ok(url.to_string())
}

/// Validates an explicit URL without rewriting it.
pub fn check_redis_url(raw: &str) -> Result<String, ConfigLoadError> {
    let url = Url::parse(raw.trim())
        .map_err(|source| ConfigLoadError::InvalidRedisUrl { source })?;
    match url.scheme() {
        "redis" | "rediss" => Ok(url.to_string()),
        other => Err(ConfigLoadError::InvalidValue {
            field: "redis.url",
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}
