use std::{env, fmt::Display, net::SocketAddr, str::FromStr};

use thiserror::Error;

use crate::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_DATABASE_MAX_CONNECTIONS, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_MEDIA_ROOT, DEFAULT_MEDIA_URL, DEFAULT_SESSION_TTL_HOURS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    Missing(&'static str),

    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub media_root: String,
    pub media_url: String,
    pub max_upload_bytes: u64,
    pub database_max_connections: u32,
    pub session_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database_url: require(&lookup, "DATABASE_URL")?,
            jwt_secret: require(&lookup, "JWT_SECRET")?,
            bind_addr: try_load(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR)?,
            media_root: try_load(&lookup, "MEDIA_ROOT", DEFAULT_MEDIA_ROOT)?,
            media_url: try_load(&lookup, "MEDIA_URL", DEFAULT_MEDIA_URL)?,
            max_upload_bytes: try_load(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            database_max_connections: try_load(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
            session_ttl_hours: try_load(&lookup, "SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?,
        })
    }
}

fn require<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/recipes"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8000".parse().unwrap());
        assert_eq!(config.media_root, "./media");
        assert_eq!(config.media_url, "/static/media");
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.session_ttl_hours, 24);
    }

    #[test]
    fn required_values_must_be_present() {
        let missing = Config::from_lookup(lookup(&[("JWT_SECRET", "secret")]));

        assert!(matches!(missing, Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn unparsable_values_are_reported() {
        let invalid = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/recipes"),
            ("JWT_SECRET", "secret"),
            ("MAX_UPLOAD_BYTES", "lots"),
        ]));

        assert!(matches!(
            invalid,
            Err(ConfigError::Invalid {
                key: "MAX_UPLOAD_BYTES",
                ..
            })
        ));
    }
}
