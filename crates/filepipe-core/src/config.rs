//! Configuration module
//!
//! Environment-driven configuration for the API process and the worker pool it
//! hosts. `.env` files are honoured through `dotenvy`; every variable except
//! `DATABASE_URL` and `JWT_SECRET` has a default.

use std::env;

// Common constants
const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const WORKER_CONCURRENCY: usize = 4;
const WORKER_POLL_INTERVAL_MS: u64 = 1000;
const QUEUE_VISIBILITY_TIMEOUT_SECS: u64 = 300;
const QUEUE_MAX_ATTEMPTS: i32 = 3;
const STORAGE_PATH: &str = "./data/uploads";

/// Output format of the tracing subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub storage_path: String,
    pub max_upload_bytes: usize,
    /// Number of in-process worker loops. 0 disables the pool (producer-only node).
    pub worker_concurrency: usize,
    pub worker_poll_interval_ms: u64,
    pub queue_visibility_timeout_secs: u64,
    pub queue_max_attempts: i32,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let cors_origins_str = lookup("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        if is_production_environment(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let log_format = match lookup("LOG_FORMAT")
            .unwrap_or_else(|| "pretty".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            other => {
                return Err(anyhow::anyhow!(
                    "LOG_FORMAT must be 'json' or 'pretty', got '{}'",
                    other
                ))
            }
        };

        let config = Config {
            server_port: lookup("SERVER_PORT")
                .or_else(|| lookup("PORT"))
                .unwrap_or_else(|| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            environment,
            cors_origins,
            database_url: lookup("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: lookup("DB_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: lookup("JWT_SECRET")
                .ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            storage_path: lookup("STORAGE_PATH").unwrap_or_else(|| STORAGE_PATH.to_string()),
            max_upload_bytes: lookup("MAX_UPLOAD_BYTES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_UPLOAD_BYTES),
            worker_concurrency: lookup("WORKER_CONCURRENCY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(WORKER_CONCURRENCY),
            worker_poll_interval_ms: lookup("WORKER_POLL_INTERVAL_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(WORKER_POLL_INTERVAL_MS),
            queue_visibility_timeout_secs: lookup("QUEUE_VISIBILITY_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(QUEUE_VISIBILITY_TIMEOUT_SECS),
            queue_max_attempts: lookup("QUEUE_MAX_ATTEMPTS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(QUEUE_MAX_ATTEMPTS),
            log_format,
        };

        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_environment(&self.environment)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !(self.database_url.starts_with("postgresql://")
            || self.database_url.starts_with("postgres://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.storage_path.trim().is_empty() {
            return Err(anyhow::anyhow!("STORAGE_PATH must not be empty"));
        }

        if self.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_BYTES must be greater than 0"));
        }

        if self.worker_poll_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "WORKER_POLL_INTERVAL_MS must be greater than 0"
            ));
        }

        if self.queue_visibility_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "QUEUE_VISIBILITY_TIMEOUT_SECS must be greater than 0"
            ));
        }

        if self.queue_max_attempts < 1 {
            return Err(anyhow::anyhow!("QUEUE_MAX_ATTEMPTS must be at least 1"));
        }

        Ok(())
    }
}

fn is_production_environment(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(vars: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/filepipe"),
            ("JWT_SECRET", SECRET),
        ])
        .unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.worker_concurrency, 4);
        assert_eq!(config.queue_visibility_timeout_secs, 300);
        assert_eq!(config.queue_max_attempts, 3);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(!config.is_production());
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_database_url_rejected() {
        let err = load(&[("JWT_SECRET", SECRET)]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_short_jwt_secret_fails_validation() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/filepipe"),
            ("JWT_SECRET", "short"),
        ])
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wildcard_cors_rejected_in_production() {
        let result = load(&[
            ("DATABASE_URL", "postgresql://localhost/filepipe"),
            ("JWT_SECRET", SECRET),
            ("ENVIRONMENT", "production"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_prod_alias_is_production() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/filepipe"),
            ("JWT_SECRET", SECRET),
            ("ENVIRONMENT", "Prod"),
            ("CORS_ORIGINS", "https://app.example.com"),
        ])
        .unwrap();
        assert!(config.is_production());
        assert_eq!(config.cors_origins, vec!["https://app.example.com"]);
    }

    #[test]
    fn test_overrides_parsed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/filepipe"),
            ("JWT_SECRET", SECRET),
            ("WORKER_CONCURRENCY", "0"),
            ("QUEUE_MAX_ATTEMPTS", "5"),
            ("LOG_FORMAT", "json"),
            ("SERVER_PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(config.worker_concurrency, 0);
        assert_eq!(config.queue_max_attempts, 5);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.server_port, 8080);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let result = load(&[
            ("DATABASE_URL", "postgres://db/filepipe"),
            ("JWT_SECRET", SECRET),
            ("LOG_FORMAT", "xml"),
        ]);
        assert!(result.is_err());
    }
}
