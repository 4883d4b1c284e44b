//! API configuration

use core_kernel::CoreError;
use domain_claims::ServiceConfig;
use serde::Deserialize;

/// Which claim store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    pub log_format: LogFormat,
    pub store_backend: StoreBackend,
    /// Conditional-write attempts per transition before giving up
    pub max_cas_attempts: u32,
    /// Largest accepted batch on claim creation
    pub max_batch_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/reimbursement".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            store_backend: StoreBackend::Memory,
            max_cas_attempts: 3,
            max_batch_size: 50,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `API_`-prefixed environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Rejects settings the service cannot run with
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_cas_attempts == 0 {
            return Err(CoreError::configuration("max_cas_attempts must be at least 1"));
        }
        if self.max_batch_size == 0 {
            return Err(CoreError::configuration("max_batch_size must be at least 1"));
        }
        if self.jwt_secret.trim().is_empty() {
            return Err(CoreError::configuration("jwt_secret must not be empty"));
        }
        if self.store_backend == StoreBackend::Postgres && self.database_url.trim().is_empty() {
            return Err(CoreError::configuration(
                "database_url is required for the postgres backend",
            ));
        }
        Ok(())
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Domain-side knobs for the claim service
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            max_cas_attempts: self.max_cas_attempts,
            max_batch_size: self.max_batch_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.service_config().max_cas_attempts, 3);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let config = ApiConfig {
            max_cas_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Configuration(_))));

        let config = ApiConfig {
            max_batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_postgres_backend_needs_url() {
        let config = ApiConfig {
            store_backend: StoreBackend::Postgres,
            database_url: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_secret_rejected() {
        let config = ApiConfig {
            jwt_secret: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
