use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated
    pub cors_origins: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_service_name")]
    pub cloud_service_name: String,

    /// JWT secret key. Without it the editing endpoint trusts the `user`
    /// query parameter.
    pub cloud_auth_jwt_secret: Option<String>,

    /// Database URL. Without it history is kept in memory.
    pub db_url: Option<String>,

    /// Seconds without any inbound frame before a connection is closed
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Seconds without activity before a document's counters are evicted
    #[serde(default = "default_metrics_idle_secs")]
    pub metrics_idle_secs: u64,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            dotenvy::dotenv().ok();
        }

        match envy::from_env::<Config>() {
            Ok(config) => {
                config.validate()?;
                info!("✅ Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("❌ Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid("idle_timeout_secs must be positive".to_string()));
        }
        if self.metrics_idle_secs == 0 {
            return Err(ConfigError::Invalid("metrics_idle_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default tracing filter: our crate at `log_level`, everything else at info
    pub fn default_log_filter(&self) -> String {
        format!("design_hub={},tower_http={},axum::rejection=trace,info", self.log_level, self.log_level)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            cloud_service_name: default_service_name(),
            cloud_auth_jwt_secret: None,
            db_url: None,
            idle_timeout_secs: default_idle_timeout_secs(),
            metrics_idle_secs: default_metrics_idle_secs(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvError(envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "design-hub".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_idle_timeout_secs() -> u64 {
    90
}

fn default_metrics_idle_secs() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server_address(), "0.0.0.0:8080");
        assert!(config.is_development());
        assert!(config.db_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_drives_default_filter() {
        let config = Config {
            log_level: "trace".to_string(),
            ..Config::default()
        };
        assert_eq!(config.default_log_filter(), "design_hub=trace,tower_http=trace,axum::rejection=trace,info");
        assert!(Config::default().default_log_filter().starts_with("design_hub=info,"));
    }

    #[test]
    fn test_zero_idle_timeout_is_invalid() {
        let config = Config {
            idle_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_cors_origin_list() {
        let config = Config {
            cors_origins: Some("https://a.example, https://b.example,,".to_string()),
            ..Config::default()
        };
        assert_eq!(config.cors_origin_list(), vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_envy_parses_overrides() {
        let vars = vec![
            ("port".to_string(), "9000".to_string()),
            ("idle_timeout_secs".to_string(), "15".to_string()),
            ("db_url".to_string(), "postgres://localhost/hub".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.idle_timeout_secs, 15);
        assert_eq!(config.db_url.as_deref(), Some("postgres://localhost/hub"));
        assert_eq!(config.host, "0.0.0.0");
    }
}
