use serde::Deserialize;
use std::net::SocketAddr;

use domain::services::geo_merge::MergeConfig;
use store::DirectoryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    /// Membership caps, share-code retries and the geo-merge radius.
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Merge radius in meters for place deduplication.
    #[serde(default = "default_merge_radius")]
    pub merge_radius_meters: f64,

    #[serde(default = "default_max_owned_shared")]
    pub max_owned_shared: usize,

    #[serde(default = "default_max_joined_shared")]
    pub max_joined_shared: usize,

    #[serde(default = "default_max_members_per_map")]
    pub max_members_per_map: usize,

    /// Random share-code attempts before the timestamp fallback.
    #[serde(default = "default_share_code_attempts")]
    pub share_code_attempts: usize,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_merge_radius() -> f64 {
    50.0
}
fn default_max_owned_shared() -> usize {
    3
}
fn default_max_joined_shared() -> usize {
    3
}
fn default_max_members_per_map() -> usize {
    10
}
fn default_share_code_attempts() -> usize {
    5
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            merge_radius_meters: default_merge_radius(),
            max_owned_shared: default_max_owned_shared(),
            max_joined_shared: default_max_joined_shared(),
            max_members_per_map: default_max_members_per_map(),
            share_code_attempts: default_share_code_attempts(),
        }
    }
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with MAPBOOK__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("MAPBOOK").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Built entirely from embedded defaults so tests never depend on
    /// config files being present.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "127.0.0.1"
            port = 0
            request_timeout_secs = 30

            [logging]
            level = "info"
            format = "pretty"

            [security]
            cors_origins = []

            [policy]
            merge_radius_meters = 50.0
            max_owned_shared = 3
            max_joined_shared = 3
            max_members_per_map = 10
            share_code_attempts = 5
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        // Validation is skipped so tests may bind port 0.
        builder.build()?.try_deserialize()
    }

    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }
        if self.policy.merge_radius_meters <= 0.0 {
            return Err(ConfigValidationError::InvalidValue(
                "policy.merge_radius_meters must be positive".to_string(),
            ));
        }
        if self.policy.max_members_per_map == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "policy.max_members_per_map cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigValidationError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| {
                ConfigValidationError::InvalidValue(format!(
                    "Invalid socket address {}:{}",
                    self.server.host, self.server.port
                ))
            })
    }

    pub fn merge_config(&self) -> MergeConfig {
        MergeConfig {
            radius_meters: self.policy.merge_radius_meters,
        }
    }

    pub fn directory_policy(&self) -> DirectoryPolicy {
        DirectoryPolicy {
            max_owned_shared: self.policy.max_owned_shared,
            max_joined_shared: self.policy.max_joined_shared,
            max_members_per_map: self.policy.max_members_per_map,
            share_code_attempts: self.policy.share_code_attempts,
        }
    }
}
