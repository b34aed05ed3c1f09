use crate::config::{ConfigError, ConfigSource, ConfigValidator, RangeValidator, UrlValidator};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

/// Configuration trait for client configuration
pub trait AppConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Environment enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue {
                field: "environment".to_string(),
                value: s.to_string(),
                expected: "development, testing, or production".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_str = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        write!(f, "{}", env_str)
    }
}

impl Environment {
    pub fn is_testing(&self) -> bool {
        matches!(self, Environment::Testing)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Upper bound accepted for the relationship expansion depth of a dump
pub const MAX_DUMP_DEPTH: usize = 16;

/// Client configuration shared by sessions and the transport collaborator.
///
/// The mapping engine reads `dump_depth`, `eager_batch_size` and `strict`;
/// the remaining values are carried for the transport (base URL, login,
/// request timeout) and for the host application's logging setup.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub environment: Environment,
    pub base_url: Option<String>,
    pub login: Option<String>,
    pub log_level: String,
    /// Relationship expansion depth used by `Session::dump_options`
    pub dump_depth: usize,
    /// Maximum number of ids sent in one eager-include query
    pub eager_batch_size: usize,
    /// Enforce required fields on every load performed through a session
    pub strict: bool,
    pub request_timeout_secs: u64,
    sources: HashMap<String, ConfigSource>,
}

impl ClientConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self {
            environment: Environment::Development,
            base_url: None,
            login: None,
            log_level: "info".to_string(),
            dump_depth: 1,
            eager_batch_size: 1000,
            strict: false,
            request_timeout_secs: 30,
            sources: HashMap::new(),
        }
    }

    /// Configuration used by test suites: strict loading, quiet logs
    pub fn testing() -> Self {
        let mut config = Self {
            environment: Environment::Testing,
            base_url: Some("http://localhost:3000".to_string()),
            login: Some("neptune".to_string()),
            log_level: "warn".to_string(),
            strict: true,
            ..Self::new()
        };
        config.mark_preset("testing");
        config
    }

    /// Production preset; base URL and login must still come from the environment
    pub fn production() -> Self {
        let mut config = Self {
            environment: Environment::Production,
            request_timeout_secs: 60,
            ..Self::new()
        };
        config.mark_preset("production");
        config
    }

    /// Override the dump depth programmatically
    pub fn with_dump_depth(mut self, depth: usize) -> Self {
        self.dump_depth = depth;
        self.sources.insert("dump_depth".to_string(), ConfigSource::Programmatic);
        self
    }

    /// Override the eager batch size programmatically
    pub fn with_eager_batch_size(mut self, size: usize) -> Self {
        self.eager_batch_size = size;
        self.sources
            .insert("eager_batch_size".to_string(), ConfigSource::Programmatic);
        self
    }

    /// Toggle strict loading programmatically
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self.sources.insert("strict".to_string(), ConfigSource::Programmatic);
        self
    }

    fn mark_preset(&mut self, name: &str) {
        for field in Self::FIELDS {
            self.sources
                .insert(field.to_string(), ConfigSource::Preset(name.to_string()));
        }
    }

    const FIELDS: [&'static str; 8] = [
        "environment",
        "base_url",
        "login",
        "log_level",
        "dump_depth",
        "eager_batch_size",
        "strict",
        "request_timeout_secs",
    ];

    fn read_env(&mut self, field: &str, var: &str) -> Option<String> {
        let value = env::var(var).ok()?;
        self.sources
            .insert(field.to_string(), ConfigSource::EnvVar(var.to_string()));
        Some(value)
    }
}

fn parse_number<T: FromStr>(field: &str, value: String, expected: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid_value(field, value.clone(), expected))
}

fn parse_flag(field: &str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(field, value, "true or false")),
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfigTrait for ClientConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Some(env_str) = config.read_env("environment", "LABBIND_ENV") {
            config.environment = env_str.parse()?;
        }

        config.base_url = config.read_env("base_url", "LABBIND_BASE_URL");
        config.login = config.read_env("login", "LABBIND_LOGIN");

        if let Some(log_level) = config.read_env("log_level", "LABBIND_LOG_LEVEL") {
            config.log_level = log_level.to_lowercase();
        }

        if let Some(depth) = config.read_env("dump_depth", "LABBIND_DUMP_DEPTH") {
            config.dump_depth = parse_number("dump_depth", depth, "non-negative integer")?;
        }

        if let Some(size) = config.read_env("eager_batch_size", "LABBIND_EAGER_BATCH_SIZE") {
            config.eager_batch_size = parse_number("eager_batch_size", size, "positive integer")?;
        }

        if let Some(strict) = config.read_env("strict", "LABBIND_STRICT") {
            config.strict = parse_flag("strict", strict)?;
        }

        if let Some(timeout) = config.read_env("request_timeout_secs", "LABBIND_TIMEOUT_SECS") {
            config.request_timeout_secs =
                parse_number("request_timeout_secs", timeout, "number of seconds")?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log_level".to_string(),
                value: self.log_level.clone(),
                expected: format!("one of: {}", valid_levels.join(", ")),
            });
        }

        RangeValidator {
            field: "dump_depth",
            min: 0,
            max: MAX_DUMP_DEPTH,
        }
        .validate(&self.dump_depth)?;

        RangeValidator {
            field: "eager_batch_size",
            min: 1,
            max: 100_000,
        }
        .validate(&self.eager_batch_size)?;

        if let Some(ref base_url) = self.base_url {
            UrlValidator::default().validate(base_url.as_str())?;
        }

        if self.environment.is_production() {
            if self.base_url.is_none() {
                return Err(ConfigError::missing_required(
                    "base_url",
                    "LABBIND_BASE_URL environment variable is required in production",
                ));
            }

            if self.login.is_none() {
                return Err(ConfigError::missing_required(
                    "login",
                    "LABBIND_LOGIN environment variable is required in production",
                ));
            }
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        for field in Self::FIELDS {
            let source = self
                .sources
                .get(field)
                .cloned()
                .unwrap_or_else(|| ConfigSource::Default(field.to_string()));
            sources.insert(field.to_string(), source);
        }
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 8] = [
        "LABBIND_ENV",
        "LABBIND_BASE_URL",
        "LABBIND_LOGIN",
        "LABBIND_LOG_LEVEL",
        "LABBIND_DUMP_DEPTH",
        "LABBIND_EAGER_BATCH_SIZE",
        "LABBIND_STRICT",
        "LABBIND_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("TEST".parse::<Environment>().unwrap(), Environment::Testing);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.dump_depth, 1);
        assert!(!config.strict);
        assert!(ClientConfig::testing().validate().is_ok());
    }

    #[test]
    fn test_production_requires_base_url_and_login() {
        let err = ClientConfig::production().validate().unwrap_err();
        assert_eq!(err.field(), Some("base_url"));

        let mut config = ClientConfig::production();
        config.base_url = Some("https://aquarium.example.org".to_string());
        assert_eq!(config.validate().unwrap_err().field(), Some("login"));

        config.login = Some("operator".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_depth_rejected() {
        let config = ClientConfig::new().with_dump_depth(MAX_DUMP_DEPTH + 1);
        assert_eq!(config.validate().unwrap_err().field(), Some("dump_depth"));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_values_and_sources() {
        clear_env();
        env::set_var("LABBIND_BASE_URL", "http://localhost:3001");
        env::set_var("LABBIND_DUMP_DEPTH", "2");
        env::set_var("LABBIND_STRICT", "yes");

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:3001"));
        assert_eq!(config.dump_depth, 2);
        assert!(config.strict);

        let sources = config.config_sources();
        assert!(sources["base_url"].is_env_var());
        assert!(sources["log_level"].is_default());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        clear_env();
        env::set_var("LABBIND_EAGER_BATCH_SIZE", "lots");

        let err = ClientConfig::from_env().unwrap_err();
        assert_eq!(err.field(), Some("eager_batch_size"));
        clear_env();
    }
}
