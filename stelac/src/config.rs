//! Compiler configuration.
//!
//! Settings can be supplied through the builder API, environment variables
//! or command line flags. The CLI starts from [`CompilerConfig::from_env`]
//! and applies its flags on top.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `STELA_WARN_UNUSED` | Warn about unreferenced declarations | true |
//! | `STELA_WARN_SHADOW` | Warn when a name shadows an outer one | true |
//! | `STELA_RELOCATION_ELISION` | Relocate temporaries instead of move + destroy | true |
//! | `STELA_MESSAGE_FORMAT` | Diagnostic output (`human`, `json`) | human |
//! | `STELA_LOG` | `tracing` filter for compiler internals | warn |
//!
//! # Example
//!
//! ```rust
//! use stelac::config::CompilerConfig;
//!
//! let config = CompilerConfig::builder()
//!     .warn_unused(false)
//!     .relocation_elision(true)
//!     .build();
//! assert!(config.validate().is_ok());
//! ```

use std::env;

use thiserror::Error;

/// How diagnostics are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    /// Annotated source snippets.
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

impl MessageFormat {
    /// Parse a format from its name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Some(MessageFormat::Human),
            "json" => Some(MessageFormat::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageFormat::Human => "human",
            MessageFormat::Json => "json",
        }
    }
}

/// Settings for one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Report declarations nothing refers to.
    pub warn_unused: bool,
    /// Report bindings that hide a binding of an enclosing scope.
    pub warn_shadow: bool,
    /// Collapse move + destroy of a temporary into a relocation.
    pub relocation_elision: bool,
    /// Diagnostic rendering.
    pub message_format: MessageFormat,
    /// `tracing` filter directive.
    pub log_filter: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            warn_unused: true,
            warn_shadow: true,
            relocation_elision: true,
            message_format: MessageFormat::Human,
            log_filter: "warn".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Create a new builder for CompilerConfig.
    pub fn builder() -> CompilerConfigBuilder {
        CompilerConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// Variables that are not set keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(val) = parse_env_bool("STELA_WARN_UNUSED")? {
            config.warn_unused = val;
        }
        if let Some(val) = parse_env_bool("STELA_WARN_SHADOW")? {
            config.warn_shadow = val;
        }
        if let Some(val) = parse_env_bool("STELA_RELOCATION_ELISION")? {
            config.relocation_elision = val;
        }

        if let Ok(val) = env::var("STELA_MESSAGE_FORMAT") {
            config.message_format =
                MessageFormat::from_str(&val).ok_or_else(|| ConfigError::EnvParseError {
                    var: "STELA_MESSAGE_FORMAT".into(),
                    message: format!("expected `human` or `json`, found `{val}`"),
                })?;
        }

        if let Ok(val) = env::var("STELA_LOG") {
            config.log_filter = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log_filter".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("invalid configuration for '{field}': {message}")]
    InvalidValue { field: String, message: String },
    /// Environment variable parse error.
    #[error("failed to parse environment variable '{var}': {message}")]
    EnvParseError { var: String, message: String },
}

/// Builder for CompilerConfig.
#[derive(Debug, Clone, Default)]
pub struct CompilerConfigBuilder {
    config: CompilerConfig,
}

impl CompilerConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn_unused(mut self, enabled: bool) -> Self {
        self.config.warn_unused = enabled;
        self
    }

    pub fn warn_shadow(mut self, enabled: bool) -> Self {
        self.config.warn_shadow = enabled;
        self
    }

    pub fn relocation_elision(mut self, enabled: bool) -> Self {
        self.config.relocation_elision = enabled;
        self
    }

    pub fn message_format(mut self, format: MessageFormat) -> Self {
        self.config.message_format = format;
        self
    }

    /// Set the `tracing` filter, e.g. `stelac=debug`.
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.log_filter = filter.into();
        self
    }

    pub fn build(self) -> CompilerConfig {
        self.config
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean variable; unset is `Ok(None)`.
fn parse_env_bool(var: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(var) {
        Ok(val) => parse_bool(&val)
            .map(Some)
            .ok_or_else(|| ConfigError::EnvParseError {
                var: var.into(),
                message: format!("expected a boolean, found `{val}`"),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert!(config.warn_unused);
        assert!(config.warn_shadow);
        assert!(config.relocation_elision);
        assert_eq!(config.message_format, MessageFormat::Human);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = CompilerConfig::builder()
            .warn_shadow(false)
            .message_format(MessageFormat::Json)
            .log_filter("stelac=debug")
            .build();
        assert!(!config.warn_shadow);
        assert_eq!(config.message_format.as_str(), "json");
        assert_eq!(config.log_filter, "stelac=debug");
    }

    #[test]
    fn test_validate_rejects_empty_filter() {
        let config = CompilerConfig::builder().log_filter(" ").build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_parse_bool_values() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(MessageFormat::from_str("JSON"), Some(MessageFormat::Json));
        assert_eq!(MessageFormat::from_str("xml"), None);
    }
}
