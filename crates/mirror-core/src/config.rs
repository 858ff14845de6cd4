//! Reflector configuration
//!
//! Loaded from the `[reflect]` table of a TOML file:
//!
//! ```toml
//! [reflect]
//! primary_scope = "app"
//! accessor_flags = "PUBLIC | NON_PUBLIC | INSTANCE | STATIC"
//! invoke_flags = "PUBLIC"
//! constructor_flags = "PUBLIC | INSTANCE"
//! collect_stats = true
//! ```
//!
//! Every key is optional.

use std::path::Path;

use mirror_types::BindingFlags;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parse error
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Settings for a [`Reflector`](crate::Reflector)
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectorConfig {
    /// Module searched first by type resolution; `None` uses the universe's
    /// primary module
    pub primary_scope: Option<String>,

    /// Flags used by compiled getters and setters
    pub accessor_flags: BindingFlags,

    /// Visibility flags used by method dispatch. `INSTANCE` or `STATIC` is
    /// added according to the receiver.
    pub invoke_flags: BindingFlags,

    /// Flags used when selecting constructors
    pub constructor_flags: BindingFlags,

    /// Maintain hit/miss counters
    pub collect_stats: bool,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            primary_scope: None,
            accessor_flags: BindingFlags::ALL,
            invoke_flags: BindingFlags::PUBLIC | BindingFlags::NON_PUBLIC,
            constructor_flags: BindingFlags::ALL_INSTANCE,
            collect_stats: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    reflect: ReflectSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReflectSection {
    primary_scope: Option<String>,
    accessor_flags: Option<String>,
    invoke_flags: Option<String>,
    constructor_flags: Option<String>,
    collect_stats: Option<bool>,
}

impl ReflectorConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        let section = file.reflect;
        let defaults = Self::default();

        let config = Self {
            primary_scope: section.primary_scope,
            accessor_flags: parse_flags("accessor_flags", section.accessor_flags)?
                .unwrap_or(defaults.accessor_flags),
            invoke_flags: parse_flags("invoke_flags", section.invoke_flags)?
                .unwrap_or(defaults.invoke_flags),
            constructor_flags: parse_flags("constructor_flags", section.constructor_flags)?
                .unwrap_or(defaults.constructor_flags),
            collect_stats: section.collect_stats.unwrap_or(defaults.collect_stats),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the settings can resolve anything at all
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(scope) = &self.primary_scope {
            if scope.is_empty() {
                return Err(ConfigError::ValidationError(
                    "primary_scope cannot be empty".to_string(),
                ));
            }
        }

        let visibility = BindingFlags::PUBLIC | BindingFlags::NON_PUBLIC;
        for (key, flags) in [
            ("accessor_flags", self.accessor_flags),
            ("invoke_flags", self.invoke_flags),
            ("constructor_flags", self.constructor_flags),
        ] {
            if flags.bits() & visibility.bits() == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{key} must include PUBLIC or NON_PUBLIC, got {flags}"
                )));
            }
        }

        if !self.constructor_flags.contains(BindingFlags::INSTANCE) {
            return Err(ConfigError::ValidationError(format!(
                "constructor_flags must include INSTANCE, got {}",
                self.constructor_flags
            )));
        }

        Ok(())
    }
}

fn parse_flags(key: &str, value: Option<String>) -> Result<Option<BindingFlags>, ConfigError> {
    match value {
        None => Ok(None),
        Some(text) => BindingFlags::parse(&text).map(Some).ok_or_else(|| {
            ConfigError::ValidationError(format!("invalid binding flags for {key}: '{text}'"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ReflectorConfig::from_toml("").unwrap();
        assert_eq!(config, ReflectorConfig::default());
        assert!(config.collect_stats);
        assert_eq!(config.accessor_flags, BindingFlags::ALL);
    }

    #[test]
    fn test_parse_full() {
        let toml = r#"
[reflect]
primary_scope = "app"
accessor_flags = "PUBLIC | INSTANCE"
invoke_flags = "PUBLIC"
constructor_flags = "ALL_INSTANCE"
collect_stats = false
"#;
        let config = ReflectorConfig::from_toml(toml).unwrap();
        assert_eq!(config.primary_scope.as_deref(), Some("app"));
        assert_eq!(
            config.accessor_flags,
            BindingFlags::PUBLIC | BindingFlags::INSTANCE
        );
        assert_eq!(config.invoke_flags, BindingFlags::PUBLIC);
        assert!(!config.collect_stats);
    }

    #[test]
    fn test_invalid_flags() {
        let result = ReflectorConfig::from_toml("[reflect]\ninvoke_flags = \"PUBLIK\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let result = ReflectorConfig::from_toml("[reflect]\naccessor_flags = \"INSTANCE\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let result = ReflectorConfig::from_toml("[reflect]\nconstructor_flags = \"PUBLIC\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = ReflectorConfig::from_toml("[reflect]\ncache_size = 10\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_empty_scope_rejected() {
        let result = ReflectorConfig::from_toml("[reflect]\nprimary_scope = \"\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[reflect]\nprimary_scope = \"geometry\"").unwrap();
        let config = ReflectorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.primary_scope.as_deref(), Some("geometry"));

        let missing = ReflectorConfig::from_file(Path::new("/nonexistent/mirror.toml"));
        assert!(matches!(missing, Err(ConfigError::IoError(_))));
    }
}
