//! Configuration file handling

use serde::Deserialize;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Auto-play settings
    #[serde(default)]
    pub autoplay: AutoPlayConfig,

    /// Console output buffer settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Interpreter limits
    #[serde(default)]
    pub interpreter: InterpreterConfig,
}

/// Auto-play timer settings
#[derive(Debug, Clone, Deserialize)]
pub struct AutoPlayConfig {
    /// Delay between automatic steps
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
}

impl Default for AutoPlayConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval(),
        }
    }
}

impl AutoPlayConfig {
    pub fn interval(&self) -> Duration {
        // A zero period would make tokio's interval panic
        Duration::from_millis(self.interval_ms.max(1))
    }
}

fn default_interval() -> u64 {
    500
}

/// Output buffer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Maximum number of console lines kept per session
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
        }
    }
}

fn default_max_events() -> usize {
    1_000
}

/// Interpreter limits
#[derive(Debug, Clone, Deserialize)]
pub struct InterpreterConfig {
    /// Maximum nesting of script function calls
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,

    /// Maximum nesting when converting values to host form
    #[serde(default = "default_max_conversion_depth")]
    pub max_conversion_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_call_depth: default_max_call_depth(),
            max_conversion_depth: default_max_conversion_depth(),
        }
    }
}

fn default_max_call_depth() -> usize {
    256
}
fn default_max_conversion_depth() -> usize {
    32
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| super::Error::file_read(&path, e))?;
                return Self::parse(&content);
            }
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.autoplay.interval_ms, 500);
        assert_eq!(config.output.max_events, 1_000);
        assert_eq!(config.interpreter.max_call_depth, 256);
        assert_eq!(config.interpreter.max_conversion_depth, 32);
    }

    #[test]
    fn test_partial_override() {
        let config = Config::parse("[autoplay]\ninterval_ms = 50\n").unwrap();
        assert_eq!(config.autoplay.interval(), Duration::from_millis(50));
        assert_eq!(config.output.max_events, 1_000);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = Config::parse("[autoplay]\ninterval_ms = 0\n").unwrap();
        assert_eq!(config.autoplay.interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_invalid_toml_is_config_parse_error() {
        let err = Config::parse("[autoplay\n").unwrap_err();
        assert!(matches!(err, super::super::Error::ConfigParse(_)));
    }
}
