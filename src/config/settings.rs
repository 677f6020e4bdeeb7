//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;

/// Model loaded when `EMBEDDING_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Main configuration for the embedding server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifier of the embedding model to load.
    pub model_name: String,

    /// Directory containing one sub-directory per model.
    pub models_dir: PathBuf,

    /// Host address to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Number of embedding worker threads.
    pub embedding_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            models_dir: PathBuf::from("./models"),
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
            embedding_threads: std::thread::available_parallelism()
                .map(|n| n.get().min(2))
                .unwrap_or(2),
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config("port cannot be 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.embedding_threads == 0 {
            return Err(Error::config("embedding_threads cannot be 0"));
        }

        if self.embedding_threads > 32 {
            return Err(Error::config("embedding_threads cannot exceed 32"));
        }

        if self.host.is_empty() {
            return Err(Error::config("host cannot be empty"));
        }

        if self.model_name.trim().is_empty() {
            return Err(Error::config("model name cannot be empty"));
        }

        Ok(())
    }

    /// Local directory for the configured model. When it does not exist the
    /// model is fetched from the hub instead.
    #[must_use]
    pub fn model_dir(&self) -> PathBuf {
        self.models_dir.join(&self.model_name)
    }

    /// Get the server address as a string.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_new() {
        let config = Config::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = Config {
            port: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = Config {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn test_validate_embedding_threads_bounds() {
        let zero = Config {
            embedding_threads: 0,
            ..Default::default()
        };
        assert!(zero
            .validate()
            .unwrap_err()
            .to_string()
            .contains("embedding_threads"));

        let too_many = Config {
            embedding_threads: 64,
            ..Default::default()
        };
        assert!(too_many.validate().unwrap_err().to_string().contains("32"));
    }

    #[test]
    fn test_validate_empty_host() {
        let config = Config {
            host: String::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_validate_blank_model_name() {
        let config = Config {
            model_name: "  ".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("model name"));
    }

    #[test]
    fn test_model_dir() {
        let config = Config {
            model_name: "sentence-transformers/all-mpnet-base-v2".to_string(),
            models_dir: PathBuf::from("/opt/models"),
            ..Default::default()
        };
        assert_eq!(
            config.model_dir(),
            PathBuf::from("/opt/models/sentence-transformers/all-mpnet-base-v2")
        );
    }

    #[test]
    fn test_server_addr() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 9090,
            ..Default::default()
        };
        assert_eq!(config.server_addr(), "127.0.0.1:9090");
    }

    #[test]
    fn test_log_level_case_insensitive() {
        for level in ["TRACE", "Debug", "INFO", "Warn", "ERROR"] {
            let config = Config {
                log_level: level.to_string(),
                ..Default::default()
            };
            assert!(
                config.validate().is_ok(),
                "Level '{level}' should be valid (case insensitive)"
            );
        }
    }
}
