//! Configuration for the StudyMate server and CLI.
//!
//! Settings live in `studymate.json` with camelCase keys. Every field has a
//! default, so a missing file or an empty object is a valid configuration.
//! The API key itself is never stored here, only the name of the environment
//! variable that holds it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};
use crate::quiz::{DEFAULT_QUIZ_LENGTH, FORM_QUIZ_LENGTHS};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "studymate.json";

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_quiz_length() -> u8 {
    DEFAULT_QUIZ_LENGTH
}

/// Default HTTP timeout of gateway calls in seconds.
const fn default_request_timeout() -> u64 {
    60
}

const fn default_max_sessions() -> usize {
    1000
}

/// Default idle time in seconds before a session may be evicted.
const fn default_session_idle() -> u64 {
    3600
}

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Model name passed to the provider.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the provider API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Environment variable that holds the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Address the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Quiz length used when a request omits one.
    #[serde(default = "default_quiz_length")]
    pub default_quiz_length: u8,

    /// Timeout of one gateway HTTP call in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum number of concurrent HTTP sessions kept in memory.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Seconds a session may sit unused before it is evicted.
    #[serde(default = "default_session_idle")]
    pub session_idle_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base_url: default_api_base_url(),
            api_key_env: default_api_key_env(),
            host: default_host(),
            port: default_port(),
            default_quiz_length: default_quiz_length(),
            request_timeout_secs: default_request_timeout(),
            max_sessions: default_max_sessions(),
            session_idle_secs: default_session_idle(),
        }
    }
}

impl Config {
    /// Loads `studymate.json` from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable, not valid JSON,
    /// or fails validation.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            StudyError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `studymate.json` from `dir`.
    ///
    /// # Errors
    ///
    /// See [`Config::load_from_file`].
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::ConfigParseError` for unreadable files or invalid
    /// JSON, and `StudyError::ConfigValidationError` for out-of-range values.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(StudyError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| StudyError::config_parse(path, e.to_string()))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::ConfigValidationError` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(StudyError::config_validation(
                "model must not be empty",
                "Set model to a Gemini model name such as \"gemini-2.0-flash\" in your studymate.json",
            ));
        }

        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(StudyError::config_validation(
                format!("apiBaseUrl '{}' is not an http(s) URL", self.api_base_url),
                "Set apiBaseUrl to the provider endpoint, e.g. https://generativelanguage.googleapis.com",
            ));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(StudyError::config_validation(
                "apiKeyEnv must not be empty",
                "Set apiKeyEnv to the name of the environment variable holding your API key",
            ));
        }

        if self.port == 0 {
            return Err(StudyError::config_validation(
                "port must be greater than 0",
                "Set port to a free TCP port such as 3000 in your studymate.json",
            ));
        }

        if !FORM_QUIZ_LENGTHS.contains(&self.default_quiz_length) {
            return Err(StudyError::config_validation(
                format!(
                    "defaultQuizLength must be between {} and {}",
                    FORM_QUIZ_LENGTHS.start(),
                    FORM_QUIZ_LENGTHS.end()
                ),
                "Set defaultQuizLength to a value from 3 to 10 in your studymate.json",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(StudyError::config_validation(
                "requestTimeoutSecs must be greater than 0",
                "Set requestTimeoutSecs to at least 1 second in your studymate.json",
            ));
        }

        if self.max_sessions == 0 {
            return Err(StudyError::config_validation(
                "maxSessions must be greater than 0",
                "Set maxSessions to at least 1 in your studymate.json",
            ));
        }

        if self.session_idle_secs == 0 {
            return Err(StudyError::config_validation(
                "sessionIdleSecs must be greater than 0",
                "Set sessionIdleSecs to at least 1 second in your studymate.json",
            ));
        }

        Ok(())
    }

    /// Returns `host:port` for binding the server.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("{name}_{}", std::process::id()))
    }

    #[test]
    fn test_config_default_values() {
        let config = Config::default();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.api_base_url, "https://generativelanguage.googleapis.com");
        assert_eq!(config.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.default_quiz_length, 5);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.max_sessions, 1000);
        assert_eq!(config.session_idle_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization_with_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_deserialization_with_overrides() {
        let json = r#"{
            "model": "gemini-1.5-pro",
            "port": 8080,
            "defaultQuizLength": 7,
            "apiKeyEnv": "MY_KEY"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_quiz_length, 7);
        assert_eq!(config.api_key_env, "MY_KEY");
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let config: Config = serde_json::from_str(r#"{"theme": "dark"}"#).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validation_quiz_length_range() {
        let mut config = Config::default();
        config.default_quiz_length = 2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("defaultQuizLength"));

        config.default_quiz_length = 10;
        assert!(config.validate().is_ok());

        config.default_quiz_length = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_sessions: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            session_idle_secs: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sessionIdleSecs"));
    }

    #[test]
    fn test_validation_rejects_bad_base_url() {
        let config = Config {
            api_base_url: "ftp://example.com".to_string(),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, StudyError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_load_from_file_valid_json() {
        let path = temp_path("test_studymate_valid.json");
        std::fs::write(&path, r#"{"port": 4000, "maxSessions": 10}"#).unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.max_sessions, 10);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let path = temp_path("test_studymate_invalid.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(matches!(err, StudyError::ConfigParseError { .. }));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_from_file_validates_after_parsing() {
        let path = temp_path("test_studymate_validation.json");
        std::fs::write(&path, r#"{"defaultQuizLength": 1}"#).unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(matches!(err, StudyError::ConfigValidationError { .. }));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_from_file_nonexistent_returns_default() {
        let path = temp_path("test_studymate_missing.json");
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_dir_finds_config() {
        let dir = temp_path("test_studymate_dir");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"host": "0.0.0.0"}"#).unwrap();

        let config = Config::load_from_dir(&dir).unwrap();
        assert_eq!(config.host, "0.0.0.0");

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(&dir).ok();
    }
}
