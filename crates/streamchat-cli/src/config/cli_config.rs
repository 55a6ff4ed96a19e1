//! CLI configuration file support
//!
//! Loads configuration from ~/.config/streamchat/config.toml

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default settings
    #[serde(default)]
    pub default: DefaultConfig,
    /// API key settings
    #[serde(default)]
    pub api_keys: ApiKeysConfig,
}

/// Default configuration values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultConfig {
    pub model: Option<String>,
    /// Chat-completion endpoint URL
    pub url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    /// System prompt used when none is given on the command line
    pub system_prompt: Option<String>,
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    /// DeepSeek API key
    pub deepseek: Option<String>,
}

impl CliConfig {
    /// Load configuration from the given path, or the default one.
    ///
    /// A missing or unreadable file yields the defaults.
    pub fn load(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::load_from_path(Some(path.to_path_buf())),
            None => Self::load_from_path(Self::default_path()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "Ignoring malformed config file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("streamchat").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults_and_keys() {
        let config: CliConfig = toml::from_str(
            r#"
[default]
model = "deepseek-reasoner"
temperature = 0.2
system_prompt = "Be brief."

[api_keys]
deepseek = "sk-file"
"#,
        )
        .unwrap();

        assert_eq!(config.default.model.as_deref(), Some("deepseek-reasoner"));
        assert_eq!(config.default.temperature, Some(0.2));
        assert_eq!(config.default.url, None);
        assert_eq!(config.api_keys.deepseek.as_deref(), Some("sk-file"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = CliConfig::load_from_path(Some(PathBuf::from("/nonexistent/streamchat.toml")));
        assert!(config.api_keys.deepseek.is_none());
        assert!(config.default.model.is_none());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[default\nmodel = ").unwrap();

        let config = CliConfig::load(Some(&path));
        assert!(config.default.model.is_none());
    }
}
