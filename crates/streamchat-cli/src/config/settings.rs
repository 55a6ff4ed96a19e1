//! Effective settings for one invocation.
//!
//! Precedence: command-line flag, then environment, then config file, then
//! the library defaults.

use anyhow::{Result, bail};
use streamchat_ai::{DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

use super::CliConfig;
use crate::cli::Cli;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: String,
    pub url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: i32,
    pub system_prompt: Option<String>,
    pub debug: bool,
}

impl Settings {
    pub fn resolve(cli: &Cli, config: &CliConfig) -> Result<Self> {
        // The env fallback for --api-key and --url is handled by clap.
        let api_key = cli
            .api_key
            .clone()
            .or_else(|| config.api_keys.deepseek.clone())
            .filter(|key| !key.trim().is_empty());
        let Some(api_key) = api_key else {
            bail!("API key not found");
        };

        let defaults = &config.default;
        Ok(Self {
            api_key,
            url: cli
                .url
                .clone()
                .or_else(|| defaults.url.clone())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: cli
                .model
                .clone()
                .or_else(|| defaults.model.clone())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: cli
                .temperature
                .or(defaults.temperature)
                .unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: cli
                .max_tokens
                .or(defaults.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            system_prompt: defaults.system_prompt.clone(),
            debug: cli.debug,
        })
    }

    /// System prompt from the command line, falling back to the config file.
    pub fn system_prompt_or(&self, explicit: Option<String>) -> String {
        explicit
            .or_else(|| self.system_prompt.clone())
            .unwrap_or_default()
    }
}
