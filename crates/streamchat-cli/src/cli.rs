use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "streamchat")]
#[command(version, about = "StreamChat - streaming chat completions from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API key sent as a bearer token
    #[arg(long, global = true, env = "STREAMCHAT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model name (defaults to deepseek-chat)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Chat-completion endpoint URL
    #[arg(long, global = true, env = "STREAMCHAT_URL")]
    pub url: Option<String>,

    /// Sampling temperature, clamped into [0, 1]
    #[arg(long, global = true)]
    pub temperature: Option<f32>,

    /// Maximum tokens in the reply
    #[arg(long, global = true)]
    pub max_tokens: Option<i32>,

    /// Print request debug notifications to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file (defaults to ~/.config/streamchat/config.toml)
    #[arg(long, global = true, env = "STREAMCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a single prompt and print the reply
    Ask(AskArgs),

    /// Start an interactive conversation
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Prompt to send
    pub prompt: String,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    pub no_stream: bool,

    /// System prompt placed before the user message
    #[arg(long)]
    pub system: Option<String>,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// System prompt for the first turn
    #[arg(long)]
    pub system: Option<String>,
}
