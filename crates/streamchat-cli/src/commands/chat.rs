use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use streamchat_ai::{ChannelListener, ChatSession, ReqwestTransport, SessionConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{drain_pending, print_reply};
use crate::cli::ChatArgs;
use crate::config::Settings;

/// One line of interactive input.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Empty,
    Message(&'a str),
    History,
    Clear,
    Quit,
    Unknown(&'a str),
}

impl<'a> ChatInput<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ChatInput::Empty;
        }
        match line {
            "/history" => ChatInput::History,
            "/clear" => ChatInput::Clear,
            "/quit" | "/exit" => ChatInput::Quit,
            command if command.starts_with('/') => ChatInput::Unknown(command),
            message => ChatInput::Message(message),
        }
    }
}

pub async fn run(settings: &Settings, args: ChatArgs) -> Result<()> {
    let transport = Arc::new(ReqwestTransport::new()?);
    let config = SessionConfig::default()
        .with_endpoint(&settings.url)
        .with_max_tokens(settings.max_tokens)
        .with_debug(settings.debug);
    let session = ChatSession::new(transport, config);

    let (listener, mut rx) = ChannelListener::new();
    session.subscribe(listener);

    let system = settings.system_prompt_or(args.system);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    println!("{}", "Type a message, /history, /clear or /quit.".dimmed());
    loop {
        print!("{} ", ">".green().bold());
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ChatInput::parse(&line) {
            ChatInput::Empty => {}
            ChatInput::Quit => break,
            ChatInput::History => print!("{}", session.chat_history()),
            ChatInput::Clear => {
                session.clear_chat();
                println!("{}", "Conversation cleared.".dimmed());
            }
            ChatInput::Unknown(command) => {
                eprintln!("{} unknown command {}", "Error:".red().bold(), command);
            }
            ChatInput::Message(message) => {
                if let Err(err) = session.send_message(
                    &settings.api_key,
                    message,
                    &system,
                    &settings.model,
                    settings.temperature,
                ) {
                    drain_pending(&mut rx);
                    eprintln!("{} {}", "Error:".red().bold(), err);
                    continue;
                }
                if let Err(err) = print_reply(&mut rx, &mut stdout).await {
                    eprintln!("{} {}", "Error:".red().bold(), err);
                }
            }
        }
    }

    tracing::info!(turns = session.messages().len(), "Chat ended");
    Ok(())
}
