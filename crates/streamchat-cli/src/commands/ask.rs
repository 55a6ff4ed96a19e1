use anyhow::Result;
use streamchat_ai::{ChannelListener, ChatRequest, Message, RequestParams, ReqwestTransport};

use super::print_reply;
use crate::cli::AskArgs;
use crate::config::Settings;

pub async fn run(settings: &Settings, args: AskArgs) -> Result<()> {
    let transport = ReqwestTransport::new()?;

    let mut messages = Vec::with_capacity(2);
    let system = settings.system_prompt_or(args.system);
    if !system.is_empty() {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(args.prompt));

    let params = RequestParams::new(&settings.api_key)
        .with_url(&settings.url)
        .with_model(&settings.model)
        .with_messages(messages)
        .with_stream(!args.no_stream)
        .with_temperature(settings.temperature)
        .with_max_tokens(settings.max_tokens)
        .with_debug(settings.debug);

    let (listener, mut rx) = ChannelListener::new();
    let request = ChatRequest::send(params, &transport, listener)?;
    let sent = request.params();
    tracing::info!(
        request_id = %request.id(),
        model = %sent.model,
        stream = sent.stream,
        messages = sent.messages.len(),
        "Sent prompt"
    );

    let mut stdout = std::io::stdout();
    print_reply(&mut rx, &mut stdout).await?;
    Ok(())
}
