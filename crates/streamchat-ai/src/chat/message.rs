//! Chat messages and per-request parameters

use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: i32 = 2048;

/// Chat message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Prefix used when rendering a transcript.
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System: ",
            Role::User => "User: ",
            Role::Assistant => "Assistant: ",
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Configuration snapshot for one chat-completion call.
///
/// Values are stored as given; `temperature` and `max_tokens` are brought
/// into range only when the request body is built.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParams {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    pub temperature: f32,
    pub max_tokens: i32,
    pub debug: bool,
}

impl RequestParams {
    /// Create parameters with provider defaults and no messages.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            url: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            messages: Vec::new(),
            stream: true,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            debug: false,
        }
    }

    /// Single user prompt with defaults otherwise.
    pub fn quick(api_key: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(api_key).with_message(Message::user(prompt))
    }

    /// Existing conversation followed by a new user turn.
    pub fn conversation(
        history: &[Message],
        new_user_message: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.extend_from_slice(history);
        messages.push(Message::user(new_user_message));
        Self::new(api_key).with_messages(messages)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: i32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn effective_temperature(&self) -> f32 {
        clamp_temperature(self.temperature)
    }

    pub fn effective_max_tokens(&self) -> i32 {
        self.max_tokens.max(1)
    }
}

fn clamp_temperature(temperature: f32) -> f32 {
    if temperature.is_nan() {
        DEFAULT_TEMPERATURE
    } else {
        temperature.clamp(0.0, 1.0)
    }
}

/// Wire body of a chat-completion request.
#[derive(Serialize)]
pub(crate) struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    temperature: f32,
    max_tokens: i32,
}

impl<'a> ChatCompletionBody<'a> {
    pub(crate) fn from_params(params: &'a RequestParams) -> Self {
        Self {
            model: &params.model,
            messages: &params.messages,
            stream: params.stream,
            temperature: params.effective_temperature(),
            max_tokens: params.effective_max_tokens(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_clamps_temperature_and_floors_max_tokens() {
        let params = RequestParams::quick("key", "hi")
            .with_temperature(1.7)
            .with_max_tokens(0);
        let body = serde_json::to_value(ChatCompletionBody::from_params(&params)).unwrap();

        assert_eq!(body["temperature"], serde_json::json!(1.0));
        assert_eq!(body["max_tokens"], serde_json::json!(1));

        let cold = RequestParams::quick("key", "hi").with_temperature(-3.0);
        assert_eq!(cold.effective_temperature(), 0.0);
    }

    #[test]
    fn nan_temperature_falls_back_to_default() {
        let params = RequestParams::new("key").with_temperature(f32::NAN);
        assert_eq!(params.effective_temperature(), DEFAULT_TEMPERATURE);
    }

    #[test]
    fn body_serializes_messages_in_order() {
        let params = RequestParams::conversation(
            &[Message::system("be brief"), Message::assistant("ok")],
            "next",
            "key",
        )
        .with_model("deepseek-reasoner")
        .with_stream(false);
        let body = serde_json::to_value(ChatCompletionBody::from_params(&params)).unwrap();

        assert_eq!(body["model"], "deepseek-reasoner");
        assert_eq!(
            body["messages"],
            serde_json::json!([
                {"role": "system", "content": "be brief"},
                {"role": "assistant", "content": "ok"},
                {"role": "user", "content": "next"}
            ])
        );
        assert_eq!(body["stream"], serde_json::json!(false));
        assert_eq!(body["max_tokens"], serde_json::json!(2048));
        let temperature = body["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
    }

    #[test]
    fn quick_params_use_provider_defaults() {
        let params = RequestParams::quick("key", "hello");
        assert_eq!(params.url, DEFAULT_ENDPOINT);
        assert_eq!(params.model, DEFAULT_MODEL);
        assert!(params.stream);
        assert!(!params.debug);
        assert_eq!(params.messages, vec![Message::user("hello")]);
    }
}
