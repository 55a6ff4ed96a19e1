//! Multi-turn conversation on top of [`ChatRequest`].
//!
//! The session owns the ordered history and at most one in-flight request.
//! Each turn gets a generation number; callbacks from a request that has
//! since been replaced carry a stale generation and are ignored, on top of
//! being unsubscribed when the turn is detached.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::events::{ChatEventListener, ListenerSet, SubscriptionId};
use super::message::{DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS, Message, RequestParams};
use super::request::ChatRequest;
use crate::error::{ChatError, Result};
use crate::transport::Transport;

const EMPTY_MESSAGE: &str = "Cannot send empty message";
const MISSING_API_KEY: &str = "API Key is required";

/// Settings shared by every turn of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Chat-completion endpoint URL
    pub endpoint: String,
    pub max_tokens: i32,
    /// Forward per-request debug notifications
    pub debug: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            debug: false,
        }
    }
}

impl SessionConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
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
}

/// Conversation state plus the request currently answering it.
pub struct ChatSession {
    shared: Arc<SessionShared>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                transport,
                config,
                tearing_down: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                state: Mutex::new(SessionState::default()),
                listeners: ListenerSet::default(),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn subscribe(&self, listener: Arc<dyn ChatEventListener>) -> SubscriptionId {
        self.shared.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.listeners.unsubscribe(id)
    }

    /// Append a user turn and start streaming the assistant's answer.
    ///
    /// `system_prompt` is only used on the first turn of a conversation.
    /// Validation failures are reported to subscribers and returned; the
    /// outcome of an accepted turn arrives through the listeners.
    pub fn send_message(
        &self,
        api_key: &str,
        message: &str,
        system_prompt: &str,
        model: &str,
        temperature: f32,
    ) -> Result<()> {
        let shared = &self.shared;
        if message.is_empty() {
            return Err(shared.reject(ChatError::validation(EMPTY_MESSAGE)));
        }
        if api_key.is_empty() {
            return Err(shared.reject(ChatError::validation(MISSING_API_KEY)));
        }

        let generation = shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let (previous, starter) = {
            let mut state = shared.state.lock();
            state.scratch.clear();
            let previous = state.current.take();

            if state.history.is_empty() && !system_prompt.is_empty() {
                state.history.push(Message::system(system_prompt));
            }
            state.history.push(Message::user(message));

            let params = RequestParams::new(api_key)
                .with_url(&shared.config.endpoint)
                .with_model(model)
                .with_messages(state.history.clone())
                .with_stream(true)
                .with_temperature(temperature)
                .with_max_tokens(shared.config.max_tokens)
                .with_debug(shared.config.debug);

            let request = ChatRequest::new(params);
            let subscription = request.subscribe(Arc::new(SessionRelay {
                session: Arc::downgrade(shared),
                generation,
            }));
            let starter = request.starter();
            state.current = Some(ActiveTurn {
                generation,
                request,
                subscription,
            });
            (previous, starter)
        };

        // Detach outside the state lock: teardown waits for any callback of
        // the old request, and those callbacks take the state lock.
        if let Some(previous) = previous {
            tracing::debug!(
                generation = previous.generation,
                "Discarding unfinished chat turn"
            );
            previous.detach();
        }

        tracing::debug!(generation, model, "Starting chat turn");
        if let Err(error) = starter.start(shared.transport.as_ref()) {
            tracing::warn!(generation, error = %error, "Failed to create API request");
            if let Some(turn) = shared.take_turn(generation) {
                turn.detach();
            }
            shared
                .listeners
                .emit_failed(&format!("Failed to create API request: {error}"));
            return Err(error);
        }
        Ok(())
    }

    /// Ordered conversation history.
    pub fn messages(&self) -> Vec<Message> {
        self.shared.state.lock().history.clone()
    }

    /// History rendered as a plain-text transcript.
    pub fn chat_history(&self) -> String {
        render_transcript(&self.shared.state.lock().history)
    }

    /// Forget the conversation and drop any unfinished turn without
    /// notifying subscribers.
    pub fn clear_chat(&self) {
        let turn = {
            let mut state = self.shared.state.lock();
            state.history.clear();
            state.scratch.clear();
            state.current.take()
        };
        if let Some(turn) = turn {
            turn.detach();
        }
    }

    /// Whether a turn is waiting for its answer.
    pub fn is_busy(&self) -> bool {
        self.shared.state.lock().current.is_some()
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.shared.tearing_down.store(true, Ordering::Release);
        let turn = self.shared.state.lock().current.take();
        if let Some(turn) = turn {
            turn.detach();
        }
    }
}

fn render_transcript(history: &[Message]) -> String {
    let mut transcript = String::with_capacity(1024);
    for message in history {
        transcript.push_str(message.role.label());
        transcript.push_str(&message.content);
        transcript.push_str("\n\n");
    }
    transcript
}

#[derive(Default)]
struct SessionState {
    history: Vec<Message>,
    scratch: String,
    current: Option<ActiveTurn>,
}

impl SessionState {
    fn is_current(&self, generation: u64) -> bool {
        self.current
            .as_ref()
            .is_some_and(|turn| turn.generation == generation)
    }
}

struct ActiveTurn {
    generation: u64,
    request: ChatRequest,
    subscription: SubscriptionId,
}

impl ActiveTurn {
    /// Unsubscribe, then drop the request, which tears it down.
    fn detach(self) {
        self.request.unsubscribe(self.subscription);
    }
}

struct SessionShared {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    tearing_down: AtomicBool,
    generation: AtomicU64,
    state: Mutex<SessionState>,
    listeners: ListenerSet,
}

impl SessionShared {
    fn reject(&self, error: ChatError) -> ChatError {
        tracing::debug!(error = %error, "Rejected chat message");
        self.listeners.emit_failed(&error.to_string());
        error
    }

    fn take_turn(&self, generation: u64) -> Option<ActiveTurn> {
        let mut state = self.state.lock();
        if state.is_current(generation) {
            state.current.take()
        } else {
            None
        }
    }

    fn handle_delta(&self, generation: u64, delta: &str) {
        if self.is_tearing_down() || delta.is_empty() {
            return;
        }
        {
            let mut state = self.state.lock();
            if !state.is_current(generation) {
                return;
            }
            state.scratch.push_str(delta);
        }
        self.listeners.emit_stream_delta(delta);
    }

    fn handle_completed(&self, generation: u64, payload: &str) {
        if self.is_tearing_down() {
            return;
        }

        let (turn, text) = {
            let mut state = self.state.lock();
            if !state.is_current(generation) {
                return;
            }
            let Some(turn) = state.current.take() else {
                return;
            };

            let mut text = turn.request.full_streamed_text();
            if text.is_empty() {
                text = state.scratch.clone();
            }
            if text.is_empty() {
                text = payload.to_string();
            }
            if !text.is_empty() {
                state.history.push(Message::assistant(text.clone()));
            }
            (turn, text)
        };
        turn.detach();

        if text.is_empty() {
            tracing::warn!(generation, "Chat turn finished without content");
            self.listeners
                .emit_failed(&ChatError::EmptyResponse.to_string());
        } else {
            tracing::debug!(generation, len = text.len(), "Chat turn completed");
            self.listeners.emit_completed(&text);
        }
    }

    fn handle_failed(&self, generation: u64, message: &str) {
        if self.is_tearing_down() {
            return;
        }
        let Some(turn) = self.take_turn(generation) else {
            return;
        };
        turn.detach();
        self.listeners.emit_failed(message);
    }

    fn handle_debug(&self, generation: u64, message: &str) {
        if self.is_tearing_down() || !self.state.lock().is_current(generation) {
            return;
        }
        self.listeners.emit_debug(message);
    }

    fn is_tearing_down(&self) -> bool {
        self.tearing_down.load(Ordering::Acquire)
    }
}

/// Routes one turn's request notifications back into the session.
struct SessionRelay {
    session: Weak<SessionShared>,
    generation: u64,
}

impl ChatEventListener for SessionRelay {
    fn on_stream_delta(&self, delta: &str) {
        if let Some(session) = self.session.upgrade() {
            session.handle_delta(self.generation, delta);
        }
    }

    fn on_completed(&self, text: &str) {
        if let Some(session) = self.session.upgrade() {
            session.handle_completed(self.generation, text);
        }
    }

    fn on_failed(&self, message: &str) {
        if let Some(session) = self.session.upgrade() {
            session.handle_failed(self.generation, message);
        }
    }

    fn on_debug(&self, message: &str) {
        if let Some(session) = self.session.upgrade() {
            session.handle_debug(self.generation, message);
        }
    }
}
