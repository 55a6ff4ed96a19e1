//! One-shot chat-completion request.
//!
//! A [`ChatRequest`] owns a single outbound call: it serializes the body,
//! drives a transport exchange, decodes streamed `data:` lines into content
//! deltas and settles on exactly one terminal notification. The stream's
//! `[DONE]` marker and the transport's completion callback race for that
//! notification; an atomic latch lets only the first one through.
//!
//! Dropping the request tears it down: in-flight callbacks become no-ops and
//! the transport is asked to cancel. Teardown never produces a notification.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::events::{ChatEventListener, ListenerSet, SubscriptionId};
use super::message::{ChatCompletionBody, RequestParams};
use super::sse::{SseEvent, SseLineDecoder};
use crate::error::{ChatError, Result};
use crate::transport::{ResponseSink, Transport, TransportRequest, TransportResponse};

const UNKNOWN_API_ERROR: &str = "Unknown API error";

// Streaming types

#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Handle to one outbound chat-completion call.
pub struct ChatRequest {
    inner: Arc<RequestInner>,
}

impl ChatRequest {
    /// Prepare a request. Nothing is sent until [`ChatRequest::start`].
    pub fn new(params: RequestParams) -> Self {
        Self {
            inner: Arc::new(RequestInner {
                id: Uuid::new_v4(),
                params,
                started: AtomicBool::new(false),
                tearing_down: AtomicBool::new(false),
                terminal: AtomicBool::new(false),
                accumulated: Mutex::new(String::new()),
                decoder: Mutex::new(SseLineDecoder::new()),
                transport: Mutex::new(None),
                listeners: ListenerSet::default(),
                dispatch: ReentrantMutex::new(()),
            }),
        }
    }

    /// Build, subscribe `listener` and issue the call in one step.
    ///
    /// The returned handle owns the request; dropping it cancels the call.
    pub fn send(
        params: RequestParams,
        transport: &dyn Transport,
        listener: Arc<dyn ChatEventListener>,
    ) -> Result<Self> {
        let request = Self::new(params);
        request.subscribe(listener);
        request.start(transport)?;
        Ok(request)
    }

    /// Issue the call. Returns as soon as the transport has accepted it.
    pub fn start(&self, transport: &dyn Transport) -> Result<()> {
        self.inner.start(transport)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn params(&self) -> &RequestParams {
        &self.inner.params
    }

    pub fn subscribe(&self, listener: Arc<dyn ChatEventListener>) -> SubscriptionId {
        self.inner.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    /// Text accumulated from stream deltas so far.
    pub fn full_streamed_text(&self) -> String {
        self.inner.full_text()
    }

    /// Whether a completed or failed notification has been emitted.
    pub fn is_terminal(&self) -> bool {
        self.inner.is_terminal()
    }

    /// Suppress every further callback and cancel the transport exchange.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    /// Start capability that does not own the request, so a caller can
    /// release its own locks before the transport is invoked.
    pub(crate) fn starter(&self) -> RequestStarter {
        RequestStarter(self.inner.clone())
    }
}

impl Drop for ChatRequest {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

pub(crate) struct RequestStarter(Arc<RequestInner>);

impl RequestStarter {
    pub(crate) fn start(self, transport: &dyn Transport) -> Result<()> {
        self.0.start(transport)
    }
}

struct RequestInner {
    id: Uuid,
    params: RequestParams,
    started: AtomicBool,
    tearing_down: AtomicBool,
    terminal: AtomicBool,
    accumulated: Mutex<String>,
    decoder: Mutex<SseLineDecoder>,
    transport: Mutex<Option<Box<dyn TransportRequest>>>,
    listeners: ListenerSet,
    // Held while a transport callback runs and while teardown flips its
    // flag, so teardown never interleaves with a callback in progress.
    dispatch: ReentrantMutex<()>,
}

impl RequestInner {
    fn start(self: &Arc<Self>, transport: &dyn Transport) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ChatError::InvalidRequest(
                "request already started".to_string(),
            ));
        }
        if self.is_tearing_down() {
            return Ok(());
        }

        let params = &self.params;
        self.debug(&format!("Starting request to: {}", params.url));

        let body = serde_json::to_vec(&ChatCompletionBody::from_params(params))?;
        if params.debug {
            self.debug(&format!(
                "Request Body: {}",
                String::from_utf8_lossy(&body)
            ));
        }

        let mut handle = transport.create_request()?;
        handle.set_url(&params.url);
        handle.set_verb("POST");
        handle.set_header("Content-Type", "application/json");
        handle.set_header("Authorization", &format!("Bearer {}", params.api_key));
        handle.set_body(body);
        handle.set_streaming(params.stream);

        self.debug("Sending request...");
        let sink: Arc<dyn ResponseSink> = Arc::new(RequestSink {
            inner: Arc::downgrade(self),
        });
        handle.send(sink)?;

        let mut slot = self.transport.lock();
        if self.is_tearing_down() {
            drop(slot);
            handle.cancel();
        } else if !self.is_terminal() {
            *slot = Some(handle);
        }
        Ok(())
    }

    fn teardown(&self) {
        let _dispatch = self.dispatch.lock();
        if self.tearing_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let handle = self.transport.lock().take();
        if let Some(mut handle) = handle {
            tracing::debug!(request_id = %self.id, "Cancelling in-flight chat request");
            handle.cancel();
        }
    }

    fn handle_chunk(&self, chunk: &[u8]) -> bool {
        let _dispatch = self.dispatch.lock();
        if self.is_tearing_down() || chunk.is_empty() {
            return false;
        }

        let events = self.decoder.lock().push(chunk);
        for event in events {
            if self.is_tearing_down() {
                return false;
            }
            self.handle_event(event);
        }
        !self.is_tearing_down()
    }

    fn handle_event(&self, event: SseEvent) {
        match event {
            SseEvent::Done => {
                if self.mark_terminal() {
                    let text = self.full_text();
                    self.debug("Stream finished");
                    self.listeners.emit_completed(&text);
                }
            }
            SseEvent::Data(token) => {
                let Some(content) = delta_content(&token) else {
                    return;
                };
                if content.is_empty() {
                    return;
                }
                if self.is_terminal() {
                    tracing::trace!(request_id = %self.id, "Ignoring delta after terminal state");
                    return;
                }

                self.accumulated.lock().push_str(&content);
                self.listeners.emit_stream_delta(&content);
                self.debug(&format!(
                    "Stream content length: {}",
                    content.chars().count()
                ));
            }
        }
    }

    fn handle_complete(&self, success: bool, response: Option<TransportResponse>) {
        let _dispatch = self.dispatch.lock();
        if self.is_tearing_down() {
            return;
        }

        let response = match (success, response) {
            (true, Some(response)) => response,
            (_, response) => {
                let error = match response {
                    Some(response) => {
                        ChatError::transport(Some(response.status), Some(response.body_text()))
                    }
                    None => ChatError::transport(None, None),
                };
                self.fail(&error);
                self.release_transport();
                return;
            }
        };

        self.debug(&format!(
            "Received response (length: {} bytes)",
            response.body.len()
        ));
        if !response.is_success() {
            tracing::warn!(
                request_id = %self.id,
                status = response.status,
                "Chat endpoint answered with a non-success status"
            );
        }

        let carried = self.decoder.lock().finish();
        if let Some(event) = carried {
            self.handle_event(event);
        }
        if self.is_tearing_down() {
            return;
        }

        let streamed = self.full_text();
        if !streamed.is_empty() {
            if self.mark_terminal() {
                self.listeners.emit_completed(&streamed);
            }
        } else {
            match interpret_body(&response) {
                Ok(content) => {
                    if self.mark_terminal() {
                        self.listeners.emit_completed(&content);
                    }
                }
                Err(error) => self.fail(&error),
            }
        }

        self.release_transport();
    }

    fn fail(&self, error: &ChatError) {
        if !self.mark_terminal() {
            return;
        }

        let message = error.to_string();
        tracing::warn!(request_id = %self.id, error = %message, "Chat request failed");
        self.listeners.emit_failed(&message);
        if self.params.debug {
            self.listeners.emit_debug(&message);
        }
    }

    fn debug(&self, message: &str) {
        tracing::debug!(request_id = %self.id, "{}", message);
        if self.params.debug {
            self.listeners.emit_debug(message);
        }
    }

    fn release_transport(&self) {
        let handle = self.transport.lock().take();
        drop(handle);
    }

    fn mark_terminal(&self) -> bool {
        self.terminal
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::Acquire)
    }

    fn is_tearing_down(&self) -> bool {
        self.tearing_down.load(Ordering::Acquire)
    }

    fn full_text(&self) -> String {
        self.accumulated.lock().clone()
    }
}

struct RequestSink {
    inner: Weak<RequestInner>,
}

impl ResponseSink for RequestSink {
    fn on_body_chunk(&self, chunk: &[u8]) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.handle_chunk(chunk),
            None => false,
        }
    }

    fn on_complete(&self, success: bool, response: Option<TransportResponse>) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_complete(success, response);
        }
    }
}

fn delta_content(token: &str) -> Option<String> {
    let chunk: StreamChunk = serde_json::from_str(token).ok()?;
    chunk.choices.into_iter().next()?.delta?.content
}

/// Settle a response whose body carried no stream deltas.
fn interpret_body(response: &TransportResponse) -> Result<String> {
    let text = response.body_text();
    let parsed = serde_json::from_str::<Value>(&text)
        .ok()
        .filter(Value::is_object);

    if let Some(body) = &parsed {
        if let Some(message) = api_error_message(body) {
            return Err(ChatError::Api(message));
        }
        if let Some(content) = message_content(body) {
            return Ok(content.to_string());
        }
    }

    Ok(text)
}

fn api_error_message(body: &Value) -> Option<String> {
    body.get("error").map(|error| {
        error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_API_ERROR)
            .to_string()
    })
}

fn message_content(body: &Value) -> Option<&str> {
    body.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}
