//! Deterministic in-process transport for tests.
//!
//! Every request created through a [`MockTransport`] is recorded as a
//! [`MockExchange`]. Tests inspect what was sent and then drive the response
//! side by hand, synchronously, on the calling thread.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{ResponseSink, Transport, TransportRequest, TransportResponse};
use crate::error::{ChatError, Result};

#[derive(Default)]
struct MockState {
    exchanges: Vec<MockExchange>,
    create_error: Option<String>,
}

/// Transport that records exchanges instead of performing them.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose `create_request` always fails.
    pub fn failing(message: impl Into<String>) -> Self {
        let transport = Self::default();
        transport.state.lock().create_error = Some(message.into());
        transport
    }

    pub fn exchanges(&self) -> Vec<MockExchange> {
        self.state.lock().exchanges.clone()
    }

    pub fn exchange_count(&self) -> usize {
        self.state.lock().exchanges.len()
    }

    pub fn last_exchange(&self) -> Option<MockExchange> {
        self.state.lock().exchanges.last().cloned()
    }
}

impl Transport for MockTransport {
    fn create_request(&self) -> Result<Box<dyn TransportRequest>> {
        let mut state = self.state.lock();
        if let Some(message) = &state.create_error {
            return Err(ChatError::InvalidRequest(message.clone()));
        }

        let exchange = MockExchange::default();
        state.exchanges.push(exchange.clone());
        Ok(Box::new(MockRequest { exchange }))
    }
}

#[derive(Default)]
struct ExchangeState {
    url: String,
    verb: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    streaming: bool,
    sent: bool,
    cancelled: bool,
    sink: Option<Arc<dyn ResponseSink>>,
}

/// One recorded exchange. Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct MockExchange {
    state: Arc<Mutex<ExchangeState>>,
}

impl MockExchange {
    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    pub fn verb(&self) -> String {
        self.state.lock().verb.clone()
    }

    /// Header lookup, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    pub fn body(&self) -> Vec<u8> {
        self.state.lock().body.clone()
    }

    pub fn body_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.body())?)
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().streaming
    }

    pub fn is_sent(&self) -> bool {
        self.state.lock().sent
    }

    pub fn was_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Push a body chunk to the sink. Delivery continues after a cancel so
    /// tests can exercise chunks that were already in flight. Returns the
    /// sink's continue signal, or `false` if the exchange was never sent.
    pub fn deliver(&self, chunk: impl AsRef<[u8]>) -> bool {
        match self.sink() {
            Some(sink) => sink.on_body_chunk(chunk.as_ref()),
            None => false,
        }
    }

    /// Finish the exchange with an HTTP response.
    pub fn complete(&self, status: u16, body: impl Into<Vec<u8>>) {
        if let Some(sink) = self.sink() {
            sink.on_complete(true, Some(TransportResponse::new(status, body)));
        }
    }

    /// Finish the exchange with a transport failure.
    pub fn fail(&self, response: Option<TransportResponse>) {
        if let Some(sink) = self.sink() {
            sink.on_complete(false, response);
        }
    }

    // The sink is cloned out so no lock is held while it runs; it may call
    // back into `cancel`.
    fn sink(&self) -> Option<Arc<dyn ResponseSink>> {
        self.state.lock().sink.clone()
    }
}

struct MockRequest {
    exchange: MockExchange,
}

impl TransportRequest for MockRequest {
    fn set_url(&mut self, url: &str) {
        self.exchange.state.lock().url = url.to_string();
    }

    fn set_verb(&mut self, verb: &str) {
        self.exchange.state.lock().verb = verb.to_string();
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.exchange
            .state
            .lock()
            .headers
            .push((name.to_string(), value.to_string()));
    }

    fn set_body(&mut self, body: Vec<u8>) {
        self.exchange.state.lock().body = body;
    }

    fn set_streaming(&mut self, streaming: bool) {
        self.exchange.state.lock().streaming = streaming;
    }

    fn send(&mut self, sink: Arc<dyn ResponseSink>) -> Result<()> {
        let mut state = self.exchange.state.lock();
        state.sink = Some(sink);
        state.sent = true;
        Ok(())
    }

    fn cancel(&mut self) {
        self.exchange.state.lock().cancelled = true;
    }
}
