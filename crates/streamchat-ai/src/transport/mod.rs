//! Transport module - the HTTP collaborator a chat request drives
//!
//! A [`ChatRequest`](crate::chat::ChatRequest) never talks to the network
//! directly. It asks a [`Transport`] for a fresh [`TransportRequest`],
//! configures it, and hands it a [`ResponseSink`] that receives body chunks
//! and the final outcome. Sinks may be invoked from a different task or
//! thread than the one that issued the request.

mod http;
mod mock;

use std::sync::Arc;

use crate::error::Result;

pub use http::ReqwestTransport;
pub use mock::{MockExchange, MockTransport};

/// Factory for outbound HTTP exchanges.
pub trait Transport: Send + Sync {
    fn create_request(&self) -> Result<Box<dyn TransportRequest>>;
}

/// A single configurable HTTP exchange.
pub trait TransportRequest: Send {
    fn set_url(&mut self, url: &str);

    fn set_verb(&mut self, verb: &str);

    fn set_header(&mut self, name: &str, value: &str);

    fn set_body(&mut self, body: Vec<u8>);

    /// Deliver the body incrementally through [`ResponseSink::on_body_chunk`].
    /// When off, only [`ResponseSink::on_complete`] is invoked.
    fn set_streaming(&mut self, streaming: bool);

    /// Issue the request. Returns immediately; the outcome arrives through
    /// `sink`.
    fn send(&mut self, sink: Arc<dyn ResponseSink>) -> Result<()>;

    /// Ask the transport to stop the exchange early. Chunks already in
    /// flight may still reach the sink.
    fn cancel(&mut self);
}

/// Receiver side of an exchange.
pub trait ResponseSink: Send + Sync {
    /// Returns `false` to ask the transport to stop delivering chunks.
    fn on_body_chunk(&self, chunk: &[u8]) -> bool;

    /// Called once when the exchange ends. `success` is false for
    /// connection-level failures; `response` is absent when no response
    /// object could be produced.
    fn on_complete(&self, success: bool, response: Option<TransportResponse>);
}

/// Response object handed to [`ResponseSink::on_complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
