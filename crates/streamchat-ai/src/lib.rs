//! StreamChat AI - streaming chat-completion client
//!
//! This crate provides:
//! - One-shot chat-completion requests with incremental SSE deltas
//! - Conversation sessions that keep history across turns
//! - A pluggable HTTP transport (reqwest-backed, plus an in-memory mock)

pub mod chat;
pub mod error;
mod http_client;
pub mod transport;

// Re-export commonly used types
pub use chat::{
    ChannelListener, ChatEvent, ChatEventListener, ChatRequest, ChatSession, DEFAULT_ENDPOINT,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, Message, RequestParams, Role,
    SessionConfig, SubscriptionId,
};
pub use error::{ChatError, Result};
pub use transport::{
    MockExchange, MockTransport, ReqwestTransport, ResponseSink, Transport, TransportRequest,
    TransportResponse,
};
