//! Chat module - streaming requests and multi-turn sessions

pub mod events;
mod message;
mod request;
mod session;
pub mod sse;

pub use events::{ChannelListener, ChatEvent, ChatEventListener, SubscriptionId};
pub use message::{
    DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, Message,
    RequestParams, Role,
};
pub use request::ChatRequest;
pub use session::{ChatSession, SessionConfig};
