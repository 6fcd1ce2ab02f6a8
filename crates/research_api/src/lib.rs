//! Transport-only client primitives for the research service.
//!
//! This crate owns request building, response classification and stream
//! decoding for the research API. It contains no session state and no
//! token acquisition: callers pass bearer tokens per request.
//!
//! Stream decoding classifies each `data:` payload by its shape rather than
//! by any announced `event:` line, see [`sse::classify_payload`].

pub mod cancel;
pub mod client;
pub mod config;
pub mod conversation;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod service;
pub mod sse;

pub use cancel::{await_or_cancel, is_cancelled, CancellationSignal};
pub use client::{ChunkStream, ResearchApiClient, StreamResult};
pub use config::ResearchApiConfig;
pub use conversation::{ConversationRecord, ConversationSummary, StoredMessage};
pub use endpoint::normalize_api_base;
pub use error::ApiError;
pub use events::{ErrorEvent, ResearchProgress, ResearchResult, ResearchStatus, Source, WireEvent};
pub use payload::{ConversationCreate, ConversationUpdate, MessageCreate, ResearchDepth, ResearchRequest};
pub use service::{CacheCleared, CacheInvalidation, CacheStats, HealthStatus, LlmHealth, ServerConfig};
pub use sse::{decode_stream, FrameDecoder};

pub use reqwest::StatusCode;
