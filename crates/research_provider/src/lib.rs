//! Provider-neutral contract for research runs and conversation persistence.
//!
//! The session driver in `research_chat` depends only on the traits defined
//! here. Wire formats and HTTP details stay in `research_api`, and
//! deterministic doubles live in `research_provider_mock`.

mod http;

use std::sync::Arc;

use async_trait::async_trait;

pub use research_api::{
    ApiError, CancellationSignal, ChunkStream, ConversationCreate, ConversationRecord,
    ConversationSummary, ConversationUpdate, ResearchRequest,
};

/// Shared handle to a research stream transport.
pub type SharedTransport = Arc<dyn ResearchTransport>;

/// Shared handle to a conversation store.
pub type SharedStore = Arc<dyn ConversationStore>;

/// Shared handle to a token provider.
pub type SharedTokens = Arc<dyn TokenProvider>;

/// Source of bearer tokens for authenticated calls.
///
/// Injected at construction so the driver never reaches for global identity
/// state.
#[async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    /// Returns the current bearer token, or `None` when signed out.
    async fn bearer_token(&self) -> Option<String>;
}

/// Token provider returning one fixed token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    /// Creates a provider for `token`; blank tokens count as signed out.
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token
                .map(|token| token.trim().to_owned())
                .filter(|token| !token.is_empty()),
        }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Opens the long-lived research event stream.
#[async_trait]
pub trait ResearchTransport: Send + Sync + 'static {
    /// Starts a research run and returns its raw body chunks.
    ///
    /// Non-success responses must be reported as `Err` before any chunk is
    /// yielded. Implementations observe `cancel` while the request is being
    /// set up.
    async fn open_stream(
        &self,
        request: &ResearchRequest,
        token: Option<&str>,
        cancel: Option<&CancellationSignal>,
    ) -> Result<ChunkStream, ApiError>;
}

/// CRUD access to persisted conversations.
#[async_trait]
pub trait ConversationStore: Send + Sync + 'static {
    async fn create(
        &self,
        token: Option<&str>,
        payload: &ConversationCreate,
    ) -> Result<ConversationRecord, ApiError>;

    async fn get(&self, token: Option<&str>, id: i64) -> Result<ConversationRecord, ApiError>;

    async fn update(
        &self,
        token: Option<&str>,
        id: i64,
        update: &ConversationUpdate,
    ) -> Result<ConversationRecord, ApiError>;

    async fn delete(&self, token: Option<&str>, id: i64) -> Result<(), ApiError>;

    /// Lists conversations newest first.
    async fn list(
        &self,
        token: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ConversationSummary>, ApiError>;
}
