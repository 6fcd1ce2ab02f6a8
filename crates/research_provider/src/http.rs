use async_trait::async_trait;
use research_api::{
    ApiError, CancellationSignal, ChunkStream, ConversationCreate, ConversationRecord,
    ConversationSummary, ConversationUpdate, ResearchApiClient, ResearchRequest,
};

use crate::{ConversationStore, ResearchTransport};

#[async_trait]
impl ResearchTransport for ResearchApiClient {
    async fn open_stream(
        &self,
        request: &ResearchRequest,
        token: Option<&str>,
        cancel: Option<&CancellationSignal>,
    ) -> Result<ChunkStream, ApiError> {
        self.open_research_stream(request, token, cancel).await
    }
}

#[async_trait]
impl ConversationStore for ResearchApiClient {
    async fn create(
        &self,
        token: Option<&str>,
        payload: &ConversationCreate,
    ) -> Result<ConversationRecord, ApiError> {
        self.create_conversation(token, payload).await
    }

    async fn get(&self, token: Option<&str>, id: i64) -> Result<ConversationRecord, ApiError> {
        self.get_conversation(token, id).await
    }

    async fn update(
        &self,
        token: Option<&str>,
        id: i64,
        update: &ConversationUpdate,
    ) -> Result<ConversationRecord, ApiError> {
        self.update_conversation(token, id, update).await
    }

    async fn delete(&self, token: Option<&str>, id: i64) -> Result<(), ApiError> {
        self.delete_conversation(token, id).await
    }

    async fn list(
        &self,
        token: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ConversationSummary>, ApiError> {
        self.list_conversations(token, limit, offset).await
    }
}
