use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use research_api::{StatusCode, StoredMessage};
use research_provider::{
    ApiError, ConversationCreate, ConversationRecord, ConversationStore, ConversationSummary,
    ConversationUpdate,
};

use crate::lock_unpoisoned;

/// Timestamp stamped on every record and message the store creates.
pub const MOCK_TIMESTAMP: &str = "2025-01-01T12:00:00";

#[derive(Debug, Clone)]
struct StoredConversation {
    owner: String,
    record: ConversationRecord,
}

#[derive(Debug, Default)]
struct StoreState {
    next_id: i64,
    next_message_id: i64,
    conversations: BTreeMap<i64, StoredConversation>,
    creates: Vec<ConversationCreate>,
    updates: Vec<(i64, ConversationUpdate)>,
    fail_creates: bool,
    fail_updates: bool,
    create_delay: Duration,
}

impl StoreState {
    fn next_message_id(&mut self) -> i64 {
        self.next_message_id += 1;
        self.next_message_id
    }
}

/// In-memory conversation store with per-token ownership.
///
/// Mirrors the persistence service closely enough for session tests: calls
/// without a token fail with [`ApiError::MissingAccessToken`], records owned
/// by another token are [`ApiError::Forbidden`], and updates append messages.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    state: Mutex<StoreState>,
}

impl MemoryConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent create fail with a server error.
    pub fn fail_creates(&self, fail: bool) {
        lock_unpoisoned(&self.state).fail_creates = fail;
    }

    /// Makes every subsequent update fail with a server error.
    pub fn fail_updates(&self, fail: bool) {
        lock_unpoisoned(&self.state).fail_updates = fail;
    }

    /// Delays creates so callers can observe an in-flight create.
    pub fn set_create_delay(&self, delay: Duration) {
        lock_unpoisoned(&self.state).create_delay = delay;
    }

    /// Seeds a record owned by `owner`, keeping its id.
    pub fn insert(&self, owner: &str, record: ConversationRecord) {
        let mut state = lock_unpoisoned(&self.state);
        state.next_id = state.next_id.max(record.id);
        let highest_message = record.messages.iter().map(|message| message.id).max();
        if let Some(highest) = highest_message {
            state.next_message_id = state.next_message_id.max(highest);
        }
        state.conversations.insert(
            record.id,
            StoredConversation {
                owner: owner.to_owned(),
                record,
            },
        );
    }

    #[must_use]
    pub fn record(&self, id: i64) -> Option<ConversationRecord> {
        lock_unpoisoned(&self.state)
            .conversations
            .get(&id)
            .map(|stored| stored.record.clone())
    }

    #[must_use]
    pub fn creates(&self) -> Vec<ConversationCreate> {
        lock_unpoisoned(&self.state).creates.clone()
    }

    #[must_use]
    pub fn updates(&self) -> Vec<(i64, ConversationUpdate)> {
        lock_unpoisoned(&self.state).updates.clone()
    }

    fn owned_mut<'a>(
        state: &'a mut StoreState,
        owner: &str,
        id: i64,
    ) -> Result<&'a mut StoredConversation, ApiError> {
        let stored = state
            .conversations
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound("Conversation not found".to_owned()))?;
        if stored.owner != owner {
            return Err(ApiError::Forbidden(
                "You don't have access to this conversation".to_owned(),
            ));
        }
        Ok(stored)
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create(
        &self,
        token: Option<&str>,
        payload: &ConversationCreate,
    ) -> Result<ConversationRecord, ApiError> {
        let owner = require_token(token)?;
        let delay = lock_unpoisoned(&self.state).create_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock_unpoisoned(&self.state);
        state.creates.push(payload.clone());
        if state.fail_creates {
            return Err(server_error());
        }

        state.next_id += 1;
        let id = state.next_id;
        let mut messages = Vec::with_capacity(payload.messages.len());
        for message in &payload.messages {
            messages.push(StoredMessage {
                id: state.next_message_id(),
                role: message.role.clone(),
                content: message.content.clone(),
                timestamp: MOCK_TIMESTAMP.to_owned(),
            });
        }

        let record = ConversationRecord {
            id,
            topic: payload.topic.clone(),
            depth: payload.depth.as_str().to_owned(),
            briefing: None,
            total_time_seconds: None,
            model_used: None,
            created_at: MOCK_TIMESTAMP.to_owned(),
            updated_at: MOCK_TIMESTAMP.to_owned(),
            messages,
        };
        state.conversations.insert(
            id,
            StoredConversation {
                owner: owner.to_owned(),
                record: record.clone(),
            },
        );
        Ok(record)
    }

    async fn get(&self, token: Option<&str>, id: i64) -> Result<ConversationRecord, ApiError> {
        let owner = require_token(token)?;
        let mut state = lock_unpoisoned(&self.state);
        Self::owned_mut(&mut state, owner, id).map(|stored| stored.record.clone())
    }

    async fn update(
        &self,
        token: Option<&str>,
        id: i64,
        update: &ConversationUpdate,
    ) -> Result<ConversationRecord, ApiError> {
        let owner = require_token(token)?;
        let mut state = lock_unpoisoned(&self.state);
        state.updates.push((id, update.clone()));
        if state.fail_updates {
            return Err(server_error());
        }

        let mut appended = Vec::with_capacity(update.messages.len());
        for message in &update.messages {
            appended.push(StoredMessage {
                id: state.next_message_id(),
                role: message.role.clone(),
                content: message.content.clone(),
                timestamp: MOCK_TIMESTAMP.to_owned(),
            });
        }

        let stored = Self::owned_mut(&mut state, owner, id)?;
        let record = &mut stored.record;
        if let Some(briefing) = &update.briefing {
            record.briefing = Some(briefing.clone());
        }
        if let Some(seconds) = update.total_time_seconds {
            record.total_time_seconds = Some(seconds);
        }
        if let Some(model) = &update.model_used {
            record.model_used = Some(model.clone());
        }
        record.messages.extend(appended);
        record.updated_at = MOCK_TIMESTAMP.to_owned();
        Ok(record.clone())
    }

    async fn delete(&self, token: Option<&str>, id: i64) -> Result<(), ApiError> {
        let owner = require_token(token)?;
        let mut state = lock_unpoisoned(&self.state);
        Self::owned_mut(&mut state, owner, id)?;
        state.conversations.remove(&id);
        Ok(())
    }

    async fn list(
        &self,
        token: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ConversationSummary>, ApiError> {
        let owner = require_token(token)?;
        let state = lock_unpoisoned(&self.state);
        Ok(state
            .conversations
            .values()
            .rev()
            .filter(|stored| stored.owner == owner)
            .skip(offset as usize)
            .take(limit as usize)
            .map(|stored| ConversationSummary {
                id: stored.record.id,
                topic: stored.record.topic.clone(),
                depth: stored.record.depth.clone(),
                created_at: stored.record.created_at.clone(),
                message_count: stored.record.messages.len() as u32,
            })
            .collect())
    }
}

fn require_token(token: Option<&str>) -> Result<&str, ApiError> {
    token
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::MissingAccessToken)
}

fn server_error() -> ApiError {
    ApiError::from_status(
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"detail":"Internal server error"}"#,
    )
}
