//! Maps persisted conversations onto the session transcript.

use research_api::{ConversationRecord, ResearchResult, StoredMessage};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::app::Session;
use crate::transcript::{ChatMessage, MessageMetadata, Role};

impl Session {
    /// Replaces the whole session with `record`.
    ///
    /// Returns `false` without changing anything while a submission is
    /// active. The reconstructed result never carries sources: the read
    /// endpoint does not return them.
    pub fn load_conversation(&mut self, record: &ConversationRecord) -> bool {
        if self.is_loading() {
            tracing::debug!(id = record.id, "refusing to load conversation while busy");
            return false;
        }

        let reconstructed = reconstructed_result(record);
        let messages = record
            .messages
            .iter()
            .map(|stored| stored_to_chat(stored, reconstructed.as_ref()))
            .collect();

        self.replace_with_loaded(messages, reconstructed, record.id);
        true
    }
}

fn reconstructed_result(record: &ConversationRecord) -> Option<ResearchResult> {
    let briefing = record.briefing.as_ref()?;
    Some(ResearchResult {
        topic: record.topic.clone(),
        briefing: briefing.clone(),
        sources: Vec::new(),
        total_time_seconds: record.total_time_seconds.unwrap_or_default(),
        model_used: record.model_used.clone().unwrap_or_default(),
    })
}

fn stored_to_chat(stored: &StoredMessage, result: Option<&ResearchResult>) -> ChatMessage {
    let role = Role::parse(&stored.role);
    let metadata = match (role, result) {
        (Role::Assistant, Some(result)) => Some(MessageMetadata::result(result.clone())),
        _ => None,
    };

    ChatMessage {
        id: stored.id.to_string(),
        role,
        content: stored.content.clone(),
        timestamp: parse_timestamp(&stored.timestamp),
        metadata,
    }
}

/// Parses a stored timestamp; values without an offset are UTC.
pub fn parse_timestamp(value: &str) -> OffsetDateTime {
    let value = value.trim();
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return parsed;
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(value, &Iso8601::DEFAULT) {
        return parsed.assume_utc();
    }

    tracing::debug!(value, "unparseable message timestamp; using current time");
    OffsetDateTime::now_utc()
}
