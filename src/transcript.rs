//! Transcript model shown to the user.

use research_api::{ResearchProgress, ResearchResult};
use time::OffsetDateTime;
use uuid::Uuid;

/// Opaque, unique message identifier.
pub type MessageId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Maps a stored role name; anything unrecognized is shown as a system line.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            _ => Self::System,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageMetadata {
    pub is_progress: bool,
    pub progress: Option<ResearchProgress>,
    pub result: Option<ResearchResult>,
    pub is_streaming: bool,
}

impl MessageMetadata {
    pub fn streaming() -> Self {
        Self {
            is_streaming: true,
            ..Self::default()
        }
    }

    pub fn progress(progress: ResearchProgress) -> Self {
        Self {
            is_progress: true,
            progress: Some(progress),
            result: None,
            is_streaming: true,
        }
    }

    pub fn result(result: ResearchResult) -> Self {
        Self {
            result: Some(result),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: OffsetDateTime,
    pub metadata: Option<MessageMetadata>,
}

impl ChatMessage {
    /// Creates a live message with a fresh id, stamped now.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|metadata| metadata.is_streaming)
    }

    pub fn result(&self) -> Option<&ResearchResult> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.result.as_ref())
    }
}

pub fn new_message_id() -> MessageId {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_map_to_system() {
        assert_eq!(Role::parse("Assistant"), Role::Assistant);
        assert_eq!(Role::parse("tool"), Role::System);
        assert_eq!(Role::parse(""), Role::System);
    }

    #[test]
    fn live_messages_get_unique_ids() {
        let first = ChatMessage::new(Role::User, "a");
        let second = ChatMessage::new(Role::User, "a");
        assert_ne!(first.id, second.id);
        assert!(!first.is_streaming());
    }
}
