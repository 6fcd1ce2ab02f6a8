use serde::{Deserialize, Serialize};

/// One message of a persisted conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

/// Full conversation as returned by create/get/update.
///
/// Sources are stored server-side but never returned by these endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: i64,
    pub topic: String,
    pub depth: String,
    #[serde(default)]
    pub briefing: Option<String>,
    #[serde(default)]
    pub total_time_seconds: Option<f64>,
    #[serde(default)]
    pub model_used: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// List entry without message bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub topic: String,
    pub depth: String,
    pub created_at: String,
    #[serde(default)]
    pub message_count: u32,
}
