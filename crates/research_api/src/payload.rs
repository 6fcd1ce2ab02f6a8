use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const TOPIC_MIN_CHARS: usize = 3;
pub const TOPIC_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchDepth {
    Quick,
    #[default]
    Standard,
    Deep,
}

impl ResearchDepth {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value.trim().to_ascii_lowercase().as_str() {
            "quick" => Self::Quick,
            "standard" => Self::Standard,
            "deep" => Self::Deep,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Deep => "deep",
        }
    }
}

/// Body of `POST /research`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    pub depth: ResearchDepth,
    pub include_academic: bool,
}

impl ResearchRequest {
    pub fn new(topic: impl Into<String>, depth: ResearchDepth, include_academic: bool) -> Self {
        Self {
            topic: topic.into(),
            depth,
            include_academic,
        }
    }

    /// Rejects topics the server would refuse with a validation error.
    pub fn validate(&self) -> Result<(), ApiError> {
        let chars = self.topic.trim().chars().count();
        if chars < TOPIC_MIN_CHARS {
            return Err(ApiError::InvalidRequest(format!(
                "topic must be at least {TOPIC_MIN_CHARS} characters"
            )));
        }
        if chars > TOPIC_MAX_CHARS {
            return Err(ApiError::InvalidRequest(format!(
                "topic must be at most {TOPIC_MAX_CHARS} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCreate {
    pub role: String,
    pub content: String,
}

impl MessageCreate {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_owned(),
            content: content.into(),
        }
    }
}

/// Body of `POST /conversations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationCreate {
    pub topic: String,
    pub depth: ResearchDepth,
    #[serde(default)]
    pub messages: Vec<MessageCreate>,
}

impl ConversationCreate {
    pub fn new(topic: impl Into<String>, depth: ResearchDepth) -> Self {
        Self {
            topic: topic.into(),
            depth,
            messages: Vec::new(),
        }
    }
}

/// Body of `PUT /conversations/{id}`. Absent fields are left unchanged server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub briefing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(default)]
    pub messages: Vec<MessageCreate>,
}
