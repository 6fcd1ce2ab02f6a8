use serde::{Deserialize, Serialize};

/// Research pipeline stage reported by progress frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    Pending,
    Searching,
    Extracting,
    Summarizing,
    Synthesizing,
    Completed,
    Error,
}

impl ResearchStatus {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "pending" => Self::Pending,
            "searching" => Self::Searching,
            "extracting" => Self::Extracting,
            "summarizing" => Self::Summarizing,
            "synthesizing" => Self::Synthesizing,
            "completed" => Self::Completed,
            "error" => Self::Error,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Searching => "searching",
            Self::Extracting => "extracting",
            Self::Summarizing => "summarizing",
            Self::Synthesizing => "synthesizing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// Progress update emitted while the remote agent works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchProgress {
    pub status: ResearchStatus,
    pub message: String,
    pub progress: f64,
    #[serde(default)]
    pub sources_found: u32,
    #[serde(default)]
    pub sources_processed: u32,
}

impl ResearchProgress {
    /// Completion as a whole percentage, clamped to `0..=100`.
    pub fn percent(&self) -> u32 {
        (self.progress.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}

fn default_credibility() -> f64 {
    0.5
}

/// A research source with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default = "default_credibility")]
    pub credibility_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Final research briefing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    #[serde(default)]
    pub topic: String,
    pub briefing: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub total_time_seconds: f64,
    #[serde(default)]
    pub model_used: String,
}

/// Producer-reported failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
}

/// Typed event decoded from one stream frame.
///
/// The wire carries no reliable discriminant; see
/// [`crate::sse::classify_payload`] for how payloads map onto variants.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    Progress(ResearchProgress),
    Result(ResearchResult),
    Error(ErrorEvent),
    /// `[DONE]` sentinel, or logical end of a stream that never sent one.
    Done,
}

impl WireEvent {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}
