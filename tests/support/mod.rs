#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use research_api::{CancellationSignal, ConversationRecord, ResearchDepth, StoredMessage};
use research_chat::{ChatMessage, Session, SessionController, SessionObserver, SubmissionOutcome};
use research_provider::StaticTokenProvider;
use research_provider_mock::{MemoryConversationStore, ScriptedStream, ScriptedTransport};
use serde_json::json;

pub const TOKEN: &str = "test-token";

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<MemoryConversationStore>,
    pub controller: SessionController,
}

impl Harness {
    pub fn new(scripts: Vec<ScriptedStream>) -> Self {
        Self::with_token(scripts, Some(TOKEN))
    }

    pub fn signed_out(scripts: Vec<ScriptedStream>) -> Self {
        Self::with_token(scripts, None)
    }

    fn with_token(scripts: Vec<ScriptedStream>, token: Option<&str>) -> Self {
        let transport = Arc::new(ScriptedTransport::new(scripts));
        let store = Arc::new(MemoryConversationStore::new());
        let controller = SessionController::new(
            Arc::clone(&transport) as _,
            Arc::clone(&store) as _,
            Arc::new(StaticTokenProvider::new(token.map(str::to_owned))),
        );
        Self {
            transport,
            store,
            controller,
        }
    }

    pub fn session(&self) -> &Session {
        self.controller.session()
    }

    pub async fn submit(&mut self, topic: &str) -> (SubmissionOutcome, SnapshotRecorder) {
        self.submit_with(topic, &new_cancel()).await
    }

    pub async fn submit_with(
        &mut self,
        topic: &str,
        cancel: &CancellationSignal,
    ) -> (SubmissionOutcome, SnapshotRecorder) {
        let mut recorder = SnapshotRecorder::default();
        let outcome = self
            .controller
            .submit(topic, ResearchDepth::Standard, false, cancel, &mut recorder)
            .await;
        (outcome, recorder)
    }

    /// The assistant message the last submission streamed into.
    pub fn last_assistant(&self) -> &ChatMessage {
        self.session()
            .messages()
            .iter()
            .rev()
            .find(|message| message.role == research_chat::Role::Assistant)
            .expect("assistant placeholder in transcript")
    }
}

/// Placeholder text captured on every observer notification.
#[derive(Debug, Default)]
pub struct SnapshotRecorder {
    pub placeholder_texts: Vec<String>,
    pub loading: Vec<bool>,
}

impl SessionObserver for SnapshotRecorder {
    fn on_session_changed(&mut self, session: &Session) {
        self.loading.push(session.is_loading());
        if let Some(placeholder) = session.placeholder() {
            self.placeholder_texts.push(placeholder.content.clone());
        }
    }
}

pub fn new_cancel() -> CancellationSignal {
    Arc::new(AtomicBool::new(false))
}

pub fn cancel_after(cancel: &CancellationSignal, delay: Duration) {
    let cancel = Arc::clone(cancel);
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        cancel.store(true, Ordering::Release);
    });
}

pub fn progress_frame(message: &str, progress: f64) -> String {
    json!({
        "status": "searching",
        "message": message,
        "progress": progress,
        "sources_found": 2,
        "sources_processed": 1,
    })
    .to_string()
}

pub fn result_frame(topic: &str, briefing: &str) -> String {
    json!({
        "topic": topic,
        "briefing": briefing,
        "sources": [{
            "url": "https://example.org/paper",
            "title": "A paper",
            "snippet": "Findings.",
            "credibility_score": 0.9,
        }],
        "total_time_seconds": 12.5,
        "model_used": "test-model",
    })
    .to_string()
}

pub fn error_frame(message: &str) -> String {
    json!({ "message": message }).to_string()
}

pub fn sse(frames: &[String]) -> ScriptedStream {
    let frames: Vec<&str> = frames.iter().map(String::as_str).collect();
    ScriptedStream::sse(&frames)
}

pub fn stored_record(id: i64) -> ConversationRecord {
    ConversationRecord {
        id,
        topic: "ocean acidification".to_string(),
        depth: "deep".to_string(),
        briefing: Some("## Ocean acidification\n\npH is falling.".to_string()),
        total_time_seconds: Some(42.0),
        model_used: Some("stored-model".to_string()),
        created_at: "2025-02-01T10:00:00".to_string(),
        updated_at: "2025-02-01T10:05:00".to_string(),
        messages: vec![
            StoredMessage {
                id: 100,
                role: "user".to_string(),
                content: "ocean acidification".to_string(),
                timestamp: "2025-02-01T10:00:00".to_string(),
            },
            StoredMessage {
                id: 101,
                role: "assistant".to_string(),
                content: "## Ocean acidification\n\npH is falling.".to_string(),
                timestamp: "2025-02-01T10:05:00Z".to_string(),
            },
        ],
    }
}
