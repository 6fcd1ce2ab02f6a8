//! Client-side research session state machine.
//!
//! [`Session`] is synchronous and owns the transcript. The async driver in
//! [`crate::runtime`] feeds it transport outcomes in wire order and carries
//! out the persistence side effects it asks for.

use research_api::{
    ApiError, ConversationCreate, ConversationUpdate, MessageCreate, ResearchDepth,
    ResearchProgress, ResearchRequest, ResearchResult, WireEvent,
};

use crate::transcript::{ChatMessage, MessageId, MessageMetadata, Role};

pub const ACADEMIC_MARKER: &str = "[academic sources]";
pub const CANCELLED_MESSAGE: &str = "Research cancelled.";
pub const AUTH_REQUIRED_MESSAGE: &str =
    "Authentication required. Please sign in to run research.";
pub const RATE_LIMITED_MESSAGE: &str =
    "Rate limit exceeded. Please wait a moment before starting another research request.";
pub const CONNECTION_FAILED_MESSAGE: &str =
    "Could not reach the research service. Check your connection and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    /// Request dispatched, no stream opened yet.
    Submitting,
    Streaming,
    /// A result finalized the placeholder; waiting for the stream to end.
    Completed,
    /// An error finalized the placeholder; waiting for the stream to end.
    Failed,
}

/// How a submission ended, reported once the session is back to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The session was busy; nothing happened.
    Ignored,
    Completed,
    Failed,
    Cancelled,
    /// The stream ended without a result or an error.
    Incomplete,
}

/// The in-flight submission, as accepted by [`Session::begin_submission`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub topic: String,
    pub depth: ResearchDepth,
    pub include_academic: bool,
    pub placeholder_id: MessageId,
}

impl Submission {
    pub fn request(&self) -> ResearchRequest {
        ResearchRequest::new(self.topic.clone(), self.depth, self.include_academic)
    }

    pub fn conversation_create(&self) -> ConversationCreate {
        ConversationCreate::new(self.topic.clone(), self.depth)
    }

    fn conversation_update(&self, result: &ResearchResult) -> ConversationUpdate {
        let sources_json = match serde_json::to_string(&result.sources) {
            Ok(json) => Some(json),
            Err(error) => {
                tracing::warn!(%error, "failed to serialize sources for persistence");
                None
            }
        };

        ConversationUpdate {
            briefing: Some(result.briefing.clone()),
            sources_json,
            total_time_seconds: Some(result.total_time_seconds),
            model_used: Some(result.model_used.clone()),
            messages: vec![
                MessageCreate::user(self.topic.clone()),
                MessageCreate::assistant(result.briefing.clone()),
            ],
        }
    }
}

/// Effect of applying one decoded event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Applied,
    /// The event arrived after the placeholder was finalized, or with no
    /// submission active, and changed nothing.
    Ignored,
    /// A result finalized the placeholder; the update belongs to the linked
    /// conversation.
    Completed(ConversationUpdate),
    /// A producer error finalized the placeholder.
    Failed,
    /// The sentinel was seen; no more events follow.
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    messages: Vec<ChatMessage>,
    phase: SessionPhase,
    current_progress: Option<ResearchProgress>,
    last_result: Option<ResearchResult>,
    active_placeholder_id: Option<MessageId>,
    linked_conversation_id: Option<i64>,
    submission: Option<Submission>,
    outcome: Option<SubmissionOutcome>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            phase: SessionPhase::Idle,
            current_progress: None,
            last_result: None,
            active_placeholder_id: None,
            linked_conversation_id: None,
            submission: None,
            outcome: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase != SessionPhase::Idle
    }

    pub fn current_progress(&self) -> Option<&ResearchProgress> {
        self.current_progress.as_ref()
    }

    pub fn last_result(&self) -> Option<&ResearchResult> {
        self.last_result.as_ref()
    }

    pub fn active_placeholder_id(&self) -> Option<&str> {
        self.active_placeholder_id.as_deref()
    }

    pub fn linked_conversation_id(&self) -> Option<i64> {
        self.linked_conversation_id
    }

    pub fn active_submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    /// The streaming placeholder, while a submission is active.
    pub fn placeholder(&self) -> Option<&ChatMessage> {
        let id = self.active_placeholder_id.as_deref()?;
        self.messages.iter().find(|message| message.id == id)
    }

    /// Clears everything for a fresh conversation. Refused while loading.
    pub fn reset(&mut self) -> bool {
        if self.is_loading() {
            return false;
        }
        *self = Self::new();
        true
    }

    /// Appends a system line without touching submission state.
    pub fn push_system_message(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(Role::System, content));
    }

    /// Starts a submission from `Idle`; returns `None` (and changes nothing)
    /// in any other phase.
    pub fn begin_submission(
        &mut self,
        topic: &str,
        depth: ResearchDepth,
        include_academic: bool,
    ) -> Option<Submission> {
        if self.is_loading() {
            tracing::debug!(phase = ?self.phase, "submission ignored while busy");
            return None;
        }

        let topic = topic.trim().to_owned();
        let content = if include_academic {
            format!("{topic} {ACADEMIC_MARKER}")
        } else {
            topic.clone()
        };
        self.messages.push(ChatMessage::new(Role::User, content));
        self.linked_conversation_id = None;

        let placeholder = ChatMessage::new(Role::Assistant, "")
            .with_metadata(MessageMetadata::streaming());
        let placeholder_id = placeholder.id.clone();
        self.messages.push(placeholder);

        let submission = Submission {
            topic,
            depth,
            include_academic,
            placeholder_id: placeholder_id.clone(),
        };
        self.active_placeholder_id = Some(placeholder_id);
        self.current_progress = None;
        self.submission = Some(submission.clone());
        self.outcome = None;
        self.phase = SessionPhase::Submitting;
        Some(submission)
    }

    pub fn link_conversation(&mut self, id: i64) {
        self.linked_conversation_id = Some(id);
    }

    pub fn on_stream_opened(&mut self) {
        if self.phase == SessionPhase::Submitting {
            self.phase = SessionPhase::Streaming;
        }
    }

    /// Applies one decoded event to the active placeholder.
    pub fn apply_event(&mut self, event: WireEvent) -> EventOutcome {
        let finalized = self.active_placeholder_id.is_none() || self.outcome.is_some();

        match event {
            WireEvent::Done => EventOutcome::Done,
            event if finalized => {
                tracing::debug!(?event, "ignoring event after finalization");
                EventOutcome::Ignored
            }
            WireEvent::Progress(progress) => {
                let content = format!("{} ({}%)", progress.message, progress.percent());
                self.current_progress = Some(progress.clone());
                self.update_placeholder(content, MessageMetadata::progress(progress));
                self.phase = SessionPhase::Streaming;
                EventOutcome::Applied
            }
            WireEvent::Result(result) => {
                let update = self
                    .submission
                    .as_ref()
                    .map(|submission| submission.conversation_update(&result))
                    .unwrap_or_default();
                self.update_placeholder(
                    result.briefing.clone(),
                    MessageMetadata::result(result.clone()),
                );
                self.last_result = Some(result);
                self.finalize(SessionPhase::Completed, SubmissionOutcome::Completed);
                EventOutcome::Completed(update)
            }
            WireEvent::Error(error) => {
                self.update_placeholder(
                    format!("Error: {}", error.message),
                    MessageMetadata::default(),
                );
                self.finalize(SessionPhase::Failed, SubmissionOutcome::Failed);
                EventOutcome::Failed
            }
        }
    }

    /// The request failed before any frame was read.
    pub fn fail_before_stream(&mut self, error: &ApiError) {
        if self.outcome.is_some() {
            return;
        }
        self.update_placeholder(request_failure_message(error), MessageMetadata::default());
        self.finalize(SessionPhase::Failed, SubmissionOutcome::Failed);
    }

    /// The transport failed after the stream opened.
    pub fn on_transport_error(&mut self, error: &ApiError) {
        if self.outcome.is_some() {
            return;
        }
        self.update_placeholder(format!("Error: {error}"), MessageMetadata::default());
        self.finalize(SessionPhase::Failed, SubmissionOutcome::Failed);
    }

    pub fn on_cancelled(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        self.update_placeholder(CANCELLED_MESSAGE.to_owned(), MessageMetadata::default());
        self.finalize(SessionPhase::Failed, SubmissionOutcome::Cancelled);
    }

    /// Ends the active submission and returns to `Idle`.
    ///
    /// This is the only transition back to `Idle`. A placeholder that was
    /// never finalized keeps its last content and stops streaming.
    pub fn finish_stream(&mut self) -> SubmissionOutcome {
        if self.submission.is_none() && self.phase == SessionPhase::Idle {
            return SubmissionOutcome::Ignored;
        }

        if self.outcome.is_none() {
            if let Some(message) = self.placeholder_mut() {
                if let Some(metadata) = message.metadata.as_mut() {
                    metadata.is_streaming = false;
                }
            }
        }

        let outcome = self.outcome.take().unwrap_or(SubmissionOutcome::Incomplete);
        self.current_progress = None;
        self.active_placeholder_id = None;
        self.submission = None;
        self.phase = SessionPhase::Idle;
        outcome
    }

    pub(crate) fn replace_with_loaded(
        &mut self,
        messages: Vec<ChatMessage>,
        last_result: Option<ResearchResult>,
        conversation_id: i64,
    ) {
        *self = Self {
            messages,
            last_result,
            linked_conversation_id: Some(conversation_id),
            ..Self::new()
        };
    }

    fn finalize(&mut self, phase: SessionPhase, outcome: SubmissionOutcome) {
        self.phase = phase;
        self.outcome = Some(outcome);
    }

    fn placeholder_mut(&mut self) -> Option<&mut ChatMessage> {
        let id = self.active_placeholder_id.as_deref()?;
        self.messages.iter_mut().find(|message| message.id == id)
    }

    fn update_placeholder(&mut self, content: String, metadata: MessageMetadata) {
        if let Some(message) = self.placeholder_mut() {
            message.content = content;
            message.metadata = Some(metadata);
        }
    }
}

/// Text shown in the placeholder when the research request is rejected
/// before streaming starts.
pub fn request_failure_message(error: &ApiError) -> String {
    match error {
        ApiError::MissingAccessToken | ApiError::Unauthorized(_) => {
            AUTH_REQUIRED_MESSAGE.to_owned()
        }
        ApiError::RateLimited(_) => RATE_LIMITED_MESSAGE.to_owned(),
        ApiError::Cancelled => CANCELLED_MESSAGE.to_owned(),
        ApiError::InvalidRequest(reason) => format!("Research request rejected: {reason}"),
        other => match other.status() {
            Some(status) => format!(
                "Research request failed (HTTP {}). Please try again.",
                status.as_u16()
            ),
            None => CONNECTION_FAILED_MESSAGE.to_owned(),
        },
    }
}
