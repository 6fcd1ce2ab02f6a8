use std::sync::Arc;

use futures_util::{FutureExt, Stream, StreamExt};
use research_api::{
    await_or_cancel, decode_stream, is_cancelled, ApiError, CancellationSignal, ChunkStream,
    ConversationRecord, ConversationSummary, ConversationUpdate, ResearchDepth, WireEvent,
};
use research_provider::{SharedStore, SharedTokens, SharedTransport};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

use crate::app::{EventOutcome, Session, Submission, SubmissionOutcome};

/// Receives the session after every visible change.
pub trait SessionObserver {
    fn on_session_changed(&mut self, session: &Session);
}

impl<F> SessionObserver for F
where
    F: FnMut(&Session),
{
    fn on_session_changed(&mut self, session: &Session) {
        self(session)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a research submission is in progress")]
    Busy,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Busy => {
                "Research is in progress. Wait for it to finish or cancel it first.".to_owned()
            }
            Self::Api(error) => error.user_message(),
        }
    }
}

type CreateHandle = JoinHandle<Option<i64>>;

/// A conversation create that outlived its stream.
struct PendingCreate {
    handle: CreateHandle,
    /// Cleared once the session moves on, so a late id is never linked.
    linkable: bool,
}

enum StreamInput {
    Created(Result<Option<i64>, JoinError>),
    Event(Option<Result<WireEvent, ApiError>>),
}

/// Async driver for one [`Session`].
///
/// Owns the session exclusively; callers observe it through
/// [`SessionObserver`] or [`SessionController::session`]. Conversation
/// create/update calls run as spawned tasks and never block or fail the
/// stream. A create that finishes after its stream is linked on the next
/// controller call, or by [`SessionController::flush_persistence`], which
/// also waits for every outstanding task before shutdown.
pub struct SessionController {
    session: Session,
    transport: SharedTransport,
    store: SharedStore,
    tokens: SharedTokens,
    pending_creates: Vec<PendingCreate>,
    persistence: Vec<JoinHandle<()>>,
}

impl SessionController {
    pub fn new(transport: SharedTransport, store: SharedStore, tokens: SharedTokens) -> Self {
        Self {
            session: Session::new(),
            transport,
            store,
            tokens,
            pending_creates: Vec::new(),
            persistence: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access for host-side messages such as command feedback.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Runs one research submission to completion.
    ///
    /// Returns [`SubmissionOutcome::Ignored`] when a submission is already
    /// active. Setting `cancel` stops request setup or the read loop, and the
    /// session still returns to idle.
    pub async fn submit(
        &mut self,
        topic: &str,
        depth: ResearchDepth,
        include_academic: bool,
        cancel: &CancellationSignal,
        observer: &mut dyn SessionObserver,
    ) -> SubmissionOutcome {
        self.poll_persistence();
        let Some(submission) = self.session.begin_submission(topic, depth, include_academic)
        else {
            return SubmissionOutcome::Ignored;
        };
        self.forget_pending_links();
        observer.on_session_changed(&self.session);
        tracing::info!(
            topic = %submission.topic,
            depth = submission.depth.as_str(),
            include_academic,
            "research submitted"
        );

        let token = self.tokens.bearer_token().await;
        let mut create = Some(self.spawn_create(&submission, token.clone()));
        let mut deferred_update = None;

        let opened = self
            .transport
            .open_stream(&submission.request(), token.as_deref(), Some(cancel))
            .await;
        match opened {
            Ok(chunks) => {
                self.session.on_stream_opened();
                self.read_stream(
                    chunks,
                    &mut create,
                    &mut deferred_update,
                    token.as_deref(),
                    cancel,
                    observer,
                )
                .await;
            }
            Err(ApiError::Cancelled) => self.session.on_cancelled(),
            Err(error) => {
                tracing::warn!(%error, "research request failed before streaming");
                self.session.fail_before_stream(&error);
            }
        }

        let outcome = self.session.finish_stream();
        observer.on_session_changed(&self.session);
        tracing::info!(?outcome, "research finished");

        if let Some(handle) = create.take() {
            let linkable = !is_cancelled(Some(cancel));
            self.defer_create(handle, deferred_update, token, linkable);
        }

        outcome
    }

    async fn read_stream(
        &mut self,
        chunks: ChunkStream,
        create: &mut Option<CreateHandle>,
        deferred_update: &mut Option<ConversationUpdate>,
        token: Option<&str>,
        cancel: &CancellationSignal,
        observer: &mut dyn SessionObserver,
    ) {
        let mut events = Box::pin(decode_stream(chunks));

        loop {
            let input =
                match await_or_cancel(next_input(&mut events, create.as_mut()), Some(cancel)).await
                {
                    Ok(input) => input,
                    Err(_) => {
                        tracing::info!("research stream cancelled");
                        self.session.on_cancelled();
                        observer.on_session_changed(&self.session);
                        return;
                    }
                };

            match input {
                StreamInput::Created(joined) => {
                    *create = None;
                    if let Some(id) = created_id(joined) {
                        self.session.link_conversation(id);
                        if let Some(update) = deferred_update.take() {
                            self.spawn_update(id, update, token.map(str::to_owned));
                        }
                    }
                }
                StreamInput::Event(Some(Ok(event))) => match self.session.apply_event(event) {
                    EventOutcome::Applied | EventOutcome::Failed => {
                        observer.on_session_changed(&self.session);
                    }
                    EventOutcome::Completed(update) => {
                        observer.on_session_changed(&self.session);
                        match self.session.linked_conversation_id() {
                            Some(id) => self.spawn_update(id, update, token.map(str::to_owned)),
                            None if create.is_some() => *deferred_update = Some(update),
                            None => {
                                tracing::debug!("no linked conversation; result not persisted")
                            }
                        }
                    }
                    EventOutcome::Ignored => {}
                    EventOutcome::Done => return,
                },
                StreamInput::Event(Some(Err(error))) => {
                    tracing::warn!(%error, "research stream failed");
                    self.session.on_transport_error(&error);
                    observer.on_session_changed(&self.session);
                    return;
                }
                StreamInput::Event(None) => return,
            }
        }
    }

    /// Hands a create that outlived the stream to a tracked task, which also
    /// sends the update deferred behind it.
    ///
    /// A cancelled submission is never linked to the created conversation.
    fn defer_create(
        &mut self,
        create: CreateHandle,
        deferred_update: Option<ConversationUpdate>,
        token: Option<String>,
        linkable: bool,
    ) {
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(async move {
            let id = created_id(create.await)?;
            if let Some(update) = deferred_update {
                update_conversation(&store, id, &update, token.as_deref()).await;
            }
            Some(id)
        });
        self.pending_creates.push(PendingCreate { handle, linkable });
    }

    /// Links creates that finished since the last call without waiting for
    /// the rest.
    pub fn poll_persistence(&mut self) {
        for mut pending in std::mem::take(&mut self.pending_creates) {
            if !pending.handle.is_finished() {
                self.pending_creates.push(pending);
                continue;
            }
            match (&mut pending.handle).now_or_never() {
                Some(joined) => self.link_created(joined, pending.linkable),
                None => self.pending_creates.push(pending),
            }
        }
    }

    fn forget_pending_links(&mut self) {
        for pending in &mut self.pending_creates {
            pending.linkable = false;
        }
    }

    fn link_created(&mut self, joined: Result<Option<i64>, JoinError>, linkable: bool) {
        let Some(id) = created_id(joined) else {
            return;
        };
        if linkable {
            self.session.link_conversation(id);
        } else {
            tracing::debug!(id, "conversation created for a superseded session");
        }
    }

    fn spawn_create(&self, submission: &Submission, token: Option<String>) -> CreateHandle {
        let store = Arc::clone(&self.store);
        let payload = submission.conversation_create();
        tokio::spawn(async move {
            match store.create(token.as_deref(), &payload).await {
                Ok(record) => {
                    tracing::debug!(id = record.id, "conversation created");
                    Some(record.id)
                }
                Err(error) => {
                    log_persistence_failure("create", &error);
                    None
                }
            }
        })
    }

    fn spawn_update(&mut self, id: i64, update: ConversationUpdate, token: Option<String>) {
        self.persistence.retain(|handle| !handle.is_finished());

        let store = Arc::clone(&self.store);
        self.persistence.push(tokio::spawn(async move {
            update_conversation(&store, id, &update, token.as_deref()).await;
        }));
    }

    /// Waits for every outstanding persistence task, linking late creates.
    pub async fn flush_persistence(&mut self) {
        for pending in std::mem::take(&mut self.pending_creates) {
            let joined = pending.handle.await;
            self.link_created(joined, pending.linkable);
        }
        for handle in self.persistence.drain(..) {
            if let Err(error) = handle.await {
                tracing::warn!(%error, "persistence task aborted");
            }
        }
    }

    /// Starts a fresh, unlinked conversation.
    pub fn new_conversation(&mut self) -> Result<(), SessionError> {
        if self.session.reset() {
            self.forget_pending_links();
            Ok(())
        } else {
            Err(SessionError::Busy)
        }
    }

    /// Fetches conversation `id` and replaces the session with it.
    pub async fn load_conversation(&mut self, id: i64) -> Result<(), SessionError> {
        if self.session.is_loading() {
            return Err(SessionError::Busy);
        }

        let token = self.tokens.bearer_token().await;
        let record = self
            .store
            .get(token.as_deref(), id)
            .await
            .inspect_err(|error| tracing::warn!(id, %error, "failed to load conversation"))?;
        self.apply_loaded(&record)
    }

    /// Replaces the session with an already fetched record.
    pub fn apply_loaded(&mut self, record: &ConversationRecord) -> Result<(), SessionError> {
        if self.session.load_conversation(record) {
            self.forget_pending_links();
            tracing::info!(id = record.id, messages = record.messages.len(), "conversation loaded");
            Ok(())
        } else {
            Err(SessionError::Busy)
        }
    }

    /// Deletes conversation `id`; the session is reset when it was showing it.
    pub async fn delete_conversation(&mut self, id: i64) -> Result<(), SessionError> {
        self.poll_persistence();
        let token = self.tokens.bearer_token().await;
        self.store
            .delete(token.as_deref(), id)
            .await
            .inspect_err(|error| tracing::warn!(id, %error, "failed to delete conversation"))?;

        if self.session.linked_conversation_id() == Some(id) && self.session.reset() {
            self.forget_pending_links();
        }
        Ok(())
    }

    pub async fn list_conversations(
        &mut self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ConversationSummary>, SessionError> {
        self.poll_persistence();
        let token = self.tokens.bearer_token().await;
        Ok(self.store.list(token.as_deref(), limit, offset).await?)
    }
}

async fn next_input<S>(events: &mut S, create: Option<&mut CreateHandle>) -> StreamInput
where
    S: Stream<Item = Result<WireEvent, ApiError>> + Unpin,
{
    match create {
        Some(handle) => tokio::select! {
            biased;
            joined = handle => StreamInput::Created(joined),
            event = events.next() => StreamInput::Event(event),
        },
        None => StreamInput::Event(events.next().await),
    }
}

fn created_id(joined: Result<Option<i64>, JoinError>) -> Option<i64> {
    match joined {
        Ok(id) => id,
        Err(error) => {
            tracing::warn!(%error, "conversation create task aborted");
            None
        }
    }
}

async fn update_conversation(
    store: &SharedStore,
    id: i64,
    update: &ConversationUpdate,
    token: Option<&str>,
) {
    match store.update(token, id, update).await {
        Ok(_) => tracing::debug!(id, "conversation updated"),
        Err(error) => log_persistence_failure("update", &error),
    }
}

fn log_persistence_failure(operation: &'static str, error: &ApiError) {
    if matches!(error, ApiError::MissingAccessToken) {
        tracing::debug!(operation, "skipping conversation persistence while signed out");
    } else {
        tracing::warn!(operation, %error, "conversation persistence failed");
    }
}
