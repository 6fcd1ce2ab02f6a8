//! Streaming client for a remote research agent.
//!
//! - [`app::Session`] is the synchronous state machine that owns the
//!   transcript and turns decoded events into placeholder updates.
//! - [`runtime::SessionController`] drives one session: it opens the event
//!   stream, applies events in wire order, honours cancellation, and runs
//!   best-effort conversation persistence on the side.
//! - [`loader`] replaces the session with a persisted conversation.
//!
//! Wire types and the frame decoder live in `research_api`; the transport
//! and persistence contracts live in `research_provider`.

pub mod app;
pub mod commands;
pub mod config;
pub mod loader;
pub mod logging;
pub mod providers;
pub mod runtime;
pub mod transcript;

pub use app::{EventOutcome, Session, SessionPhase, Submission, SubmissionOutcome};
pub use runtime::{SessionController, SessionError, SessionObserver};
pub use transcript::{ChatMessage, MessageId, MessageMetadata, Role};
