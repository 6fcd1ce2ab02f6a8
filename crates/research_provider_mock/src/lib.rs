//! Deterministic doubles for the `research_provider` contract.
//!
//! This crate contains no network logic and is intended for offline runs and
//! contract-level integration testing of the session driver.

mod store;
mod transport;

use std::sync::{Mutex, MutexGuard};

pub use store::{MemoryConversationStore, MOCK_TIMESTAMP};
pub use transport::{
    sse_frame, RecordedRequest, ScriptedChunk, ScriptedStream, ScriptedTransport, StreamEnding,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
