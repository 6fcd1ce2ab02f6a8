use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use research_api::{is_cancelled, StatusCode};
use research_provider::{ApiError, CancellationSignal, ChunkStream, ResearchRequest, ResearchTransport};
use serde_json::json;

use crate::lock_unpoisoned;

const DEMO_CHUNK_DELAY_MS: u64 = 150;

/// One body chunk, delivered after `delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedChunk {
    pub delay_ms: u64,
    pub bytes: Vec<u8>,
}

impl ScriptedChunk {
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            delay_ms: 0,
            bytes: bytes.into(),
        }
    }
}

/// How a scripted body ends once its chunks are exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnding {
    /// Natural end of the response body.
    Close,
    /// The connection drops with a read error.
    Fail(String),
    /// The body stays open and never yields again.
    Hang,
}

/// Scripted outcome for one `open_stream` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedStream {
    Open {
        chunks: Vec<ScriptedChunk>,
        ending: StreamEnding,
    },
    /// The server answers with a non-success status.
    Reject { status: u16, body: String },
    /// The server cannot be reached.
    Unreachable(String),
}

impl ScriptedStream {
    /// One chunk per `data:` frame, then a natural end.
    #[must_use]
    pub fn sse(frames: &[&str]) -> Self {
        Self::chunks(frames.iter().map(|frame| sse_frame(frame)).collect())
    }

    #[must_use]
    pub fn chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self::Open {
            chunks: chunks.into_iter().map(ScriptedChunk::new).collect(),
            ending: StreamEnding::Close,
        }
    }

    #[must_use]
    pub fn reject(status: u16, body: impl Into<String>) -> Self {
        Self::Reject {
            status,
            body: body.into(),
        }
    }

    /// Replaces the ending of an `Open` script; other scripts are unchanged.
    #[must_use]
    pub fn ending(self, ending: StreamEnding) -> Self {
        match self {
            Self::Open { chunks, .. } => Self::Open { chunks, ending },
            other => other,
        }
    }

    /// Delays every chunk of an `Open` script by `delay_ms`.
    #[must_use]
    pub fn chunk_delay(self, delay_ms: u64) -> Self {
        match self {
            Self::Open { chunks, ending } => Self::Open {
                chunks: chunks
                    .into_iter()
                    .map(|chunk| ScriptedChunk { delay_ms, ..chunk })
                    .collect(),
                ending,
            },
            other => other,
        }
    }

    /// Plausible progress, result and sentinel frames for `request`.
    #[must_use]
    pub fn demo(request: &ResearchRequest) -> Self {
        let stages = [
            ("searching", "Searching for sources", 0.1, 0, 0),
            ("extracting", "Extracting content from 5 sources", 0.35, 5, 0),
            ("summarizing", "Summarizing sources", 0.6, 5, 3),
            ("synthesizing", "Synthesizing briefing", 0.85, 5, 5),
        ];

        let mut frames: Vec<String> = stages
            .iter()
            .map(|(status, message, progress, found, processed)| {
                json!({
                    "status": status,
                    "message": message,
                    "progress": progress,
                    "sources_found": found,
                    "sources_processed": processed,
                })
                .to_string()
            })
            .collect();

        frames.push(
            json!({
                "topic": request.topic,
                "briefing": format!(
                    "## {}\n\nThis is an offline briefing produced by the mock research provider at {} depth.",
                    request.topic.trim(),
                    request.depth.as_str(),
                ),
                "sources": [{
                    "url": "https://example.com/mock-source",
                    "title": "Mock source",
                    "snippet": "Deterministic placeholder source.",
                    "credibility_score": 0.5,
                }],
                "total_time_seconds": 0.6,
                "model_used": "mock",
            })
            .to_string(),
        );
        frames.push("[DONE]".to_string());

        let frames: Vec<&str> = frames.iter().map(String::as_str).collect();
        Self::sse(&frames).chunk_delay(DEMO_CHUNK_DELAY_MS)
    }
}

/// Encodes one payload as a `data:` frame followed by a blank line.
#[must_use]
pub fn sse_frame(payload: &str) -> Vec<u8> {
    format!("data: {payload}\n\n").into_bytes()
}

/// A research call observed by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub request: ResearchRequest,
    pub token: Option<String>,
}

/// Deterministic research transport that replays scripts in call order.
///
/// When the scripts run out, calls are rejected with a server error, or
/// answered with [`ScriptedStream::demo`] for a transport built with
/// [`ScriptedTransport::demo`].
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<ScriptedStream>>,
    requests: Mutex<Vec<RecordedRequest>>,
    demo_fallback: bool,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new(scripts: Vec<ScriptedStream>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        }
    }

    /// Transport that answers every call with a demo run.
    #[must_use]
    pub fn demo() -> Self {
        Self {
            demo_fallback: true,
            ..Self::default()
        }
    }

    pub fn push(&self, script: ScriptedStream) {
        lock_unpoisoned(&self.scripts).push_back(script);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    fn next_script(&self, request: &ResearchRequest) -> ScriptedStream {
        if let Some(script) = lock_unpoisoned(&self.scripts).pop_front() {
            return script;
        }
        if self.demo_fallback {
            ScriptedStream::demo(request)
        } else {
            ScriptedStream::reject(500, r#"{"detail":"no scripted response"}"#)
        }
    }
}

#[async_trait]
impl ResearchTransport for ScriptedTransport {
    async fn open_stream(
        &self,
        request: &ResearchRequest,
        token: Option<&str>,
        cancel: Option<&CancellationSignal>,
    ) -> Result<ChunkStream, ApiError> {
        request.validate()?;
        lock_unpoisoned(&self.requests).push(RecordedRequest {
            request: request.clone(),
            token: token.map(str::to_owned),
        });

        if is_cancelled(cancel) {
            return Err(ApiError::Cancelled);
        }

        match self.next_script(request) {
            ScriptedStream::Reject { status, body } => Err(ApiError::from_status(
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                &body,
            )),
            ScriptedStream::Unreachable(message) => Err(ApiError::Stream(message)),
            ScriptedStream::Open { chunks, ending } => Ok(build_stream(chunks, ending)),
        }
    }
}

fn build_stream(chunks: Vec<ScriptedChunk>, ending: StreamEnding) -> ChunkStream {
    let body = stream::iter(chunks).then(|chunk| async move {
        if chunk.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(chunk.delay_ms)).await;
        }
        Ok::<_, ApiError>(chunk.bytes)
    });

    match ending {
        StreamEnding::Close => Box::pin(body),
        StreamEnding::Fail(message) => {
            Box::pin(body.chain(stream::once(async move { Err(ApiError::Stream(message)) })))
        }
        StreamEnding::Hang => Box::pin(body.chain(stream::pending())),
    }
}
