use futures_util::stream::{self, Stream, StreamExt};
use serde_json::Value;

use crate::error::ApiError;
use crate::events::{ErrorEvent, ResearchProgress, ResearchResult, WireEvent};

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder for the research event stream.
///
/// Chunks may split anywhere, including inside a line or a UTF-8 sequence.
/// Complete lines are decoded as soon as they arrive; the trailing partial
/// line is carried over to the next chunk.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: String,
    undecoded: Vec<u8>,
    finished: bool,
}

impl FrameDecoder {
    /// Feed one transport chunk and drain the events it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<WireEvent> {
        if self.finished || chunk.is_empty() {
            return Vec::new();
        }

        let text = self.decode_utf8(chunk);
        self.carry.push_str(&text);

        let Some(last_newline) = self.carry.rfind('\n') else {
            return Vec::new();
        };
        let complete: String = self.carry.drain(..=last_newline).collect();

        let mut events = Vec::new();
        for line in complete.split('\n') {
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
            if self.finished {
                self.carry.clear();
                break;
            }
        }

        events
    }

    /// Signal natural end of the transport stream.
    ///
    /// Decodes whatever is left in the carry-over as a final line and emits
    /// [`WireEvent::Done`] unless the sentinel was already seen. Calling this
    /// more than once yields nothing.
    pub fn finish(&mut self) -> Vec<WireEvent> {
        if self.finished {
            return Vec::new();
        }

        let mut events = Vec::new();
        if !self.undecoded.is_empty() {
            let tail = String::from_utf8_lossy(&self.undecoded).into_owned();
            self.undecoded.clear();
            self.carry.push_str(&tail);
        }

        let remainder = std::mem::take(&mut self.carry);
        if let Some(event) = self.process_line(&remainder) {
            events.push(event);
        }

        if !self.finished {
            self.finished = true;
            events.push(WireEvent::Done);
        }

        events
    }

    /// Feed a `(chunk, is_final)` pair as delivered by a pull-based reader.
    pub fn decode(&mut self, chunk: &[u8], is_final: bool) -> Vec<WireEvent> {
        let mut events = self.feed(chunk);
        if is_final {
            events.extend(self.finish());
        }
        events
    }

    /// True once `Done` has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.carry.trim().is_empty() && self.undecoded.is_empty()
    }

    /// Decode a complete payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<WireEvent> {
        let mut decoder = Self::default();
        decoder.decode(input.as_bytes(), true)
    }

    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        self.undecoded.extend_from_slice(chunk);

        match std::str::from_utf8(&self.undecoded) {
            Ok(text) => {
                let text = text.to_owned();
                self.undecoded.clear();
                text
            }
            // Incomplete sequence at the end: keep it for the next chunk.
            Err(error) if error.error_len().is_none() => {
                let tail = self.undecoded.split_off(error.valid_up_to());
                let text = String::from_utf8_lossy(&self.undecoded).into_owned();
                self.undecoded = tail;
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.undecoded).into_owned();
                self.undecoded.clear();
                text
            }
        }
    }

    fn process_line(&mut self, line: &str) -> Option<WireEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let payload = extract_data_payload(line)?;

        if payload == DONE_SENTINEL {
            self.finished = true;
            return Some(WireEvent::Done);
        }

        classify_payload(payload)
    }
}

fn extract_data_payload(line: &str) -> Option<&str> {
    let value = line.strip_prefix(DATA_PREFIX)?;
    let value = value.strip_prefix(' ').unwrap_or(value).trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Classify one `data:` payload by its shape.
///
/// A payload with a `status` field is progress; otherwise one with
/// `briefing` is the result; otherwise one with `message` is an error.
/// Anything else, including payloads that fail to parse, is dropped.
pub fn classify_payload(payload: &str) -> Option<WireEvent> {
    let value = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(error) => {
            tracing::debug!(%error, payload, "dropping unparseable stream frame");
            return None;
        }
    };

    let Some(object) = value.as_object() else {
        tracing::debug!(payload, "dropping non-object stream frame");
        return None;
    };
    let has_status = object.contains_key("status");
    let has_briefing = object.contains_key("briefing");
    let has_message = object.contains_key("message");

    let event = if has_status {
        serde_json::from_value::<ResearchProgress>(value).map(WireEvent::Progress)
    } else if has_briefing {
        serde_json::from_value::<ResearchResult>(value).map(WireEvent::Result)
    } else if has_message {
        serde_json::from_value::<ErrorEvent>(value).map(WireEvent::Error)
    } else {
        tracing::debug!(payload, "dropping unrecognized stream frame");
        return None;
    };

    match event {
        Ok(event) => Some(event),
        Err(error) => {
            tracing::debug!(%error, payload, "dropping malformed stream frame");
            None
        }
    }
}

/// Lazily decode a stream of transport chunks into events.
///
/// The returned stream ends after `Done` or after the first transport error,
/// which is yielded as the final item.
pub fn decode_stream<S>(chunks: S) -> impl Stream<Item = Result<WireEvent, ApiError>>
where
    S: Stream<Item = Result<Vec<u8>, ApiError>> + Unpin,
{
    stream::unfold(
        Some((chunks, FrameDecoder::default())),
        |state| async move {
            let (mut chunks, mut decoder) = state?;
            match chunks.next().await {
                Some(Ok(chunk)) => {
                    let events: Vec<Result<WireEvent, ApiError>> =
                        decoder.feed(&chunk).into_iter().map(Ok).collect();
                    let next = if decoder.is_finished() {
                        None
                    } else {
                        Some((chunks, decoder))
                    };
                    Some((events, next))
                }
                Some(Err(error)) => Some((vec![Err(error)], None)),
                None => {
                    let events: Vec<Result<WireEvent, ApiError>> =
                        decoder.finish().into_iter().map(Ok).collect();
                    Some((events, None))
                }
            }
        },
    )
    .flat_map(stream::iter)
}
