use futures_util::{stream, StreamExt};
use pretty_assertions::assert_eq;
use research_api::sse::classify_payload;
use research_api::{decode_stream, ApiError, ErrorEvent, FrameDecoder, ResearchStatus, WireEvent};

const BODY: &str = concat!(
    "data: {\"status\":\"searching\",\"message\":\"Searching for sources \u{2013} caf\u{e9}\",\"progress\":0.1,\"sources_found\":0,\"sources_processed\":0}\n\n",
    ": keep-alive comment\n\n",
    "event: progress\n",
    "data: {\"status\":\"summarizing\",\"message\":\"Summarizing\",\"progress\":0.6,\"sources_found\":8,\"sources_processed\":5}\n\n",
    "data: {\"topic\":\"t\",\"briefing\":\"## Briefing\\nBody\",\"sources\":[],\"total_time_seconds\":3.0,\"model_used\":\"m\"}\n\n",
    "data: [DONE]\n\n",
    "data: {\"message\":\"after the sentinel\"}\n\n",
);

fn decode_in_pieces(body: &[u8], piece: usize) -> Vec<WireEvent> {
    let mut decoder = FrameDecoder::default();
    let mut events = Vec::new();
    for chunk in body.chunks(piece) {
        events.extend(decoder.feed(chunk));
    }
    events.extend(decoder.finish());
    events
}

#[test]
fn chunk_boundaries_do_not_change_decoded_events() {
    let whole = FrameDecoder::parse_frames(BODY);
    assert_eq!(whole.len(), 4);
    assert!(matches!(&whole[0], WireEvent::Progress(progress) if progress.status == ResearchStatus::Searching));
    assert!(matches!(&whole[2], WireEvent::Result(result) if result.briefing == "## Briefing\nBody"));
    assert_eq!(whole[3], WireEvent::Done);

    for piece in 1..=BODY.len() {
        assert_eq!(
            decode_in_pieces(BODY.as_bytes(), piece),
            whole,
            "piece size {piece}"
        );
    }
}

#[test]
fn nothing_after_sentinel_is_decoded() {
    let events = FrameDecoder::parse_frames(
        "data: [DONE]\n\ndata: {\"status\":\"searching\",\"message\":\"m\",\"progress\":0.1}\n\n",
    );
    assert_eq!(events, vec![WireEvent::Done]);
}

#[test]
fn trailing_line_without_newline_is_decoded_at_end() {
    let events = FrameDecoder::parse_frames("data: {\"message\":\"no newline\"}");
    assert_eq!(
        events,
        vec![
            WireEvent::Error(ErrorEvent {
                message: "no newline".to_string()
            }),
            WireEvent::Done
        ]
    );
}

#[test]
fn malformed_and_unknown_frames_are_skipped() {
    let events = FrameDecoder::parse_frames(concat!(
        "data: {not json\n\n",
        "data: [1,2,3]\n\n",
        "data: {\"unrelated\":true}\n\n",
        "data:\n\n",
        "id: 4\n\n",
        "data:{\"message\":\"no space\"}\n\n",
    ));
    assert_eq!(
        events,
        vec![
            WireEvent::Error(ErrorEvent {
                message: "no space".to_string()
            }),
            WireEvent::Done
        ]
    );
}

#[test]
fn classification_prefers_status_then_briefing_then_message() {
    assert!(matches!(
        classify_payload(r#"{"status":"completed","message":"Done","progress":1.0,"briefing":"x"}"#),
        Some(WireEvent::Progress(_))
    ));
    assert!(matches!(
        classify_payload(r#"{"briefing":"b","message":"ignored"}"#),
        Some(WireEvent::Result(_))
    ));
    assert!(matches!(
        classify_payload(r#"{"message":"boom"}"#),
        Some(WireEvent::Error(_))
    ));
    assert_eq!(classify_payload(r#"{"status":"thinking","message":"m","progress":0.1}"#), None);
}

#[tokio::test]
async fn decode_stream_is_lazy_and_ends_at_transport_error() {
    let chunks = stream::iter(vec![
        Ok(b"data: {\"message\":\"first\"}\n".to_vec()),
        Err(ApiError::Stream("connection reset".to_string())),
        Ok(b"data: {\"message\":\"unreachable\"}\n".to_vec()),
    ]);

    let items: Vec<_> = decode_stream(chunks).collect().await;
    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0], Ok(WireEvent::Error(error)) if error.message == "first"));
    assert!(matches!(&items[1], Err(ApiError::Stream(_))));
}

#[tokio::test]
async fn decode_stream_stops_pulling_after_sentinel() {
    let chunks = stream::iter(vec![
        Ok(b"data: [DONE]\n\n".to_vec()),
        Err(ApiError::Stream("never read".to_string())),
    ]);

    let items: Vec<_> = decode_stream(chunks).collect().await;
    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Ok(WireEvent::Done)));
}
