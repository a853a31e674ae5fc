//! Tests for frame classification

use super::*;
use serde_json::json;

fn frame(event: Option<&str>, data: &str) -> SseFrame {
    SseFrame {
        event: event.map(str::to_string),
        data: data.to_string(),
        ..Default::default()
    }
}

#[test]
fn test_decode_plain_token() {
    assert_eq!(decode_token("Hello"), Some("Hello".to_string()));
}

#[test]
fn test_decode_json_encoded_token_keeps_newlines() {
    assert_eq!(
        decode_token(r#""line one\nline two""#),
        Some("line one\nline two".to_string())
    );
}

#[test]
fn test_decode_invalid_json_string_is_literal() {
    assert_eq!(decode_token(r#""\q""#), Some(r#""\q""#.to_string()));
}

#[test]
fn test_decode_drops_empty_and_undefined() {
    assert_eq!(decode_token(""), None);
    assert_eq!(decode_token("undefined"), None);
    assert_eq!(decode_token(r#""""#), None);
    assert_eq!(decode_token(r#""undefined""#), None);
}

#[test]
fn test_decode_keeps_whitespace_tokens() {
    assert_eq!(decode_token(" "), Some(" ".to_string()));
    assert_eq!(decode_token(r#""\n\n""#), Some("\n\n".to_string()));
}

#[test]
fn test_single_quote_is_literal() {
    assert_eq!(decode_token("\""), Some("\"".to_string()));
}

#[test]
fn test_start_event_parses_json() {
    let event = StreamEvent::from_frame(frame(Some("start"), r#"{"chatId":"c1"}"#));
    assert_eq!(event, Some(StreamEvent::Start(json!({"chatId": "c1"}))));
}

#[test]
fn test_start_event_with_bad_json_is_skipped() {
    assert_eq!(StreamEvent::from_frame(frame(Some("start"), "{oops")), None);
}

#[test]
fn test_source_documents_non_empty() {
    let event = StreamEvent::from_frame(frame(Some("sourceDocuments"), r#"[{"title":"A"}]"#));
    assert_eq!(
        event,
        Some(StreamEvent::SourceDocuments(vec![json!({"title": "A"})]))
    );
}

#[test]
fn test_source_documents_empty_is_skipped() {
    assert_eq!(
        StreamEvent::from_frame(frame(Some("sourceDocuments"), "[]")),
        None
    );
}

#[test]
fn test_source_documents_not_array_is_skipped() {
    assert_eq!(
        StreamEvent::from_frame(frame(Some("sourceDocuments"), r#"{"title":"A"}"#)),
        None
    );
}

#[test]
fn test_metadata_requires_object() {
    assert_eq!(
        StreamEvent::from_frame(frame(Some("metadata"), r#"{"sessionId":"s"}"#)),
        Some(StreamEvent::Metadata(json!({"sessionId": "s"})))
    );
    assert_eq!(StreamEvent::from_frame(frame(Some("metadata"), "[1]")), None);
}

#[test]
fn test_end_and_error_events() {
    assert_eq!(
        StreamEvent::from_frame(frame(Some("end"), "[DONE]")),
        Some(StreamEvent::End)
    );
    assert_eq!(
        StreamEvent::from_frame(frame(Some("error"), "model overloaded")),
        Some(StreamEvent::Error("model overloaded".to_string()))
    );
}

#[test]
fn test_untyped_and_message_frames() {
    assert_eq!(
        StreamEvent::from_frame(frame(None, "raw")),
        Some(StreamEvent::Message("raw".to_string()))
    );
    assert_eq!(
        StreamEvent::from_frame(frame(Some("message"), "raw")),
        Some(StreamEvent::Message("raw".to_string()))
    );
}

#[test]
fn test_unknown_named_event_is_ignored() {
    assert_eq!(
        StreamEvent::from_frame(frame(Some("usedTools"), "[]")),
        Some(StreamEvent::Ignored("usedTools".to_string()))
    );
}
