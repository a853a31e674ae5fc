//! Tests for stream handlers

use super::*;
use crate::test_utils::test_helpers::{Call, RecordingHandler};
use serde_json::json;
use tokio::sync::mpsc;

#[test]
fn test_channel_handler_forwards_in_order() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handler = ChannelHandler::new(tx);

    handler.on_start();
    handler.on_token("Hello");
    handler.on_source(&[json!({"title": "A"})]);
    handler.on_metadata(&json!({"chatId": "c"}));
    handler.on_complete();

    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    assert_eq!(
        updates,
        vec![
            StreamUpdate::Started,
            StreamUpdate::Token("Hello".to_string()),
            StreamUpdate::Sources(vec![json!({"title": "A"})]),
            StreamUpdate::Metadata(json!({"chatId": "c"})),
            StreamUpdate::Complete,
        ]
    );
}

#[test]
fn test_channel_handler_survives_dropped_receiver() {
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    let mut handler = ChannelHandler::new(tx);
    handler.on_token("ignored");
    handler.on_error(&StreamError::EmptyStream);
}

#[test]
fn test_filtered_handler_passes_plain_text_through() {
    let mut handler = FilteredHandler::new(RecordingHandler::default());
    handler.on_token("The liver ");
    handler.on_token("filters blood.");
    handler.on_complete();

    assert_eq!(handler.inner().text(), "The liver filters blood.");
    assert_eq!(handler.inner().calls.last(), Some(&Call::Complete));
}

#[test]
fn test_filtered_handler_holds_critical_sentence_until_complete() {
    let mut handler = FilteredHandler::new(RecordingHandler::default());
    handler.on_token("Call 911 if ");
    handler.on_token("sympto");
    assert_eq!(handler.inner().text(), "");

    handler.on_token("ms worsen.");
    assert_eq!(handler.inner().text(), "Call 911 if symptoms worsen.");
}

#[test]
fn test_filtered_handler_flushes_before_complete() {
    let mut handler = FilteredHandler::new(RecordingHandler::default());
    handler.on_token("Take 500 mg");
    handler.on_complete();

    let inner = handler.into_inner();
    assert_eq!(
        inner.calls,
        vec![Call::Token("Take 500 mg".to_string()), Call::Complete]
    );
}

#[test]
fn test_filtered_handler_flushes_before_error() {
    let mut handler = FilteredHandler::new(RecordingHandler::default());
    handler.on_token("Seek emergency care");
    handler.on_error(&StreamError::Network("reset".to_string()));

    let inner = handler.into_inner();
    assert_eq!(
        inner.calls,
        vec![
            Call::Token("Seek emergency care".to_string()),
            Call::Error(StreamError::Network("reset".to_string())),
        ]
    );
}

#[test]
fn test_mut_ref_is_a_handler() {
    let mut recorder = RecordingHandler::default();
    {
        let mut by_ref = &mut recorder;
        StreamHandler::on_token(&mut by_ref, "x");
        StreamHandler::on_complete(&mut by_ref);
    }
    assert_eq!(recorder.calls.len(), 2);
}
