//! Tests for the conversation session façade.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use concierge::session::ChatSession;
use concierge::store::ConversationStore;
use concierge::types::*;
use futures::StreamExt;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn new_session_seeds_system_message_once() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("history.json");

    let client = ScriptedClient::new();
    client.push_stream(text_deltas(&["hi"]));
    let first = ChatSession::new(
        client.clone(),
        registry(vec![]),
        ConversationStore::open(&path),
        "test-model",
        SYSTEM,
    );
    collect_events(first.stream_chat("hello")).await;
    drop(first);

    let reopened = ChatSession::new(client, registry(vec![]), ConversationStore::open(&path), "test-model", SYSTEM);
    let history = reopened.history(None);
    assert_eq!(roles(&history), vec![Role::System, Role::User, Role::Assistant]);
    assert_eq!(history[0].content, SYSTEM);
}

#[tokio::test]
async fn chat_returns_only_the_final_text() {
    let client = ScriptedClient::new();
    client.push_response(CompletionResponse {
        content: Some("checking".into()),
        tool_calls: vec![StoredToolCall::new("call_1", "get_todays_calendar_events", "")],
        finish_reason: Some(FinishReason::ToolCalls),
    });
    client.push_response(CompletionResponse {
        content: Some("Nothing today.".into()),
        ..Default::default()
    });

    let session = session(client, vec![constant_tool("get_todays_calendar_events", "no events")]);
    assert_eq!(session.chat("calendar?").await.unwrap(), "Nothing today.");
}

#[tokio::test]
async fn chat_surfaces_upstream_failure() {
    let client = ScriptedClient::new();
    client.push_open_error("overloaded");

    let session = session(client, vec![]);
    let err = session.chat("hi").await.unwrap_err();
    assert!(matches!(err, concierge::error::ConciergeError::Upstream(ref m) if m.contains("overloaded")));
    assert_eq!(roles(&session.history(None)), vec![Role::System, Role::User]);
}

#[tokio::test]
async fn clear_then_reseed_leaves_one_system_message() {
    let client = ScriptedClient::new();
    client.push_stream(text_deltas(&["one"]));
    client.push_stream(text_deltas(&["two"]));

    let session = session(client, vec![]);
    collect_events(session.stream_chat("a")).await;
    collect_events(session.stream_chat("b")).await;
    assert_eq!(session.history(None).len(), 5);

    session.clear_history().await;
    let history = session.history(None);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::System);
    assert_eq!(history[0].content, SYSTEM);
}

#[tokio::test]
async fn stream_chat_is_lazy() {
    let client = ScriptedClient::new();
    client.push_stream(text_deltas(&["x"]));

    let session = session(client.clone(), vec![]);
    let events = session.stream_chat("not yet");
    assert_eq!(client.request_count(), 0);
    assert_eq!(session.history(None).len(), 1);

    let events = collect_events(events).await;
    assert_eq!(events.last(), Some(&ChatEvent::Done));
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn concurrent_turns_are_serialized() {
    let client = ScriptedClient::new();
    client.push_stream(text_deltas(&["first ", "answer"]));
    client.push_stream(text_deltas(&["second answer"]));

    let session = session(client.clone(), vec![]);
    let mut first = session.stream_chat("one");
    assert_eq!(first.next().await, Some(ChatEvent::content("first ")));

    let mut second = session.stream_chat("two");
    let blocked = tokio::time::timeout(Duration::from_millis(50), second.next()).await;
    assert!(blocked.is_err(), "second turn must wait for the first");

    while first.next().await.is_some() {}
    drop(first);

    assert_eq!(second.next().await, Some(ChatEvent::content("second answer")));
    assert_eq!(second.next().await, Some(ChatEvent::Done));

    let contents: Vec<String> = session.history(None).into_iter().map(|m| m.content).collect();
    assert_eq!(&contents[1..], &["one", "first answer", "two", "second answer"]);
}

#[tokio::test]
async fn history_limit_returns_most_recent_messages() {
    let client = ScriptedClient::new();
    client.push_stream(text_deltas(&["pong"]));

    let session = session(client, vec![]);
    collect_events(session.stream_chat("ping")).await;

    let tail: Vec<String> = session.history(Some(2)).into_iter().map(|m| m.content).collect();
    assert_eq!(tail, vec!["ping", "pong"]);
    assert_eq!(session.history(Some(0)).len(), 3);
}

#[tokio::test]
async fn persistence_failures_are_reported_not_raised() {
    let dir = tempfile::TempDir::new().unwrap();
    // a directory where the history file should be makes every write fail
    let path = dir.path().join("history.json");
    std::fs::create_dir(&path).unwrap();

    let client = ScriptedClient::new();
    client.push_stream(text_deltas(&["still works"]));
    let session = ChatSession::new(
        client,
        Arc::new(concierge::tools::ToolRegistry::new()),
        ConversationStore::open(&path),
        "test-model",
        SYSTEM,
    );

    let events = collect_events(session.stream_chat("hi")).await;
    assert_eq!(events, vec![ChatEvent::content("still works"), ChatEvent::Done]);
    assert_eq!(session.history(None).len(), 3);
    assert!(!session.drain_warnings().is_empty());
}
