//! Conversation store: the ordered, durable message log of one session.
//!
//! Every append rewrites the durable sink. Persistence failures never fail the
//! caller; they are logged and recorded as [`PersistenceWarning`]s that can be
//! drained by whoever owns the store.

pub mod sink;

pub use sink::{FileHistorySink, HistorySink};

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::PersistenceWarning;
use crate::types::{Message, WireMessage};

/// A store shared between a session and its in-flight turn.
pub type SharedStore = Arc<Mutex<ConversationStore>>;

/// Lock a shared store, recovering the data from a poisoned lock.
///
/// Appends never leave the log half-written, so the inner value stays consistent.
pub fn lock_store(store: &SharedStore) -> MutexGuard<'_, ConversationStore> {
    store.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Append-only conversation log with an optional durable sink.
pub struct ConversationStore {
    messages: Vec<Message>,
    sink: Option<Box<dyn HistorySink>>,
    warnings: Vec<PersistenceWarning>,
}

impl ConversationStore {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            messages: Vec::new(),
            sink: None,
            warnings: Vec::new(),
        }
    }

    /// A store backed by a JSON file, loading whatever it already holds.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_sink(Box::new(FileHistorySink::new(path)))
    }

    /// A store backed by `sink`.
    ///
    /// An unreadable or corrupt log is replaced by an empty one and reported
    /// as a warning; construction itself never fails.
    pub fn with_sink(sink: Box<dyn HistorySink>) -> Self {
        let mut store = Self {
            messages: Vec::new(),
            sink: None,
            warnings: Vec::new(),
        };
        match sink.load() {
            Ok(messages) => {
                debug!(location = %sink.location(), messages = messages.len(), "loaded conversation history");
                store.messages = messages;
            }
            Err(err) => store.record_warning(&sink.location(), format!("could not load history: {err}")),
        }
        store.sink = Some(sink);
        store
    }

    /// Wrap the store for sharing with a session.
    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Append one message and persist the whole log.
    pub fn append(&mut self, message: Message) {
        debug!(role = %message.role, chars = message.content.len(), "appending message");
        self.messages.push(message);
        self.persist();
    }

    /// The last `limit` messages, oldest first. `None` or `Some(0)` means the full log.
    pub fn all(&self, limit: Option<usize>) -> &[Message] {
        match limit {
            Some(n) if n > 0 && n < self.messages.len() => &self.messages[self.messages.len() - n..],
            _ => &self.messages,
        }
    }

    /// Same window as [`all`](Self::all), in the completion service's request shape.
    pub fn to_model_format(&self, limit: Option<usize>) -> Vec<WireMessage> {
        self.all(limit).iter().map(Message::to_wire).collect()
    }

    /// Empty the log and persist the empty state.
    ///
    /// Does not re-seed a system message.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.persist();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Persistence problems recorded since the last drain.
    pub fn warnings(&self) -> &[PersistenceWarning] {
        &self.warnings
    }

    pub fn drain_warnings(&mut self) -> Vec<PersistenceWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn persist(&mut self) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        if let Err(err) = sink.save(&self.messages) {
            let location = sink.location();
            self.record_warning(&location, err.to_string());
        }
    }

    fn record_warning(&mut self, location: &str, message: String) {
        warn!(location, error = %message, "conversation history persistence failed");
        self.warnings.push(PersistenceWarning::new(location, message));
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("messages", &self.messages.len())
            .field("sink", &self.sink.as_ref().map(|s| s.location()))
            .field("warnings", &self.warnings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConciergeError, Result};
    use crate::types::{Role, StoredToolCall};
    use pretty_assertions::assert_eq;

    struct BrokenSink;

    impl HistorySink for BrokenSink {
        fn load(&self) -> Result<Vec<Message>> {
            Ok(Vec::new())
        }

        fn save(&self, _messages: &[Message]) -> Result<()> {
            Err(ConciergeError::Persistence {
                path: "broken".into(),
                message: "disk full".into(),
            })
        }

        fn location(&self) -> String {
            "broken".into()
        }
    }

    #[test]
    fn limit_returns_tail_oldest_first() {
        let mut store = ConversationStore::in_memory();
        for text in ["a", "b", "c"] {
            store.append(Message::user(text));
        }
        let tail: Vec<&str> = store.all(Some(2)).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(tail, vec!["b", "c"]);
        assert_eq!(store.all(Some(0)).len(), 3);
        assert_eq!(store.all(Some(10)).len(), 3);
        assert_eq!(store.all(None).len(), 3);
    }

    #[test]
    fn failing_sink_keeps_turn_in_memory() {
        let mut store = ConversationStore::with_sink(Box::new(BrokenSink));
        store.append(Message::user("hi"));
        store.append(Message::assistant("hello"));

        assert_eq!(store.len(), 2);
        assert_eq!(store.warnings().len(), 2);
        assert!(store.warnings()[0].message.contains("disk full"));
        assert_eq!(store.drain_warnings().len(), 2);
        assert!(store.warnings().is_empty());
    }

    #[test]
    fn corrupt_file_falls_back_to_empty_log() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = ConversationStore::open(&path);
        assert!(store.is_empty());
        assert_eq!(store.warnings().len(), 1);
    }

    #[test]
    fn model_format_reattaches_function_tag() {
        let mut store = ConversationStore::in_memory();
        store.append(Message::assistant_with_tool_calls(
            "",
            &[StoredToolCall::new("call_1", "get_todays_calendar_events", "")],
        ));
        store.append(Message::tool_result("call_1", "get_todays_calendar_events", "nothing today"));

        let wire = store.to_model_format(None);
        assert_eq!(wire[0].role, Role::Assistant);
        let calls = wire[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].kind, "function");
        assert_eq!(calls[0].function.name, "get_todays_calendar_events");
        assert_eq!(wire[1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(wire[1].name.as_deref(), Some("get_todays_calendar_events"));
    }
}
