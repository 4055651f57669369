//! Reassembles streamed tool-call fragments into complete calls.

use std::collections::BTreeMap;

use crate::types::{StoredToolCall, ToolCallFragment};

/// One tool call under construction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct PendingToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Per-turn fragment accumulator, keyed by the stream-assigned index.
///
/// Ids overwrite; name and argument fragments append in arrival order.
/// Arguments are never parsed here.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    by_index: BTreeMap<u32, PendingToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, fragment: ToolCallFragment) {
        let entry = self.by_index.entry(fragment.index).or_default();
        if let Some(id) = fragment.id {
            entry.id = Some(id);
        }
        if let Some(name) = fragment.name {
            entry.name.push_str(&name);
        }
        if let Some(arguments) = fragment.arguments {
            entry.arguments.push_str(&arguments);
        }
    }

    pub fn extend(&mut self, fragments: impl IntoIterator<Item = ToolCallFragment>) {
        for fragment in fragments {
            self.apply(fragment);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    /// Complete calls in ascending index order.
    ///
    /// A call whose id never arrived gets `call_<index>`.
    pub fn finish(self) -> Vec<StoredToolCall> {
        self.by_index
            .into_iter()
            .map(|(index, entry)| StoredToolCall {
                id: entry.id.unwrap_or_else(|| format!("call_{index}")),
                name: entry.name,
                arguments: entry.arguments,
                kind: Some("function".to_string()),
            })
            .collect()
    }
}
