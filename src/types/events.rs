//! Outward events streamed to CLI and HTTP callers.

use serde::{Deserialize, Serialize};

/// A unit of the outward chat stream.
///
/// Every run ends with exactly one terminal event: [`ChatEvent::Done`] or
/// [`ChatEvent::Error`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Content { content: String },
    ToolStart { name: String },
    ToolResult { name: String, result: String },
    ToolError { name: String, error: String },
    SecondResponseStart,
    Done,
    Error { error: String },
}

impl ChatEvent {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content {
            content: text.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// The `type` tag this event serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Content { .. } => "content",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolResult { .. } => "tool_result",
            Self::ToolError { .. } => "tool_error",
            Self::SecondResponseStart => "second_response_start",
            Self::Done => "done",
            Self::Error { .. } => "error",
        }
    }
}
