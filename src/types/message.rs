//! Conversation messages and their model-facing wire shape.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::{ConciergeError, Result};

/// Free-form per-message metadata.
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key holding the ordered tool calls of an assistant message.
pub const TOOL_CALLS_KEY: &str = "tool_calls";
/// Metadata key binding a tool message to the call it answers.
pub const TOOL_CALL_ID_KEY: &str = "tool_call_id";
/// Metadata key naming the tool that produced a tool message.
pub const TOOL_NAME_KEY: &str = "tool_name";
/// Older history files stored the tool name under this key.
const LEGACY_TOOL_NAME_KEY: &str = "name";

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single entry in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    /// May be empty for tool-call-only assistant turns.
    #[serde(default)]
    pub content: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Message {
    /// Create a message with arbitrary metadata, checking the role invariants.
    pub fn new(role: Role, content: impl Into<String>, metadata: Metadata) -> Result<Self> {
        let message = Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        };
        message.validate()?;
        Ok(message)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, text)
    }

    /// An assistant turn that requested tool calls.
    ///
    /// `calls` must already be in accumulation order.
    pub fn assistant_with_tool_calls(text: impl Into<String>, calls: &[StoredToolCall]) -> Self {
        let mut metadata = Metadata::new();
        let calls = calls
            .iter()
            .map(|call| serde_json::to_value(call).unwrap_or(Value::Null))
            .collect();
        metadata.insert(TOOL_CALLS_KEY.into(), Value::Array(calls));
        Self {
            role: Role::Assistant,
            content: text.into(),
            timestamp: Utc::now(),
            metadata,
        }
    }

    /// The answer to one tool call, successful or not.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(TOOL_CALL_ID_KEY.into(), Value::String(tool_call_id.into()));
        metadata.insert(TOOL_NAME_KEY.into(), Value::String(tool_name.into()));
        Self {
            role: Role::Tool,
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        }
    }

    fn plain(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: text.into(),
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    /// Check the metadata invariants for this message's role.
    pub fn validate(&self) -> Result<()> {
        match self.role {
            Role::Tool => {
                if self.tool_call_id().is_none() {
                    return Err(ConciergeError::InvalidArgument(format!(
                        "tool message is missing '{TOOL_CALL_ID_KEY}' metadata"
                    )));
                }
                if self.tool_name().is_none() {
                    return Err(ConciergeError::InvalidArgument(format!(
                        "tool message is missing '{TOOL_NAME_KEY}' metadata"
                    )));
                }
            }
            Role::Assistant => {
                if let Some(raw) = self.metadata.get(TOOL_CALLS_KEY) {
                    serde_json::from_value::<Vec<StoredToolCall>>(raw.clone()).map_err(|e| {
                        ConciergeError::InvalidArgument(format!("malformed tool_calls metadata: {e}"))
                    })?;
                }
            }
            Role::System | Role::User => {}
        }
        Ok(())
    }

    /// Tool calls recorded on an assistant message, in stored order.
    pub fn tool_calls(&self) -> Vec<StoredToolCall> {
        self.metadata
            .get(TOOL_CALLS_KEY)
            .and_then(|raw| serde_json::from_value(raw.clone()).ok())
            .unwrap_or_default()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.metadata.contains_key(TOOL_CALLS_KEY)
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        self.metadata.get(TOOL_CALL_ID_KEY).and_then(Value::as_str)
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.metadata
            .get(TOOL_NAME_KEY)
            .or_else(|| self.metadata.get(LEGACY_TOOL_NAME_KEY))
            .and_then(Value::as_str)
    }

    /// Map this message to the shape the completion service expects.
    pub fn to_wire(&self) -> WireMessage {
        let mut wire = WireMessage {
            role: self.role,
            content: self.content.clone(),
            tool_call_id: None,
            name: None,
            tool_calls: None,
        };
        match self.role {
            Role::Tool => {
                if let Some(id) = self.tool_call_id() {
                    wire.tool_call_id = Some(id.to_string());
                    wire.name = Some(self.tool_name().unwrap_or_default().to_string());
                }
            }
            Role::Assistant if self.has_tool_calls() => {
                wire.tool_calls = Some(self.tool_calls().iter().map(WireToolCall::from).collect());
            }
            _ => {}
        }
        wire
    }
}

/// Parse an RFC 3339 timestamp, or a naive ISO 8601 one read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

/// A tool call as persisted in assistant metadata.
///
/// `arguments` is the raw concatenated text from the stream and may be invalid JSON.
/// Entries in the nested `{id, type, function: {name, arguments}}` form are
/// accepted on load and written back flat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "ToolCallRecord")]
pub struct StoredToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl StoredToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
            kind: None,
        }
    }
}

/// Accepted on-disk shapes of a stored tool call.
#[derive(Deserialize)]
#[serde(untagged)]
enum ToolCallRecord {
    Flat {
        id: String,
        name: String,
        #[serde(default)]
        arguments: String,
        #[serde(rename = "type", default)]
        kind: Option<String>,
    },
    Nested {
        id: String,
        #[serde(rename = "type", default)]
        kind: Option<String>,
        function: FunctionRecord,
    },
}

#[derive(Deserialize)]
struct FunctionRecord {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl From<ToolCallRecord> for StoredToolCall {
    fn from(record: ToolCallRecord) -> Self {
        match record {
            ToolCallRecord::Flat { id, name, arguments, kind } => Self { id, name, arguments, kind },
            ToolCallRecord::Nested { id, kind, function } => Self {
                id,
                name: function.name,
                arguments: function.arguments,
                kind,
            },
        }
    }
}

/// A message in the completion service's request format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

/// A tool call in the completion service's request format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: WireFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireFunction {
    pub name: String,
    pub arguments: String,
}

impl From<&StoredToolCall> for WireToolCall {
    fn from(call: &StoredToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: call.kind.clone().unwrap_or_else(|| "function".to_string()),
            function: WireFunction {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_message_without_binding_is_rejected() {
        let err = Message::new(Role::Tool, "result", Metadata::new()).unwrap_err();
        assert!(err.to_string().contains("tool_call_id"));
    }

    #[test]
    fn legacy_name_key_is_read_as_tool_name() {
        let mut metadata = Metadata::new();
        metadata.insert("tool_call_id".into(), "call_1".into());
        metadata.insert("name".into(), "get_current_time".into());
        let message = Message::new(Role::Tool, "12:00", metadata).unwrap();

        assert_eq!(message.tool_name(), Some("get_current_time"));
        assert_eq!(message.to_wire().name.as_deref(), Some("get_current_time"));
    }

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        let ts = parse_timestamp("2025-03-01T10:00:00.123456").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-03-01T10:00:00.123456+00:00");
        let ts = parse_timestamp("2025-03-01T11:00:00+01:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-03-01T10:00:00+00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn nested_tool_calls_are_stored_flat() {
        let raw = serde_json::json!({
            "id": "call_2",
            "type": "function",
            "function": {"name": "parse_date", "arguments": "{\"date_text\":\"tomorrow\"}"}
        });
        let call: StoredToolCall = serde_json::from_value(raw).unwrap();
        assert_eq!(call.name, "parse_date");
        assert_eq!(call.kind.as_deref(), Some("function"));

        let flat = serde_json::to_value(&call).unwrap();
        assert_eq!(flat["name"], "parse_date");
        assert!(flat.get("function").is_none());
    }

    #[test]
    fn wire_form_defaults_function_tag() {
        let call = StoredToolCall::new("call_1", "parse_date", "{\"date_text\":\"tomorrow\"}");
        let message = Message::assistant_with_tool_calls("", &[call]);
        let wire = serde_json::to_value(message.to_wire()).unwrap();

        assert_eq!(wire["content"], "");
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "parse_date");
        assert!(wire.get("tool_call_id").is_none());
    }

    #[test]
    fn role_round_trips_through_strum() {
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!("tool".parse::<Role>().unwrap(), Role::Tool);
    }
}
