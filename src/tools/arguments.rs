//! Typed access to tool call arguments.

use crate::error::{ConciergeError, Result};

/// Wrapper around parsed tool call arguments providing typed extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Parse the raw argument text accumulated from the stream.
    ///
    /// Blank input means "no arguments". Anything else must be a JSON object.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new(serde_json::json!({})));
        }
        let value: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|e| ConciergeError::InvalidArgument(format!("arguments are not valid JSON: {e}")))?;
        if !value.is_object() {
            return Err(ConciergeError::InvalidArgument(
                "arguments must be a JSON object".to_string(),
            ));
        }
        Ok(Self::new(value))
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConciergeError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument. Explicit `null` counts as absent.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an optional integer argument.
    pub fn get_i64_opt(&self, key: &str) -> Option<i64> {
        self.value.get(key).and_then(|v| v.as_i64())
    }

    /// Get an optional boolean argument.
    pub fn get_bool_opt(&self, key: &str) -> Option<bool> {
        self.value.get(key).and_then(|v| v.as_bool())
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            ConciergeError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}
