//! Name-keyed tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolExecutionContext};
use super::types::ToolDescriptor;
use crate::error::{ConciergeError, Result};

/// Registered tools, keyed by name and kept in registration order.
///
/// Built once at start-up, then shared read-only behind an `Arc`.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration under the same name replaces the
    /// earlier handler but keeps its original position in [`schemas`](Self::schemas).
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        match self.by_name.get(&name) {
            Some(&slot) => {
                debug!(tool = %name, "replacing registered tool");
                self.tools[slot] = tool;
            }
            None => {
                self.by_name.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&slot| &self.tools[slot])
    }

    /// Descriptors for every tool, in registration order.
    pub fn schemas(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|tool| tool.descriptor()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run the named tool. Handler errors are returned untouched.
    pub async fn execute(
        &self,
        name: &str,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| ConciergeError::ToolNotFound(name.to_string()))?;
        debug!(tool = name, tool_call_id = ?ctx.tool_call_id, "executing tool");
        tool.execute(args, ctx).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool::AgentTool;
    use crate::tools::types::ToolParameters;

    fn constant(name: &str, reply: &'static str) -> Arc<dyn Tool> {
        Arc::new(AgentTool::new(
            name,
            format!("returns {reply}"),
            ToolParameters::empty(),
            move |_args, _ctx| async move { Ok(reply.to_string()) },
        ))
    }

    #[tokio::test]
    async fn re_registration_replaces_handler() {
        let mut registry = ToolRegistry::new();
        registry.register(constant("t", "first"));
        registry.register(constant("other", "other"));
        registry.register(constant("t", "second"));

        let out = registry
            .execute("t", &ToolArguments::parse("").unwrap(), &ToolExecutionContext::default())
            .await
            .unwrap();
        assert_eq!(out, "second");
        assert_eq!(registry.names(), vec!["t", "other"]);
        assert_eq!(registry.schemas()[0].description, "returns second");
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("missing", &ToolArguments::parse("{}").unwrap(), &ToolExecutionContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConciergeError::ToolNotFound(ref name) if name == "missing"));
    }
}
