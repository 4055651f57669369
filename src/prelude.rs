//! Convenience re-exports for common use.

pub use crate::config::ConciergeConfig;
pub use crate::error::{ConciergeError, PersistenceWarning, Result};
pub use crate::orchestrator::{ChatEventStream, Orchestrator};
pub use crate::provider::{CompletionClient, CompletionRequest, OpenAiClient};
pub use crate::session::ChatSession;
pub use crate::store::{ConversationStore, FileHistorySink, HistorySink};
pub use crate::tools::{AgentTool, Tool, ToolArguments, ToolParameters, ToolRegistry};
pub use crate::types::{ChatEvent, GenerationSettings, Message, Role};
