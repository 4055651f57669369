//! Completion client trait and the OpenAI-compatible implementation.

pub mod http;
pub mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::tools::ToolDescriptor;
use crate::types::{CompletionDelta, CompletionResponse, GenerationSettings, WireMessage};

/// A request sent to the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    /// `None` (or empty) means the service may not call tools on this turn.
    pub tools: Option<Vec<ToolDescriptor>>,
    pub settings: GenerationSettings,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<WireMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: None,
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Whether this request advertises any tools.
    pub fn offers_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|tools| !tools.is_empty())
    }
}

/// Boxed stream of incremental completion events.
pub type DeltaStream = BoxStream<'static, Result<CompletionDelta>>;

/// Anything that can turn a conversation into model output.
///
/// Failures either when opening the stream or while reading it surface as `Err`.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one completion without streaming.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    /// Run one completion as a stream of deltas.
    async fn stream(&self, request: &CompletionRequest) -> Result<DeltaStream>;
}
