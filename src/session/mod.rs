//! Conversation session façade: one store, one turn at a time.

pub mod router;

pub use router::{route, AgentRole};

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ConciergeConfig;
use crate::error::{PersistenceWarning, Result};
use crate::orchestrator::{ChatEventStream, Orchestrator};
use crate::provider::{CompletionClient, OpenAiClient};
use crate::store::{lock_store, ConversationStore, SharedStore};
use crate::tools::{builtin, ToolRegistry};
use crate::types::{GenerationSettings, Message};

/// A single conversation: wires store, registry and completion client together.
///
/// Turns are serialized by a per-session lock, so a second `chat` or
/// `stream_chat` waits until the running turn finishes or its stream is dropped.
#[derive(Clone)]
pub struct ChatSession {
    orchestrator: Orchestrator,
    system_instructions: String,
    turn_lock: Arc<Mutex<()>>,
}

impl ChatSession {
    /// Create a session over `store`, seeding the system message if the log is empty.
    pub fn new(
        client: Arc<dyn CompletionClient>,
        registry: Arc<ToolRegistry>,
        store: ConversationStore,
        model: impl Into<String>,
        system_instructions: impl Into<String>,
    ) -> Self {
        let orchestrator = Orchestrator::new(client, registry, store.shared(), model);
        Self::from_orchestrator(orchestrator, system_instructions)
    }

    pub fn from_orchestrator(orchestrator: Orchestrator, system_instructions: impl Into<String>) -> Self {
        let system_instructions = system_instructions.into();
        {
            let mut store = lock_store(orchestrator.store());
            if store.is_empty() {
                store.append(Message::system(system_instructions.clone()));
            }
        }
        Self {
            orchestrator,
            system_instructions,
            turn_lock: Arc::new(Mutex::new(())),
        }
    }

    /// OpenAI client, built-in tools and the file-backed history named by `config`.
    pub fn from_config(config: &ConciergeConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config.api_key.clone().unwrap_or_default();
        let client = OpenAiClient::new(api_key, config.base_url.clone());

        let mut registry = ToolRegistry::new();
        builtin::register_all(&mut registry, config.tz()?);
        info!(tools = registry.len(), model = %config.model, history = %config.history_path.display(), "session ready");

        Ok(Self::new(
            Arc::new(client),
            Arc::new(registry),
            ConversationStore::open(&config.history_path),
            config.model.clone(),
            config.system_instructions.clone(),
        ))
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.orchestrator = self.orchestrator.with_settings(settings);
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn store(&self) -> &SharedStore {
        self.orchestrator.store()
    }

    /// Run one turn and return only the final assistant text.
    pub async fn chat(&self, text: impl Into<String>) -> Result<String> {
        let text = text.into();
        let _turn = self.turn_lock.lock().await;
        debug!(role = %route(&text), "routing turn");
        self.orchestrator.complete_turn(text).await
    }

    /// Run one turn as a lazy, finite stream of outward events.
    ///
    /// Nothing happens until the stream is polled; the turn lock is held until
    /// the stream finishes or is dropped.
    pub fn stream_chat(&self, text: impl Into<String>) -> ChatEventStream {
        let text = text.into();
        let lock = Arc::clone(&self.turn_lock);
        let orchestrator = self.orchestrator.clone();

        Box::pin(async_stream::stream! {
            let _turn = lock.lock_owned().await;
            debug!(role = %route(&text), "routing turn");
            let mut events = orchestrator.run(text);
            while let Some(event) = events.next().await {
                yield event;
            }
        })
    }

    /// Clear the log and re-seed the system message as one step.
    pub async fn clear_history(&self) {
        let _turn = self.turn_lock.lock().await;
        let mut store = lock_store(self.store());
        store.clear();
        store.append(Message::system(self.system_instructions.clone()));
        info!("conversation history cleared");
    }

    /// The last `limit` messages (all of them for `None` or `Some(0)`).
    pub fn history(&self, limit: Option<usize>) -> Vec<Message> {
        lock_store(self.store()).all(limit).to_vec()
    }

    /// Persistence warnings recorded since the last call.
    pub fn drain_warnings(&self) -> Vec<PersistenceWarning> {
        lock_store(self.store()).drain_warnings()
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}
