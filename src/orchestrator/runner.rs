//! Drives one user turn: first completion, tool execution, second completion.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::error::{ConciergeError, Result};
use crate::provider::{CompletionClient, CompletionRequest};
use crate::store::{lock_store, SharedStore};
use crate::tools::{ToolArguments, ToolExecutionContext, ToolRegistry};
use crate::types::{ChatEvent, GenerationSettings, Message, StoredToolCall};

use super::accumulator::ToolCallAccumulator;
use super::phase::{TurnPhase, TurnState};

/// Boxed stream of outward chat events.
pub type ChatEventStream = BoxStream<'static, ChatEvent>;

/// Wires a completion client, the tool registry and a conversation store
/// into the two-round tool-calling turn.
///
/// Cloning is cheap; clones share the same store.
#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn CompletionClient>,
    registry: Arc<ToolRegistry>,
    store: SharedStore,
    model: String,
    settings: GenerationSettings,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        registry: Arc<ToolRegistry>,
        store: SharedStore,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            registry,
            store,
            model: model.into(),
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build a request from the current history. Tools are offered only on the first round.
    fn request(&self, offer_tools: bool) -> CompletionRequest {
        let messages = lock_store(&self.store).to_model_format(None);
        let request = CompletionRequest::new(self.model.clone(), messages).with_settings(self.settings.clone());
        if offer_tools && !self.registry.is_empty() {
            request.with_tools(self.registry.schemas())
        } else {
            request
        }
    }

    fn append(&self, message: Message) {
        lock_store(&self.store).append(message);
    }

    /// Run one turn for `user_text`, streaming outward events.
    ///
    /// The stream always ends with exactly one `Done` or `Error` event. Dropping
    /// it stops the turn; the store then holds only the appends completed so far.
    pub fn run(&self, user_text: impl Into<String>) -> ChatEventStream {
        let this = self.clone();
        let user_text = user_text.into();

        let stream = async_stream::stream! {
            let mut turn = TurnState::new();
            info!(turn_id = %turn.id(), model = %this.model, "starting turn");
            this.append(Message::user(user_text));

            let mut deltas = match this.client.stream(&this.request(true)).await {
                Ok(deltas) => deltas,
                Err(err) => {
                    yield this.fail(&mut turn, err);
                    return;
                }
            };

            let mut content = String::new();
            let mut pending = ToolCallAccumulator::new();
            while let Some(delta) = deltas.next().await {
                let delta = match delta {
                    Ok(delta) => delta,
                    Err(err) => {
                        yield this.fail(&mut turn, err);
                        return;
                    }
                };
                if let Some(text) = delta.content.filter(|text| !text.is_empty()) {
                    if turn.phase() == TurnPhase::AwaitingFirstTurn {
                        turn.advance(TurnPhase::StreamingContent);
                    }
                    content.push_str(&text);
                    yield ChatEvent::content(text);
                }
                if !delta.tool_calls.is_empty() {
                    turn.advance(TurnPhase::StreamingToolCalls);
                    pending.extend(delta.tool_calls);
                }
            }
            drop(deltas);

            if pending.is_empty() {
                this.append(Message::assistant(content));
                turn.advance(TurnPhase::Done);
                info!(turn_id = %turn.id(), "turn finished without tool calls");
                yield ChatEvent::Done;
                return;
            }

            let calls = pending.finish();
            debug!(turn_id = %turn.id(), calls = calls.len(), "model requested tool calls");
            this.append(Message::assistant_with_tool_calls(content, &calls));

            turn.advance(TurnPhase::ToolExecution);
            for call in &calls {
                yield ChatEvent::ToolStart { name: call.name.clone() };
                yield this.resolve_call(call).await;
            }

            turn.advance(TurnPhase::AwaitingSecondTurn);
            yield ChatEvent::SecondResponseStart;

            let mut deltas = match this.client.stream(&this.request(false)).await {
                Ok(deltas) => deltas,
                Err(err) => {
                    yield this.fail(&mut turn, err);
                    return;
                }
            };

            let mut final_text = String::new();
            let mut requested_tools = false;
            while let Some(delta) = deltas.next().await {
                let delta = match delta {
                    Ok(delta) => delta,
                    Err(err) => {
                        yield this.fail(&mut turn, err);
                        return;
                    }
                };
                if let Some(text) = delta.content.filter(|text| !text.is_empty()) {
                    turn.advance(TurnPhase::StreamingFinalContent);
                    final_text.push_str(&text);
                    yield ChatEvent::content(text);
                }
                if !delta.tool_calls.is_empty() {
                    requested_tools = true;
                }
            }

            this.append(Message::assistant(final_text));
            if requested_tools {
                yield this.fail(&mut turn, follow_up_tools_error());
                return;
            }
            turn.advance(TurnPhase::Done);
            info!(turn_id = %turn.id(), tool_calls = calls.len(), "turn finished");
            yield ChatEvent::Done;
        };

        Box::pin(stream)
    }

    /// Run one turn without streaming and return the final assistant text.
    ///
    /// Tool failures are recorded exactly as in [`run`](Self::run); completion
    /// failures are returned as [`ConciergeError::Upstream`].
    pub async fn complete_turn(&self, user_text: impl Into<String>) -> Result<String> {
        let mut turn = TurnState::new();
        info!(turn_id = %turn.id(), model = %self.model, "starting non-streaming turn");
        self.append(Message::user(user_text));

        let first = self
            .client
            .complete(&self.request(true))
            .await
            .map_err(ConciergeError::into_upstream)?;
        let content = first.content.unwrap_or_default();

        if first.tool_calls.is_empty() {
            self.append(Message::assistant(content.clone()));
            turn.advance(TurnPhase::Done);
            return Ok(content);
        }

        self.append(Message::assistant_with_tool_calls(content, &first.tool_calls));
        turn.advance(TurnPhase::StreamingToolCalls);
        turn.advance(TurnPhase::ToolExecution);
        for call in &first.tool_calls {
            self.resolve_call(call).await;
        }

        turn.advance(TurnPhase::AwaitingSecondTurn);
        let second = self
            .client
            .complete(&self.request(false))
            .await
            .map_err(ConciergeError::into_upstream)?;
        let final_text = second.content.unwrap_or_default();
        self.append(Message::assistant(final_text.clone()));
        if !second.tool_calls.is_empty() {
            turn.advance(TurnPhase::Failed);
            return Err(follow_up_tools_error());
        }
        turn.advance(TurnPhase::Done);
        Ok(final_text)
    }

    /// Execute one tool call, record its `tool` message and return the outward event.
    ///
    /// Never fails: argument and handler errors become a `ToolError` event.
    async fn resolve_call(&self, call: &StoredToolCall) -> ChatEvent {
        let outcome = match ToolArguments::parse(&call.arguments) {
            Ok(args) => {
                self.registry
                    .execute(&call.name, &args, &ToolExecutionContext::for_call(&call.id))
                    .await
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(result) => {
                debug!(tool = %call.name, tool_call_id = %call.id, "tool succeeded");
                self.append(Message::tool_result(&call.id, &call.name, result.clone()));
                ChatEvent::ToolResult {
                    name: call.name.clone(),
                    result,
                }
            }
            Err(err) => {
                let error = format!("Error executing tool {}: {err}", call.name);
                warn!(tool = %call.name, tool_call_id = %call.id, error = %err, "tool failed");
                self.append(Message::tool_result(&call.id, &call.name, error.clone()));
                ChatEvent::ToolError {
                    name: call.name.clone(),
                    error,
                }
            }
        }
    }

    fn fail(&self, turn: &mut TurnState, err: ConciergeError) -> ChatEvent {
        let err = match err {
            ConciergeError::UnsupportedOperation(_) => err,
            other => other.into_upstream(),
        };
        error!(turn_id = %turn.id(), phase = %turn.phase(), error = %err, "turn failed");
        turn.advance(TurnPhase::Failed);
        ChatEvent::error(err.to_string())
    }
}

fn follow_up_tools_error() -> ConciergeError {
    ConciergeError::UnsupportedOperation("the follow-up response requested further tool calls".into())
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("model", &self.model)
            .field("registry", &self.registry)
            .finish()
    }
}
