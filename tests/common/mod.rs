//! Shared test helpers and a scripted completion client.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use concierge::error::{ConciergeError, Result};
use concierge::orchestrator::Orchestrator;
use concierge::provider::{CompletionClient, CompletionRequest, DeltaStream};
use concierge::session::ChatSession;
use concierge::store::ConversationStore;
use concierge::tools::{AgentTool, Tool, ToolParameters, ToolRegistry};
use concierge::types::*;

pub const SYSTEM: &str = "You are a test assistant.";

/// One scripted reply to a completion request.
pub enum Step {
    Stream(Vec<Result<CompletionDelta>>),
    OpenError(String),
    Response(CompletionResponse),
}

/// A completion client that replays queued replies and records every request.
#[derive(Default)]
pub struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    pub fn push_stream(&self, deltas: Vec<CompletionDelta>) {
        self.push(Step::Stream(deltas.into_iter().map(Ok).collect()));
    }

    /// Stream `deltas`, then break with an upstream error.
    pub fn push_broken_stream(&self, deltas: Vec<CompletionDelta>, message: &str) {
        let mut items: Vec<Result<CompletionDelta>> = deltas.into_iter().map(Ok).collect();
        items.push(Err(ConciergeError::Stream(message.to_string())));
        self.push(Step::Stream(items));
    }

    pub fn push_open_error(&self, message: &str) {
        self.push(Step::OpenError(message.to_string()));
    }

    pub fn push_response(&self, response: CompletionResponse) {
        self.push(Step::Response(response));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_step(&self, request: &CompletionRequest) -> Result<Step> {
        self.requests.lock().unwrap().push(request.clone());
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ConciergeError::Upstream("no scripted reply left".into()))
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        match self.next_step(request)? {
            Step::Response(response) => Ok(response),
            Step::OpenError(message) => Err(ConciergeError::api(503, message)),
            Step::Stream(_) => panic!("scripted a stream for a non-streaming request"),
        }
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<DeltaStream> {
        match self.next_step(request)? {
            Step::Stream(items) => Ok(futures::stream::iter(items).boxed()),
            Step::OpenError(message) => Err(ConciergeError::api(503, message)),
            Step::Response(_) => panic!("scripted a response for a streaming request"),
        }
    }
}

/// Text chunks followed by a `stop` finish.
pub fn text_deltas(chunks: &[&str]) -> Vec<CompletionDelta> {
    let mut deltas: Vec<CompletionDelta> = chunks.iter().map(|c| CompletionDelta::text(*c)).collect();
    deltas.push(CompletionDelta::finished(FinishReason::Stop));
    deltas
}

/// One complete tool call per `(id, name, arguments)`, indexed in order, then a `tool_calls` finish.
pub fn tool_call_deltas(calls: &[(&str, &str, &str)]) -> Vec<CompletionDelta> {
    let mut deltas: Vec<CompletionDelta> = calls
        .iter()
        .enumerate()
        .map(|(i, (id, name, args))| {
            CompletionDelta::fragments(vec![ToolCallFragment::new(i as u32)
                .with_id(*id)
                .with_name(*name)
                .with_arguments(*args)])
        })
        .collect();
    deltas.push(CompletionDelta::finished(FinishReason::ToolCalls));
    deltas
}

pub fn constant_tool(name: &str, reply: &'static str) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        name,
        format!("returns a fixed reply from {name}"),
        ToolParameters::empty(),
        move |_args, _ctx| async move { Ok(reply.to_string()) },
    ))
}

pub fn failing_tool(name: &str, message: &'static str) -> Arc<dyn Tool> {
    let tool_name = name.to_string();
    Arc::new(AgentTool::new(
        name,
        "always fails",
        ToolParameters::empty(),
        move |_args, _ctx| {
            let tool_name = tool_name.clone();
            async move { Err(ConciergeError::tool(tool_name, message)) }
        },
    ))
}

/// Echoes its parsed arguments back as compact JSON.
pub fn echo_tool(name: &str) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        name,
        "echoes arguments",
        ToolParameters::empty(),
        |args, _ctx| async move { Ok(args.raw().to_string()) },
    ))
}

pub fn registry(tools: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    Arc::new(registry)
}

pub fn session(client: Arc<ScriptedClient>, tools: Vec<Arc<dyn Tool>>) -> ChatSession {
    ChatSession::new(client, registry(tools), ConversationStore::in_memory(), "test-model", SYSTEM)
}

pub fn orchestrator(client: Arc<ScriptedClient>, tools: Vec<Arc<dyn Tool>>) -> Orchestrator {
    let store = ConversationStore::in_memory().shared();
    store.lock().unwrap().append(Message::system(SYSTEM));
    Orchestrator::new(client, registry(tools), store, "test-model")
}

pub async fn collect_events(mut events: concierge::orchestrator::ChatEventStream) -> Vec<ChatEvent> {
    let mut out = Vec::new();
    while let Some(event) = events.next().await {
        out.push(event);
    }
    out
}

pub fn roles(messages: &[Message]) -> Vec<Role> {
    messages.iter().map(|m| m.role).collect()
}
