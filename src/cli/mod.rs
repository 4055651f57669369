//! Command-line surface for the `concierge` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ConciergeConfig;
use crate::types::ChatEvent;

/// Words that end the interactive loop.
pub const EXIT_WORDS: [&str; 4] = ["exit", "quit", "stop", "bye"];

/// Concierge personal assistant CLI
#[derive(Parser, Debug)]
#[command(name = "concierge", version, about = "Concierge: a tool-calling personal assistant")]
pub struct Cli {
    /// Path to a config.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Model to use (e.g. gpt-4o-mini)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Conversation history file
    #[arg(long, global = true)]
    pub history: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level CLI commands. Without one, `chat` runs.
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Interactive chat loop
    Chat,
    /// Ask a single question and print the answer
    Ask(AskArgs),
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Print recent conversation history
    History(HistoryArgs),
    /// Clear conversation history
    Clear,
}

#[derive(Parser, Debug, PartialEq)]
pub struct AskArgs {
    /// Print only the final answer instead of streaming events
    #[arg(long)]
    pub no_stream: bool,

    /// Question to ask (joined with spaces)
    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,
}

#[derive(Parser, Debug, PartialEq)]
pub struct ServeArgs {
    /// Address to bind, e.g. 127.0.0.1:8000
    #[arg(long)]
    pub addr: Option<String>,
}

#[derive(Parser, Debug, PartialEq)]
pub struct HistoryArgs {
    /// Number of most recent messages to show (0 for all)
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Chat)
    }

    /// Apply command-line flags over an already loaded config.
    pub fn apply_overrides(&self, config: &mut ConciergeConfig) {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(history) = &self.history {
            config.history_path = history.clone();
        }
        if self.debug {
            config.debug = true;
        }
        if let Some(Commands::Serve(ServeArgs { addr: Some(addr) })) = &self.command {
            config.server_addr = addr.clone();
        }
    }
}

impl AskArgs {
    pub fn prompt_text(&self) -> String {
        self.prompt.join(" ")
    }
}

pub fn is_exit_word(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    EXIT_WORDS.contains(&input.as_str())
}

/// Terminal rendering of one outward event.
pub fn render_event(event: &ChatEvent) -> String {
    match event {
        ChatEvent::Content { content } => content.clone(),
        ChatEvent::ToolStart { name } => format!("\n[TOOL] Running {name}...\n"),
        ChatEvent::ToolResult { result, .. } => format!("  {}\n", result.replace('\n', "\n  ")),
        ChatEvent::ToolError { error, .. } => format!("\n[ERROR] {error}\n"),
        ChatEvent::SecondResponseStart => "\n[ASSISTANT] ".to_string(),
        ChatEvent::Done => String::new(),
        ChatEvent::Error { error } => format!("\nError during streaming: {error}\n"),
    }
}
