//! Concierge: a streaming, tool-calling personal assistant.
//!
//! Relays user messages to an OpenAI-compatible completion service, lets the
//! model call registered tools, and streams the merged two-round answer back
//! as [`ChatEvent`](types::ChatEvent)s while keeping a durable conversation log.
//!
//! # Quick Start
//!
//! ```no_run
//! use concierge::prelude::*;
//! use futures::StreamExt;
//!
//! # async fn example() -> concierge::error::Result<()> {
//! let config = ConciergeConfig::load(None)?;
//! let session = ChatSession::from_config(&config)?;
//! let mut events = session.stream_chat("What day is it tomorrow?");
//! while let Some(event) = events.next().await {
//!     if let ChatEvent::Content { content } = event {
//!         print!("{content}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod store;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;
