//! Core types for Concierge.

pub mod events;
pub mod generation;
pub mod message;
pub mod stream;

pub use events::*;
pub use generation::*;
pub use message::*;
pub use stream::*;
