//! Agent role routing.

use strum::{Display, EnumIter, EnumString};

/// Specialised handler a request could be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum AgentRole {
    Router,
    Calendar,
    Email,
    General,
}

impl AgentRole {
    pub fn description(self) -> &'static str {
        match self {
            AgentRole::Router => {
                "You analyze user requests and determine which specialized agent should handle them."
            }
            AgentRole::Calendar => "You specialize in managing calendar events and scheduling.",
            AgentRole::Email => "You specialize in reading and analyzing emails.",
            AgentRole::General => {
                "You handle general inquiries and tasks that don't fit other specialized roles."
            }
        }
    }
}

/// Pick the handler for `text`. Every request currently goes to [`AgentRole::General`].
pub fn route(_text: &str) -> AgentRole {
    AgentRole::General
}
