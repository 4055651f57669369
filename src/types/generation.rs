//! Generation settings sent with every completion request.

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Sampling knobs forwarded to the completion service.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub user: Option<String>,
}

impl GenerationSettings {
    /// Write the populated settings into a request body object.
    pub fn apply_to(&self, body: &mut serde_json::Map<String, serde_json::Value>) {
        if let Some(max) = self.max_tokens {
            body.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = self.temperature {
            body.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = self.top_p {
            body.insert("top_p".into(), top_p.into());
        }
        if let Some(ref user) = self.user {
            body.insert("user".into(), user.clone().into());
        }
    }
}
