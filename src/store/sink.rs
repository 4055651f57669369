//! Durable sinks for the conversation log.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ConciergeError, Result};
use crate::types::Message;

/// Where a conversation log is persisted.
///
/// `save` always receives the complete log; sinks rewrite in full.
pub trait HistorySink: Send + Sync {
    /// Load the persisted log. A sink with nothing stored yet returns an empty log.
    fn load(&self) -> Result<Vec<Message>>;

    /// Replace the persisted log with `messages`.
    fn save(&self, messages: &[Message]) -> Result<()>;

    /// Human-readable location, used in warnings.
    fn location(&self) -> String;
}

/// JSON file holding one array of messages.
///
/// Writes go to a sibling temp file that is then renamed over the target, so a
/// crash mid-write leaves the previous contents intact.
#[derive(Debug, Clone)]
pub struct FileHistorySink {
    path: PathBuf,
}

impl FileHistorySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "conversation_history.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persistence_error(&self, err: impl std::fmt::Display) -> ConciergeError {
        ConciergeError::Persistence {
            path: self.location(),
            message: err.to_string(),
        }
    }
}

impl HistorySink for FileHistorySink {
    fn load(&self) -> Result<Vec<Message>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.persistence_error(err)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let messages: Vec<Message> = serde_json::from_str(&raw).map_err(|e| self.persistence_error(e))?;
        for message in &messages {
            message.validate().map_err(|e| self.persistence_error(e))?;
        }
        Ok(messages)
    }

    fn save(&self, messages: &[Message]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.persistence_error(e))?;
        }
        let serialized = serde_json::to_vec_pretty(messages)?;
        let tmp = self.temp_path();
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| self.persistence_error(e))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
