//! Configuration system (layered: defaults < TOML file < environment < CLI flags).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConciergeError, Result};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEZONE: &str = "Europe/Rome";
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";
pub const HISTORY_FILE_NAME: &str = "conversation_history.json";

/// Instructions seeded as the first message of every fresh conversation.
pub const DEFAULT_SYSTEM_INSTRUCTIONS: &str = "\
You are an intelligent personal assistant designed to help with daily tasks.
You have access to various tools including email, calendar, and more.
Always be concise and helpful. If you need any clarification, ask.
When managing time, always use the user's timezone (Europe/Rome by default).
If you need to use multiple tools to complete a task, do so in logical sequence.
When displaying emails, preserve the exact formatting from the email tools, including the [EMAIL] markers and emojis.
Do not add any additional formatting or headers to the email output.";

/// Resolved runtime configuration.
#[derive(Clone, PartialEq)]
pub struct ConciergeConfig {
    pub api_key: Option<String>,
    /// Completion service base URL; `None` means the public OpenAI endpoint.
    pub base_url: Option<String>,
    pub model: String,
    pub system_instructions: String,
    pub history_path: PathBuf,
    /// IANA timezone name used by the date tools.
    pub timezone: String,
    pub server_addr: String,
    pub allowed_origin: String,
    pub debug: bool,
}

impl fmt::Debug for ConciergeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConciergeConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("history_path", &self.history_path)
            .field("timezone", &self.timezone)
            .field("server_addr", &self.server_addr)
            .field("allowed_origin", &self.allowed_origin)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Default for ConciergeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            system_instructions: DEFAULT_SYSTEM_INSTRUCTIONS.to_string(),
            history_path: default_history_path(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            debug: false,
        }
    }
}

/// Keys accepted in `config.toml`. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    system_instructions: Option<String>,
    history_path: Option<PathBuf>,
    timezone: Option<String>,
    server_addr: Option<String>,
    allowed_origin: Option<String>,
    debug: Option<bool>,
}

impl ConciergeConfig {
    /// Defaults, then the config file, then `.env` and the process environment.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        match path {
            Some(path) => config.merge_file(path)?,
            None => {
                if let Some(default) = default_config_path().filter(|p| p.exists()) {
                    config.merge_file(&default)?;
                }
            }
        }
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Defaults overlaid with `.env` and the process environment only.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlay values from a TOML file.
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConciergeError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        self.merge_toml(&raw)
            .map_err(|e| ConciergeError::Configuration(format!("{}: {e}", path.display())))
    }

    fn merge_toml(&mut self, raw: &str) -> std::result::Result<(), toml::de::Error> {
        let file: FileConfig = toml::from_str(raw)?;
        if file.api_key.is_some() {
            self.api_key = file.api_key;
        }
        if file.base_url.is_some() {
            self.base_url = file.base_url;
        }
        if let Some(model) = file.model {
            self.model = model;
        }
        if let Some(instructions) = file.system_instructions {
            self.system_instructions = instructions;
        }
        if let Some(path) = file.history_path {
            self.history_path = path;
        }
        if let Some(timezone) = file.timezone {
            self.timezone = timezone;
        }
        if let Some(addr) = file.server_addr {
            self.server_addr = addr;
        }
        if let Some(origin) = file.allowed_origin {
            self.allowed_origin = origin;
        }
        if let Some(debug) = file.debug {
            self.debug = debug;
        }
        Ok(())
    }

    /// Overlay environment variables read through `lookup`. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(model) = var("CONCIERGE_MODEL") {
            self.model = model;
        }
        if let Some(path) = var("CONCIERGE_HISTORY_FILE") {
            self.history_path = PathBuf::from(path);
        }
        if let Some(timezone) = var("CONCIERGE_TIMEZONE") {
            self.timezone = timezone;
        }
        if let Some(addr) = var("CONCIERGE_SERVER_ADDR") {
            self.server_addr = addr;
        }
        if let Some(debug) = var("CONCIERGE_DEBUG") {
            self.debug = matches!(debug.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    /// Parsed timezone.
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse()
            .map_err(|_| ConciergeError::Configuration(format!("unknown timezone '{}'", self.timezone)))
    }

    /// Check that everything needed to talk to the completion service is present.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(ConciergeError::Configuration(
                "OpenAI API Key is required (set OPENAI_API_KEY)".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConciergeError::Configuration("model must not be empty".to_string()));
        }
        self.tz()?;
        Ok(())
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "concierge")
}

/// `<config dir>/config.toml`, when a home directory can be found.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// `<data dir>/conversation_history.json`, or `data/conversation_history.json`.
pub fn default_history_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(HISTORY_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from("data").join(HISTORY_FILE_NAME))
}
