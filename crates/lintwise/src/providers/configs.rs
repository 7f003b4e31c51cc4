use std::time::Duration;

use super::ollama::{OLLAMA_HOST, OLLAMA_MODEL};

pub const DEFAULT_CONTEXT_WINDOW: usize = 8192;
pub const DEFAULT_KEEP_ALIVE: &str = "5m";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq)]
pub struct OllamaProviderConfig {
    pub host: String,
    pub model: String,
    /// Sent as `options.num_ctx`
    pub context_window: usize,
    pub keep_alive: String,
    /// Preferred delivery when no tools are offered
    pub stream: bool,
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

impl Default for OllamaProviderConfig {
    fn default() -> Self {
        Self {
            host: OLLAMA_HOST.to_string(),
            model: OLLAMA_MODEL.to_string(),
            context_window: DEFAULT_CONTEXT_WINDOW,
            keep_alive: DEFAULT_KEEP_ALIVE.to_string(),
            stream: true,
            temperature: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
