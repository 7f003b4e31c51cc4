use config::{Config, Environment, File};
use lintwise::agent::AgentConfig;
use lintwise::providers::configs::{
    OllamaProviderConfig, DEFAULT_CONTEXT_WINDOW, DEFAULT_KEEP_ALIVE,
};
use lintwise::providers::ollama;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const ENV_PREFIX: &str = "LINTWISE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration value, set {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid value for {env_var}: {reason}")]
    InvalidValue { env_var: String, reason: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// `provider.host` -> `LINTWISE_PROVIDER__HOST`
pub fn to_env_var(field: &str) -> String {
    format!("{}_{}", ENV_PREFIX, field.replace('.', "__").to_uppercase())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub host: String,
    pub model: String,
    pub context_window: usize,
    pub keep_alive: String,
    pub stream: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    pub max_iterations: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolSettings {
    pub root: String,
    pub command_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub agent: AgentSettings,
    pub tools: ToolSettings,
}

impl Settings {
    /// Defaults, then `~/.config/lintwise/config.toml`, then `LINTWISE_*` variables
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(default_config_file().as_deref())
    }

    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Provider defaults
            .set_default("provider.host", ollama::OLLAMA_HOST)?
            .set_default("provider.model", ollama::OLLAMA_MODEL)?
            .set_default("provider.context_window", DEFAULT_CONTEXT_WINDOW as i64)?
            .set_default("provider.keep_alive", DEFAULT_KEEP_ALIVE)?
            .set_default("provider.stream", true)?
            .set_default("provider.timeout_secs", 600)?
            // Agent defaults
            .set_default("agent.max_iterations", 10)?
            // Tool defaults
            .set_default("tools.root", ".")?
            .set_default("tools.command_timeout_secs", 60)?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path.to_path_buf()).required(false));
        }

        let config = builder
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);

            let error_str = err.to_string();
            if error_str.starts_with("missing field") {
                // "missing field `model`"
                let field = error_str
                    .trim_start_matches("missing field `")
                    .trim_end_matches('`');
                return ConfigError::MissingEnvVar {
                    env_var: to_env_var(field),
                };
            }
            if let config::ConfigError::NotFound(field) = &err {
                return ConfigError::MissingEnvVar {
                    env_var: to_env_var(field),
                };
            }
            if let config::ConfigError::Type { key: Some(key), .. } = &err {
                return ConfigError::InvalidValue {
                    env_var: to_env_var(key),
                    reason: error_str,
                };
            }
            ConfigError::Other(err)
        })?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                env_var: to_env_var("agent.max_iterations"),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.provider.context_window == 0 {
            return Err(ConfigError::InvalidValue {
                env_var: to_env_var("provider.context_window"),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.provider.host.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("provider.host"),
            });
        }
        Ok(())
    }

    pub fn provider_config(&self) -> OllamaProviderConfig {
        OllamaProviderConfig {
            host: self.provider.host.clone(),
            model: self.provider.model.clone(),
            context_window: self.provider.context_window,
            keep_alive: self.provider.keep_alive.clone(),
            stream: self.provider.stream,
            temperature: self.provider.temperature,
            timeout: Duration::from_secs(self.provider.timeout_secs),
        }
    }

    /// The context budget follows the window the model is loaded with
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.agent.max_iterations,
            max_context_tokens: self.provider.context_window,
            system_prompt: self.agent.system_prompt.clone(),
        }
    }

    pub fn tools_root(&self) -> PathBuf {
        PathBuf::from(self.tools.root.as_str())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.command_timeout_secs)
    }
}

pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("lintwise"))
}

fn default_config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("LINTWISE_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();

        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.provider.host, "http://localhost:11434");
        assert_eq!(settings.provider.model, "qwen2.5");
        assert_eq!(settings.provider.context_window, 8192);
        assert_eq!(settings.provider.keep_alive, "5m");
        assert!(settings.provider.stream);
        assert_eq!(settings.provider.temperature, None);
        assert_eq!(settings.agent.max_iterations, 10);
        assert_eq!(settings.tools.root, ".");
        assert_eq!(settings.command_timeout(), Duration::from_secs(60));

        let agent = settings.agent_config();
        assert_eq!(agent.max_iterations, 10);
        assert_eq!(agent.max_context_tokens, 8192);
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("LINTWISE_PROVIDER__HOST", "http://gpu-box:11434");
        env::set_var("LINTWISE_PROVIDER__MODEL", "llama3.1");
        env::set_var("LINTWISE_PROVIDER__STREAM", "false");
        env::set_var("LINTWISE_PROVIDER__TEMPERATURE", "0.2");
        env::set_var("LINTWISE_AGENT__MAX_ITERATIONS", "4");

        let settings = Settings::load(None).unwrap();
        let provider = settings.provider_config();
        assert_eq!(provider.host, "http://gpu-box:11434");
        assert_eq!(provider.model, "llama3.1");
        assert!(!provider.stream);
        assert_eq!(provider.temperature, Some(0.2));
        assert_eq!(settings.agent.max_iterations, 4);

        clean_env();
    }

    #[test]
    #[serial]
    fn test_config_file_layer() {
        clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[provider]\nmodel = \"codellama\"\ncontext_window = 16384\n\n[tools]\nroot = \"/srv/project\"\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.provider.model, "codellama");
        assert_eq!(settings.agent_config().max_context_tokens, 16384);
        assert_eq!(settings.tools_root(), PathBuf::from("/srv/project"));
        assert_eq!(settings.provider.host, "http://localhost:11434");

        // the environment wins over the file
        env::set_var("LINTWISE_PROVIDER__MODEL", "qwen2.5-coder");
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.provider.model, "qwen2.5-coder");

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_config_file_is_ignored() {
        clean_env();
        let settings = Settings::load(Some(Path::new("/nonexistent/lintwise/config.toml")));
        assert!(settings.is_ok());
    }

    #[test]
    #[serial]
    fn test_invalid_values_name_the_variable() {
        clean_env();
        env::set_var("LINTWISE_AGENT__MAX_ITERATIONS", "0");

        match Settings::load(None) {
            Err(ConfigError::InvalidValue { env_var, .. }) => {
                assert_eq!(env_var, "LINTWISE_AGENT__MAX_ITERATIONS")
            }
            other => panic!("expected invalid value, got {:?}", other),
        }

        env::set_var("LINTWISE_AGENT__MAX_ITERATIONS", "lots");
        assert!(Settings::load(None).is_err());

        clean_env();
    }

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("provider.host"), "LINTWISE_PROVIDER__HOST");
        assert_eq!(
            to_env_var("tools.command_timeout_secs"),
            "LINTWISE_TOOLS__COMMAND_TIMEOUT_SECS"
        );
    }
}
