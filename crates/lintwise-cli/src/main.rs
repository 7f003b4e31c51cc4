use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod configuration;
mod prompt;
mod session;

use configuration::Settings;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ollama host (overrides LINTWISE_PROVIDER__HOST)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Model to use (overrides LINTWISE_PROVIDER__MODEL)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Always wait for complete responses instead of streaming them
    #[arg(long, global = true)]
    no_stream: bool,

    /// Completion round trips allowed per request
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start or resume an interactive session
    #[command(about = "Start or resume an interactive session")]
    Session {
        /// Name for the session
        #[arg(short, long)]
        name: Option<String>,

        /// Resume the named session, or the latest one when no name is given
        #[arg(short, long, default_value_t = false)]
        resume: bool,
    },
    /// Answer a single request and exit
    #[command(about = "Answer a single request and exit")]
    Run {
        /// The request to send
        prompt: String,

        /// Record into (and continue) this session
        #[arg(short, long)]
        name: Option<String>,
    },
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.provider.host = host.clone();
        }
        if let Some(model) = &self.model {
            settings.provider.model = model.clone();
        }
        if self.no_stream {
            settings.provider.stream = false;
        }
        if let Some(max_iterations) = self.max_iterations {
            settings.agent.max_iterations = max_iterations.max(1);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("LINTWISE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut settings = Settings::new()?;
    cli.apply(&mut settings);
    tracing::debug!(?settings, "loaded settings");

    match cli.command {
        Some(Command::Session { name, resume }) => {
            commands::session::execute(&settings, name, resume).await
        }
        Some(Command::Run { prompt, name }) => {
            commands::run::execute(&settings, &prompt, name).await
        }
        None => commands::session::execute(&settings, None, false).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_flags_override_settings() {
        for (key, _) in std::env::vars() {
            if key.starts_with("LINTWISE_") {
                std::env::remove_var(&key);
            }
        }
        let cli = Cli::parse_from([
            "lintwise",
            "run",
            "--model",
            "llama3.1",
            "--no-stream",
            "--max-iterations",
            "3",
            "check src/",
        ]);
        let mut settings = Settings::load(None).unwrap();
        cli.apply(&mut settings);

        assert_eq!(settings.provider.model, "llama3.1");
        assert!(!settings.provider.stream);
        assert_eq!(settings.agent_config().max_iterations, 3);
        assert_eq!(settings.provider.host, "http://localhost:11434");
        assert!(matches!(
            cli.command,
            Some(Command::Run { ref prompt, .. }) if prompt == "check src/"
        ));
    }
}
