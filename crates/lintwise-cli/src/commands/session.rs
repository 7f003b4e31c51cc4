use anyhow::{Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;

use lintwise::agent::Agent;
use lintwise::capabilities::CapabilityRegistry;
use lintwise::providers::ollama::OllamaProvider;
use lintwise::systems::{FileSystem, ShellSystem};

use crate::configuration::Settings;
use crate::prompt::rustyline::RustylinePrompt;
use crate::session::session_file::{ensure_session_dir, latest_session, session_path};
use crate::session::Session;

pub fn build_agent(settings: &Settings) -> Result<Agent> {
    let provider = OllamaProvider::new(settings.provider_config())
        .context("Failed to create the Ollama client")?;

    let root = settings.tools_root();
    let registry = CapabilityRegistry::new()
        .with_system(Arc::new(FileSystem::new(root.clone())))
        .with_system(Arc::new(
            ShellSystem::new(root).with_timeout(settings.command_timeout()),
        ));

    Ok(Agent::new(Box::new(provider), registry).with_config(settings.agent_config()))
}

pub fn build_session<'a>(
    settings: &Settings,
    name: Option<String>,
    resume: bool,
) -> Result<Session<'a>> {
    let session_dir = ensure_session_dir()?;
    let session_file = resolve_session_file(&session_dir, name, resume)?;

    if !resume && session_file.exists() {
        anyhow::bail!(
            "Session {} already exists, pass --resume to continue it",
            session_file.display()
        );
    }

    let agent = build_agent(settings)?;
    let prompt = RustylinePrompt::new()?;
    Session::new(agent, Box::new(prompt), session_file)
}

fn resolve_session_file(
    session_dir: &std::path::Path,
    name: Option<String>,
    resume: bool,
) -> Result<PathBuf> {
    match (name, resume) {
        (Some(name), _) => Ok(session_path(session_dir, &name)),
        (None, true) => latest_session(session_dir)?
            .ok_or_else(|| anyhow::anyhow!("No session to resume in {}", session_dir.display())),
        (None, false) => Ok(session_path(session_dir, &generate_session_name())),
    }
}

fn generate_session_name() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

pub async fn execute(settings: &Settings, name: Option<String>, resume: bool) -> Result<()> {
    let mut session = build_session(settings, name, resume)?;
    session.start().await
}
