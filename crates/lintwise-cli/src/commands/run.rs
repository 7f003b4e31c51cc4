use anyhow::Result;

use crate::configuration::Settings;

/// Answer a single request without an interactive prompt
pub async fn execute(settings: &Settings, prompt: &str, name: Option<String>) -> Result<()> {
    let resume = name.is_some();
    let mut session = super::session::build_session(settings, name, resume)?;
    session.headless_start(prompt).await
}
