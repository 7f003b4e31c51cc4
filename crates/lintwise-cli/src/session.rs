use anyhow::Result;
use futures::StreamExt;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::prompt::{InputType, Prompt};
use lintwise::agent::Agent;
use lintwise::models::message::Message;

pub mod session_file;

use session_file::{persist_messages, read_messages};

pub struct Session<'a> {
    agent: Agent,
    prompt: Box<dyn Prompt + 'a>,
    session_file: PathBuf,
    messages: Vec<Message>,
}

impl<'a> Session<'a> {
    /// Open a session, picking up any conversation already recorded in `session_file`
    pub fn new(agent: Agent, prompt: Box<dyn Prompt + 'a>, session_file: PathBuf) -> Result<Self> {
        let messages = read_messages(&session_file)?;
        Ok(Session {
            agent,
            prompt,
            session_file,
            messages,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        self.setup_session();

        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = input.content {
                        self.process(&content).await;
                    }
                }
                InputType::Exit => break,
                InputType::AskAgain => continue,
            }
        }
        self.close_session();
        Ok(())
    }

    pub async fn headless_start(&mut self, initial_message: &str) -> Result<()> {
        self.prompt.notice(&format!(
            "Recording to {}",
            self.session_file.display()
        ));
        self.process(initial_message).await;
        self.prompt.close();
        Ok(())
    }

    /// Run one reply to completion. Ctrl-C cancels the reply, not the session.
    async fn process(&mut self, text: &str) {
        let cancel = CancellationToken::new();
        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);

        {
            let mut events = self.agent.reply(&mut self.messages, text, cancel.clone());
            loop {
                tokio::select! {
                    event = events.next() => match event {
                        Some(event) => self.prompt.render(&event),
                        None => break,
                    },
                    _ = &mut interrupt, if !cancel.is_cancelled() => {
                        tracing::info!("interrupt received, cancelling the reply");
                        cancel.cancel();
                        self.prompt.notice("Interrupt: cancelling the current request...");
                    }
                }
            }
        }
        self.prompt.hide_busy();

        if let Err(e) = persist_messages(&self.session_file, &self.messages) {
            eprintln!("Failed to persist messages: {}", e);
        }
    }

    fn setup_session(&mut self) {
        let resumed = if self.messages.is_empty() {
            String::new()
        } else {
            format!(" ({} messages resumed)", self.messages.len())
        };
        self.prompt.notice(&format!(
            "Starting session. Recording to {}{}",
            self.session_file.display(),
            resumed
        ));

        for system in self.agent.registry().systems() {
            self.prompt
                .notice(&format!("Connected the {} system.", system.name()));
        }

        self.prompt.ready();
    }

    fn close_session(&mut self) {
        self.prompt.notice(&format!(
            "Closing session. Recorded to {}",
            self.session_file.display()
        ));
        self.prompt.close();
    }
}
