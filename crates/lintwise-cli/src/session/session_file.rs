use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use lintwise::models::message::Message;

use crate::configuration::config_dir;

pub fn ensure_session_dir() -> Result<PathBuf> {
    let session_dir = config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
        .join("sessions");

    if !session_dir.exists() {
        fs::create_dir_all(&session_dir)
            .with_context(|| format!("Failed to create {}", session_dir.display()))?;
    }

    Ok(session_dir)
}

pub fn session_path(session_dir: &Path, name: &str) -> PathBuf {
    session_dir.join(format!("{}.jsonl", name))
}

/// The most recently written session in `session_dir`
pub fn latest_session(session_dir: &Path) -> Result<Option<PathBuf>> {
    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(session_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        if latest.as_ref().map_or(true, |(time, _)| modified > *time) {
            latest = Some((modified, path));
        }
    }
    Ok(latest.map(|(_, path)| path))
}

/// Read a session back; a missing file is an empty conversation
pub fn read_messages(session_file: &Path) -> Result<Vec<Message>> {
    if !session_file.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(session_file)
        .with_context(|| format!("Failed to open session file {}", session_file.display()))?;

    let mut messages = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let message: Message = serde_json::from_str(&line).with_context(|| {
            format!("Invalid message on line {} of {}", number + 1, session_file.display())
        })?;
        messages.push(message);
    }
    Ok(messages)
}

pub fn persist_messages(session_file: &Path, messages: &[Message]) -> Result<()> {
    let file = File::create(session_file)?; // Create or truncate the file
    let mut writer = std::io::BufWriter::new(file);

    for message in messages {
        serde_json::to_writer(&mut writer, &message)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}
