//! Built-in capability systems.
//!
//! Analyzer integrations live outside this crate and register themselves
//! through the same [`System`](crate::capabilities::System) trait.
pub mod files;
pub mod shell;

pub use files::FileSystem;
pub use shell::ShellSystem;

/// Cut `text` down to at most `max_chars` characters, noting how much was dropped
pub(crate) fn truncate_output(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{}\n[... truncated {} characters]", kept, total - max_chars)
}
