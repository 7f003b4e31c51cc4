use anyhow::Result;
use lintwise::models::event::AgentEvent;

pub mod rustyline;
pub mod thinking;

pub trait Prompt {
    /// Show one event of a reply
    fn render(&mut self, event: &AgentEvent);
    /// Show a line of session bookkeeping
    fn notice(&mut self, text: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn close(&self);
    fn ready(&self) {
        println!("\n");
        println!("lintwise is running! Ask for a review, a lint pass or a fix.");
        println!("\n");
    }
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // None when the user issued a command such as /exit
}

pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}

pub enum Theme {
    Light,
    Dark,
}
