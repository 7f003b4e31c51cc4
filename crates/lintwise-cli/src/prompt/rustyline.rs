use std::{
    collections::HashMap,
    io::{self, Write},
};

use anyhow::Result;
use bat::WrappingMode;
use cliclack::spinner;
use console::style;
use lintwise::models::event::{AgentEvent, TerminalKind};
use lintwise::models::tool::ToolResult;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;

use super::{thinking::get_random_thinking_message, Input, InputType, Prompt, Theme};

const PROMPT: &str = "\x1b[1m\x1b[38;5;30m(lw)> \x1b[0m";
const MAX_STRING_LENGTH: usize = 40;
const MAX_OUTPUT_LINES: usize = 20;
const INDENT: &str = "    ";

pub struct RustylinePrompt {
    editor: DefaultEditor,
    spinner: Option<cliclack::ProgressBar>,
    theme: Theme,
    renderers: HashMap<String, Box<dyn ToolRenderer>>,
    /// Content fragments of the current answer were printed as they arrived
    streamed: bool,
}

impl RustylinePrompt {
    pub fn new() -> Result<Self> {
        let mut renderers: HashMap<String, Box<dyn ToolRenderer>> = HashMap::new();
        let default_renderer = DefaultRenderer;
        renderers.insert(default_renderer.tool_name(), Box::new(default_renderer));
        let command_renderer = CommandRenderer;
        renderers.insert(command_renderer.tool_name(), Box::new(command_renderer));

        Ok(RustylinePrompt {
            editor: DefaultEditor::new()?,
            spinner: None,
            theme: Theme::Dark,
            renderers,
            streamed: false,
        })
    }

    fn theme_name(&self) -> &'static str {
        match self.theme {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }

    fn renderer(&self, name: &str) -> &dyn ToolRenderer {
        self.renderers
            .get(name)
            .unwrap_or(&self.renderers["default"])
            .as_ref()
    }

    fn finish_answer(&mut self, content: &str) {
        if self.streamed {
            print_newline();
        } else if !content.is_empty() {
            print_markdown(content, self.theme_name());
        }
        self.streamed = false;
    }
}

/// Implement the ToolRenderer trait for each tool that you want to render in the prompt.
trait ToolRenderer {
    fn tool_name(&self) -> String;
    fn request(&self, name: &str, arguments: &Value);
    fn response(&self, result: &ToolResult, theme: &str);
}

struct DefaultRenderer;

impl ToolRenderer for DefaultRenderer {
    fn tool_name(&self) -> String {
        "default".to_string()
    }

    fn request(&self, name: &str, arguments: &Value) {
        print_request_header(name);
        print_params(arguments, 0);
        print_newline();
    }

    fn response(&self, result: &ToolResult, theme: &str) {
        default_response_renderer(result, theme);
    }
}

struct CommandRenderer;

impl ToolRenderer for CommandRenderer {
    fn tool_name(&self) -> String {
        "run_command".to_string()
    }

    fn request(&self, name: &str, arguments: &Value) {
        print_request_header(name);
        match arguments.get("command") {
            Some(Value::String(s)) => {
                println!("{}: {}", style("command").dim(), style(s).green());
            }
            _ => print_params(arguments, 0),
        }
        print_newline();
    }

    fn response(&self, result: &ToolResult, theme: &str) {
        default_response_renderer(result, theme);
    }
}

fn default_response_renderer(result: &ToolResult, theme: &str) {
    if !result.success {
        let error = result.error.as_deref().unwrap_or("unknown error");
        println!("{} {}", style("✗").red(), style(error).red());
        print_newline();
        return;
    }

    let lines: Vec<&str> = result.content.lines().collect();
    if lines.len() > MAX_OUTPUT_LINES {
        print(&lines[..MAX_OUTPUT_LINES].join("\n"), theme);
        println!(
            "{}",
            style(format!("... {} more lines", lines.len() - MAX_OUTPUT_LINES)).dim()
        );
    } else if !lines.is_empty() {
        print(&result.content, theme);
    }
    print_newline();
}

fn print_request_header(name: &str) {
    let tool_header = format!("─── {} ──────────────────────────", style(name).magenta());
    print_newline();
    println!("{}", tool_header);
}

fn print_markdown(content: &str, theme: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    if printed.is_err() {
        println!("{}", content);
    }
}

fn print(content: &str, theme: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .wrapping_mode(WrappingMode::Character)
        .print();
    if printed.is_err() {
        println!("{}", style(content).dim());
    }
}

/// Format and print parameters recursively with proper indentation and colors
fn print_params(value: &Value, depth: usize) {
    let indent = INDENT.repeat(depth);

    match value {
        Value::Object(map) => {
            for (key, val) in map {
                match val {
                    Value::Object(_) => {
                        println!("{}{}:", indent, style(key).dim());
                        print_params(val, depth + 1);
                    }
                    Value::Array(arr) => {
                        println!("{}{}:", indent, style(key).dim());
                        for item in arr.iter() {
                            println!("{}{}- ", indent, INDENT);
                            print_params(item, depth + 2);
                        }
                    }
                    Value::String(s) => {
                        if s.len() > MAX_STRING_LENGTH {
                            println!("{}{}: {}", indent, style(key).dim(), style("...").dim());
                        } else {
                            println!("{}{}: {}", indent, style(key).dim(), style(s).green());
                        }
                    }
                    Value::Number(n) => {
                        println!("{}{}: {}", indent, style(key).dim(), style(n).blue());
                    }
                    Value::Bool(b) => {
                        println!("{}{}: {}", indent, style(key).dim(), style(b).blue());
                    }
                    Value::Null => {
                        println!("{}{}: {}", indent, style(key).dim(), style("null").dim());
                    }
                }
            }
        }
        Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                println!("{}{}.", indent, i + 1);
                print_params(item, depth + 1);
            }
        }
        Value::String(s) => {
            if s.len() > MAX_STRING_LENGTH {
                println!(
                    "{}{}",
                    indent,
                    style(format!("[{} chars]", s.len())).yellow()
                );
            } else {
                println!("{}{}", indent, style(s).green());
            }
        }
        Value::Number(n) => println!("{}{}", indent, style(n).yellow()),
        Value::Bool(b) => println!("{}{}", indent, style(b).yellow()),
        Value::Null => println!("{}{}", indent, style("null").dim()),
    }
}

fn print_newline() {
    println!();
}

impl Prompt for RustylinePrompt {
    fn render(&mut self, event: &AgentEvent) {
        if !matches!(event, AgentEvent::Thinking { .. }) {
            self.hide_busy();
        }

        match event {
            AgentEvent::Thinking { .. } => self.show_busy(),
            AgentEvent::Content { text } => {
                self.streamed = true;
                print!("{}", text);
            }
            AgentEvent::CapabilityStart {
                name, arguments, ..
            } => self.renderer(name).request(name, arguments),
            AgentEvent::CapabilityDone { name, result, .. } => {
                self.renderer(name).response(result, self.theme_name())
            }
            AgentEvent::Done { content } => self.finish_answer(content),
            AgentEvent::Error {
                kind,
                message,
                content,
            } => {
                self.finish_answer(content);
                match kind {
                    TerminalKind::Cancelled => println!("{}", style(message).yellow()),
                    TerminalKind::MaxIterations => println!(
                        "{} {}",
                        style(message).yellow(),
                        style("(ask again to let it continue)").dim()
                    ),
                    TerminalKind::Failed => {
                        println!("{} {}", style("Error:").red().bold(), message)
                    }
                }
            }
        }

        let _ = io::stdout().flush();
    }

    fn notice(&mut self, text: &str) {
        self.hide_busy();
        println!("{}", style(text).dim());
    }

    fn show_busy(&mut self) {
        self.hide_busy();
        let spinner = spinner();
        spinner.start(format!("{}...", get_random_thinking_message()));
        self.spinner = Some(spinner);
    }

    fn hide_busy(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop("");
        }
    }

    fn get_input(&mut self) -> Result<Input> {
        let input = self.editor.readline(PROMPT);
        let message_text = match input {
            Ok(text) => text,
            Err(e) => {
                match e {
                    ReadlineError::Interrupted | ReadlineError::Eof => (),
                    _ => eprintln!("Input error: {}", e),
                }
                return Ok(Input {
                    input_type: InputType::Exit,
                    content: None,
                });
            }
        };
        let message_text = message_text.trim().to_string();
        if message_text.is_empty() {
            return Ok(Input {
                input_type: InputType::AskAgain,
                content: None,
            });
        }
        let _ = self.editor.add_history_entry(message_text.as_str());

        if message_text.eq_ignore_ascii_case("/exit") || message_text.eq_ignore_ascii_case("/quit")
        {
            Ok(Input {
                input_type: InputType::Exit,
                content: None,
            })
        } else if message_text.eq_ignore_ascii_case("/t") {
            self.theme = match self.theme {
                Theme::Light => {
                    println!("Switching to Dark theme");
                    Theme::Dark
                }
                Theme::Dark => {
                    println!("Switching to Light theme");
                    Theme::Light
                }
            };
            Ok(Input {
                input_type: InputType::AskAgain,
                content: None,
            })
        } else if message_text.eq_ignore_ascii_case("/?")
            || message_text.eq_ignore_ascii_case("/help")
        {
            println!("Commands:");
            println!("/exit - Exit the session");
            println!("/t - Toggle Light/Dark theme");
            println!("/? | /help - Display this help message");
            println!("Ctrl+C - Cancel the running request (the conversation is kept)");
            Ok(Input {
                input_type: InputType::AskAgain,
                content: None,
            })
        } else {
            Ok(Input {
                input_type: InputType::Message,
                content: Some(message_text),
            })
        }
    }

    fn close(&self) {
        // No cleanup required
    }
}
