use crate::models::message::Message;
use crate::models::tool::Tool;

/// Approximate characters per token for the completion models we target.
const CHARS_PER_TOKEN: usize = 4;

/// Fixed cost of a message envelope (role, separators).
pub const MESSAGE_OVERHEAD: usize = 4;
/// Fixed cost of a tool definition envelope.
pub const TOOL_OVERHEAD: usize = 8;
/// Fixed cost of each declared tool parameter.
pub const PARAMETER_OVERHEAD: usize = 3;

/// Estimates token usage without a tokenizer model.
///
/// The estimate is proportional to character count, which is enough to keep
/// requests inside the context window; it is never used for billing.
#[derive(Debug, Clone, Copy)]
pub struct TokenCounter {
    chars_per_token: usize,
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter {
    pub fn new() -> Self {
        Self {
            chars_per_token: CHARS_PER_TOKEN,
        }
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    /// How many characters fit into the given number of tokens
    pub fn chars_for_tokens(&self, tokens: usize) -> usize {
        tokens.saturating_mul(self.chars_per_token)
    }

    pub fn count_message_tokens(&self, message: &Message) -> usize {
        let calls: usize = message
            .tool_calls
            .iter()
            .map(|call| {
                self.count_tokens(&call.name) + self.count_tokens(&call.arguments.to_string())
            })
            .sum();
        self.count_tokens(&message.content) + calls + MESSAGE_OVERHEAD
    }

    pub fn count_messages_tokens(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|message| self.count_message_tokens(message))
            .sum()
    }

    pub fn count_tool_tokens(&self, tools: &[Tool]) -> usize {
        tools
            .iter()
            .map(|tool| {
                let parameters: usize = tool
                    .parameter_descriptions()
                    .map(|(name, description)| {
                        PARAMETER_OVERHEAD
                            + self.count_tokens(name)
                            + self.count_tokens(description)
                    })
                    .sum();
                TOOL_OVERHEAD
                    + self.count_tokens(&tool.name)
                    + self.count_tokens(&tool.description)
                    + parameters
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_count_tokens_rounds_up() {
        let counter = TokenCounter::new();
        assert_eq!(counter.count_tokens(""), 0);
        assert_eq!(counter.count_tokens("abc"), 1);
        assert_eq!(counter.count_tokens("abcd"), 1);
        assert_eq!(counter.count_tokens("abcde"), 2);
    }

    #[test]
    fn test_count_tokens_uses_chars_not_bytes() {
        let counter = TokenCounter::new();
        assert_eq!(counter.count_tokens("가나다라"), 1);
    }

    #[test]
    fn test_message_overhead_applies_to_empty_messages() {
        let counter = TokenCounter::new();
        assert_eq!(
            counter.count_message_tokens(&Message::assistant()),
            MESSAGE_OVERHEAD
        );
    }

    #[test]
    fn test_tool_tokens_include_parameters() {
        let counter = TokenCounter::new();
        let bare = Tool::new("scan", "Scan", json!({"type": "object"}));
        let with_param = Tool::new(
            "scan",
            "Scan",
            json!({
                "type": "object",
                "properties": {"path": {"type": "string", "description": "Directory"}}
            }),
        );

        let bare_count = counter.count_tool_tokens(&[bare]);
        let param_count = counter.count_tool_tokens(&[with_param]);
        assert_eq!(bare_count, TOOL_OVERHEAD + 1 + 1);
        assert_eq!(param_count, bare_count + PARAMETER_OVERHEAD + 1 + 3);
    }
}
