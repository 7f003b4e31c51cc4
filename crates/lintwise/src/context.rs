//! Keeps the request sent to the model inside the configured context window.
use tracing::{debug, warn};

use crate::models::message::Message;
use crate::models::role::Role;
use crate::token_counter::TokenCounter;

/// Tokens left free for the model's answer.
pub const RESPONSE_RESERVE: usize = 1000;
/// Slack for the inaccuracy of the token estimate.
pub const SAFETY_BUFFER: usize = 200;

/// Tokens available to messages once tools, the response and the safety margin are paid for
pub fn context_budget(max_context_tokens: usize, capability_tokens: usize) -> usize {
    max_context_tokens
        .saturating_sub(capability_tokens)
        .saturating_sub(RESPONSE_RESERVE)
        .saturating_sub(SAFETY_BUFFER)
}

/// Drop the oldest history so the messages fit the budget.
///
/// The first message (system prompt) and the last message are always kept and
/// the relative order of survivors is preserved. When the last message is a
/// tool result, the assistant message that issued its call and the sibling
/// results are kept with it as one block. When the first message and that
/// block alone are over budget, the first message is truncated and nothing
/// else is returned.
pub fn prune_messages(
    messages: &[Message],
    max_context_tokens: usize,
    capability_tokens: usize,
) -> Vec<Message> {
    if messages.len() <= 2 {
        return messages.to_vec();
    }

    let counter = TokenCounter::new();
    let budget = context_budget(max_context_tokens, capability_tokens);
    let first = &messages[0];
    let tail = &messages[tail_start(messages)..];
    let tail_cost = counter.count_messages_tokens(tail);
    let required = counter.count_message_tokens(first) + tail_cost;

    if required > budget {
        let allowance = budget
            .saturating_sub(tail_cost)
            .saturating_sub(crate::token_counter::MESSAGE_OVERHEAD);
        let max_chars = counter.chars_for_tokens(allowance);
        warn!(
            budget,
            required, max_chars, "system prompt and latest message exceed the context budget"
        );

        let mut truncated = first.clone();
        truncated.content = first.content.chars().take(max_chars).collect();
        let mut pruned = Vec::with_capacity(tail.len() + 1);
        pruned.push(truncated);
        pruned.extend_from_slice(tail);
        return pruned;
    }

    let history = &messages[1..messages.len() - tail.len()];
    let mut used = required;
    let mut kept = 0;
    for message in history.iter().rev() {
        let cost = counter.count_message_tokens(message);
        if used + cost > budget {
            break;
        }
        used += cost;
        kept += 1;
    }

    // A tool result whose assistant call was pruned would be orphaned
    let mut start = history.len() - kept;
    while start < history.len() && history[start].role == Role::Tool {
        start += 1;
    }

    if start > 0 {
        debug!(
            dropped = start,
            kept = history.len() - start,
            budget,
            "pruned conversation history"
        );
    }

    let mut pruned = Vec::with_capacity(history.len() - start + tail.len() + 1);
    pruned.push(first.clone());
    pruned.extend_from_slice(&history[start..]);
    pruned.extend_from_slice(tail);
    pruned
}

/// Index where the block that must survive with the last message begins.
///
/// A trailing tool result reaches back to the assistant message carrying its
/// call. Without such a message only the last message is required.
fn tail_start(messages: &[Message]) -> usize {
    let last = messages.len() - 1;
    if messages[last].role != Role::Tool {
        return last;
    }
    let Some(call_id) = messages[last].tool_call_id.as_deref() else {
        return last;
    };

    messages[1..last]
        .iter()
        .rposition(|m| {
            m.role == Role::Assistant && m.tool_calls.iter().any(|call| call.id == call_id)
        })
        .map_or(last, |index| index + 1)
}
