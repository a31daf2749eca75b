//! Rough token accounting for compaction decisions.

use chainloom_core::message::Message;

const CHARS_PER_TOKEN: usize = 4;

/// Role marker and delimiters each message costs on top of its text.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Counts characters rather than bytes so CJK text is not overestimated.
pub fn text_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

pub fn message_tokens(message: &Message) -> usize {
    let call = message
        .tool_call
        .as_ref()
        .map_or(0, |call| text_tokens(&call.name) + text_tokens(&call.input));
    MESSAGE_OVERHEAD + text_tokens(&message.content) + call
}

pub fn messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(message_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainloom_core::message::ToolInvocation;

    #[test]
    fn text_rounds_up() {
        assert_eq!(text_tokens(""), 0);
        assert_eq!(text_tokens("four"), 1);
        assert_eq!(text_tokens("hello"), 2);
    }

    #[test]
    fn multibyte_text_counts_characters() {
        // 4 characters, 12 bytes
        assert_eq!(text_tokens("物流太慢"), 1);
    }

    #[test]
    fn tool_results_include_the_call() {
        let msg = Message::tool_result(ToolInvocation::new("time", "utc!"), "");
        assert_eq!(message_tokens(&msg), MESSAGE_OVERHEAD + 2);
    }

    #[test]
    fn sums_over_messages() {
        let msgs = [Message::user("hello"), Message::assistant("hi")];
        assert_eq!(messages_tokens(&msgs), (MESSAGE_OVERHEAD + 2) + (MESSAGE_OVERHEAD + 1));
    }
}
