//! Per-chatbot usage statistics
//!
//! Pure aggregation over a chatbot's message history. System messages are left
//! out of the visible counts but their tokens still count toward the total.

use serde::Serialize;

use crate::core::db::models::{Message, MessageRole};

/// Usage figures derived from one chatbot's messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    pub user_messages: i64,
    pub assistant_messages: i64,
    pub total_messages: i64,
    pub total_tokens_used: i64,
    /// Mean latency of timed assistant replies, truncated to whole milliseconds
    pub average_response_time: i64,
}

impl UsageStats {
    pub fn from_messages(messages: &[Message]) -> Self {
        let mut stats = UsageStats::default();
        let mut timed_replies = 0i64;
        let mut response_time_sum = 0i64;

        for message in messages {
            stats.total_tokens_used += i64::from(message.tokens_used);

            match message.role {
                MessageRole::User => stats.user_messages += 1,
                MessageRole::Assistant => {
                    stats.assistant_messages += 1;
                    if message.response_time_ms > 0 {
                        timed_replies += 1;
                        response_time_sum += i64::from(message.response_time_ms);
                    }
                }
                MessageRole::System => {}
            }
        }

        stats.total_messages = stats.user_messages + stats.assistant_messages;
        if timed_replies > 0 {
            stats.average_response_time = response_time_sum / timed_replies;
        }

        stats
    }
}

/// Render a duration as `"{n}ms"` below one second, otherwise as seconds with
/// one decimal (half rounds up).
pub fn format_response_time(milliseconds: i64) -> String {
    if milliseconds < 1000 {
        return format!("{}ms", milliseconds);
    }

    let tenths = (milliseconds + 50) / 100;
    format!("{}.{}s", tenths / 10, tenths % 10)
}
