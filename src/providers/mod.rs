//! Reply generation providers.

pub mod coze;

pub use coze::CozeReplyGenerator;

use anyhow::Result;
use async_trait::async_trait;

/// Black-box chat-completion collaborator. A failure means no reply is
/// sent for that message; the loop logs it and moves on.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, content: &str, sender: &str, conversation: &str) -> Result<String>;
}

/// Trim API error bodies before they reach the logs: cap the length and
/// redact anything that looks like a bearer credential.
pub fn sanitize_api_error(body: &str) -> String {
    const MAX_LEN: usize = 500;
    let mut sanitized: String = body
        .split_whitespace()
        .map(|word| {
            if word.starts_with("pat_") {
                "[REDACTED]"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    if sanitized.chars().count() > MAX_LEN {
        sanitized = sanitized.chars().take(MAX_LEN).collect::<String>() + "...";
    }
    sanitized
}
