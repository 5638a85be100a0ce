//! Seams to the desktop automation layer.
//!
//! The bot never drives the WeChat client directly; it talks to these
//! traits and the binary wires in a concrete implementation. Tests use
//! call-recording doubles.

pub mod bridge;

pub use bridge::BridgeClient;

use crate::transcript::RawEntry;
use anyhow::Result;
use async_trait::async_trait;

/// Read side of the automation layer: which conversations have fresh
/// messages, and the raw transcript and reply sink for each.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Conversations the automation layer reports new messages for since
    /// the last poll, in report order.
    async fn poll_activity(&self) -> Result<Vec<String>>;

    /// The full ordered raw transcript currently visible for one
    /// conversation.
    async fn fetch_raw_transcript(&self, conversation: &str) -> Result<Vec<RawEntry>>;

    /// Submit a generated reply into the conversation.
    async fn send_reply(&self, conversation: &str, text: &str) -> Result<()>;

    /// The bot account's display name, used to derive mention keywords.
    fn display_name(&self) -> &str;

    /// Whether the underlying client is still reachable. Consulted after
    /// a poll failure to distinguish a transient error from a dead client.
    async fn health_check(&self) -> bool;
}

/// Per-conversation polling subscription, owned by the listen set.
#[async_trait]
pub trait PollingControl: Send + Sync {
    async fn begin(&self, conversation: &str) -> Result<()>;
    async fn end(&self, conversation: &str) -> Result<()>;
}
