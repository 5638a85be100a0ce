//! Chat transcript model.
//!
//! The desktop automation layer reports a conversation's history as an
//! ordered list of loosely-typed `[sender_tag, content]` records. This
//! module normalizes those records into a tagged entry type at the
//! boundary so the rest of the crate never sees duck-typed data.

pub mod reconcile;

pub use reconcile::{reconcile, PendingMessage};

use regex::Regex;
use std::sync::OnceLock;

/// Sender tag the automation layer uses for the bot's own messages.
pub const SENDER_SELF: &str = "Self";
/// Sender tag for system notices (security banners, time lines, ...).
pub const SENDER_SYS: &str = "SYS";
/// Sender tag for recalled-message notices.
pub const SENDER_RECALL: &str = "Recall";
/// Sentinel used when a record arrives without a sender.
pub const SENDER_UNKNOWN: &str = "unknown";

/// One record as reported by the automation layer, before classification.
/// Both fields may be missing on malformed records; normalization defaults
/// them instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub sender_tag: Option<String>,
    pub content: Option<String>,
}

impl RawEntry {
    pub fn new(sender_tag: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender_tag: Some(sender_tag.into()),
            content: Some(content.into()),
        }
    }
}

/// A classified transcript entry. Ordering matches arrival order in the
/// source transcript; entries are immutable once produced. Every variant
/// keeps the originating [`RawEntry`] for downstream pass-through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    /// Message from a chat peer.
    Peer {
        sender: String,
        content: String,
        raw: RawEntry,
    },
    /// Message the bot itself sent.
    SelfMessage { content: String, raw: RawEntry },
    /// A bare `H:MM` / `HH:MM` time line WeChat inserts between bursts.
    TimeMarker { content: String, raw: RawEntry },
    /// Any other system notice (security banner, "view more", ...).
    SystemNotice { content: String, raw: RawEntry },
    /// Recalled-message notice. Always discarded by reconciliation.
    RecalledNotice { raw: RawEntry },
}

impl TranscriptEntry {
    /// Classify one raw record. `"Self"`, `"SYS"` and `"Recall"` are the
    /// automation layer's fixed vocabulary; anything else is a peer id.
    pub fn classify(raw: RawEntry) -> Self {
        let content = raw.content.clone().unwrap_or_default();
        let tag = raw
            .sender_tag
            .clone()
            .unwrap_or_else(|| SENDER_UNKNOWN.to_string());

        match tag.as_str() {
            SENDER_SELF => Self::SelfMessage { content, raw },
            SENDER_SYS => Self::SystemNotice { content, raw },
            SENDER_RECALL => Self::RecalledNotice { raw },
            _ => Self::Peer {
                sender: tag,
                content,
                raw,
            },
        }
    }
}

/// Classify a whole raw transcript, preserving order.
pub fn classify_transcript(raw: Vec<RawEntry>) -> Vec<TranscriptEntry> {
    raw.into_iter().map(TranscriptEntry::classify).collect()
}

/// Whether trimmed content matches the strict time-line pattern, e.g.
/// "9:30", "13:11" or "23:59". Only system notices are ever reclassified
/// on this basis; a peer message that happens to look like a time stays
/// a peer message.
pub fn is_time_line(content: &str) -> bool {
    static TIME_RE: OnceLock<Regex> = OnceLock::new();
    let re = TIME_RE.get_or_init(|| Regex::new(r"^\d{1,2}:\d{2}$").expect("valid time pattern"));
    re.is_match(content.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_fixed_vocabulary() {
        let entry = TranscriptEntry::classify(RawEntry::new("Self", "hello"));
        assert!(matches!(entry, TranscriptEntry::SelfMessage { ref content, .. } if content == "hello"));

        let entry = TranscriptEntry::classify(RawEntry::new("SYS", "13:11"));
        assert!(matches!(entry, TranscriptEntry::SystemNotice { .. }));

        let entry = TranscriptEntry::classify(RawEntry::new("Recall", "x"));
        assert!(matches!(entry, TranscriptEntry::RecalledNotice { .. }));
    }

    #[test]
    fn classify_treats_other_tags_as_peers() {
        let entry = TranscriptEntry::classify(RawEntry::new("Alice", "hi"));
        match entry {
            TranscriptEntry::Peer {
                sender, content, ..
            } => {
                assert_eq!(sender, "Alice");
                assert_eq!(content, "hi");
            }
            other => panic!("expected peer, got {other:?}"),
        }
    }

    #[test]
    fn classify_defaults_missing_fields() {
        let entry = TranscriptEntry::classify(RawEntry {
            sender_tag: None,
            content: None,
        });
        match entry {
            TranscriptEntry::Peer {
                sender, content, ..
            } => {
                assert_eq!(sender, SENDER_UNKNOWN);
                assert_eq!(content, "");
            }
            other => panic!("expected peer, got {other:?}"),
        }
    }

    #[test]
    fn time_line_accepts_one_and_two_digit_hours() {
        assert!(is_time_line("9:30"));
        assert!(is_time_line("13:11"));
        assert!(is_time_line("23:59"));
        assert!(is_time_line("  07:05  "));
    }

    #[test]
    fn time_line_rejects_non_time_content() {
        assert!(!is_time_line(""));
        assert!(!is_time_line("13:1"));
        assert!(!is_time_line("13:111"));
        assert!(!is_time_line("meet at 13:11"));
        assert!(!is_time_line("13:11pm"));
        assert!(!is_time_line("安全提示"));
    }
}
