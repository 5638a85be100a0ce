//! Transcript reconciliation.
//!
//! Given the raw ordered log for one conversation, decide which peer
//! messages are still unanswered: everything strictly after the bot's
//! point of last engagement, which is the most recent own message, or
//! failing that the most recent time line.

use super::{is_time_line, RawEntry, TranscriptEntry};

/// A peer message reconciliation decided still needs consideration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub sender: String,
    pub content: String,
    /// Originating record, passed through unmodified for downstream use.
    pub raw: RawEntry,
}

/// Intermediate shape after the filter pass. Recalled notices and
/// non-time system notices are already gone at this point.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NormalizedEntry {
    Peer {
        sender: String,
        content: String,
        raw: RawEntry,
    },
    SelfMessage,
    TimeMarker,
}

fn normalize(entries: Vec<TranscriptEntry>) -> Vec<NormalizedEntry> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            TranscriptEntry::Peer {
                sender,
                content,
                raw,
            } => Some(NormalizedEntry::Peer {
                sender,
                content,
                raw,
            }),
            TranscriptEntry::SelfMessage { .. } => Some(NormalizedEntry::SelfMessage),
            TranscriptEntry::TimeMarker { .. } => Some(NormalizedEntry::TimeMarker),
            TranscriptEntry::SystemNotice { content, .. } => {
                // Time lines arrive tagged SYS; everything else system-tagged
                // (security banners, recall notices rendered as SYS) is noise.
                if is_time_line(&content) {
                    Some(NormalizedEntry::TimeMarker)
                } else {
                    None
                }
            }
            TranscriptEntry::RecalledNotice { .. } => None,
        })
        .collect()
}

fn collect_peers(entries: &[NormalizedEntry]) -> Vec<PendingMessage> {
    entries
        .iter()
        .filter_map(|entry| match entry {
            NormalizedEntry::Peer {
                sender,
                content,
                raw,
            } => Some(PendingMessage {
                sender: sender.clone(),
                content: content.clone(),
                raw: raw.clone(),
            }),
            _ => None,
        })
        .collect()
}

fn last_index_of(entries: &[NormalizedEntry], wanted: &NormalizedEntry) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .rev()
        .find(|(_, entry)| *entry == wanted)
        .map(|(idx, _)| idx)
}

/// Reconcile one conversation's classified transcript into the ordered
/// list of peer messages that occurred strictly after the bot's last
/// engagement point.
///
/// Pure and total: never fails, an empty transcript or one with no peer
/// messages yields an empty result.
pub fn reconcile(entries: Vec<TranscriptEntry>) -> Vec<PendingMessage> {
    let normalized = normalize(entries);

    let scope = match last_index_of(&normalized, &NormalizedEntry::SelfMessage) {
        // Only the records after the most recent own message matter.
        Some(idx) => &normalized[idx + 1..],
        None => &normalized[..],
    };

    match last_index_of(scope, &NormalizedEntry::TimeMarker) {
        Some(idx) => collect_peers(&scope[idx + 1..]),
        None => collect_peers(scope),
    }
}
