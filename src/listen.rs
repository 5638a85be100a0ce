//! Listen-set manager.
//!
//! Tracks which conversations are actively subscribed for polling. A
//! conversation becomes tracked when a reconciled batch first contains a
//! peer message for it (and the allow-list admits it), and is evicted by
//! the periodic sweep once idle for the configured timeout. All mutation
//! happens on the single bot loop task; no locking here.

use crate::channels::PollingControl;
use anyhow::Result;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct TrackedChat {
    last_activity: Instant,
}

pub struct ListenSet {
    tracked: HashMap<String, TrackedChat>,
    allowed: Vec<String>,
    idle_timeout: Duration,
}

impl ListenSet {
    pub fn new(allowed: Vec<String>, idle_timeout: Duration) -> Self {
        Self {
            tracked: HashMap::new(),
            allowed,
            idle_timeout,
        }
    }

    pub fn is_tracked(&self, conversation: &str) -> bool {
        self.tracked.contains_key(conversation)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn allowed_conversations(&self) -> &[String] {
        &self.allowed
    }

    /// An empty allow-list admits nothing: auto-tracking is effectively
    /// disabled until conversations are configured.
    pub fn is_allowed(&self, conversation: &str) -> bool {
        self.allowed.iter().any(|c| c == conversation)
    }

    /// Refresh last-activity for a tracked conversation. Returns false if
    /// the conversation is not tracked.
    pub fn touch(&mut self, conversation: &str) -> bool {
        match self.tracked.get_mut(conversation) {
            Some(chat) => {
                chat.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Try to move a conversation to the tracked state. Checks the
    /// allow-list, then asks the automation layer to begin polling; on
    /// failure the conversation is not inserted and there is no retry.
    pub async fn track(&mut self, conversation: &str, control: &dyn PollingControl) -> Result<bool> {
        if self.is_tracked(conversation) {
            return Ok(true);
        }
        if !self.is_allowed(conversation) {
            tracing::info!("'{conversation}' is not allow-listed; refusing to track");
            return Ok(false);
        }

        match control.begin(conversation).await {
            Ok(()) => {
                self.tracked.insert(
                    conversation.to_string(),
                    TrackedChat {
                        last_activity: Instant::now(),
                    },
                );
                tracing::info!(
                    "now listening to '{conversation}' ({} tracked)",
                    self.tracked.len()
                );
                Ok(true)
            }
            Err(err) => {
                tracing::warn!("failed to begin polling '{conversation}': {err:#}");
                Ok(false)
            }
        }
    }

    /// Evict every conversation idle for at least the timeout. The stop
    /// call is best-effort: a failure is logged and the entry is dropped
    /// anyway. Returns the evicted conversation ids.
    pub async fn sweep(&mut self, control: &dyn PollingControl) -> Vec<String> {
        self.sweep_at(Instant::now(), control).await
    }

    /// Sweep against an explicit clock reading. The boundary is
    /// inclusive: a conversation idle for exactly the timeout is evicted.
    pub async fn sweep_at(&mut self, now: Instant, control: &dyn PollingControl) -> Vec<String> {
        let expired: Vec<String> = self
            .tracked
            .iter()
            .filter(|(_, chat)| now.duration_since(chat.last_activity) >= self.idle_timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for conversation in &expired {
            tracing::info!("'{conversation}' idle past timeout, removing from listen set");
            if let Err(err) = control.end(conversation).await {
                tracing::warn!("failed to end polling '{conversation}': {err:#}");
            }
            self.tracked.remove(conversation);
        }

        expired
    }

    /// Best-effort teardown of every subscription on shutdown.
    pub async fn teardown(&mut self, control: &dyn PollingControl) {
        for conversation in self.tracked.keys() {
            if let Err(err) = control.end(conversation).await {
                tracing::warn!("teardown: failed to end polling '{conversation}': {err:#}");
            } else {
                tracing::info!("teardown: stopped listening to '{conversation}'");
            }
        }
        self.tracked.clear();
    }

    #[cfg(test)]
    fn set_last_activity(&mut self, conversation: &str, at: Instant) {
        if let Some(chat) = self.tracked.get_mut(conversation) {
            chat.last_activity = at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingControl {
        begun: Mutex<Vec<String>>,
        ended: Mutex<Vec<String>>,
        fail_begin: bool,
        fail_end: bool,
    }

    #[async_trait]
    impl PollingControl for RecordingControl {
        async fn begin(&self, conversation: &str) -> Result<()> {
            self.begun.lock().push(conversation.to_string());
            if self.fail_begin {
                anyhow::bail!("begin refused");
            }
            Ok(())
        }

        async fn end(&self, conversation: &str) -> Result<()> {
            self.ended.lock().push(conversation.to_string());
            if self.fail_end {
                anyhow::bail!("end refused");
            }
            Ok(())
        }
    }

    fn set(allowed: &[&str]) -> ListenSet {
        ListenSet::new(
            allowed.iter().map(|s| s.to_string()).collect(),
            Duration::from_secs(180),
        )
    }

    #[tokio::test]
    async fn track_begins_polling_and_inserts() {
        let control = RecordingControl::default();
        let mut listen = set(&["g1"]);

        assert!(listen.track("g1", &control).await.unwrap());
        assert!(listen.is_tracked("g1"));
        assert_eq!(*control.begun.lock(), vec!["g1".to_string()]);
    }

    #[tokio::test]
    async fn track_rejects_conversations_off_the_allow_list() {
        let control = RecordingControl::default();
        let mut listen = set(&["g1"]);

        assert!(!listen.track("g2", &control).await.unwrap());
        assert!(!listen.is_tracked("g2"));
        assert!(control.begun.lock().is_empty());
    }

    #[tokio::test]
    async fn empty_allow_list_tracks_nothing() {
        let control = RecordingControl::default();
        let mut listen = set(&[]);

        assert!(!listen.track("g1", &control).await.unwrap());
        assert_eq!(listen.tracked_count(), 0);
    }

    #[tokio::test]
    async fn failed_begin_leaves_conversation_untracked() {
        let control = RecordingControl {
            fail_begin: true,
            ..Default::default()
        };
        let mut listen = set(&["g1"]);

        assert!(!listen.track("g1", &control).await.unwrap());
        assert!(!listen.is_tracked("g1"));
    }

    #[tokio::test]
    async fn track_is_idempotent_for_tracked_conversations() {
        let control = RecordingControl::default();
        let mut listen = set(&["g1"]);

        assert!(listen.track("g1", &control).await.unwrap());
        assert!(listen.track("g1", &control).await.unwrap());
        assert_eq!(control.begun.lock().len(), 1);
    }

    #[tokio::test]
    async fn sweep_evicts_at_exact_timeout_boundary() {
        let control = RecordingControl::default();
        let mut listen = set(&["g1"]);
        listen.track("g1", &control).await.unwrap();
        let t0 = Instant::now();
        listen.set_last_activity("g1", t0);

        // Idle for exactly idle_timeout: the boundary is inclusive.
        let evicted = listen
            .sweep_at(t0 + Duration::from_secs(180), &control)
            .await;
        assert_eq!(evicted, vec!["g1".to_string()]);
        assert!(!listen.is_tracked("g1"));
        assert_eq!(*control.ended.lock(), vec!["g1".to_string()]);
    }

    #[tokio::test]
    async fn sweep_keeps_active_conversations() {
        let control = RecordingControl::default();
        let mut listen = set(&["g1", "g2"]);
        listen.track("g1", &control).await.unwrap();
        listen.track("g2", &control).await.unwrap();
        let t0 = Instant::now();
        listen.set_last_activity("g1", t0);
        listen.set_last_activity("g2", t0 + Duration::from_secs(150));

        let evicted = listen
            .sweep_at(t0 + Duration::from_secs(200), &control)
            .await;
        assert_eq!(evicted, vec!["g1".to_string()]);
        assert!(listen.is_tracked("g2"));
    }

    #[tokio::test]
    async fn sweep_drops_entry_even_when_end_call_fails() {
        let control = RecordingControl {
            fail_end: true,
            ..Default::default()
        };
        let mut listen = set(&["g1"]);
        listen.track("g1", &control).await.unwrap();
        let t0 = Instant::now();
        listen.set_last_activity("g1", t0);

        let evicted = listen
            .sweep_at(t0 + Duration::from_secs(200), &control)
            .await;
        assert_eq!(evicted, vec!["g1".to_string()]);
        assert_eq!(listen.tracked_count(), 0);
    }

    #[tokio::test]
    async fn touch_refreshes_only_tracked_conversations() {
        let control = RecordingControl::default();
        let mut listen = set(&["g1"]);
        listen.track("g1", &control).await.unwrap();
        let t0 = Instant::now();
        listen.set_last_activity("g1", t0);

        assert!(listen.touch("g1"));
        assert!(!listen.touch("g2"));

        // touch moved last-activity to roughly now, so a sweep shortly
        // after t0 keeps the conversation.
        let evicted = listen
            .sweep_at(t0 + Duration::from_secs(10), &control)
            .await;
        assert!(evicted.is_empty());
    }

    #[tokio::test]
    async fn teardown_ends_everything_and_clears() {
        let control = RecordingControl::default();
        let mut listen = set(&["g1", "g2"]);
        listen.track("g1", &control).await.unwrap();
        listen.track("g2", &control).await.unwrap();

        listen.teardown(&control).await;
        assert_eq!(listen.tracked_count(), 0);
        assert_eq!(control.ended.lock().len(), 2);
    }
}
