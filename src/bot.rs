//! The bot's cooperative polling loop.
//!
//! A single task owns all mutable state. Each iteration polls the
//! automation layer for conversations with fresh messages, reconciles
//! each transcript, dispatches replies for triggered messages, then
//! conditionally runs the idle sweep. Collaborator failures are logged
//! and skipped; only an unreachable automation client ends the loop.

use crate::channels::{PollingControl, TranscriptSource};
use crate::config::Config;
use crate::listen::ListenSet;
use crate::providers::ReplyGenerator;
use crate::transcript::{classify_transcript, reconcile, PendingMessage};
use crate::trigger::TriggerPolicy;
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Bot {
    source: Arc<dyn TranscriptSource>,
    generator: Arc<dyn ReplyGenerator>,
    polling: Arc<dyn PollingControl>,
    policy: TriggerPolicy,
    listen: ListenSet,
    poll_interval: Duration,
    sweep_interval: Duration,
    last_sweep: Instant,
}

impl Bot {
    pub fn new(
        config: &Config,
        source: Arc<dyn TranscriptSource>,
        generator: Arc<dyn ReplyGenerator>,
        polling: Arc<dyn PollingControl>,
    ) -> Self {
        let policy = TriggerPolicy::new(source.display_name(), &config.wake_words);
        if policy.mention_keywords().is_empty() {
            tracing::warn!("no display name available; mention triggers are disabled");
        }
        Self {
            source,
            generator,
            polling,
            policy,
            listen: ListenSet::new(config.allowed_conversations.clone(), config.idle_timeout()),
            poll_interval: config.poll_interval(),
            sweep_interval: config.sweep_interval(),
            last_sweep: Instant::now(),
        }
    }

    /// Run until interrupted or the automation layer becomes
    /// unreachable. Tears down every polling subscription on the way
    /// out either way.
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(
            "bot started: {} allow-listed conversation(s), {} wake word(s)",
            self.listen.allowed_conversations().len(),
            self.policy.wake_words().len()
        );

        let result = loop {
            if let Err(err) = self.tick().await {
                break Err(err);
            }
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupt received, stopping");
                    break Ok(());
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        };

        self.listen.teardown(self.polling.as_ref()).await;
        result
    }

    /// One loop iteration. Returns an error only when the automation
    /// client is unreachable; everything else is logged and skipped.
    pub async fn tick(&mut self) -> Result<()> {
        let active = match self.source.poll_activity().await {
            Ok(active) => active,
            Err(err) => {
                if self.source.health_check().await {
                    tracing::warn!("polling failed, will retry: {err:#}");
                    return Ok(());
                }
                return Err(err.context("automation layer unreachable"));
            }
        };

        for conversation in active {
            if !self.listen.is_allowed(&conversation) {
                tracing::info!("'{conversation}' is not allow-listed, skipping");
                continue;
            }
            if self.listen.touch(&conversation) {
                tracing::debug!("'{conversation}' activity refreshed");
            }
            self.process_conversation(&conversation).await;
        }

        if self.last_sweep.elapsed() >= self.sweep_interval {
            self.listen.sweep(self.polling.as_ref()).await;
            self.last_sweep = Instant::now();
        }

        Ok(())
    }

    async fn process_conversation(&mut self, conversation: &str) {
        let raw = match self.source.fetch_raw_transcript(conversation).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("failed to fetch transcript for '{conversation}': {err:#}");
                return;
            }
        };

        let pending = reconcile(classify_transcript(raw));
        if pending.is_empty() {
            tracing::debug!("'{conversation}': nothing pending");
            return;
        }
        tracing::info!("'{conversation}': {} pending message(s)", pending.len());

        if !self.listen.is_tracked(conversation) {
            // Errors inside track are already logged; an untracked
            // conversation still gets this batch processed.
            let _ = self.listen.track(conversation, self.polling.as_ref()).await;
        }

        for message in pending {
            self.dispatch(conversation, &message).await;
        }
    }

    /// Trigger check, reply generation and send for one pending message.
    async fn dispatch(&self, conversation: &str, message: &PendingMessage) {
        let Some(forwarded) = self.policy.evaluate(&message.content) else {
            tracing::debug!(
                "'{conversation}': message from '{}' did not trigger",
                message.sender
            );
            return;
        };

        let reply = match self
            .generator
            .generate(&forwarded, &message.sender, conversation)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(
                    "reply generation failed for '{}' in '{conversation}': {err:#}",
                    message.sender
                );
                return;
            }
        };

        if reply.trim().is_empty() {
            tracing::info!("empty reply for '{conversation}', skipping send");
            return;
        }

        match self.source.send_reply(conversation, &reply).await {
            Ok(()) => tracing::info!(
                "replied to '{}' in '{conversation}' ({} chars)",
                message.sender,
                reply.chars().count()
            ),
            Err(err) => tracing::warn!("failed to send reply to '{conversation}': {err:#}"),
        }
    }

    #[cfg(test)]
    fn force_sweep_due(&mut self) {
        self.sweep_interval = Duration::ZERO;
    }
}
