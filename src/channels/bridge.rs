//! HTTP client for a local desktop-automation bridge.
//!
//! The WeChat client itself is driven by a separate automation process
//! (wxauto-style) that exposes a small JSON API on localhost. This
//! adapter implements both collaborator traits against that API. Chat
//! names go in request bodies, not URL paths, because group names are
//! routinely non-ASCII.

use super::{PollingControl, TranscriptSource};
use crate::transcript::RawEntry;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const BRIDGE_HTTP_TIMEOUT_SECS: u64 = 30;

pub struct BridgeClient {
    base_url: String,
    client: reqwest::Client,
    display_name: String,
}

impl BridgeClient {
    /// Connect to the bridge and resolve the logged-in account's display
    /// name. Fails when the bridge is not running or nobody is logged in.
    pub async fn connect(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(BRIDGE_HTTP_TIMEOUT_SECS))
            .build()
            .context("failed to initialize bridge HTTP client")?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let payload: Value = client
            .get(format!("{base_url}/self"))
            .send()
            .await
            .context("automation bridge not reachable")?
            .error_for_status()
            .context("automation bridge rejected /self")?
            .json()
            .await
            .context("invalid /self response")?;
        let display_name = payload
            .get("nickname")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or_default();
        if display_name.is_empty() {
            tracing::warn!("bridge reported no nickname; mention triggers will be disabled");
        }

        Ok(Self {
            base_url,
            client,
            display_name,
        })
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .with_context(|| format!("bridge GET {path} failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("bridge GET {path} returned {status}: {body}");
        }
        resp.json()
            .await
            .with_context(|| format!("bridge GET {path} returned invalid json"))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .with_context(|| format!("bridge POST {path} failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("bridge POST {path} returned {status}: {body}");
        }
        Ok(())
    }
}

/// `/messages/next` reports `{"chats": [...]}` in the order the client
/// surfaced the new-message badges.
fn parse_active_chats(payload: &Value) -> Vec<String> {
    payload
        .get("chats")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// `/transcript` reports an array of `{"sender": .., "content": ..}`
/// records; either field may be missing on malformed entries and is
/// carried through as absent.
fn parse_transcript(payload: &Value) -> Vec<RawEntry> {
    payload
        .as_array()
        .into_iter()
        .flatten()
        .map(|record| RawEntry {
            sender_tag: record
                .get("sender")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
            content: record
                .get("content")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
        })
        .collect()
}

#[async_trait]
impl TranscriptSource for BridgeClient {
    async fn poll_activity(&self) -> Result<Vec<String>> {
        let payload = self.get("/messages/next").await?;
        Ok(parse_active_chats(&payload))
    }

    async fn fetch_raw_transcript(&self, conversation: &str) -> Result<Vec<RawEntry>> {
        let resp = self
            .client
            .get(format!("{}/transcript", self.base_url))
            .query(&[("who", conversation)])
            .send()
            .await
            .context("bridge GET /transcript failed")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("bridge GET /transcript returned {status}");
        }
        let payload: Value = resp
            .json()
            .await
            .context("bridge GET /transcript returned invalid json")?;
        Ok(parse_transcript(&payload))
    }

    async fn send_reply(&self, conversation: &str, text: &str) -> Result<()> {
        self.post(
            "/send",
            &serde_json::json!({ "who": conversation, "text": text }),
        )
        .await
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl PollingControl for BridgeClient {
    async fn begin(&self, conversation: &str) -> Result<()> {
        self.post("/listen/add", &serde_json::json!({ "who": conversation }))
            .await
    }

    async fn end(&self, conversation: &str) -> Result<()> {
        self.post("/listen/remove", &serde_json::json!({ "who": conversation }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_active_chats_keeps_report_order() {
        let payload = serde_json::json!({ "chats": ["工作群", "g2", "  ", "g3"] });
        assert_eq!(
            parse_active_chats(&payload),
            vec!["工作群".to_string(), "g2".to_string(), "g3".to_string()]
        );
    }

    #[test]
    fn parse_active_chats_tolerates_missing_field() {
        assert!(parse_active_chats(&serde_json::json!({})).is_empty());
        assert!(parse_active_chats(&serde_json::json!({ "chats": "oops" })).is_empty());
    }

    #[test]
    fn parse_transcript_preserves_missing_fields() {
        let payload = serde_json::json!([
            { "sender": "Self", "content": "hi" },
            { "content": "orphan" },
            { "sender": "A" },
        ]);
        let entries = parse_transcript(&payload);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], RawEntry::new("Self", "hi"));
        assert_eq!(entries[1].sender_tag, None);
        assert_eq!(entries[2].content, None);
    }

    #[test]
    fn parse_transcript_of_non_array_is_empty() {
        assert!(parse_transcript(&serde_json::json!({ "oops": true })).is_empty());
    }
}
