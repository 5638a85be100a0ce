//! Coze chat-completion client.
//!
//! Create-and-poll flow against the Coze v3 API: start a chat with the
//! peer's question, poll until the run completes, then pick the
//! assistant's answer out of the message list.

use super::{sanitize_api_error, ReplyGenerator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;

pub const COZE_CN_BASE_URL: &str = "https://api.coze.cn";

const HTTP_TIMEOUT_SECS: u64 = 60;
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLL_ATTEMPTS: u32 = 60;

pub struct CozeReplyGenerator {
    base_url: String,
    api_token: String,
    bot_id: String,
    client: reqwest::Client,
}

impl CozeReplyGenerator {
    pub fn new(api_token: String, bot_id: String) -> Result<Self> {
        Self::with_base_url(api_token, bot_id, COZE_CN_BASE_URL.to_string())
    }

    pub fn with_base_url(api_token: String, bot_id: String, base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("failed to initialize Coze HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            bot_id,
            client,
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let resp = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_token)
            .json(body)
            .send()
            .await
            .context("Coze request failed")?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));
        if !status.is_success() {
            anyhow::bail!("Coze API error ({status}): {}", sanitize_api_error(&text));
        }
        parse_business_payload(&text)
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_token)
            .query(query)
            .send()
            .await
            .context("Coze request failed")?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));
        if !status.is_success() {
            anyhow::bail!("Coze API error ({status}): {}", sanitize_api_error(&text));
        }
        parse_business_payload(&text)
    }

    async fn create_chat(&self, question: &str, user_id: &str) -> Result<(String, String)> {
        let body = serde_json::json!({
            "bot_id": self.bot_id,
            "user_id": user_id,
            "stream": false,
            "auto_save_history": true,
            "additional_messages": [{
                "role": "user",
                "content": question,
                "content_type": "text",
            }],
        });
        let data = self.post_json("/v3/chat", &body).await?;

        let chat_id = string_field(&data, "id").context("Coze chat create missing id")?;
        let conversation_id = string_field(&data, "conversation_id")
            .context("Coze chat create missing conversation_id")?;
        Ok((chat_id, conversation_id))
    }

    async fn poll_until_done(&self, chat_id: &str, conversation_id: &str) -> Result<()> {
        for _ in 0..MAX_POLL_ATTEMPTS {
            let data = self
                .get_json(
                    "/v3/chat/retrieve",
                    &[("chat_id", chat_id), ("conversation_id", conversation_id)],
                )
                .await?;
            match string_field(&data, "status").as_deref() {
                Some("completed") => return Ok(()),
                Some("failed") | Some("canceled") | Some("requires_action") => {
                    let last_error = data
                        .get("last_error")
                        .map(Value::to_string)
                        .unwrap_or_else(|| "-".to_string());
                    anyhow::bail!("Coze chat did not complete: {last_error}");
                }
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
        anyhow::bail!("Coze chat polling timed out after {MAX_POLL_ATTEMPTS} attempts")
    }

    async fn fetch_answer(&self, chat_id: &str, conversation_id: &str) -> Result<String> {
        let data = self
            .get_json(
                "/v3/chat/message/list",
                &[("chat_id", chat_id), ("conversation_id", conversation_id)],
            )
            .await?;

        let messages = data.as_array().context("Coze message list is not an array")?;
        extract_answer(messages).context("Coze returned no assistant answer")
    }
}

#[async_trait]
impl ReplyGenerator for CozeReplyGenerator {
    async fn generate(&self, content: &str, sender: &str, conversation: &str) -> Result<String> {
        let question = format!("{sender} 向你提问: {content}");
        tracing::debug!("Coze generate for '{conversation}': {question}");

        let (chat_id, conversation_id) = self.create_chat(&question, sender).await?;
        self.poll_until_done(&chat_id, &conversation_id).await?;
        let answer = self.fetch_answer(&chat_id, &conversation_id).await?;
        Ok(collapse_blank_lines(&answer))
    }
}

/// Coze wraps everything in `{code, msg, data}`; non-zero code is a
/// business failure even on HTTP 200.
fn parse_business_payload(body: &str) -> Result<Value> {
    let parsed: Value = serde_json::from_str(body).context("invalid Coze response json")?;
    let code = parsed.get("code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        let msg = parsed
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        anyhow::bail!("code={code} msg={msg}");
    }
    Ok(parsed.get("data").cloned().unwrap_or(Value::Null))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// The answer is the assistant message typed "answer"; follow-up
/// suggestions and tool traces carry other types.
fn extract_answer(messages: &[Value]) -> Option<String> {
    messages
        .iter()
        .find(|m| {
            m.get("role").and_then(Value::as_str) == Some("assistant")
                && m.get("type").and_then(Value::as_str) == Some("answer")
        })
        .and_then(|m| string_field(m, "content"))
}

fn collapse_blank_lines(text: &str) -> String {
    static BLANK_RE: OnceLock<Regex> = OnceLock::new();
    let re = BLANK_RE.get_or_init(|| Regex::new(r"\n{2,}").expect("valid blank-line pattern"));
    re.replace_all(text, "\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_payload_requires_zero_code() {
        assert!(parse_business_payload(r#"{"code":0,"data":{"id":"c1"}}"#).is_ok());
        assert!(parse_business_payload(r#"{"code":4100,"msg":"auth"}"#).is_err());
        assert!(parse_business_payload("not json").is_err());
    }

    #[test]
    fn business_payload_unwraps_data() {
        let data = parse_business_payload(r#"{"code":0,"data":{"id":"c1"}}"#).unwrap();
        assert_eq!(string_field(&data, "id").as_deref(), Some("c1"));
    }

    #[test]
    fn extract_answer_picks_assistant_answer_only() {
        let messages = vec![
            serde_json::json!({"role":"assistant","type":"follow_up","content":"more?"}),
            serde_json::json!({"role":"assistant","type":"answer","content":"the reply"}),
            serde_json::json!({"role":"user","type":"question","content":"hi"}),
        ];
        assert_eq!(extract_answer(&messages).as_deref(), Some("the reply"));
    }

    #[test]
    fn extract_answer_none_without_answer_message() {
        let messages = vec![serde_json::json!({"role":"assistant","type":"verbose","content":"x"})];
        assert_eq!(extract_answer(&messages), None);
    }

    #[test]
    fn collapse_blank_lines_squeezes_runs() {
        assert_eq!(collapse_blank_lines("a\n\n\nb\nc"), "a\nb\nc");
        assert_eq!(collapse_blank_lines("plain"), "plain");
    }
}
