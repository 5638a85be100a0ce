//! Reply trigger policy.
//!
//! A peer message earns a reply either by @-mentioning the bot's display
//! name or by containing one of the configured wake words. Mentions win:
//! a message carrying both is processed via the mention-stripping path.

/// Read-only trigger configuration for one run.
#[derive(Debug, Clone, Default)]
pub struct TriggerPolicy {
    mention_keywords: Vec<String>,
    wake_words: Vec<String>,
}

impl TriggerPolicy {
    /// Build the policy from the bot's display name and the configured
    /// wake words. Blank entries are dropped; an empty display name
    /// yields no mention keywords.
    pub fn new(display_name: &str, wake_words: &[String]) -> Self {
        let mention_keywords = if display_name.trim().is_empty() {
            Vec::new()
        } else {
            vec![format!("@{}", display_name.trim())]
        };
        let wake_words = wake_words
            .iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        Self {
            mention_keywords,
            wake_words,
        }
    }

    pub fn mention_keywords(&self) -> &[String] {
        &self.mention_keywords
    }

    pub fn wake_words(&self) -> &[String] {
        &self.wake_words
    }

    fn is_mentioned(&self, content: &str) -> bool {
        self.mention_keywords.iter().any(|k| content.contains(k))
    }

    fn contains_wake_word(&self, content: &str) -> bool {
        self.wake_words.iter().any(|w| content.contains(w))
    }

    /// Decide whether `content` warrants a reply and compute the text to
    /// forward for generation.
    ///
    /// Mention matches strip every occurrence of every mention keyword and
    /// may legally leave an empty remainder; the caller still attempts a
    /// reply in that case. Wake-word matches forward the trimmed original.
    pub fn evaluate(&self, content: &str) -> Option<String> {
        if content.trim().is_empty() {
            return None;
        }

        if self.is_mentioned(content) {
            let mut stripped = content.to_string();
            for keyword in &self.mention_keywords {
                stripped = stripped.replace(keyword, "");
            }
            return Some(stripped.trim().to_string());
        }

        if self.contains_wake_word(content) {
            return Some(content.trim().to_string());
        }

        None
    }
}
