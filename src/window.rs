//! # Message Window Manager (C2)
//!
//! A bounded conversation history with system-message preservation and a
//! character-based token approximation. Two independent truncation
//! policies are supported: count-based (`|messages| <= max_messages`) and
//! token-based (`estimated_tokens <= max_tokens`); `GetForModel` applies a
//! third, separate budget at read time without mutating the stored window.

use std::sync::RwLock;
use std::time::Instant;

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{ContentBlock, MediaSource, Message, MessageRole};

/// Configuration for a `ConversationWindow`.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub max_messages: usize,
    pub max_tokens: usize,
    pub use_token_truncation: bool,
    pub keep_all_system_messages: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_messages: 50,
            max_tokens: 8_000,
            use_token_truncation: false,
            keep_all_system_messages: true,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_messages == 0 {
            return Err(Error::window("max_messages must be > 0"));
        }
        if self.max_tokens == 0 {
            return Err(Error::window("max_tokens must be > 0"));
        }
        Ok(())
    }
}

/// `tokens(text) ≈ ⌈len(text)/4⌉ + 5`
fn estimate_text_tokens(text: &str) -> usize {
    text.len().div_ceil(4) + 5
}

fn media_fingerprint(source: &MediaSource) -> String {
    match source {
        MediaSource::Url(url) => url.clone(),
        MediaSource::Inline { data, .. } => {
            let end = data.len().min(20);
            data[..end].to_string()
        }
    }
}

/// Token cost of one content part per SPEC_FULL §4.2: text is character
/// approximated, images cost 1000, other media cost 500.
fn part_tokens(part: &ContentBlock) -> usize {
    match part {
        ContentBlock::Text(t) => estimate_text_tokens(&t.text),
        ContentBlock::Image(_) => 1000,
        ContentBlock::File(_) | ContentBlock::Audio(_) | ContentBlock::Video(_) => 500,
    }
}

/// A canonical fingerprint for a message's content, used both as the
/// token-count memo key and as a stable identity for cache-key purposes.
pub fn content_fingerprint(message: &Message) -> String {
    let parts: Vec<String> = message
        .content
        .iter()
        .map(|part| match part {
            ContentBlock::Text(t) => format!("text:{}", t.text),
            ContentBlock::Image(i) => format!("image:{}", media_fingerprint(&i.source)),
            ContentBlock::File(f) => format!(
                "file:{}:{}",
                f.file_name.as_deref().unwrap_or(""),
                f.media_type
            ),
            ContentBlock::Audio(a) => format!("audio:{}", a.media_type),
            ContentBlock::Video(v) => format!("video:{}", v.media_type),
        })
        .collect();
    format!("{:?}\u{1f}{}", message.role, parts.join("\u{1f}"))
}

fn estimate_message_tokens_uncached(message: &Message) -> usize {
    let body: usize = message.content.iter().map(part_tokens).sum();
    body + 10 * message.content.len()
}

/// One stored entry: a message plus the monotonic instant it was appended.
struct Entry {
    message: Message,
    inserted_at: Instant,
}

/// Component C2: bounded message history with token/size truncation.
pub struct ConversationWindow {
    config: WindowConfig,
    entries: RwLock<Vec<Entry>>,
    token_memo: RwLock<HashMap<String, usize>>,
}

impl ConversationWindow {
    pub fn new(config: WindowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            entries: RwLock::new(Vec::new()),
            token_memo: RwLock::new(HashMap::new()),
        })
    }

    fn tokens_of(&self, message: &Message) -> usize {
        let key = content_fingerprint(message);
        if let Some(cached) = self.token_memo.read().expect("window memo lock poisoned").get(&key) {
            return *cached;
        }
        let computed = estimate_message_tokens_uncached(message);
        self.token_memo
            .write()
            .expect("window memo lock poisoned")
            .insert(key, computed);
        computed
    }

    pub fn add_message(&self, message: Message) {
        self.add_messages(vec![message]);
    }

    pub fn add_messages(&self, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        {
            let mut entries = self.entries.write().expect("window lock poisoned");
            for message in messages {
                entries.push(Entry {
                    message,
                    inserted_at: Instant::now(),
                });
            }
        }
        self.truncate();
    }

    /// Remove any existing System messages; prepend a new one if `prompt`
    /// is non-empty.
    pub fn set_system_prompt(&self, prompt: &str) {
        let mut entries = self.entries.write().expect("window lock poisoned");
        entries.retain(|e| !e.message.is_system());
        if !prompt.is_empty() {
            entries.insert(
                0,
                Entry {
                    message: Message::system(prompt),
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// A deep copy of the current window contents, in insertion order.
    pub fn get_messages(&self) -> Vec<Message> {
        self.entries
            .read()
            .expect("window lock poisoned")
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("window lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The token budget `get_for_model` should be called with by default.
    pub fn max_tokens(&self) -> usize {
        self.config.max_tokens
    }

    pub fn total_tokens(&self) -> usize {
        self.entries
            .read()
            .expect("window lock poisoned")
            .iter()
            .map(|e| self.tokens_of(&e.message))
            .sum()
    }

    /// Truncate a candidate message's text to fit within `remaining`
    /// tokens, cutting at the nearest preceding space within the last 20
    /// characters of the truncation point and appending "…".
    fn truncate_text_to_budget(text: &str, remaining: usize) -> Option<String> {
        if remaining <= 5 {
            return None;
        }
        let max_chars = (remaining - 5) * 4;
        if max_chars == 0 {
            return None;
        }
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= max_chars {
            return Some(text.to_string());
        }
        let mut cut = max_chars.min(chars.len());
        let search_start = cut.saturating_sub(20);
        for i in (search_start..cut).rev() {
            if chars[i] == ' ' {
                cut = i;
                break;
            }
        }
        let truncated: String = chars[..cut].iter().collect();
        Some(format!("{}…", truncated))
    }

    /// Return all System messages, then as many of the most-recent
    /// non-System messages as fit within `budget - system_tokens`,
    /// restoring conversation order before returning. Never mutates the
    /// stored window.
    pub fn get_for_model(&self, budget: usize) -> Vec<Message> {
        let entries = self.entries.read().expect("window lock poisoned");

        let system: Vec<&Message> = entries
            .iter()
            .filter(|e| e.message.is_system())
            .map(|e| &e.message)
            .collect();
        let system_tokens: usize = system.iter().map(|m| self.tokens_of(m)).sum();
        let mut remaining = budget.saturating_sub(system_tokens);

        let non_system: Vec<&Message> = entries
            .iter()
            .filter(|e| !e.message.is_system())
            .map(|e| &e.message)
            .collect();

        let mut kept: Vec<Message> = Vec::new();
        for message in non_system.iter().rev() {
            let cost = self.tokens_of(message);
            if cost <= remaining {
                kept.push((*message).clone());
                remaining -= cost;
                continue;
            }
            if remaining > 32 {
                let text = message.text();
                if let Some(truncated) = Self::truncate_text_to_budget(&text, remaining) {
                    kept.push(Message::new(
                        message.role,
                        vec![ContentBlock::text(truncated)],
                    ));
                }
            }
            break;
        }
        kept.reverse();

        let mut result: Vec<Message> = system.into_iter().cloned().collect();
        result.extend(kept);
        result
    }

    /// Applied whenever `|messages| > max_messages`; picks the count-based
    /// or token-based eviction policy per `WindowConfig`.
    fn truncate(&self) {
        let mut entries = self.entries.write().expect("window lock poisoned");
        if entries.len() <= self.config.max_messages {
            return;
        }

        if self.config.use_token_truncation {
            loop {
                let total: usize = entries.iter().map(|e| self.tokens_of(&e.message)).sum();
                if total <= self.config.max_tokens {
                    break;
                }
                match Self::oldest_evictable_index(&entries, self.config.keep_all_system_messages)
                {
                    Some(idx) => {
                        entries.remove(idx);
                    }
                    None => break,
                }
            }
        } else {
            while entries.len() > self.config.max_messages {
                match Self::oldest_evictable_index(&entries, self.config.keep_all_system_messages)
                {
                    Some(idx) => {
                        entries.remove(idx);
                    }
                    None => break,
                }
            }
        }
    }

    fn oldest_evictable_index(entries: &[Entry], keep_all_system: bool) -> Option<usize> {
        entries.iter().position(|e| {
            if keep_all_system {
                !e.message.is_system()
            } else {
                true
            }
        })
    }
}
