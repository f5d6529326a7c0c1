//! # Core Message and Content Types
//!
//! Defines the data model shared by every component: `Message`, `MessageRole`,
//! and the discriminated `ContentBlock` union (text plus the multimodal
//! variants). These types carry no provider-specific wire format; each
//! `Provider` implementation is responsible for translating to and from its
//! own request/response shapes.

use serde::{Deserialize, Serialize};

/// Role of a message participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    /// A tool result, folded into the `User` channel on the wire for
    /// providers that don't model a dedicated tool role (see the Agent
    /// Loop's conversation on-wire formats).
    Tool,
}

/// Detail hint for image content, mirrored from common vision APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Auto,
    Low,
    High,
}

impl Default for ImageDetail {
    fn default() -> Self {
        ImageDetail::Auto
    }
}

/// The source of a media content part: either a remote URL or inline
/// base64-encoded bytes plus a media (MIME) type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    Url(String),
    Inline {
        media_type: String,
        /// Base64-encoded payload. Never hashed or logged in full (see
        /// `cache::fingerprint_media`, which only reads the first 20 bytes).
        data: String,
    },
}

impl MediaSource {
    pub fn is_url(&self) -> bool {
        matches!(self, MediaSource::Url(_))
    }
}

/// Plain text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// An image content part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub source: MediaSource,
    #[serde(default)]
    pub detail: ImageDetail,
}

impl ImageBlock {
    pub fn from_url(url: impl Into<String>) -> crate::error::Result<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(crate::error::Error::invalid_input(
                "image URL must not be empty",
            ));
        }
        Ok(Self {
            source: MediaSource::Url(url),
            detail: ImageDetail::Auto,
        })
    }

    pub fn from_base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            source: MediaSource::Inline {
                media_type: media_type.into(),
                data: data.into(),
            },
            detail: ImageDetail::Auto,
        }
    }

    pub fn with_detail(mut self, detail: ImageDetail) -> Self {
        self.detail = detail;
        self
    }
}

/// A generic file content part (not an image/audio/video), with an optional
/// display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBlock {
    pub source: MediaSource,
    pub media_type: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// An audio content part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBlock {
    pub source: MediaSource,
    pub media_type: String,
}

/// A video content part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoBlock {
    pub source: MediaSource,
    pub media_type: String,
}

/// One unit of content within a `Message`. A message carries an ordered
/// sequence of these; a text-only message has exactly one `Text` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(TextBlock),
    Image(ImageBlock),
    File(FileBlock),
    Video(VideoBlock),
    Audio(AudioBlock),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text(TextBlock::new(text))
    }

    /// Returns the text of this block if it is a `Text` variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(t) => Some(&t.text),
            _ => None,
        }
    }
}

/// A single message in a conversation: a role plus one or more content
/// parts. Invariant: `content` is never empty (enforced at construction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Construct a message. Panics if `content` is empty — every code path
    /// in this crate that builds a `Message` has at least one block to add;
    /// callers that might not should use `try_new`.
    pub fn new(role: MessageRole, content: Vec<ContentBlock>) -> Self {
        Self::try_new(role, content).expect("Message must have at least one content part")
    }

    pub fn try_new(role: MessageRole, content: Vec<ContentBlock>) -> crate::error::Result<Self> {
        if content.is_empty() {
            return Err(crate::error::Error::invalid_input(
                "a message must have at least one content part",
            ));
        }
        Ok(Self { role, content })
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: vec![ContentBlock::text(content)],
        }
    }

    /// Concatenate all `Text` blocks with `\n`, ignoring media parts. Used
    /// wherever a plain-text view of a message is needed (extractor input,
    /// token estimation of the textual portion).
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_system(&self) -> bool {
        self.role == MessageRole::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_new_single_text() {
        let m = Message::user("hello");
        assert_eq!(m.role, MessageRole::User);
        assert_eq!(m.text(), "hello");
    }

    #[test]
    fn message_try_new_rejects_empty_content() {
        let err = Message::try_new(MessageRole::User, vec![]).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidInput(_)));
    }

    #[test]
    fn multiple_text_blocks_join_with_newline() {
        let m = Message::new(
            MessageRole::User,
            vec![ContentBlock::text("Line 1"), ContentBlock::text("Line 2")],
        );
        assert_eq!(m.text(), "Line 1\nLine 2");
    }

    #[test]
    fn image_block_from_url_rejects_empty() {
        assert!(ImageBlock::from_url("").is_err());
    }

    #[test]
    fn image_block_from_url_sets_auto_detail() {
        let img = ImageBlock::from_url("https://example.com/a.jpg").unwrap();
        assert_eq!(img.detail, ImageDetail::Auto);
        assert!(img.source.is_url());
    }

    #[test]
    fn alternating_text_and_image_content() {
        let m = Message::new(
            MessageRole::User,
            vec![
                ContentBlock::text("First"),
                ContentBlock::Image(ImageBlock::from_url("https://example.com/1.jpg").unwrap()),
                ContentBlock::text("Second"),
            ],
        );
        assert_eq!(m.content.len(), 3);
    }
}
