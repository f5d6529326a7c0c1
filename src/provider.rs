//! # Provider Trait and Wire-Agnostic Response Types
//!
//! A `Provider` is anything that can turn a conversation into a reply. The
//! core never speaks a concrete vendor wire format; it only depends on this
//! trait. `ProviderOption` is a closed set rather than an open string bag
//! (SPEC_FULL §9, cache-key stability) so the Response Cache can hash it
//! deterministically without caring what a given provider does with it.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::types::Message;

/// Token accounting reported by a provider, when it reports one at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete, non-streamed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub content: String,
    pub usage: Option<Usage>,
}

impl Response {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// One chunk of a streamed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub finished: bool,
}

/// A closed set of generation parameters. Kept closed (rather than an
/// arbitrary `HashMap<String, Value>`) so two logically identical requests
/// always serialize to the same bytes for cache-key hashing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "option", rename_all = "snake_case")]
pub enum ProviderOption {
    Temperature { value: f32 },
    TopP { value: f32 },
    MaxTokens { value: u32 },
    StopSequences { value: Vec<String> },
    Model { value: String },
}

/// Something that can turn a conversation into a reply. Implementations are
/// vendor-specific; the core only ever holds `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier used in aggregator metrics and cache stats.
    fn name(&self) -> &str;

    /// Generate a reply from a single prompt string. The default
    /// implementation wraps the prompt in a single `User` message and
    /// delegates to `generate`.
    async fn generate_prompt(&self, prompt: &str, options: &[ProviderOption]) -> Result<Response> {
        self.generate(&[Message::user(prompt)], options).await
    }

    async fn generate(&self, messages: &[Message], options: &[ProviderOption]) -> Result<Response>;

    /// Generate a reply constrained to the given JSON Schema, from a single
    /// prompt string. The default implementation wraps the prompt in a
    /// single `User` message and delegates to `generate_with_schema`.
    async fn generate_with_schema_prompt(
        &self,
        prompt: &str,
        schema: &Value,
        options: &[ProviderOption],
    ) -> Result<Response> {
        self.generate_with_schema(&[Message::user(prompt)], schema, options).await
    }

    /// Generate a reply constrained to the given JSON Schema. The default
    /// implementation ignores the schema and falls back to plain
    /// `generate`; providers with native structured-output support should
    /// override this.
    async fn generate_with_schema(
        &self,
        messages: &[Message],
        schema: &Value,
        options: &[ProviderOption],
    ) -> Result<Response> {
        let _ = schema;
        self.generate(messages, options).await
    }

    /// Stream a reply token by token, from a single prompt string. The
    /// default implementation wraps the prompt in a single `User` message
    /// and delegates to `stream`.
    async fn stream_prompt(
        &self,
        prompt: &str,
        options: &[ProviderOption],
    ) -> Result<futures::stream::BoxStream<'static, Result<Token>>> {
        self.stream(&[Message::user(prompt)], options).await
    }

    /// Stream a reply token by token. The default implementation awaits the
    /// full `generate` call and emits it as a single finished token;
    /// providers with native streaming should override this.
    async fn stream(
        &self,
        messages: &[Message],
        options: &[ProviderOption],
    ) -> Result<futures::stream::BoxStream<'static, Result<Token>>> {
        let response = self.generate(messages, options).await?;
        let token = Token {
            text: response.content,
            finished: true,
        };
        Ok(Box::pin(tokio_stream::once(Ok(token))))
    }
}
