//! # Prompt Enhancer
//!
//! A schema-mode collaborator invoked before generation: it gets a chance to
//! rewrite the caller's prompt so a model that has no native structured
//! output support still has the target shape spelled out in plain text.
//! Same trait-object shape as `Tool`/`Hook`/`Provider` — the agent loop only
//! ever holds `Arc<dyn PromptEnhancer>`.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Adapts a prompt for schema-constrained generation.
#[async_trait]
pub trait PromptEnhancer: Send + Sync {
    /// Rewrite `prompt` so its expected output shape matches `schema`.
    /// Implementations that can't honor this should return an `Err`, which
    /// the agent loop surfaces as a terminal `Error::PromptEnhancement`.
    async fn enhance(&self, prompt: &str, schema: &Value) -> Result<String>;
}

/// Appends a human-readable rendering of the schema to the prompt. Good
/// enough for providers without native structured-output support; providers
/// that honor `generate_with_schema` natively don't need a smarter one.
pub struct DefaultPromptEnhancer;

#[async_trait]
impl PromptEnhancer for DefaultPromptEnhancer {
    async fn enhance(&self, prompt: &str, schema: &Value) -> Result<String> {
        let schema_text = serde_json::to_string_pretty(schema)?;
        Ok(format!(
            "{prompt}\n\nRespond with JSON matching this schema:\n{schema_text}"
        ))
    }
}
