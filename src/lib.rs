//! # Agent Orchestration Core
//!
//! A provider-agnostic reasoning loop for LLM-backed agents: turn-taking
//! generation, tool-call extraction from free-form model text, bounded
//! parallel tool dispatch, a TTL/capacity response cache, a multi-provider
//! aggregator, and a token-budgeted conversation window.
//!
//! ## Key Features
//!
//! - **Provider-agnostic**: the core depends only on the `Provider` trait,
//!   never a concrete vendor wire format.
//! - **Tool-call extraction**: recognizes tool invocations in root JSON,
//!   fenced code blocks, and free-form `Tool:`/`Params:` prose.
//! - **Parallel tool execution**: bounded concurrency, a shared batch
//!   deadline, and `Before → Execute → After` hook firing per call.
//! - **Response caching**: content-addressed, TTL- and capacity-bounded.
//! - **Provider aggregation**: `Fastest`, `Primary`, and `Consensus`
//!   strategies across multiple upstream providers.
//! - **Conversation windowing**: message-count and token-budget
//!   truncation with system-message preservation.
//!
//! ## Example
//!
//! ```rust,no_run
//! use agent_orchestration_core::{Agent, AgentOptions, Provider, ProviderOption, Message, Response, Result};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl Provider for MyProvider {
//!     fn name(&self) -> &str { "my-provider" }
//!     async fn generate(&self, messages: &[Message], _options: &[ProviderOption]) -> Result<Response> {
//!         Ok(Response::new(format!("echo: {}", messages.last().map(Message::text).unwrap_or_default())))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let options = AgentOptions::builder().model("my-model").build()?;
//!     let agent = Agent::new(Arc::new(MyProvider), options)?;
//!     let answer = agent.run("What's the capital of France?").await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **types**: the shared data model (`Message`, `ContentBlock`, roles).
//! - **tools**: the `Tool` trait and name-keyed `ToolRegistry` (C1).
//! - **window**: the token-budgeted `ConversationWindow` (C2).
//! - **extractor**: the pure tool-call extractor (C3).
//! - **executor**: the bounded-concurrency `ToolExecutor` (C4).
//! - **cache**: the TTL/capacity `ResponseCache` (C5).
//! - **provider**: the `Provider` trait and wire-agnostic response types.
//! - **prompt**: the `PromptEnhancer` schema-mode collaborator.
//! - **aggregator**: the multi-provider `ProviderAggregator` (C6).
//! - **retry**: exponential backoff with full jitter.
//! - **hooks**: lifecycle observers fired at generate/tool boundaries.
//! - **agent**: the reasoning loop tying every component together (C7).
//! - **error**: the crate-wide `Error` enum and `Result` alias.

mod agent;
mod aggregator;
mod cache;
mod error;
mod executor;
mod extractor;
mod hooks;
mod prompt;
mod provider;
mod retry;
mod tools;
mod types;
mod window;

pub use agent::{Agent, AgentOptions, AgentOptionsBuilder, AgentRun};

pub use aggregator::{AggregatorConfig, ChildMetrics, ProviderAggregator, Strategy, WeightedProvider};

pub use cache::{global as global_cache, CacheConfig, CacheStats, ResponseCache};

pub use error::{Error, Result};

pub use executor::{fold_by_name, format_result_for_model, ExecutorConfig, ToolExecutor};

pub use extractor::{extract, ExtractedCall, ExtractionResult};

pub use hooks::{
    AfterGenerateEvent, AfterToolCallEvent, BeforeGenerateEvent, BeforeToolCallEvent, Hook, HookList,
};

pub use prompt::{DefaultPromptEnhancer, PromptEnhancer};

pub use provider::{Provider, ProviderOption, Response, Token, Usage};

pub use retry::{backoff_delay, retry_with_backoff, RetryConfig};

pub use tools::{
    FnTool, Tool, ToolDefinition, ToolFunctionDef, ToolInvocation, ToolRegistry, ToolResult, ToolStatus,
};

pub use types::{
    AudioBlock, ContentBlock, FileBlock, ImageBlock, ImageDetail, MediaSource, Message, MessageRole,
    TextBlock, VideoBlock,
};

pub use window::{content_fingerprint, ConversationWindow, WindowConfig};

/// Convenience re-export of the most commonly used types and traits.
pub mod prelude {
    pub use crate::{
        Agent, AgentOptions, AgentOptionsBuilder, AgentRun, ContentBlock, ConversationWindow, Error,
        Hook, HookList, Message, MessageRole, PromptEnhancer, Provider, ProviderOption, Response,
        Result, Tool, ToolInvocation, ToolRegistry, ToolResult, Usage, WindowConfig,
    };
}
