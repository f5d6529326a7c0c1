//! # Error Types for the Agent Orchestration Core
//!
//! This module defines all error types used throughout the crate, providing comprehensive
//! error handling with detailed context for different failure scenarios.
//!
//! ## Design Philosophy
//!
//! - **Explicit Error Handling**: Uses Rust's `Result<T>` type for all fallible operations
//! - **No Silent Failures**: All errors are propagated explicitly to the caller
//! - **Rich Context**: Each error variant provides specific information about what went wrong
//! - **Easy Conversion**: Automatic conversion from `serde_json::Error` via `?`
//!
//! ## Usage
//!
//! ```ignore
//! use agent_orchestration_core::{Error, Result};
//!
//! fn example() -> Result<()> {
//!     if some_condition {
//!         return Err(Error::config("Invalid model name"));
//!     }
//!
//!     let json = serde_json::from_str(data)?; // Auto-converts to Error::Json
//!
//!     Ok(())
//! }
//! ```

use thiserror::Error;

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Type alias for `Result<T, Error>` used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// ERROR ENUM
// ============================================================================

/// Comprehensive error type covering all failure modes in the orchestration core.
///
/// This enum uses the `thiserror` crate to automatically implement `std::error::Error`
/// and provide well-formatted error messages. Each variant represents a different
/// category of failure that can occur during agent operation.
///
/// ## Error Categories
///
/// - **Json**: Serialization/deserialization failures
/// - **Config**: Invalid configuration parameters (builder validation)
/// - **Api**: Error responses from the upstream provider
/// - **Stream**: Failures during token-streaming
/// - **Tool**: Tool registration or execution failures
/// - **InvalidInput**: User-provided input validation failures
/// - **Timeout**: An operation exceeded its deadline
/// - **Cache**: Response cache misconfiguration (e.g. zero capacity)
/// - **Window**: Conversation window misconfiguration
/// - **Aggregator**: All children of a provider aggregator failed
/// - **PromptEnhancement**: Schema-aware prompt preparation failed
/// - **Other**: Catch-all for miscellaneous errors
#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization or deserialization failed.
    ///
    /// Wraps `serde_json::Error` and occurs when parsing tool-call JSON,
    /// tool parameters, or cache keys fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration provided when building `AgentOptions` or a
    /// component config (`CacheConfig`, `WindowConfig`, `ExecutorConfig`,
    /// `AggregatorConfig`).
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// return Err(Error::config("system_prompt is required"));
    /// ```
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error response received from the upstream provider's API.
    ///
    /// Indicates the request reached the provider, but the provider itself
    /// reported failure (model not found, rate limit, server error, ...).
    #[error("API error: {0}")]
    Api(String),

    /// Error occurred while producing or consuming a token stream.
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Tool execution or registration failed.
    ///
    /// Covers handler errors, name collisions, lookups for unknown tools,
    /// and invalid schemas.
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Invalid input provided by the caller (e.g. empty prompt).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An operation exceeded its configured deadline.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The response cache was misconfigured or encountered an internal
    /// invariant violation.
    #[error("Cache error: {0}")]
    Cache(String),

    /// The conversation window was misconfigured.
    #[error("Window error: {0}")]
    Window(String),

    /// Every child of a provider aggregator failed; wraps the last child's
    /// error message.
    #[error("Aggregator error: all providers failed: {0}")]
    Aggregator(String),

    /// The prompt enhancer failed to adapt a prompt for schema-constrained
    /// generation.
    #[error("failed to enhance prompt with schema: {0}")]
    PromptEnhancement(String),

    /// Miscellaneous error that doesn't fit other categories.
    #[error("Error: {0}")]
    Other(String),
}

// ============================================================================
// CONVENIENCE CONSTRUCTORS
// ============================================================================

impl Error {
    /// Create a new configuration error with a descriptive message.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error with the provider's error message.
    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api(msg.into())
    }

    /// Create a new streaming error.
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new tool execution error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create a new invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new timeout error with context on what timed out.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a new cache error.
    pub fn cache(msg: impl Into<String>) -> Self {
        Error::Cache(msg.into())
    }

    /// Create a new window error.
    pub fn window(msg: impl Into<String>) -> Self {
        Error::Window(msg.into())
    }

    /// Create a new aggregator error.
    pub fn aggregator(msg: impl Into<String>) -> Self {
        Error::Aggregator(msg.into())
    }

    /// Create a new prompt-enhancement error.
    pub fn prompt_enhancement(msg: impl Into<String>) -> Self {
        Error::PromptEnhancement(msg.into())
    }

    /// Create a new miscellaneous error.
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}

// ============================================================================
// TESTS
// ============================================================================
