//! # Tool Definition and Registry System
//!
//! A `Tool` is a named, async-callable capability the agent loop can invoke
//! between generation turns. The `ToolRegistry` (component C1) maps name to
//! tool, memoizes the human+machine readable description string, and
//! invalidates that memo on every mutation.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::Result;

/// A named callable the agent can invoke between turns.
///
/// Implementations must be `Send + Sync` since tools are executed
/// concurrently from the Parallel Tool Executor (C4).
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used in tool-call extraction and dispatch.
    fn name(&self) -> &str;

    /// Human-readable description surfaced to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters. `None` is treated as "object
    /// with no required properties".
    fn parameter_schema(&self) -> Option<Value> {
        None
    }

    /// Execute the tool with the given JSON parameters.
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Per-tool execution timeout, bounded from above by the executor's
    /// batch deadline (SPEC_FULL §4.4: "per-tool execution does not have
    /// its own deadline beyond the batch deadline"). Tools that want a
    /// tighter bound may override this; the executor takes the minimum of
    /// this value and the remaining batch budget.
    fn execution_timeout(&self) -> Duration {
        Duration::from_secs(30)
    }
}

/// A closure-backed tool, for constructing tools inline without a dedicated
/// struct + `impl Tool` block.
pub struct FnTool<F> {
    name: String,
    description: String,
    schema: Option<Value>,
    handler: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value>> + Send,
{
    pub fn new(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: None,
            handler,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameter_schema(&self) -> Option<Value> {
        self.schema.clone()
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        (self.handler)(params).await
    }
}

/// Status of a completed tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    Error,
    NotFound,
    Timeout,
}

/// The outcome of dispatching one tool call.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub name: String,
    pub status: ToolStatus,
    /// Populated only when `status == Success`.
    pub value: Option<Value>,
    /// Populated for `Error`, `NotFound`, and `Timeout`.
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, value: Value, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            status: ToolStatus::Success,
            value: Some(value),
            error: None,
            elapsed,
        }
    }

    pub fn error(name: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            status: ToolStatus::Error,
            value: None,
            error: Some(error.into()),
            elapsed,
        }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            error: Some(format!("tool not found: {}", name)),
            name,
            status: ToolStatus::NotFound,
            value: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn timeout(name: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            status: ToolStatus::Timeout,
            value: None,
            error: Some("operation cancelled due to timeout".to_string()),
            elapsed,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// A transient `(name, params)` pair extracted from model output. Never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub params: Value,
}

/// One machine-readable tool definition, as embedded in `ToolRegistry::description()`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ToolFunctionDef,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolFunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

fn empty_object_schema() -> Value {
    Value::Object(Map::new())
}

struct DescriptionCache {
    text: String,
    names: Vec<String>,
}

/// Name → `Tool` mapping with a memoized description/name-list.
///
/// Any mutation (`register`) invalidates the memo; the next call to
/// `description()` or `names()` after a mutation recomputes it once and
/// caches the result until the next mutation.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    memo: RwLock<Option<Arc<DescriptionCache>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            memo: RwLock::new(None),
        }
    }

    /// Register a tool. Last write wins on a name collision.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        {
            let mut tools = self.tools.write().expect("tool registry lock poisoned");
            if tools.contains_key(&name) {
                log::warn!("tool registry: overwriting duplicate tool '{}'", name);
            } else {
                log::debug!("tool registry: registered tool '{}'", name);
            }
            tools.insert(name, tool);
        }
        *self.memo.write().expect("tool registry memo lock poisoned") = None;
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.read().expect("tool registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted tool names (stable within one uncached call; see SPEC_FULL
    /// §9 "Stable description ordering" — this implementation sorts rather
    /// than relying on hash-map iteration order).
    pub fn names(&self) -> Vec<String> {
        self.ensure_memo().names.clone()
    }

    /// Human-oriented block plus an embedded machine-readable JSON array of
    /// `{type: "function", function: {name, description, parameters}}`.
    pub fn description(&self) -> String {
        self.ensure_memo().text.clone()
    }

    fn ensure_memo(&self) -> Arc<DescriptionCache> {
        if let Some(cached) = self.memo.read().expect("tool registry memo lock poisoned").clone() {
            return cached;
        }
        let mut write = self.memo.write().expect("tool registry memo lock poisoned");
        if let Some(cached) = write.clone() {
            return cached;
        }
        let computed = Arc::new(self.compute_description());
        *write = Some(computed.clone());
        computed
    }

    fn compute_description(&self) -> DescriptionCache {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        let mut names: Vec<&String> = tools.keys().collect();
        names.sort();

        let mut lines = vec!["Available tools:".to_string()];
        let mut defs = Vec::with_capacity(names.len());
        for name in &names {
            let tool = &tools[*name];
            lines.push(format!("- {}: {}", tool.name(), tool.description()));
            defs.push(ToolDefinition {
                kind: "function",
                function: ToolFunctionDef {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameter_schema().unwrap_or_else(empty_object_schema),
                },
            });
        }
        let json = serde_json::to_string(&defs).unwrap_or_else(|_| "[]".to_string());
        lines.push(String::new());
        lines.push(json);

        DescriptionCache {
            text: lines.join("\n"),
            names: names.into_iter().cloned().collect(),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
