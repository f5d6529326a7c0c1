//! # Parallel Tool Executor (C4)
//!
//! Dispatches a batch of tool invocations concurrently, bounded by a
//! `Semaphore` permit count and a single deadline shared by the whole
//! batch. A call that cannot acquire a permit before the deadline never
//! runs; a call that's running past its own (or the batch's) timeout is
//! cancelled via `tokio::time::timeout`. `Before → Execute → After` hooks
//! fire on the same worker that runs the call (SPEC_FULL §5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::hooks::HookList;
use crate::tools::{ToolInvocation, ToolRegistry, ToolResult, ToolStatus};

/// Tuning knobs for a `ToolExecutor`.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Maximum number of tool calls running at once.
    pub max_concurrency: usize,
    /// Wall-clock budget for the whole batch, shared across every call in it.
    pub batch_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            batch_timeout: Duration::from_secs(30),
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::config("max_concurrency must be at least 1"));
        }
        if self.batch_timeout.is_zero() {
            return Err(Error::config("batch_timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Dispatches tool calls in parallel against a shared registry.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    hooks: HookList,
    config: ExecutorConfig,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, hooks: HookList, config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            hooks,
            config,
        })
    }

    /// Run every invocation concurrently, honoring `max_concurrency` and the
    /// shared batch deadline. Results are returned in the same order as
    /// `calls`, not completion order.
    pub async fn execute_batch(&self, calls: Vec<ToolInvocation>) -> Vec<ToolResult> {
        if calls.is_empty() {
            return Vec::new();
        }
        let deadline = Instant::now() + self.config.batch_timeout;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));

        let futures = calls.into_iter().map(|invocation| {
            let registry = self.registry.clone();
            let hooks = self.hooks.clone();
            let semaphore = semaphore.clone();
            async move { run_one(registry, hooks, semaphore, deadline, invocation).await }
        });

        futures::future::join_all(futures).await
    }
}

async fn run_one(
    registry: Arc<ToolRegistry>,
    hooks: HookList,
    semaphore: Arc<Semaphore>,
    deadline: Instant,
    invocation: ToolInvocation,
) -> ToolResult {
    let start = Instant::now();

    let permit = tokio::select! {
        permit = semaphore.acquire_owned() => permit.ok(),
        _ = tokio::time::sleep_until(deadline) => None,
    };
    let Some(_permit) = permit else {
        return ToolResult::timeout(invocation.name, start.elapsed());
    };

    hooks
        .fire_before_tool_call(&invocation.name, &invocation.params)
        .await;

    let tool_result = match registry.lookup(&invocation.name) {
        None => ToolResult::not_found(invocation.name.clone()),
        Some(tool) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let budget = remaining.min(tool.execution_timeout());
            match tokio::time::timeout(budget, tool.execute(invocation.params.clone())).await {
                Ok(Ok(value)) => ToolResult::success(invocation.name.clone(), value, start.elapsed()),
                Ok(Err(err)) => {
                    ToolResult::error(invocation.name.clone(), err.to_string(), start.elapsed())
                }
                Err(_elapsed) => ToolResult::timeout(invocation.name.clone(), start.elapsed()),
            }
        }
    };

    hooks
        .fire_after_tool_call(
            &invocation.name,
            tool_result.value.as_ref(),
            tool_result.error.as_deref(),
        )
        .await;

    tool_result
}

/// Fold a batch's results into a name-keyed map. Last occurrence wins on a
/// duplicate name within one batch (SPEC_FULL §9, tool-name collisions).
pub fn fold_by_name(results: Vec<ToolResult>) -> HashMap<String, ToolResult> {
    let mut map = HashMap::with_capacity(results.len());
    for result in results {
        map.insert(result.name.clone(), result);
    }
    map
}

/// Stringify a successful tool value for the model: a bare string passes
/// through as-is, `null`/absent becomes a fixed success message, anything
/// else is JSON-encoded.
fn format_tool_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "Tool executed successfully with no output".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Render one result as the text that gets folded back into the
/// conversation. `available_tools` feeds the `NotFound` case's tool list.
pub fn format_result_for_model(result: &ToolResult, available_tools: &[String]) -> String {
    match result.status {
        ToolStatus::Success => {
            format!("Tool '{}' result: {}", result.name, format_tool_value(result.value.as_ref()))
        }
        ToolStatus::Error => {
            let message = result.error.as_deref().unwrap_or("unknown error");
            format!("Tool '{}' result: Error: {}", result.name, message)
        }
        ToolStatus::Timeout => {
            format!(
                "Tool '{}' result: Error: Tool '{}' execution timed out after {:?}",
                result.name, result.name, result.elapsed
            )
        }
        ToolStatus::NotFound => {
            format!(
                "Tool error: Tool '{}' not found. Available tools: {}",
                result.name,
                available_tools.join(", ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Echo;

    #[async_trait]
    impl crate::tools::Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        async fn execute(&self, params: Value) -> Result<Value> {
            Ok(params)
        }
    }

    struct Failing;

    #[async_trait]
    impl crate::tools::Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        async fn execute(&self, _params: Value) -> Result<Value> {
            Err(Error::tool("boom"))
        }
    }

    struct Slow {
        delay: Duration,
        timeout: Duration,
    }

    #[async_trait]
    impl crate::tools::Tool for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps before returning"
        }
        async fn execute(&self, _params: Value) -> Result<Value> {
            tokio::time::sleep(self.delay).await;
            Ok(json!("done"))
        }
        fn execution_timeout(&self) -> Duration {
            self.timeout
        }
    }

    fn registry_with(tools: Vec<Arc<dyn crate::tools::Tool>>) -> Arc<ToolRegistry> {
        let registry = Arc::new(ToolRegistry::new());
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    #[tokio::test]
    async fn executes_batch_preserving_call_order() {
        let registry = registry_with(vec![Arc::new(Echo), Arc::new(Failing)]);
        let executor = ToolExecutor::new(registry, HookList::new(), ExecutorConfig::default()).unwrap();

        let results = executor
            .execute_batch(vec![
                ToolInvocation {
                    name: "echo".to_string(),
                    params: json!({"n": 1}),
                },
                ToolInvocation {
                    name: "failing".to_string(),
                    params: json!({}),
                },
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "echo");
        assert!(results[0].is_ok());
        assert_eq!(results[1].name, "failing");
        assert_eq!(results[1].status, ToolStatus::Error);
    }

    #[tokio::test]
    async fn unknown_tool_returns_not_found() {
        let registry = registry_with(vec![]);
        let executor = ToolExecutor::new(registry, HookList::new(), ExecutorConfig::default()).unwrap();

        let results = executor
            .execute_batch(vec![ToolInvocation {
                name: "ghost".to_string(),
                params: json!({}),
            }])
            .await;

        assert_eq!(results[0].status, ToolStatus::NotFound);
        assert_eq!(results[0].error.as_deref(), Some("tool not found: ghost"));
    }

    #[tokio::test(start_paused = true)]
    async fn per_tool_timeout_is_enforced() {
        let registry = registry_with(vec![Arc::new(Slow {
            delay: Duration::from_secs(10),
            timeout: Duration::from_millis(50),
        })]);
        let config = ExecutorConfig {
            max_concurrency: 4,
            batch_timeout: Duration::from_secs(60),
        };
        let executor = ToolExecutor::new(registry, HookList::new(), config).unwrap();

        let results = executor
            .execute_batch(vec![ToolInvocation {
                name: "slow".to_string(),
                params: json!({}),
            }])
            .await;

        assert_eq!(results[0].status, ToolStatus::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_deadline_preempts_calls_still_queued_for_a_permit() {
        let registry = registry_with(vec![Arc::new(Slow {
            delay: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
        })]);
        let config = ExecutorConfig {
            max_concurrency: 1,
            batch_timeout: Duration::from_millis(100),
        };
        let executor = ToolExecutor::new(registry, HookList::new(), config).unwrap();

        let results = executor
            .execute_batch(vec![
                ToolInvocation {
                    name: "slow".to_string(),
                    params: json!({}),
                },
                ToolInvocation {
                    name: "slow".to_string(),
                    params: json!({}),
                },
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == ToolStatus::Timeout));
    }

    #[test]
    fn fold_by_name_keeps_last_occurrence() {
        let results = vec![
            ToolResult::success("echo", json!(1), Duration::ZERO),
            ToolResult::success("echo", json!(2), Duration::ZERO),
        ];
        let folded = fold_by_name(results);
        assert_eq!(folded.get("echo").unwrap().value, Some(json!(2)));
    }

    #[test]
    fn formats_success_and_not_found_per_the_wire_contract() {
        let success = ToolResult::success("echo", json!(4), Duration::ZERO);
        let missing = ToolResult::not_found("ghost");
        let available = vec!["echo".to_string()];
        assert_eq!(format_result_for_model(&success, &available), "Tool 'echo' result: 4");
        assert_eq!(
            format_result_for_model(&missing, &available),
            "Tool error: Tool 'ghost' not found. Available tools: echo"
        );
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = ExecutorConfig {
            max_concurrency: 0,
            ..ExecutorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
