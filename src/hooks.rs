//! # Lifecycle Hooks
//!
//! Observers attached to the generate/tool boundaries of the Agent Loop.
//! Hooks are fired in registration order; a single generation call obeys
//! `BeforeGenerate` happens-before the provider call happens-before
//! `AfterGenerate`, and a single tool call obeys `Before → Execute → After`
//! on the worker that runs it (SPEC_FULL §5).

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::types::Message;

/// Event data passed to `before_generate`.
#[derive(Debug, Clone)]
pub struct BeforeGenerateEvent<'a> {
    pub messages: &'a [Message],
}

/// Event data passed to `after_generate`.
#[derive(Debug, Clone)]
pub struct AfterGenerateEvent<'a> {
    pub response: Option<&'a str>,
    pub error: Option<&'a str>,
}

/// Event data passed to `before_tool_call`.
#[derive(Debug, Clone)]
pub struct BeforeToolCallEvent<'a> {
    pub tool_name: &'a str,
    /// Tool parameters coerced to a `string → any` mapping (SPEC_FULL §9
    /// "Dynamic parameter shapes"): non-object params are wrapped under a
    /// synthetic `"value"` key for the hook view only; the tool itself
    /// always receives the original, uncoerced `Value`.
    pub params: &'a Map<String, Value>,
}

/// Event data passed to `after_tool_call`.
#[derive(Debug, Clone)]
pub struct AfterToolCallEvent<'a> {
    pub tool_name: &'a str,
    pub result: Option<&'a Value>,
    pub error: Option<&'a str>,
}

/// An observer attached to generate/tool boundaries.
///
/// All methods have empty default bodies so implementors only override
/// the callbacks they care about.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn before_generate(&self, _event: BeforeGenerateEvent<'_>) {}
    async fn after_generate(&self, _event: AfterGenerateEvent<'_>) {}
    async fn before_tool_call(&self, _event: BeforeToolCallEvent<'_>) {}
    async fn after_tool_call(&self, _event: AfterToolCallEvent<'_>) {}
}

/// Coerce arbitrary tool params into a `string → any` mapping for the hook
/// view. Objects pass through; everything else is wrapped under `"value"`.
pub fn coerce_params_for_hooks(params: &Value) -> Map<String, Value> {
    match params {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    }
}

/// An ordered collection of hooks, fired sequentially.
#[derive(Clone, Default)]
pub struct HookList {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookList {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn push(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn fire_before_generate(&self, messages: &[Message]) {
        for hook in &self.hooks {
            hook.before_generate(BeforeGenerateEvent { messages }).await;
        }
    }

    pub async fn fire_after_generate(&self, response: Option<&str>, error: Option<&str>) {
        for hook in &self.hooks {
            hook.after_generate(AfterGenerateEvent { response, error })
                .await;
        }
    }

    pub async fn fire_before_tool_call(&self, tool_name: &str, params: &Value) {
        let coerced = coerce_params_for_hooks(params);
        for hook in &self.hooks {
            hook.before_tool_call(BeforeToolCallEvent {
                tool_name,
                params: &coerced,
            })
            .await;
        }
    }

    pub async fn fire_after_tool_call(
        &self,
        tool_name: &str,
        result: Option<&Value>,
        error: Option<&str>,
    ) {
        for hook in &self.hooks {
            hook.after_tool_call(AfterToolCallEvent {
                tool_name,
                result,
                error,
            })
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHook {
        before_generate: AtomicUsize,
        after_generate: AtomicUsize,
        before_tool: AtomicUsize,
        after_tool: AtomicUsize,
    }

    #[async_trait]
    impl Hook for CountingHook {
        async fn before_generate(&self, _event: BeforeGenerateEvent<'_>) {
            self.before_generate.fetch_add(1, Ordering::SeqCst);
        }
        async fn after_generate(&self, _event: AfterGenerateEvent<'_>) {
            self.after_generate.fetch_add(1, Ordering::SeqCst);
        }
        async fn before_tool_call(&self, _event: BeforeToolCallEvent<'_>) {
            self.before_tool.fetch_add(1, Ordering::SeqCst);
        }
        async fn after_tool_call(&self, _event: AfterToolCallEvent<'_>) {
            self.after_tool.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn fires_all_registered_hooks() {
        let hook = Arc::new(CountingHook::default());
        let mut hooks = HookList::new();
        hooks.push(hook.clone());

        hooks.fire_before_generate(&[]).await;
        hooks.fire_after_generate(Some("hi"), None).await;
        hooks.fire_before_tool_call("calculator", &json!({"expression": "2+2"})).await;
        hooks.fire_after_tool_call("calculator", Some(&json!(4)), None).await;

        assert_eq!(hook.before_generate.load(Ordering::SeqCst), 1);
        assert_eq!(hook.after_generate.load(Ordering::SeqCst), 1);
        assert_eq!(hook.before_tool.load(Ordering::SeqCst), 1);
        assert_eq!(hook.after_tool.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn coerce_object_params_passes_through() {
        let params = json!({"expression": "2+2"});
        let coerced = coerce_params_for_hooks(&params);
        assert_eq!(coerced.get("expression"), Some(&json!("2+2")));
    }

    #[test]
    fn coerce_non_object_params_wraps_under_value() {
        let params = json!("2+2");
        let coerced = coerce_params_for_hooks(&params);
        assert_eq!(coerced.get("value"), Some(&json!("2+2")));
    }
}
