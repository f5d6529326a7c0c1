//! Shared mock `Provider`/`Tool` harness for the integration test suite.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use agent_orchestration_core::{
    AgentOptions, Error, Message, Provider, ProviderOption, Response, Result, Tool,
};
use async_trait::async_trait;
use serde_json::Value;

/// A provider that returns a fixed script of responses in order, then
/// repeats its last entry forever. Counts how many times it was called.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Response>>,
    call_count: AtomicUsize,
    captured: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Response>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: AtomicUsize::new(0),
            captured: Mutex::new(Vec::new()),
        }
    }

    pub fn from_text(lines: &[&str]) -> Self {
        Self::new(lines.iter().map(|line| Response::new(*line)).collect())
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every call's message slice, in call order.
    pub fn captured_calls(&self) -> Vec<Vec<Message>> {
        self.captured.lock().expect("scripted provider lock poisoned").clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, messages: &[Message], _options: &[ProviderOption]) -> Result<Response> {
        self.captured
            .lock()
            .expect("scripted provider lock poisoned")
            .push(messages.to_vec());
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        let script = self.responses.lock().expect("scripted provider lock poisoned");
        let response = script
            .get(index)
            .or_else(|| script.last())
            .cloned()
            .unwrap_or_else(|| Response::new("done"));
        Ok(response)
    }
}

/// A tool that evaluates a trivial subset of arithmetic: `"a+b"` where both
/// sides parse as `f64`. Good enough for the calculator-themed scenarios.
pub struct Calculator {
    pub delay: Duration,
}

impl Calculator {
    pub fn new() -> Self {
        Self { delay: Duration::ZERO }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Tool for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "evaluates a simple a+b arithmetic expression"
    }

    fn parameter_schema(&self) -> Option<Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": { "expression": { "type": "string" } },
            "required": ["expression"],
        }))
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let expression = params
            .get("expression")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_input("missing expression"))?;
        let (lhs, rhs) = expression
            .split_once('+')
            .ok_or_else(|| Error::invalid_input("expected an a+b expression"))?;
        let lhs: f64 = lhs.trim().parse().map_err(|_| Error::invalid_input("bad lhs"))?;
        let rhs: f64 = rhs.trim().parse().map_err(|_| Error::invalid_input("bad rhs"))?;
        Ok(serde_json::json!(lhs + rhs))
    }
}

/// A tool that just sleeps, used to exercise parallel dispatch timing and
/// per-tool timeouts.
pub struct SleepTool {
    name: String,
    delay: Duration,
}

impl SleepTool {
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self { name: name.into(), delay }
    }
}

#[async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "sleeps for a fixed duration and returns its name"
    }

    async fn execute(&self, _params: Value) -> Result<Value> {
        tokio::time::sleep(self.delay).await;
        Ok(serde_json::json!(self.name))
    }
}

pub fn options_with_model(model: &str) -> AgentOptions {
    AgentOptions::builder()
        .model(model)
        .use_cache(false)
        .build()
        .expect("valid agent options")
}
