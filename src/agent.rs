//! # Agent Loop (C7)
//!
//! Ties every other component together into the reasoning loop: fetch the
//! window's view of the conversation, generate (through the cache when
//! enabled), extract tool calls from the reply, dispatch them in parallel,
//! fold the results back in, and repeat until the model stops asking for
//! tools or `max_iterations` is hit.

use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::cache::{self, ResponseCache};
use crate::error::{Error, Result};
use crate::executor::{self, ExecutorConfig, ToolExecutor};
use crate::extractor;
use crate::hooks::{Hook, HookList};
use crate::prompt::{DefaultPromptEnhancer, PromptEnhancer};
use crate::provider::{Provider, ProviderOption, Response, Usage};
use crate::tools::{Tool, ToolInvocation, ToolRegistry};
use crate::types::{ContentBlock, Message, MessageRole};
use crate::window::{ConversationWindow, WindowConfig};

/// A finished run's accounting, in addition to its text output.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub output: String,
    pub iterations: usize,
    pub usage: Option<Usage>,
}

/// Validated configuration for an `Agent`.
#[derive(Clone)]
pub struct AgentOptions {
    pub model: String,
    pub system_prompt: Option<String>,
    pub max_iterations: usize,
    pub window: WindowConfig,
    pub executor: ExecutorConfig,
    pub use_cache: bool,
    pub provider_options: Vec<ProviderOption>,
}

impl AgentOptions {
    pub fn builder() -> AgentOptionsBuilder {
        AgentOptionsBuilder::new()
    }
}

/// Builder for `AgentOptions`, following the rest of this crate's
/// `*Config` builder convention.
pub struct AgentOptionsBuilder {
    model: Option<String>,
    system_prompt: Option<String>,
    max_iterations: usize,
    window: WindowConfig,
    executor: ExecutorConfig,
    use_cache: bool,
    provider_options: Vec<ProviderOption>,
}

impl AgentOptionsBuilder {
    pub fn new() -> Self {
        Self {
            model: None,
            system_prompt: None,
            max_iterations: 10,
            window: WindowConfig::default(),
            executor: ExecutorConfig::default(),
            use_cache: true,
            provider_options: Vec::new(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn window_config(mut self, config: WindowConfig) -> Self {
        self.window = config;
        self
    }

    pub fn executor_config(mut self, config: ExecutorConfig) -> Self {
        self.executor = config;
        self
    }

    pub fn use_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    pub fn provider_option(mut self, option: ProviderOption) -> Self {
        self.provider_options.push(option);
        self
    }

    pub fn build(self) -> Result<AgentOptions> {
        let model = self
            .model
            .ok_or_else(|| Error::config("model is required"))?;
        if model.is_empty() {
            return Err(Error::config("model must not be empty"));
        }
        if self.max_iterations == 0 {
            return Err(Error::config("max_iterations must be at least 1"));
        }
        self.window.validate()?;
        self.executor.validate()?;

        Ok(AgentOptions {
            model,
            system_prompt: self.system_prompt,
            max_iterations: self.max_iterations,
            window: self.window,
            executor: self.executor,
            use_cache: self.use_cache,
            provider_options: self.provider_options,
        })
    }
}

impl Default for AgentOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn accumulate_usage(existing: Option<Usage>, addition: Usage) -> Usage {
    match existing {
        None => addition,
        Some(prior) => Usage {
            prompt_tokens: prior.prompt_tokens + addition.prompt_tokens,
            completion_tokens: prior.completion_tokens + addition.completion_tokens,
            total_tokens: prior.total_tokens + addition.total_tokens,
        },
    }
}

/// The reasoning loop. Thread-safe: every mutator takes `&self`, so an
/// `Agent` is typically shared behind an `Arc` across concurrent `run`
/// calls (each call owns its own window additions, but the window and
/// tool registry are shared state).
pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    window: ConversationWindow,
    hooks: RwLock<HookList>,
    cache: Option<Arc<ResponseCache>>,
    model: RwLock<String>,
    system_prompt: RwLock<String>,
    prompt_enhancer: RwLock<Arc<dyn PromptEnhancer>>,
    max_iterations: usize,
    executor_config: ExecutorConfig,
    provider_options: Vec<ProviderOption>,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, options: AgentOptions) -> Result<Self> {
        let window = ConversationWindow::new(options.window)?;
        let cache = options.use_cache.then(cache::global);

        let agent = Self {
            provider,
            tools: Arc::new(ToolRegistry::new()),
            window,
            hooks: RwLock::new(HookList::new()),
            cache,
            model: RwLock::new(options.model),
            system_prompt: RwLock::new(options.system_prompt.unwrap_or_default()),
            prompt_enhancer: RwLock::new(Arc::new(DefaultPromptEnhancer)),
            max_iterations: options.max_iterations,
            executor_config: options.executor,
            provider_options: options.provider_options,
        };
        agent.refresh_system_message();
        Ok(agent)
    }

    pub fn add_tool(&self, tool: Arc<dyn Tool>) -> &Self {
        self.tools.register(tool);
        self.refresh_system_message();
        self
    }

    pub fn set_system_prompt(&self, prompt: impl Into<String>) -> &Self {
        *self
            .system_prompt
            .write()
            .expect("agent system prompt lock poisoned") = prompt.into();
        self.refresh_system_message();
        self
    }

    pub fn with_model(&self, model: impl Into<String>) -> &Self {
        *self.model.write().expect("agent model lock poisoned") = model.into();
        self
    }

    pub fn with_hook(&self, hook: Arc<dyn Hook>) -> &Self {
        self.hooks
            .write()
            .expect("agent hooks lock poisoned")
            .push(hook);
        self
    }

    /// Swap the prompt enhancer used to prepare schema-mode prompts.
    pub fn with_prompt_enhancer(&self, enhancer: Arc<dyn PromptEnhancer>) -> &Self {
        *self
            .prompt_enhancer
            .write()
            .expect("agent prompt enhancer lock poisoned") = enhancer;
        self
    }

    /// Recompute the window's System message from `system_prompt` plus the
    /// tool registry's description (separator `"\n\n"`). Called whenever
    /// either input changes.
    fn refresh_system_message(&self) {
        let base = self
            .system_prompt
            .read()
            .expect("agent system prompt lock poisoned")
            .clone();
        let composed = if self.tools.is_empty() {
            base
        } else if base.is_empty() {
            self.tools.description()
        } else {
            format!("{base}\n\n{}", self.tools.description())
        };
        self.window.set_system_prompt(&composed);
    }

    /// Run to a final text answer.
    pub async fn run(&self, input: impl Into<Message>) -> Result<String> {
        Ok(self.run_detailed(input, None).await?.output)
    }

    /// Run constrained to a JSON Schema. Providers without native
    /// structured-output support still get the schema via
    /// `Provider::generate_with_schema`'s default (plain `generate`);
    /// providers that honor it get a structurally valid answer.
    pub async fn run_with_schema(&self, input: impl Into<Message>, schema: Value) -> Result<String> {
        Ok(self.run_detailed(input, Some(&schema)).await?.output)
    }

    /// Run to completion, returning the final answer plus iteration and
    /// usage accounting (SPEC_FULL §3.1).
    ///
    /// In schema mode, generation is always terminal on success: there is
    /// no tool-call loop once a structured answer comes back.
    pub async fn run_detailed(&self, input: impl Into<Message>, schema: Option<&Value>) -> Result<AgentRun> {
        self.refresh_system_message();
        let input_message: Message = input.into();
        let budget = self.window.max_tokens();

        if let Some(schema) = schema {
            return self.run_schema_mode(input_message, schema, budget).await;
        }

        self.window.add_message(input_message);
        let model = self.model.read().expect("agent model lock poisoned").clone();
        let mut usage_total: Option<Usage> = None;

        for iteration in 1..=self.max_iterations {
            let messages = self.window.get_for_model(budget);
            let hooks = self.hooks.read().expect("agent hooks lock poisoned").clone();
            hooks.fire_before_generate(&messages).await;

            // Cache probe and store are confined to the first generation of
            // a conversation; tool-follow-up generations are never cached.
            let cache_key = if iteration == 1 {
                self.cache
                    .as_ref()
                    .map(|_| cache::compute_key(&messages, &model, &self.provider_options))
            } else {
                None
            };
            let cached = match (&self.cache, &cache_key) {
                (Some(cache), Some(key)) => cache.get(key),
                _ => None,
            };

            let response = match cached {
                Some(response) => response,
                None => {
                    let attempt = self.provider.generate(&messages, &self.provider_options).await;
                    match &attempt {
                        Ok(response) => hooks.fire_after_generate(Some(&response.content), None).await,
                        Err(err) => hooks.fire_after_generate(None, Some(&err.to_string())).await,
                    }
                    let response = attempt
                        .map_err(|err| Error::other(format!("LLM generation failed: {}", err)))?;
                    if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
                        cache.set(key.clone(), response.clone(), self.provider.name());
                    }
                    response
                }
            };

            usage_total = match response.usage {
                Some(u) => Some(accumulate_usage(usage_total, u)),
                None => usage_total,
            };

            let extraction = extractor::extract(&response.content);
            self.window
                .add_message(Message::assistant(response.content.clone()));

            if !extraction.has_calls() {
                return Ok(AgentRun {
                    output: response.content,
                    iterations: iteration,
                    usage: usage_total,
                });
            }

            let invocations: Vec<ToolInvocation> = extraction
                .calls
                .into_iter()
                .map(|call| ToolInvocation {
                    name: call.name,
                    params: call.params,
                })
                .collect();

            let available_tools = self.tools.names();
            let tool_executor =
                ToolExecutor::new(self.tools.clone(), hooks.clone(), self.executor_config)?;
            let results = tool_executor.execute_batch(invocations).await;

            let block = if results.len() == 1 {
                executor::format_result_for_model(&results[0], &available_tools)
            } else {
                let folded = executor::fold_by_name(results);
                let mut names: Vec<&String> = folded.keys().collect();
                names.sort();
                let mut lines = vec!["Tool results:".to_string()];
                lines.extend(
                    names
                        .into_iter()
                        .map(|name| executor::format_result_for_model(&folded[name], &available_tools)),
                );
                lines.join("\n")
            };

            self.window
                .add_message(Message::new(MessageRole::User, vec![ContentBlock::text(block)]));
        }

        Ok(AgentRun {
            output: "Agent reached maximum iterations without final result".to_string(),
            iterations: self.max_iterations,
            usage: usage_total,
        })
    }

    async fn run_schema_mode(&self, input: Message, schema: &Value, budget: usize) -> Result<AgentRun> {
        let enhancer = self
            .prompt_enhancer
            .read()
            .expect("agent prompt enhancer lock poisoned")
            .clone();
        let enhanced = enhancer
            .enhance(&input.text(), schema)
            .await
            .map_err(|err| Error::prompt_enhancement(err.to_string()))?;
        self.window.add_message(Message::user(enhanced));

        let messages = self.window.get_for_model(budget);
        let hooks = self.hooks.read().expect("agent hooks lock poisoned").clone();
        hooks.fire_before_generate(&messages).await;

        let prompt = messages.last().map(Message::text).unwrap_or_default();
        let attempt = self
            .provider
            .generate_with_schema_prompt(&prompt, schema, &self.provider_options)
            .await;
        match &attempt {
            Ok(response) => hooks.fire_after_generate(Some(&response.content), None).await,
            Err(err) => hooks.fire_after_generate(None, Some(&err.to_string())).await,
        }
        let response =
            attempt.map_err(|err| Error::other(format!("LLM generation failed: {}", err)))?;

        self.window
            .add_message(Message::assistant(response.content.clone()));

        Ok(AgentRun {
            output: response.content,
            iterations: 1,
            usage: response.usage,
        })
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::user(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::user(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedProvider {
        responses: Mutex<Vec<Response>>,
        call_count: AtomicUsize,
        captured: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Response>) -> Self {
            Self {
                responses: Mutex::new(responses),
                call_count: AtomicUsize::new(0),
                captured: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, messages: &[Message], _options: &[ProviderOption]) -> Result<Response> {
            self.captured.lock().unwrap().push(messages.to_vec());
            let index = self.call_count.fetch_add(1, Ordering::SeqCst);
            let responses = self.responses.lock().unwrap();
            Ok(responses
                .get(index)
                .cloned()
                .unwrap_or_else(|| Response::new("done")))
        }
    }

    struct Calculator;

    #[async_trait]
    impl Tool for Calculator {
        fn name(&self) -> &str {
            "calculator"
        }
        fn description(&self) -> &str {
            "adds two numbers"
        }
        async fn execute(&self, params: Value) -> Result<Value> {
            let a = params.get("a").and_then(Value::as_i64).unwrap_or(0);
            let b = params.get("b").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(a + b))
        }
    }

    fn options() -> AgentOptions {
        AgentOptions::builder()
            .model("mock-model")
            .use_cache(false)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn simple_passthrough_with_no_tool_calls() {
        let provider = Arc::new(ScriptedProvider::new(vec![Response::new("hello there")]));
        let agent = Agent::new(provider.clone(), options()).unwrap();

        let run = agent.run_detailed("hi", None).await.unwrap();
        assert_eq!(run.output, "hello there");
        assert_eq!(run.iterations, 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn single_tool_call_round_trip() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Response::new(r#"{"tool":"calculator","params":{"a":2,"b":2}}"#),
            Response::new("the answer is 4"),
        ]));
        let agent = Agent::new(provider.clone(), options()).unwrap();
        agent.add_tool(Arc::new(Calculator));

        let run = agent.run_detailed("what is 2+2?", None).await.unwrap();
        assert_eq!(run.output, "the answer is 4");
        assert_eq!(run.iterations, 2);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn unknown_tool_call_is_recovered_from_not_terminal() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Response::new(r#"{"tool":"ghost","params":{}}"#),
            Response::new("I couldn't find that tool"),
        ]));
        let agent = Agent::new(provider.clone(), options()).unwrap();

        let run = agent.run_detailed("use the ghost tool", None).await.unwrap();
        assert_eq!(run.output, "I couldn't find that tool");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn exceeding_max_iterations_returns_the_sentinel_successfully() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Response::new(r#"{"tool":"calculator","params":{"a":1,"b":1}}"#),
        ]));
        let opts = AgentOptions::builder()
            .model("mock-model")
            .use_cache(false)
            .max_iterations(1)
            .build()
            .unwrap();
        let agent = Agent::new(provider, opts).unwrap();
        agent.add_tool(Arc::new(Calculator));

        let run = agent.run_detailed("loop forever", None).await.unwrap();
        assert_eq!(run.output, "Agent reached maximum iterations without final result");
        assert_eq!(run.iterations, 1);
    }

    #[tokio::test]
    async fn cache_hit_skips_a_second_provider_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![Response::new("cached answer")]));
        let make_opts = || {
            AgentOptions::builder()
                .model("mock-model-cache-test")
                .use_cache(true)
                .build()
                .unwrap()
        };
        let question = "a question unique to this test 8f3a1c";

        let first_agent = Agent::new(provider.clone(), make_opts()).unwrap();
        let first = first_agent.run_detailed(question, None).await.unwrap();
        assert_eq!(first.output, "cached answer");

        // A second, independent agent asking the identical first question
        // should hit the process-wide cache instead of calling the
        // provider again.
        let second_agent = Agent::new(provider.clone(), make_opts()).unwrap();
        let second = second_agent.run_detailed(question, None).await.unwrap();
        assert_eq!(second.output, "cached answer");

        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn builder_rejects_missing_model() {
        assert!(AgentOptions::builder().build().is_err());
    }

    #[test]
    fn builder_rejects_zero_max_iterations() {
        let result = AgentOptions::builder().model("m").max_iterations(0).build();
        assert!(result.is_err());
    }
}
