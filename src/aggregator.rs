//! # Provider Aggregator (C6)
//!
//! Fans a single request out across several weighted providers and
//! reconciles their answers according to one of three strategies:
//!
//! - `Fastest` — race every child, return the first success.
//! - `Primary` — try children in weight order, retrying each with backoff
//!   before falling through to the next.
//! - `Consensus { quorum }` — call every child, return the response whose
//!   (trimmed) text is shared by at least `quorum` children, breaking ties
//!   by total child weight.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future;

use crate::error::{Error, Result};
use crate::provider::{Provider, ProviderOption, Response};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::types::Message;

/// A provider plus its weight, used to break `Primary` ordering ties and
/// `Consensus` group ties.
#[derive(Clone)]
pub struct WeightedProvider {
    pub provider: Arc<dyn Provider>,
    pub weight: u32,
}

impl WeightedProvider {
    pub fn new(provider: Arc<dyn Provider>, weight: u32) -> Self {
        Self { provider, weight }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fastest,
    Primary,
    Consensus { quorum: usize },
}

#[derive(Clone)]
pub struct AggregatorConfig {
    pub strategy: Strategy,
    pub retry: RetryConfig,
    /// Deadline for the aggregator as a whole, separate from any timeout a
    /// child provider enforces on itself. Expiry fails the call even if a
    /// child is still in flight.
    pub timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Fastest,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Running latency/failure counters for one child provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildMetrics {
    pub calls: u64,
    pub failures: u64,
    pub total_latency: Duration,
}

impl ChildMetrics {
    pub fn average_latency(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total_latency / self.calls as u32
        }
    }
}

pub struct ProviderAggregator {
    children: Vec<WeightedProvider>,
    config: AggregatorConfig,
    metrics: RwLock<HashMap<String, ChildMetrics>>,
}

impl ProviderAggregator {
    pub fn new(children: Vec<WeightedProvider>, config: AggregatorConfig) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::aggregator("at least one provider is required"));
        }
        if let Strategy::Consensus { quorum } = config.strategy {
            if quorum == 0 || quorum > children.len() {
                return Err(Error::aggregator(
                    "consensus quorum must be between 1 and the number of providers",
                ));
            }
        }
        Ok(Self {
            children,
            config,
            metrics: RwLock::new(HashMap::new()),
        })
    }

    pub fn metrics_for(&self, name: &str) -> ChildMetrics {
        self.metrics
            .read()
            .expect("aggregator metrics lock poisoned")
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    fn record(&self, name: &str, latency: Duration, failed: bool) {
        let mut metrics = self.metrics.write().expect("aggregator metrics lock poisoned");
        let entry = metrics.entry(name.to_string()).or_default();
        entry.calls += 1;
        entry.total_latency += latency;
        if failed {
            entry.failures += 1;
        }
    }

    pub async fn generate(&self, messages: &[Message], options: &[ProviderOption]) -> Result<Response> {
        match self.config.strategy {
            Strategy::Fastest => self.generate_fastest(messages, options).await,
            Strategy::Primary => self.generate_primary(messages, options).await,
            Strategy::Consensus { quorum } => self.generate_consensus(messages, options, quorum).await,
        }
    }

    async fn call_one(
        &self,
        child: &WeightedProvider,
        messages: &[Message],
        options: &[ProviderOption],
    ) -> Result<Response> {
        let start = Instant::now();
        let result = child.provider.generate(messages, options).await;
        self.record(child.provider.name(), start.elapsed(), result.is_err());
        result
    }

    async fn generate_fastest(&self, messages: &[Message], options: &[ProviderOption]) -> Result<Response> {
        let race = async {
            let mut pending: Vec<_> = self
                .children
                .iter()
                .map(|child| Box::pin(self.call_one(child, messages, options)))
                .collect();

            let mut last_err = None;
            while !pending.is_empty() {
                let (result, _index, remaining) = future::select_all(pending).await;
                pending = remaining;
                match result {
                    Ok(response) => return Ok(response),
                    Err(err) => last_err = Some(err),
                }
            }
            Err(last_err.unwrap_or_else(|| Error::aggregator("no providers configured")))
        };

        match tokio::time::timeout(self.config.timeout, race).await {
            Ok(result) => result,
            Err(_elapsed) => Err(Error::aggregator("no provider responded within the aggregator timeout")),
        }
    }

    async fn generate_primary(&self, messages: &[Message], options: &[ProviderOption]) -> Result<Response> {
        let mut ordered: Vec<&WeightedProvider> = self.children.iter().collect();
        ordered.sort_by(|a, b| b.weight.cmp(&a.weight));

        let mut last_err = None;
        for child in ordered {
            let attempt = retry_with_backoff(&self.config.retry, || {
                self.call_one(child, messages, options)
            })
            .await;
            match attempt {
                Ok(response) => return Ok(response),
                Err(err) => {
                    log::warn!(
                        "aggregator: primary candidate '{}' exhausted retries: {}",
                        child.provider.name(),
                        err
                    );
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::aggregator("no providers configured")))
    }

    async fn generate_consensus(
        &self,
        messages: &[Message],
        options: &[ProviderOption],
        quorum: usize,
    ) -> Result<Response> {
        let futures = self.children.iter().map(|child| self.call_one(child, messages, options));
        let results = match tokio::time::timeout(self.config.timeout, future::join_all(futures)).await {
            Ok(results) => results,
            Err(_elapsed) => {
                return Err(Error::aggregator("no provider responded within the aggregator timeout"))
            }
        };

        // (trimmed content, a representative response, total weight, vote count)
        let mut groups: Vec<(String, Response, u32, usize)> = Vec::new();
        for (child, result) in self.children.iter().zip(results) {
            let Ok(response) = result else { continue };
            let key = response.content.trim().to_string();
            match groups.iter_mut().find(|(k, ..)| *k == key) {
                Some(group) => {
                    group.2 += child.weight;
                    group.3 += 1;
                }
                None => groups.push((key, response, child.weight, 1)),
            }
        }

        groups.sort_by(|a, b| b.3.cmp(&a.3).then(b.2.cmp(&a.2)));

        groups
            .into_iter()
            .find(|(_, _, _, count)| *count >= quorum)
            .map(|(_, response, _, _)| response)
            .ok_or_else(|| Error::aggregator("no response reached consensus quorum"))
    }
}

/// The aggregator implements the same surface as a single provider so the
/// Agent Loop is oblivious to whether it's talking to one model or several.
#[async_trait]
impl Provider for ProviderAggregator {
    fn name(&self) -> &str {
        "aggregator"
    }

    async fn generate(&self, messages: &[Message], options: &[ProviderOption]) -> Result<Response> {
        self.generate(messages, options).await
    }

    async fn generate_with_schema(
        &self,
        messages: &[Message],
        schema: &serde_json::Value,
        options: &[ProviderOption],
    ) -> Result<Response> {
        match self.config.strategy {
            Strategy::Fastest => {
                let race = async {
                    let mut pending: Vec<_> = self
                        .children
                        .iter()
                        .map(|child| Box::pin(self.call_one_with_schema(child, messages, schema, options)))
                        .collect();
                    let mut last_err = None;
                    while !pending.is_empty() {
                        let (result, _index, remaining) = future::select_all(pending).await;
                        pending = remaining;
                        match result {
                            Ok(response) => return Ok(response),
                            Err(err) => last_err = Some(err),
                        }
                    }
                    Err(last_err.unwrap_or_else(|| Error::aggregator("no providers configured")))
                };
                match tokio::time::timeout(self.config.timeout, race).await {
                    Ok(result) => result,
                    Err(_elapsed) => {
                        Err(Error::aggregator("no provider responded within the aggregator timeout"))
                    }
                }
            }
            Strategy::Primary => {
                let mut ordered: Vec<&WeightedProvider> = self.children.iter().collect();
                ordered.sort_by(|a, b| b.weight.cmp(&a.weight));
                let mut last_err = None;
                for child in ordered {
                    let attempt = retry_with_backoff(&self.config.retry, || {
                        self.call_one_with_schema(child, messages, schema, options)
                    })
                    .await;
                    match attempt {
                        Ok(response) => return Ok(response),
                        Err(err) => last_err = Some(err),
                    }
                }
                Err(last_err.unwrap_or_else(|| Error::aggregator("no providers configured")))
            }
            Strategy::Consensus { .. } => {
                // Schema-constrained consensus has no well-defined grouping
                // (structured payloads rarely match byte-for-byte); fall
                // back to the first successful child.
                self.generate_fastest_with_schema(messages, schema, options).await
            }
        }
    }

    // `stream` uses the trait's default: it awaits `generate` (the strategy
    // dispatch above, via inherent-method priority) and emits one token.
}

impl ProviderAggregator {
    async fn call_one_with_schema(
        &self,
        child: &WeightedProvider,
        messages: &[Message],
        schema: &serde_json::Value,
        options: &[ProviderOption],
    ) -> Result<Response> {
        let start = Instant::now();
        let result = child.provider.generate_with_schema(messages, schema, options).await;
        self.record(child.provider.name(), start.elapsed(), result.is_err());
        result
    }

    async fn generate_fastest_with_schema(
        &self,
        messages: &[Message],
        schema: &serde_json::Value,
        options: &[ProviderOption],
    ) -> Result<Response> {
        let race = async {
            let mut pending: Vec<_> = self
                .children
                .iter()
                .map(|child| Box::pin(self.call_one_with_schema(child, messages, schema, options)))
                .collect();
            let mut last_err = None;
            while !pending.is_empty() {
                let (result, _index, remaining) = future::select_all(pending).await;
                pending = remaining;
                match result {
                    Ok(response) => return Ok(response),
                    Err(err) => last_err = Some(err),
                }
            }
            Err(last_err.unwrap_or_else(|| Error::aggregator("no providers configured")))
        };
        match tokio::time::timeout(self.config.timeout, race).await {
            Ok(result) => result,
            Err(_elapsed) => Err(Error::aggregator("no provider responded within the aggregator timeout")),
        }
    }
}
