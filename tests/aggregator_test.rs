//! Multi-provider consensus aggregation, SPEC_FULL §8 scenario 10.

use std::sync::Arc;

use agent_orchestration_core::{
    AggregatorConfig, Message, Provider, ProviderAggregator, ProviderOption, Response, Result,
    Strategy, WeightedProvider,
};
use async_trait::async_trait;

struct FixedProvider {
    name: &'static str,
    content: &'static str,
}

#[async_trait]
impl Provider for FixedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn generate(&self, _messages: &[Message], _options: &[ProviderOption]) -> Result<Response> {
        Ok(Response::new(self.content))
    }
}

#[tokio::test]
async fn consensus_picks_the_weighted_majority_answer() {
    let aggregator = ProviderAggregator::new(
        vec![
            WeightedProvider::new(Arc::new(FixedProvider { name: "a", content: "A" }), 4),
            WeightedProvider::new(Arc::new(FixedProvider { name: "b", content: "A" }), 4),
            WeightedProvider::new(Arc::new(FixedProvider { name: "c", content: "B" }), 2),
        ],
        AggregatorConfig {
            strategy: Strategy::Consensus { quorum: 2 },
            ..AggregatorConfig::default()
        },
    )
    .unwrap();

    let response = aggregator.generate(&[Message::user("ping")], &[]).await.unwrap();

    assert_eq!(response.content, "A");
}
