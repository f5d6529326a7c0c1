//! Response cache scenarios driven end-to-end through `Agent` (hit/miss)
//! and directly against `ResponseCache` (capacity eviction). SPEC_FULL §8
//! scenarios 6 and 7.

mod common;

use std::sync::Arc;
use std::time::Duration;

use agent_orchestration_core::{AgentOptions, Agent, CacheConfig, Response, ResponseCache};
use common::ScriptedProvider;

#[tokio::test]
async fn identical_runs_hit_the_cache_and_call_the_provider_once() {
    let provider = Arc::new(ScriptedProvider::from_text(&["4"]));
    let make_opts = || {
        AgentOptions::builder()
            .model("cache-hit-model")
            .use_cache(true)
            .build()
            .unwrap()
    };

    let first_agent = Agent::new(provider.clone(), make_opts()).unwrap();
    let first = first_agent.run("What is 2+2?").await.unwrap();

    let second_agent = Agent::new(provider.clone(), make_opts()).unwrap();
    let second = second_agent.run("What is 2+2?").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.call_count(), 1, "second identical run should be served from cache");
}

#[test]
fn capacity_overflow_evicts_the_least_used_entry() {
    let cache = ResponseCache::new(CacheConfig {
        capacity: 2,
        ttl: Duration::from_secs(3600),
    })
    .unwrap();

    cache.set("k1", Response::new("v1"), "test");
    cache.set("k2", Response::new("v2"), "test");
    assert_eq!(cache.len(), 2);

    // Touch k1 so it is no longer the least-recently-used entry.
    assert!(cache.get("k1").is_some());

    cache.set("k3", Response::new("v3"), "test");

    assert_eq!(cache.len(), 2);
    assert!(cache.get("k1").is_some(), "k1 was touched and should survive");
    assert!(cache.get("k3").is_some(), "freshly inserted k3 should survive");
    assert!(cache.get("k2").is_none(), "k2 was least used and should have been evicted");
}
