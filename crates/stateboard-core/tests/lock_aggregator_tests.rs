//! Lock aggregation across fake providers: merging, conflicts, failure
//! policies and timeouts.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use stateboard_core::errors::StateError;
use stateboard_core::lineage::LineageKey;
use stateboard_core::locks::{
    AggregatorConfig, FailurePolicy, LockAggregator, LockInfo, ProviderError, StateProvider,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Fake providers
// ---------------------------------------------------------------------------

struct StaticProvider {
    name: String,
    locks: BTreeMap<LineageKey, LockInfo>,
    delay: Duration,
}

impl StaticProvider {
    fn new(name: &str, locks: Vec<LockInfo>) -> Arc<dyn StateProvider> {
        Self::delayed(name, locks, Duration::ZERO)
    }

    fn delayed(name: &str, locks: Vec<LockInfo>, delay: Duration) -> Arc<dyn StateProvider> {
        Arc::new(Self {
            name: name.to_string(),
            locks: locks.into_iter().map(|l| (l.lineage.clone(), l)).collect(),
            delay,
        })
    }
}

#[async_trait]
impl StateProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_locks(&self) -> Result<BTreeMap<LineageKey, LockInfo>, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.locks.clone())
    }
}

struct FailingProvider {
    name: String,
}

#[async_trait]
impl StateProvider for FailingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_locks(&self) -> Result<BTreeMap<LineageKey, LockInfo>, ProviderError> {
        Err(ProviderError::Backend("connection refused".to_string()))
    }
}

fn failing(name: &str) -> Arc<dyn StateProvider> {
    Arc::new(FailingProvider {
        name: name.to_string(),
    })
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap()
}

fn lock(lineage: &str, who: &str, created: DateTime<Utc>) -> LockInfo {
    LockInfo {
        lineage: lineage.into(),
        id: format!("{}-{}", lineage, who),
        operation: "OperationTypeApply".to_string(),
        info: None,
        who: who.to_string(),
        version: Some("1.5.7".to_string()),
        created,
        path: None,
    }
}

fn config(policy: FailurePolicy, timeout_ms: u64) -> AggregatorConfig {
    AggregatorConfig {
        provider_timeout: Duration::from_millis(timeout_ms),
        failure_policy: policy,
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_same_lock_from_two_providers_is_one_entry() {
    let aggregator = LockAggregator::new(
        vec![
            StaticProvider::new("s3-eu", vec![lock("prod/vpc", "ci@runner", at(1))]),
            StaticProvider::new("s3-us", vec![lock("prod/vpc", "ci@runner", at(1))]),
        ],
        AggregatorConfig::default(),
    );
    let report = aggregator.get_locks().await.unwrap();
    assert_eq!(report.locks.len(), 1);
    assert!(!report.has_conflicts());
    assert_eq!(report.providers_queried, 2);
    assert_eq!(report.locks[&LineageKey::from("prod/vpc")].who, "ci@runner");
}

#[tokio::test]
async fn test_distinct_claims_are_conflicts_and_last_wins() {
    let aggregator = LockAggregator::new(
        vec![
            StaticProvider::new("first", vec![lock("prod/vpc", "alice@laptop", at(1))]),
            StaticProvider::new(
                "second",
                vec![
                    lock("prod/vpc", "bob@laptop", at(2)),
                    lock("prod/db", "bob@laptop", at(2)),
                ],
            ),
        ],
        AggregatorConfig::default(),
    );
    let report = aggregator.get_locks().await.unwrap();

    assert_eq!(report.locks.len(), 2);
    assert_eq!(
        report.locks[&LineageKey::from("prod/vpc")].who,
        "bob@laptop"
    );
    assert_eq!(report.conflicts.len(), 1);
    let conflict = &report.conflicts[0];
    assert_eq!(conflict.lineage.as_str(), "prod/vpc");
    let providers: Vec<&str> = conflict.claims.iter().map(|c| c.provider.as_str()).collect();
    assert_eq!(providers, vec!["first", "second"]);
}

#[tokio::test]
async fn test_repeated_claim_after_a_rival_is_the_one_kept() {
    let aggregator = LockAggregator::new(
        vec![
            StaticProvider::new("a", vec![lock("prod/vpc", "alice@ci", at(1))]),
            StaticProvider::new("b", vec![lock("prod/vpc", "bob@laptop", at(1))]),
            StaticProvider::new("c", vec![lock("prod/vpc", "alice@ci", at(1))]),
        ],
        AggregatorConfig::default(),
    );
    let report = aggregator.get_locks().await.unwrap();

    assert_eq!(report.locks[&LineageKey::from("prod/vpc")].who, "alice@ci");
    assert_eq!(report.conflicts.len(), 1);
    let providers: Vec<&str> = report.conflicts[0]
        .claims
        .iter()
        .map(|c| c.provider.as_str())
        .collect();
    assert_eq!(providers, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_no_providers_yields_empty_report() {
    let aggregator = LockAggregator::new(vec![], AggregatorConfig::default());
    let report = aggregator.get_locks().await.unwrap();
    assert!(report.locks.is_empty());
    assert_eq!(report.providers_queried, 0);
}

// ---------------------------------------------------------------------------
// Failure policies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fail_fast_names_first_failing_provider_in_config_order() {
    let aggregator = LockAggregator::new(
        vec![
            StaticProvider::new("ok", vec![lock("prod/vpc", "ci", at(1))]),
            failing("broken-1"),
            failing("broken-2"),
        ],
        config(FailurePolicy::FailFast, 1_000),
    );
    let err = aggregator.get_locks().await.unwrap_err();
    match err {
        StateError::ProviderUnavailable { provider, reason } => {
            assert_eq!(provider, "broken-1");
            assert!(reason.contains("connection refused"));
        }
        other => panic!("expected ProviderUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_best_effort_returns_partial_results() {
    let aggregator = LockAggregator::new(
        vec![
            failing("broken"),
            StaticProvider::new("ok", vec![lock("prod/vpc", "ci", at(1))]),
        ],
        config(FailurePolicy::BestEffort, 1_000),
    );
    let report = aggregator.get_locks().await.unwrap();
    assert!(report.is_locked(&LineageKey::from("prod/vpc")));
    assert_eq!(report.unavailable.len(), 1);
    assert_eq!(report.unavailable[0].provider, "broken");
}

// ---------------------------------------------------------------------------
// Timeouts and concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_slow_provider_times_out() {
    let aggregator = LockAggregator::new(
        vec![StaticProvider::delayed(
            "slow",
            vec![],
            Duration::from_secs(30),
        )],
        config(FailurePolicy::FailFast, 50),
    );
    let started = Instant::now();
    let err = aggregator.get_locks().await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5));
    match err {
        StateError::ProviderUnavailable { provider, reason } => {
            assert_eq!(provider, "slow");
            assert!(reason.contains("timed out"));
        }
        other => panic!("expected ProviderUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_providers_are_queried_concurrently() {
    let delay = Duration::from_millis(300);
    let aggregator = LockAggregator::new(
        vec![
            StaticProvider::delayed("a", vec![lock("l1", "x", at(1))], delay),
            StaticProvider::delayed("b", vec![lock("l2", "y", at(1))], delay),
            StaticProvider::delayed("c", vec![lock("l3", "z", at(1))], delay),
        ],
        config(FailurePolicy::FailFast, 5_000),
    );
    let started = Instant::now();
    let report = aggregator.get_locks().await.unwrap();
    assert_eq!(report.locks.len(), 3);
    assert!(
        started.elapsed() < Duration::from_millis(850),
        "providers ran sequentially: {:?}",
        started.elapsed()
    );
}
