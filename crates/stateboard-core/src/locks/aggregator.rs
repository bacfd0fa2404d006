//! Concurrent lock aggregation across providers.

#![allow(clippy::result_large_err)]

use crate::errors::{Result, StateError};
use crate::lineage::LineageKey;
use crate::locks::model::{LockClaim, LockConflict, LockInfo, LockReport, ProviderFailure};
use crate::locks::provider::StateProvider;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// What to do when a provider errors or times out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort with `ProviderUnavailable` naming the first failing provider
    #[default]
    FailFast,
    /// Report failed providers and return the other providers' locks
    BestEffort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub provider_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(5),
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

type ProviderOutcome = std::result::Result<BTreeMap<LineageKey, LockInfo>, String>;

/// Fans out to every provider and merges their lock maps
pub struct LockAggregator {
    providers: Vec<Arc<dyn StateProvider>>,
    config: AggregatorConfig,
}

impl LockAggregator {
    pub fn new(providers: Vec<Arc<dyn StateProvider>>, config: AggregatorConfig) -> Self {
        Self { providers, config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Query all providers concurrently and merge the results
    ///
    /// Each provider call runs on its own task under `provider_timeout`.
    /// Results are merged in provider configuration order.
    ///
    /// # Errors
    ///
    /// `ProviderUnavailable` under [`FailurePolicy::FailFast`] when any
    /// provider errors, panics or times out.
    pub async fn get_locks(&self) -> Result<LockReport> {
        let timeout = self.config.provider_timeout;
        let calls = self.providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            async move {
                let name = provider.name().to_string();
                let task = tokio::spawn(async move {
                    tokio::time::timeout(timeout, provider.get_locks()).await
                });
                let outcome: ProviderOutcome = match task.await {
                    Ok(Ok(Ok(locks))) => Ok(locks),
                    Ok(Ok(Err(e))) => Err(e.to_string()),
                    Ok(Err(_)) => Err(format!("timed out after {} ms", timeout.as_millis())),
                    Err(e) => Err(format!("provider task failed: {}", e)),
                };
                (name, outcome)
            }
        });
        let results = join_all(calls).await;

        let mut report = LockReport {
            providers_queried: results.len(),
            ..LockReport::default()
        };
        let mut claims: BTreeMap<LineageKey, Vec<LockClaim>> = BTreeMap::new();

        for (provider, outcome) in results {
            match outcome {
                Ok(locks) => {
                    for (lineage, lock) in locks {
                        claims.entry(lineage).or_default().push(LockClaim {
                            provider: provider.clone(),
                            lock,
                        });
                    }
                }
                Err(reason) => match self.config.failure_policy {
                    FailurePolicy::FailFast => {
                        return Err(StateError::ProviderUnavailable { provider, reason })
                    }
                    FailurePolicy::BestEffort => {
                        report.unavailable.push(ProviderFailure { provider, reason })
                    }
                },
            }
        }

        for (lineage, seen) in claims {
            if let Some(last) = seen.last() {
                report.locks.insert(lineage.clone(), last.lock.clone());
            }
            let contested = match seen.split_first() {
                Some((first, rest)) => rest.iter().any(|c| !c.lock.same_claim(&first.lock)),
                None => false,
            };
            if contested {
                report.conflicts.push(LockConflict {
                    lineage,
                    claims: seen,
                });
            }
        }

        Ok(report)
    }
}
