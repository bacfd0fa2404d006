//! Lock aggregation wiring.

#![allow(clippy::result_large_err)]

use stateboard_core::errors::ExError;
use stateboard_core::locks::{AggregatorConfig, LockAggregator, LockReport, StateProvider};
use stateboard_core::{log_op_end, log_op_error, log_op_start};
use stateboard_core_types::RequestContext;
use stateboard_store::errors::Result;
use stateboard_store::LockDirProvider;
use std::sync::Arc;

use crate::config::LockProviderConfig;

/// Build one directory provider per configured entry, in order
pub fn build_providers(configs: &[LockProviderConfig]) -> Vec<Arc<dyn StateProvider>> {
    configs
        .iter()
        .map(|c| Arc::new(LockDirProvider::new(&c.name, &c.dir)) as Arc<dyn StateProvider>)
        .collect()
}

/// Aggregate active locks across `providers`
///
/// Conflicting claims are logged at `warn` and returned in the report.
///
/// # Errors
///
/// `ProviderUnavailable` under the fail-fast policy when a provider errors
/// or times out.
pub async fn get_locks(
    providers: Vec<Arc<dyn StateProvider>>,
    config: AggregatorConfig,
    ctx: &RequestContext,
) -> Result<LockReport> {
    log_op_start!(
        "get_locks",
        request_id = %ctx.request_id,
        operator = ctx.operator_or_anonymous(),
        providers = providers.len()
    );
    let start = std::time::Instant::now();

    let aggregator = LockAggregator::new(providers, config);
    let result = aggregator.get_locks().await;

    let elapsed = start.elapsed().as_millis() as u64;
    match &result {
        Ok(report) => {
            for conflict in &report.conflicts {
                let holders: Vec<&str> = conflict
                    .claims
                    .iter()
                    .map(|c| c.lock.who.as_str())
                    .collect();
                tracing::warn!(
                    lineage = %conflict.lineage,
                    claims = conflict.claims.len(),
                    holders = ?holders,
                    "Conflicting lock claims"
                );
            }
            for failure in &report.unavailable {
                tracing::warn!(
                    provider = %failure.provider,
                    reason = %failure.reason,
                    "Lock provider unavailable"
                );
            }
            log_op_end!(
                "get_locks",
                duration_ms = elapsed,
                request_id = %ctx.request_id,
                lock_count = report.locks.len()
            );
        }
        Err(e) => {
            log_op_error!(
                "get_locks",
                e.clone(),
                duration_ms = elapsed,
                request_id = %ctx.request_id
            );
        }
    }

    result.map_err(|e| ExError::from(e).with_request_id(ctx.request_id.clone()))
}
