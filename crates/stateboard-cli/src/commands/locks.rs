//! Lock aggregation command

use clap::Args;
use stateboard_core::locks::FailurePolicy;
use stateboard_core_types::RequestContext;
use stateboard_engine::commands::locks::{build_providers, get_locks};
use stateboard_engine::config::LockProviderConfig;
use std::path::PathBuf;
use std::time::Duration;

use super::{print_json, CliContext, CliResult};

#[derive(Debug, Args)]
pub struct LocksArgs {
    /// Lock directory to query in addition to the configured providers
    #[arg(long = "lock-dir")]
    pub lock_dirs: Vec<PathBuf>,

    /// Report failed providers instead of aborting
    #[arg(long)]
    pub best_effort: bool,

    /// Per-provider timeout
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

pub fn execute(ctx: &CliContext, args: LocksArgs) -> CliResult {
    let mut providers = ctx.config.locks.providers.clone();
    providers.extend(
        args.lock_dirs
            .into_iter()
            .enumerate()
            .map(|(i, dir)| LockProviderConfig {
                name: format!("lock-dir-{}", i + 1),
                dir,
            }),
    );

    let mut config = ctx.config.aggregator_config();
    if args.best_effort {
        config.failure_policy = FailurePolicy::BestEffort;
    }
    if let Some(ms) = args.timeout_ms {
        config.provider_timeout = Duration::from_millis(ms);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(get_locks(
        build_providers(&providers),
        config,
        &RequestContext::new(),
    ))?;

    print_json(&report)
}
