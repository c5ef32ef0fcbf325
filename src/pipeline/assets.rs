//! Asset collector
//!
//! Resolves the (subvault, adapter) work list, executes it concurrently
//! behind a semaphore, and folds the results into one holdings map at the
//! barrier. Individual adapter failures never cancel siblings in flight;
//! they are recorded and escalated only after every work item finished,
//! so no partial result is silently lost before the failure surfaces.

use std::sync::Arc;

use ethers::types::Address;
use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::adapters::registry::{resolve_asset_adapter, AdapterDeps};
use crate::adapters::AssetAdapter;
use crate::clients::{EventSink, SubvaultRegistry};
use crate::config::Settings;
use crate::error::{PipelineError, RpcError};
use crate::types::{AggregatedAssets, AssetData, PipelineEvent};

/// One unit of collection work: a single adapter against a single subvault.
pub struct WorkItem {
    pub subvault: Address,
    pub adapter: Arc<dyn AssetAdapter>,
}

/// Build the work list from settings and the on-chain registry.
///
/// Targets are the vault itself plus every registry subvault, plus any
/// configured subvault that bypasses existence validation (the bypass is
/// double-gated behind `allow_dangerous` at startup). Each target gets
/// the default idle-balance scan unless skipped, plus its configured
/// additional adapters.
pub async fn resolve_work_items(
    settings: &Settings,
    registry: &dyn SubvaultRegistry,
    deps: &AdapterDeps,
) -> Result<Vec<WorkItem>, PipelineError> {
    let vault = settings.vault.vault_address;
    let known = registry.subvaults(vault).await?;
    tracing::info!(subvaults = known.len(), "discovered subvaults");

    for sv in &settings.collection.subvaults {
        if !sv.skip_existence_check && sv.address != vault && !known.contains(&sv.address) {
            return Err(PipelineError::AssetCollection(format!(
                "adapters configured for unknown subvault {:?}",
                sv.address
            )));
        }
    }

    let mut targets = vec![vault];
    targets.extend(known);
    for sv in &settings.collection.subvaults {
        if sv.skip_existence_check && !targets.contains(&sv.address) {
            tracing::warn!(
                subvault = ?sv.address,
                "including unvalidated subvault (dangerous override)"
            );
            targets.push(sv.address);
        }
    }

    let mut items = Vec::new();
    for target in targets {
        let sv_config = settings.subvault_config(target);
        if !sv_config.skip_idle_balances {
            items.push(WorkItem {
                subvault: target,
                adapter: resolve_asset_adapter("idle_balances", settings, deps)?,
            });
        }
        for adapter_name in &sv_config.additional_adapters {
            items.push(WorkItem {
                subvault: target,
                adapter: resolve_asset_adapter(adapter_name, settings, deps)?,
            });
        }
    }
    Ok(items)
}

/// Execute the work list concurrently, bounded by `max_concurrent`, and
/// fold successes into one aggregate after the barrier.
pub async fn execute_work_items(
    items: Vec<WorkItem>,
    max_concurrent: usize,
    sink: &dyn EventSink,
) -> Result<AggregatedAssets, PipelineError> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent));

    let futures = items.into_iter().map(|item| {
        let semaphore = semaphore.clone();
        async move {
            let batch: Result<Vec<AssetData>, RpcError> = match semaphore.acquire_owned().await {
                Ok(_permit) => item.adapter.fetch_assets(item.subvault).await,
                Err(_) => Err(RpcError::Transport("concurrency limiter closed".into())),
            };
            (item.adapter.name().to_string(), item.subvault, batch)
        }
    });

    // Barrier: every work item completes before any failure is escalated.
    let results = join_all(futures).await;

    let mut failures = Vec::new();
    let mut aggregated = AggregatedAssets::new();
    for (adapter, subvault, batch) in results {
        match batch {
            Ok(assets) => {
                sink.emit(PipelineEvent::AdapterFinished {
                    adapter: adapter.clone(),
                    subvault: format!("{subvault:?}"),
                    assets: assets.len(),
                });
                aggregated.absorb(&assets)?;
            }
            Err(e) => {
                tracing::error!(adapter = %adapter, subvault = ?subvault, error = %e, "adapter failed");
                sink.emit(PipelineEvent::AdapterFailed {
                    adapter: adapter.clone(),
                    subvault: format!("{subvault:?}"),
                    error: e.to_string(),
                });
                failures.push(format!("{adapter} for {subvault:?}: {e}"));
            }
        }
    }

    if !failures.is_empty() {
        return Err(PipelineError::AssetCollection(failures.join("; ")));
    }
    Ok(aggregated)
}

/// Full collection stage: resolve the work list, run it, aggregate.
pub async fn collect_assets(
    settings: &Settings,
    registry: &dyn SubvaultRegistry,
    deps: &AdapterDeps,
    sink: &dyn EventSink,
) -> Result<AggregatedAssets, PipelineError> {
    let items = resolve_work_items(settings, registry, deps).await?;
    tracing::info!(work_items = items.len(), "collecting assets");
    let aggregated =
        execute_work_items(items, settings.collection.max_concurrent_calls, sink).await?;
    tracing::info!(assets = aggregated.len(), "asset aggregation complete");
    Ok(aggregated)
}
