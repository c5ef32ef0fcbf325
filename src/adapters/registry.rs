//! Startup-time adapter registry
//!
//! Maps configuration names to constructors for each capability. All
//! resolution happens once at startup; an unknown name fails fast with
//! the list of known names in the message.

use std::sync::Arc;
use std::time::Duration;

use crate::adapters::assets::IdleBalancesAdapter;
use crate::adapters::checks::{ActiveProposalCheck, TimeoutCheck};
use crate::adapters::prices::{UsdFeedAdapter, WrappedNativeAdapter};
use crate::adapters::validators::{
    PositivePricesValidator, ReferenceFeedValidator, Tolerances,
};
use crate::adapters::{AssetAdapter, CheckAdapter, PriceAdapter, PriceValidator};
use crate::clients::{ChainClient, PriceSourceClient};
use crate::config::Settings;
use crate::error::PipelineError;

/// Shared dependencies handed to adapter constructors.
pub struct AdapterDeps {
    pub chain: Arc<dyn ChainClient>,
    pub price_source: Arc<dyn PriceSourceClient>,
    pub reference_source: Arc<dyn PriceSourceClient>,
}

const KNOWN_CHECKS: &[&str] = &[TimeoutCheck::NAME, ActiveProposalCheck::NAME];
const KNOWN_ASSET_ADAPTERS: &[&str] = &[IdleBalancesAdapter::NAME];
const KNOWN_PRICE_ADAPTERS: &[&str] = &[UsdFeedAdapter::NAME, WrappedNativeAdapter::NAME];
const KNOWN_VALIDATORS: &[&str] = &[
    PositivePricesValidator::NAME,
    ReferenceFeedValidator::NAME,
];

fn unknown(kind: &str, name: &str, known: &[&str]) -> PipelineError {
    PipelineError::ConfigInvariant(format!(
        "unknown {kind} '{name}'; available: {}",
        known.join(", ")
    ))
}

pub fn resolve_check(
    name: &str,
    settings: &Settings,
    deps: &AdapterDeps,
) -> Result<Arc<dyn CheckAdapter>, PipelineError> {
    match name {
        TimeoutCheck::NAME => Ok(Arc::new(TimeoutCheck::new(
            deps.chain.clone(),
            settings.vault.oracle_address,
            settings.preflight.ignore_timeout_check,
        ))),
        ActiveProposalCheck::NAME => Ok(Arc::new(ActiveProposalCheck::new(
            deps.chain.clone(),
            settings.vault.governor_address,
            settings.preflight.ignore_active_proposal_check,
        ))),
        other => Err(unknown("check", other, KNOWN_CHECKS)),
    }
}

pub fn resolve_asset_adapter(
    name: &str,
    settings: &Settings,
    deps: &AdapterDeps,
) -> Result<Arc<dyn AssetAdapter>, PipelineError> {
    match name {
        IdleBalancesAdapter::NAME => Ok(Arc::new(IdleBalancesAdapter::new(
            deps.chain.clone(),
            settings.vault.base_asset,
            settings.collection.tracked_assets.clone(),
            Duration::from_millis(settings.collection.rpc_delay_ms),
            Duration::from_millis(settings.collection.rpc_jitter_ms),
        ))),
        other => Err(unknown("asset adapter", other, KNOWN_ASSET_ADAPTERS)),
    }
}

pub fn resolve_price_adapter(
    name: &str,
    settings: &Settings,
    deps: &AdapterDeps,
) -> Result<Arc<dyn PriceAdapter>, PipelineError> {
    match name {
        UsdFeedAdapter::NAME => Ok(Arc::new(UsdFeedAdapter::new(deps.price_source.clone()))),
        WrappedNativeAdapter::NAME => Ok(Arc::new(WrappedNativeAdapter::new(
            deps.chain.clone(),
            settings.vault.wrapped_base_asset,
        ))),
        other => Err(unknown("price adapter", other, KNOWN_PRICE_ADAPTERS)),
    }
}

pub fn resolve_validator(
    name: &str,
    settings: &Settings,
    deps: &AdapterDeps,
) -> Result<Arc<dyn PriceValidator>, PipelineError> {
    let tolerances = Tolerances {
        warning_pct: settings.pricing.warning_tolerance_pct,
        failure_pct: settings.pricing.failure_tolerance_pct,
    };
    match name {
        PositivePricesValidator::NAME => Ok(Arc::new(PositivePricesValidator)),
        ReferenceFeedValidator::NAME => Ok(Arc::new(ReferenceFeedValidator::new(
            deps.reference_source.clone(),
            tolerances,
            settings.pricing.disable_reference_validator,
        ))),
        other => Err(unknown("validator", other, KNOWN_VALIDATORS)),
    }
}
