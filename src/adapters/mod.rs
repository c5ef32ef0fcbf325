//! Adapter capability contracts
//!
//! Four pluggable seams feed the pipeline: preflight checks, asset
//! fetchers, price fetchers, and price validators. Concrete
//! implementations live in the submodules; names are resolved through
//! [`registry`] at startup.

pub mod assets;
pub mod checks;
pub mod prices;
pub mod registry;
pub mod validators;

use async_trait::async_trait;
use ethers::types::Address;

use crate::error::{PipelineError, RpcError};
use crate::types::{AssetData, CheckResult, PriceData, ValidationResult};

/// One idempotent read-only validation gating the pipeline.
#[async_trait]
pub trait CheckAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// A skipped check passes implicitly without ever being invoked
    /// (operator override).
    fn skipped(&self) -> bool {
        false
    }

    async fn run_check(&self) -> CheckResult;
}

/// Fetches raw holdings for one subvault. Each invocation yields a finite
/// batch; adapters fail independently of their siblings.
#[async_trait]
pub trait AssetAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_assets(&self, subvault: Address) -> Result<Vec<AssetData>, RpcError>;
}

/// Fetches or overrides prices for a set of asset addresses.
///
/// Adapters run sequentially in declared order over a shared accumulator.
/// Coverage may be partial; entries an adapter does return overwrite
/// whatever earlier adapters wrote for the same address.
#[async_trait]
pub trait PriceAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_prices(
        &self,
        assets: &[Address],
        accumulator: PriceData,
    ) -> Result<PriceData, PipelineError>;
}

/// Independently re-derives prices and flags deviations against the
/// configured tolerances.
#[async_trait]
pub trait PriceValidator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Disabled validators contribute no results.
    fn disabled(&self) -> bool {
        false
    }

    async fn validate(&self, prices: &PriceData) -> Result<Vec<ValidationResult>, PipelineError>;
}
