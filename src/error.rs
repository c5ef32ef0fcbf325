//! Pipeline error taxonomy
//!
//! Every variant is terminal for the run. Stage-local recoveries (preflight
//! retries, per-adapter failures before the collection barrier) are absorbed
//! where they happen; whatever reaches this enum aborts the pipeline.

use std::time::Duration;

use ethers::types::Address;
use thiserror::Error;

/// Read-path RPC failure from the chain client.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("rpc transport error: {0}")]
    Transport(String),
    #[error("failed to decode contract response: {0}")]
    Decode(String),
}

/// Failure fetching prices from an off-chain price source.
#[derive(Debug, Clone, Error)]
#[error("price fetch failed ({source_name}): {message}")]
pub struct PriceFetchError {
    pub source_name: String,
    pub message: String,
}

/// Terminal pipeline outcomes. Exactly one of these (or a successful
/// report) is surfaced per run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Detected at startup, never at runtime.
    #[error("configuration invariant violated: {0}")]
    ConfigInvariant(String),

    /// A preflight check failed without a retry recommendation, or its
    /// retry budget ran out.
    #[error("preflight check '{check}' failed: {message}")]
    FatalCheckFailure { check: String, message: String },

    /// One or more asset adapters failed; surfaced after the concurrency
    /// barrier so sibling results are never silently dropped.
    #[error("asset collection failed: {0}")]
    AssetCollection(String),

    /// An aggregated asset has no price after the full adapter chain.
    #[error("no price for asset {asset:?} after price adapter chain")]
    MissingPrice { asset: Address },

    /// A validator rejected an assembled price outright, independent of
    /// any deviation measurement.
    #[error("price validation failed for {asset:?}: {message}")]
    ValidationFailure { asset: Address, message: String },

    /// A validator observed a deviation at or above the failure tolerance.
    #[error(
        "price deviation for {asset:?}: {deviation_pct:.4}% >= failure tolerance {tolerance_pct}%"
    )]
    Deviation {
        asset: Address,
        deviation_pct: f64,
        tolerance_pct: f64,
    },

    /// Total vault value computed as zero and `ignore_empty_vault` is off.
    #[error("vault total value is zero")]
    EmptyVault,

    /// Checked fixed-point arithmetic overflowed while valuing an asset.
    #[error("valuation overflow while pricing asset {asset:?}")]
    ValuationOverflow { asset: Address },

    /// The external price normalization call failed or reverted.
    #[error("final price derivation failed: {0}")]
    Derivation(String),

    /// Global wall-clock deadline exceeded; partial results discarded.
    #[error("pipeline exceeded global deadline of {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    PriceFetch(#[from] PriceFetchError),
}
