//! Core types used throughout the oracle pipeline
//!
//! Defines the data model shared by checks, adapters, validators, and the
//! valuation engine. Everything here is created fresh per run and dropped
//! after the report is handed off.

use std::collections::BTreeMap;

use ethers::types::{Address, U256};
use serde::Serialize;

use crate::error::PipelineError;

/// Result of a single check-adapter invocation. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub check_name: String,
    pub passed: bool,
    pub message: String,
    /// Whether the preflight engine should retry this check on failure.
    pub retry_recommended: bool,
}

impl CheckResult {
    pub fn passed(check_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check_name: check_name.into(),
            passed: true,
            message: message.into(),
            retry_recommended: false,
        }
    }

    pub fn failed(
        check_name: impl Into<String>,
        message: impl Into<String>,
        retry_recommended: bool,
    ) -> Self {
        Self {
            check_name: check_name.into(),
            passed: false,
            message: message.into(),
            retry_recommended,
        }
    }
}

/// Raw holding reported by an asset adapter, in token-native decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetData {
    pub asset_address: Address,
    pub amount: U256,
}

/// Holdings summed per asset address.
///
/// The map is a `BTreeMap` so iteration order is deterministic no matter
/// in which order concurrent adapters completed. Merging is plain
/// summation: associative and commutative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedAssets {
    pub assets: BTreeMap<Address, U256>,
}

impl AggregatedAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one adapter's output into the aggregate.
    pub fn absorb(&mut self, batch: &[AssetData]) -> Result<(), PipelineError> {
        for data in batch {
            let entry = self
                .assets
                .entry(data.asset_address)
                .or_insert_with(U256::zero);
            *entry = entry.checked_add(data.amount).ok_or_else(|| {
                PipelineError::AssetCollection(format!(
                    "amount overflow aggregating asset {:?}",
                    data.asset_address
                ))
            })?;
        }
        Ok(())
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.assets.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Shared price accumulator threaded through the price-adapter chain.
///
/// Prices are 18-decimal fixed point, expressed in base-asset units.
/// Adapters overwrite entries for the addresses they cover: later adapters
/// in the declared chain win for the same address. The base asset itself
/// is implicitly priced at 1.0 and never required to carry an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceData {
    pub base_asset: Address,
    pub prices: BTreeMap<Address, U256>,
}

impl PriceData {
    pub fn new(base_asset: Address) -> Self {
        Self {
            base_asset,
            prices: BTreeMap::new(),
        }
    }

    /// Addresses from `assets` that still need a price. The base asset is
    /// never included.
    pub fn missing_from(&self, assets: &[Address]) -> Vec<Address> {
        assets
            .iter()
            .copied()
            .filter(|a| *a != self.base_asset && !self.prices.contains_key(a))
            .collect()
    }
}

/// Severity of a price-validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Recorded and surfaced with the report, non-fatal.
    Warning,
    /// Aborts the pipeline.
    Failure,
}

/// Finding produced by a price validator. `deviation_pct` is only set
/// for findings that measure a deviation; sanity findings carry none.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub asset_address: Address,
    pub severity: Severity,
    pub message: String,
    pub deviation_pct: Option<f64>,
}

/// Outcome of one preflight attempt, for event reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Passed,
    Failed,
}

/// Structured events emitted by the pipeline stages.
///
/// These flow through the injected [`EventSink`](crate::clients::EventSink)
/// so tests can assert on them; the default sink forwards to `tracing`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    CheckAttempt {
        check: String,
        attempt: u32,
        outcome: CheckOutcome,
    },
    CheckSkipped {
        check: String,
    },
    AdapterFinished {
        adapter: String,
        subvault: String,
        assets: usize,
    },
    AdapterFailed {
        adapter: String,
        subvault: String,
        error: String,
    },
    PricesFetched {
        adapter: String,
        covered: usize,
    },
    ValidationWarning {
        asset: String,
        deviation_pct: f64,
    },
    StageCompleted {
        stage: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_absorb_sums_per_address() {
        let mut agg = AggregatedAssets::new();
        agg.absorb(&[AssetData {
            asset_address: addr(1),
            amount: U256::from(100u64),
        }])
        .unwrap();
        agg.absorb(&[AssetData {
            asset_address: addr(1),
            amount: U256::from(50u64),
        }])
        .unwrap();

        assert_eq!(agg.assets[&addr(1)], U256::from(150u64));
    }

    #[test]
    fn test_absorb_overflow_is_an_error() {
        let mut agg = AggregatedAssets::new();
        agg.absorb(&[AssetData {
            asset_address: addr(1),
            amount: U256::MAX,
        }])
        .unwrap();
        let err = agg.absorb(&[AssetData {
            asset_address: addr(1),
            amount: U256::from(1u64),
        }]);
        assert!(err.is_err());
    }

    #[test]
    fn test_missing_from_excludes_base_asset() {
        let prices = PriceData::new(addr(1));
        let missing = prices.missing_from(&[addr(1), addr(2)]);
        assert_eq!(missing, vec![addr(2)]);
    }
}
