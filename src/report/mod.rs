//! Oracle report boundary artifact
//!
//! One immutable report per run, consumed by the external publisher.
//! Report encoding for submission and the submission itself live outside
//! this crate.

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::Serialize;

/// Final 18-decimal price for one asset, in base-asset units. The base
/// asset's own entry is always zero by construction of the boundary
/// format: it is the unit of account and carries no independent price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssetPrice {
    pub asset: Address,
    pub price_d18: U256,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleReport {
    pub vault_address: Address,
    /// Total vault value, 18-decimal fixed point, in base asset.
    pub total_value: U256,
    /// Per-asset final prices in deterministic (address) order.
    pub prices: Vec<AssetPrice>,
    /// Block the snapshot was taken at.
    pub block_number: u64,
    pub generated_at: DateTime<Utc>,
}

impl OracleReport {
    pub fn new(
        vault_address: Address,
        total_value: U256,
        prices: Vec<AssetPrice>,
        block_number: u64,
    ) -> Self {
        Self {
            vault_address,
            total_value,
            prices,
            block_number,
            generated_at: Utc::now(),
        }
    }

    /// All-zero report for a deliberately-ignored empty vault.
    pub fn zeroed(vault_address: Address, assets: &[Address], block_number: u64) -> Self {
        Self::new(
            vault_address,
            U256::zero(),
            assets
                .iter()
                .map(|asset| AssetPrice {
                    asset: *asset,
                    price_d18: U256::zero(),
                })
                .collect(),
            block_number,
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_report_covers_all_assets() {
        let assets = vec![Address::from_low_u64_be(1), Address::from_low_u64_be(2)];
        let report = OracleReport::zeroed(Address::from_low_u64_be(9), &assets, 42);
        assert!(report.total_value.is_zero());
        assert_eq!(report.prices.len(), 2);
        assert!(report.prices.iter().all(|p| p.price_d18.is_zero()));
        assert_eq!(report.block_number, 42);
    }

    #[test]
    fn test_report_serializes() {
        let report = OracleReport::zeroed(Address::zero(), &[], 1);
        assert!(report.to_json().is_ok());
    }
}
