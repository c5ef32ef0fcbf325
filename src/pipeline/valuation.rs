//! Valuation engine
//!
//! Converts the holdings map and assembled prices into one total value in
//! 18-decimal base-asset units, then derives the final per-asset prices
//! through the external normalizer. All arithmetic is checked; overflow
//! is fatal, never wrapped.

use std::collections::BTreeMap;

use ethers::types::{Address, U256};

use crate::clients::{decode_u64, encode_call, ChainClient, PriceNormalizer};
use crate::error::{PipelineError, RpcError};
use crate::report::{AssetPrice, OracleReport};
use crate::types::{AggregatedAssets, PriceData};
use crate::units::{scale_to_18, wad};

/// 10^78 no longer fits in a U256; a `decimals()` answer anywhere near
/// that is a junk response, not a real token.
const MAX_TOKEN_DECIMALS: u64 = 77;

/// Token-native decimals per asset, read once per run via `decimals()`.
/// The base asset is fixed at 18.
pub async fn fetch_decimals(
    chain: &dyn ChainClient,
    assets: &AggregatedAssets,
    base_asset: Address,
) -> Result<BTreeMap<Address, u32>, PipelineError> {
    let mut decimals = BTreeMap::new();
    for asset in assets.addresses() {
        if asset == base_asset {
            decimals.insert(asset, 18);
            continue;
        }
        let raw = chain
            .call(asset, encode_call("decimals()", &[]), None)
            .await?;
        let value = decode_u64(&raw)?;
        if value > MAX_TOKEN_DECIMALS {
            return Err(RpcError::Decode(format!(
                "implausible decimals {value} for token {asset:?}"
            ))
            .into());
        }
        decimals.insert(asset, value as u32);
    }
    Ok(decimals)
}

/// Total vault value: each holding scaled to 18 decimals, multiplied by
/// its price, accumulated in the 18-decimal domain. The base asset enters
/// at its implicit price of exactly 1.0.
pub fn compute_total_value(
    assets: &AggregatedAssets,
    prices: &PriceData,
    decimals: &BTreeMap<Address, u32>,
) -> Result<U256, PipelineError> {
    let mut total = U256::zero();
    for (asset, amount) in &assets.assets {
        let price = if *asset == prices.base_asset {
            wad()
        } else {
            *prices
                .prices
                .get(asset)
                .ok_or(PipelineError::MissingPrice { asset: *asset })?
        };
        let native_decimals = decimals.get(asset).copied().unwrap_or(18);
        let term = scale_to_18(*amount, native_decimals)
            .and_then(|scaled| scaled.checked_mul(price))
            .ok_or(PipelineError::ValuationOverflow { asset: *asset })?
            / wad();
        total = total
            .checked_add(term)
            .ok_or(PipelineError::ValuationOverflow { asset: *asset })?;
    }
    Ok(total)
}

/// Run the external normalization call and assemble the report. The base
/// asset's final price is pinned to zero in the boundary format.
pub async fn derive_final_prices(
    total_value: U256,
    assets: &AggregatedAssets,
    prices: &PriceData,
    normalizer: &dyn PriceNormalizer,
    vault_address: Address,
    block_number: u64,
) -> Result<OracleReport, PipelineError> {
    let addresses = assets.addresses();
    let raw: Vec<U256> = addresses
        .iter()
        .map(|asset| {
            if *asset == prices.base_asset {
                wad()
            } else {
                prices.prices.get(asset).copied().unwrap_or_else(U256::zero)
            }
        })
        .collect();

    let finals = normalizer.normalize(total_value, &raw).await?;
    if finals.len() != addresses.len() {
        return Err(PipelineError::Derivation(format!(
            "normalizer returned {} prices for {} assets",
            finals.len(),
            addresses.len()
        )));
    }

    let report_prices = addresses
        .iter()
        .zip(finals)
        .map(|(asset, price)| AssetPrice {
            asset: *asset,
            price_d18: if *asset == prices.base_asset {
                U256::zero()
            } else {
                price
            },
        })
        .collect();

    Ok(OracleReport::new(
        vault_address,
        total_value,
        report_prices,
        block_number,
    ))
}

/// Valuation stage entry point: total value, empty-vault policy, final
/// price derivation.
pub async fn build_report(
    assets: &AggregatedAssets,
    prices: &PriceData,
    chain: &dyn ChainClient,
    normalizer: &dyn PriceNormalizer,
    vault_address: Address,
    block_number: u64,
    ignore_empty_vault: bool,
) -> Result<OracleReport, PipelineError> {
    let decimals = fetch_decimals(chain, assets, prices.base_asset).await?;
    let total_value = compute_total_value(assets, prices, &decimals)?;
    tracing::info!(total_value = %total_value, "total vault value computed");

    if total_value.is_zero() {
        if !ignore_empty_vault {
            return Err(PipelineError::EmptyVault);
        }
        tracing::warn!("vault is empty, emitting all-zero report");
        return Ok(OracleReport::zeroed(
            vault_address,
            &assets.addresses(),
            block_number,
        ));
    }

    derive_final_prices(
        total_value,
        assets,
        prices,
        normalizer,
        vault_address,
        block_number,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn aggregate(entries: &[(Address, U256)]) -> AggregatedAssets {
        let mut assets = AggregatedAssets::new();
        for (address, amount) in entries {
            assets.assets.insert(*address, *amount);
        }
        assets
    }

    /// Normalizer echoing the raw prices back unchanged.
    struct EchoNormalizer;

    #[async_trait]
    impl PriceNormalizer for EchoNormalizer {
        async fn normalize(
            &self,
            _total_value: U256,
            prices: &[U256],
        ) -> Result<Vec<U256>, PipelineError> {
            Ok(prices.to_vec())
        }
    }

    /// Chain answering every `decimals()` read with a fixed word.
    struct FixedDecimalsChain(U256);

    #[async_trait]
    impl crate::clients::ChainClient for FixedDecimalsChain {
        async fn call(
            &self,
            _contract: Address,
            _calldata: ethers::types::Bytes,
            _block: Option<u64>,
        ) -> Result<ethers::types::Bytes, crate::error::RpcError> {
            Ok(ethers::abi::encode(&[ethers::abi::Token::Uint(self.0)]).into())
        }

        async fn native_balance(
            &self,
            _account: Address,
        ) -> Result<U256, crate::error::RpcError> {
            Ok(U256::zero())
        }

        async fn block_number(&self) -> Result<u64, crate::error::RpcError> {
            Ok(0)
        }
    }

    struct RevertingNormalizer;

    #[async_trait]
    impl PriceNormalizer for RevertingNormalizer {
        async fn normalize(
            &self,
            _total_value: U256,
            _prices: &[U256],
        ) -> Result<Vec<U256>, PipelineError> {
            Err(PipelineError::Derivation("execution reverted".into()))
        }
    }

    #[test]
    fn test_total_value_mixed_decimals() {
        let base = addr(1);
        let token6 = addr(2); // 6-decimal stable worth 2.0 base
        let assets = aggregate(&[
            (base, U256::exp10(18)),          // 1.0 base
            (token6, U256::from(3_000_000u64)), // 3.0 tokens
        ]);
        let mut prices = PriceData::new(base);
        prices.prices.insert(token6, wad() * 2);
        let decimals: BTreeMap<Address, u32> = [(base, 18u32), (token6, 6u32)].into();

        let total = compute_total_value(&assets, &prices, &decimals).unwrap();
        // 1.0 + 3.0 * 2.0 = 7.0
        assert_eq!(total, wad() * 7);
    }

    #[test]
    fn test_total_value_overflow_detected() {
        let base = addr(1);
        let token = addr(2);
        let assets = aggregate(&[(token, U256::MAX)]);
        let mut prices = PriceData::new(base);
        prices.prices.insert(token, wad());
        let decimals: BTreeMap<Address, u32> = [(token, 18u32)].into();

        let err = compute_total_value(&assets, &prices, &decimals).unwrap_err();
        assert!(matches!(err, PipelineError::ValuationOverflow { asset } if asset == token));
    }

    #[tokio::test]
    async fn test_oversized_decimals_response_is_an_error() {
        let base = addr(1);
        let token = addr(2);
        let assets = aggregate(&[(token, wad())]);

        let chain = FixedDecimalsChain(U256::MAX);
        let err = fetch_decimals(&chain, &assets, base).await.unwrap_err();
        assert!(matches!(err, PipelineError::Rpc(RpcError::Decode(_))));

        // Fits in a u64 but is no real token either.
        let chain = FixedDecimalsChain(U256::from(200u64));
        let err = fetch_decimals(&chain, &assets, base).await.unwrap_err();
        assert!(matches!(err, PipelineError::Rpc(RpcError::Decode(_))));
    }

    #[tokio::test]
    async fn test_base_asset_price_zeroed_in_report() {
        let base = addr(1);
        let token = addr(2);
        let assets = aggregate(&[(base, wad()), (token, wad())]);
        let mut prices = PriceData::new(base);
        prices.prices.insert(token, wad() * 3);

        let report = derive_final_prices(wad(), &assets, &prices, &EchoNormalizer, addr(9), 7)
            .await
            .unwrap();

        let base_entry = report.prices.iter().find(|p| p.asset == base).unwrap();
        let token_entry = report.prices.iter().find(|p| p.asset == token).unwrap();
        assert!(base_entry.price_d18.is_zero());
        assert_eq!(token_entry.price_d18, wad() * 3);
    }

    #[tokio::test]
    async fn test_normalizer_failure_propagates() {
        let base = addr(1);
        let assets = aggregate(&[(base, wad())]);
        let prices = PriceData::new(base);

        let err =
            derive_final_prices(wad(), &assets, &prices, &RevertingNormalizer, addr(9), 7)
                .await
                .unwrap_err();
        assert!(matches!(err, PipelineError::Derivation(_)));
    }
}
