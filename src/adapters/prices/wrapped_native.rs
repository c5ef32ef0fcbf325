//! Wrapped-native specialist adapter
//!
//! Overrides the general feed for the base asset and its wrapped form.
//! The base asset is pinned at exactly 1.0 and the wrapped form at the
//! on-chain exchange ratio, which a USD feed tends to misprice by a few
//! basis points.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::Address;

use crate::adapters::PriceAdapter;
use crate::clients::{decode_uint, encode_call, ChainClient};
use crate::error::PipelineError;
use crate::types::PriceData;
use crate::units::wad;

pub struct WrappedNativeAdapter {
    chain: Arc<dyn ChainClient>,
    wrapped_asset: Option<Address>,
}

impl WrappedNativeAdapter {
    pub const NAME: &'static str = "wrapped_native";

    pub fn new(chain: Arc<dyn ChainClient>, wrapped_asset: Option<Address>) -> Self {
        Self {
            chain,
            wrapped_asset,
        }
    }
}

#[async_trait]
impl PriceAdapter for WrappedNativeAdapter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn fetch_prices(
        &self,
        assets: &[Address],
        mut accumulator: PriceData,
    ) -> Result<PriceData, PipelineError> {
        if assets.contains(&accumulator.base_asset) {
            accumulator.prices.insert(accumulator.base_asset, wad());
        }

        if let Some(wrapped) = self.wrapped_asset {
            if assets.contains(&wrapped) {
                // nativePerWrapped(1e18) returns the 18-decimal redemption ratio.
                let raw = self
                    .chain
                    .call(
                        wrapped,
                        encode_call("nativePerWrapped(uint256)", &[Token::Uint(wad())]),
                        None,
                    )
                    .await?;
                let ratio = decode_uint(&raw)?;
                accumulator.prices.insert(wrapped, ratio);
            }
        }

        Ok(accumulator)
    }
}
