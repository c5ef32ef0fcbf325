//! Idle-balance scan
//!
//! The default asset adapter: queries the native balance plus the
//! `balanceOf` of every tracked ERC-20 for a subvault. Nothing deployed
//! into protocols is visible here; protocol adapters cover that.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::Address;
use rand::Rng;

use crate::adapters::AssetAdapter;
use crate::clients::{decode_uint, encode_call, ChainClient};
use crate::error::RpcError;
use crate::types::AssetData;

pub struct IdleBalancesAdapter {
    chain: Arc<dyn ChainClient>,
    base_asset: Address,
    tracked_assets: Vec<Address>,
    rpc_delay: Duration,
    rpc_jitter: Duration,
}

impl IdleBalancesAdapter {
    pub const NAME: &'static str = "idle_balances";

    pub fn new(
        chain: Arc<dyn ChainClient>,
        base_asset: Address,
        tracked_assets: Vec<Address>,
        rpc_delay: Duration,
        rpc_jitter: Duration,
    ) -> Self {
        Self {
            chain,
            base_asset,
            tracked_assets,
            rpc_delay,
            rpc_jitter,
        }
    }

    /// Provider-friendly pause between consecutive calls from this
    /// adapter. Local to the call path, never a pipeline-wide stall.
    async fn rate_limit_pause(&self) {
        let jitter_ms = self.rpc_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        let pause = self.rpc_delay + jitter;
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}

#[async_trait]
impl AssetAdapter for IdleBalancesAdapter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn fetch_assets(&self, subvault: Address) -> Result<Vec<AssetData>, RpcError> {
        let mut holdings = Vec::new();

        let native = self.chain.native_balance(subvault).await?;
        if !native.is_zero() {
            holdings.push(AssetData {
                asset_address: self.base_asset,
                amount: native,
            });
        }

        for token in &self.tracked_assets {
            self.rate_limit_pause().await;
            let raw = self
                .chain
                .call(
                    *token,
                    encode_call("balanceOf(address)", &[Token::Address(subvault)]),
                    None,
                )
                .await?;
            let balance = decode_uint(&raw)?;
            if !balance.is_zero() {
                holdings.push(AssetData {
                    asset_address: *token,
                    amount: balance,
                });
            }
        }

        tracing::debug!(
            subvault = ?subvault,
            holdings = holdings.len(),
            "idle balance scan complete"
        );
        Ok(holdings)
    }
}
