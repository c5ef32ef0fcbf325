//! JSON-RPC backed implementations of the chain capabilities
//!
//! Wraps an ethers HTTP provider behind the narrow [`ChainClient`] trait
//! so the pipeline stages stay testable without a node.

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockId, Bytes, TransactionRequest, U256};

use crate::clients::{
    decode_address, decode_u64, decode_uint_array, encode_call, ChainClient, PriceNormalizer,
    SubvaultRegistry,
};
use crate::error::{PipelineError, RpcError};

/// Read-only chain client over HTTP JSON-RPC.
pub struct RpcChainClient {
    provider: Provider<Http>,
}

impl RpcChainClient {
    pub fn new(rpc_url: &str) -> Result<Self, RpcError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| RpcError::Transport(format!("invalid rpc url: {e}")))?;
        Ok(Self { provider })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn call(
        &self,
        contract: Address,
        calldata: Bytes,
        block: Option<u64>,
    ) -> Result<Bytes, RpcError> {
        let tx: TypedTransaction = TransactionRequest::new()
            .to(contract)
            .data(calldata)
            .into();
        let block = block.map(BlockId::from);
        self.provider
            .call(&tx, block)
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))
    }

    async fn native_balance(&self, account: Address) -> Result<U256, RpcError> {
        self.provider
            .get_balance(account, None)
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        let number = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(number.as_u64())
    }
}

/// Subvault discovery via the vault contract's `subvaults()` count and
/// `subvaultAt(uint256)` accessor.
pub struct VaultSubvaultRegistry<C> {
    chain: C,
}

impl<C: ChainClient> VaultSubvaultRegistry<C> {
    pub fn new(chain: C) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl<C: ChainClient> SubvaultRegistry for VaultSubvaultRegistry<C> {
    async fn subvaults(&self, vault: Address) -> Result<Vec<Address>, RpcError> {
        let count_raw = self
            .chain
            .call(vault, encode_call("subvaults()", &[]), None)
            .await?;
        let count = decode_u64(&count_raw)?;

        let mut addresses = Vec::with_capacity(count as usize);
        for i in 0..count {
            let raw = self
                .chain
                .call(
                    vault,
                    encode_call("subvaultAt(uint256)", &[Token::Uint(U256::from(i))]),
                    None,
                )
                .await?;
            addresses.push(decode_address(&raw)?);
        }
        Ok(addresses)
    }
}

/// Final-price normalization via the on-chain oracle helper's
/// `getFinalPrices(uint256,uint256[])` view. A revert propagates as
/// a fatal derivation error.
pub struct HelperNormalizer<C> {
    chain: C,
    helper_address: Address,
}

impl<C: ChainClient> HelperNormalizer<C> {
    pub fn new(chain: C, helper_address: Address) -> Self {
        Self {
            chain,
            helper_address,
        }
    }
}

#[async_trait]
impl<C: ChainClient> PriceNormalizer for HelperNormalizer<C> {
    async fn normalize(
        &self,
        total_value: U256,
        prices: &[U256],
    ) -> Result<Vec<U256>, PipelineError> {
        let calldata = encode_call(
            "getFinalPrices(uint256,uint256[])",
            &[
                Token::Uint(total_value),
                Token::Array(prices.iter().copied().map(Token::Uint).collect()),
            ],
        );
        let raw = self
            .chain
            .call(self.helper_address, calldata, None)
            .await
            .map_err(|e| PipelineError::Derivation(e.to_string()))?;
        let finals = decode_uint_array(&raw).map_err(|e| PipelineError::Derivation(e.to_string()))?;
        if finals.len() != prices.len() {
            return Err(PipelineError::Derivation(format!(
                "helper returned {} prices for {} assets",
                finals.len(),
                prices.len()
            )));
        }
        Ok(finals)
    }
}
