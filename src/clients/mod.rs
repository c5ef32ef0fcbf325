//! External capabilities consumed by the pipeline core
//!
//! The core never constructs providers itself; it receives these traits
//! from the caller. Concrete implementations backed by JSON-RPC and HTTP
//! live in [`rpc`] and [`http`]; tests substitute in-memory fakes.

pub mod http;
pub mod rpc;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

use crate::error::{PipelineError, PriceFetchError, RpcError};
use crate::types::PipelineEvent;

/// Read-only chain access. One method, no state mutation.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Perform an `eth_call` against `contract` with raw calldata,
    /// optionally pinned to a block.
    async fn call(
        &self,
        contract: Address,
        calldata: Bytes,
        block: Option<u64>,
    ) -> Result<Bytes, RpcError>;

    /// Native-asset balance of an account.
    async fn native_balance(&self, account: Address) -> Result<U256, RpcError>;

    /// Latest block number, recorded in the report as the snapshot block.
    async fn block_number(&self) -> Result<u64, RpcError>;
}

#[async_trait]
impl<T: ChainClient + ?Sized> ChainClient for Arc<T> {
    async fn call(
        &self,
        contract: Address,
        calldata: Bytes,
        block: Option<u64>,
    ) -> Result<Bytes, RpcError> {
        (**self).call(contract, calldata, block).await
    }

    async fn native_balance(&self, account: Address) -> Result<U256, RpcError> {
        (**self).native_balance(account).await
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        (**self).block_number().await
    }
}

/// On-chain registry of a vault's subvaults.
#[async_trait]
pub trait SubvaultRegistry: Send + Sync {
    async fn subvaults(&self, vault: Address) -> Result<Vec<Address>, RpcError>;
}

/// Off-chain price source queried by the general-purpose price adapter
/// and re-queried independently by the reference validator.
#[async_trait]
pub trait PriceSourceClient: Send + Sync {
    async fn fetch(
        &self,
        assets: &[Address],
    ) -> Result<BTreeMap<Address, U256>, PriceFetchError>;
}

/// External normalization step mapping raw per-asset prices to the final
/// prices carried in the report. Treated as a synchronous black box whose
/// failure is fatal.
#[async_trait]
pub trait PriceNormalizer: Send + Sync {
    async fn normalize(
        &self,
        total_value: U256,
        prices: &[U256],
    ) -> Result<Vec<U256>, PipelineError>;
}

/// Fire-and-forget structured event sink. Must never block or fail.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Default sink: forwards every event to `tracing` as structured JSON.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(target: "pipeline_events", event = %json),
            Err(e) => tracing::debug!("unserializable pipeline event: {e}"),
        }
    }
}

/// Build calldata from a function signature and ABI tokens.
pub fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend(encode(args));
    data.into()
}

/// Decode a single 256-bit word from a contract response.
pub fn decode_uint(data: &Bytes) -> Result<U256, RpcError> {
    let tokens = decode(&[ParamType::Uint(256)], data)
        .map_err(|e| RpcError::Decode(e.to_string()))?;
    match tokens.first() {
        Some(Token::Uint(value)) => Ok(*value),
        other => Err(RpcError::Decode(format!("expected uint, got {other:?}"))),
    }
}

/// Decode a single 256-bit word and narrow it to `u64`. Contracts are
/// untrusted; a word wider than `u64` is a decode error, never a panic.
pub fn decode_u64(data: &Bytes) -> Result<u64, RpcError> {
    let value = decode_uint(data)?;
    if value > U256::from(u64::MAX) {
        return Err(RpcError::Decode(format!("uint out of u64 range: {value}")));
    }
    Ok(value.as_u64())
}

/// Decode a single address from a contract response.
pub fn decode_address(data: &Bytes) -> Result<Address, RpcError> {
    let tokens = decode(&[ParamType::Address], data)
        .map_err(|e| RpcError::Decode(e.to_string()))?;
    match tokens.first() {
        Some(Token::Address(addr)) => Ok(*addr),
        other => Err(RpcError::Decode(format!("expected address, got {other:?}"))),
    }
}

/// Decode a dynamic `uint256[]` from a contract response.
pub fn decode_uint_array(data: &Bytes) -> Result<Vec<U256>, RpcError> {
    let tokens = decode(&[ParamType::Array(Box::new(ParamType::Uint(256)))], data)
        .map_err(|e| RpcError::Decode(e.to_string()))?;
    match tokens.into_iter().next() {
        Some(Token::Array(items)) => items
            .into_iter()
            .map(|t| match t {
                Token::Uint(value) => Ok(value),
                other => Err(RpcError::Decode(format!("expected uint, got {other:?}"))),
            })
            .collect(),
        other => Err(RpcError::Decode(format!("expected array, got {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_call_prepends_selector() {
        let calldata = encode_call("balanceOf(address)", &[Token::Address(Address::zero())]);
        assert_eq!(&calldata[..4], &id("balanceOf(address)")[..]);
        assert_eq!(calldata.len(), 4 + 32);
    }

    #[test]
    fn test_uint_roundtrip() {
        let word: Bytes = encode(&[Token::Uint(U256::from(42u64))]).into();
        assert_eq!(decode_uint(&word).unwrap(), U256::from(42u64));
    }

    #[test]
    fn test_u64_narrowing_is_checked() {
        let word: Bytes = encode(&[Token::Uint(U256::from(7u64))]).into();
        assert_eq!(decode_u64(&word).unwrap(), 7);

        let wide: Bytes = encode(&[Token::Uint(U256::MAX)]).into();
        assert!(matches!(decode_u64(&wide), Err(RpcError::Decode(_))));
    }

    #[test]
    fn test_uint_array_roundtrip() {
        let payload: Bytes = encode(&[Token::Array(vec![
            Token::Uint(U256::from(1u64)),
            Token::Uint(U256::from(2u64)),
        ])])
        .into();
        assert_eq!(
            decode_uint_array(&payload).unwrap(),
            vec![U256::from(1u64), U256::from(2u64)]
        );
    }
}
