//! Report-interval timeout check
//!
//! Reads the oracle contract's last report timestamp and minimum report
//! interval; submission is only allowed once the interval has elapsed.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::Address;

use crate::adapters::checks::format_time_remaining;
use crate::adapters::CheckAdapter;
use crate::clients::{decode_u64, encode_call, ChainClient};
use crate::error::RpcError;
use crate::types::CheckResult;

pub struct TimeoutCheck {
    chain: Arc<dyn ChainClient>,
    oracle_address: Address,
    ignore: bool,
}

impl TimeoutCheck {
    pub const NAME: &'static str = "timeout";

    pub fn new(chain: Arc<dyn ChainClient>, oracle_address: Address, ignore: bool) -> Self {
        Self {
            chain,
            oracle_address,
            ignore,
        }
    }

    async fn read_uint(&self, signature: &str) -> Result<u64, RpcError> {
        let raw = self
            .chain
            .call(self.oracle_address, encode_call(signature, &[]), None)
            .await?;
        decode_u64(&raw)
    }
}

#[async_trait]
impl CheckAdapter for TimeoutCheck {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn skipped(&self) -> bool {
        self.ignore
    }

    async fn run_check(&self) -> CheckResult {
        let last_report = match self.read_uint("lastReportTimestamp()").await {
            Ok(value) => value,
            // Transient RPC trouble is worth a retry; a decode failure is not.
            Err(e @ RpcError::Transport(_)) => {
                return CheckResult::failed(Self::NAME, e.to_string(), true)
            }
            Err(e) => return CheckResult::failed(Self::NAME, e.to_string(), false),
        };

        if last_report == 0 {
            return CheckResult::passed(Self::NAME, "no previous report, submission allowed");
        }

        let interval = match self.read_uint("reportInterval()").await {
            Ok(value) => value,
            Err(e @ RpcError::Transport(_)) => {
                return CheckResult::failed(Self::NAME, e.to_string(), true)
            }
            Err(e) => return CheckResult::failed(Self::NAME, e.to_string(), false),
        };

        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let Some(next_valid) = last_report.checked_add(interval) else {
            return CheckResult::failed(
                Self::NAME,
                format!("implausible report schedule: last {last_report} + interval {interval}"),
                false,
            );
        };

        if now >= next_valid {
            CheckResult::passed(Self::NAME, "report interval elapsed, submission allowed")
        } else {
            let remaining = format_time_remaining(next_valid - now);
            CheckResult::failed(
                Self::NAME,
                format!("cannot submit, {remaining} remaining until next valid report"),
                false,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{encode, Token};
    use ethers::types::{Bytes, U256};
    use ethers::utils::id;

    use crate::error::RpcError;

    /// Oracle stub replaying fixed words for the two reads.
    struct StubOracle {
        last_report: U256,
        interval: U256,
    }

    #[async_trait]
    impl ChainClient for StubOracle {
        async fn call(
            &self,
            _contract: Address,
            calldata: Bytes,
            _block: Option<u64>,
        ) -> Result<Bytes, RpcError> {
            let word = if &calldata[..4] == &id("lastReportTimestamp()")[..] {
                self.last_report
            } else {
                self.interval
            };
            Ok(encode(&[Token::Uint(word)]).into())
        }

        async fn native_balance(&self, _account: Address) -> Result<U256, RpcError> {
            Ok(U256::zero())
        }

        async fn block_number(&self) -> Result<u64, RpcError> {
            Ok(0)
        }
    }

    fn check(last_report: U256, interval: U256) -> TimeoutCheck {
        TimeoutCheck::new(
            Arc::new(StubOracle {
                last_report,
                interval,
            }),
            Address::from_low_u64_be(0x300),
            false,
        )
    }

    #[tokio::test]
    async fn test_no_previous_report_passes() {
        let result = check(U256::zero(), U256::from(3600u64)).run_check().await;
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_oversized_timestamp_fails_without_retry() {
        // A word wider than u64 is a decode failure, not a panic.
        let result = check(U256::MAX, U256::from(3600u64)).run_check().await;
        assert!(!result.passed);
        assert!(!result.retry_recommended);
    }

    #[tokio::test]
    async fn test_schedule_overflow_fails_without_retry() {
        let result = check(U256::from(u64::MAX), U256::from(u64::MAX))
            .run_check()
            .await;
        assert!(!result.passed);
        assert!(!result.retry_recommended);
        assert!(result.message.contains("implausible report schedule"));
    }
}
