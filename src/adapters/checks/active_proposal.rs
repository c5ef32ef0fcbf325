//! Active report-proposal check
//!
//! Refuses to start a new run while a previously submitted report is
//! still being voted on in the governance contract. A pending proposal
//! normally resolves on its own, so the failure is retry-recommended.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::Address;

use crate::adapters::CheckAdapter;
use crate::clients::{decode_uint, encode_call, ChainClient};
use crate::types::CheckResult;

pub struct ActiveProposalCheck {
    chain: Arc<dyn ChainClient>,
    governor_address: Option<Address>,
    ignore: bool,
}

impl ActiveProposalCheck {
    pub const NAME: &'static str = "active_proposal";

    pub fn new(chain: Arc<dyn ChainClient>, governor_address: Option<Address>, ignore: bool) -> Self {
        Self {
            chain,
            governor_address,
            ignore,
        }
    }
}

#[async_trait]
impl CheckAdapter for ActiveProposalCheck {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn skipped(&self) -> bool {
        self.ignore
    }

    async fn run_check(&self) -> CheckResult {
        let Some(governor) = self.governor_address else {
            return CheckResult::passed(Self::NAME, "no governor configured, check skipped");
        };

        let raw = match self
            .chain
            .call(governor, encode_call("pendingReportProposals()", &[]), None)
            .await
        {
            Ok(raw) => raw,
            Err(e) => return CheckResult::failed(Self::NAME, e.to_string(), true),
        };

        let pending = match decode_uint(&raw) {
            Ok(value) => value,
            Err(e) => return CheckResult::failed(Self::NAME, e.to_string(), false),
        };

        if pending.is_zero() {
            CheckResult::passed(Self::NAME, "no active report proposals")
        } else {
            CheckResult::failed(
                Self::NAME,
                format!("{pending} report proposal(s) pending vote"),
                true,
            )
        }
    }
}
