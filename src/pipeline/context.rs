//! Per-run pipeline context
//!
//! Mutable, single-owner state threaded through one run. The orchestrator
//! owns it exclusively; stages never see the whole context, only the
//! accumulator they produce and the settings slice they read. Everything
//! here is discarded once the report is handed off.

use std::sync::Arc;

use ethers::types::Address;

use crate::clients::EventSink;
use crate::types::{AggregatedAssets, CheckResult, PriceData, ValidationResult};

pub struct PipelineContext {
    pub vault_address: Address,
    pub base_asset: Address,
    /// Snapshot block recorded in the report.
    pub block_number: u64,
    pub check_log: Vec<CheckResult>,
    pub assets: AggregatedAssets,
    pub prices: PriceData,
    pub warnings: Vec<ValidationResult>,
    pub sink: Arc<dyn EventSink>,
}

impl PipelineContext {
    pub fn new(vault_address: Address, base_asset: Address, sink: Arc<dyn EventSink>) -> Self {
        Self {
            vault_address,
            base_asset,
            block_number: 0,
            check_log: Vec::new(),
            assets: AggregatedAssets::new(),
            prices: PriceData::new(base_asset),
            warnings: Vec::new(),
            sink,
        }
    }
}
