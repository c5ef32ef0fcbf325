//! Sanity validator: every assembled price must be strictly positive.

use async_trait::async_trait;

use crate::adapters::PriceValidator;
use crate::error::PipelineError;
use crate::types::{PriceData, Severity, ValidationResult};

pub struct PositivePricesValidator;

impl PositivePricesValidator {
    pub const NAME: &'static str = "positive_prices";
}

#[async_trait]
impl PriceValidator for PositivePricesValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn validate(
        &self,
        prices: &PriceData,
    ) -> Result<Vec<ValidationResult>, PipelineError> {
        let findings = prices
            .prices
            .iter()
            .filter(|(asset, price)| **asset != prices.base_asset && price.is_zero())
            .map(|(asset, _)| ValidationResult {
                asset_address: *asset,
                severity: Severity::Failure,
                message: "price is zero after the full adapter chain".to_string(),
                deviation_pct: None,
            })
            .collect();
        Ok(findings)
    }
}
