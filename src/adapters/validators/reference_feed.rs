//! Reference-feed deviation validator
//!
//! Re-fetches prices from an independent source and compares them to the
//! assembled set. The base asset is skipped; it has no independent price.

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::validators::{classify_deviation, Tolerances};
use crate::adapters::PriceValidator;
use crate::clients::PriceSourceClient;
use crate::error::PipelineError;
use crate::types::{PriceData, ValidationResult};
use crate::units::deviation_pct;

pub struct ReferenceFeedValidator {
    reference: Arc<dyn PriceSourceClient>,
    tolerances: Tolerances,
    disabled: bool,
}

impl ReferenceFeedValidator {
    pub const NAME: &'static str = "reference_feed";

    pub fn new(
        reference: Arc<dyn PriceSourceClient>,
        tolerances: Tolerances,
        disabled: bool,
    ) -> Self {
        Self {
            reference,
            tolerances,
            disabled,
        }
    }
}

#[async_trait]
impl PriceValidator for ReferenceFeedValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn disabled(&self) -> bool {
        self.disabled
    }

    async fn validate(
        &self,
        prices: &PriceData,
    ) -> Result<Vec<ValidationResult>, PipelineError> {
        let assets: Vec<_> = prices
            .prices
            .keys()
            .copied()
            .filter(|a| *a != prices.base_asset)
            .collect();
        if assets.is_empty() {
            return Ok(Vec::new());
        }

        let reference_prices = self.reference.fetch(&assets).await?;

        let mut findings = Vec::new();
        for asset in assets {
            // The reference source may not cover every asset; that is not
            // a finding, the asset simply goes unvalidated here.
            let Some(reference) = reference_prices.get(&asset) else {
                tracing::debug!(asset = ?asset, "no reference price, skipping");
                continue;
            };
            let own = prices.prices[&asset];
            let deviation = deviation_pct(own, *reference);
            if let Some(finding) =
                classify_deviation(asset, deviation, self.tolerances, Self::NAME)
            {
                findings.push(finding);
            }
        }
        Ok(findings)
    }
}
