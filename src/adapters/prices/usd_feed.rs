//! General-purpose feed adapter
//!
//! Prices every asset still missing from the accumulator through the
//! injected price-source client. Coverage may be partial; addresses the
//! source does not know simply pass through to the next adapter.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::Address;

use crate::adapters::PriceAdapter;
use crate::clients::PriceSourceClient;
use crate::error::PipelineError;
use crate::types::PriceData;

pub struct UsdFeedAdapter {
    source: Arc<dyn PriceSourceClient>,
}

impl UsdFeedAdapter {
    pub const NAME: &'static str = "usd_feed";

    pub fn new(source: Arc<dyn PriceSourceClient>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl PriceAdapter for UsdFeedAdapter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn fetch_prices(
        &self,
        assets: &[Address],
        mut accumulator: PriceData,
    ) -> Result<PriceData, PipelineError> {
        let wanted = accumulator.missing_from(assets);
        if wanted.is_empty() {
            return Ok(accumulator);
        }

        let fetched = self.source.fetch(&wanted).await?;
        tracing::debug!(requested = wanted.len(), received = fetched.len(), "usd feed response");

        for (asset, price) in fetched {
            accumulator.prices.insert(asset, price);
        }
        Ok(accumulator)
    }
}
