//! HTTP price-source client
//!
//! Queries a REST price API returning a JSON object keyed by asset
//! address with 18-decimal integer prices as decimal strings.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address, U256};

use crate::clients::PriceSourceClient;
use crate::error::PriceFetchError;

pub struct HttpPriceSource {
    client: reqwest::Client,
    endpoint: String,
    name: String,
}

impl HttpPriceSource {
    pub fn new(
        endpoint: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, PriceFetchError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PriceFetchError {
                source_name: name.clone(),
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            name,
        })
    }

    fn err(&self, message: impl Into<String>) -> PriceFetchError {
        PriceFetchError {
            source_name: self.name.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl PriceSourceClient for HttpPriceSource {
    async fn fetch(
        &self,
        assets: &[Address],
    ) -> Result<BTreeMap<Address, U256>, PriceFetchError> {
        let joined = assets
            .iter()
            .map(|a| format!("{a:?}"))
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("assets", joined.as_str())])
            .send()
            .await
            .map_err(|e| self.err(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.err(format!("price api returned {}", response.status())));
        }

        let body: HashMap<String, String> = response
            .json()
            .await
            .map_err(|e| self.err(format!("invalid response body: {e}")))?;

        let mut prices = BTreeMap::new();
        for (raw_address, raw_price) in body {
            let address: Address = raw_address
                .parse()
                .map_err(|e| self.err(format!("bad address '{raw_address}': {e}")))?;
            let price = U256::from_dec_str(&raw_price)
                .map_err(|e| self.err(format!("bad price '{raw_price}': {e}")))?;
            prices.insert(address, price);
        }
        Ok(prices)
    }
}
