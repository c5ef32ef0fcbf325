//! Oracle pipeline entry point
//!
//! Loads settings, wires the JSON-RPC and HTTP clients behind the
//! pipeline's capability traits, runs one snapshot, and prints the
//! report as JSON on stdout.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use tvl_oracle::adapters::registry::AdapterDeps;
use tvl_oracle::clients::http::HttpPriceSource;
use tvl_oracle::clients::rpc::{HelperNormalizer, RpcChainClient, VaultSubvaultRegistry};
use tvl_oracle::clients::{ChainClient, PriceSourceClient, TracingSink};
use tvl_oracle::config::Settings;
use tvl_oracle::pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Arc::new(Settings::load().context("failed to load configuration")?);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.run.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(config = %settings.digest(), "configuration loaded");

    if settings.endpoints.price_feed_url.is_empty() {
        bail!("endpoints.price_feed_url is not configured");
    }

    let chain: Arc<dyn ChainClient> = Arc::new(
        RpcChainClient::new(&settings.endpoints.rpc_url)
            .context("failed to construct rpc client")?,
    );
    let price_source: Arc<dyn PriceSourceClient> = Arc::new(
        HttpPriceSource::new(settings.endpoints.price_feed_url.clone(), "usd_feed")
            .context("failed to construct price feed client")?,
    );
    let reference_url = settings
        .endpoints
        .reference_feed_url
        .clone()
        .unwrap_or_else(|| settings.endpoints.price_feed_url.clone());
    let reference_source: Arc<dyn PriceSourceClient> = Arc::new(
        HttpPriceSource::new(reference_url, "reference_feed")
            .context("failed to construct reference feed client")?,
    );

    let registry = Arc::new(VaultSubvaultRegistry::new(chain.clone()));
    let normalizer = Arc::new(HelperNormalizer::new(
        chain.clone(),
        settings.vault.oracle_helper_address,
    ));

    let pipeline = Pipeline::from_settings(
        settings,
        AdapterDeps {
            chain,
            price_source,
            reference_source,
        },
        registry,
        normalizer,
        Arc::new(TracingSink),
    )
    .context("failed to assemble pipeline")?;

    let outcome = pipeline.run().await.context("pipeline run failed")?;

    for warning in &outcome.warnings {
        tracing::warn!(
            asset = ?warning.asset_address,
            deviation_pct = warning.deviation_pct,
            "report carries a price deviation warning"
        );
    }

    println!("{}", outcome.report.to_json()?);
    Ok(())
}
