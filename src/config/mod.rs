//! Configuration management for the oracle pipeline
//!
//! Loads from TOML files + environment variables via .env. The pipeline
//! core only ever sees the fully-resolved [`Settings`] snapshot; stages
//! receive the narrow section they need, never the whole object.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use ethers::types::Address;
use serde::Deserialize;

use crate::error::PipelineError;

/// Fully-resolved application settings. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub vault: VaultConfig,
    pub endpoints: EndpointsConfig,
    pub preflight: PreflightConfig,
    pub collection: CollectionConfig,
    pub pricing: PricingConfig,
    pub valuation: ValuationConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsConfig {
    /// JSON-RPC node URL.
    pub rpc_url: String,
    /// Off-chain USD price feed queried by the price adapter.
    pub price_feed_url: String,
    /// Independent feed used by the reference validator. Falls back to
    /// the primary feed when unset.
    #[serde(default)]
    pub reference_feed_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// Vault contract address the snapshot is computed for.
    pub vault_address: Address,
    /// Unit of account all prices are expressed in (implicitly priced 1.0).
    pub base_asset: Address,
    /// Wrapped form of the base asset, priced by the specialist adapter.
    #[serde(default)]
    pub wrapped_base_asset: Option<Address>,
    /// Oracle contract holding the last-report state read by preflight.
    pub oracle_address: Address,
    /// On-chain helper performing the final price normalization.
    pub oracle_helper_address: Address,
    /// Governance contract queried by the active-proposal check.
    #[serde(default)]
    pub governor_address: Option<Address>,
    /// Network name, for logging only.
    pub network: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreflightConfig {
    /// Checks to run, in order. Names resolved against the registry at startup.
    pub checks: Vec<String>,
    /// Per-check retry budget for retry-recommended failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries, in milliseconds.
    pub backoff_base_ms: u64,
    /// Treat the report-interval timeout check as skipped.
    pub ignore_timeout_check: bool,
    /// Treat the active-proposal check as skipped.
    pub ignore_active_proposal_check: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    /// Maximum concurrent in-flight adapter calls.
    pub max_concurrent_calls: usize,
    /// Base delay applied after each RPC-bound call within an adapter, ms.
    pub rpc_delay_ms: u64,
    /// Random jitter added on top of the base delay, ms.
    pub rpc_jitter_ms: u64,
    /// ERC-20 assets the idle-balance scan queries per subvault.
    pub tracked_assets: Vec<Address>,
    /// Per-subvault adapter overrides.
    pub subvaults: Vec<SubvaultConfig>,
    /// Required for any subvault that opts out of existence validation.
    pub allow_dangerous: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubvaultConfig {
    pub address: Address,
    /// Extra adapters to run for this subvault, by registry name.
    #[serde(default)]
    pub additional_adapters: Vec<String>,
    /// Skip the default idle-balance scan for this subvault.
    #[serde(default)]
    pub skip_idle_balances: bool,
    /// Bypass on-chain registry validation. Only honored together with
    /// `collection.allow_dangerous`; the bypass must be opted into twice.
    #[serde(default)]
    pub skip_existence_check: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    /// Price adapters in declared order; later adapters override earlier
    /// entries for the same asset.
    pub adapters: Vec<String>,
    /// Validators to run after the chain completes.
    pub validators: Vec<String>,
    /// Keep the reference-feed validator registered but inert.
    pub disable_reference_validator: bool,
    /// Deviation at or above this percentage is recorded as a warning.
    pub warning_tolerance_pct: f64,
    /// Deviation at or above this percentage aborts the pipeline.
    /// Must be strictly greater than the warning tolerance.
    pub failure_tolerance_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValuationConfig {
    /// Emit an all-zero report instead of failing on an empty vault.
    pub ignore_empty_vault: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Global wall-clock deadline for one pipeline run, seconds. Zero
    /// disables the deadline.
    pub global_timeout_secs: u64,
    pub log_level: String,
}

impl Settings {
    /// Load configuration from file and environment.
    ///
    /// Precedence: environment (`TVL_ORACLE_*`) > `config/local` >
    /// `config/default` > built-in defaults. Addresses have no defaults
    /// and must come from file or environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Preflight defaults
            .set_default("preflight.checks", vec!["timeout", "active_proposal"])?
            .set_default("preflight.max_retries", 3)?
            .set_default("preflight.backoff_base_ms", 2000)?
            .set_default("preflight.ignore_timeout_check", false)?
            .set_default("preflight.ignore_active_proposal_check", false)?
            // Collection defaults
            .set_default("collection.max_concurrent_calls", 4)?
            .set_default("collection.rpc_delay_ms", 150)?
            .set_default("collection.rpc_jitter_ms", 100)?
            .set_default("collection.tracked_assets", Vec::<String>::new())?
            .set_default("collection.allow_dangerous", false)?
            // Pricing defaults
            .set_default("pricing.adapters", vec!["usd_feed", "wrapped_native"])?
            .set_default("pricing.validators", vec!["positive_prices", "reference_feed"])?
            .set_default("pricing.disable_reference_validator", false)?
            .set_default("pricing.warning_tolerance_pct", 0.5)?
            .set_default("pricing.failure_tolerance_pct", 1.0)?
            // Valuation defaults
            .set_default("valuation.ignore_empty_vault", false)?
            // Run defaults
            .set_default("run.global_timeout_secs", 300)?
            .set_default("run.log_level", "info")?
            .set_default("vault.network", "mainnet")?
            .set_default("endpoints.rpc_url", "http://localhost:8545")?
            .set_default("endpoints.price_feed_url", "")?
            // Load config file if present
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (TVL_ORACLE_*)
            .add_source(Environment::with_prefix("TVL_ORACLE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let settings: Settings = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(settings)
    }

    /// Enforce startup-time configuration invariants.
    ///
    /// These are never re-checked at runtime; a settings object that
    /// passed validation is trusted by every stage.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.pricing.failure_tolerance_pct <= self.pricing.warning_tolerance_pct {
            return Err(PipelineError::ConfigInvariant(format!(
                "failure tolerance ({}%) must be strictly greater than warning tolerance ({}%)",
                self.pricing.failure_tolerance_pct, self.pricing.warning_tolerance_pct
            )));
        }
        if self.collection.max_concurrent_calls == 0 {
            return Err(PipelineError::ConfigInvariant(
                "collection.max_concurrent_calls must be at least 1".to_string(),
            ));
        }
        for sv in &self.collection.subvaults {
            if sv.skip_existence_check && !self.collection.allow_dangerous {
                return Err(PipelineError::ConfigInvariant(format!(
                    "subvault {:?} sets skip_existence_check but collection.allow_dangerous is off",
                    sv.address
                )));
            }
        }
        Ok(())
    }

    /// One-line digest for startup logging. Never includes secrets.
    pub fn digest(&self) -> String {
        format!(
            "vault={:?} network={} checks={:?} adapters={:?} timeout={}s",
            self.vault.vault_address,
            self.vault.network,
            self.preflight.checks,
            self.pricing.adapters,
            self.run.global_timeout_secs
        )
    }

    /// Adapter configuration for a subvault, falling back to defaults.
    pub fn subvault_config(&self, address: Address) -> SubvaultConfig {
        self.collection
            .subvaults
            .iter()
            .find(|sv| sv.address == address)
            .cloned()
            .unwrap_or(SubvaultConfig {
                address,
                additional_adapters: Vec::new(),
                skip_idle_balances: false,
                skip_existence_check: false,
            })
    }
}

impl std::fmt::Display for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Settings with every address zeroed and conservative defaults,
    /// for unit tests that never touch the network.
    pub fn settings_fixture() -> Settings {
        Settings {
            vault: VaultConfig {
                vault_address: Address::from_low_u64_be(0xa1),
                base_asset: Address::from_low_u64_be(0xa2),
                wrapped_base_asset: None,
                oracle_address: Address::from_low_u64_be(0xa3),
                oracle_helper_address: Address::from_low_u64_be(0xa4),
                governor_address: None,
                network: "testnet".to_string(),
            },
            endpoints: EndpointsConfig {
                rpc_url: "http://localhost:8545".to_string(),
                price_feed_url: String::new(),
                reference_feed_url: None,
            },
            preflight: PreflightConfig {
                checks: vec![],
                max_retries: 3,
                backoff_base_ms: 0,
                ignore_timeout_check: false,
                ignore_active_proposal_check: false,
            },
            collection: CollectionConfig {
                max_concurrent_calls: 4,
                rpc_delay_ms: 0,
                rpc_jitter_ms: 0,
                tracked_assets: vec![],
                subvaults: vec![],
                allow_dangerous: false,
            },
            pricing: PricingConfig {
                adapters: vec![],
                validators: vec![],
                disable_reference_validator: false,
                warning_tolerance_pct: 0.5,
                failure_tolerance_pct: 1.0,
            },
            valuation: ValuationConfig {
                ignore_empty_vault: false,
            },
            run: RunConfig {
                global_timeout_secs: 0,
                log_level: "debug".to_string(),
            },
        }
    }
}
