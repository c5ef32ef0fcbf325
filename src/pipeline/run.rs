//! Pipeline orchestrator
//!
//! Sequences preflight, asset collection, pricing, validation, and
//! valuation under one wall-clock deadline and surfaces exactly one
//! terminal outcome per run: a report with optional warnings, or a single
//! named fatal error. There is no partial-success mode; on timeout every
//! partial result is discarded with the context.

use std::sync::Arc;
use std::time::Duration;

use crate::adapters::registry::{
    resolve_check, resolve_price_adapter, resolve_validator, AdapterDeps,
};
use crate::adapters::{CheckAdapter, PriceAdapter, PriceValidator};
use crate::clients::{EventSink, PriceNormalizer, SubvaultRegistry};
use crate::config::Settings;
use crate::error::PipelineError;
use crate::pipeline::assets::collect_assets;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::preflight::{run_preflight, BackoffPolicy, JitterSource, RandomJitter};
use crate::pipeline::pricing::{collect_prices, validate_prices};
use crate::pipeline::valuation::build_report;
use crate::report::OracleReport;
use crate::types::{CheckResult, PipelineEvent, ValidationResult};

/// Terminal success payload: the report plus everything surfaced but
/// non-fatal along the way.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub report: OracleReport,
    pub warnings: Vec<ValidationResult>,
    pub check_log: Vec<CheckResult>,
}

/// One fully-wired pipeline. Adapter names were resolved at construction;
/// running it is side-effect free apart from reads and emitted events.
pub struct Pipeline {
    settings: Arc<Settings>,
    deps: AdapterDeps,
    registry: Arc<dyn SubvaultRegistry>,
    normalizer: Arc<dyn PriceNormalizer>,
    sink: Arc<dyn EventSink>,
    checks: Vec<Arc<dyn CheckAdapter>>,
    price_adapters: Vec<Arc<dyn PriceAdapter>>,
    validators: Vec<Arc<dyn PriceValidator>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Validate settings and resolve every configured adapter name.
    /// All configuration errors surface here, before any network call.
    pub fn from_settings(
        settings: Arc<Settings>,
        deps: AdapterDeps,
        registry: Arc<dyn SubvaultRegistry>,
        normalizer: Arc<dyn PriceNormalizer>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, PipelineError> {
        settings.validate()?;

        let checks = settings
            .preflight
            .checks
            .iter()
            .map(|name| resolve_check(name, &settings, &deps))
            .collect::<Result<Vec<_>, _>>()?;
        let price_adapters = settings
            .pricing
            .adapters
            .iter()
            .map(|name| resolve_price_adapter(name, &settings, &deps))
            .collect::<Result<Vec<_>, _>>()?;
        let validators = settings
            .pricing
            .validators
            .iter()
            .map(|name| resolve_validator(name, &settings, &deps))
            .collect::<Result<Vec<_>, _>>()?;

        // Asset adapter names resolve per work item at collection time,
        // but unknown names must still fail at startup.
        for sv in &settings.collection.subvaults {
            for name in &sv.additional_adapters {
                crate::adapters::registry::resolve_asset_adapter(name, &settings, &deps)?;
            }
        }

        Ok(Self {
            settings,
            deps,
            registry,
            normalizer,
            sink,
            checks,
            price_adapters,
            validators,
        })
    }

    /// Execute one run under the configured global deadline. A deadline
    /// of zero disables the timeout entirely.
    pub async fn run(&self) -> Result<PipelineOutcome, PipelineError> {
        self.run_with_jitter(&mut RandomJitter).await
    }

    /// The jitter source is injected for deterministic retry tests.
    pub async fn run_with_jitter(
        &self,
        jitter: &mut dyn JitterSource,
    ) -> Result<PipelineOutcome, PipelineError> {
        let deadline = Duration::from_secs(self.settings.run.global_timeout_secs);
        if deadline.is_zero() {
            return self.run_inner(jitter).await;
        }
        match tokio::time::timeout(deadline, self.run_inner(jitter)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PipelineError::Timeout(deadline)),
        }
    }

    async fn run_inner(
        &self,
        jitter: &mut dyn JitterSource,
    ) -> Result<PipelineOutcome, PipelineError> {
        let settings = &self.settings;
        tracing::info!(
            vault = ?settings.vault.vault_address,
            network = %settings.vault.network,
            "starting oracle pipeline"
        );

        let mut ctx = PipelineContext::new(
            settings.vault.vault_address,
            settings.vault.base_asset,
            self.sink.clone(),
        );

        let policy = BackoffPolicy {
            base: Duration::from_millis(settings.preflight.backoff_base_ms),
            max_retries: settings.preflight.max_retries,
        };
        ctx.check_log = run_preflight(&self.checks, policy, jitter, self.sink.as_ref()).await?;
        self.stage_done("preflight");

        ctx.block_number = self.deps.chain.block_number().await?;

        ctx.assets = collect_assets(
            settings,
            self.registry.as_ref(),
            &self.deps,
            self.sink.as_ref(),
        )
        .await?;
        self.stage_done("asset_collection");

        ctx.prices = collect_prices(
            &ctx.assets,
            ctx.base_asset,
            &self.price_adapters,
            self.sink.as_ref(),
        )
        .await?;
        ctx.warnings = validate_prices(
            &ctx.prices,
            &self.validators,
            settings.pricing.failure_tolerance_pct,
            self.sink.as_ref(),
        )
        .await?;
        self.stage_done("pricing");

        let report = build_report(
            &ctx.assets,
            &ctx.prices,
            self.deps.chain.as_ref(),
            self.normalizer.as_ref(),
            ctx.vault_address,
            ctx.block_number,
            settings.valuation.ignore_empty_vault,
        )
        .await?;
        self.stage_done("valuation");

        tracing::info!(
            total_value = %report.total_value,
            warnings = ctx.warnings.len(),
            "pipeline complete"
        );
        Ok(PipelineOutcome {
            report,
            warnings: ctx.warnings,
            check_log: ctx.check_log,
        })
    }

    fn stage_done(&self, stage: &str) {
        self.sink.emit(PipelineEvent::StageCompleted {
            stage: stage.to_string(),
        });
    }
}
