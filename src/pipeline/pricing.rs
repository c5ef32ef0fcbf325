//! Price collector and validation stage
//!
//! Price adapters run sequentially in declared order over a shared
//! accumulator; later adapters override earlier ones per address. After
//! the chain, every aggregated asset except the base asset must carry a
//! price. Validators then run over the assembled set: failures abort,
//! warnings travel onward as data.

use std::sync::Arc;

use ethers::types::Address;

use crate::adapters::{PriceAdapter, PriceValidator};
use crate::clients::EventSink;
use crate::error::PipelineError;
use crate::types::{AggregatedAssets, PipelineEvent, PriceData, Severity, ValidationResult};

/// Run the adapter chain and enforce full coverage of the aggregate.
pub async fn collect_prices(
    assets: &AggregatedAssets,
    base_asset: Address,
    adapters: &[Arc<dyn PriceAdapter>],
    sink: &dyn EventSink,
) -> Result<PriceData, PipelineError> {
    let addresses = assets.addresses();
    let mut accumulator = PriceData::new(base_asset);

    for adapter in adapters {
        accumulator = adapter.fetch_prices(&addresses, accumulator).await?;
        sink.emit(PipelineEvent::PricesFetched {
            adapter: adapter.name().to_string(),
            covered: accumulator.prices.len(),
        });
        tracing::debug!(
            adapter = adapter.name(),
            covered = accumulator.prices.len(),
            "price adapter complete"
        );
    }

    if let Some(asset) = accumulator.missing_from(&addresses).first() {
        return Err(PipelineError::MissingPrice { asset: *asset });
    }
    Ok(accumulator)
}

/// Run every enabled validator. The first failure-severity finding aborts
/// with its deviation; warnings are collected and returned.
pub async fn validate_prices(
    prices: &PriceData,
    validators: &[Arc<dyn PriceValidator>],
    failure_tolerance_pct: f64,
    sink: &dyn EventSink,
) -> Result<Vec<ValidationResult>, PipelineError> {
    let mut warnings = Vec::new();

    for validator in validators {
        if validator.disabled() {
            tracing::debug!(validator = validator.name(), "validator disabled");
            continue;
        }
        let findings = validator.validate(prices).await?;
        for finding in findings {
            match finding.severity {
                Severity::Failure => {
                    tracing::error!(
                        validator = validator.name(),
                        asset = ?finding.asset_address,
                        message = %finding.message,
                        "price validation failed"
                    );
                    // A measured deviation keeps its tolerance framing;
                    // anything else is a plain rejection.
                    return Err(match finding.deviation_pct {
                        Some(deviation_pct) => PipelineError::Deviation {
                            asset: finding.asset_address,
                            deviation_pct,
                            tolerance_pct: failure_tolerance_pct,
                        },
                        None => PipelineError::ValidationFailure {
                            asset: finding.asset_address,
                            message: finding.message,
                        },
                    });
                }
                Severity::Warning => {
                    sink.emit(PipelineEvent::ValidationWarning {
                        asset: format!("{:?}", finding.asset_address),
                        deviation_pct: finding.deviation_pct.unwrap_or(0.0),
                    });
                    tracing::warn!(
                        validator = validator.name(),
                        asset = ?finding.asset_address,
                        deviation_pct = finding.deviation_pct,
                        message = %finding.message,
                        "price validation warning"
                    );
                    warnings.push(finding);
                }
            }
        }
    }
    Ok(warnings)
}
