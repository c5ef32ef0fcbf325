//! Price validators
//!
//! Run after the full price set is assembled. Each validator produces
//! findings classified against the configured tolerances; failures abort
//! the pipeline, warnings travel with the report.

mod positive_prices;
mod reference_feed;

pub use positive_prices::PositivePricesValidator;
pub use reference_feed::ReferenceFeedValidator;

use ethers::types::Address;

use crate::types::{Severity, ValidationResult};

/// Deviation tolerances, percentage points. Startup validation guarantees
/// `failure_pct > warning_pct`.
#[derive(Debug, Clone, Copy)]
pub struct Tolerances {
    pub warning_pct: f64,
    pub failure_pct: f64,
}

/// Classify a deviation against the tolerances. Thresholds are inclusive:
/// a deviation exactly at a tolerance takes that tolerance's severity.
/// Below the warning tolerance there is no finding at all.
pub fn classify_deviation(
    asset: Address,
    deviation_pct: f64,
    tolerances: Tolerances,
    reference_name: &str,
) -> Option<ValidationResult> {
    let severity = if deviation_pct >= tolerances.failure_pct {
        Severity::Failure
    } else if deviation_pct >= tolerances.warning_pct {
        Severity::Warning
    } else {
        return None;
    };
    Some(ValidationResult {
        asset_address: asset,
        severity,
        message: format!(
            "price deviates {deviation_pct:.4}% from {reference_name} reference"
        ),
        deviation_pct: Some(deviation_pct),
    })
}
