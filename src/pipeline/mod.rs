//! Pipeline engine
//!
//! Five stages run strictly forward under one deadline: preflight checks,
//! concurrent asset collection, sequential price collection, price
//! validation, and valuation. The orchestrator in [`run`] owns the
//! context; every stage receives only the narrow inputs it needs.

pub mod assets;
pub mod context;
pub mod preflight;
pub mod pricing;
pub mod run;
pub mod valuation;

pub use context::PipelineContext;
pub use run::{Pipeline, PipelineOutcome};
