//! TVL snapshot oracle pipeline for a custodial vault.
//!
//! One run walks four stages under a single deadline: preflight checks
//! with per-check retries, concurrent asset collection across the vault
//! and its subvaults, sequential price collection with validation, and
//! fixed-point valuation producing one [`report::OracleReport`].

pub mod adapters;
pub mod clients;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod types;
pub mod units;
