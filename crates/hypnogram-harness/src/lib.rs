//! Tooling around hypnogram-core.
//!
//! This crate provides:
//! - Fixture verify: run scenario fixtures through the engine and diff the results
//! - Batch: analyze a directory of subjects in parallel
//! - Determinism: fingerprint repeated runs with blake3
//! - Structured JSONL logging with an artifact index
//! - Report generation: human-readable + machine-readable verification reports

#![forbid(unsafe_code)]

pub mod batch;
pub mod determinism;
pub mod error;
pub mod fixtures;
pub mod input;
pub mod report;
pub mod runner;
pub mod structured_log;
pub mod verify;

pub use error::{HarnessError, HarnessResult};
pub use fixtures::{FixtureCase, FixtureSet};
pub use report::VerificationReport;
pub use runner::TestRunner;
pub use verify::VerificationResult;
