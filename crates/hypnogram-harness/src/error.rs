//! Harness error type.

use std::path::PathBuf;

use hypnogram_core::HypnoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Analysis(#[from] HypnoError),
    #[error("{path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: HypnoError,
    },
    #[error("no subject files found in {0}")]
    NoSubjects(PathBuf),
    #[error("no fixture JSON files found in {0}")]
    NoFixtures(PathBuf),
    #[error("invalid fixture '{case}': {message}")]
    Fixture { case: String, message: String },
}

pub type HarnessResult<T> = Result<T, HarnessError>;
