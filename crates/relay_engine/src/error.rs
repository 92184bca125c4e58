use std::io;
use std::path::PathBuf;

use relay_core::{BatchError, Lane};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("batch has no work items")]
    EmptyBatch,
    #[error("failed to launch {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{lane} lane already has a running batch")]
    AlreadyRunning { lane: Lane },
    #[error("{}", batch_failed_text(*code))]
    BatchFailed { code: Option<i32> },
    #[error("failed to write batch script: {0}")]
    Script(#[source] io::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

fn batch_failed_text(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("batch failed with exit code {code}"),
        None => "batch terminated before completion".to_string(),
    }
}

impl From<BatchError> for RelayError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::InvalidParameter(reason) => RelayError::InvalidParameter(reason),
            BatchError::EmptyBatch => RelayError::EmptyBatch,
        }
    }
}
