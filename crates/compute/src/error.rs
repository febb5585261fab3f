use std::path::PathBuf;

use thiserror::Error;

/// Invalid input to the isolation forest itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForestError {
    #[error("cannot fit on an empty dataset")]
    EmptyInput,

    #[error("need at least {min} rows to fit, got {found}")]
    TooFewRows { min: usize, found: usize },

    #[error("row {row} has {found} features, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("malformed forest: {0}")]
    Malformed(String),
}

/// Problems with the healthy-operation corpus. Fatal to generate/train.
#[derive(Error, Debug)]
pub enum TrainingDataError {
    #[error("corpus file not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] arrow::error::ArrowError),

    #[error("corpus is empty")]
    Empty,

    #[error("corpus is missing required column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}', row {row}: {reason}")]
    InvalidValue {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("invalid distribution for {feature}: mean={mean}, std_dev={std_dev}")]
    InvalidDistribution {
        feature: String,
        mean: f64,
        std_dev: f64,
    },

    #[error(transparent)]
    Forest(#[from] ForestError),
}

/// Problems reading or writing the persisted model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model artifact not found: {0} (run `chargewatch train` first)")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode model: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode model: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("unsupported model artifact version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("model was trained on features {found:?}, expected {expected:?}")]
    FeatureMismatch {
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("model artifact is corrupt: {0}")]
    Corrupt(#[source] ForestError),
}

/// Everything that can stop a train run.
#[derive(Error, Debug)]
pub enum TrainError {
    #[error(transparent)]
    Data(#[from] TrainingDataError),

    #[error(transparent)]
    Model(#[from] ModelError),
}
