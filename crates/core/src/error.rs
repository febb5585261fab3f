use thiserror::Error;

/// Startup configuration problems. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required credential: {0} is not set")]
    MissingCredential(String),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },

    #[error("unknown LLM provider: '{0}'")]
    UnknownProvider(String),
}

/// A live reading that cannot be scored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("reading is missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' is not a finite number ({value})")]
    NonFinite { field: String, value: f64 },
}
