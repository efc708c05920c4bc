use thiserror::Error;

#[derive(Error, Debug)]
pub enum SomError {
    #[error("Invalid configuration: {0}")]
    BadConfig(String),
    #[error("Dimension mismatch for {field}: expected {expected}, found {found}")]
    DimensionMismatch {
        field: &'static str,
        expected: i64,
        found: i64,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported variant: {0}")]
    UnsupportedVariant(String),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

pub type SomResult<T> = Result<T, SomError>;
