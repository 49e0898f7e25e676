use thiserror::Error;

/// Error type for invalid operations on dimensions, identifiers and collections.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OcgError {
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Lookup failed: {0}")]
    Lookup(String),
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Variable {0} already exists in the collection")]
    DuplicateName(String),
    #[error("Invalid temporal grouping: {0}")]
    InvalidGroup(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience type for `Result<T, OcgError>`.
pub type OcgResult<T> = Result<T, OcgError>;
