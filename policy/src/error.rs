use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("asset name is {len} bytes, ledger maximum is {max}")]
    AssetNameTooLong { len: usize, max: usize },

    #[error("invalid hash length: expected {expected} bytes, found {actual}")]
    InvalidHashLength { expected: usize, actual: usize },

    #[error("malformed validator parameters: {0}")]
    MalformedParameters(String),

    #[error("malformed program: {0}")]
    MalformedProgram(String),

    #[error("program was not built from a known validator template")]
    UnknownTemplate,
}
