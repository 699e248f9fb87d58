use thiserror::Error;

use mint_crypto::CryptoError;
use mint_policy::PolicyError;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid address encoding: {0}")]
    AddressEncoding(String),

    #[error("cryptography error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<hex::FromHexError> for WalletError {
    fn from(err: hex::FromHexError) -> Self {
        Self::Serialization(err.to_string())
    }
}
