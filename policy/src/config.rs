use codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::types::{AssetName, KeyHash};

/// Deployment parameters baked into the validator: who may mint, and which name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Encode, Decode, Serialize, Deserialize)]
pub struct PolicyConfiguration {
    pub admin_identity: KeyHash,
    pub token_name: AssetName,
}

impl PolicyConfiguration {
    pub fn new(admin_identity: KeyHash, token_name: impl AsRef<[u8]>) -> Result<Self, PolicyError> {
        Ok(Self {
            admin_identity,
            token_name: AssetName::new(token_name)?,
        })
    }

    /// Parameter encoding applied to the validator template.
    pub fn encode_parameters(&self) -> Result<Vec<u8>, PolicyError> {
        self.token_name.check_len()?;
        Ok(self.encode())
    }

    pub fn decode_parameters(bytes: &[u8]) -> Result<Self, PolicyError> {
        let mut input = bytes;
        let config = Self::decode(&mut input)
            .map_err(|err| PolicyError::MalformedParameters(err.to_string()))?;
        if !input.is_empty() {
            return Err(PolicyError::MalformedParameters(format!(
                "{} trailing bytes after parameters",
                input.len()
            )));
        }
        Ok(config)
    }
}
