use std::fmt;

use codec::{Decode, Encode};
use mint_crypto::tagged_blake2b_224;
use serde::{Deserialize, Serialize};

use crate::config::PolicyConfiguration;
use crate::error::PolicyError;
use crate::types::AssetGroupId;

const TEMPLATE_MAGIC: [u8; 8] = *b"MINTPLCY";
const TEMPLATE_VERSION: u16 = 1;
pub const ENTRYPOINT: &str = "single_admin_token.mint";
const SCRIPT_HASH_DOMAIN: &[u8] = b"mint-policy/script-v1";
const TEMPLATE_HASH_DOMAIN: &[u8] = b"mint-policy/template-v1";

/// Steps of the compiled validator, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum Check {
    OwnPolicyMinted,
    SingleAssetName,
    TokenNameEquals,
    AdminSigned,
}

const COMPILED_CHECKS: [Check; 4] = [
    Check::OwnPolicyMinted,
    Check::SingleAssetName,
    Check::TokenNameEquals,
    Check::AdminSigned,
];

#[derive(Encode, Decode)]
struct TemplateHeader {
    magic: [u8; 8],
    version: u16,
    entrypoint: Vec<u8>,
    checks: Vec<Check>,
}

/// Parameterless validator code. Built once at startup and handed to
/// [`instantiate`] for every configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidatorTemplate {
    bytes: Vec<u8>,
    checks: Vec<Check>,
}

impl ValidatorTemplate {
    pub fn compile() -> Self {
        let header = TemplateHeader {
            magic: TEMPLATE_MAGIC,
            version: TEMPLATE_VERSION,
            entrypoint: ENTRYPOINT.as_bytes().to_vec(),
            checks: COMPILED_CHECKS.to_vec(),
        };
        Self {
            bytes: header.encode(),
            checks: header.checks,
        }
    }

    /// Accepts only bytes produced by [`ValidatorTemplate::compile`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PolicyError> {
        let mut input = bytes;
        let header = TemplateHeader::decode(&mut input)
            .map_err(|err| PolicyError::MalformedProgram(err.to_string()))?;
        if !input.is_empty()
            || header.magic != TEMPLATE_MAGIC
            || header.version != TEMPLATE_VERSION
            || header.entrypoint != ENTRYPOINT.as_bytes()
            || header.checks != COMPILED_CHECKS
        {
            return Err(PolicyError::UnknownTemplate);
        }
        Ok(Self {
            bytes: bytes.to_vec(),
            checks: header.checks,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn hash(&self) -> [u8; 28] {
        tagged_blake2b_224(TEMPLATE_HASH_DOMAIN, &self.bytes)
    }
}

impl fmt::Debug for ValidatorTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorTemplate")
            .field("hash", &hex::encode(self.hash()))
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Encode, Decode)]
struct ProgramImage {
    template: Vec<u8>,
    parameters: Vec<u8>,
}

/// A template with its parameters applied: the script the ledger stores and runs.
#[derive(Clone, PartialEq, Eq, Hash, Encode, Decode)]
pub struct Program(Vec<u8>);

impl Program {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn hash(&self) -> AssetGroupId {
        AssetGroupId(tagged_blake2b_224(SCRIPT_HASH_DOMAIN, &self.0))
    }

    /// Splits the program back into its template and bound configuration.
    pub fn decode(&self) -> Result<(ValidatorTemplate, PolicyConfiguration), PolicyError> {
        let mut input = self.0.as_slice();
        let image = ProgramImage::decode(&mut input)
            .map_err(|err| PolicyError::MalformedProgram(err.to_string()))?;
        if !input.is_empty() {
            return Err(PolicyError::MalformedProgram(format!(
                "{} trailing bytes",
                input.len()
            )));
        }
        let template = ValidatorTemplate::from_bytes(&image.template)?;
        let config = PolicyConfiguration::decode_parameters(&image.parameters)?;
        Ok((template, config))
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("hash", &self.hash())
            .field("len", &self.0.len())
            .finish()
    }
}

impl Serialize for Program {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Program {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        let bytes = hex::decode(value.trim()).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// Binds `config` into `template` and derives the policy id from the result.
///
/// Pure: equal inputs give byte-identical programs and ids.
pub fn instantiate(
    template: &ValidatorTemplate,
    config: &PolicyConfiguration,
) -> Result<(AssetGroupId, Program), PolicyError> {
    let parameters = config.encode_parameters()?;
    let image = ProgramImage {
        template: template.as_bytes().to_vec(),
        parameters,
    };
    let program = Program(image.encode());
    Ok((program.hash(), program))
}

/// A deployable policy instance: configuration, program, and the id derived from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintingPolicy {
    config: PolicyConfiguration,
    program: Program,
    policy_id: AssetGroupId,
}

impl MintingPolicy {
    pub fn instantiate(
        template: &ValidatorTemplate,
        config: PolicyConfiguration,
    ) -> Result<Self, PolicyError> {
        let (policy_id, program) = instantiate(template, &config)?;
        Ok(Self {
            config,
            program,
            policy_id,
        })
    }

    /// Wraps an already deployed program, e.g. one read back from a blueprint.
    ///
    /// The program is trusted as given; only its id is recomputed. A program
    /// built for a different configuration makes every mint fail validation.
    pub fn from_deployed(config: PolicyConfiguration, program: Program) -> Self {
        let policy_id = program.hash();
        Self {
            config,
            program,
            policy_id,
        }
    }

    pub fn config(&self) -> &PolicyConfiguration {
        &self.config
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn policy_id(&self) -> AssetGroupId {
        self.policy_id
    }
}
