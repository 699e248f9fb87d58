//! Static, tool-readable description of the deployed validator.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::template::{MintingPolicy, Program, ENTRYPOINT};
use crate::types::{AssetGroupId, MAX_ASSET_NAME_LEN};

const BLUEPRINT_TITLE: &str = "mint-policy/single-admin-token";
const BLUEPRINT_LANGUAGE: &str = "mint-script-v1";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    pub preamble: Preamble,
    pub validators: Vec<ValidatorEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preamble {
    pub title: String,
    pub version: String,
    pub language: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorEntry {
    pub title: String,
    pub parameters: Vec<Parameter>,
    pub redeemer: Value,
    /// Unapplied template bytes, hex.
    pub template_code: String,
    pub template_hash: String,
    /// Program with parameters applied; this is what the ledger hashes.
    pub compiled_code: Program,
    pub hash: AssetGroupId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub title: String,
    pub schema: Value,
}

impl Blueprint {
    pub fn from_policy(policy: &MintingPolicy) -> Result<Self, crate::PolicyError> {
        let (template, _) = policy.program().decode()?;
        let validator = ValidatorEntry {
            title: ENTRYPOINT.to_string(),
            parameters: vec![
                Parameter {
                    title: "admin_identity".into(),
                    schema: json!({ "dataType": "bytes", "minLength": 28, "maxLength": 28 }),
                },
                Parameter {
                    title: "token_name".into(),
                    schema: json!({ "dataType": "bytes", "maxLength": MAX_ASSET_NAME_LEN }),
                },
            ],
            redeemer: json!({ "title": "Unit", "schema": { "dataType": "constructor", "index": 0, "fields": [] } }),
            template_code: hex::encode(template.as_bytes()),
            template_hash: hex::encode(template.hash()),
            compiled_code: policy.program().clone(),
            hash: policy.policy_id(),
        };
        Ok(Self {
            preamble: Preamble {
                title: BLUEPRINT_TITLE.into(),
                version: env!("CARGO_PKG_VERSION").into(),
                language: BLUEPRINT_LANGUAGE.into(),
            },
            validators: vec![validator],
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// The applied program of the first validator, as deployed.
    pub fn program(&self) -> Option<&Program> {
        self.validators.first().map(|entry| &entry.compiled_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfiguration;
    use crate::template::ValidatorTemplate;
    use crate::types::KeyHash;

    #[test]
    fn blueprint_carries_program_and_hash() {
        let config = PolicyConfiguration::new(KeyHash([3u8; 28]), "CO2 Tonne").unwrap();
        let policy = MintingPolicy::instantiate(&ValidatorTemplate::compile(), config).unwrap();
        let blueprint = Blueprint::from_policy(&policy).unwrap();
        let json = blueprint.to_json_pretty().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value["validators"][0]["hash"],
            Value::String(policy.policy_id().to_hex())
        );
        assert_eq!(value["validators"][0]["parameters"][1]["schema"]["maxLength"], 32);

        let parsed: Blueprint = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, blueprint);
        assert_eq!(parsed.program().map(Program::hash), Some(policy.policy_id()));
    }
}
