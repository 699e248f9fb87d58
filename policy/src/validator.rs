use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PolicyConfiguration;
use crate::types::{AssetGroupId, AssetName, KeyHash};

/// The slice of a transaction the validator is allowed to read.
pub trait TransactionView {
    /// Mint/burn entries under `policy`, or `None` when the transaction does not touch it.
    fn minted_under(&self, policy: &AssetGroupId) -> Option<&BTreeMap<AssetName, i64>>;

    /// Whether `signer` is among the identities the transaction asserts it is signed by.
    fn is_signed_by(&self, signer: &KeyHash) -> bool;
}

/// Expected, deterministic refusals of the policy.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    #[error("more than one asset name minted under the policy")]
    MultipleTokensFound,
    #[error("minted asset name does not match the configured token")]
    TokenNameMismatch,
    #[error("transaction is not signed by the policy administrator")]
    MissingAdminSignature,
}

/// Branches the ledger contract rules out. Hitting one means the host engine
/// or the validator itself is broken.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineFault {
    #[error("validator invoked for a policy the transaction does not mint")]
    OwnPolicyNotMinted,
    #[error("mint entry for own policy is empty")]
    EmptyMintEntry,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("rejected: {0}")]
    Rejected(#[from] RejectReason),
    #[error("invariant violated: {0}")]
    Fault(#[from] EngineFault),
}

impl ValidationError {
    pub fn is_fault(&self) -> bool {
        matches!(self, ValidationError::Fault(_))
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            ValidationError::Rejected(reason) => Some(*reason),
            ValidationError::Fault(_) => None,
        }
    }
}

/// Authorization rule for minting or burning under `own_policy`.
///
/// Quantity sign and magnitude are not inspected: a burn is accepted exactly
/// like a mint when the name and signer checks pass.
pub fn validate<V: TransactionView + ?Sized>(
    config: &PolicyConfiguration,
    own_policy: &AssetGroupId,
    tx: &V,
) -> Result<(), ValidationError> {
    let entries = tx
        .minted_under(own_policy)
        .ok_or(EngineFault::OwnPolicyNotMinted)?;

    let mut names = entries.keys();
    let name = match (names.next(), names.next()) {
        (None, _) => return Err(EngineFault::EmptyMintEntry.into()),
        (Some(_), Some(_)) => return Err(RejectReason::MultipleTokensFound.into()),
        (Some(name), None) => name,
    };

    if name.as_bytes() != config.token_name.as_bytes() {
        return Err(RejectReason::TokenNameMismatch.into());
    }

    if !tx.is_signed_by(&config.admin_identity) {
        return Err(RejectReason::MissingAdminSignature.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticTx;

    const ADMIN: KeyHash = KeyHash([0x48; 28]);
    const OWN: AssetGroupId = AssetGroupId([0x01; 28]);
    const OTHER: AssetGroupId = AssetGroupId([0x02; 28]);

    fn config() -> PolicyConfiguration {
        PolicyConfiguration::new(ADMIN, "CO2 Tonne").unwrap()
    }

    #[test]
    fn scenario_a_accepts_admin_signed_mint() {
        let tx = SyntheticTx::new()
            .mint(OWN, "CO2 Tonne", 1000)
            .signed_by(ADMIN);
        assert_eq!(validate(&config(), &OWN, &tx), Ok(()));
    }

    #[test]
    fn burn_is_accepted_like_mint() {
        let tx = SyntheticTx::new()
            .mint(OWN, "CO2 Tonne", -1000)
            .signed_by(ADMIN);
        assert_eq!(validate(&config(), &OWN, &tx), Ok(()));
    }

    #[test]
    fn scenario_b_rejects_other_name() {
        let tx = SyntheticTx::new()
            .mint(OWN, "CO2 Tonneextra", 1000)
            .signed_by(ADMIN);
        assert_eq!(
            validate(&config(), &OWN, &tx),
            Err(RejectReason::TokenNameMismatch.into())
        );
    }

    #[test]
    fn scenario_c_rejects_second_name() {
        let tx = SyntheticTx::new()
            .mint(OWN, "CO2 Tonne", 1000)
            .mint(OWN, "Extra", 1)
            .signed_by(ADMIN);
        assert_eq!(
            validate(&config(), &OWN, &tx),
            Err(RejectReason::MultipleTokensFound.into())
        );
    }

    #[test]
    fn scenario_d_rejects_unsigned() {
        let tx = SyntheticTx::new().mint(OWN, "CO2 Tonne", 1000);
        assert_eq!(
            validate(&config(), &OWN, &tx),
            Err(RejectReason::MissingAdminSignature.into())
        );
    }

    #[test]
    fn name_is_checked_before_signature() {
        let tx = SyntheticTx::new().mint(OWN, "co2 tonne", 1);
        assert_eq!(
            validate(&config(), &OWN, &tx),
            Err(RejectReason::TokenNameMismatch.into())
        );
    }

    #[test]
    fn other_policies_in_the_same_transaction_are_ignored() {
        let tx = SyntheticTx::new()
            .mint(OWN, "CO2 Tonne", 5)
            .mint(OTHER, "Something", 3)
            .mint(OTHER, "Else", 3)
            .signed_by(ADMIN);
        assert_eq!(validate(&config(), &OWN, &tx), Ok(()));
    }

    #[test]
    fn missing_own_policy_is_a_fault() {
        let tx = SyntheticTx::new()
            .mint(OTHER, "CO2 Tonne", 5)
            .signed_by(ADMIN);
        let err = validate(&config(), &OWN, &tx).unwrap_err();
        assert!(err.is_fault());
        assert_eq!(err, ValidationError::Fault(EngineFault::OwnPolicyNotMinted));
        assert_eq!(err.reject_reason(), None);
    }

    #[test]
    fn empty_own_entry_is_a_fault() {
        let tx = SyntheticTx::new().empty_entry(OWN).signed_by(ADMIN);
        assert_eq!(
            validate(&config(), &OWN, &tx),
            Err(ValidationError::Fault(EngineFault::EmptyMintEntry))
        );
    }
}
