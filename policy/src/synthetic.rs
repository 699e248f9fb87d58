//! Hand-assembled transaction views, for exercising the validator without a ledger.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{AssetGroupId, AssetName, KeyHash, MintMap};
use crate::validator::TransactionView;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyntheticTx {
    pub mint: MintMap,
    pub signers: BTreeSet<KeyHash>,
}

impl SyntheticTx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` of `name` under `policy`. Names are taken as-is, without
    /// the ledger length check, so malformed views can be built too.
    pub fn mint(mut self, policy: AssetGroupId, name: impl AsRef<[u8]>, quantity: i64) -> Self {
        self.mint
            .entry(policy)
            .or_default()
            .insert(AssetName::from_raw(name.as_ref().to_vec()), quantity);
        self
    }

    /// Registers `policy` in the mint map with no asset entries.
    pub fn empty_entry(mut self, policy: AssetGroupId) -> Self {
        self.mint.entry(policy).or_default();
        self
    }

    pub fn signed_by(mut self, signer: KeyHash) -> Self {
        self.signers.insert(signer);
        self
    }
}

impl TransactionView for SyntheticTx {
    fn minted_under(&self, policy: &AssetGroupId) -> Option<&BTreeMap<AssetName, i64>> {
        self.mint.get(policy)
    }

    fn is_signed_by(&self, signer: &KeyHash) -> bool {
        self.signers.contains(signer)
    }
}
