//! Transaction and value model of the UTXO ledger the wallet talks to.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use codec::{Decode, Encode};
use mint_crypto::blake2b_256;
use mint_policy::{
    AssetDelta, AssetGroupId, AssetName, ExUnits, KeyHash, MintMap, Program, TransactionView,
};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::WalletError;

/// Upper bound used for one ML-DSA-65 witness when sizing a transaction before signing.
pub const WITNESS_SIZE_ESTIMATE: u64 = (mint_crypto::ml_dsa::ML_DSA_PUBLIC_KEY_LEN
    + mint_crypto::ml_dsa::ML_DSA_SIGNATURE_LEN
    + 8) as u64;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct TxId(pub [u8; 32]);

impl TxId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(value: &str) -> Result<Self, WalletError> {
        let bytes = hex::decode(value.trim())?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| WalletError::Serialization("expected 32-byte hash".into()))?;
        Ok(Self(array))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", self.to_hex())
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for TxId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        TxId::from_hex(&value).map_err(serde::de::Error::custom)
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize, Deserialize,
)]
pub struct UtxoRef {
    pub tx_id: TxId,
    pub index: u32,
}

impl UtxoRef {
    pub fn new(tx_id: TxId, index: u32) -> Self {
        Self { tx_id, index }
    }

    /// Parses the `<tx_id>#<index>` form.
    pub fn parse(value: &str) -> Result<Self, WalletError> {
        let (tx, index) = value
            .split_once('#')
            .ok_or(WalletError::InvalidArgument("expected <tx_id>#<index>"))?;
        let index = index
            .parse()
            .map_err(|_| WalletError::InvalidArgument("output index must be a u32"))?;
        Ok(Self::new(TxId::from_hex(tx)?, index))
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_id, self.index)
    }
}

/// Base coin plus native assets grouped by policy id. Zero quantities are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Value {
    pub coin: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assets: BTreeMap<AssetGroupId, BTreeMap<AssetName, u64>>,
}

impl Value {
    pub fn coin(coin: u64) -> Self {
        Self {
            coin,
            assets: BTreeMap::new(),
        }
    }

    pub fn with_asset(mut self, policy: AssetGroupId, name: AssetName, quantity: u64) -> Self {
        if quantity > 0 {
            self.assets.entry(policy).or_default().insert(name, quantity);
        }
        self
    }

    pub fn is_pure_coin(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.values().map(BTreeMap::len).sum()
    }

    pub fn quantity_of(&self, policy: &AssetGroupId, name: &AssetName) -> u64 {
        self.assets
            .get(policy)
            .and_then(|names| names.get(name))
            .copied()
            .unwrap_or(0)
    }

    pub fn checked_add(&self, other: &Value) -> Option<Value> {
        let mut out = self.clone();
        out.coin = out.coin.checked_add(other.coin)?;
        for (policy, names) in &other.assets {
            for (name, quantity) in names {
                let slot = out
                    .assets
                    .entry(*policy)
                    .or_default()
                    .entry(name.clone())
                    .or_insert(0);
                *slot = slot.checked_add(*quantity)?;
            }
        }
        out.prune();
        Some(out)
    }

    /// `None` when any component of `other` exceeds this value.
    pub fn checked_sub(&self, other: &Value) -> Option<Value> {
        let mut out = self.clone();
        out.coin = out.coin.checked_sub(other.coin)?;
        for (policy, names) in &other.assets {
            for (name, quantity) in names {
                if *quantity == 0 {
                    continue;
                }
                let slot = out.assets.get_mut(policy)?.get_mut(name)?;
                *slot = slot.checked_sub(*quantity)?;
            }
        }
        out.prune();
        Some(out)
    }

    /// Adds minted quantities and removes burned ones. `None` if a burn exceeds holdings.
    pub fn apply_mint(&self, mint: &MintMap) -> Option<Value> {
        let mut out = self.clone();
        for (policy, names) in mint {
            for (name, delta) in names {
                let slot = out
                    .assets
                    .entry(*policy)
                    .or_default()
                    .entry(name.clone())
                    .or_insert(0);
                *slot = if *delta >= 0 {
                    slot.checked_add(delta.unsigned_abs())?
                } else {
                    slot.checked_sub(delta.unsigned_abs())?
                };
            }
        }
        out.prune();
        Some(out)
    }

    pub fn sum<'a>(values: impl IntoIterator<Item = &'a Value>) -> Option<Value> {
        values
            .into_iter()
            .try_fold(Value::default(), |acc, value| acc.checked_add(value))
    }

    fn prune(&mut self) {
        for names in self.assets.values_mut() {
            names.retain(|_, quantity| *quantity > 0);
        }
        self.assets.retain(|_, names| !names.is_empty());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: Address,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub reference: UtxoRef,
    pub value: Value,
    pub address: Address,
}

impl UtxoEntry {
    /// Collateral must be plain coin and at least the ledger's collateral floor.
    pub fn is_collateral_eligible(&self, params: &ProtocolParams) -> bool {
        self.value.is_pure_coin() && self.value.coin >= params.collateral_min_coin
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedeemerTag {
    Mint,
}

/// Redeemer payloads. The minting validator ignores the content.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedeemerData {
    Unit,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Redeemer {
    pub tag: RedeemerTag,
    /// Position of the policy in the transaction's (sorted) mint map.
    pub index: u32,
    pub data: RedeemerData,
    pub ex_units: ExUnits,
}

impl Redeemer {
    pub fn unit_mint(index: u32) -> Self {
        Self {
            tag: RedeemerTag::Mint,
            index,
            data: RedeemerData::Unit,
            ex_units: ExUnits::default(),
        }
    }
}

/// Commitment to redeemer budgets carried in the signed body.
pub fn script_integrity_hash(redeemers: &[Redeemer]) -> [u8; 32] {
    blake2b_256(&redeemers.encode())
}

/// The signed part of a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct TransactionBody {
    pub inputs: Vec<UtxoRef>,
    pub collateral: Option<UtxoRef>,
    pub outputs: Vec<TxOutput>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mint: MintMap,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub required_signers: BTreeSet<KeyHash>,
    pub fee: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_integrity: Option<[u8; 32]>,
}

impl TransactionBody {
    pub fn id(&self) -> TxId {
        TxId(blake2b_256(&self.encode()))
    }

    /// Mint map position of `policy`, which is what redeemer indexes refer to.
    pub fn mint_index(&self, policy: &AssetGroupId) -> Option<u32> {
        self.mint
            .keys()
            .position(|candidate| candidate == policy)
            .map(|index| index as u32)
    }
}

impl TransactionView for TransactionBody {
    fn minted_under(&self, policy: &AssetGroupId) -> Option<&AssetDelta> {
        self.mint.get(policy)
    }

    fn is_signed_by(&self, signer: &KeyHash) -> bool {
        self.required_signers.contains(signer)
    }
}

/// A transaction under construction. Only the pipeline mutates it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub body: TransactionBody,
    pub scripts: Vec<Program>,
    pub redeemers: Vec<Redeemer>,
    pub change_address: Address,
}

impl TransactionDraft {
    pub fn new(change_address: Address) -> Self {
        Self {
            body: TransactionBody::default(),
            scripts: Vec::new(),
            redeemers: Vec::new(),
            change_address,
        }
    }

    pub fn script_for(&self, policy: &AssetGroupId) -> Option<&Program> {
        self.scripts.iter().find(|program| program.hash() == *policy)
    }

    pub fn total_ex_units(&self) -> ExUnits {
        self.redeemers
            .iter()
            .fold(ExUnits::default(), |acc, redeemer| acc.saturating_add(redeemer.ex_units))
    }

    /// Encoded size once `witnesses` signatures are attached.
    pub fn estimated_size(&self, witnesses: usize) -> u64 {
        let unsigned = (&self.body, &self.scripts, &self.redeemers).encoded_size() as u64;
        // Compact length prefix of the witness vector.
        unsigned + 4 + WITNESS_SIZE_ESTIMATE * witnesses as u64
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct VKeyWitness {
    #[serde(with = "hex_bytes")]
    pub vkey: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

/// Finalized transaction ready for submission.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub body: TransactionBody,
    pub scripts: Vec<Program>,
    pub redeemers: Vec<Redeemer>,
    pub witnesses: Vec<VKeyWitness>,
}

impl SignedTransaction {
    pub fn id(&self) -> TxId {
        self.body.id()
    }

    pub fn size(&self) -> u64 {
        self.encoded_size() as u64
    }

    pub fn total_ex_units(&self) -> ExUnits {
        self.redeemers
            .iter()
            .fold(ExUnits::default(), |acc, redeemer| acc.saturating_add(redeemer.ex_units))
    }

    pub fn script_for(&self, policy: &AssetGroupId) -> Option<&Program> {
        self.scripts.iter().find(|program| program.hash() == *policy)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: u64,
    pub denominator: u64,
}

impl Ratio {
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// `ceil(value * self)`, saturating.
    pub fn mul_ceil(&self, value: u64) -> u64 {
        if self.denominator == 0 {
            return u64::MAX;
        }
        let product = value as u128 * self.numerator as u128;
        let result = product.div_ceil(self.denominator as u128);
        u64::try_from(result).unwrap_or(u64::MAX)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Fee per encoded byte.
    pub min_fee_a: u64,
    /// Constant fee term.
    pub min_fee_b: u64,
    pub price_mem: Ratio,
    pub price_steps: Ratio,
    pub max_tx_ex_units: ExUnits,
    pub max_tx_size: u64,
    pub min_utxo_coin: u64,
    pub coin_per_asset: u64,
    pub collateral_min_coin: u64,
    /// Collateral must cover this percentage of the fee.
    pub collateral_percent: u64,
}

impl ProtocolParams {
    /// Parameters resembling a public test network.
    pub fn testnet() -> Self {
        Self {
            min_fee_a: 44,
            min_fee_b: 155_381,
            price_mem: Ratio::new(577, 10_000),
            price_steps: Ratio::new(721, 10_000_000),
            max_tx_ex_units: ExUnits::new(14_000_000, 10_000_000_000),
            max_tx_size: 16_384,
            min_utxo_coin: 1_000_000,
            coin_per_asset: 150_000,
            collateral_min_coin: 5_000_000,
            collateral_percent: 150,
        }
    }

    /// Smallest coin an output holding `value`'s assets may carry.
    pub fn min_coin_for(&self, value: &Value) -> u64 {
        self.min_utxo_coin
            .saturating_add(self.coin_per_asset.saturating_mul(value.asset_count() as u64))
    }

    pub fn script_fee(&self, ex_units: ExUnits) -> u64 {
        self.price_mem
            .mul_ceil(ex_units.mem)
            .saturating_add(self.price_steps.mul_ceil(ex_units.steps))
    }

    pub fn min_fee(&self, size: u64, ex_units: ExUnits) -> u64 {
        self.min_fee_a
            .saturating_mul(size)
            .saturating_add(self.min_fee_b)
            .saturating_add(self.script_fee(ex_units))
    }

    pub fn collateral_covers(&self, collateral_coin: u64, fee: u64) -> bool {
        collateral_coin as u128 * 100 >= fee as u128 * self.collateral_percent as u128
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        hex::decode(value).map_err(serde::de::Error::custom)
    }
}
