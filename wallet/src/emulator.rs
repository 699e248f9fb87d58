//! Deterministic in-memory ledger. Serves the provider interface for local
//! runs and tests and enforces the same acceptance rules a node would.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use mint_crypto::blake2b_256;
use mint_crypto::ml_dsa::{MlDsaPublicKey, MlDsaSignature};
use mint_crypto::traits::VerifyKey;
use mint_policy::{AssetGroupId, AssetName, KeyHash, ScriptEngine};
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::balance;
use crate::ledger::{
    script_integrity_hash, ProtocolParams, SignedTransaction, TransactionDraft, TxId, UtxoEntry,
    UtxoRef, Value,
};
use crate::provider::{ChainProvider, ProviderError};

const GENESIS_DOMAIN: &[u8] = b"mint-wallet/genesis";

#[derive(Default)]
struct LedgerState {
    utxos: BTreeMap<UtxoRef, UtxoEntry>,
    applied: BTreeSet<TxId>,
    genesis_count: u64,
}

pub struct MemoryLedger {
    params: ProtocolParams,
    engine: ScriptEngine,
    state: Mutex<LedgerState>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(ProtocolParams::testnet())
    }
}

impl MemoryLedger {
    pub fn new(params: ProtocolParams) -> Self {
        let engine = ScriptEngine::new(params.max_tx_ex_units);
        Self {
            params,
            engine,
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Creates an output out of thin air, as a genesis allocation.
    pub fn fund(&self, address: Address, value: Value) -> Result<UtxoRef, ProviderError> {
        let mut state = self.lock()?;
        let mut preimage = GENESIS_DOMAIN.to_vec();
        preimage.extend_from_slice(&state.genesis_count.to_le_bytes());
        state.genesis_count += 1;
        let reference = UtxoRef::new(TxId(blake2b_256(&preimage)), 0);
        state.utxos.insert(
            reference,
            UtxoEntry {
                reference,
                value,
                address,
            },
        );
        Ok(reference)
    }

    pub fn utxos_at(&self, address: &Address) -> Result<Vec<UtxoEntry>, ProviderError> {
        let state = self.lock()?;
        Ok(state
            .utxos
            .values()
            .filter(|entry| entry.address == *address)
            .cloned()
            .collect())
    }

    /// Total value held at `address`.
    pub fn value_at(&self, address: &Address) -> Result<Value, ProviderError> {
        let entries = self.utxos_at(address)?;
        Value::sum(entries.iter().map(|entry| &entry.value))
            .ok_or_else(|| ProviderError::Decode("value overflow".into()))
    }

    pub fn balance_of(
        &self,
        address: &Address,
        policy: &AssetGroupId,
        name: &AssetName,
    ) -> Result<u64, ProviderError> {
        Ok(self.value_at(address)?.quantity_of(policy, name))
    }

    pub fn is_applied(&self, tx_id: &TxId) -> Result<bool, ProviderError> {
        Ok(self.lock()?.applied.contains(tx_id))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LedgerState>, ProviderError> {
        self.state
            .lock()
            .map_err(|_| ProviderError::Unreachable("ledger state poisoned".into()))
    }

    fn resolve(state: &LedgerState, reference: &UtxoRef) -> Result<UtxoEntry, ProviderError> {
        state.utxos.get(reference).cloned().ok_or_else(|| {
            ProviderError::Rejected(format!("input {reference} is unknown or already spent"))
        })
    }

    fn check(&self, state: &LedgerState, tx: &SignedTransaction) -> Result<(), ProviderError> {
        let body = &tx.body;
        if body.inputs.is_empty() {
            return Err(ProviderError::Rejected("transaction has no inputs".into()));
        }
        let mut seen = BTreeSet::new();
        let mut inputs = Vec::with_capacity(body.inputs.len());
        for reference in &body.inputs {
            if !seen.insert(*reference) {
                return Err(ProviderError::Rejected(format!("input {reference} listed twice")));
            }
            inputs.push(Self::resolve(state, reference)?);
        }

        let size = tx.size();
        if size > self.params.max_tx_size {
            return Err(ProviderError::Rejected(format!(
                "transaction size {size} exceeds limit {}",
                self.params.max_tx_size
            )));
        }

        let mut needed_signers: BTreeSet<KeyHash> =
            inputs.iter().map(|entry| entry.address.payment).collect();
        needed_signers.extend(body.required_signers.iter().copied());

        let scripted = !body.mint.is_empty() || !tx.scripts.is_empty();
        if scripted {
            let reference = body
                .collateral
                .ok_or_else(|| ProviderError::Rejected("script transaction without collateral".into()))?;
            let collateral = Self::resolve(state, &reference)?;
            if !collateral.is_collateral_eligible(&self.params) {
                return Err(ProviderError::Rejected(format!(
                    "collateral {reference} is not a pure-coin output of at least {}",
                    self.params.collateral_min_coin
                )));
            }
            if !self.params.collateral_covers(collateral.value.coin, body.fee) {
                return Err(ProviderError::Rejected(format!(
                    "collateral {reference} does not cover {}% of the fee",
                    self.params.collateral_percent
                )));
            }
            needed_signers.insert(collateral.address.payment);
        }

        let witnessed = verify_witnesses(tx)?;
        if let Some(missing) = needed_signers.iter().find(|signer| !witnessed.contains(signer)) {
            return Err(ProviderError::Rejected(format!("missing witness for {missing}")));
        }

        if scripted {
            if body.script_integrity != Some(script_integrity_hash(&tx.redeemers)) {
                return Err(ProviderError::Rejected("script integrity hash mismatch".into()));
            }
            for (index, policy) in body.mint.keys().enumerate() {
                let program = tx.script_for(policy).ok_or_else(|| {
                    ProviderError::Rejected(format!("no script attached for policy {policy}"))
                })?;
                let redeemer = tx
                    .redeemers
                    .iter()
                    .find(|redeemer| redeemer.index as usize == index)
                    .ok_or_else(|| {
                        ProviderError::Rejected(format!("no redeemer for policy {policy}"))
                    })?;
                self.engine
                    .evaluate(program, policy, body, redeemer.ex_units)
                    .map_err(|reason| ProviderError::Script { reason })?;
            }
        }

        let min_fee = self.params.min_fee(size, tx.total_ex_units());
        if body.fee < min_fee {
            return Err(ProviderError::Rejected(format!(
                "fee {} below minimum {min_fee}",
                body.fee
            )));
        }
        for output in &body.outputs {
            let floor = self.params.min_coin_for(&output.value);
            if output.value.coin < floor {
                return Err(ProviderError::Rejected(format!(
                    "output to {} carries {} coin, minimum is {floor}",
                    output.address, output.value.coin
                )));
            }
        }

        let consumed = Value::sum(inputs.iter().map(|entry| &entry.value))
            .and_then(|total| total.apply_mint(&body.mint))
            .ok_or_else(|| ProviderError::Rejected("burn exceeds the assets in the inputs".into()))?;
        let produced = Value::sum(body.outputs.iter().map(|output| &output.value))
            .and_then(|total| total.checked_add(&Value::coin(body.fee)))
            .ok_or_else(|| ProviderError::Rejected("output value overflow".into()))?;
        if consumed != produced {
            return Err(ProviderError::Rejected("value is not conserved".into()));
        }
        Ok(())
    }
}

fn verify_witnesses(tx: &SignedTransaction) -> Result<BTreeSet<KeyHash>, ProviderError> {
    let tx_id = tx.id();
    let mut signers = BTreeSet::new();
    for witness in &tx.witnesses {
        let vkey = MlDsaPublicKey::from_bytes(&witness.vkey)
            .map_err(|err| ProviderError::Rejected(format!("malformed witness key: {err}")))?;
        let signature = MlDsaSignature::from_bytes(&witness.signature)
            .map_err(|err| ProviderError::Rejected(format!("malformed witness signature: {err}")))?;
        vkey.verify(tx_id.as_bytes(), &signature).map_err(|_| {
            ProviderError::Rejected(format!("invalid witness for {}", KeyHash(vkey.key_hash())))
        })?;
        signers.insert(KeyHash(vkey.key_hash()));
    }
    Ok(signers)
}

impl ChainProvider for MemoryLedger {
    fn find_utxos(&self, address: &Address) -> Result<Vec<UtxoEntry>, ProviderError> {
        self.utxos_at(address)
    }

    fn fetch_protocol_params(&self) -> Result<ProtocolParams, ProviderError> {
        Ok(self.params.clone())
    }

    fn complete_and_balance(
        &self,
        draft: TransactionDraft,
    ) -> Result<TransactionDraft, ProviderError> {
        let inputs = {
            let state = self.lock()?;
            draft
                .body
                .inputs
                .iter()
                .map(|reference| Self::resolve(&state, reference))
                .collect::<Result<Vec<_>, _>>()?
        };
        balance::complete_and_balance(draft, &inputs, &self.params, &self.engine)
    }

    fn submit(&self, tx: &SignedTransaction) -> Result<TxId, ProviderError> {
        let tx_id = tx.id();
        let mut state = self.lock()?;
        if state.applied.contains(&tx_id) {
            debug!(%tx_id, "duplicate submission ignored");
            return Ok(tx_id);
        }
        if let Err(err) = self.check(&state, tx) {
            warn!(%tx_id, %err, "transaction rejected");
            return Err(err);
        }

        for reference in &tx.body.inputs {
            state.utxos.remove(reference);
        }
        for (index, output) in tx.body.outputs.iter().enumerate() {
            let reference = UtxoRef::new(tx_id, index as u32);
            state.utxos.insert(
                reference,
                UtxoEntry {
                    reference,
                    value: output.value.clone(),
                    address: output.address,
                },
            );
        }
        state.applied.insert(tx_id);
        info!(%tx_id, fee = tx.body.fee, outputs = tx.body.outputs.len(), "transaction applied");
        Ok(tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;
    use crate::keys::{RootSecret, TxSigner};
    use crate::ledger::TxOutput;

    fn signed_transfer(ledger: &MemoryLedger, root: &RootSecret, coin: u64) -> SignedTransaction {
        let keys = root.derive();
        let address = keys.address(Network::Testnet);
        let mut draft = TransactionDraft::new(address);
        draft.body.inputs = ledger
            .utxos_at(&address)
            .unwrap()
            .iter()
            .map(|entry| entry.reference)
            .collect();
        draft.body.outputs.push(TxOutput {
            address: Address::new(Network::Testnet, KeyHash([9u8; 28])),
            value: Value::coin(coin),
        });
        let draft = ledger.complete_and_balance(draft).unwrap();
        let witness = keys.sign(&draft.body.id()).unwrap();
        SignedTransaction {
            body: draft.body,
            scripts: draft.scripts,
            redeemers: draft.redeemers,
            witnesses: vec![witness],
        }
    }

    #[test]
    fn transfer_is_applied_once() {
        let ledger = MemoryLedger::default();
        let root = RootSecret::from_bytes([2u8; 32]);
        let address = root.derive().address(Network::Testnet);
        ledger.fund(address, Value::coin(10_000_000)).unwrap();

        let tx = signed_transfer(&ledger, &root, 2_000_000);
        let id = ledger.submit(&tx).unwrap();
        assert_eq!(ledger.submit(&tx).unwrap(), id);
        assert!(ledger.is_applied(&id).unwrap());

        let recipient = Address::new(Network::Testnet, KeyHash([9u8; 28]));
        assert_eq!(ledger.value_at(&recipient).unwrap(), Value::coin(2_000_000));
        assert_eq!(
            ledger.value_at(&address).unwrap().coin,
            10_000_000 - 2_000_000 - tx.body.fee
        );
    }

    #[test]
    fn spent_inputs_cannot_be_reused() {
        let ledger = MemoryLedger::default();
        let root = RootSecret::from_bytes([2u8; 32]);
        let address = root.derive().address(Network::Testnet);
        ledger.fund(address, Value::coin(10_000_000)).unwrap();

        let first = signed_transfer(&ledger, &root, 2_000_000);
        let second = signed_transfer(&ledger, &root, 3_000_000);
        ledger.submit(&first).unwrap();
        assert!(matches!(ledger.submit(&second), Err(ProviderError::Rejected(_))));
    }

    #[test]
    fn unsigned_spend_is_rejected() {
        let ledger = MemoryLedger::default();
        let root = RootSecret::from_bytes([2u8; 32]);
        let address = root.derive().address(Network::Testnet);
        ledger.fund(address, Value::coin(10_000_000)).unwrap();

        let mut tx = signed_transfer(&ledger, &root, 2_000_000);
        tx.witnesses.clear();
        assert!(matches!(ledger.submit(&tx), Err(ProviderError::Rejected(_))));

        let mut forged = signed_transfer(&ledger, &root, 2_000_000);
        forged.body.fee += 1;
        assert!(matches!(ledger.submit(&forged), Err(ProviderError::Rejected(_))));
    }
}
