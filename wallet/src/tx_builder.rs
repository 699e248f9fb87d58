use std::collections::BTreeSet;

use mint_policy::{KeyHash, MintingPolicy, PolicyError, RejectReason};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::address::Address;
use crate::keys::{SigningError, TxSigner};
use crate::ledger::{
    ProtocolParams, Redeemer, SignedTransaction, TransactionDraft, TxOutput, UtxoEntry, UtxoRef,
    Value,
};
use crate::provider::{ChainProvider, ProviderError};

/// Balancing passes per build: one to learn the fee, one to re-pick collateral.
const COLLATERAL_ATTEMPTS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintRequest {
    pub quantity: i64,
}

impl MintRequest {
    pub fn new(quantity: i64) -> Self {
        Self { quantity }
    }
}

/// What the pipeline needs to know about the wallet it builds for.
pub struct WalletState<'a> {
    pub address: Address,
    pub signer: &'a dyn TxSigner,
    pub policy: &'a MintingPolicy,
    /// Use this output as collateral instead of picking one.
    pub collateral: Option<UtxoRef>,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no spendable outputs at the wallet address")]
    NoSpendableInputs,
    #[error("invalid collateral: {0}")]
    InvalidCollateral(String),
    #[error("minting script rejected the transaction: {0}")]
    ScriptRejected(RejectReason),
    #[error("signing failed: {0}")]
    SigningFailed(#[from] SigningError),
    #[error("invalid quantity: {0}")]
    InvalidQuantity(&'static str),
    #[error("balancing failed: {0}")]
    Balancing(String),
    #[error(transparent)]
    Provider(ProviderError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl From<ProviderError> for BuildError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Script { reason } => match reason.reject_reason() {
                Some(reject) => BuildError::ScriptRejected(reject),
                None => BuildError::Provider(ProviderError::Script { reason }),
            },
            ProviderError::Balancing(message) => BuildError::Balancing(message),
            other => BuildError::Provider(other),
        }
    }
}

/// Builds and signs a transaction minting `request.quantity` units to the wallet.
pub fn build_mint_tx(
    request: &MintRequest,
    wallet: &WalletState<'_>,
    provider: &dyn ChainProvider,
) -> Result<SignedTransaction, BuildError> {
    if request.quantity <= 0 {
        return Err(BuildError::InvalidQuantity("mint quantity must be positive"));
    }
    build(request.quantity, wallet, provider)
}

/// Builds and signs a transaction burning `|request.quantity|` units held by the wallet.
pub fn build_burn_tx(
    request: &MintRequest,
    wallet: &WalletState<'_>,
    provider: &dyn ChainProvider,
) -> Result<SignedTransaction, BuildError> {
    let delta = burn_delta(request.quantity)?;
    build(delta, wallet, provider)
}

fn burn_delta(quantity: i64) -> Result<i64, BuildError> {
    match quantity {
        0 => Err(BuildError::InvalidQuantity("burn quantity must be non-zero")),
        i64::MIN => Err(BuildError::InvalidQuantity("burn quantity out of range")),
        q => Ok(-q.abs()),
    }
}

fn build(
    delta: i64,
    wallet: &WalletState<'_>,
    provider: &dyn ChainProvider,
) -> Result<SignedTransaction, BuildError> {
    let policy = wallet.policy;
    let span = info_span!("build_tx", policy = %policy.policy_id(), delta);
    let _enter = span.enter();

    let utxos = provider.find_utxos(&wallet.address)?;
    if utxos.is_empty() {
        return Err(BuildError::NoSpendableInputs);
    }
    if let Some(foreign) = utxos.iter().find(|entry| entry.address != wallet.address) {
        return Err(BuildError::Provider(ProviderError::Decode(format!(
            "provider listed {} owned by {} as a wallet output",
            foreign.reference, foreign.address
        ))));
    }
    let params = provider.fetch_protocol_params()?;

    let mut fee_floor = 0;
    for _ in 0..COLLATERAL_ATTEMPTS {
        let collateral = select_collateral(&utxos, wallet.collateral, &params, fee_floor)?;
        debug!(inputs = utxos.len(), collateral = %collateral.reference, fee_floor, "inputs selected");

        let draft = draft_for(delta, wallet, &utxos, collateral.reference, &params)?;
        let balanced = provider.complete_and_balance(draft.clone()).map_err(|err| {
            warn!(%err, "balancing failed");
            BuildError::from(err)
        })?;
        check_completion(&draft, &balanced, &params)?;

        if params.collateral_covers(collateral.value.coin, balanced.body.fee) {
            let tx = sign(balanced, wallet)?;
            info!(tx_id = %tx.id(), fee = tx.body.fee, inputs = tx.body.inputs.len(), "transaction built");
            return Ok(tx);
        }
        debug!(fee = balanced.body.fee, collateral = collateral.value.coin, "collateral too small for fee");
        fee_floor = balanced.body.fee;
    }
    Err(BuildError::InvalidCollateral(format!(
        "no pure-coin output covers {}% of the fee {fee_floor}",
        params.collateral_percent
    )))
}

fn draft_for(
    delta: i64,
    wallet: &WalletState<'_>,
    utxos: &[UtxoEntry],
    collateral: UtxoRef,
    params: &ProtocolParams,
) -> Result<TransactionDraft, BuildError> {
    let policy = wallet.policy;
    let token = policy.config().token_name.clone();
    let mut draft = TransactionDraft::new(wallet.address);
    draft.body.inputs = utxos.iter().map(|entry| entry.reference).collect();
    draft.body.collateral = Some(collateral);
    draft
        .body
        .mint
        .entry(policy.policy_id())
        .or_default()
        .insert(token.clone(), delta);
    draft
        .body
        .required_signers
        .insert(policy.config().admin_identity);
    draft.scripts.push(policy.program().clone());
    let index = draft
        .body
        .mint_index(&policy.policy_id())
        .ok_or_else(|| BuildError::Balancing("policy missing from mint map".into()))?;
    draft.redeemers.push(Redeemer::unit_mint(index));

    if delta > 0 {
        let minted = Value::default().with_asset(policy.policy_id(), token, delta.unsigned_abs());
        let value = Value::coin(params.min_coin_for(&minted))
            .checked_add(&minted)
            .ok_or(BuildError::InvalidQuantity("minted value overflow"))?;
        draft.body.outputs.push(TxOutput {
            address: wallet.address,
            value,
        });
    }
    Ok(draft)
}

/// The provider may only price scripts, set the fee and append change to the
/// draft's change address. Anything else is refused before signing.
fn check_completion(
    sent: &TransactionDraft,
    balanced: &TransactionDraft,
    params: &ProtocolParams,
) -> Result<(), BuildError> {
    let refuse = |what: &str| -> Result<(), BuildError> {
        warn!(what, "provider returned an altered draft");
        Err(BuildError::Balancing(format!("provider altered {what}")))
    };
    if balanced.body.inputs != sent.body.inputs || balanced.body.collateral != sent.body.collateral {
        return refuse("the inputs or collateral");
    }
    if balanced.body.mint != sent.body.mint
        || balanced.body.required_signers != sent.body.required_signers
    {
        return refuse("the mint or signer set");
    }
    if balanced.scripts != sent.scripts || balanced.change_address != sent.change_address {
        return refuse("the scripts or change address");
    }
    if !balanced.body.outputs.starts_with(&sent.body.outputs) {
        return refuse("the requested outputs");
    }
    let added = &balanced.body.outputs[sent.body.outputs.len()..];
    if added.len() > 1 || added.iter().any(|output| output.address != sent.change_address) {
        return refuse("the change outputs");
    }
    // Largest honest fee: a maximal transaction plus pure-coin dust folded in.
    let fee_cap = params
        .min_fee(params.max_tx_size, params.max_tx_ex_units)
        .saturating_add(params.min_utxo_coin);
    if balanced.body.fee > fee_cap {
        return refuse("the fee");
    }
    Ok(())
}

fn select_collateral<'u>(
    utxos: &'u [UtxoEntry],
    pinned: Option<UtxoRef>,
    params: &ProtocolParams,
    fee: u64,
) -> Result<&'u UtxoEntry, BuildError> {
    if let Some(reference) = pinned {
        let entry = utxos
            .iter()
            .find(|entry| entry.reference == reference)
            .ok_or_else(|| {
                BuildError::InvalidCollateral(format!("{reference} is not held by the wallet"))
            })?;
        if !entry.is_collateral_eligible(params) {
            return Err(BuildError::InvalidCollateral(format!(
                "{reference} must hold only coin, at least {}",
                params.collateral_min_coin
            )));
        }
        if !params.collateral_covers(entry.value.coin, fee) {
            return Err(BuildError::InvalidCollateral(format!(
                "{reference} does not cover {}% of the fee {fee}",
                params.collateral_percent
            )));
        }
        return Ok(entry);
    }
    utxos
        .iter()
        .filter(|entry| entry.is_collateral_eligible(params))
        .filter(|entry| params.collateral_covers(entry.value.coin, fee))
        .min_by_key(|entry| (entry.value.coin, entry.reference))
        .ok_or_else(|| {
            BuildError::InvalidCollateral(format!(
                "no pure-coin output of at least {} covering {}% of the fee {fee}",
                params.collateral_min_coin, params.collateral_percent
            ))
        })
}

fn sign(draft: TransactionDraft, wallet: &WalletState<'_>) -> Result<SignedTransaction, BuildError> {
    let tx_id = draft.body.id();
    let mut signers: BTreeSet<KeyHash> = draft.body.required_signers.clone();
    signers.insert(wallet.address.payment);
    let witnesses = signers
        .iter()
        .map(|signer| wallet.signer.witness_for(signer, &tx_id))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SignedTransaction {
        body: draft.body,
        scripts: draft.scripts,
        redeemers: draft.redeemers,
        witnesses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;
    use crate::ledger::TxId;
    use mint_policy::{AssetGroupId, AssetName};

    fn entry(seed: u8, value: Value) -> UtxoEntry {
        UtxoEntry {
            reference: UtxoRef::new(TxId([seed; 32]), 0),
            value,
            address: Address::new(Network::Testnet, KeyHash([1u8; 28])),
        }
    }

    #[test]
    fn burn_quantity_is_always_negative() {
        assert_eq!(burn_delta(1000).unwrap(), -1000);
        assert_eq!(burn_delta(-1000).unwrap(), -1000);
        assert!(matches!(burn_delta(0), Err(BuildError::InvalidQuantity(_))));
        assert!(matches!(burn_delta(i64::MIN), Err(BuildError::InvalidQuantity(_))));
    }

    #[test]
    fn smallest_eligible_output_is_collateral() {
        let params = ProtocolParams::testnet();
        let token = Value::coin(50_000_000).with_asset(
            AssetGroupId([2u8; 28]),
            AssetName::new("CO2 Tonne").unwrap(),
            5,
        );
        let utxos = vec![
            entry(1, Value::coin(40_000_000)),
            entry(2, Value::coin(6_000_000)),
            entry(3, Value::coin(1_000_000)),
            entry(4, token),
        ];
        assert_eq!(
            select_collateral(&utxos, None, &params, 0).unwrap().reference,
            utxos[1].reference
        );
        assert!(matches!(
            select_collateral(&utxos, Some(utxos[3].reference), &params, 0),
            Err(BuildError::InvalidCollateral(_))
        ));
        assert!(matches!(
            select_collateral(&utxos[2..], None, &params, 0),
            Err(BuildError::InvalidCollateral(_))
        ));
    }

    #[test]
    fn collateral_must_cover_the_fee() {
        let params = ProtocolParams::testnet();
        let utxos = vec![
            entry(1, Value::coin(40_000_000)),
            entry(2, Value::coin(6_000_000)),
        ];
        // 6M covers 150% of a 4M fee but not of a 5M one.
        let fee = 5_000_000;
        assert_eq!(
            select_collateral(&utxos, None, &params, fee).unwrap().reference,
            utxos[0].reference
        );
        assert!(matches!(
            select_collateral(&utxos, Some(utxos[1].reference), &params, fee),
            Err(BuildError::InvalidCollateral(_))
        ));
        assert!(select_collateral(&utxos, Some(utxos[1].reference), &params, 4_000_000).is_ok());
        assert!(matches!(
            select_collateral(&utxos, None, &params, 30_000_000),
            Err(BuildError::InvalidCollateral(_))
        ));
    }

    fn sent_draft() -> TransactionDraft {
        let wallet = Address::new(Network::Testnet, KeyHash([1u8; 28]));
        let mut draft = TransactionDraft::new(wallet);
        draft.body.inputs = vec![UtxoRef::new(TxId([1u8; 32]), 0)];
        draft.body.collateral = Some(UtxoRef::new(TxId([1u8; 32]), 0));
        draft.body.required_signers.insert(KeyHash([1u8; 28]));
        draft.body.outputs.push(TxOutput {
            address: wallet,
            value: Value::coin(2_000_000),
        });
        draft
    }

    fn honest_completion(sent: &TransactionDraft) -> TransactionDraft {
        let mut balanced = sent.clone();
        balanced.body.fee = 300_000;
        balanced.body.outputs.push(TxOutput {
            address: sent.change_address,
            value: Value::coin(7_700_000),
        });
        balanced
    }

    #[test]
    fn honest_completion_is_accepted() {
        let params = ProtocolParams::testnet();
        let sent = sent_draft();
        assert!(check_completion(&sent, &honest_completion(&sent), &params).is_ok());
        let mut dust_folded = sent.clone();
        dust_folded.body.fee = 1_200_000;
        assert!(check_completion(&sent, &dust_folded, &params).is_ok());
    }

    #[test]
    fn altered_completion_is_refused() {
        let params = ProtocolParams::testnet();
        let sent = sent_draft();
        let elsewhere = Address::new(Network::Testnet, KeyHash([9u8; 28]));

        let mut redirected = honest_completion(&sent);
        for output in &mut redirected.body.outputs {
            output.address = elsewhere;
        }
        let mut change_elsewhere = honest_completion(&sent);
        change_elsewhere.body.outputs[1].address = elsewhere;
        let mut shrunk = honest_completion(&sent);
        shrunk.body.outputs[0].value = Value::coin(1_000_000);
        let mut extra_input = honest_completion(&sent);
        extra_input.body.inputs.push(UtxoRef::new(TxId([2u8; 32]), 0));
        let mut swapped_collateral = honest_completion(&sent);
        swapped_collateral.body.collateral = Some(UtxoRef::new(TxId([3u8; 32]), 1));
        let mut drained = honest_completion(&sent);
        drained.body.fee = 40_000_000;
        let mut extra_signer = honest_completion(&sent);
        extra_signer.body.required_signers.insert(KeyHash([9u8; 28]));

        for altered in [
            redirected,
            change_elsewhere,
            shrunk,
            extra_input,
            swapped_collateral,
            drained,
            extra_signer,
        ] {
            assert!(matches!(
                check_completion(&sent, &altered, &params),
                Err(BuildError::Balancing(_))
            ));
        }
    }

    #[test]
    fn script_rejection_maps_to_reason() {
        let err = BuildError::from(ProviderError::Script {
            reason: mint_policy::ScriptFailure::Rejected(RejectReason::TokenNameMismatch),
        });
        assert!(matches!(err, BuildError::ScriptRejected(RejectReason::TokenNameMismatch)));
    }
}
