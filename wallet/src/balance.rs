//! Script pricing, fee estimation and change computation for a draft.

use std::collections::BTreeSet;

use mint_policy::{ExUnits, KeyHash, ScriptEngine, ScriptFailure};
use tracing::debug;

use crate::ledger::{
    script_integrity_hash, ProtocolParams, Redeemer, TransactionDraft, TxOutput, UtxoEntry, Value,
};
use crate::provider::ProviderError;

const MAX_FEE_ITERATIONS: usize = 8;

/// Completes `draft` given the resolved entries of its inputs.
///
/// Every minted policy must have its script attached; each script is run
/// against the body to obtain exact execution units. The fee is then iterated
/// until it covers the signed size, and whatever remains after outputs and fee
/// is returned to the change address. Pure-coin change below the min-coin floor
/// is folded into the fee.
pub fn complete_and_balance(
    mut draft: TransactionDraft,
    inputs: &[UtxoEntry],
    params: &ProtocolParams,
    engine: &ScriptEngine,
) -> Result<TransactionDraft, ProviderError> {
    price_scripts(&mut draft, engine, params)?;

    let input_total = Value::sum(inputs.iter().map(|entry| &entry.value))
        .ok_or_else(|| ProviderError::Balancing("input value overflow".into()))?;
    let available = input_total
        .apply_mint(&draft.body.mint)
        .ok_or_else(|| ProviderError::Balancing("burn exceeds the assets held by the inputs".into()))?;
    let spent = Value::sum(draft.body.outputs.iter().map(|output| &output.value))
        .ok_or_else(|| ProviderError::Balancing("output value overflow".into()))?;
    let surplus = available.checked_sub(&spent).ok_or_else(|| {
        ProviderError::Balancing(format!(
            "insufficient funds: inputs provide {} coin, outputs need {}",
            available.coin, spent.coin
        ))
    })?;

    let witnesses = witness_count(inputs, &draft.body.required_signers);
    let ex_units = draft.total_ex_units();
    let outputs = draft.body.outputs.clone();
    let mut fee = params.min_fee(draft.estimated_size(witnesses), ex_units);

    for _ in 0..MAX_FEE_ITERATIONS {
        let change = surplus.checked_sub(&Value::coin(fee)).ok_or_else(|| {
            ProviderError::Balancing(format!(
                "insufficient coin for fee {fee}: {} available",
                surplus.coin
            ))
        })?;
        let mut body_fee = fee;
        let mut body_outputs = outputs.clone();
        if change.is_pure_coin() && change.coin < params.min_coin_for(&change) {
            body_fee = body_fee.saturating_add(change.coin);
        } else if change.coin < params.min_coin_for(&change) {
            return Err(ProviderError::Balancing(format!(
                "change holding native assets needs {} coin, {} left",
                params.min_coin_for(&change),
                change.coin
            )));
        } else {
            body_outputs.push(TxOutput {
                address: draft.change_address,
                value: change,
            });
        }
        draft.body.outputs = body_outputs;
        draft.body.fee = body_fee;

        let size = draft.estimated_size(witnesses);
        if size > params.max_tx_size {
            return Err(ProviderError::Balancing(format!(
                "transaction size {size} exceeds limit {}",
                params.max_tx_size
            )));
        }
        let required = params.min_fee(size, ex_units);
        if body_fee >= required {
            debug!(fee = body_fee, size, ?ex_units, "draft balanced");
            return Ok(draft);
        }
        fee = required;
    }
    Err(ProviderError::Balancing("fee did not converge".into()))
}

fn price_scripts(
    draft: &mut TransactionDraft,
    engine: &ScriptEngine,
    params: &ProtocolParams,
) -> Result<(), ProviderError> {
    let policies: Vec<_> = draft.body.mint.keys().copied().collect();
    let mut redeemers = Vec::with_capacity(policies.len());
    for (index, policy) in policies.iter().enumerate() {
        let program = draft.script_for(policy).ok_or_else(|| {
            ProviderError::Balancing(format!("no script attached for minted policy {policy}"))
        })?;
        let ex_units = engine
            .measure(program, policy, &draft.body)
            .map_err(|reason| ProviderError::Script { reason })?;
        let mut redeemer = draft
            .redeemers
            .iter()
            .find(|redeemer| redeemer.index as usize == index)
            .cloned()
            .unwrap_or_else(|| Redeemer::unit_mint(index as u32));
        redeemer.ex_units = ex_units;
        redeemers.push(redeemer);
    }

    let total = redeemers
        .iter()
        .fold(ExUnits::default(), |acc, redeemer| acc.saturating_add(redeemer.ex_units));
    if !total.fits_within(&params.max_tx_ex_units) {
        return Err(ProviderError::Script {
            reason: ScriptFailure::BudgetExceeded {
                needed: total,
                budget: params.max_tx_ex_units,
            },
        });
    }

    draft.body.script_integrity = (!redeemers.is_empty()).then(|| script_integrity_hash(&redeemers));
    draft.redeemers = redeemers;
    Ok(())
}

/// Distinct keys that must sign: input owners plus declared signers.
fn witness_count(inputs: &[UtxoEntry], required_signers: &BTreeSet<KeyHash>) -> usize {
    inputs
        .iter()
        .map(|entry| entry.address.payment)
        .chain(required_signers.iter().copied())
        .collect::<BTreeSet<_>>()
        .len()
        .max(1)
}
