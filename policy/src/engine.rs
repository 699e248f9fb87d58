//! Host side of script execution: the part a ledger runs around the validator.

use codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::error::PolicyError;
use crate::template::{Check, Program};
use crate::types::AssetGroupId;
use crate::validator::{validate, EngineFault, RejectReason, TransactionView, ValidationError};

const BASE_STEPS: u64 = 200_000;
const STEPS_PER_CHECK: u64 = 50_000;
const STEPS_PER_PROGRAM_BYTE: u64 = 1_000;
const STEPS_PER_ENTRY: u64 = 10_000;
const BASE_MEM: u64 = 1_000;
const MEM_PER_PROGRAM_BYTE: u64 = 4;
const MEM_PER_ENTRY: u64 = 100;

/// Execution budget, in the ledger's abstract memory and CPU-step units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Encode, Decode, Serialize, Deserialize,
)]
pub struct ExUnits {
    pub mem: u64,
    pub steps: u64,
}

impl ExUnits {
    pub const fn new(mem: u64, steps: u64) -> Self {
        Self { mem, steps }
    }

    pub fn fits_within(&self, budget: &ExUnits) -> bool {
        self.mem <= budget.mem && self.steps <= budget.steps
    }

    pub fn saturating_add(self, other: ExUnits) -> ExUnits {
        ExUnits {
            mem: self.mem.saturating_add(other.mem),
            steps: self.steps.saturating_add(other.steps),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptFailure {
    #[error("program hash does not match policy {expected}")]
    HashMismatch { expected: AssetGroupId },
    #[error("malformed program: {0}")]
    MalformedProgram(String),
    #[error("unknown validator template")]
    UnknownTemplate,
    #[error("execution budget exceeded: needed {needed:?}, allowed {budget:?}")]
    BudgetExceeded { needed: ExUnits, budget: ExUnits },
    #[error("validator rejected: {0}")]
    Rejected(RejectReason),
    #[error("validator aborted: {0}")]
    Fault(EngineFault),
}

impl ScriptFailure {
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            ScriptFailure::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<PolicyError> for ScriptFailure {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::UnknownTemplate => ScriptFailure::UnknownTemplate,
            other => ScriptFailure::MalformedProgram(other.to_string()),
        }
    }
}

/// Runs programs against transaction views under a per-script budget cap.
#[derive(Clone, Debug)]
pub struct ScriptEngine {
    max_ex_units: ExUnits,
}

impl ScriptEngine {
    pub fn new(max_ex_units: ExUnits) -> Self {
        Self { max_ex_units }
    }

    pub fn max_ex_units(&self) -> ExUnits {
        self.max_ex_units
    }

    /// Evaluates `program` as the minting script of `policy_id`.
    ///
    /// `budget` is the allowance declared by the transaction's redeemer; it is
    /// clamped to the engine cap. On success returns the units consumed.
    pub fn evaluate<V: TransactionView + ?Sized>(
        &self,
        program: &Program,
        policy_id: &AssetGroupId,
        tx: &V,
        budget: ExUnits,
    ) -> Result<ExUnits, ScriptFailure> {
        if program.hash() != *policy_id {
            return Err(ScriptFailure::HashMismatch {
                expected: *policy_id,
            });
        }
        let (template, config) = program.decode()?;

        let entries = tx.minted_under(policy_id).map_or(0, |names| names.len()) as u64;
        let needed = cost(template.checks(), program.len() as u64, entries);
        let budget = ExUnits::new(
            budget.mem.min(self.max_ex_units.mem),
            budget.steps.min(self.max_ex_units.steps),
        );
        if !needed.fits_within(&budget) {
            return Err(ScriptFailure::BudgetExceeded { needed, budget });
        }

        match validate(&config, policy_id, tx) {
            Ok(()) => {
                debug!(policy = %policy_id, ?needed, "minting script accepted");
                Ok(needed)
            }
            Err(ValidationError::Rejected(reason)) => {
                debug!(policy = %policy_id, %reason, "minting script rejected");
                Err(ScriptFailure::Rejected(reason))
            }
            Err(ValidationError::Fault(fault)) => {
                error!(policy = %policy_id, %fault, "minting validator hit an impossible branch");
                Err(ScriptFailure::Fault(fault))
            }
        }
    }

    /// Evaluates with the full engine cap as budget, to measure cost.
    pub fn measure<V: TransactionView + ?Sized>(
        &self,
        program: &Program,
        policy_id: &AssetGroupId,
        tx: &V,
    ) -> Result<ExUnits, ScriptFailure> {
        self.evaluate(program, policy_id, tx, self.max_ex_units)
    }
}

fn cost(checks: &[Check], program_len: u64, entries: u64) -> ExUnits {
    let steps = BASE_STEPS
        .saturating_add(STEPS_PER_CHECK.saturating_mul(checks.len() as u64))
        .saturating_add(STEPS_PER_PROGRAM_BYTE.saturating_mul(program_len))
        .saturating_add(STEPS_PER_ENTRY.saturating_mul(entries));
    let mem = BASE_MEM
        .saturating_add(MEM_PER_PROGRAM_BYTE.saturating_mul(program_len))
        .saturating_add(MEM_PER_ENTRY.saturating_mul(entries));
    ExUnits { mem, steps }
}
