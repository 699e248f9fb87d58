//! The chain-data-provider seam: everything the pipeline needs from the outside world.

use mint_policy::ScriptFailure;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::ledger::{ProtocolParams, SignedTransaction, TransactionDraft, TxId, UtxoEntry};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Timeout or connection failure; the request may not have been seen.
    #[error("provider unreachable: {0}")]
    Unreachable(String),
    #[error("provider rejected request: {0}")]
    Rejected(String),
    #[error("script evaluation failed: {reason}")]
    Script { reason: ScriptFailure },
    #[error("balancing failed: {0}")]
    Balancing(String),
    #[error("malformed provider response: {0}")]
    Decode(String),
}

/// Error body shared by the provider's HTTP routes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptFailure>,
}

/// Blocking access to chain state. Each call is a single attempt.
pub trait ChainProvider: Send + Sync {
    fn find_utxos(&self, address: &Address) -> Result<Vec<UtxoEntry>, ProviderError>;

    fn fetch_protocol_params(&self) -> Result<ProtocolParams, ProviderError>;

    /// Prices scripts, sets the fee and adds change to `draft.change_address`.
    fn complete_and_balance(
        &self,
        draft: TransactionDraft,
    ) -> Result<TransactionDraft, ProviderError>;

    fn submit(&self, tx: &SignedTransaction) -> Result<TxId, ProviderError>;
}
