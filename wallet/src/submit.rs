use thiserror::Error;
use tracing::{info, warn};

use crate::ledger::{SignedTransaction, TxId};
use crate::provider::{ChainProvider, ProviderError};
use crate::tx_builder::{build_burn_tx, build_mint_tx, BuildError, MintRequest, WalletState};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("provider unreachable: {0}")]
    Unreachable(String),
}

impl SubmitError {
    /// Resending the same signed bytes is safe: the ledger no-ops a known id.
    /// A rejection needs a fresh build against the current UTXO set.
    pub fn is_retryable_with_same_bytes(&self) -> bool {
        matches!(self, SubmitError::Unreachable(_))
    }
}

impl From<ProviderError> for SubmitError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unreachable(message) => SubmitError::Unreachable(message),
            ProviderError::Rejected(message)
            | ProviderError::Balancing(message)
            | ProviderError::Decode(message) => SubmitError::Rejected(message),
            ProviderError::Script { reason } => SubmitError::Rejected(reason.to_string()),
        }
    }
}

pub fn submit(provider: &dyn ChainProvider, tx: &SignedTransaction) -> Result<TxId, SubmitError> {
    let local_id = tx.id();
    match provider.submit(tx) {
        Ok(tx_id) => {
            if tx_id != local_id {
                warn!(%tx_id, %local_id, "provider reported a different transaction id");
            }
            info!(%tx_id, "transaction submitted");
            Ok(tx_id)
        }
        Err(err) => {
            warn!(tx_id = %local_id, %err, "submission failed");
            Err(err.into())
        }
    }
}

#[derive(Debug, Error)]
pub enum MintError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
}

pub fn mint_and_submit(
    request: &MintRequest,
    wallet: &WalletState<'_>,
    provider: &dyn ChainProvider,
) -> Result<TxId, MintError> {
    let tx = build_mint_tx(request, wallet, provider)?;
    Ok(submit(provider, &tx)?)
}

pub fn burn_and_submit(
    request: &MintRequest,
    wallet: &WalletState<'_>,
    provider: &dyn ChainProvider,
) -> Result<TxId, MintError> {
    let tx = build_burn_tx(request, wallet, provider)?;
    Ok(submit(provider, &tx)?)
}
