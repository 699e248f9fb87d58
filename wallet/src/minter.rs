use std::sync::Arc;

use mint_policy::{Blueprint, MintingPolicy, PolicyError};

use crate::address::{Address, Network};
use crate::keys::WalletKeys;
use crate::ledger::{TxId, UtxoRef, Value};
use crate::provider::{ChainProvider, ProviderError};
use crate::submit::{burn_and_submit, mint_and_submit, MintError};
use crate::tx_builder::{MintRequest, WalletState};

/// The administrator wallet bound to one policy instance and one provider.
pub struct Minter {
    provider: Arc<dyn ChainProvider>,
    keys: WalletKeys,
    policy: MintingPolicy,
    address: Address,
    collateral: Option<UtxoRef>,
}

impl Minter {
    pub fn new(
        provider: Arc<dyn ChainProvider>,
        keys: WalletKeys,
        policy: MintingPolicy,
        network: Network,
    ) -> Self {
        let address = keys.address(network);
        Self {
            provider,
            keys,
            policy,
            address,
            collateral: None,
        }
    }

    pub fn with_collateral(mut self, collateral: Option<UtxoRef>) -> Self {
        self.collateral = collateral;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn policy(&self) -> &MintingPolicy {
        &self.policy
    }

    pub fn provider(&self) -> &Arc<dyn ChainProvider> {
        &self.provider
    }

    pub fn wallet_state(&self) -> WalletState<'_> {
        WalletState {
            address: self.address,
            signer: &self.keys,
            policy: &self.policy,
            collateral: self.collateral,
        }
    }

    pub fn mint(&self, quantity: i64) -> Result<TxId, MintError> {
        mint_and_submit(
            &MintRequest::new(quantity),
            &self.wallet_state(),
            self.provider.as_ref(),
        )
    }

    pub fn burn(&self, quantity: i64) -> Result<TxId, MintError> {
        burn_and_submit(
            &MintRequest::new(quantity),
            &self.wallet_state(),
            self.provider.as_ref(),
        )
    }

    /// Everything held at the wallet address.
    pub fn balance(&self) -> Result<Value, ProviderError> {
        let utxos = self.provider.find_utxos(&self.address)?;
        Value::sum(utxos.iter().map(|entry| &entry.value))
            .ok_or_else(|| ProviderError::Decode("value overflow".into()))
    }

    /// Units of the policy's token held at the wallet address.
    pub fn token_balance(&self) -> Result<u64, ProviderError> {
        Ok(self
            .balance()?
            .quantity_of(&self.policy.policy_id(), &self.policy.config().token_name))
    }

    pub fn blueprint(&self) -> Result<Blueprint, PolicyError> {
        Blueprint::from_policy(&self.policy)
    }
}
