use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::address::Network;
use crate::emulator::MemoryLedger;
use crate::error::WalletError;
use crate::keys::RootSecret;
use crate::ledger::{UtxoRef, Value};
use crate::provider::ChainProvider;
use crate::rpc::HttpChainProvider;

pub const ROOT_SECRET_ENV: &str = "MINT_ROOT_SECRET";

/// Coin credited to the wallet when it runs against the in-memory ledger.
pub const EMULATOR_FUNDING: u64 = 100_000_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderConfig {
    Emulator,
    Http { url: Url },
}

impl ProviderConfig {
    /// `emulator`, or the base URL of a provider.
    pub fn parse(value: &str) -> Result<Self, WalletError> {
        if value.eq_ignore_ascii_case("emulator") {
            return Ok(ProviderConfig::Emulator);
        }
        let url = Url::parse(value).map_err(|err| WalletError::Config(err.to_string()))?;
        Ok(ProviderConfig::Http { url })
    }
}

/// Everything the binary needs to open a [`Minter`](crate::Minter). Filled
/// from flags and environment.
#[derive(Clone, Debug)]
pub struct WalletConfig {
    pub network: Network,
    pub provider: ProviderConfig,
    pub provider_token: Option<String>,
    pub request_timeout_secs: u64,
    pub token_name: String,
    pub collateral: Option<UtxoRef>,
    /// Hex root secret of the administrator key.
    pub root_secret: Option<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            provider: ProviderConfig::Emulator,
            provider_token: None,
            request_timeout_secs: 30,
            token_name: "CO2 Tonne".to_string(),
            collateral: None,
            root_secret: None,
        }
    }
}

impl WalletConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn root_secret(&self) -> Result<RootSecret, WalletError> {
        let hex = self.root_secret.as_deref().ok_or_else(|| {
            WalletError::Config(format!("root secret missing; set {ROOT_SECRET_ENV} or pass --root"))
        })?;
        RootSecret::from_hex(hex)
    }

    /// Connects to the configured provider. The emulator starts with one funded
    /// output at `fund` so local runs have something to spend.
    pub fn connect(
        &self,
        fund: Option<crate::address::Address>,
    ) -> Result<Arc<dyn ChainProvider>, WalletError> {
        match &self.provider {
            ProviderConfig::Emulator => {
                let ledger = MemoryLedger::default();
                if let Some(address) = fund {
                    ledger
                        .fund(address, Value::coin(EMULATOR_FUNDING))
                        .map_err(|err| WalletError::Config(err.to_string()))?;
                }
                Ok(Arc::new(ledger))
            }
            ProviderConfig::Http { url } => Ok(Arc::new(HttpChainProvider::new(
                url.clone(),
                self.provider_token.clone(),
                self.request_timeout(),
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_emulator_or_url() {
        assert_eq!(ProviderConfig::parse("emulator").unwrap(), ProviderConfig::Emulator);
        assert!(matches!(
            ProviderConfig::parse("http://127.0.0.1:3000").unwrap(),
            ProviderConfig::Http { .. }
        ));
        assert!(ProviderConfig::parse("not a url").is_err());
    }

    #[test]
    fn root_secret_must_be_present_and_hex() {
        let config = WalletConfig {
            root_secret: Some("00".repeat(32)),
            ..WalletConfig::default()
        };
        assert!(config.root_secret().is_ok());
        assert!(matches!(
            WalletConfig::default().root_secret(),
            Err(WalletError::Config(_))
        ));
        let malformed = WalletConfig {
            root_secret: Some("zz".into()),
            ..WalletConfig::default()
        };
        assert!(malformed.root_secret().is_err());
    }

    #[test]
    fn emulator_is_funded_for_local_runs() {
        use crate::address::Address;
        use mint_policy::KeyHash;

        let address = Address::new(Network::Testnet, KeyHash([3u8; 28]));
        let provider = WalletConfig::default().connect(Some(address)).unwrap();
        let utxos = provider.find_utxos(&address).unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].value, Value::coin(EMULATOR_FUNDING));
    }
}
