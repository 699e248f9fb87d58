pub mod address;
pub mod api;
pub mod balance;
pub mod config;
pub mod emulator;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod minter;
pub mod provider;
pub mod rpc;
pub mod submit;
pub mod tx_builder;

pub use address::{Address, Network};
pub use config::{ProviderConfig, WalletConfig};
pub use emulator::MemoryLedger;
pub use error::WalletError;
pub use keys::{RootSecret, SigningError, TxSigner, WalletKeys};
pub use ledger::{
    ProtocolParams, SignedTransaction, TransactionDraft, TxId, UtxoEntry, UtxoRef, Value,
};
pub use minter::Minter;
pub use provider::{ChainProvider, ProviderError};
pub use rpc::HttpChainProvider;
pub use submit::{burn_and_submit, mint_and_submit, submit, MintError, SubmitError};
pub use tx_builder::{build_burn_tx, build_mint_tx, BuildError, MintRequest, WalletState};
