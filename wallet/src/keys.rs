use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use mint_crypto::ml_dsa::{MlDsaPublicKey, MlDsaSecretKey};
use mint_crypto::traits::{Signature as _, SigningKey, VerifyKey};
use mint_policy::KeyHash;

use crate::address::{Address, Network};
use crate::error::WalletError;
use crate::ledger::{TxId, VKeyWitness};

const KEY_SIZE: usize = 32;
const PAYMENT_KEY_DOMAIN: &[u8] = b"mint-wallet/payment";

/// Root secret key - the master seed for the wallet.
/// This is zeroized on drop to prevent key material from persisting in memory.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RootSecret([u8; KEY_SIZE]);

impl RootSecret {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_rng<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_hex(value: &str) -> Result<Self, WalletError> {
        let mut bytes = hex::decode(value.trim())?;
        if bytes.len() != KEY_SIZE {
            bytes.zeroize();
            return Err(WalletError::InvalidArgument("root secret must be 32 bytes"));
        }
        let mut out = [0u8; KEY_SIZE];
        out.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self(out))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn derive(&self) -> WalletKeys {
        let mut seed = Vec::with_capacity(PAYMENT_KEY_DOMAIN.len() + KEY_SIZE);
        seed.extend_from_slice(PAYMENT_KEY_DOMAIN);
        seed.extend_from_slice(&self.0);
        let signing = MlDsaSecretKey::generate_deterministic(&seed);
        seed.zeroize();
        WalletKeys::from_signing_key(signing)
    }
}

impl std::fmt::Debug for RootSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootSecret").finish_non_exhaustive()
    }
}

/// Payment key pair of the wallet. The key hash is the administrator identity
/// when this wallet holds the minting authority.
#[derive(Clone, Debug)]
pub struct WalletKeys {
    signing: MlDsaSecretKey,
    verify: MlDsaPublicKey,
    key_hash: KeyHash,
}

impl WalletKeys {
    pub fn from_signing_key(signing: MlDsaSecretKey) -> Self {
        let verify = signing.verify_key();
        let key_hash = KeyHash(verify.key_hash());
        Self {
            signing,
            verify,
            key_hash,
        }
    }

    pub fn key_hash(&self) -> KeyHash {
        self.key_hash
    }

    pub fn verify_key(&self) -> &MlDsaPublicKey {
        &self.verify
    }

    pub fn address(&self, network: Network) -> Address {
        Address::new(network, self.key_hash)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("no key material for signer {0}")]
    MissingKey(KeyHash),
}

/// Signing capability handed to the transaction pipeline.
pub trait TxSigner: Send + Sync {
    fn key_hash(&self) -> KeyHash;

    fn sign(&self, tx_id: &TxId) -> Result<VKeyWitness, SigningError>;

    /// Witness for `signer`, or `MissingKey` when this capability cannot produce one.
    fn witness_for(&self, signer: &KeyHash, tx_id: &TxId) -> Result<VKeyWitness, SigningError> {
        if *signer != self.key_hash() {
            return Err(SigningError::MissingKey(*signer));
        }
        self.sign(tx_id)
    }
}

impl TxSigner for WalletKeys {
    fn key_hash(&self) -> KeyHash {
        self.key_hash
    }

    fn sign(&self, tx_id: &TxId) -> Result<VKeyWitness, SigningError> {
        let signature = self.signing.sign(tx_id.as_bytes());
        Ok(VKeyWitness {
            vkey: self.verify.to_bytes(),
            signature: signature.to_vec(),
        })
    }
}
