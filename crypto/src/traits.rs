use crate::error::CryptoError;
use alloc::vec::Vec;

pub trait Signature: Sized + Clone {
    fn as_bytes(&self) -> &[u8];
    fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

pub trait SigningKey: Sized {
    type VerifyKey: VerifyKey<Signature = Self::Signature>;
    type Signature: Signature;

    fn generate_deterministic(seed: &[u8]) -> Self;
    fn sign(&self, message: &[u8]) -> Self::Signature;
    fn to_bytes(&self) -> Vec<u8>;
    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError>;
    fn verify_key(&self) -> Self::VerifyKey;
}

pub trait VerifyKey: Sized + Clone {
    type Signature: Signature;

    fn verify(&self, message: &[u8], signature: &Self::Signature) -> Result<(), CryptoError>;
    fn to_bytes(&self) -> Vec<u8>;
    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError>;

    /// Ledger identity of this key: Blake2b-224 over the encoded key bytes.
    fn key_hash(&self) -> [u8; crate::hashes::KEY_HASH_LEN] {
        crate::hashes::blake2b_224(&self.to_bytes())
    }
}
