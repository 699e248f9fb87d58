//! ML-DSA-65 (FIPS 204) signatures.
//!
//! Thin wrapper over the `ml-dsa` crate. Keys are stored in their encoded
//! form and decoded on use, so they can be moved around as plain bytes.

use crate::error::CryptoError;
use crate::traits::{Signature as SigTrait, SigningKey as SigningKeyTrait, VerifyKey};
use alloc::vec::Vec;

use ml_dsa::signature::{Signer, Verifier};
use ml_dsa::{MlDsa65, B32};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// ML-DSA-65 parameter sizes (FIPS 204)
pub const ML_DSA_PUBLIC_KEY_LEN: usize = 1952;
pub const ML_DSA_SECRET_KEY_LEN: usize = 4032;
pub const ML_DSA_SIGNATURE_LEN: usize = 3309;

const KEYGEN_DOMAIN: &[u8] = b"mint-wallet/ml-dsa-65/xi";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MlDsaSignature {
    bytes: Vec<u8>,
}

impl MlDsaSignature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != ML_DSA_SIGNATURE_LEN {
            return Err(CryptoError::InvalidLength {
                expected: ML_DSA_SIGNATURE_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }
}

impl SigTrait for MlDsaSignature {
    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MlDsaPublicKey {
    bytes: [u8; ML_DSA_PUBLIC_KEY_LEN],
}

impl MlDsaPublicKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn to_inner(&self) -> ml_dsa::VerifyingKey<MlDsa65> {
        ml_dsa::VerifyingKey::<MlDsa65>::decode(&self.bytes.into())
    }
}

impl VerifyKey for MlDsaPublicKey {
    type Signature = MlDsaSignature;

    fn verify(&self, message: &[u8], signature: &Self::Signature) -> Result<(), CryptoError> {
        let sig_bytes: [u8; ML_DSA_SIGNATURE_LEN] = signature
            .bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature)?;
        let sig = ml_dsa::Signature::<MlDsa65>::decode(&sig_bytes.into())
            .ok_or(CryptoError::InvalidSignature)?;
        self.to_inner()
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; ML_DSA_PUBLIC_KEY_LEN] =
            bytes.try_into().map_err(|_| CryptoError::InvalidLength {
                expected: ML_DSA_PUBLIC_KEY_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self { bytes })
    }
}

/// Encoded signing key. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MlDsaSecretKey {
    bytes: [u8; ML_DSA_SECRET_KEY_LEN],
}

impl MlDsaSecretKey {
    fn to_inner(&self) -> ml_dsa::SigningKey<MlDsa65> {
        ml_dsa::SigningKey::<MlDsa65>::decode(&self.bytes.into())
    }
}

impl core::fmt::Debug for MlDsaSecretKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MlDsaSecretKey").finish_non_exhaustive()
    }
}

impl PartialEq for MlDsaSecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for MlDsaSecretKey {}

impl SigningKeyTrait for MlDsaSecretKey {
    type VerifyKey = MlDsaPublicKey;
    type Signature = MlDsaSignature;

    fn generate_deterministic(seed: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(KEYGEN_DOMAIN);
        hasher.update(seed);
        let mut xi = [0u8; 32];
        xi.copy_from_slice(&hasher.finalize());
        let seed_b32: B32 = xi.into();
        xi.zeroize();

        let sk = ml_dsa::SigningKey::<MlDsa65>::from_seed(&seed_b32);
        let encoded = sk.encode();
        let mut bytes = [0u8; ML_DSA_SECRET_KEY_LEN];
        bytes.copy_from_slice(encoded.as_ref());
        Self { bytes }
    }

    fn sign(&self, message: &[u8]) -> Self::Signature {
        let sig = self.to_inner().sign(message);
        MlDsaSignature {
            bytes: sig.encode().to_vec(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; ML_DSA_SECRET_KEY_LEN] =
            bytes.try_into().map_err(|_| CryptoError::InvalidLength {
                expected: ML_DSA_SECRET_KEY_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self { bytes })
    }

    fn verify_key(&self) -> Self::VerifyKey {
        let encoded = self.to_inner().verifying_key().encode();
        let mut bytes = [0u8; ML_DSA_PUBLIC_KEY_LEN];
        bytes.copy_from_slice(encoded.as_ref());
        MlDsaPublicKey { bytes }
    }
}
