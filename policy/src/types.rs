use std::collections::BTreeMap;
use std::fmt;

use codec::{Decode, Encode};
use mint_crypto::KEY_HASH_LEN;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Longest asset name the ledger accepts, in bytes.
pub const MAX_ASSET_NAME_LEN: usize = 32;

/// Blake2b-224 hash of a verification key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct KeyHash(pub [u8; KEY_HASH_LEN]);

/// Policy id: hash of the serialized validator program that governs an asset group.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct AssetGroupId(pub [u8; KEY_HASH_LEN]);

macro_rules! hash28_impls {
    ($name:ident) => {
        impl $name {
            pub fn from_hex(value: &str) -> Result<Self, PolicyError> {
                let bytes = hex::decode(value.trim())
                    .map_err(|err| PolicyError::MalformedParameters(err.to_string()))?;
                let array: [u8; KEY_HASH_LEN] =
                    bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| PolicyError::InvalidHashLength {
                            expected: KEY_HASH_LEN,
                            actual: bytes.len(),
                        })?;
                Ok(Self(array))
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn as_bytes(&self) -> &[u8; KEY_HASH_LEN] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                Self::from_hex(&value).map_err(serde::de::Error::custom)
            }
        }
    };
}

hash28_impls!(KeyHash);
hash28_impls!(AssetGroupId);

/// Name of one asset inside an asset group. Raw bytes, compared byte-for-byte.
///
/// `AssetName::new` enforces the ledger length limit. Deserialized names are
/// not checked until they reach an encoder, so an over-long name loaded from a
/// config file fails at instantiation with a typed error.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Encode)]
pub struct AssetName(Vec<u8>);

impl AssetName {
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self, PolicyError> {
        let bytes = bytes.as_ref();
        if bytes.len() > MAX_ASSET_NAME_LEN {
            return Err(PolicyError::AssetNameTooLong {
                len: bytes.len(),
                max: MAX_ASSET_NAME_LEN,
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    pub(crate) fn from_raw(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn check_len(&self) -> Result<(), PolicyError> {
        if self.0.len() > MAX_ASSET_NAME_LEN {
            return Err(PolicyError::AssetNameTooLong {
                len: self.0.len(),
                max: MAX_ASSET_NAME_LEN,
            });
        }
        Ok(())
    }
}

impl Decode for AssetName {
    fn decode<I: codec::Input>(input: &mut I) -> Result<Self, codec::Error> {
        let bytes = Vec::<u8>::decode(input)?;
        if bytes.len() > MAX_ASSET_NAME_LEN {
            return Err("asset name exceeds ledger limit".into());
        }
        Ok(Self(bytes))
    }
}

impl fmt::Debug for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) => write!(f, "AssetName({text:?})"),
            Err(_) => write!(f, "AssetName(0x{})", hex::encode(&self.0)),
        }
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) => f.write_str(text),
            Err(_) => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl Serialize for AssetName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for AssetName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        let bytes = hex::decode(value.trim()).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// Signed quantities minted (positive) or burned (negative) per asset name.
pub type AssetDelta = BTreeMap<AssetName, i64>;

/// Mint/burn field of a transaction, grouped by policy id.
pub type MintMap = BTreeMap<AssetGroupId, AssetDelta>;
