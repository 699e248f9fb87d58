use std::fmt;
use std::str::FromStr;

use bech32::{self, FromBase32, ToBase32, Variant};
use codec::{Decode, Encode};
use mint_policy::KeyHash;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

const MAINNET_HRP: &str = "addr";
const TESTNET_HRP: &str = "addr_test";
const HEADER_KEY_PAYMENT: u8 = 0x60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    fn hrp(self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_HRP,
            Network::Testnet => TESTNET_HRP,
        }
    }

    fn tag(self) -> u8 {
        match self {
            Network::Mainnet => 1,
            Network::Testnet => 0,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = WalletError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" | "preview" | "preprod" => Ok(Network::Testnet),
            other => Err(WalletError::Config(format!("unknown network {other}"))),
        }
    }
}

/// Enterprise-style address: a network tag and a payment key hash, no staking part.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct Address {
    pub network: Network,
    pub payment: KeyHash,
}

impl Address {
    pub fn new(network: Network, payment: KeyHash) -> Self {
        Self { network, payment }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 28);
        out.push(HEADER_KEY_PAYMENT | self.network.tag());
        out.extend_from_slice(self.payment.as_bytes());
        out
    }

    pub fn encode(&self) -> Result<String, WalletError> {
        bech32::encode(self.network.hrp(), self.to_bytes().to_base32(), Variant::Bech32)
            .map_err(|err| WalletError::AddressEncoding(err.to_string()))
    }

    pub fn decode(address: &str) -> Result<Self, WalletError> {
        let (hrp, data, variant) =
            bech32::decode(address).map_err(|err| WalletError::AddressEncoding(err.to_string()))?;
        if variant != Variant::Bech32 {
            return Err(WalletError::AddressEncoding("unsupported variant".into()));
        }
        let network = match hrp.as_str() {
            MAINNET_HRP => Network::Mainnet,
            TESTNET_HRP => Network::Testnet,
            other => {
                return Err(WalletError::AddressEncoding(format!(
                    "invalid HRP: expected {MAINNET_HRP} or {TESTNET_HRP}, got {other}"
                )))
            }
        };
        let bytes = Vec::<u8>::from_base32(&data)
            .map_err(|err| WalletError::AddressEncoding(err.to_string()))?;
        if bytes.len() != 29 {
            return Err(WalletError::AddressEncoding("invalid address length".into()));
        }
        if bytes[0] != HEADER_KEY_PAYMENT | network.tag() {
            return Err(WalletError::AddressEncoding(format!(
                "unsupported address header {:#04x}",
                bytes[0]
            )));
        }
        let mut payment = [0u8; 28];
        payment.copy_from_slice(&bytes[1..]);
        Ok(Self {
            network,
            payment: KeyHash(payment),
        })
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Ok(encoded) => write!(f, "Address({encoded})"),
            Err(_) => write!(f, "Address({}, {})", self.network, self.payment),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = self.encode().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&encoded)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Address::decode(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let address = Address::new(Network::Testnet, KeyHash([0x5a; 28]));
        let encoded = address.encode().unwrap();
        assert!(encoded.starts_with("addr_test1"));
        assert_eq!(Address::decode(&encoded).unwrap(), address);
    }

    #[test]
    fn networks_use_distinct_prefixes() {
        let main = Address::new(Network::Mainnet, KeyHash([1; 28]));
        let test = Address::new(Network::Testnet, KeyHash([1; 28]));
        assert!(main.encode().unwrap().starts_with("addr1"));
        assert_ne!(main.encode().unwrap(), test.encode().unwrap());
    }

    #[test]
    fn foreign_hrp_is_rejected() {
        let encoded = bech32::encode("stake", vec![0u8; 29].to_base32(), Variant::Bech32).unwrap();
        assert!(matches!(
            Address::decode(&encoded),
            Err(WalletError::AddressEncoding(_))
        ));
    }
}
