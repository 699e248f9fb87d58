#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod error;
pub mod hashes;
pub mod ml_dsa;
pub mod traits;

pub use error::CryptoError;
pub use hashes::{blake2b_224, blake2b_256, tagged_blake2b_224, KEY_HASH_LEN, TX_HASH_LEN};
