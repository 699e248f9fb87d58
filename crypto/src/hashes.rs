use blake2::digest::consts::{U28, U32};
use blake2::{Blake2b, Digest};

/// Length of key hashes and script hashes.
pub const KEY_HASH_LEN: usize = 28;
/// Length of transaction ids.
pub const TX_HASH_LEN: usize = 32;

pub fn blake2b_224(data: &[u8]) -> [u8; KEY_HASH_LEN] {
    let mut hasher = Blake2b::<U28>::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn blake2b_256(data: &[u8]) -> [u8; TX_HASH_LEN] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Blake2b-224 over `len(domain) || domain || data`, the length as a
/// little-endian `u64`.
pub fn tagged_blake2b_224(domain: &[u8], data: &[u8]) -> [u8; KEY_HASH_LEN] {
    let mut hasher = Blake2b::<U28>::new();
    hasher.update((domain.len() as u64).to_le_bytes());
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}
