//! AES-128 block primitive
//!
//! Two uses:
//! - Block-wise key wrap: every 16-byte block is encrypted as its own
//!   zero-IV CBC message, so no chaining carries across blocks. For a single
//!   block zero-IV CBC is plain ECB, which is what this does. Identical input
//!   blocks therefore wrap to identical output blocks at any position.
//! - Single-block encrypt: CTR keystream generation and MAC chaining.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::{BLOCK_SIZE, KEY_SIZE};

/// AES-128 with an expanded key schedule, reused across blocks.
#[derive(Clone)]
pub struct BlockCipher {
    aes: Aes128,
}

impl BlockCipher {
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            aes: Aes128::new(GenericArray::from_slice(key)),
        }
    }

    /// Encrypt one 16-byte block.
    pub fn encrypt_block(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut out = GenericArray::clone_from_slice(block);
        self.aes.encrypt_block(&mut out);
        out.into()
    }

    /// Encrypt one 16-byte block in place.
    pub fn encrypt_block_in_place(&self, block: &mut [u8; BLOCK_SIZE]) {
        self.aes
            .encrypt_block(GenericArray::from_mut_slice(block.as_mut_slice()));
    }

    /// Wrap `data` block by block. `data.len()` must be a multiple of 16.
    pub fn wrap(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        check_block_multiple(data)?;
        let mut result = data.to_vec();
        for chunk in result.chunks_exact_mut(BLOCK_SIZE) {
            self.aes.encrypt_block(GenericArray::from_mut_slice(chunk));
        }
        Ok(result)
    }

    /// Inverse of [`BlockCipher::wrap`].
    pub fn unwrap(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        check_block_multiple(data)?;
        let mut result = data.to_vec();
        for chunk in result.chunks_exact_mut(BLOCK_SIZE) {
            self.aes.decrypt_block(GenericArray::from_mut_slice(chunk));
        }
        Ok(result)
    }
}

impl std::fmt::Debug for BlockCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Wrap key material under `key`, one independent block at a time.
pub fn wrap_blocks(data: &[u8], key: &[u8; KEY_SIZE]) -> CryptoResult<Vec<u8>> {
    BlockCipher::new(key).wrap(data)
}

/// Unwrap key material produced by [`wrap_blocks`].
pub fn unwrap_blocks(data: &[u8], key: &[u8; KEY_SIZE]) -> CryptoResult<Vec<u8>> {
    BlockCipher::new(key).unwrap(data)
}

/// AES-128 encrypt exactly one block (zero IV).
pub fn encrypt_single_block(block: &[u8; BLOCK_SIZE], key: &[u8; KEY_SIZE]) -> [u8; BLOCK_SIZE] {
    BlockCipher::new(key).encrypt_block(block)
}

/// Generate a random 128-bit AES key.
pub fn generate_random_key() -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

fn check_block_multiple(data: &[u8]) -> CryptoResult<()> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidLength {
            len: data.len(),
            block: BLOCK_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // FIPS-197 appendix C.1
    const FIPS_KEY: [u8; 16] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
        0x0f,
    ];
    const FIPS_PLAIN: [u8; 16] = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ];
    const FIPS_CIPHER: [u8; 16] = [
        0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4, 0xc5,
        0x5a,
    ];

    #[test]
    fn test_single_block_known_vector() {
        assert_eq!(encrypt_single_block(&FIPS_PLAIN, &FIPS_KEY), FIPS_CIPHER);

        let mut block = FIPS_PLAIN;
        BlockCipher::new(&FIPS_KEY).encrypt_block_in_place(&mut block);
        assert_eq!(block, FIPS_CIPHER);
    }

    #[test]
    fn test_wrap_matches_single_block() {
        let wrapped = wrap_blocks(&FIPS_PLAIN, &FIPS_KEY).unwrap();
        assert_eq!(wrapped, FIPS_CIPHER.to_vec());
    }

    #[test]
    fn test_repeated_blocks_wrap_identically() {
        let key = [0x42u8; 16];
        let data = [0xABu8; 48];

        let wrapped = wrap_blocks(&data, &key).unwrap();

        // No chaining: every position yields the same ciphertext block
        assert_eq!(wrapped[..16], wrapped[16..32]);
        assert_eq!(wrapped[16..32], wrapped[32..48]);
        assert_eq!(wrapped, wrap_blocks(&data, &key).unwrap());
    }

    #[test]
    fn test_wrap_rejects_partial_block() {
        let key = [0u8; 16];
        assert!(matches!(
            wrap_blocks(&[0u8; 15], &key),
            Err(CryptoError::InvalidLength { len: 15, block: 16 })
        ));
        assert!(matches!(
            unwrap_blocks(&[0u8; 33], &key),
            Err(CryptoError::InvalidLength { len: 33, .. })
        ));
    }

    #[test]
    fn test_wrap_empty_is_empty() {
        assert!(wrap_blocks(&[], &[7u8; 16]).unwrap().is_empty());
    }

    #[test]
    fn test_random_keys_differ() {
        assert_ne!(generate_random_key(), generate_random_key());
    }

    proptest! {
        #[test]
        fn wrap_unwrap_roundtrip(
            key in any::<[u8; 16]>(),
            blocks in proptest::collection::vec(any::<[u8; 16]>(), 1..8),
        ) {
            let data: Vec<u8> = blocks.concat();
            let wrapped = wrap_blocks(&data, &key).unwrap();
            prop_assert_eq!(wrapped.len(), data.len());
            prop_assert_eq!(unwrap_blocks(&wrapped, &key).unwrap(), data);
        }
    }
}
