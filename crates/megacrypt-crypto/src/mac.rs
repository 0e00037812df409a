//! Chained chunk MAC
//!
//! Within a chunk the MAC is a CBC-MAC over the plaintext: each 16-byte block
//! is XORed into the running value, which is then encrypted under the file
//! key. A chunk MAC starts from `IV ‖ IV`. Completed chunk MACs are chained
//! into the file MAC the same way (XOR, then encrypt), and the file MAC
//! folds into the 8-byte meta-MAC once the stream is done.

use crate::block::BlockCipher;
use crate::keys::{Iv, MetaMac};
use crate::{BLOCK_SIZE, IV_SIZE, META_MAC_SIZE};

/// MAC accumulators owned by one cipher stream.
#[derive(Clone)]
pub struct MacState {
    iv: Iv,
    chunk_mac: [u8; BLOCK_SIZE],
    file_mac: [u8; BLOCK_SIZE],
    chunks_folded: u64,
}

impl MacState {
    pub fn new(iv: Iv) -> Self {
        Self {
            iv,
            chunk_mac: [0u8; BLOCK_SIZE],
            file_mac: [0u8; BLOCK_SIZE],
            chunks_folded: 0,
        }
    }

    /// Reset the chunk MAC to `IV ‖ IV`.
    pub fn start_chunk(&mut self) {
        self.chunk_mac[..IV_SIZE].copy_from_slice(self.iv.as_bytes());
        self.chunk_mac[IV_SIZE..].copy_from_slice(self.iv.as_bytes());
    }

    /// XOR one plaintext byte into the chunk MAC at its offset within the block.
    #[inline]
    pub fn absorb(&mut self, offset_in_block: usize, plain: u8) {
        self.chunk_mac[offset_in_block] ^= plain;
    }

    /// Close the current (possibly short) block.
    pub fn seal_block(&mut self, cipher: &BlockCipher) {
        cipher.encrypt_block_in_place(&mut self.chunk_mac);
    }

    /// Chain the finished chunk MAC into the file MAC.
    pub fn fold_chunk(&mut self, cipher: &BlockCipher) {
        for (f, c) in self.file_mac.iter_mut().zip(self.chunk_mac.iter()) {
            *f ^= c;
        }
        cipher.encrypt_block_in_place(&mut self.file_mac);
        self.chunks_folded += 1;
    }

    pub fn chunks_folded(&self) -> u64 {
        self.chunks_folded
    }

    pub fn file_mac(&self) -> &[u8; BLOCK_SIZE] {
        &self.file_mac
    }

    /// Fold the file MAC: `m[i] = f[i] ^ f[i + 4]`, `m[i + 4] = f[i + 8] ^ f[i + 12]`.
    pub fn meta_mac(&self) -> MetaMac {
        let f = &self.file_mac;
        let mut m = [0u8; META_MAC_SIZE];
        for i in 0..4 {
            m[i] = f[i] ^ f[i + 4];
            m[i + 4] = f[i + 8] ^ f[i + 12];
        }
        MetaMac::from_bytes(m)
    }
}

impl std::fmt::Debug for MacState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacState")
            .field("chunks_folded", &self.chunks_folded)
            .finish_non_exhaustive()
    }
}
