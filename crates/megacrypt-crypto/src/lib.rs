//! megacrypt-crypto: client-side encryption for MEGA-style cloud storage
//!
//! Architecture: per-file AES-128 key, CTR keystream, chained CBC-MAC per chunk
//!
//! Pipeline (upload): plaintext → CTR encrypt (file key, IV ‖ block counter)
//!   → CBC-MAC over plaintext per chunk → fold chunk MACs → 8-byte meta-MAC
//!
//! Key hierarchy:
//! ```text
//! Master Key (128-bit, supplied by the login layer)
//!   ├── Node keys (wrapped block-wise under the master key)
//!   │   └── File Key (128-bit) + IV (64-bit) + Meta-MAC (64-bit), packed into 32 bytes
//!   └── RSA private key (wrapped block-wise; four MPI components p, q, d, u)
//! ```
//!
//! Chunk boundaries come from `megacrypt_chunks::ChunkPlan`; they only depend
//! on the stream length.

pub mod b64;
pub mod block;
pub mod error;
pub mod keys;
pub mod mac;
pub mod mpi;
pub mod rsa_key;
pub mod stream;

pub use block::{
    encrypt_single_block, generate_random_key, unwrap_blocks, wrap_blocks, BlockCipher,
};
pub use error::{CryptoError, CryptoResult};
pub use keys::{
    generate_file_key, generate_iv, unwrap_folder_key, wrap_folder_key, FileKey, Iv, MasterKey,
    MetaMac, NodeKey,
};
pub use mpi::{decode_length_prefixed, encode_length_prefixed};
pub use rsa_key::{decrypt, recover_components, RsaPrivateComponents};
pub use stream::{
    decrypt_bytes, encrypt_bytes, CipherEngine, DecryptStream, Direction, EncryptStream,
    StreamSummary,
};

/// Arbitrary-precision unsigned integer used for RSA components
pub use ::rsa::BigUint;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Size of a file or master key in bytes (128-bit)
pub const KEY_SIZE: usize = 16;

/// Size of the stream IV / nonce half in bytes
pub const IV_SIZE: usize = 8;

/// Size of the folded meta-MAC in bytes
pub const META_MAC_SIZE: usize = 8;

/// Size of a packed file node key (key ‖ IV ‖ meta-MAC, obfuscated)
pub const NODE_KEY_SIZE: usize = 32;

/// Default size of the decrypt direction's processing buffer
pub const DEFAULT_DECRYPT_BUFFER: usize = 65_536;
