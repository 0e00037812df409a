//! Key types, file key generation, node key packing and wrapping

use zeroize::{Zeroize, Zeroizing};

use crate::b64;
use crate::block::{generate_random_key, BlockCipher};
use crate::error::{CryptoError, CryptoResult};
use crate::{IV_SIZE, KEY_SIZE, META_MAC_SIZE, NODE_KEY_SIZE};

/// A per-file 128-bit AES key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes = <[u8; KEY_SIZE]>::try_from(bytes).map_err(|_| {
            CryptoError::InvalidKeyMaterial(format!(
                "file key must be {KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The account master key. Zeroized on drop.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parse the URL-safe base64 form handed out by the login layer.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let mut bytes = b64::decode_array::<KEY_SIZE>(encoded)?;
        let key = Self::from_bytes(bytes);
        bytes.zeroize();
        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The 8-byte nonce half of the CTR counter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iv([u8; IV_SIZE]);

impl Iv {
    pub fn from_bytes(bytes: [u8; IV_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }
}

/// Folded 8-byte file MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaMac([u8; META_MAC_SIZE]);

impl MetaMac {
    pub fn from_bytes(bytes: [u8; META_MAC_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; META_MAC_SIZE] {
        &self.0
    }
}

/// Generate a random 128-bit file key.
pub fn generate_file_key() -> FileKey {
    FileKey::from_bytes(generate_random_key())
}

/// Generate a random IV: the first half of a freshly generated key.
pub fn generate_iv() -> Iv {
    let mut key = generate_random_key();
    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&key[..IV_SIZE]);
    key.zeroize();
    Iv(iv)
}

/// Everything needed to decrypt and verify one file.
///
/// Stored in node metadata as 32 bytes:
/// ```text
/// [0..16)  file key XOR (IV ‖ meta-MAC)
/// [16..24) IV
/// [24..32) meta-MAC
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeKey {
    pub file_key: FileKey,
    pub iv: Iv,
    pub meta_mac: MetaMac,
}

impl NodeKey {
    pub fn pack(&self) -> Zeroizing<[u8; NODE_KEY_SIZE]> {
        let mut packed = Zeroizing::new([0u8; NODE_KEY_SIZE]);
        packed[16..24].copy_from_slice(self.iv.as_bytes());
        packed[24..32].copy_from_slice(self.meta_mac.as_bytes());
        for i in 0..KEY_SIZE {
            packed[i] = self.file_key.as_bytes()[i] ^ packed[16 + i];
        }
        packed
    }

    pub fn unpack(packed: &[u8]) -> CryptoResult<Self> {
        if packed.len() != NODE_KEY_SIZE {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "file node key must be {NODE_KEY_SIZE} bytes, got {}",
                packed.len()
            )));
        }

        let mut key = [0u8; KEY_SIZE];
        for i in 0..KEY_SIZE {
            key[i] = packed[i] ^ packed[16 + i];
        }
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&packed[16..24]);
        let mut meta_mac = [0u8; META_MAC_SIZE];
        meta_mac.copy_from_slice(&packed[24..32]);

        let node_key = Self {
            file_key: FileKey::from_bytes(key),
            iv: Iv(iv),
            meta_mac: MetaMac(meta_mac),
        };
        key.zeroize();
        Ok(node_key)
    }

    /// Wrap the packed form under the master key, ready for publication.
    pub fn wrap(&self, master: &MasterKey) -> CryptoResult<Vec<u8>> {
        BlockCipher::new(master.as_bytes()).wrap(self.pack().as_slice())
    }

    /// Recover a file node key from its wrapped form.
    pub fn unwrap(wrapped: &[u8], master: &MasterKey) -> CryptoResult<Self> {
        let packed = Zeroizing::new(BlockCipher::new(master.as_bytes()).unwrap(wrapped)?);
        Self::unpack(&packed)
    }

    /// Parse the URL-safe base64 of a packed (already unwrapped) node key.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let packed = Zeroizing::new(b64::decode(encoded)?);
        Self::unpack(&packed)
    }

    pub fn to_base64(&self) -> String {
        b64::encode(self.pack().as_slice())
    }
}

/// Wrap a 16-byte folder key under the master key.
pub fn wrap_folder_key(folder_key: &FileKey, master: &MasterKey) -> CryptoResult<Vec<u8>> {
    BlockCipher::new(master.as_bytes()).wrap(folder_key.as_bytes())
}

/// Unwrap a 16-byte folder key.
pub fn unwrap_folder_key(wrapped: &[u8], master: &MasterKey) -> CryptoResult<FileKey> {
    let plain = Zeroizing::new(BlockCipher::new(master.as_bytes()).unwrap(wrapped)?);
    FileKey::from_slice(&plain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node_key() -> NodeKey {
        NodeKey {
            file_key: FileKey::from_bytes(*b"0123456789abcdef"),
            iv: Iv::from_bytes(*b"IVIVIVIV"),
            meta_mac: MetaMac::from_bytes(*b"MACMACMA"),
        }
    }

    #[test]
    fn test_file_key_generation() {
        let k1 = generate_file_key();
        let k2 = generate_file_key();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = FileKey::from_bytes([0x41; KEY_SIZE]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("65"));
    }

    #[test]
    fn test_pack_layout() {
        let node_key = sample_node_key();
        let packed = node_key.pack();

        assert_eq!(&packed[16..24], b"IVIVIVIV");
        assert_eq!(&packed[24..32], b"MACMACMA");
        assert_eq!(packed[0], b'0' ^ b'I');
        assert_eq!(packed[15], b'f' ^ b'A');
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let node_key = sample_node_key();
        let unpacked = NodeKey::unpack(node_key.pack().as_slice()).unwrap();
        assert_eq!(unpacked, node_key);
    }

    #[test]
    fn test_unpack_wrong_size() {
        assert!(NodeKey::unpack(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_wrap_unwrap_node_key() {
        let master = MasterKey::from_bytes([42u8; KEY_SIZE]);
        let node_key = sample_node_key();

        let wrapped = node_key.wrap(&master).unwrap();
        assert_eq!(wrapped.len(), NODE_KEY_SIZE);
        assert_eq!(NodeKey::unwrap(&wrapped, &master).unwrap(), node_key);
    }

    #[test]
    fn test_unwrap_wrong_master_yields_different_key() {
        let node_key = sample_node_key();
        let wrapped = node_key.wrap(&MasterKey::from_bytes([1u8; 16])).unwrap();
        let other = NodeKey::unwrap(&wrapped, &MasterKey::from_bytes([2u8; 16])).unwrap();
        assert_ne!(other, node_key);
    }

    #[test]
    fn test_folder_key_roundtrip() {
        let master = MasterKey::from_bytes([3u8; KEY_SIZE]);
        let folder = generate_file_key();

        let wrapped = wrap_folder_key(&folder, &master).unwrap();
        assert_eq!(unwrap_folder_key(&wrapped, &master).unwrap(), folder);
        assert!(unwrap_folder_key(&wrapped[..8], &master).is_err());
    }

    #[test]
    fn test_base64_roundtrip() {
        let node_key = sample_node_key();
        let encoded = node_key.to_base64();
        assert_eq!(encoded.len(), 43);
        assert_eq!(NodeKey::from_base64(&encoded).unwrap(), node_key);

        let master = MasterKey::from_base64(&b64::encode(&[5u8; 16])).unwrap();
        assert_eq!(master.as_bytes(), &[5u8; 16]);
    }
}
