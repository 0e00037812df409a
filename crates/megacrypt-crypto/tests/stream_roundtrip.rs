//! Integration tests for whole-file encryption and verified decryption.
//!
//! Covers multi-chunk streams, node key publication through the master key,
//! tamper detection, and file-backed sources.

use std::io::{Read, Write};

use megacrypt_chunks::ChunkPlan;
use megacrypt_crypto::{
    decrypt_bytes, encrypt_bytes, CryptoError, DecryptStream, EncryptStream, FileKey, Iv,
    MasterKey, NodeKey,
};
use tempfile::TempDir;

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(31) ^ (i >> 11)) as u8)
        .collect()
}

fn read_all_in_steps<R: Read>(reader: &mut R, step: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; step];
    loop {
        let n = reader.read(&mut buf).expect("read");
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

#[test]
fn multi_chunk_roundtrip() {
    // 5 MiB covers the whole ramp plus a tail chunk
    let data = make_data(5 * 1024 * 1024);
    assert_eq!(ChunkPlan::new(data.len() as u64).chunk_count(), 9);

    let (ciphertext, summary) = encrypt_bytes(&data).unwrap();
    assert_eq!(ciphertext.len(), data.len());

    let plaintext = decrypt_bytes(&ciphertext, &summary.node_key()).unwrap();
    assert_eq!(plaintext, data);
}

#[test]
fn boundary_aligned_lengths_roundtrip() {
    for length in [131_072usize, 393_216, 4_718_592, 4_718_593, 131_071] {
        let data = make_data(length);
        let (ciphertext, summary) = encrypt_bytes(&data).unwrap();
        assert_eq!(
            decrypt_bytes(&ciphertext, &summary.node_key()).unwrap(),
            data,
            "length {length}"
        );
    }
}

#[test]
fn read_size_does_not_affect_ciphertext_or_mac() {
    let data = make_data(1_500_000);
    let key = FileKey::from_bytes([0x5C; 16]);
    let iv = Iv::from_bytes([9, 8, 7, 6, 5, 4, 3, 2]);

    let mut outputs = Vec::new();
    for step in [1_048_576usize, 65_536, 4_095, 13] {
        let mut stream =
            EncryptStream::with_key(data.as_slice(), data.len() as u64, key.clone(), iv);
        let ciphertext = read_all_in_steps(&mut stream, step);
        let summary = stream.finish().unwrap();
        outputs.push((ciphertext, summary.meta_mac));
    }

    for pair in outputs.windows(2) {
        assert_eq!(pair[0], pair[1]);
    }
}

#[test]
fn node_key_published_through_master_key() {
    let master = MasterKey::from_bytes([0x21; 16]);
    let data = make_data(777_777);
    let (ciphertext, summary) = encrypt_bytes(&data).unwrap();

    let wrapped = summary.node_key().wrap(&master).unwrap();
    assert_eq!(wrapped.len(), 32);

    let node_key = NodeKey::unwrap(&wrapped, &master).unwrap();
    assert_eq!(node_key.meta_mac, summary.meta_mac);
    assert_eq!(decrypt_bytes(&ciphertext, &node_key).unwrap(), data);
}

#[test]
fn tamper_in_last_chunk_is_detected() {
    let data = make_data(3 * 1024 * 1024 + 5);
    let (mut ciphertext, summary) = encrypt_bytes(&data).unwrap();
    let last = ciphertext.len() - 1;
    ciphertext[last] ^= 0x80;

    assert!(matches!(
        decrypt_bytes(&ciphertext, &summary.node_key()),
        Err(CryptoError::IntegrityViolation)
    ));
}

#[test]
fn tamper_in_first_chunk_is_detected() {
    let data = make_data(600_000);
    let (mut ciphertext, summary) = encrypt_bytes(&data).unwrap();
    ciphertext[17] ^= 0x01;

    let mut stream = DecryptStream::from_node_key(
        ciphertext.as_slice(),
        ciphertext.len() as u64,
        summary.node_key(),
    );
    let plaintext = read_all_in_steps(&mut stream, 10_000);
    // CTR keeps the damage local to the flipped byte
    assert_eq!(plaintext[17], data[17] ^ 0x01);
    assert_eq!(plaintext[18..], data[18..]);
    assert!(matches!(
        stream.finish(),
        Err(CryptoError::IntegrityViolation)
    ));
}

#[test]
fn swapped_iv_is_detected() {
    let data = make_data(40_000);
    let (ciphertext, summary) = encrypt_bytes(&data).unwrap();
    let mut node_key = summary.node_key();
    node_key.iv = Iv::from_bytes([0xEE; 8]);

    assert!(decrypt_bytes(&ciphertext, &node_key).is_err());
}

#[test]
fn integrity_failure_converts_to_invalid_data() {
    let data = make_data(64);
    let (mut ciphertext, summary) = encrypt_bytes(&data).unwrap();
    ciphertext[0] ^= 0xFF;
    let mut stream = DecryptStream::from_node_key(&ciphertext[..], 64, summary.node_key());

    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    let err: std::io::Error = stream.finish().unwrap_err().into();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    let inner = err.into_inner().unwrap();
    assert!(matches!(
        inner.downcast_ref::<CryptoError>(),
        Some(CryptoError::IntegrityViolation)
    ));
}

#[test]
fn file_backed_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let plain_path = tmp.path().join("plain.bin");
    let cipher_path = tmp.path().join("cipher.bin");
    let data = make_data(2_345_678);
    std::fs::write(&plain_path, &data).unwrap();

    let source = std::fs::File::open(&plain_path).unwrap();
    let mut encrypt = EncryptStream::new(source, data.len() as u64);
    let mut sink = std::fs::File::create(&cipher_path).unwrap();
    std::io::copy(&mut encrypt, &mut sink).unwrap();
    sink.flush().unwrap();
    let summary = encrypt.finish().unwrap();

    let source = std::fs::File::open(&cipher_path).unwrap();
    let length = source.metadata().unwrap().len();
    assert_eq!(length, data.len() as u64);

    let mut decrypt = DecryptStream::from_node_key(source, length, summary.node_key());
    let mut plaintext = Vec::new();
    decrypt.read_to_end(&mut plaintext).unwrap();
    decrypt.finish().unwrap();
    assert_eq!(plaintext, data);
}

#[tokio::test]
async fn async_file_backed_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let plain_path = tmp.path().join("plain.bin");
    let data = make_data(1_200_000);
    tokio::fs::write(&plain_path, &data).await.unwrap();

    let source = tokio::fs::File::open(&plain_path).await.unwrap();
    let mut encrypt = EncryptStream::new(source, data.len() as u64);
    let mut ciphertext = Vec::new();
    let mut buf = vec![0u8; 65_536];
    loop {
        let n = encrypt.read_async(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        ciphertext.extend_from_slice(&buf[..n]);
    }
    let summary = encrypt.finish().unwrap();

    let cipher_path = tmp.path().join("cipher.bin");
    tokio::fs::write(&cipher_path, &ciphertext).await.unwrap();
    let source = tokio::fs::File::open(&cipher_path).await.unwrap();
    let mut decrypt =
        DecryptStream::from_node_key(source, ciphertext.len() as u64, summary.node_key());
    let mut plaintext = Vec::new();
    let mut buf = vec![0u8; 1_000];
    loop {
        let n = decrypt.read_async(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        plaintext.extend_from_slice(&buf[..n]);
    }
    decrypt.finish().unwrap();
    assert_eq!(plaintext, data);
}
