//! Chunked CTR streams with a chained plaintext MAC
//!
//! Both directions share one [`CipherEngine`]:
//! ```text
//! keystream block n = AES(file_key, IV ‖ n as u64 big-endian)
//! output            = input XOR keystream
//! chunk MAC        ^= plaintext byte, re-encrypted after every block
//! ```
//! At every chunk boundary from [`ChunkPlan`] the chunk MAC is folded into
//! the file MAC and restarted. The engine works at byte granularity, so a
//! caller may read in any request size; the result is identical to
//! processing whole 16-byte blocks.
//!
//! Streams are forward-only. `finish()` performs the final fold once and
//! either publishes (encrypt) or verifies (decrypt) the meta-MAC. Decrypted
//! bytes handed out before `finish()` succeeds are unverified.
//!
//! A stream must not be reused after a failed transfer: open a new one with
//! fresh counter and MAC state against a fresh source.

use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use megacrypt_chunks::ChunkPlan;
use tracing::{debug, trace, warn};

use crate::block::BlockCipher;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{generate_file_key, generate_iv, FileKey, Iv, MetaMac, NodeKey};
use crate::mac::MacState;
use crate::{BLOCK_SIZE, DEFAULT_DECRYPT_BUFFER, IV_SIZE};

/// Which side of the XOR is plaintext. The MAC always covers plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Input is plaintext
    Encrypt,
    /// Output is plaintext
    Decrypt,
}

/// Sequential CTR + chunk-MAC transform over a stream of known length.
pub struct CipherEngine {
    direction: Direction,
    cipher: BlockCipher,
    iv: Iv,
    plan: ChunkPlan,
    next_boundary: usize,
    position: u64,
    // Block counter, equal to position / 16 once a block has started
    counter: u64,
    keystream: [u8; BLOCK_SIZE],
    mac: MacState,
}

impl CipherEngine {
    pub fn new(direction: Direction, file_key: &FileKey, iv: Iv, length: u64) -> Self {
        Self {
            direction,
            cipher: BlockCipher::new(file_key.as_bytes()),
            iv,
            plan: ChunkPlan::new(length),
            next_boundary: 0,
            position: 0,
            counter: 0,
            keystream: [0u8; BLOCK_SIZE],
            mac: MacState::new(iv),
        }
    }

    pub fn iv(&self) -> Iv {
        self.iv
    }

    pub fn length(&self) -> u64 {
        self.plan.length()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn remaining(&self) -> u64 {
        self.length() - self.position
    }

    /// Transform the next stream bytes in place.
    ///
    /// Never processes past the declared length; returns how many bytes of
    /// `data` were transformed.
    pub fn apply(&mut self, data: &mut [u8]) -> usize {
        let count = clamp_len(data.len(), self.remaining());
        let length = self.length();
        let mut done = 0;

        while done < count {
            let offset = (self.position % BLOCK_SIZE as u64) as usize;
            if offset == 0 {
                self.begin_block();
            }
            let take = (BLOCK_SIZE - offset).min(count - done);

            for (i, byte) in data[done..done + take].iter_mut().enumerate() {
                let input = *byte;
                let output = input ^ self.keystream[offset + i];
                *byte = output;
                let plain = match self.direction {
                    Direction::Encrypt => input,
                    Direction::Decrypt => output,
                };
                self.mac.absorb(offset + i, plain);
            }

            done += take;
            self.position += take as u64;
            if self.position % BLOCK_SIZE as u64 == 0 || self.position == length {
                self.mac.seal_block(&self.cipher);
            }
        }

        count
    }

    fn begin_block(&mut self) {
        if self.position == 0 {
            self.mac.start_chunk();
        } else if self.plan.boundaries().get(self.next_boundary) == Some(&self.position) {
            self.mac.fold_chunk(&self.cipher);
            self.mac.start_chunk();
            self.next_boundary += 1;
            trace!(offset = self.position, chunk = self.next_boundary, "chunk boundary");
        }

        let mut counter_block = [0u8; BLOCK_SIZE];
        counter_block[..IV_SIZE].copy_from_slice(self.iv.as_bytes());
        counter_block[IV_SIZE..].copy_from_slice(&self.counter.to_be_bytes());
        self.keystream = self.cipher.encrypt_block(&counter_block);
        self.counter += 1;
    }

    /// Fold the last chunk and derive the meta-MAC. Requires the whole
    /// declared length to have been processed.
    pub fn complete(mut self) -> CryptoResult<MetaMac> {
        let length = self.length();
        if self.position != length {
            return Err(CryptoError::IncompleteStream {
                position: self.position,
                length,
            });
        }
        self.mac.fold_chunk(&self.cipher);
        debug!(
            length,
            chunks = self.mac.chunks_folded(),
            direction = ?self.direction,
            "stream complete"
        );
        Ok(self.mac.meta_mac())
    }
}

impl std::fmt::Debug for CipherEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherEngine")
            .field("direction", &self.direction)
            .field("position", &self.position)
            .field("length", &self.length())
            .field("mac", &self.mac)
            .finish_non_exhaustive()
    }
}

/// Key material and integrity value of a completed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub file_key: FileKey,
    pub iv: Iv,
    pub meta_mac: MetaMac,
}

impl StreamSummary {
    pub fn node_key(&self) -> NodeKey {
        NodeKey {
            file_key: self.file_key.clone(),
            iv: self.iv,
            meta_mac: self.meta_mac,
        }
    }
}

/// Upload direction: reads plaintext from `source`, yields ciphertext.
pub struct EncryptStream<R> {
    source: R,
    engine: CipherEngine,
    file_key: FileKey,
}

impl<R> EncryptStream<R> {
    /// Encrypt `length` bytes of `source` under a fresh random key and IV.
    pub fn new(source: R, length: u64) -> Self {
        Self::with_key(source, length, generate_file_key(), generate_iv())
    }

    pub fn with_key(source: R, length: u64, file_key: FileKey, iv: Iv) -> Self {
        debug!(length, "opening encrypt stream");
        let engine = CipherEngine::new(Direction::Encrypt, &file_key, iv, length);
        Self {
            source,
            engine,
            file_key,
        }
    }

    pub fn length(&self) -> u64 {
        self.engine.length()
    }

    pub fn position(&self) -> u64 {
        self.engine.position()
    }

    pub fn file_key(&self) -> &FileKey {
        &self.file_key
    }

    pub fn iv(&self) -> Iv {
        self.engine.iv()
    }

    /// Complete the stream and return the values to publish with the node.
    pub fn finish(self) -> CryptoResult<StreamSummary> {
        let iv = self.engine.iv();
        let meta_mac = self.engine.complete()?;
        Ok(StreamSummary {
            file_key: self.file_key,
            iv,
            meta_mac,
        })
    }
}

impl<R: Read> Read for EncryptStream<R> {
    /// Pulls the requested amount from the source (fewer at end of input or
    /// when the source fails part way), then encrypts the span in one pass.
    ///
    /// A source error is only returned when no byte was pulled; otherwise the
    /// bytes already read are encrypted and returned, and the error shows up
    /// again on the next call.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let want = clamp_len(buf.len(), self.engine.remaining());
        let mut filled = 0;
        while filled < want {
            match self.source.read(&mut buf[filled..want]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) if filled > 0 => break,
                Err(e) => return Err(e),
            }
        }
        Ok(self.engine.apply(&mut buf[..filled]))
    }
}

#[cfg(feature = "async")]
impl<R: tokio::io::AsyncRead + Unpin> EncryptStream<R> {
    /// Async counterpart of `Read::read`.
    ///
    /// Issues a single source read per call and encrypts whatever it
    /// returned, so the only await point holds no pulled bytes: a dropped
    /// future or a source error loses nothing and the call can be retried.
    pub async fn read_async(&mut self, buf: &mut [u8]) -> CryptoResult<usize> {
        use tokio::io::AsyncReadExt;

        let want = clamp_len(buf.len(), self.engine.remaining());
        if want == 0 {
            return Ok(0);
        }
        let filled = self.source.read(&mut buf[..want]).await?;
        Ok(self.engine.apply(&mut buf[..filled]))
    }
}

/// Download direction: reads ciphertext from `source`, yields plaintext.
///
/// Ciphertext is decrypted one buffer at a time; reads are served from the
/// most recently decrypted buffer.
pub struct DecryptStream<R> {
    source: R,
    engine: CipherEngine,
    file_key: FileKey,
    expected: MetaMac,
    buffer: Vec<u8>,
    // Ciphertext bytes gathered for the next buffer, not yet decrypted
    pending: usize,
    cursor: usize,
    filled: usize,
    delivered: u64,
}

impl<R> DecryptStream<R> {
    /// `length` is the ciphertext length, which equals the plaintext length.
    pub fn new(source: R, length: u64, file_key: FileKey, iv: Iv, expected: MetaMac) -> Self {
        debug!(length, "opening decrypt stream");
        let engine = CipherEngine::new(Direction::Decrypt, &file_key, iv, length);
        Self {
            source,
            engine,
            file_key,
            expected,
            buffer: vec![0u8; DEFAULT_DECRYPT_BUFFER],
            pending: 0,
            cursor: 0,
            filled: 0,
            delivered: 0,
        }
    }

    pub fn from_node_key(source: R, length: u64, node_key: NodeKey) -> Self {
        Self::new(
            source,
            length,
            node_key.file_key,
            node_key.iv,
            node_key.meta_mac,
        )
    }

    /// Change the processing buffer size. Only meaningful before the first read.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        if self.delivered == 0 && self.filled == 0 && self.pending == 0 {
            self.buffer = vec![0u8; size.max(1)];
        }
        self
    }

    pub fn length(&self) -> u64 {
        self.engine.length()
    }

    /// Plaintext bytes handed to the caller so far
    pub fn position(&self) -> u64 {
        self.delivered
    }

    pub fn file_key(&self) -> &FileKey {
        &self.file_key
    }

    pub fn iv(&self) -> Iv {
        self.engine.iv()
    }

    /// Complete the stream and verify the meta-MAC.
    ///
    /// Fails with [`CryptoError::IntegrityViolation`] when the data does not
    /// match the expected meta-MAC; everything read so far must then be
    /// discarded.
    pub fn finish(self) -> CryptoResult<StreamSummary> {
        let length = self.engine.length();
        if self.delivered != length {
            return Err(CryptoError::IncompleteStream {
                position: self.delivered,
                length,
            });
        }

        let iv = self.engine.iv();
        let computed = self.engine.complete()?;
        if computed != self.expected {
            warn!(length, "meta-MAC mismatch on decrypted stream");
            return Err(CryptoError::IntegrityViolation);
        }
        debug!(length, "meta-MAC verified");

        Ok(StreamSummary {
            file_key: self.file_key,
            iv,
            meta_mac: computed,
        })
    }

    /// Copy already decrypted bytes into `out`.
    fn take_buffered(&mut self, out: &mut [u8]) -> usize {
        let n = (self.filled - self.cursor).min(out.len());
        out[..n].copy_from_slice(&self.buffer[self.cursor..self.cursor + n]);
        self.cursor += n;
        self.delivered += n as u64;
        n
    }

    /// Ciphertext bytes the next buffer must hold before it can be decrypted.
    fn refill_target(&self) -> usize {
        clamp_len(self.buffer.len(), self.engine.remaining())
    }

    /// Decrypt the gathered ciphertext and make it available to readers.
    fn decrypt_pending(&mut self, target: usize) {
        self.engine.apply(&mut self.buffer[..target]);
        self.filled = target;
        self.cursor = 0;
        self.pending = 0;
    }

    fn needs_refill(&self) -> bool {
        self.cursor == self.filled
    }

    fn truncated(&self, target: usize) -> std::io::Error {
        std::io::Error::new(
            ErrorKind::UnexpectedEof,
            format!(
                "ciphertext ended at byte {} of {}",
                self.engine.position() + self.pending as u64,
                self.engine.length().max(self.engine.position() + target as u64)
            ),
        )
    }
}

impl<R: Read> Read for DecryptStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            if self.needs_refill() {
                // Never touch the source once plaintext was handed out
                if written > 0 || self.engine.remaining() == 0 {
                    break;
                }
                let target = self.refill_target();
                while self.pending < target {
                    match self.source.read(&mut self.buffer[self.pending..target]) {
                        Ok(0) => return Err(self.truncated(target)),
                        Ok(n) => self.pending += n,
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e),
                    }
                }
                self.decrypt_pending(target);
            }
            written += self.take_buffered(&mut buf[written..]);
        }
        Ok(written)
    }
}

#[cfg(feature = "async")]
impl<R: tokio::io::AsyncRead + Unpin> DecryptStream<R> {
    /// Async counterpart of `Read::read`.
    ///
    /// Gathered ciphertext survives a dropped future: the next call resumes
    /// filling the same buffer, and decryption only runs once it is complete.
    /// The source is only awaited before any plaintext was copied into `buf`,
    /// so an error or cancellation never swallows delivered bytes.
    pub async fn read_async(&mut self, buf: &mut [u8]) -> CryptoResult<usize> {
        use tokio::io::AsyncReadExt;

        let mut written = 0;
        while written < buf.len() {
            if self.needs_refill() {
                if written > 0 || self.engine.remaining() == 0 {
                    break;
                }
                let target = self.refill_target();
                while self.pending < target {
                    let n = self
                        .source
                        .read(&mut self.buffer[self.pending..target])
                        .await?;
                    if n == 0 {
                        return Err(self.truncated(target).into());
                    }
                    self.pending += n;
                }
                self.decrypt_pending(target);
            }
            written += self.take_buffered(&mut buf[written..]);
        }
        Ok(written)
    }
}

impl<R> std::fmt::Debug for EncryptStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptStream")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl<R> std::fmt::Debug for DecryptStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptStream")
            .field("engine", &self.engine)
            .field("delivered", &self.delivered)
            .field("buffer_size", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

macro_rules! forward_only {
    ($stream:ident) => {
        impl<R> Seek for $stream<R> {
            /// Only reports the current position; any actual move is rejected.
            fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
                match pos {
                    SeekFrom::Current(0) => Ok(self.position()),
                    _ => Err(CryptoError::UnsupportedOperation("seek").into()),
                }
            }
        }

        impl<R> Write for $stream<R> {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(CryptoError::UnsupportedOperation("write").into())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
    };
}

forward_only!(EncryptStream);
forward_only!(DecryptStream);

/// Encrypt a whole buffer under a fresh key.
pub fn encrypt_bytes(plaintext: &[u8]) -> CryptoResult<(Vec<u8>, StreamSummary)> {
    let mut stream = EncryptStream::new(plaintext, plaintext.len() as u64);
    let mut ciphertext = Vec::with_capacity(plaintext.len());
    stream.read_to_end(&mut ciphertext)?;
    let summary = stream.finish()?;
    Ok((ciphertext, summary))
}

/// Decrypt and verify a whole buffer.
pub fn decrypt_bytes(ciphertext: &[u8], node_key: &NodeKey) -> CryptoResult<Vec<u8>> {
    let mut stream =
        DecryptStream::from_node_key(ciphertext, ciphertext.len() as u64, node_key.clone());
    let mut plaintext = Vec::with_capacity(ciphertext.len());
    stream.read_to_end(&mut plaintext)?;
    stream.finish()?;
    Ok(plaintext)
}

fn clamp_len(len: usize, remaining: u64) -> usize {
    usize::try_from(remaining).map_or(len, |r| len.min(r))
}
