//! Recovery of the account RSA private key
//!
//! The private key is stored wrapped block-wise under the master key. Once
//! unwrapped it is four MPIs back to back: `p`, `q`, `d` and a fourth
//! component `u` that decryption does not use. Decryption exponentiates
//! directly modulo `p * q`.

use ::rsa::BigUint;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::block::BlockCipher;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::MasterKey;
use crate::mpi::{decode_length_prefixed, encoded_len};
use crate::BLOCK_SIZE;

/// Components of a recovered private key, in storage order. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaPrivateComponents {
    pub p: BigUint,
    pub q: BigUint,
    pub d: BigUint,
    pub u: BigUint,
}

impl RsaPrivateComponents {
    /// Public modulus `p * q`
    pub fn modulus(&self) -> BigUint {
        &self.p * &self.q
    }

    pub fn decrypt(&self, ciphertext: &BigUint) -> CryptoResult<Vec<u8>> {
        decrypt(ciphertext, &self.p, &self.q, &self.d)
    }

    /// Decrypt a ciphertext that is itself MPI-encoded.
    pub fn decrypt_mpi(&self, encoded: &[u8]) -> CryptoResult<Vec<u8>> {
        let (ciphertext, _) = decode_length_prefixed(encoded)?;
        self.decrypt(&ciphertext)
    }
}

impl Zeroize for RsaPrivateComponents {
    fn zeroize(&mut self) {
        self.p.zeroize();
        self.q.zeroize();
        self.d.zeroize();
        self.u.zeroize();
    }
}

impl Drop for RsaPrivateComponents {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl std::fmt::Debug for RsaPrivateComponents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPrivateComponents")
            .field("p_bits", &self.p.bits())
            .field("q_bits", &self.q.bits())
            .field("d_bits", &self.d.bits())
            .field("u_bits", &self.u.bits())
            .finish()
    }
}

/// Unwrap `wrapped` under the master key and decode its four components.
///
/// The blob is zero-padded to a whole number of blocks first. Each round
/// drops `2 + ceil(bits / 8)` bytes off the front, where `bits` is the
/// header of the component just decoded.
pub fn recover_components(
    wrapped: &[u8],
    master: &MasterKey,
) -> CryptoResult<RsaPrivateComponents> {
    let mut padded = Zeroizing::new(wrapped.to_vec());
    padded.resize(wrapped.len().next_multiple_of(BLOCK_SIZE), 0);

    let plain = Zeroizing::new(BlockCipher::new(master.as_bytes()).unwrap(&padded)?);

    let mut rest: &[u8] = &plain;
    let recovered = RsaPrivateComponents {
        p: take_component(&mut rest, 0)?,
        q: take_component(&mut rest, 1)?,
        d: take_component(&mut rest, 2)?,
        u: take_component(&mut rest, 3)?,
    };
    debug!(
        modulus_bits = recovered.modulus().bits(),
        trailing = rest.len(),
        "recovered RSA private key"
    );
    Ok(recovered)
}

fn take_component(rest: &mut &[u8], index: usize) -> CryptoResult<BigUint> {
    let buf: &[u8] = *rest;
    let (value, _) = decode_length_prefixed(buf).map_err(|e| malformed(index, e))?;
    let consumed = encoded_len(buf).map_err(|e| malformed(index, e))?;
    *rest = &buf[consumed..];
    Ok(value)
}

/// `ciphertext ^ d mod (p * q)` as a minimal big-endian byte string.
pub fn decrypt(
    ciphertext: &BigUint,
    p: &BigUint,
    q: &BigUint,
    d: &BigUint,
) -> CryptoResult<Vec<u8>> {
    let modulus = p * q;
    if modulus.bits() == 0 {
        return Err(CryptoError::MalformedKey("zero RSA modulus".into()));
    }
    Ok(ciphertext.modpow(d, &modulus).to_bytes_be())
}

fn malformed(index: usize, err: CryptoError) -> CryptoError {
    CryptoError::MalformedKey(format!("RSA component {index}: {err}"))
}
