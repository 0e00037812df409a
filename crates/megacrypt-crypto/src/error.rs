use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid length: {len} bytes is not a multiple of {block}")]
    InvalidLength { len: usize, block: usize },

    #[error("truncated input: needed {needed} bytes, {available} available")]
    TruncatedInput { needed: usize, available: usize },

    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("integrity violation: meta-MAC mismatch, the decrypted data cannot be trusted")]
    IntegrityViolation,

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("stream finished at byte {position} of {length}")]
    IncompleteStream { position: u64, length: u64 },

    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CryptoError> for std::io::Error {
    fn from(err: CryptoError) -> Self {
        use std::io::ErrorKind;

        match err {
            CryptoError::Io(inner) => inner,
            other => {
                let kind = match &other {
                    CryptoError::UnsupportedOperation(_) => ErrorKind::Unsupported,
                    CryptoError::InvalidLength { .. } => ErrorKind::InvalidInput,
                    CryptoError::IncompleteStream { .. } => ErrorKind::UnexpectedEof,
                    CryptoError::TruncatedInput { .. }
                    | CryptoError::MalformedKey(_)
                    | CryptoError::IntegrityViolation
                    | CryptoError::InvalidKeyMaterial(_) => ErrorKind::InvalidData,
                    CryptoError::Io(_) => ErrorKind::Other,
                };
                std::io::Error::new(kind, other)
            }
        }
    }
}
