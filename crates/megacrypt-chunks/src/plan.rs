//! Length-derived chunk plan
//!
//! Boundary rule for a stream of `n` bytes:
//!   - Ramp-up: for `idx` in 1..=8, while `cumulative + idx * 128 KiB < n`,
//!     advance by `idx * 128 KiB` and record the offset. The first failing
//!     step ends the ramp.
//!   - Steady state: while `cumulative + 1 MiB < n`, advance by 1 MiB.
//!
//! The first chunk always starts at offset 0, which is not recorded as a
//! boundary. A stream shorter than or equal to 128 KiB has no boundaries and
//! is a single chunk.

use serde::Serialize;

/// Unit of the ramp-up phase (128 KiB)
pub const RAMP_STEP: u64 = 131_072;

/// Number of ramp-up chunks
pub const RAMP_STEPS: u64 = 8;

/// Chunk size once the ramp is over (1 MiB)
pub const STEADY_CHUNK_SIZE: u64 = 1_048_576;

/// A single MAC chunk of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Byte offset within the stream
    pub offset: u64,
    /// Chunk length in bytes
    pub length: u64,
}

/// Chunk boundaries for a stream of known length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkPlan {
    length: u64,
    boundaries: Vec<u64>,
}

impl ChunkPlan {
    pub fn new(length: u64) -> Self {
        let boundaries = compute_boundaries(length);
        tracing::trace!(length, boundaries = boundaries.len(), "computed chunk plan");
        Self { length, boundaries }
    }

    /// Total stream length the plan was computed for
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Offsets at which a new chunk starts, excluding offset 0
    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }

    /// Number of chunks (zero for an empty stream)
    pub fn chunk_count(&self) -> usize {
        if self.length == 0 {
            0
        } else {
            self.boundaries.len() + 1
        }
    }

    /// Every chunk of the stream, in order, covering `0..length` without gaps.
    pub fn spans(&self) -> Vec<Chunk> {
        if self.length == 0 {
            return vec![];
        }
        let mut spans = Vec::with_capacity(self.boundaries.len() + 1);
        let mut start = 0u64;
        for &end in self.boundaries.iter().chain(std::iter::once(&self.length)) {
            spans.push(Chunk {
                offset: start,
                length: end - start,
            });
            start = end;
        }
        spans
    }
}

/// Compute the chunk boundaries for a stream of `length` bytes.
pub fn compute_boundaries(length: u64) -> Vec<u64> {
    let mut boundaries = Vec::new();
    let mut cumulative = 0u64;

    for idx in 1..=RAMP_STEPS {
        let step = idx * RAMP_STEP;
        if !fits_before(cumulative, step, length) {
            break;
        }
        cumulative += step;
        boundaries.push(cumulative);
    }

    while fits_before(cumulative, STEADY_CHUNK_SIZE, length) {
        cumulative += STEADY_CHUNK_SIZE;
        boundaries.push(cumulative);
    }

    boundaries
}

/// `cumulative + step < length`, without overflowing near `u64::MAX`
fn fits_before(cumulative: u64, step: u64, length: u64) -> bool {
    cumulative
        .checked_add(step)
        .map_or(false, |next| next < length)
}
