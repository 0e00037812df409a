//! megacrypt-chunks: chunk boundaries for the chained file MAC
//!
//! # Overview
//! - `plan`: the length-only chunk plan. Eight ramp-up chunks of growing size
//!   (128 KiB, 256 KiB, ... 1 MiB) followed by steady 1 MiB chunks.
//!
//! Boundaries depend on nothing but the total stream length, so the uploader
//! and the downloader always agree on where one chunk MAC ends and the next
//! begins.

pub mod plan;

pub use plan::{compute_boundaries, Chunk, ChunkPlan, RAMP_STEP, RAMP_STEPS, STEADY_CHUNK_SIZE};
