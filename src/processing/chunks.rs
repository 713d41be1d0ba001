//! Splitting a video into overlapping reconstruction chunks, and resolving
//! frames back to the chunk that aligned them

use log::debug;
use std::sync::Arc;

use crate::algorithms::similarity::SimilarityTransform;
use crate::core::{FrameNumber, TimeBase};

/// Key frames per chunk
pub const CHUNK_LENGTH: usize = 40;
/// Minimum key frames shared by neighbouring chunks
pub const MIN_OVERLAP: usize = 20;
/// Spacing of key frames in milliseconds
pub const KEY_FRAME_INTERVAL_MS: u32 = 500;

/// Frame displayed closest to `timestamp_ms`.
///
/// Saturates at `FrameNumber::MAX` for a zero numerator.
pub fn frame_close_to(timestamp_ms: u32, time_base: TimeBase) -> FrameNumber {
    let ts = timestamp_ms as f64 / 1000.0;
    let frame = ts * (time_base.denominator as f64 / time_base.numerator as f64);
    (frame.round_ties_even() as FrameNumber).saturating_add(1)
}

/// Key frames every half second up to the timestamp of `last_frame`;
/// none for an invalid time base
pub fn key_frames(time_base: TimeBase, last_frame: FrameNumber) -> Vec<FrameNumber> {
    if !time_base.is_valid() {
        debug!("time base {}/{} has a zero part, no key frames", time_base.numerator, time_base.denominator);
        return Vec::new();
    }
    let last_pts = time_base.numerator as u64 * last_frame.saturating_sub(1) as u64;
    let last_ms = (last_pts as f64 / time_base.denominator as f64 * 1000.0) as u32;

    (0..last_ms)
        .step_by(KEY_FRAME_INTERVAL_MS as usize)
        .map(|ms| frame_close_to(ms, time_base))
        .collect()
}

/// Number of chunks and their overlap for `length` key frames
fn chunk_parameters(length: usize) -> (usize, usize) {
    if length <= CHUNK_LENGTH {
        return (1, 0);
    }

    let mut chunks = length / CHUNK_LENGTH;
    loop {
        chunks += 1;
        let overlap = (chunks * CHUNK_LENGTH - length) / (chunks - 1);
        if overlap >= MIN_OVERLAP {
            return (chunks, overlap);
        }
    }
}

/// Key frames of each chunk to reconstruct.
///
/// Every chunk holds [`CHUNK_LENGTH`] key frames (fewer only when the whole
/// video is shorter) and overlaps its neighbour by at least [`MIN_OVERLAP`].
pub fn plan_chunks(time_base: TimeBase, last_frame: FrameNumber) -> Vec<Vec<FrameNumber>> {
    let frames = key_frames(time_base, last_frame);
    if frames.is_empty() {
        return Vec::new();
    }

    let (count, overlap) = chunk_parameters(frames.len());
    let step = CHUNK_LENGTH - overlap;
    let last_start = frames.len().saturating_sub(CHUNK_LENGTH);

    let chunks: Vec<Vec<FrameNumber>> = (0..count)
        .map(|chunk| {
            let start = (chunk * step).min(last_start);
            frames[start..(start + CHUNK_LENGTH).min(frames.len())].to_vec()
        })
        .collect();

    debug!(
        "{} key frames planned as {} chunks overlapping by {}",
        frames.len(),
        chunks.len(),
        overlap
    );
    chunks
}

/// Aligned chunk covering `[first_frame, last_frame]`
#[derive(Debug, Clone)]
pub struct AlignedChunk {
    pub first_frame: FrameNumber,
    pub last_frame: FrameNumber,
    pub transform: Arc<SimilarityTransform>,
}

impl AlignedChunk {
    pub fn contains(&self, frame: FrameNumber) -> bool {
        frame >= self.first_frame && frame <= self.last_frame
    }
}

/// Independently aligned, temporally overlapping chunks in playback order
#[derive(Debug, Clone, Default)]
pub struct ChunkSequence {
    chunks: Vec<AlignedChunk>,
}

impl ChunkSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, first_frame: FrameNumber, last_frame: FrameNumber, transform: Arc<SimilarityTransform>) {
        self.chunks.push(AlignedChunk {
            first_frame,
            last_frame,
            transform,
        });
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Index of the first chunk whose range holds `frame`
    pub fn position_of(&self, frame: FrameNumber) -> Option<usize> {
        self.chunks.iter().position(|chunk| chunk.contains(frame))
    }

    /// First chunk whose range holds `frame`
    pub fn chunk_for(&self, frame: FrameNumber) -> Option<&AlignedChunk> {
        self.position_of(frame).map(|idx| &self.chunks[idx])
    }
}

/// Tracks the chunk playback is in and reports when it changes
#[derive(Debug, Default)]
pub struct ChunkTracker {
    active: Option<usize>,
}

impl ChunkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Transform to re-apply to the shared anchor, if `frame` entered a
    /// different chunk than the previous frame.
    ///
    /// Frames outside every chunk keep the current chunk active.
    pub fn update(&mut self, sequence: &ChunkSequence, frame: FrameNumber) -> Option<Arc<SimilarityTransform>> {
        let idx = sequence.position_of(frame)?;
        if self.active == Some(idx) {
            return None;
        }
        debug!("frame {} enters chunk {}", frame, idx);
        self.active = Some(idx);
        Some(Arc::clone(&sequence.chunks[idx].transform))
    }
}
