//! Circular history buffer: fixed-capacity samples with attached timestamps.
//!
//! `History` stores `length`-wide vectors of a single [`DataType`] in a flat
//! `Vec<Scalar>`, plus a parallel timestamp per logical slot. `position` is
//! the physical index of the most recently written sample, or `-1` if
//! nothing has been written yet. "`k` samples in the past" is
//! `(position - k + size) mod size`.

use crate::error::CoreError;
use crate::scalar::{DataType, Scalar};
use std::fmt;

/// A point in time, as handed in by the transport. Opaque to the core: the
/// only operation the engine performs on it is carrying it alongside its
/// sample through reads, writes, and resizes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timestamp(pub f64);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct History {
    size: usize,
    length: usize,
    element_type: DataType,
    position: i64,
    samples: Vec<Scalar>,
    timestamps: Vec<Timestamp>,
}

impl History {
    /// Create a history of `size` slots, each a `length`-wide vector of
    /// `element_type`. Starts empty (`position == -1`), all slots zeroed.
    pub fn new(size: usize, length: usize, element_type: DataType) -> Result<History, CoreError> {
        if size == 0 || length == 0 {
            return Err(CoreError::ZeroSizedHistory);
        }
        Ok(History {
            size,
            length,
            element_type,
            position: -1,
            samples: vec![Scalar::zero(element_type); size * length],
            timestamps: vec![Timestamp::default(); size],
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn element_type(&self) -> DataType {
        self.element_type
    }

    /// `-1` if nothing has ever been written.
    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn has_data(&self) -> bool {
        self.position >= 0
    }

    /// Resolve the physical slot for `k` samples in the past (`k == 0` is
    /// "now"). Before anything has been written, `position` is treated as
    /// `0`: every slot is still zero-initialized, so reading "in the past"
    /// from an empty history yields the zero sample rather than panicking
    /// (an expression like `y = x + y{-1}` must be readable on its very
    /// first sample). Panics if `k` is out of `[0, size)`; callers are
    /// expected to have validated history depth at compile time (see
    /// `CompiledExpression::input_history_size`).
    fn slot(&self, k: i64) -> usize {
        debug_assert!((0..self.size as i64).contains(&k), "history index out of range");
        (self.position.max(0) - k).rem_euclid(self.size as i64) as usize
    }

    /// Read the `length`-wide vector `k` samples in the past.
    pub fn read(&self, k: i64) -> &[Scalar] {
        let slot = self.slot(k);
        &self.samples[slot * self.length..(slot + 1) * self.length]
    }

    pub fn read_timestamp(&self, k: i64) -> Timestamp {
        self.timestamps[self.slot(k)]
    }

    /// Advance `position` by one slot (wrapping) without writing a sample.
    /// Used by the connection processor, which advances the destination
    /// position before the mode-specific write so assignment tokens with a
    /// `history_index != 0` land relative to the new "now".
    pub fn advance(&mut self) {
        self.position = if self.position < 0 {
            0
        } else {
            (self.position + 1) % self.size as i64
        };
    }

    /// Undo a bare `advance()` (used when evaluation is suppressed and the
    /// destination must not appear to have moved).
    pub fn rollback(&mut self) {
        if self.position == 0 {
            // We can't distinguish "just advanced from -1" from "wrapped
            // from size-1"; the connection processor only ever rolls back
            // an advance it just performed, within the same call, so this
            // is always the former.
            self.position = -1;
        } else {
            self.position -= 1;
        }
    }

    /// Write `sample` (length `self.length`) at the current `position`
    /// (call `advance()` first to move to a fresh slot).
    pub fn write_current(&mut self, sample: &[Scalar], ts: Timestamp) -> Result<(), CoreError> {
        if sample.len() != self.length {
            return Err(CoreError::LengthMismatch {
                expected: self.length,
                actual: sample.len(),
            });
        }
        let slot = self.position.max(0) as usize;
        self.samples[slot * self.length..(slot + 1) * self.length].copy_from_slice(sample);
        self.timestamps[slot] = ts;
        Ok(())
    }

    /// Write one lane of the current sample (used by the evaluator's
    /// per-lane assignment step).
    pub fn write_lane(&mut self, index: usize, value: Scalar) {
        let slot = self.position.max(0) as usize;
        self.samples[slot * self.length + index] = value;
    }

    /// Write one lane `k` samples in the past, without moving `position`.
    /// Used for one-shot history-initializer assignments (`y{-1} = 0`),
    /// which seed a slot the normal "now" write hasn't reached yet.
    pub fn write_lane_at(&mut self, k: i64, index: usize, value: Scalar) {
        let slot = self.slot(k);
        self.samples[slot * self.length + index] = value;
    }

    pub fn read_current_mut_lane(&self, index: usize) -> Scalar {
        let slot = self.position.max(0) as usize;
        self.samples[slot * self.length + index]
    }

    /// The `length`-wide slice at the current position, mutable in place.
    /// Used by boundary enforcement, which adjusts lanes of the sample the
    /// mode branch just produced without reshaping the buffer.
    pub fn current_mut(&mut self) -> &mut [Scalar] {
        let slot = self.position.max(0) as usize;
        &mut self.samples[slot * self.length..(slot + 1) * self.length]
    }

    pub fn current_timestamp(&self) -> Timestamp {
        self.timestamps[self.position.max(0) as usize]
    }

    pub fn set_current_timestamp(&mut self, ts: Timestamp) {
        let slot = self.position.max(0) as usize;
        self.timestamps[slot] = ts;
    }

    /// Push a whole new sample: advance, then write.
    pub fn push(&mut self, sample: &[Scalar], ts: Timestamp) -> Result<(), CoreError> {
        self.advance();
        self.write_current(sample, ts)
    }

    /// Resize to `new_size` slots, preserving the last `min(size, new_size)`
    /// logical samples (and their timestamps) in the same logical order.
    ///
    /// The reference C implementation distinguishes an in-place append (for
    /// growth), a single contiguous memcpy (for a shrink whose surviving
    /// tail doesn't wrap), and a full reallocation-with-copy (the general
    /// shrink case) purely as allocation-cost optimizations; because a
    /// naive in-place append does not relocate wrapped data, it silently
    /// desyncs historical reads when growth happens at a non-terminal
    /// write position. This implementation always reindexes into the new
    /// buffer directly, which is the one behavior guaranteed by every case
    /// in the original and is the round-trip law this type must uphold.
    pub fn resize(&mut self, new_size: usize) -> Result<(), CoreError> {
        if new_size == 0 {
            return Err(CoreError::ZeroSizedHistory);
        }
        if new_size == self.size {
            return Ok(());
        }

        let keep = self.size.min(new_size);
        let mut new_samples = vec![Scalar::zero(self.element_type); new_size * self.length];
        let mut new_timestamps = vec![Timestamp::default(); new_size];

        if self.position >= 0 && keep > 0 {
            for k in 0..keep as i64 {
                let old_slot = self.slot(k);
                // newest (k == 0) lands at the new logical head `keep - 1`;
                // oldest kept sample lands at `0`.
                let new_slot = keep - 1 - k as usize;
                new_samples[new_slot * self.length..(new_slot + 1) * self.length]
                    .copy_from_slice(&self.samples[old_slot * self.length..(old_slot + 1) * self.length]);
                new_timestamps[new_slot] = self.timestamps[old_slot];
            }
        }

        self.samples = new_samples;
        self.timestamps = new_timestamps;
        self.position = if self.position < 0 || keep == 0 {
            -1
        } else {
            keep as i64 - 1
        };
        self.size = new_size;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_i32(h: &mut History, v: i32) {
        h.push(&[Scalar::Int32(v)], Timestamp(v as f64)).unwrap();
    }

    #[test]
    fn read_k_samples_back() {
        let mut h = History::new(4, 1, DataType::Int32).unwrap();
        for v in [1, 2, 3, 4, 5] {
            push_i32(&mut h, v);
        }
        assert_eq!(h.read(0), &[Scalar::Int32(5)]);
        assert_eq!(h.read(1), &[Scalar::Int32(4)]);
        assert_eq!(h.read(3), &[Scalar::Int32(2)]);
    }

    #[test]
    fn resize_growing_preserves_order() {
        let mut h = History::new(3, 1, DataType::Int32).unwrap();
        for v in [10, 20, 30] {
            push_i32(&mut h, v);
        }
        h.resize(6).unwrap();
        assert_eq!(h.read(0), &[Scalar::Int32(30)]);
        assert_eq!(h.read(1), &[Scalar::Int32(20)]);
        assert_eq!(h.read(2), &[Scalar::Int32(10)]);
    }

    #[test]
    fn resize_shrinking_preserves_recent_order() {
        let mut h = History::new(5, 1, DataType::Int32).unwrap();
        for v in [1, 2, 3, 4, 5] {
            push_i32(&mut h, v);
        }
        h.resize(2).unwrap();
        assert_eq!(h.read(0), &[Scalar::Int32(5)]);
        assert_eq!(h.read(1), &[Scalar::Int32(4)]);
    }

    #[test]
    fn resize_after_wraparound_keeps_logical_order() {
        let mut h = History::new(3, 1, DataType::Int32).unwrap();
        for v in [1, 2, 3, 4, 5] {
            // writes wrap around the 3-slot buffer several times
            push_i32(&mut h, v);
        }
        h.resize(5).unwrap();
        assert_eq!(h.read(0), &[Scalar::Int32(5)]);
        assert_eq!(h.read(1), &[Scalar::Int32(4)]);
        assert_eq!(h.read(2), &[Scalar::Int32(3)]);
    }

    #[test]
    fn rollback_undoes_advance() {
        let mut h = History::new(3, 1, DataType::Int32).unwrap();
        push_i32(&mut h, 1);
        h.advance();
        h.rollback();
        assert_eq!(h.read(0), &[Scalar::Int32(1)]);
    }
}
