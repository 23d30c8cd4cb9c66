//! Signal-owned (input-side) history (§3's supplement): shared across
//! every connection sinking from the same signal, grown but never shrunk.
//!
//! A connection's own destination history (`Connection::output`) is the
//! asymmetric counterpart: exclusively owned, and reset to empty on any
//! reallocation (§4.7). This type only ever grows in place, mirroring
//! `reallocate_connection_histories`'s no-op-on-shrink-for-input behavior.

use crate::error::ApplyError;
use mapper_core::{CoreError, DataType, History, Scalar, Timestamp};
use std::cell::RefCell;
use std::rc::Rc;

/// A signal's input history, reference-counted so every connection
/// reading from this signal sees the same samples.
#[derive(Debug, Clone)]
pub struct SignalHistory(Rc<RefCell<History>>);

impl SignalHistory {
    pub fn new(size: usize, length: usize, element_type: DataType) -> Result<SignalHistory, CoreError> {
        Ok(SignalHistory(Rc::new(RefCell::new(History::new(size, length, element_type)?))))
    }

    /// Push a newly-arrived sample, advancing the shared history. §6's
    /// signal-update interface: writing an `f`/`d` sample into an
    /// `i32`-typed signal is rejected rather than silently truncated;
    /// narrower-integer-into-wider-float is always permitted.
    pub fn push(&self, sample: &[Scalar], ts: Timestamp) -> Result<(), ApplyError> {
        let signal_type = self.0.borrow().element_type();
        if signal_type == DataType::Int32 {
            if let Some(written_type) = sample.iter().map(|v| v.data_type()).find(|t| *t != DataType::Int32) {
                return Err(ApplyError::Truncation { signal_type, written_type });
            }
        }
        let widened: Vec<Scalar> = sample.iter().map(|v| v.cast_to(signal_type)).collect();
        self.0.borrow_mut().push(&widened, ts)?;
        Ok(())
    }

    /// Grow this signal's history to at least `min_size` slots. A no-op if
    /// `min_size` is not larger than the current size: an input-side
    /// history is never shrunk, even if every sinking connection's deepest
    /// reference has since become shallower, since other connections
    /// (sharing the same signal) may still need the depth.
    pub fn ensure_depth(&self, min_size: usize) -> Result<(), CoreError> {
        let mut history = self.0.borrow_mut();
        if min_size > history.size() {
            history.resize(min_size)?;
        }
        Ok(())
    }

    /// Run `f` against the current snapshot of this signal's history.
    /// Borrowed rather than cloned: a connection's `perform` call only
    /// needs read access for the duration of one sample.
    pub fn with<R>(&self, f: impl FnOnce(&History) -> R) -> R {
        f(&self.0.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_depth_grows_but_never_shrinks() {
        let sig = SignalHistory::new(2, 1, DataType::Float64).unwrap();
        sig.push(&[Scalar::Float64(1.0)], Timestamp(0.0)).unwrap();
        sig.ensure_depth(5).unwrap();
        assert_eq!(sig.with(|h| h.size()), 5);
        sig.ensure_depth(3).unwrap();
        assert_eq!(sig.with(|h| h.size()), 5);
    }

    #[test]
    fn shared_clone_observes_the_same_writes() {
        let sig = SignalHistory::new(3, 1, DataType::Float64).unwrap();
        let other = sig.clone();
        sig.push(&[Scalar::Float64(7.0)], Timestamp(0.0)).unwrap();
        assert_eq!(other.with(|h| h.read(0)[0]), Scalar::Float64(7.0));
    }

    #[test]
    fn writing_a_float_into_an_int32_signal_is_rejected() {
        let sig = SignalHistory::new(2, 1, DataType::Int32).unwrap();
        let err = sig.push(&[Scalar::Float64(1.5)], Timestamp(0.0)).unwrap_err();
        assert_eq!(err, ApplyError::Truncation { signal_type: DataType::Int32, written_type: DataType::Float64 });
        assert_eq!(sig.with(|h| h.position()), -1, "the rejected write must not advance the history");
    }

    #[test]
    fn writing_narrower_int_into_a_float_signal_is_permitted() {
        let sig = SignalHistory::new(2, 1, DataType::Float32).unwrap();
        sig.push(&[Scalar::Int32(4)], Timestamp(0.0)).unwrap();
        assert_eq!(sig.with(|h| h.read(0)[0]), Scalar::Int32(4));
    }
}
