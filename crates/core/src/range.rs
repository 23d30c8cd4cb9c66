//! Range record: the four optional bound vectors a connection tracks for
//! linear synthesis, calibration, and boundary enforcement.

use crate::scalar::Scalar;
use bitflags::bitflags;

bitflags! {
    /// Which of the four range vectors are currently populated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RangeKnown: u8 {
        const SRC_MIN  = 0b0001;
        const SRC_MAX  = 0b0010;
        const DEST_MIN = 0b0100;
        const DEST_MAX = 0b1000;
    }
}

impl RangeKnown {
    pub const ALL: RangeKnown = RangeKnown::from_bits_truncate(0b1111);
}

#[derive(Debug, Clone, Default)]
pub struct Range {
    pub src_min: Option<Vec<Scalar>>,
    pub src_max: Option<Vec<Scalar>>,
    pub dest_min: Option<Vec<Scalar>>,
    pub dest_max: Option<Vec<Scalar>>,
}

impl Range {
    pub fn known(&self) -> RangeKnown {
        let mut known = RangeKnown::empty();
        if self.src_min.is_some() {
            known |= RangeKnown::SRC_MIN;
        }
        if self.src_max.is_some() {
            known |= RangeKnown::SRC_MAX;
        }
        if self.dest_min.is_some() {
            known |= RangeKnown::DEST_MIN;
        }
        if self.dest_max.is_some() {
            known |= RangeKnown::DEST_MAX;
        }
        known
    }

    pub fn is_fully_known(&self) -> bool {
        self.known() == RangeKnown::ALL
    }

    pub fn is_dest_known(&self) -> bool {
        self.known().contains(RangeKnown::DEST_MIN | RangeKnown::DEST_MAX)
    }

    /// First-lane scalars converted to `f64`, used by linear synthesis.
    pub fn first_lanes_f64(&self) -> Option<(f64, f64, f64, f64)> {
        let src_min = self.src_min.as_ref()?.first()?.as_f64();
        let src_max = self.src_max.as_ref()?.first()?.as_f64();
        let dest_min = self.dest_min.as_ref()?.first()?.as_f64();
        let dest_max = self.dest_max.as_ref()?.first()?.as_f64();
        Some((src_min, src_max, dest_min, dest_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_known_requires_all_four() {
        let mut r = Range::default();
        assert!(!r.is_fully_known());
        r.src_min = Some(vec![Scalar::Int32(0)]);
        r.src_max = Some(vec![Scalar::Int32(10)]);
        r.dest_min = Some(vec![Scalar::Int32(0)]);
        assert!(!r.is_fully_known());
        r.dest_max = Some(vec![Scalar::Int32(1)]);
        assert!(r.is_fully_known());
    }
}
