//! The tagged scalar value and its element datatype.
//!
//! A `Scalar` carries exactly one of `i32`, `f32`, `f64`. Conversion between
//! variants is always explicit: widening (narrower int/float into a wider
//! float) never loses information, narrowing (`f32`/`f64` into `i32`)
//! truncates toward zero, matching C's `(int)` cast that the original
//! implementation relies on.

use std::fmt;

/// One of the three element types a signal or connection can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int32,
    Float32,
    Float64,
}

impl DataType {
    /// Widest-wins ordering used by the type propagator: `f64 > f32 > i32`.
    pub fn widen(self, other: DataType) -> DataType {
        use DataType::*;
        match (self, other) {
            (Float64, _) | (_, Float64) => Float64,
            (Float32, _) | (_, Float32) => Float32,
            (Int32, Int32) => Int32,
        }
    }

    pub fn from_char(c: char) -> Option<DataType> {
        match c {
            'i' => Some(DataType::Int32),
            'f' => Some(DataType::Float32),
            'd' => Some(DataType::Float64),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            DataType::Int32 => 'i',
            DataType::Float32 => 'f',
            DataType::Float64 => 'd',
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A single tagged sample value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int32(i32),
    Float32(f32),
    Float64(f64),
}

impl Scalar {
    pub fn zero(ty: DataType) -> Scalar {
        match ty {
            DataType::Int32 => Scalar::Int32(0),
            DataType::Float32 => Scalar::Float32(0.0),
            DataType::Float64 => Scalar::Float64(0.0),
        }
    }

    pub fn data_type(self) -> DataType {
        match self {
            Scalar::Int32(_) => DataType::Int32,
            Scalar::Float32(_) => DataType::Float32,
            Scalar::Float64(_) => DataType::Float64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int32(v) => v as f64,
            Scalar::Float32(v) => v as f64,
            Scalar::Float64(v) => v,
        }
    }

    pub fn as_f32(self) -> f32 {
        match self {
            Scalar::Int32(v) => v as f32,
            Scalar::Float32(v) => v,
            Scalar::Float64(v) => v as f32,
        }
    }

    /// Truncating conversion toward zero, as `(int)` does in C.
    pub fn as_i32(self) -> i32 {
        match self {
            Scalar::Int32(v) => v,
            Scalar::Float32(v) => v as i32,
            Scalar::Float64(v) => v as i32,
        }
    }

    /// Convert this scalar into `ty`, truncating if narrowing to `Int32`.
    pub fn cast_to(self, ty: DataType) -> Scalar {
        match ty {
            DataType::Int32 => Scalar::Int32(self.as_i32()),
            DataType::Float32 => Scalar::Float32(self.as_f32()),
            DataType::Float64 => Scalar::Float64(self.as_f64()),
        }
    }

    /// True for nonzero ints, nonzero floats: the expression language's
    /// truthiness test used by conditional operators.
    pub fn is_truthy(self) -> bool {
        match self {
            Scalar::Int32(v) => v != 0,
            Scalar::Float32(v) => v != 0.0,
            Scalar::Float64(v) => v != 0.0,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int32(v) => write!(f, "{v}"),
            Scalar::Float32(v) => write!(f, "{v}"),
            Scalar::Float64(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widen_prefers_wider_float() {
        assert_eq!(DataType::Int32.widen(DataType::Float32), DataType::Float32);
        assert_eq!(DataType::Float32.widen(DataType::Float64), DataType::Float64);
        assert_eq!(DataType::Int32.widen(DataType::Int32), DataType::Int32);
    }

    #[test]
    fn narrowing_truncates_toward_zero() {
        assert_eq!(Scalar::Float64(3.9).cast_to(DataType::Int32), Scalar::Int32(3));
        assert_eq!(Scalar::Float64(-3.9).cast_to(DataType::Int32), Scalar::Int32(-3));
    }

    #[test]
    fn widening_is_lossless_for_small_values() {
        assert_eq!(Scalar::Int32(3).cast_to(DataType::Float32), Scalar::Float32(3.0));
        assert_eq!(Scalar::Int32(3).cast_to(DataType::Float64), Scalar::Float64(3.0));
    }
}
