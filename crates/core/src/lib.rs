//! mapper-core: the value, history, and range primitives shared by the
//! expression compiler and the connection runtime.
//!
//! Key design principles:
//! - `Scalar`/`DataType`: what a connection talks about (`i32`, `f32`, `f64`).
//! - `History`: a fixed-capacity circular buffer of vector samples with
//!   attached timestamps, shared by a signal's inputs or owned by a single
//!   connection's output.
//! - `Range`: the four optional bound vectors used for linear synthesis,
//!   calibration, and boundary enforcement.
//!
//! # Modules
//!
//! - `error`: shared error types for the data-model primitives
//! - `scalar`: tagged scalar value and element datatype
//! - `history`: circular history buffer with in-place/copy resize
//! - `range`: source/destination bound bookkeeping
//! - `ops`: operator/function tables shared by the compiler's constant
//!   folder and the runtime's evaluator, so the two can never disagree

pub mod error;
pub mod history;
pub mod ops;
pub mod range;
pub mod scalar;

pub use error::CoreError;
pub use history::{History, Timestamp};
pub use ops::{Conditional, FuncId, OpCode, VFuncId};
pub use range::{Range, RangeKnown};
pub use scalar::{DataType, Scalar};
