//! mapper-runtime: the connection processor, expression evaluator, and
//! range/mode manager that sit downstream of `mapper-compiler`.
//!
//! # Modules
//!
//! - `evaluator`: stack machine walking a compiled token sequence
//! - `connection`: per-connection mode dispatch and boundary enforcement
//! - `range_mode`: property-message application and linear synthesis
//! - `boundary`: clamp/fold/wrap/mute enforcement
//! - `signal`: shared, grow-only input-side history
//! - `property`: the property-message boundary type
//! - `error`: caller-visible error types
//! - `config`: TOML-deserialized runtime defaults

pub mod boundary;
pub mod config;
pub mod connection;
pub mod error;
pub mod evaluator;
pub mod property;
pub mod range_mode;
pub mod signal;

pub use connection::{Connection, Mode};
pub use error::{ApplyError, SampleError};
pub use property::{PropertyMessage, PropertyValue};
pub use signal::SignalHistory;
