//! The connection processor (§4.4): owns one connection's mode, range,
//! expression, mute/boundary/instance flags, and output history; converts
//! each incoming sample according to the current mode, then applies
//! boundary enforcement.

use crate::boundary::{self, BoundaryAction, BoundaryOutcome};
use crate::config::{CalibrationStart, RuntimeConfig};
use crate::error::{ApplyError, SampleError};
use crate::evaluator::{self, EvalOutcome};
use crate::property::PropertyMessage;
use crate::range_mode;
use mapper_compiler::Token;
use mapper_core::{CoreError, DataType, History, Range, Scalar};
use std::collections::HashMap;

/// Which transformation a connection applies to each incoming sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Undefined,
    Bypass,
    Linear,
    Expression,
    Calibrate,
    Reverse,
}

pub struct Connection {
    pub source_type: DataType,
    pub source_length: usize,
    pub dest_type: DataType,
    pub dest_length: usize,
    pub mode: Mode,
    pub range: Range,
    pub muted: bool,
    pub bound_min: BoundaryAction,
    pub bound_max: BoundaryAction,
    pub expression_source: Option<String>,
    expr_tokens: Option<Vec<Token>>,
    /// Index into `expr_tokens` where normal evaluation resumes; advances
    /// past a one-shot history initializer the first time it runs.
    eval_start: usize,
    pub output: History,
    pub calibrating: bool,
    /// Only consulted while `calibrating == false` and `calibration_start ==
    /// SecondSample`: the first sample seen since entering calibrate mode,
    /// held back until a second sample arrives to widen into a range.
    calibration_pending: Option<Vec<Scalar>>,
    calibration_start: CalibrationStart,
    pub send_as_instance: bool,
    pub extras: HashMap<String, crate::property::PropertyValue>,
}

impl Connection {
    /// A brand-new connection: `undefined` mode, empty range, no
    /// expression, per §3's lifecycle note.
    pub fn new(
        source_type: DataType,
        source_length: usize,
        dest_type: DataType,
        dest_length: usize,
        default_history_depth: usize,
    ) -> Result<Connection, CoreError> {
        Ok(Connection {
            source_type,
            source_length,
            dest_type,
            dest_length,
            mode: Mode::Undefined,
            range: Range::default(),
            muted: false,
            bound_min: BoundaryAction::None,
            bound_max: BoundaryAction::None,
            expression_source: None,
            expr_tokens: None,
            eval_start: 0,
            output: History::new(default_history_depth, dest_length, dest_type)?,
            calibrating: false,
            calibration_pending: None,
            calibration_start: CalibrationStart::FirstSample,
            send_as_instance: false,
            extras: HashMap::new(),
        })
    }

    /// Apply runtime-wide defaults (§4.6 boundary defaults, calibration
    /// start policy) that a property message hasn't already overridden.
    /// Meant to run once, right after `new`, before any property message.
    pub fn apply_config(&mut self, config: &RuntimeConfig) {
        self.bound_min = config.default_bound_min;
        self.bound_max = config.default_bound_max;
        self.calibration_start = config.calibration_start;
    }

    /// Compile `source` against this connection's endpoint types/lengths
    /// and, on success, atomically swap it in: the new tokens replace the
    /// old only after compiling succeeds, and the output history is
    /// reallocated to the depth the new expression requires (§4.5's
    /// "compile new, then swap, then free old" protocol; §4.7).
    pub fn set_expression(&mut self, source: &str) -> Result<(), mapper_compiler::CompileError> {
        let compiled = mapper_compiler::compile(source, self.source_type, self.dest_type, self.source_length, self.dest_length)?;
        self.output
            .resize(compiled.output_history_size)
            .expect("output_history_size is never zero for a successful compile");
        self.expr_tokens = Some(compiled.tokens);
        self.expression_source = Some(source.to_string());
        self.eval_start = 0;
        Ok(())
    }

    /// Apply a property message: update range/mode/boundary/mute/instance
    /// state, compiling any new expression it names. Best-effort per §4.5;
    /// unrecognized keys land in `extras`.
    pub fn apply_message(&mut self, msg: &PropertyMessage) -> Result<(), SampleError> {
        range_mode::apply_message(self, msg)
    }

    /// Re-entering calibrate mode starts calibration fresh: drop any
    /// sample held back under `CalibrationStart::SecondSample` from a
    /// previous calibration run.
    pub(crate) fn reset_calibration(&mut self) {
        self.calibrating = false;
        self.calibration_pending = None;
    }

    /// Run one sample through this connection's current mode, then
    /// boundary enforcement. Returns whether the transport should emit the
    /// resulting destination sample.
    pub fn perform(&mut self, input: &History) -> Result<bool, ApplyError> {
        if self.muted {
            return Ok(false);
        }

        let emitted = match self.mode {
            Mode::Undefined | Mode::Bypass | Mode::Reverse => self.perform_bypass(input)?,
            Mode::Linear | Mode::Expression => self.evaluate(input),
            Mode::Calibrate => self.perform_calibrate(input),
        };

        if !emitted {
            return Ok(false);
        }
        self.output.set_current_timestamp(input.current_timestamp());
        Ok(self.enforce_boundary())
    }

    fn perform_bypass(&mut self, input: &History) -> Result<bool, ApplyError> {
        if input.length() != self.source_length || self.source_length != self.dest_length {
            return Err(ApplyError::LengthMismatch { expected: self.dest_length, actual: input.length() });
        }
        self.output.advance();
        let sample = input.read(0);
        for i in 0..self.dest_length {
            let v = sample[i].cast_to(self.dest_type);
            self.output.write_lane(i, v);
        }
        Ok(true)
    }

    /// Linear/expression mode: delegate to the stack-machine evaluator.
    fn evaluate(&mut self, input: &History) -> bool {
        let Some(tokens) = self.expr_tokens.take() else {
            return false;
        };
        let (outcome, new_start) = evaluator::evaluate(&tokens, self.eval_start, input, &mut self.output, None);
        self.eval_start = new_start;
        self.expr_tokens = Some(tokens);
        matches!(outcome, EvalOutcome::Updated)
    }

    /// Calibrate mode (§4.4): widen (or seed) `src_min`/`src_max` from the
    /// incoming sample, re-synthesize the linear expression if the range
    /// changed, then evaluate it. The evaluator's own assignment-token
    /// advance is the connection's *only* position advance here — an
    /// extra explicit advance would double-step `output.position`.
    ///
    /// Under `CalibrationStart::SecondSample` (a config knob this crate
    /// adds beyond the distilled spec, see DESIGN.md), the very first
    /// sample after entering calibrate mode is held back rather than
    /// trusted alone to seed `src_min == src_max`: nothing is emitted until
    /// a second sample arrives to widen into a real range.
    fn perform_calibrate(&mut self, input: &History) -> bool {
        let sample: Vec<Scalar> = input.read(0).to_vec();
        let changed = if !self.calibrating {
            if self.calibration_start == CalibrationStart::SecondSample && self.calibration_pending.is_none() {
                self.calibration_pending = Some(sample);
                return false;
            }
            let seed = self.calibration_pending.take().unwrap_or_else(|| sample.clone());
            let mut min = seed.clone();
            let mut max = seed;
            for i in 0..sample.len() {
                let v = sample[i].as_f64();
                if v < min[i].as_f64() {
                    min[i] = sample[i];
                }
                if v > max[i].as_f64() {
                    max[i] = sample[i];
                }
            }
            self.range.src_min = Some(min);
            self.range.src_max = Some(max);
            self.calibrating = true;
            true
        } else {
            let mut new_min = self.range.src_min.clone().unwrap();
            let mut new_max = self.range.src_max.clone().unwrap();
            let mut changed = false;
            for i in 0..sample.len() {
                let v = sample[i].as_f64();
                if v < new_min[i].as_f64() {
                    new_min[i] = sample[i];
                    changed = true;
                }
                if v > new_max[i].as_f64() {
                    new_max[i] = sample[i];
                    changed = true;
                }
            }
            self.range.src_min = Some(new_min);
            self.range.src_max = Some(new_max);
            changed
        };

        if changed {
            // A malformed re-synthesis (shouldn't happen: the synthesized
            // source is always well-formed) leaves the prior expression in
            // place rather than panicking the sample path.
            if let Err(e) = range_mode::resynthesize_linear(self) {
                tracing::warn!(error = %e, "calibration re-synthesis failed, keeping prior expression");
            }
        }
        self.evaluate(input)
    }

    /// §4.6: clamp/fold/wrap/mute the destination sample currently at
    /// `output`'s head against the effective `(destMin, destMax)` bounds.
    /// Bounds that aren't known yet mean nothing to enforce.
    fn enforce_boundary(&mut self) -> bool {
        let (Some(dest_min), Some(dest_max)) = (&self.range.dest_min, &self.range.dest_max) else {
            return true;
        };
        let dest_min: Vec<f64> = dest_min.iter().map(|s| s.as_f64()).collect();
        let dest_max: Vec<f64> = dest_max.iter().map(|s| s.as_f64()).collect();
        let outcome = boundary::boundary_perform(self.output.current_mut(), &dest_min, &dest_max, self.bound_min, self.bound_max);
        outcome != BoundaryOutcome::Muted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyValue, KEY_DEST_MAX, KEY_DEST_MIN, KEY_MODE, KEY_SRC_MAX, KEY_SRC_MIN};
    use mapper_core::Timestamp;

    fn input_of(ty: DataType, len: usize, values: &[f64]) -> History {
        let mut h = History::new(4, len, ty).unwrap();
        h.push(&values.iter().map(|v| Scalar::Float64(*v).cast_to(ty)).collect::<Vec<_>>(), Timestamp(0.0)).unwrap();
        h
    }

    #[test]
    fn bypass_coerces_int_to_float_bit_for_bit_in_value() {
        // §8 scenario 1: x:i32[1] -> y:f32[1], bypass. Input 3 -> output 3.0.
        let mut conn = Connection::new(DataType::Int32, 1, DataType::Float32, 1, 1).unwrap();
        conn.mode = Mode::Bypass;
        let input = input_of(DataType::Int32, 1, &[3.0]);
        assert!(conn.perform(&input).unwrap());
        assert_eq!(conn.output.read(0), &[Scalar::Float32(3.0)]);
    }

    #[test]
    fn linear_scalar_range_maps_endpoints_and_midpoint() {
        // §8 scenario 2: sMin=0 sMax=10 dMin=-1 dMax=1.
        let mut conn = Connection::new(DataType::Float64, 1, DataType::Float64, 1, 1).unwrap();
        let mut msg = PropertyMessage::new();
        msg.insert(KEY_SRC_MIN.to_string(), PropertyValue::Vector(vec![Scalar::Float64(0.0)]));
        msg.insert(KEY_SRC_MAX.to_string(), PropertyValue::Vector(vec![Scalar::Float64(10.0)]));
        msg.insert(KEY_DEST_MIN.to_string(), PropertyValue::Vector(vec![Scalar::Float64(-1.0)]));
        msg.insert(KEY_DEST_MAX.to_string(), PropertyValue::Vector(vec![Scalar::Float64(1.0)]));
        conn.apply_message(&msg).unwrap();
        assert_eq!(conn.mode, Mode::Linear);

        for (x, expected) in [(5.0, 0.0), (10.0, 1.0), (0.0, -1.0)] {
            let input = input_of(DataType::Float64, 1, &[x]);
            assert!(conn.perform(&input).unwrap());
            assert_eq!(conn.output.read(0), &[Scalar::Float64(expected)]);
        }
    }

    #[test]
    fn calibration_widens_source_range_and_tracks_destination_bounds() {
        // §8 scenario 6: calibrate, dMin=0 dMax=1. Inputs 5,7,3,10 -> 0,1,0,1.
        let mut conn = Connection::new(DataType::Float64, 1, DataType::Float64, 1, 1).unwrap();
        let mut msg = PropertyMessage::new();
        msg.insert(KEY_DEST_MIN.to_string(), PropertyValue::Vector(vec![Scalar::Float64(0.0)]));
        msg.insert(KEY_DEST_MAX.to_string(), PropertyValue::Vector(vec![Scalar::Float64(1.0)]));
        msg.insert(KEY_MODE.to_string(), PropertyValue::Str("calibrate".to_string()));
        conn.apply_message(&msg).unwrap();
        assert_eq!(conn.mode, Mode::Calibrate);

        let mut outputs = Vec::new();
        for x in [5.0, 7.0, 3.0, 10.0] {
            let input = input_of(DataType::Float64, 1, &[x]);
            assert!(conn.perform(&input).unwrap());
            outputs.push(conn.output.read(0)[0]);
        }
        assert_eq!(outputs, vec![Scalar::Float64(0.0), Scalar::Float64(1.0), Scalar::Float64(0.0), Scalar::Float64(1.0)]);
    }

    #[test]
    fn calibration_second_sample_policy_suppresses_until_a_second_reading_arrives() {
        let mut conn = Connection::new(DataType::Float64, 1, DataType::Float64, 1, 1).unwrap();
        conn.apply_config(&RuntimeConfig { calibration_start: CalibrationStart::SecondSample, ..RuntimeConfig::default() });
        let mut msg = PropertyMessage::new();
        msg.insert(KEY_DEST_MIN.to_string(), PropertyValue::Vector(vec![Scalar::Float64(0.0)]));
        msg.insert(KEY_DEST_MAX.to_string(), PropertyValue::Vector(vec![Scalar::Float64(1.0)]));
        msg.insert(KEY_MODE.to_string(), PropertyValue::Str("calibrate".to_string()));
        conn.apply_message(&msg).unwrap();

        let first = input_of(DataType::Float64, 1, &[5.0]);
        assert!(!conn.perform(&first).unwrap());
        assert!(conn.range.src_min.is_none());

        let second = input_of(DataType::Float64, 1, &[10.0]);
        assert!(conn.perform(&second).unwrap());
        assert_eq!(conn.range.src_min, Some(vec![Scalar::Float64(5.0)]));
        assert_eq!(conn.range.src_max, Some(vec![Scalar::Float64(10.0)]));
        assert_eq!(conn.output.read(0), &[Scalar::Float64(1.0)]);
    }

    #[test]
    fn muted_connection_never_emits() {
        let mut conn = Connection::new(DataType::Float64, 1, DataType::Float64, 1, 1).unwrap();
        conn.mode = Mode::Bypass;
        conn.muted = true;
        let input = input_of(DataType::Float64, 1, &[1.0]);
        assert!(!conn.perform(&input).unwrap());
    }

    #[test]
    fn position_advances_exactly_once_per_emitted_sample() {
        let mut conn = Connection::new(DataType::Float64, 1, DataType::Float64, 1, 4).unwrap();
        conn.mode = Mode::Bypass;
        let before = conn.output.position();
        let input = input_of(DataType::Float64, 1, &[1.0]);
        assert!(conn.perform(&input).unwrap());
        let size = conn.output.size() as i64;
        assert_eq!(conn.output.position(), (before + 1).rem_euclid(size));
    }

    #[test]
    fn boundary_mute_suppresses_the_whole_emit() {
        let mut conn = Connection::new(DataType::Float64, 1, DataType::Float64, 1, 1).unwrap();
        conn.mode = Mode::Bypass;
        conn.range.dest_min = Some(vec![Scalar::Float64(0.0)]);
        conn.range.dest_max = Some(vec![Scalar::Float64(10.0)]);
        conn.bound_max = BoundaryAction::Mute;
        let input = input_of(DataType::Float64, 1, &[15.0]);
        assert!(!conn.perform(&input).unwrap());
    }
}
