//! The six concrete scenarios from the connection-runtime's behavioral
//! contract, each driven end to end through the public `Connection` API
//! rather than its private helpers.

use mapper_core::{DataType, History, Scalar, Timestamp};
use mapper_runtime::property::{KEY_BOUND_MAX, KEY_BOUND_MIN, KEY_DEST_MAX, KEY_DEST_MIN, KEY_EXPRESSION, KEY_MODE, KEY_SRC_MAX, KEY_SRC_MIN};
use mapper_runtime::{Connection, Mode, PropertyMessage, PropertyValue};

fn push(history: &mut History, values: &[Scalar], t: f64) {
    history.push(values, Timestamp(t)).unwrap();
}

#[test]
fn bypass_type_coercion() {
    let mut conn = Connection::new(DataType::Int32, 1, DataType::Float32, 1, 1).unwrap();
    conn.mode = Mode::Bypass;

    let mut input = History::new(1, 1, DataType::Int32).unwrap();
    push(&mut input, &[Scalar::Int32(3)], 0.0);

    assert!(conn.perform(&input).unwrap());
    assert_eq!(conn.output.read(0), &[Scalar::Float32(3.0)]);
}

#[test]
fn linear_scalar() {
    let mut conn = Connection::new(DataType::Float64, 1, DataType::Float64, 1, 1).unwrap();
    let mut msg = PropertyMessage::new();
    msg.insert(KEY_SRC_MIN.to_string(), PropertyValue::Vector(vec![Scalar::Float64(0.0)]));
    msg.insert(KEY_SRC_MAX.to_string(), PropertyValue::Vector(vec![Scalar::Float64(10.0)]));
    msg.insert(KEY_DEST_MIN.to_string(), PropertyValue::Vector(vec![Scalar::Float64(-1.0)]));
    msg.insert(KEY_DEST_MAX.to_string(), PropertyValue::Vector(vec![Scalar::Float64(1.0)]));
    conn.apply_message(&msg).unwrap();
    assert_eq!(conn.mode, Mode::Linear);

    let mut input = History::new(1, 1, DataType::Float64).unwrap();
    for (x, expected) in [(5.0, 0.0), (10.0, 1.0), (0.0, -1.0)] {
        push(&mut input, &[Scalar::Float64(x)], 0.0);
        assert!(conn.perform(&input).unwrap());
        assert_eq!(conn.output.read(0), &[Scalar::Float64(expected)]);
    }
}

#[test]
fn expression_with_history() {
    let mut conn = Connection::new(DataType::Float64, 1, DataType::Float64, 1, 1).unwrap();
    let mut msg = PropertyMessage::new();
    msg.insert(KEY_MODE.to_string(), PropertyValue::Str("expression".to_string()));
    msg.insert(KEY_EXPRESSION.to_string(), PropertyValue::Str("y = x + y{-1}".to_string()));
    conn.apply_message(&msg).unwrap();
    assert_eq!(conn.mode, Mode::Expression);

    let mut input = History::new(4, 1, DataType::Float64).unwrap();
    let mut outputs = Vec::new();
    for x in [1.0, 2.0, 3.0] {
        push(&mut input, &[Scalar::Float64(x)], 0.0);
        assert!(conn.perform(&input).unwrap());
        outputs.push(conn.output.read(0)[0]);
    }
    assert_eq!(outputs, vec![Scalar::Float64(1.0), Scalar::Float64(3.0), Scalar::Float64(6.0)]);
}

#[test]
fn vector_and_reducer() {
    let mut conn = Connection::new(DataType::Int32, 3, DataType::Int32, 3, 1).unwrap();
    let mut msg = PropertyMessage::new();
    msg.insert(KEY_MODE.to_string(), PropertyValue::Str("expression".to_string()));
    msg.insert(KEY_EXPRESSION.to_string(), PropertyValue::Str("y = any(x>0) ? x : [0,0,0]".to_string()));
    conn.apply_message(&msg).unwrap();

    let mut input = History::new(4, 3, DataType::Int32).unwrap();

    push(&mut input, &[Scalar::Int32(0), Scalar::Int32(-1), Scalar::Int32(2)], 0.0);
    assert!(conn.perform(&input).unwrap());
    assert_eq!(conn.output.read(0), &[Scalar::Int32(0), Scalar::Int32(-1), Scalar::Int32(2)]);

    push(&mut input, &[Scalar::Int32(-1), Scalar::Int32(-2), Scalar::Int32(-3)], 1.0);
    assert!(conn.perform(&input).unwrap());
    assert_eq!(conn.output.read(0), &[Scalar::Int32(0), Scalar::Int32(0), Scalar::Int32(0)]);
}

#[test]
fn boundary_fold() {
    let mut conn = Connection::new(DataType::Float64, 1, DataType::Float64, 1, 1).unwrap();
    let mut msg = PropertyMessage::new();
    msg.insert(KEY_DEST_MIN.to_string(), PropertyValue::Vector(vec![Scalar::Float64(0.0)]));
    msg.insert(KEY_DEST_MAX.to_string(), PropertyValue::Vector(vec![Scalar::Float64(10.0)]));
    msg.insert(KEY_BOUND_MIN.to_string(), PropertyValue::Str("fold".to_string()));
    msg.insert(KEY_BOUND_MAX.to_string(), PropertyValue::Str("fold".to_string()));
    conn.apply_message(&msg).unwrap();
    assert_eq!(conn.mode, Mode::Bypass);

    let mut input = History::new(1, 1, DataType::Float64).unwrap();
    for (x, expected) in [(13.0, 7.0), (23.0, 3.0), (-5.0, 5.0)] {
        push(&mut input, &[Scalar::Float64(x)], 0.0);
        assert!(conn.perform(&input).unwrap());
        assert_eq!(conn.output.read(0), &[Scalar::Float64(expected)]);
    }
}

#[test]
fn calibration() {
    let mut conn = Connection::new(DataType::Float64, 1, DataType::Float64, 1, 1).unwrap();
    let mut msg = PropertyMessage::new();
    msg.insert(KEY_DEST_MIN.to_string(), PropertyValue::Vector(vec![Scalar::Float64(0.0)]));
    msg.insert(KEY_DEST_MAX.to_string(), PropertyValue::Vector(vec![Scalar::Float64(1.0)]));
    msg.insert(KEY_MODE.to_string(), PropertyValue::Str("calibrate".to_string()));
    conn.apply_message(&msg).unwrap();
    assert_eq!(conn.mode, Mode::Calibrate);

    let mut input = History::new(1, 1, DataType::Float64).unwrap();
    let mut outputs = Vec::new();
    for x in [5.0, 7.0, 3.0, 10.0] {
        push(&mut input, &[Scalar::Float64(x)], 0.0);
        assert!(conn.perform(&input).unwrap());
        outputs.push(conn.output.read(0)[0]);
    }
    assert_eq!(outputs, vec![Scalar::Float64(0.0), Scalar::Float64(1.0), Scalar::Float64(0.0), Scalar::Float64(1.0)]);
}
