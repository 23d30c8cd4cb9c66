//! Range and mode manager (§4.5): interprets property messages into a
//! connection's range record and mode, and synthesizes the linear-mode
//! expression string whenever the range changes.

use crate::boundary::BoundaryAction;
use crate::connection::{Connection, Mode};
use crate::error::{ApplyError, SampleError};
use crate::property::{
    PropertyMessage, PropertyValue, KEY_BOUND_MAX, KEY_BOUND_MIN, KEY_DEST_MAX, KEY_DEST_MIN, KEY_EXPRESSION, KEY_MAX, KEY_MIN, KEY_MODE,
    KEY_MUTE, KEY_SEND_AS_INSTANCE, KEY_SRC_MAX, KEY_SRC_MIN, RECOGNIZED_KEYS,
};

/// Apply one property message to `conn`, best-effort (§4.5): unknown
/// attributes are recorded in `conn.extras`; known attributes update the
/// range bitmask, mode, boundary actions, mute, and send-as-instance flag.
pub fn apply_message(conn: &mut Connection, msg: &PropertyMessage) -> Result<(), SampleError> {
    apply_range(conn, msg)?;
    apply_mute(conn, msg);
    apply_bound_actions(conn, msg);
    apply_send_as_instance(conn, msg);
    apply_mode(conn, msg)?;
    stash_unknown_keys(conn, msg);
    Ok(())
}

fn check_len(actual: usize, expected: usize) -> Result<(), ApplyError> {
    if actual == expected {
        Ok(())
    } else {
        Err(ApplyError::RangeIllFormed { expected, actual })
    }
}

/// Range sources, in priority order (§4.5): explicit `srcMin`/`srcMax`/
/// `destMin`/`destMax`; generic `min`/`max` as destination bounds, only if
/// this message didn't also carry an explicit `destMin`/`destMax`; any
/// field this message doesn't mention falls through to the connection's
/// existing record by simply not being overwritten.
///
/// The fourth source in §4.5 — an output signal's own published min/max
/// populating the source bounds — needs a local signal registry this
/// crate doesn't model (device/signal lifecycle is out of scope per §1)
/// and is not implemented; see DESIGN.md.
fn apply_range(conn: &mut Connection, msg: &PropertyMessage) -> Result<(), ApplyError> {
    if let Some(v) = msg.get(KEY_SRC_MIN).and_then(PropertyValue::as_vector) {
        check_len(v.len(), conn.source_length)?;
        conn.range.src_min = Some(v.to_vec());
    }
    if let Some(v) = msg.get(KEY_SRC_MAX).and_then(PropertyValue::as_vector) {
        check_len(v.len(), conn.source_length)?;
        conn.range.src_max = Some(v.to_vec());
    }

    let dest_min_explicit = msg.get(KEY_DEST_MIN).and_then(PropertyValue::as_vector);
    if let Some(v) = dest_min_explicit {
        check_len(v.len(), conn.dest_length)?;
        conn.range.dest_min = Some(v.to_vec());
    }
    let dest_max_explicit = msg.get(KEY_DEST_MAX).and_then(PropertyValue::as_vector);
    if let Some(v) = dest_max_explicit {
        check_len(v.len(), conn.dest_length)?;
        conn.range.dest_max = Some(v.to_vec());
    }

    if dest_min_explicit.is_none() {
        if let Some(v) = msg.get(KEY_MIN).and_then(PropertyValue::as_vector) {
            check_len(v.len(), conn.dest_length)?;
            conn.range.dest_min = Some(v.to_vec());
        }
    }
    if dest_max_explicit.is_none() {
        if let Some(v) = msg.get(KEY_MAX).and_then(PropertyValue::as_vector) {
            check_len(v.len(), conn.dest_length)?;
            conn.range.dest_max = Some(v.to_vec());
        }
    }
    Ok(())
}

fn apply_mute(conn: &mut Connection, msg: &PropertyMessage) {
    if let Some(v) = msg.get(KEY_MUTE).and_then(PropertyValue::as_int) {
        conn.muted = v != 0;
    }
}

fn parse_boundary_action(s: &str) -> Option<BoundaryAction> {
    match s {
        "none" => Some(BoundaryAction::None),
        "mute" => Some(BoundaryAction::Mute),
        "clamp" => Some(BoundaryAction::Clamp),
        "fold" => Some(BoundaryAction::Fold),
        "wrap" => Some(BoundaryAction::Wrap),
        _ => None,
    }
}

fn apply_bound_actions(conn: &mut Connection, msg: &PropertyMessage) {
    if let Some(a) = msg.get(KEY_BOUND_MIN).and_then(PropertyValue::as_str).and_then(parse_boundary_action) {
        conn.bound_min = a;
    }
    if let Some(a) = msg.get(KEY_BOUND_MAX).and_then(PropertyValue::as_str).and_then(parse_boundary_action) {
        conn.bound_max = a;
    }
}

fn apply_send_as_instance(conn: &mut Connection, msg: &PropertyMessage) {
    if let Some(v) = msg.get(KEY_SEND_AS_INSTANCE).and_then(PropertyValue::as_int) {
        conn.send_as_instance = v != 0;
    }
}

/// Mode selection (§4.5), applied after the range update above so
/// `is_fully_known`/`is_dest_known` reflect this message's changes.
fn apply_mode(conn: &mut Connection, msg: &PropertyMessage) -> Result<(), SampleError> {
    let requested = msg.get(KEY_MODE).and_then(PropertyValue::as_str);

    match requested {
        None => {
            if conn.mode == Mode::Undefined {
                if conn.range.is_fully_known() {
                    resynthesize_linear(conn)?;
                    conn.mode = Mode::Linear;
                } else {
                    conn.mode = Mode::Bypass;
                }
            }
        }
        Some("linear") => {
            if conn.range.is_fully_known() {
                resynthesize_linear(conn)?;
                conn.mode = Mode::Linear;
            }
        }
        Some("calibrate") => {
            if conn.range.is_dest_known() {
                conn.mode = Mode::Calibrate;
                conn.reset_calibration();
            }
        }
        Some("expression") => {
            let source = msg.get(KEY_EXPRESSION).and_then(PropertyValue::as_str).unwrap_or("y=x").to_string();
            conn.set_expression(&source)?;
            conn.mode = Mode::Expression;
        }
        Some("bypass") => conn.mode = Mode::Bypass,
        Some("reverse") => conn.mode = Mode::Reverse,
        // Unrecognized mode name: best-effort, leave the current mode alone.
        Some(_) => {}
    }

    // `@expression` can also update an already-expression-mode connection
    // without re-sending `@mode`.
    if requested != Some("expression") {
        if let Some(source) = msg.get(KEY_EXPRESSION).and_then(PropertyValue::as_str) {
            conn.set_expression(source)?;
        }
    }
    Ok(())
}

/// Linear-expression synthesis (§4.5), from the first lane of each bound.
/// No-op if the range isn't fully known yet (e.g. calibrate hasn't seeded
/// `src_min`/`src_max`).
pub fn resynthesize_linear(conn: &mut Connection) -> Result<(), mapper_compiler::CompileError> {
    let Some((s_min, s_max, d_min, d_max)) = conn.range.first_lanes_f64() else {
        return Ok(());
    };

    let source = if s_min == s_max {
        format!("y = {d_min}")
    } else if s_min == d_min && s_max == d_max {
        "y = x".to_string()
    } else {
        let scale = (d_min - d_max) / (s_min - s_max);
        let offset = (d_max * s_min - d_min * s_max) / (s_min - s_max);
        format!("y = x*{scale} + {offset}")
    };
    conn.set_expression(&source)
}


fn stash_unknown_keys(conn: &mut Connection, msg: &PropertyMessage) {
    for (key, value) in msg {
        if !RECOGNIZED_KEYS.contains(&key.as_str()) {
            conn.extras.insert(key.clone(), value.clone());
        }
    }
}
