//! Boundary enforcement (§4.6): clamps, folds, wraps, or mutes a
//! destination sample's lanes against its effective `(dMin, dMax)` bounds.

use mapper_core::Scalar;
use serde::Deserialize;

/// The policy applied to an out-of-range destination lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryAction {
    None,
    Mute,
    Clamp,
    Fold,
    Wrap,
}

/// Outcome of enforcing boundaries on one destination sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryOutcome {
    /// No lane was muted; the sample (possibly adjusted) should be emitted.
    Pass,
    /// At least one lane's action was `Mute` and its value was out of
    /// range; the whole sample is suppressed.
    Muted,
}

/// Apply `(min_action, max_action)` to every lane of `value` against
/// `(dest_min, dest_max)`, in place. Returns [`BoundaryOutcome::Muted`] if
/// any lane was muted (the caller should then suppress the whole sample,
/// per §4.6: "If any lane is muted, the whole sample is suppressed").
///
/// `dest_min`/`dest_max` are converted to `f64` by the caller using the
/// *destination* type for both — resolving the open question in §9 about
/// which type the original's mixed min/max-to-double conversion should
/// use.
pub fn boundary_perform(
    value: &mut [Scalar],
    dest_min: &[f64],
    dest_max: &[f64],
    min_action: BoundaryAction,
    max_action: BoundaryAction,
) -> BoundaryOutcome {
    let mut outcome = BoundaryOutcome::Pass;
    for (i, v) in value.iter_mut().enumerate() {
        let lane_min = lane_bound(dest_min, i);
        let lane_max = lane_bound(dest_max, i);
        let (lo, hi, min_act, max_act) = if lane_min > lane_max {
            (lane_max, lane_min, max_action, min_action)
        } else {
            (lane_min, lane_max, min_action, max_action)
        };
        if apply_one_lane(v, lo, hi, min_act, max_act) {
            outcome = BoundaryOutcome::Muted;
        }
    }
    outcome
}

fn lane_bound(bounds: &[f64], i: usize) -> f64 {
    if bounds.len() == 1 { bounds[0] } else { bounds[i] }
}

/// Enforce one lane's bounds. Returns `true` if this lane was muted.
fn apply_one_lane(v: &mut Scalar, lo: f64, hi: f64, min_action: BoundaryAction, max_action: BoundaryAction) -> bool {
    let ty = v.data_type();
    let range = (hi - lo).abs();
    let x = v.as_f64();

    if x < lo {
        return apply_side(v, x, lo, hi, range, min_action, max_action, ty, true);
    }
    if x > hi {
        return apply_side(v, x, lo, hi, range, max_action, min_action, ty, false);
    }
    false
}

/// Enforce the action for the side `x` actually violated. `reflect_from`
/// is `lo` when `x < lo` (the min side) and `hi` when `x > hi` (the max
/// side); `other_action` is the action for the opposite side, applied
/// recursively (one level) if a `fold` overshoots into it.
#[allow(clippy::too_many_arguments)]
fn apply_side(
    v: &mut Scalar,
    x: f64,
    lo: f64,
    hi: f64,
    range: f64,
    action: BoundaryAction,
    other_action: BoundaryAction,
    ty: mapper_core::DataType,
    below_min: bool,
) -> bool {
    let reflect_from = if below_min { lo } else { hi };
    match action {
        BoundaryAction::None => false,
        BoundaryAction::Mute => true,
        BoundaryAction::Clamp => {
            *v = Scalar::Float64(reflect_from).cast_to(ty);
            false
        }
        BoundaryAction::Fold => {
            if range == 0.0 {
                *v = Scalar::Float64(reflect_from).cast_to(ty);
                return false;
            }
            let reflected = if below_min { lo + (x - lo).abs() } else { hi - (x - hi).abs() };
            if below_min && reflected > hi {
                // Overshot past the opposite bound: apply that side's
                // action against the new overshoot, one level deep.
                let mut tmp = Scalar::Float64(reflected).cast_to(ty);
                let muted = apply_side(&mut tmp, reflected, lo, hi, range, other_action, BoundaryAction::Clamp, ty, false);
                *v = tmp;
                muted
            } else if !below_min && reflected < lo {
                let mut tmp = Scalar::Float64(reflected).cast_to(ty);
                let muted = apply_side(&mut tmp, reflected, lo, hi, range, other_action, BoundaryAction::Clamp, ty, true);
                *v = tmp;
                muted
            } else {
                *v = Scalar::Float64(reflected).cast_to(ty);
                false
            }
        }
        BoundaryAction::Wrap => {
            if range == 0.0 {
                *v = Scalar::Float64(reflect_from).cast_to(ty);
                return false;
            }
            let wrapped = if below_min {
                hi - (lo - x).rem_euclid(range)
            } else {
                lo + (x - hi).rem_euclid(range)
            };
            *v = Scalar::Float64(wrapped).cast_to(ty);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_pins_to_the_violated_bound() {
        let mut v = [Scalar::Float64(15.0)];
        boundary_perform(&mut v, &[0.0], &[10.0], BoundaryAction::Clamp, BoundaryAction::Clamp);
        assert_eq!(v[0], Scalar::Float64(10.0));
    }

    #[test]
    fn fold_reflects_and_cascades_into_the_other_side() {
        let mut v = [Scalar::Float64(13.0)];
        boundary_perform(&mut v, &[0.0], &[10.0], BoundaryAction::Fold, BoundaryAction::Fold);
        assert_eq!(v[0], Scalar::Float64(7.0));

        let mut v = [Scalar::Float64(23.0)];
        boundary_perform(&mut v, &[0.0], &[10.0], BoundaryAction::Fold, BoundaryAction::Fold);
        assert_eq!(v[0], Scalar::Float64(3.0));

        let mut v = [Scalar::Float64(-5.0)];
        boundary_perform(&mut v, &[0.0], &[10.0], BoundaryAction::Fold, BoundaryAction::Fold);
        assert_eq!(v[0], Scalar::Float64(5.0));
    }

    #[test]
    fn mute_suppresses_when_out_of_range() {
        let mut v = [Scalar::Float64(15.0)];
        let outcome = boundary_perform(&mut v, &[0.0], &[10.0], BoundaryAction::Mute, BoundaryAction::Mute);
        assert_eq!(outcome, BoundaryOutcome::Muted);
    }

    #[test]
    fn zero_range_degrades_fold_to_clamp_without_panicking() {
        let mut v = [Scalar::Float64(5.0)];
        boundary_perform(&mut v, &[3.0], &[3.0], BoundaryAction::Fold, BoundaryAction::Fold);
        assert_eq!(v[0], Scalar::Float64(3.0));
    }

    #[test]
    fn wrap_is_idempotent() {
        let mut v = [Scalar::Float64(13.0)];
        boundary_perform(&mut v, &[0.0], &[10.0], BoundaryAction::Wrap, BoundaryAction::Wrap);
        let once = v;
        boundary_perform(&mut v, &[0.0], &[10.0], BoundaryAction::Wrap, BoundaryAction::Wrap);
        assert_eq!(v, once);
    }

    #[test]
    fn swapped_bounds_swap_their_actions() {
        // dMin=10 > dMax=0: bounds and their actions are swapped together,
        // so the effective low side (0) carries the original max_action
        // and the effective high side (10) carries the original
        // min_action. A value of 15 violates the high side and is
        // clamped by the (swapped-in) min_action.
        let mut v = [Scalar::Float64(15.0)];
        boundary_perform(&mut v, &[10.0], &[0.0], BoundaryAction::Clamp, BoundaryAction::None);
        assert_eq!(v[0], Scalar::Float64(10.0));
    }
}
