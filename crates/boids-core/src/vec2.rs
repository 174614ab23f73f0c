//! Small helpers for `[f64; 2]` plane vectors.
//!
//! Every normalization in the crate goes through [`normalize_or_zero`] so a
//! zero-length input yields the zero vector instead of NaN.

use std::f64::consts::{PI, TAU};

pub const ZERO: [f64; 2] = [0.0, 0.0];

/// Squared lengths below this are treated as zero when normalizing.
const NORMALIZE_EPSILON_SQ: f64 = 1e-18;

#[inline]
pub fn add(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [a[0] + b[0], a[1] + b[1]]
}

#[inline]
pub fn sub(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

#[inline]
pub fn scale(a: [f64; 2], s: f64) -> [f64; 2] {
    [a[0] * s, a[1] * s]
}

#[inline]
pub fn dot(a: [f64; 2], b: [f64; 2]) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

#[inline]
pub fn length_sq(a: [f64; 2]) -> f64 {
    dot(a, a)
}

#[inline]
pub fn length(a: [f64; 2]) -> f64 {
    length_sq(a).sqrt()
}

#[inline]
pub fn distance_sq(a: [f64; 2], b: [f64; 2]) -> f64 {
    length_sq(sub(a, b))
}

#[inline]
pub fn is_finite(a: [f64; 2]) -> bool {
    a[0].is_finite() && a[1].is_finite()
}

/// Unit vector in the direction of `a`, or zero when `a` has no direction.
#[inline]
pub fn normalize_or_zero(a: [f64; 2]) -> [f64; 2] {
    let len_sq = length_sq(a);
    if len_sq <= NORMALIZE_EPSILON_SQ || !len_sq.is_finite() {
        return ZERO;
    }
    scale(a, 1.0 / len_sq.sqrt())
}

#[inline]
pub fn lerp(a: [f64; 2], b: [f64; 2], t: f64) -> [f64; 2] {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

/// Unit forward vector for a heading in radians.
#[inline]
pub fn from_heading(heading: f64) -> [f64; 2] {
    let (sin, cos) = heading.sin_cos();
    [cos, sin]
}

#[inline]
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Wrap an angle into `(-PI, PI]`.
pub fn wrap_signed_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Rotate `current` toward `target` along the shortest arc by fraction `t`.
///
/// This is the planar form of a quaternion slerp about the plane normal.
pub fn rotate_towards(current: f64, target: f64, t: f64) -> f64 {
    let delta = wrap_signed_angle(target - current);
    wrap_signed_angle(current + delta * clamp01(t))
}

/// Critically damped approach of `current` toward `target`.
///
/// `damp_velocity` carries the spring state between calls. The change applied
/// in one call is clamped to `max_rate * smooth_time`, and the result never
/// overshoots the target.
pub fn smooth_damp(
    current: [f64; 2],
    target: [f64; 2],
    damp_velocity: &mut [f64; 2],
    smooth_time: f64,
    max_rate: f64,
    dt: f64,
) -> [f64; 2] {
    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let mut change = sub(current, target);
    let max_change = max_rate * smooth_time;
    let change_len_sq = length_sq(change);
    if change_len_sq > max_change * max_change {
        change = scale(change, max_change / change_len_sq.sqrt());
    }
    let clamped_target = sub(current, change);

    let temp = scale(add(*damp_velocity, scale(change, omega)), dt);
    *damp_velocity = scale(sub(*damp_velocity, scale(temp, omega)), decay);
    let mut output = add(clamped_target, scale(add(change, temp), decay));

    // Stop exactly on the target instead of passing it.
    if dot(sub(target, current), sub(output, target)) > 0.0 {
        output = target;
        *damp_velocity = ZERO;
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_zero_vector_is_zero() {
        assert_eq!(normalize_or_zero([0.0, 0.0]), ZERO);
        assert_eq!(normalize_or_zero([1e-12, 0.0]), ZERO);
        let n = normalize_or_zero([3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-12 && (n[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn wrap_signed_angle_stays_in_half_open_range() {
        for angle in [-7.0, -PI, -1.0, 0.0, 1.0, PI, 4.0, 13.0] {
            let w = wrap_signed_angle(angle);
            assert!(w > -PI - 1e-12 && w <= PI + 1e-12, "{angle} -> {w}");
            assert!((w.sin() - angle.sin()).abs() < 1e-9);
            assert!((w.cos() - angle.cos()).abs() < 1e-9);
        }
    }

    #[test]
    fn rotate_towards_takes_shortest_arc() {
        // From 170deg toward -170deg the short way crosses PI, not zero.
        let current = 170f64.to_radians();
        let target = -170f64.to_radians();
        let half = rotate_towards(current, target, 0.5);
        assert!((half.abs() - PI).abs() < 1e-9);
        assert!((rotate_towards(current, target, 1.0) - target).abs() < 1e-9);
        assert!((rotate_towards(current, target, 0.0) - current).abs() < 1e-9);
    }

    #[test]
    fn smooth_damp_converges_without_overshoot() {
        let target = [5.0, 0.0];
        let mut current = [0.0, 0.0];
        let mut state = ZERO;
        for _ in 0..500 {
            current = smooth_damp(current, target, &mut state, 0.1, 100.0, 0.02);
            assert!(current[0] <= target[0] + 1e-9);
        }
        assert!((current[0] - target[0]).abs() < 1e-6);
        assert!(current[1].abs() < 1e-12);
    }

    #[test]
    fn smooth_damp_limits_step_size() {
        let mut state = ZERO;
        let next = smooth_damp([0.0, 0.0], [100.0, 0.0], &mut state, 0.1, 10.0, 0.02);
        // Change is capped at max_rate * smooth_time = 1.0 before damping.
        assert!(next[0] > 0.0 && next[0] <= 1.0);
    }
}
