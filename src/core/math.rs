//! Angular arithmetic for 2D pose math.

use std::f32::consts::PI;

/// Normalize an angle to [-π, π].
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Signed shortest angular difference from `a` to `b`.
///
/// Returns the angle to add to `a` to reach `b` along the short way
/// around the circle.
#[inline]
pub fn angle_diff(a: f32, b: f32) -> f32 {
    normalize_angle(b - a)
}

/// Interpolate between two angles along the shortest path.
///
/// `t = 0` returns `a`, `t = 1` returns `b`.
#[inline]
pub fn angle_lerp(a: f32, b: f32, t: f32) -> f32 {
    normalize_angle(a + angle_diff(a, b) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_within_range_is_identity() {
        assert_relative_eq!(normalize_angle(0.0), 0.0);
        assert_relative_eq!(normalize_angle(1.2), 1.2);
        assert_relative_eq!(normalize_angle(-1.2), -1.2);
    }

    #[test]
    fn normalize_wraps_multiples_of_two_pi() {
        assert_relative_eq!(normalize_angle(2.0 * PI), 0.0, epsilon = 1e-6);
        assert_relative_eq!(normalize_angle(-2.0 * PI), 0.0, epsilon = 1e-6);
        assert_relative_eq!(normalize_angle(3.0 * PI), PI, epsilon = 1e-6);
        assert_relative_eq!(normalize_angle(-3.0 * PI), -PI, epsilon = 1e-6);
    }

    #[test]
    fn diff_crosses_pi_boundary_the_short_way() {
        assert_relative_eq!(angle_diff(PI - 0.1, -PI + 0.1), 0.2, epsilon = 1e-6);
        assert_relative_eq!(angle_diff(-PI + 0.1, PI - 0.1), -0.2, epsilon = 1e-6);
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        assert_relative_eq!(angle_lerp(0.0, PI / 2.0, 0.0), 0.0);
        assert_relative_eq!(angle_lerp(0.0, PI / 2.0, 1.0), PI / 2.0);
        assert_relative_eq!(angle_lerp(0.0, PI / 2.0, 0.5), PI / 4.0);
    }

    #[test]
    fn lerp_across_boundary_stays_near_pi() {
        let mid = angle_lerp(PI - 0.05, -PI + 0.05, 0.5);
        assert!(mid.abs() > PI - 0.01, "expected ±π neighborhood, got {mid}");
    }
}
