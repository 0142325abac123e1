//! 2D point and rigid-transform types.

use serde::{Deserialize, Serialize};

use crate::core::math;

/// A point in the plane, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    #[inline]
    pub fn distance_squared(&self, other: &Point2D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(&self, other: &Point2D) -> f32 {
        self.distance_squared(other).sqrt()
    }
}

/// A 2D rigid transform: position in meters, heading in radians.
///
/// Doubles as a robot pose (transform from the world frame) and as a
/// relative-pose measurement between two frames. The heading is kept
/// normalized to [-π, π] by the constructor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f32,
    pub y: f32,
    pub theta: f32,
}

impl Pose2D {
    /// Create a pose, normalizing the heading.
    #[inline]
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self {
            x,
            y,
            theta: math::normalize_angle(theta),
        }
    }

    /// The identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        }
    }

    /// Euclidean norm of the translation component.
    #[inline]
    pub fn translation_norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Compose `self ⊕ other`: apply `other` in the frame of `self`.
    #[inline]
    pub fn compose(&self, other: &Pose2D) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            self.x + other.x * cos_t - other.y * sin_t,
            self.y + other.x * sin_t + other.y * cos_t,
            self.theta + other.theta,
        )
    }

    /// The inverse transform, so that `p.compose(&p.inverse())` is identity.
    #[inline]
    pub fn inverse(&self) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            -self.x * cos_t - self.y * sin_t,
            self.x * sin_t - self.y * cos_t,
            -self.theta,
        )
    }

    /// Relative transform from `self` to `other`: `self⁻¹ ⊕ other`.
    ///
    /// For two world poses this is the measurement an exact sensor would
    /// report for the motion between them.
    #[inline]
    pub fn relative_to(&self, other: &Pose2D) -> Pose2D {
        self.inverse().compose(other)
    }

    /// Map a point from this pose's local frame into the world frame.
    #[inline]
    pub fn transform_point(&self, point: &Point2D) -> Point2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Point2D::new(
            self.x + point.x * cos_t - point.y * sin_t,
            self.y + point.x * sin_t + point.y * cos_t,
        )
    }

    /// Interpolate between two timestamped poses at `target_us`.
    ///
    /// Linear in x/y, shortest-path in heading. Returns `None` outside the
    /// [start, end] window.
    pub fn interpolate(
        start: &super::Timestamped<Pose2D>,
        end: &super::Timestamped<Pose2D>,
        target_us: u64,
    ) -> Option<Pose2D> {
        if target_us < start.timestamp_us || target_us > end.timestamp_us {
            return None;
        }
        if start.timestamp_us == end.timestamp_us {
            return Some(start.data);
        }
        let t = (target_us - start.timestamp_us) as f32
            / (end.timestamp_us - start.timestamp_us) as f32;
        Some(Pose2D {
            x: start.data.x + t * (end.data.x - start.data.x),
            y: start.data.y + t * (end.data.y - start.data.y),
            theta: math::angle_lerp(start.data.theta, end.data.theta, t),
        })
    }
}

impl Default for Pose2D {
    fn default() -> Self {
        Self::identity()
    }
}
