use glam::Vec2;

use crate::collision::aabb::{Aabb, RayCastInput, RayCastOutput};
use crate::config::{LINEAR_SLOP, POLYGON_RADIUS};
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::Transform;

/// A line segment `v1 -> v2`.
///
/// One-sided edges carry ghost vertices `v0` and `v3` from their neighbours
/// so that shapes sliding along a chain do not catch on internal vertices.
/// They only collide from the right of `v1 -> v2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeShape {
    pub v0: Vec2,
    pub v1: Vec2,
    pub v2: Vec2,
    pub v3: Vec2,
    pub one_sided: bool,
    pub radius: f32,
}

impl EdgeShape {
    /// Segment colliding on both sides.
    pub fn new_two_sided(v1: Vec2, v2: Vec2) -> PhysicsResult<Self> {
        validate_segment(v1, v2)?;
        Ok(Self {
            v0: v1,
            v1,
            v2,
            v3: v2,
            one_sided: false,
            radius: POLYGON_RADIUS,
        })
    }

    /// Segment with ghost neighbours, colliding only on its right side.
    pub fn new_one_sided(v0: Vec2, v1: Vec2, v2: Vec2, v3: Vec2) -> PhysicsResult<Self> {
        validate_segment(v1, v2)?;
        if !(v0.is_finite() && v3.is_finite()) {
            return Err(PhysicsError::InvalidShape {
                reason: "edge ghost vertices must be finite",
            });
        }
        Ok(Self {
            v0,
            v1,
            v2,
            v3,
            one_sided: true,
            radius: POLYGON_RADIUS,
        })
    }

    /// Right-hand unit normal of `v1 -> v2`.
    #[inline]
    pub fn normal(&self) -> Vec2 {
        let e = self.v2 - self.v1;
        Vec2::new(e.y, -e.x).normalize_or_zero()
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let p1 = xf.mul_t(input.p1);
        let p2 = xf.mul_t(input.p2);
        let d = p2 - p1;

        let normal = self.normal();

        // q = p1 + t * d, dot(normal, q - v1) = 0
        let numerator = normal.dot(self.v1 - p1);
        if self.one_sided && numerator > 0.0 {
            return None;
        }

        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + t * d;
        let r = self.v2 - self.v1;
        let rr = r.length_squared();
        if rr == 0.0 {
            return None;
        }

        let s = (q - self.v1).dot(r) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let normal = if numerator > 0.0 { -normal } else { normal };
        Some(RayCastOutput {
            fraction: t,
            normal: xf.q.mul(normal),
        })
    }

    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let a = xf.mul(self.v1);
        let b = xf.mul(self.v2);
        let r = Vec2::splat(self.radius);
        Aabb::new(a.min(b) - r, a.max(b) + r)
    }
}

pub(super) fn validate_segment(v1: Vec2, v2: Vec2) -> PhysicsResult<()> {
    if !(v1.is_finite() && v2.is_finite()) {
        return Err(PhysicsError::InvalidShape {
            reason: "edge vertices must be finite",
        });
    }
    if v1.distance_squared(v2) <= LINEAR_SLOP * LINEAR_SLOP {
        return Err(PhysicsError::InvalidShape {
            reason: "edge is too short",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_rejects_short_segment() {
        assert!(EdgeShape::new_two_sided(Vec2::ZERO, Vec2::splat(0.001)).is_err());
        assert!(EdgeShape::new_two_sided(Vec2::ZERO, Vec2::X).is_ok());
    }

    #[test]
    fn test_edge_ray_cast_two_sided() {
        let edge = EdgeShape::new_two_sided(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)).unwrap();
        let down = RayCastInput {
            p1: Vec2::new(0.0, 2.0),
            p2: Vec2::new(0.0, -2.0),
            max_fraction: 1.0,
        };
        let hit = edge.ray_cast(&down, &Transform::IDENTITY).unwrap();
        assert!((hit.fraction - 0.5).abs() < 1e-5);
        assert!((hit.normal - Vec2::Y).length() < 1e-5);

        let up = RayCastInput {
            p1: Vec2::new(0.0, -2.0),
            p2: Vec2::new(0.0, 2.0),
            max_fraction: 1.0,
        };
        let hit = edge.ray_cast(&up, &Transform::IDENTITY).unwrap();
        assert!((hit.normal + Vec2::Y).length() < 1e-5);
    }

    #[test]
    fn test_edge_ray_cast_one_sided() {
        // Right side of (1,0) -> (-1,0) is +y.
        let edge = EdgeShape::new_one_sided(
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(-2.0, 0.0),
        )
        .unwrap();
        let from_above = RayCastInput {
            p1: Vec2::new(0.0, 2.0),
            p2: Vec2::new(0.0, -2.0),
            max_fraction: 1.0,
        };
        assert!(edge.ray_cast(&from_above, &Transform::IDENTITY).is_some());

        let from_below = RayCastInput {
            p1: Vec2::new(0.0, -2.0),
            p2: Vec2::new(0.0, 2.0),
            max_fraction: 1.0,
        };
        assert!(edge.ray_cast(&from_below, &Transform::IDENTITY).is_none());
    }
}
