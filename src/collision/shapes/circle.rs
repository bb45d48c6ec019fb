use glam::Vec2;

use crate::collision::aabb::{Aabb, RayCastInput, RayCastOutput};
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::{Transform, EPSILON};

use super::MassData;

/// A solid circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleShape {
    pub radius: f32,
    /// Center in body-local coordinates.
    pub position: Vec2,
}

impl CircleShape {
    /// Circle centered on the body origin. Rejects non-positive or non-finite radii.
    pub fn new(radius: f32) -> PhysicsResult<Self> {
        Self::with_position(radius, Vec2::ZERO)
    }

    pub fn with_position(radius: f32, position: Vec2) -> PhysicsResult<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(PhysicsError::InvalidShape {
                reason: "circle radius must be positive",
            });
        }
        if !position.is_finite() {
            return Err(PhysicsError::InvalidShape {
                reason: "circle position must be finite",
            });
        }
        Ok(Self { radius, position })
    }

    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let center = xf.mul(self.position);
        (p - center).length_squared() <= self.radius * self.radius
    }

    /// Ray against the circle boundary, solving `|s + t*d|^2 = r^2`.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let position = xf.mul(self.position);
        let s = input.p1 - position;
        let b = s.length_squared() - self.radius * self.radius;

        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.length_squared();
        let sigma = c * c - rr * b;

        if sigma < 0.0 || rr < EPSILON {
            return None;
        }

        let mut a = -(c + sigma.sqrt());
        if 0.0 <= a && a <= input.max_fraction * rr {
            a /= rr;
            return Some(RayCastOutput {
                fraction: a,
                normal: (s + a * r).normalize_or_zero(),
            });
        }
        None
    }

    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let p = xf.mul(self.position);
        Aabb::from_center(p, Vec2::splat(self.radius))
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        let rr = self.radius * self.radius;
        let mass = density * std::f32::consts::PI * rr;
        MassData {
            mass,
            center: self.position,
            inertia: mass * (0.5 * rr + self.position.length_squared()),
        }
    }
}
