use glam::Vec2;

use crate::config::LINEAR_SLOP;
use crate::dynamics::body::Body;
use crate::dynamics::island::SolverData;
use crate::error::PhysicsResult;
use crate::math::{cross, cross_sv, Rot};

use super::{require, soft_coefficients, SolverBodies};

/// Keeps two anchor points at a fixed distance, within a length range, or
/// connected by a spring.
#[derive(Debug, Clone)]
pub struct DistanceJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Rest length.
    pub length: f32,
    pub min_length: f32,
    pub max_length: f32,
    /// Linear spring stiffness in N/m. Zero makes the joint rigid.
    pub stiffness: f32,
    /// Linear spring damping in N*s/m.
    pub damping: f32,
}

impl Default for DistanceJointDef {
    fn default() -> Self {
        Self {
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            length: 1.0,
            min_length: 1.0,
            max_length: 1.0,
            stiffness: 0.0,
            damping: 0.0,
        }
    }
}

impl DistanceJointDef {
    /// Rigid rod between two world anchors, using the current body poses.
    pub fn new(body_a: &Body, body_b: &Body, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        let length = (anchor_b - anchor_a).length().max(LINEAR_SLOP);
        Self {
            local_anchor_a: body_a.local_point(anchor_a),
            local_anchor_b: body_b.local_point(anchor_b),
            length,
            min_length: length,
            max_length: length,
            ..Default::default()
        }
    }

    /// Allow the length to vary inside `[min, max]`.
    pub fn with_range(mut self, min_length: f32, max_length: f32) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;
        self
    }

    pub fn with_spring(mut self, stiffness: f32, damping: f32) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }
}

#[derive(Debug, Clone)]
pub struct DistanceJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    length: f32,
    min_length: f32,
    max_length: f32,
    stiffness: f32,
    damping: f32,

    impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    // Solver temporaries.
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    current_length: f32,
    gamma: f32,
    bias: f32,
    soft_mass: f32,
    mass: f32,
}

impl DistanceJoint {
    pub(crate) fn new(def: &DistanceJointDef) -> PhysicsResult<Self> {
        require(
            def.length.is_finite() && def.length > 0.0,
            "distance joint length must be positive",
        )?;
        require(
            def.min_length >= 0.0 && def.min_length <= def.max_length,
            "distance joint range is inverted",
        )?;
        require(
            def.stiffness >= 0.0 && def.damping >= 0.0,
            "distance joint spring must be non-negative",
        )?;

        let length = def.length.max(LINEAR_SLOP);
        let min_length = def.min_length.max(LINEAR_SLOP);
        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length,
            min_length,
            max_length: def.max_length.max(min_length),
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            current_length: 0.0,
            gamma: 0.0,
            bias: 0.0,
            soft_mass: 0.0,
            mass: 0.0,
        })
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    /// Set the rest length, clamped into the allowed range.
    pub fn set_length(&mut self, length: f32) -> f32 {
        self.impulse = 0.0;
        self.length = length.clamp(LINEAR_SLOP, f32::MAX);
        self.length
    }

    pub fn min_length(&self) -> f32 {
        self.min_length
    }

    pub fn max_length(&self) -> f32 {
        self.max_length
    }

    pub fn set_range(&mut self, min_length: f32, max_length: f32) {
        self.lower_impulse = 0.0;
        self.upper_impulse = 0.0;
        self.min_length = min_length.max(LINEAR_SLOP);
        self.max_length = max_length.max(self.min_length);
    }

    /// Length measured during the last step.
    pub fn current_length(&self) -> f32 {
        self.current_length
    }

    pub fn stiffness(&self) -> f32 {
        self.stiffness
    }

    pub fn set_stiffness(&mut self, stiffness: f32) {
        self.stiffness = stiffness;
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping;
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * (self.impulse + self.lower_impulse - self.upper_impulse) * self.u
    }

    pub fn reaction_torque(&self, _inv_dt: f32) -> f32 {
        0.0
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) {
        let (ca, aa, cb, ab) = b.positions(data);

        let qa = Rot::new(aa);
        let qb = Rot::new(ab);
        self.r_a = qa.mul(self.local_anchor_a - b.local_center_a);
        self.r_b = qb.mul(self.local_anchor_b - b.local_center_b);
        self.u = cb + self.r_b - ca - self.r_a;

        self.current_length = self.u.length();
        if self.current_length > data.config.linear_slop {
            self.u *= 1.0 / self.current_length;
        } else {
            self.u = Vec2::ZERO;
            self.mass = 0.0;
            self.impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        let cr_au = cross(self.r_a, self.u);
        let cr_bu = cross(self.r_b, self.u);
        let mut inv_mass =
            b.inv_mass_a + b.inv_i_a * cr_au * cr_au + b.inv_mass_b + b.inv_i_b * cr_bu * cr_bu;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.stiffness > 0.0 && self.min_length < self.max_length {
            let c = self.current_length - self.length;
            let (gamma, bias_factor) =
                soft_coefficients(self.stiffness, self.damping, data.step.dt);
            self.gamma = gamma;
            self.bias = c * bias_factor;

            inv_mass += self.gamma;
            self.soft_mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
            self.soft_mass = self.mass;
        }

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            self.lower_impulse *= data.step.dt_ratio;
            self.upper_impulse *= data.step.dt_ratio;

            let p = (self.impulse + self.lower_impulse - self.upper_impulse) * self.u;
            self.apply(b, data, p);
        } else {
            self.impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) {
        if self.min_length < self.max_length {
            if self.stiffness > 0.0 {
                let cdot = self.cdot(b, data);
                let impulse = -self.soft_mass * (cdot + self.bias + self.gamma * self.impulse);
                self.impulse += impulse;
                self.apply(b, data, impulse * self.u);
            }

            // Lower limit.
            {
                let c = self.current_length - self.min_length;
                let bias = c.max(0.0) * data.step.inv_dt;
                let cdot = self.cdot(b, data);
                let mut impulse = -self.mass * (cdot + bias);
                let old = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                impulse = self.lower_impulse - old;
                self.apply(b, data, impulse * self.u);
            }

            // Upper limit.
            {
                let c = self.max_length - self.current_length;
                let bias = c.max(0.0) * data.step.inv_dt;
                let cdot = -self.cdot(b, data);
                let mut impulse = -self.mass * (cdot + bias);
                let old = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                impulse = self.upper_impulse - old;
                self.apply(b, data, -impulse * self.u);
            }
        } else {
            // Rigid rod.
            let cdot = self.cdot(b, data);
            let impulse = -self.mass * cdot;
            self.impulse += impulse;
            self.apply(b, data, impulse * self.u);
        }
    }

    pub(crate) fn solve_position_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) -> bool {
        let (mut ca, mut aa, mut cb, mut ab) = b.positions(data);

        let qa = Rot::new(aa);
        let qb = Rot::new(ab);
        let r_a = qa.mul(self.local_anchor_a - b.local_center_a);
        let r_b = qb.mul(self.local_anchor_b - b.local_center_b);
        let d = cb + r_b - ca - r_a;
        let length = d.length();
        let u = if length > 0.0 { d / length } else { Vec2::ZERO };

        let c = if self.min_length == self.max_length {
            length - self.min_length
        } else if length < self.min_length {
            length - self.min_length
        } else if self.max_length < length {
            length - self.max_length
        } else {
            return true;
        };

        let impulse = -self.mass * c;
        let p = impulse * u;

        ca -= b.inv_mass_a * p;
        aa -= b.inv_i_a * cross(r_a, p);
        cb += b.inv_mass_b * p;
        ab += b.inv_i_b * cross(r_b, p);

        b.store_positions(data, ca, aa, cb, ab);

        c.abs() < data.config.linear_slop
    }

    /// Relative velocity of the anchors along the joint axis.
    fn cdot(&self, b: &SolverBodies, data: &SolverData<'_>) -> f32 {
        let va = data.velocities[b.index_a];
        let vb = data.velocities[b.index_b];
        let vp_a = va.v + cross_sv(va.w, self.r_a);
        let vp_b = vb.v + cross_sv(vb.w, self.r_b);
        self.u.dot(vp_b - vp_a)
    }

    fn apply(&self, b: &SolverBodies, data: &mut SolverData<'_>, p: Vec2) {
        b.apply_impulse(data, p, cross(self.r_a, p), cross(self.r_b, p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_def_rejects_inverted_range() {
        let def = DistanceJointDef::default().with_range(2.0, 1.0);
        assert!(DistanceJoint::new(&def).is_err());
    }

    #[test]
    fn test_distance_clamps_to_slop() {
        let def = DistanceJointDef {
            length: 1e-6,
            min_length: 0.0,
            max_length: 1.0,
            ..Default::default()
        };
        let joint = DistanceJoint::new(&def).unwrap();
        assert_eq!(joint.length(), LINEAR_SLOP);
        assert_eq!(joint.min_length(), LINEAR_SLOP);
    }

    #[test]
    fn test_set_range_keeps_order() {
        let mut joint = DistanceJoint::new(&DistanceJointDef::default()).unwrap();
        joint.set_range(3.0, 2.0);
        assert_eq!(joint.min_length(), 3.0);
        assert_eq!(joint.max_length(), 3.0);
    }
}
