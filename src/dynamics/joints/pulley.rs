use glam::Vec2;

use crate::dynamics::body::Body;
use crate::dynamics::island::SolverData;
use crate::error::PhysicsResult;
use crate::math::{cross, cross_sv, Rot};

use super::{require, SolverBodies};

/// Connects two bodies over fixed ground pulleys so that
/// `length_a + ratio * length_b` stays constant.
#[derive(Debug, Clone)]
pub struct PulleyJointDef {
    /// World anchor of the pulley over body A.
    pub ground_anchor_a: Vec2,
    /// World anchor of the pulley over body B.
    pub ground_anchor_b: Vec2,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Reference rope length on side A.
    pub length_a: f32,
    /// Reference rope length on side B.
    pub length_b: f32,
    /// Block and tackle ratio.
    pub ratio: f32,
}

impl Default for PulleyJointDef {
    fn default() -> Self {
        Self {
            ground_anchor_a: Vec2::new(-1.0, 1.0),
            ground_anchor_b: Vec2::new(1.0, 1.0),
            local_anchor_a: Vec2::new(-1.0, 0.0),
            local_anchor_b: Vec2::new(1.0, 0.0),
            length_a: 0.0,
            length_b: 0.0,
            ratio: 1.0,
        }
    }
}

impl PulleyJointDef {
    /// Pulley from world anchors, taking the rope lengths from the current poses.
    pub fn new(
        body_a: &Body,
        body_b: &Body,
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        anchor_a: Vec2,
        anchor_b: Vec2,
        ratio: f32,
    ) -> Self {
        Self {
            ground_anchor_a,
            ground_anchor_b,
            local_anchor_a: body_a.local_point(anchor_a),
            local_anchor_b: body_b.local_point(anchor_b),
            length_a: (anchor_a - ground_anchor_a).length(),
            length_b: (anchor_b - ground_anchor_b).length(),
            ratio,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PulleyJoint {
    ground_anchor_a: Vec2,
    ground_anchor_b: Vec2,
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    length_a: f32,
    length_b: f32,
    ratio: f32,
    constant: f32,

    impulse: f32,

    u_a: Vec2,
    u_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
}

impl PulleyJoint {
    pub(crate) fn new(def: &PulleyJointDef) -> PhysicsResult<Self> {
        require(
            def.ratio.is_finite() && def.ratio > f32::EPSILON,
            "pulley ratio must be positive",
        )?;
        require(
            def.length_a >= 0.0 && def.length_b >= 0.0,
            "pulley lengths must be non-negative",
        )?;

        Ok(Self {
            ground_anchor_a: def.ground_anchor_a,
            ground_anchor_b: def.ground_anchor_b,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length_a: def.length_a,
            length_b: def.length_b,
            ratio: def.ratio,
            constant: def.length_a + def.ratio * def.length_b,
            impulse: 0.0,
            u_a: Vec2::ZERO,
            u_b: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
        })
    }

    pub fn ground_anchor_a(&self) -> Vec2 {
        self.ground_anchor_a
    }

    pub fn ground_anchor_b(&self) -> Vec2 {
        self.ground_anchor_b
    }

    pub fn length_a(&self) -> f32 {
        self.length_a
    }

    pub fn length_b(&self) -> f32 {
        self.length_b
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Current rope length on side A.
    pub fn current_length_a(&self, body_a: &Body) -> f32 {
        (body_a.world_point(self.local_anchor_a) - self.ground_anchor_a).length()
    }

    /// Current rope length on side B.
    pub fn current_length_b(&self, body_b: &Body) -> f32 {
        (body_b.world_point(self.local_anchor_b) - self.ground_anchor_b).length()
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse * self.u_b
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

        self.r_a = Rot::new(aa).mul(self.local_anchor_a - b.local_center_a);
        self.r_b = Rot::new(ab).mul(self.local_anchor_b - b.local_center_b);

        // Rope directions.
        self.u_a = rope_direction(ca + self.r_a - self.ground_anchor_a, data.config.linear_slop).0;
        self.u_b = rope_direction(cb + self.r_b - self.ground_anchor_b, data.config.linear_slop).0;

        self.mass = self.effective_mass(b, self.r_a, self.r_b, self.u_a, self.u_b);

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;

            let pa = -self.impulse * self.u_a;
            let pb = -self.ratio * self.impulse * self.u_b;
            self.apply(b, data, pa, pb);
        } else {
            self.impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) {
        let va = data.velocities[b.index_a];
        let vb = data.velocities[b.index_b];

        let vp_a = va.v + cross_sv(va.w, self.r_a);
        let vp_b = vb.v + cross_sv(vb.w, self.r_b);

        let cdot = -self.u_a.dot(vp_a) - self.ratio * self.u_b.dot(vp_b);
        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let pa = -impulse * self.u_a;
        let pb = -self.ratio * impulse * self.u_b;
        self.apply(b, data, pa, pb);
    }

    pub(crate) fn solve_position_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) -> bool {
        let (mut ca, mut aa, mut cb, mut ab) = b.positions(data);
        let slop = data.config.linear_slop;

        let r_a = Rot::new(aa).mul(self.local_anchor_a - b.local_center_a);
        let r_b = Rot::new(ab).mul(self.local_anchor_b - b.local_center_b);

        let (u_a, length_a) = rope_direction(ca + r_a - self.ground_anchor_a, slop);
        let (u_b, length_b) = rope_direction(cb + r_b - self.ground_anchor_b, slop);

        let mass = self.effective_mass(b, r_a, r_b, u_a, u_b);

        let c = self.constant - length_a - self.ratio * length_b;
        let linear_error = c.abs();

        let impulse = -mass * c;
        let pa = -impulse * u_a;
        let pb = -self.ratio * impulse * u_b;

        ca += b.inv_mass_a * pa;
        aa += b.inv_i_a * cross(r_a, pa);
        cb += b.inv_mass_b * pb;
        ab += b.inv_i_b * cross(r_b, pb);

        b.store_positions(data, ca, aa, cb, ab);

        linear_error < slop
    }

    fn effective_mass(&self, b: &SolverBodies, r_a: Vec2, r_b: Vec2, u_a: Vec2, u_b: Vec2) -> f32 {
        let ru_a = cross(r_a, u_a);
        let ru_b = cross(r_b, u_b);
        let m_a = b.inv_mass_a + b.inv_i_a * ru_a * ru_a;
        let m_b = b.inv_mass_b + b.inv_i_b * ru_b * ru_b;
        let mass = m_a + self.ratio * self.ratio * m_b;
        if mass > 0.0 {
            1.0 / mass
        } else {
            0.0
        }
    }

    fn apply(&self, b: &SolverBodies, data: &mut SolverData<'_>, pa: Vec2, pb: Vec2) {
        let va = &mut data.velocities[b.index_a];
        va.v += b.inv_mass_a * pa;
        va.w += b.inv_i_a * cross(self.r_a, pa);
        let vb = &mut data.velocities[b.index_b];
        vb.v += b.inv_mass_b * pb;
        vb.w += b.inv_i_b * cross(self.r_b, pb);
    }
}

/// Unit rope direction and its length. Ropes shorter than ten slops have no direction.
fn rope_direction(d: Vec2, linear_slop: f32) -> (Vec2, f32) {
    let length = d.length();
    if length > 10.0 * linear_slop {
        (d / length, length)
    } else {
        (Vec2::ZERO, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulley_rejects_zero_ratio() {
        let def = PulleyJointDef {
            ratio: 0.0,
            ..Default::default()
        };
        assert!(PulleyJoint::new(&def).is_err());
    }

    #[test]
    fn test_pulley_constant() {
        let def = PulleyJointDef {
            length_a: 2.0,
            length_b: 3.0,
            ratio: 2.0,
            ..Default::default()
        };
        let joint = PulleyJoint::new(&def).unwrap();
        assert!((joint.constant - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_short_rope_has_no_direction() {
        let (u, length) = rope_direction(Vec2::new(0.01, 0.0), 0.005);
        assert_eq!(u, Vec2::ZERO);
        assert!((length - 0.01).abs() < 1e-6);
    }
}
