use glam::{Mat2, Vec2};

use crate::dynamics::body::Body;
use crate::dynamics::island::SolverData;
use crate::error::PhysicsResult;
use crate::math::{cross, cross_sv, inverse22, Rot};

use super::{require, SolverBodies};

/// Top-down friction: resists relative translation and rotation up to a
/// maximum force and torque.
#[derive(Debug, Clone, Default)]
pub struct FrictionJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// N.
    pub max_force: f32,
    /// N*m.
    pub max_torque: f32,
}

impl FrictionJointDef {
    pub fn new(body_a: &Body, body_b: &Body, anchor: Vec2) -> Self {
        Self {
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            ..Default::default()
        }
    }

    pub fn with_limits(mut self, max_force: f32, max_torque: f32) -> Self {
        self.max_force = max_force;
        self.max_torque = max_torque;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FrictionJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    max_force: f32,
    max_torque: f32,

    linear_impulse: Vec2,
    angular_impulse: f32,

    r_a: Vec2,
    r_b: Vec2,
    linear_mass: Mat2,
    angular_mass: f32,
}

impl FrictionJoint {
    pub(crate) fn new(def: &FrictionJointDef) -> PhysicsResult<Self> {
        require(
            def.max_force >= 0.0 && def.max_torque >= 0.0,
            "friction joint limits must be non-negative",
        )?;

        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            max_force: def.max_force,
            max_torque: def.max_torque,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_mass: Mat2::ZERO,
            angular_mass: 0.0,
        })
    }

    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn set_max_force(&mut self, force: f32) {
        self.max_force = force.max(0.0);
    }

    pub fn max_torque(&self) -> f32 {
        self.max_torque
    }

    pub fn set_max_torque(&mut self, torque: f32) {
        self.max_torque = torque.max(0.0);
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.linear_impulse
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.angular_impulse
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) {
        let aa = data.positions[b.index_a].a;
        let ab = data.positions[b.index_b].a;

        self.r_a = Rot::new(aa).mul(self.local_anchor_a - b.local_center_a);
        self.r_b = Rot::new(ab).mul(self.local_anchor_b - b.local_center_b);

        self.linear_mass = inverse22(&b.point_mass(self.r_a, self.r_b));

        self.angular_mass = b.inv_i_a + b.inv_i_b;
        if self.angular_mass > 0.0 {
            self.angular_mass = 1.0 / self.angular_mass;
        }

        if data.step.warm_starting {
            self.linear_impulse *= data.step.dt_ratio;
            self.angular_impulse *= data.step.dt_ratio;

            let p = self.linear_impulse;
            let (la, lb) = (cross(self.r_a, p), cross(self.r_b, p));
            b.apply_impulse(data, p, la + self.angular_impulse, lb + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) {
        let (mut va, mut wa, mut vb, mut wb) = b.velocities(data);
        let (ma, mb, ia, ib) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);
        let h = data.step.dt;

        // Angular friction.
        {
            let cdot = wb - wa;
            let mut impulse = -self.angular_mass * cdot;
            let old = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.angular_impulse - old;

            wa -= ia * impulse;
            wb += ib * impulse;
        }

        // Linear friction.
        {
            let cdot = vb + cross_sv(wb, self.r_b) - va - cross_sv(wa, self.r_a);
            let mut impulse = -(self.linear_mass * cdot);
            let old = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = h * self.max_force;
            if self.linear_impulse.length_squared() > max_impulse * max_impulse {
                self.linear_impulse = self.linear_impulse.normalize_or_zero() * max_impulse;
            }
            impulse = self.linear_impulse - old;

            va -= ma * impulse;
            wa -= ia * cross(self.r_a, impulse);
            vb += mb * impulse;
            wb += ib * cross(self.r_b, impulse);
        }

        b.store_velocities(data, va, wa, vb, wb);
    }

    pub(crate) fn solve_position_constraints(
        &mut self,
        _b: &SolverBodies,
        _data: &mut SolverData<'_>,
    ) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friction_setters_clamp_negative() {
        let mut joint = FrictionJoint::new(&FrictionJointDef::default()).unwrap();
        joint.set_max_force(-2.0);
        joint.set_max_torque(3.0);
        assert_eq!(joint.max_force(), 0.0);
        assert_eq!(joint.max_torque(), 3.0);
    }

    #[test]
    fn test_friction_rejects_negative_limits() {
        let def = FrictionJointDef::default().with_limits(-1.0, 0.0);
        assert!(FrictionJoint::new(&def).is_err());
    }
}
