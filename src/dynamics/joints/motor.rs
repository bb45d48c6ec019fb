use glam::{Mat2, Vec2};

use crate::dynamics::body::Body;
use crate::dynamics::island::SolverData;
use crate::error::PhysicsResult;
use crate::math::{cross, cross_sv, inverse22, Rot};

use super::{require, SolverBodies};

/// Drives body B toward a target offset relative to body A, limited by a
/// maximum force and torque.
#[derive(Debug, Clone)]
pub struct MotorJointDef {
    /// Target position of body B in body A's frame.
    pub linear_offset: Vec2,
    /// Target angle of body B minus the angle of body A.
    pub angular_offset: f32,
    /// N.
    pub max_force: f32,
    /// N*m.
    pub max_torque: f32,
    /// Position correction factor in `[0, 1]`.
    pub correction_factor: f32,
}

impl Default for MotorJointDef {
    fn default() -> Self {
        Self {
            linear_offset: Vec2::ZERO,
            angular_offset: 0.0,
            max_force: 1.0,
            max_torque: 1.0,
            correction_factor: 0.3,
        }
    }
}

impl MotorJointDef {
    /// Hold the current relative pose of the two bodies.
    pub fn new(body_a: &Body, body_b: &Body) -> Self {
        Self {
            linear_offset: body_a.local_point(body_b.position()),
            angular_offset: body_b.angle() - body_a.angle(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct MotorJoint {
    linear_offset: Vec2,
    angular_offset: f32,
    max_force: f32,
    max_torque: f32,
    correction_factor: f32,

    linear_impulse: Vec2,
    angular_impulse: f32,

    r_a: Vec2,
    r_b: Vec2,
    linear_error: Vec2,
    angular_error: f32,
    linear_mass: Mat2,
    angular_mass: f32,
}

impl MotorJoint {
    pub(crate) fn new(def: &MotorJointDef) -> PhysicsResult<Self> {
        require(
            def.max_force >= 0.0 && def.max_torque >= 0.0,
            "motor joint limits must be non-negative",
        )?;
        require(
            (0.0..=1.0).contains(&def.correction_factor),
            "motor joint correction factor must be in [0, 1]",
        )?;

        Ok(Self {
            linear_offset: def.linear_offset,
            angular_offset: def.angular_offset,
            max_force: def.max_force,
            max_torque: def.max_torque,
            correction_factor: def.correction_factor,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_error: Vec2::ZERO,
            angular_error: 0.0,
            linear_mass: Mat2::ZERO,
            angular_mass: 0.0,
        })
    }

    pub fn linear_offset(&self) -> Vec2 {
        self.linear_offset
    }

    pub fn set_linear_offset(&mut self, offset: Vec2) {
        self.linear_offset = offset;
    }

    pub fn angular_offset(&self) -> f32 {
        self.angular_offset
    }

    pub fn set_angular_offset(&mut self, offset: f32) {
        self.angular_offset = offset;
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

    pub fn correction_factor(&self) -> f32 {
        self.correction_factor
    }

    pub fn set_correction_factor(&mut self, factor: f32) {
        self.correction_factor = factor.clamp(0.0, 1.0);
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
        let (ca, aa, cb, ab) = b.positions(data);

        self.r_a = Rot::new(aa).mul(self.linear_offset - b.local_center_a);
        self.r_b = Rot::new(ab).mul(-b.local_center_b);

        self.linear_mass = inverse22(&b.point_mass(self.r_a, self.r_b));

        self.angular_mass = b.inv_i_a + b.inv_i_b;
        if self.angular_mass > 0.0 {
            self.angular_mass = 1.0 / self.angular_mass;
        }

        self.linear_error = cb + self.r_b - ca - self.r_a;
        self.angular_error = ab - aa - self.angular_offset;

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
        let inv_h = data.step.inv_dt;

        // Angular row.
        {
            let cdot = wb - wa + inv_h * self.correction_factor * self.angular_error;
            let mut impulse = -self.angular_mass * cdot;
            let old = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.angular_impulse - old;

            wa -= ia * impulse;
            wb += ib * impulse;
        }

        // Linear rows, clamped to a disk.
        {
            let cdot = vb + cross_sv(wb, self.r_b) - va - cross_sv(wa, self.r_a)
                + inv_h * self.correction_factor * self.linear_error;
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
