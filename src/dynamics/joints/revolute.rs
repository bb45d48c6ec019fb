use glam::{Mat2, Vec2};

use crate::dynamics::body::Body;
use crate::dynamics::island::SolverData;
use crate::error::PhysicsResult;
use crate::math::{cross, cross_sv, solve22, Rot};

use super::{require, SolverBodies};

/// Pins two bodies together at a shared anchor, leaving relative rotation
/// free apart from an optional angle range and motor.
#[derive(Debug, Clone, Default)]
pub struct RevoluteJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Body B angle minus body A angle in the reference pose.
    pub reference_angle: f32,
    pub enable_limit: bool,
    /// Radians.
    pub lower_angle: f32,
    /// Radians.
    pub upper_angle: f32,
    pub enable_motor: bool,
    /// Radians per second.
    pub motor_speed: f32,
    /// N*m.
    pub max_motor_torque: f32,
}

impl RevoluteJointDef {
    /// Hinge at a world anchor, using the current body poses.
    pub fn new(body_a: &Body, body_b: &Body, anchor: Vec2) -> Self {
        Self {
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            reference_angle: body_b.angle() - body_a.angle(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_angle = lower;
        self.upper_angle = upper;
        self
    }

    pub fn with_motor(mut self, speed: f32, max_torque: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_torque = max_torque;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RevoluteJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    reference_angle: f32,
    enable_limit: bool,
    lower_angle: f32,
    upper_angle: f32,
    enable_motor: bool,
    motor_speed: f32,
    max_motor_torque: f32,

    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    r_a: Vec2,
    r_b: Vec2,
    k: Mat2,
    angle: f32,
    axial_mass: f32,
}

impl RevoluteJoint {
    pub(crate) fn new(def: &RevoluteJointDef) -> PhysicsResult<Self> {
        require(
            def.lower_angle <= def.upper_angle,
            "revolute joint lower angle exceeds upper angle",
        )?;
        require(
            def.max_motor_torque >= 0.0,
            "revolute joint motor torque must be non-negative",
        )?;

        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_angle: def.lower_angle,
            upper_angle: def.upper_angle,
            enable_motor: def.enable_motor,
            motor_speed: def.motor_speed,
            max_motor_torque: def.max_motor_torque,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k: Mat2::ZERO,
            angle: 0.0,
            axial_mass: 0.0,
        })
    }

    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    /// Current joint angle in radians.
    pub fn joint_angle(&self, body_a: &Body, body_b: &Body) -> f32 {
        body_b.angle() - body_a.angle() - self.reference_angle
    }

    /// Current joint angular speed in radians per second.
    pub fn joint_speed(&self, body_a: &Body, body_b: &Body) -> f32 {
        body_b.angular_velocity() - body_a.angular_velocity()
    }

    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    pub fn enable_limit(&mut self, flag: bool) {
        if flag != self.enable_limit {
            self.enable_limit = flag;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    pub fn lower_limit(&self) -> f32 {
        self.lower_angle
    }

    pub fn upper_limit(&self) -> f32 {
        self.upper_angle
    }

    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        if lower != self.lower_angle || upper != self.upper_angle {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
            self.lower_angle = lower.min(upper);
            self.upper_angle = upper.max(lower);
        }
    }

    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    pub fn enable_motor(&mut self, flag: bool) {
        self.enable_motor = flag;
    }

    pub fn motor_speed(&self) -> f32 {
        self.motor_speed
    }

    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    pub fn max_motor_torque(&self) -> f32 {
        self.max_motor_torque
    }

    pub fn set_max_motor_torque(&mut self, torque: f32) {
        self.max_motor_torque = torque;
    }

    pub fn motor_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * (self.motor_impulse + self.lower_impulse - self.upper_impulse)
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
        self.k = b.point_mass(self.r_a, self.r_b);

        self.axial_mass = b.inv_i_a + b.inv_i_b;
        let fixed_rotation = self.axial_mass == 0.0;
        if self.axial_mass > 0.0 {
            self.axial_mass = 1.0 / self.axial_mass;
        }

        self.angle = ab - aa - self.reference_angle;
        if !self.enable_limit || fixed_rotation {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor || fixed_rotation {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.motor_impulse *= ratio;
            self.lower_impulse *= ratio;
            self.upper_impulse *= ratio;

            let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse;

            let (la, lb) = (cross(self.r_a, p), cross(self.r_b, p));
            b.apply_impulse(data, p, la + axial_impulse, lb + axial_impulse);
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) {
        let (mut va, mut wa, mut vb, mut wb) = b.velocities(data);

        let (ia, ib) = (b.inv_i_a, b.inv_i_b);
        let fixed_rotation = ia + ib == 0.0;

        if self.enable_motor && !fixed_rotation {
            let cdot = wb - wa - self.motor_speed;
            let mut impulse = -self.axial_mass * cdot;
            let old = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old;

            wa -= ia * impulse;
            wb += ib * impulse;
        }

        if self.enable_limit && !fixed_rotation {
            // Lower limit.
            {
                let c = self.angle - self.lower_angle;
                let cdot = wb - wa;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old = self.lower_impulse;
                self.lower_impulse = (old + impulse).max(0.0);
                impulse = self.lower_impulse - old;

                wa -= ia * impulse;
                wb += ib * impulse;
            }

            // Upper limit. The sign flips so the accumulated impulse stays positive.
            {
                let c = self.upper_angle - self.angle;
                let cdot = wa - wb;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old = self.upper_impulse;
                self.upper_impulse = (old + impulse).max(0.0);
                impulse = self.upper_impulse - old;

                wa += ia * impulse;
                wb -= ib * impulse;
            }
        }

        // Point to point.
        {
            let cdot = vb + cross_sv(wb, self.r_b) - va - cross_sv(wa, self.r_a);
            let impulse = solve22(&self.k, -cdot);
            self.impulse += impulse;

            va -= b.inv_mass_a * impulse;
            wa -= ia * cross(self.r_a, impulse);
            vb += b.inv_mass_b * impulse;
            wb += ib * cross(self.r_b, impulse);
        }

        b.store_velocities(data, va, wa, vb, wb);
    }

    pub(crate) fn solve_position_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) -> bool {
        let (mut ca, mut aa, mut cb, mut ab) = b.positions(data);

        let config = data.config;
        let (ia, ib) = (b.inv_i_a, b.inv_i_b);
        let fixed_rotation = ia + ib == 0.0;

        let mut angular_error = 0.0;
        if self.enable_limit && !fixed_rotation {
            let angle = ab - aa - self.reference_angle;
            let max_correction = config.max_angular_correction;

            let c = if (self.upper_angle - self.lower_angle).abs() < 2.0 * config.angular_slop {
                (angle - self.lower_angle).clamp(-max_correction, max_correction)
            } else if angle <= self.lower_angle {
                (angle - self.lower_angle + config.angular_slop).clamp(-max_correction, 0.0)
            } else if angle >= self.upper_angle {
                (angle - self.upper_angle - config.angular_slop).clamp(0.0, max_correction)
            } else {
                0.0
            };

            let limit_impulse = -self.axial_mass * c;
            aa -= ia * limit_impulse;
            ab += ib * limit_impulse;
            angular_error = c.abs();
        }

        let r_a = Rot::new(aa).mul(self.local_anchor_a - b.local_center_a);
        let r_b = Rot::new(ab).mul(self.local_anchor_b - b.local_center_b);

        let c = cb + r_b - ca - r_a;
        let position_error = c.length();

        let k = b.point_mass(r_a, r_b);
        let impulse = -solve22(&k, c);

        ca -= b.inv_mass_a * impulse;
        aa -= ia * cross(r_a, impulse);
        cb += b.inv_mass_b * impulse;
        ab += ib * cross(r_b, impulse);

        b.store_positions(data, ca, aa, cb, ab);

        position_error <= config.linear_slop && angular_error <= config.angular_slop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revolute_rejects_inverted_limits() {
        let def = RevoluteJointDef::default().with_limit(1.0, -1.0);
        assert!(RevoluteJoint::new(&def).is_err());
    }

    #[test]
    fn test_set_limits_orders_bounds() {
        let mut joint = RevoluteJoint::new(&RevoluteJointDef::default()).unwrap();
        joint.set_limits(0.5, -0.5);
        assert_eq!(joint.lower_limit(), -0.5);
        assert_eq!(joint.upper_limit(), 0.5);
    }
}
