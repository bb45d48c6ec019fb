use glam::Vec2;

use crate::dynamics::body::Body;
use crate::dynamics::island::SolverData;
use crate::error::PhysicsResult;
use crate::math::{cross, Rot};

use super::{require, soft_coefficients, SolverBodies};

/// Vehicle suspension: body B moves along an axis in body A with a spring,
/// rotates freely, and may be driven by a motor.
#[derive(Debug, Clone)]
pub struct WheelJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Suspension axis in body A's frame. Normalized on creation.
    pub local_axis_a: Vec2,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    /// N*m.
    pub max_motor_torque: f32,
    /// Radians per second.
    pub motor_speed: f32,
    /// Suspension stiffness in N/m.
    pub stiffness: f32,
    /// Suspension damping in N*s/m.
    pub damping: f32,
}

impl Default for WheelJointDef {
    fn default() -> Self {
        Self {
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            local_axis_a: Vec2::X,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_torque: 0.0,
            motor_speed: 0.0,
            stiffness: 0.0,
            damping: 0.0,
        }
    }
}

impl WheelJointDef {
    /// Wheel at a world anchor with a world suspension axis, using the current body poses.
    pub fn new(body_a: &Body, body_b: &Body, anchor: Vec2, axis: Vec2) -> Self {
        Self {
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            local_axis_a: body_a.local_vector(axis),
            ..Default::default()
        }
    }

    pub fn with_spring(mut self, stiffness: f32, damping: f32) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
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
pub struct WheelJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    local_x_axis_a: Vec2,
    local_y_axis_a: Vec2,
    enable_limit: bool,
    lower_translation: f32,
    upper_translation: f32,
    enable_motor: bool,
    max_motor_torque: f32,
    motor_speed: f32,
    stiffness: f32,
    damping: f32,

    impulse: f32,
    motor_impulse: f32,
    spring_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    translation: f32,
    ax: Vec2,
    ay: Vec2,
    s_ax: f32,
    s_bx: f32,
    s_ay: f32,
    s_by: f32,
    mass: f32,
    motor_mass: f32,
    axial_mass: f32,
    spring_mass: f32,
    bias: f32,
    gamma: f32,
}

impl WheelJoint {
    pub(crate) fn new(def: &WheelJointDef) -> PhysicsResult<Self> {
        require(
            def.local_axis_a.length_squared() > f32::EPSILON,
            "wheel joint axis must be non-zero",
        )?;
        require(
            def.lower_translation <= def.upper_translation,
            "wheel joint lower translation exceeds upper translation",
        )?;
        require(
            def.stiffness >= 0.0 && def.damping >= 0.0 && def.max_motor_torque >= 0.0,
            "wheel joint spring and motor must be non-negative",
        )?;

        let local_x_axis_a = def.local_axis_a.normalize();
        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis_a,
            local_y_axis_a: local_x_axis_a.perp(),
            enable_limit: def.enable_limit,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            enable_motor: def.enable_motor,
            max_motor_torque: def.max_motor_torque,
            motor_speed: def.motor_speed,
            stiffness: def.stiffness,
            damping: def.damping,
            impulse: 0.0,
            motor_impulse: 0.0,
            spring_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            translation: 0.0,
            ax: Vec2::ZERO,
            ay: Vec2::ZERO,
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            motor_mass: 0.0,
            axial_mass: 0.0,
            spring_mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
        })
    }

    pub fn local_axis_a(&self) -> Vec2 {
        self.local_x_axis_a
    }

    /// Current suspension travel along the axis.
    pub fn joint_translation(&self, body_a: &Body, body_b: &Body) -> f32 {
        let pa = body_a.world_point(self.local_anchor_a);
        let pb = body_b.world_point(self.local_anchor_b);
        (pb - pa).dot(body_a.world_vector(self.local_x_axis_a))
    }

    /// Wheel spin rate relative to body A.
    pub fn joint_angular_speed(&self, body_a: &Body, body_b: &Body) -> f32 {
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

    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        if lower != self.lower_translation || upper != self.upper_translation {
            self.lower_translation = lower.min(upper);
            self.upper_translation = upper.max(lower);
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    pub fn lower_limit(&self) -> f32 {
        self.lower_translation
    }

    pub fn upper_limit(&self) -> f32 {
        self.upper_translation
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
        let axial = self.spring_impulse + self.lower_impulse - self.upper_impulse;
        inv_dt * (self.impulse * self.ay + axial * self.ax)
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) {
        let (ca, aa, cb, ab) = b.positions(data);
        let (ma, mb, ia, ib) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);

        let qa = Rot::new(aa);
        let qb = Rot::new(ab);
        let r_a = qa.mul(self.local_anchor_a - b.local_center_a);
        let r_b = qb.mul(self.local_anchor_b - b.local_center_b);
        let d = cb + r_b - ca - r_a;

        // Point to line.
        self.ay = qa.mul(self.local_y_axis_a);
        self.s_ay = cross(d + r_a, self.ay);
        self.s_by = cross(r_b, self.ay);
        self.mass = ma + mb + ia * self.s_ay * self.s_ay + ib * self.s_by * self.s_by;
        if self.mass > 0.0 {
            self.mass = 1.0 / self.mass;
        }

        // Suspension spring.
        self.ax = qa.mul(self.local_x_axis_a);
        self.s_ax = cross(d + r_a, self.ax);
        self.s_bx = cross(r_b, self.ax);
        let inv_mass = ma + mb + ia * self.s_ax * self.s_ax + ib * self.s_bx * self.s_bx;
        self.axial_mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;
        if self.stiffness > 0.0 && inv_mass > 0.0 {
            let c = d.dot(self.ax);
            let (gamma, bias_factor) =
                soft_coefficients(self.stiffness, self.damping, data.step.dt);
            self.gamma = gamma;
            self.bias = c * bias_factor;

            let soft = inv_mass + self.gamma;
            self.spring_mass = if soft > 0.0 { 1.0 / soft } else { 0.0 };
        } else {
            self.spring_impulse = 0.0;
        }

        if self.enable_limit {
            self.translation = self.ax.dot(d);
        } else {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        if self.enable_motor {
            self.motor_mass = ia + ib;
            if self.motor_mass > 0.0 {
                self.motor_mass = 1.0 / self.motor_mass;
            }
        } else {
            self.motor_mass = 0.0;
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.spring_impulse *= ratio;
            self.motor_impulse *= ratio;
            self.lower_impulse *= ratio;
            self.upper_impulse *= ratio;

            let axial = self.spring_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse * self.ay + axial * self.ax;
            let la = self.impulse * self.s_ay + axial * self.s_ax + self.motor_impulse;
            let lb = self.impulse * self.s_by + axial * self.s_bx + self.motor_impulse;

            b.apply_impulse(data, p, la, lb);
        } else {
            self.impulse = 0.0;
            self.spring_impulse = 0.0;
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
        let (ma, mb, ia, ib) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);

        // Suspension spring.
        {
            let cdot = self.ax.dot(vb - va) + self.s_bx * wb - self.s_ax * wa;
            let impulse =
                -self.spring_mass * (cdot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;

            let p = impulse * self.ax;
            va -= ma * p;
            wa -= ia * impulse * self.s_ax;
            vb += mb * p;
            wb += ib * impulse * self.s_bx;
        }

        // Rotational motor.
        {
            let cdot = wb - wa - self.motor_speed;
            let mut impulse = -self.motor_mass * cdot;
            let old = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old;

            wa -= ia * impulse;
            wb += ib * impulse;
        }

        if self.enable_limit {
            // Lower limit.
            {
                let c = self.translation - self.lower_translation;
                let cdot = self.ax.dot(vb - va) + self.s_bx * wb - self.s_ax * wa;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old = self.lower_impulse;
                self.lower_impulse = (old + impulse).max(0.0);
                impulse = self.lower_impulse - old;

                let p = impulse * self.ax;
                va -= ma * p;
                wa -= ia * impulse * self.s_ax;
                vb += mb * p;
                wb += ib * impulse * self.s_bx;
            }

            // Upper limit, with the constraint negated.
            {
                let c = self.upper_translation - self.translation;
                let cdot = self.ax.dot(va - vb) + self.s_ax * wa - self.s_bx * wb;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old = self.upper_impulse;
                self.upper_impulse = (old + impulse).max(0.0);
                impulse = self.upper_impulse - old;

                let p = impulse * self.ax;
                va += ma * p;
                wa += ia * impulse * self.s_ax;
                vb -= mb * p;
                wb -= ib * impulse * self.s_bx;
            }
        }

        // Point to line.
        {
            let cdot = self.ay.dot(vb - va) + self.s_by * wb - self.s_ay * wa;
            let impulse = -self.mass * cdot;
            self.impulse += impulse;

            let p = impulse * self.ay;
            va -= ma * p;
            wa -= ia * impulse * self.s_ay;
            vb += mb * p;
            wb += ib * impulse * self.s_by;
        }

        b.store_velocities(data, va, wa, vb, wb);
    }

    pub(crate) fn solve_position_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) -> bool {
        let (mut ca, mut aa, mut cb, mut ab) = b.positions(data);
        let (ma, mb, ia, ib) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);
        let slop = data.config.linear_slop;

        let mut linear_error = 0.0_f32;

        if self.enable_limit {
            let qa = Rot::new(aa);
            let qb = Rot::new(ab);
            let r_a = qa.mul(self.local_anchor_a - b.local_center_a);
            let r_b = qb.mul(self.local_anchor_b - b.local_center_b);
            let d = (cb - ca) + r_b - r_a;

            let ax = qa.mul(self.local_x_axis_a);
            let s_ax = cross(d + r_a, ax);
            let s_bx = cross(r_b, ax);

            let translation = ax.dot(d);
            let (lower, upper) = (self.lower_translation, self.upper_translation);
            let c = if (upper - lower).abs() < 2.0 * slop {
                translation - lower
            } else if translation <= lower {
                (translation - lower).min(0.0)
            } else if translation >= upper {
                (translation - upper).max(0.0)
            } else {
                0.0
            };

            if c != 0.0 {
                let inv_mass = ma + mb + ia * s_ax * s_ax + ib * s_bx * s_bx;
                let impulse = if inv_mass != 0.0 { -c / inv_mass } else { 0.0 };

                let p = impulse * ax;
                ca -= ma * p;
                aa -= ia * impulse * s_ax;
                cb += mb * p;
                ab += ib * impulse * s_bx;

                linear_error = c.abs();
            }
        }

        // Point to line.
        {
            let qa = Rot::new(aa);
            let qb = Rot::new(ab);
            let r_a = qa.mul(self.local_anchor_a - b.local_center_a);
            let r_b = qb.mul(self.local_anchor_b - b.local_center_b);
            let d = (cb - ca) + r_b - r_a;

            let ay = qa.mul(self.local_y_axis_a);
            let s_ay = cross(d + r_a, ay);
            let s_by = cross(r_b, ay);

            let c = d.dot(ay);
            let inv_mass = ma + mb + ia * s_ay * s_ay + ib * s_by * s_by;
            let impulse = if inv_mass != 0.0 { -c / inv_mass } else { 0.0 };

            let p = impulse * ay;
            ca -= ma * p;
            aa -= ia * impulse * s_ay;
            cb += mb * p;
            ab += ib * impulse * s_by;

            linear_error = linear_error.max(c.abs());
        }

        b.store_positions(data, ca, aa, cb, ab);

        linear_error <= slop
    }
}
