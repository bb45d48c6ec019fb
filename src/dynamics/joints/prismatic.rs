use glam::{Mat2, Mat3, Vec2, Vec3};

use crate::dynamics::body::Body;
use crate::dynamics::island::SolverData;
use crate::error::PhysicsResult;
use crate::math::{cross, cross_sv, solve22, solve33, Rot};

use super::{require, SolverBodies};

/// Lets body B slide along an axis fixed in body A, with relative rotation
/// locked. Optional translation limits and a linear motor.
#[derive(Debug, Clone)]
pub struct PrismaticJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Translation axis in body A's frame. Normalized on creation.
    pub local_axis_a: Vec2,
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    /// N.
    pub max_motor_force: f32,
    /// Meters per second.
    pub motor_speed: f32,
}

impl Default for PrismaticJointDef {
    fn default() -> Self {
        Self {
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            local_axis_a: Vec2::X,
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_force: 0.0,
            motor_speed: 0.0,
        }
    }
}

impl PrismaticJointDef {
    /// Slider through a world anchor along a world axis, using the current body poses.
    pub fn new(body_a: &Body, body_b: &Body, anchor: Vec2, axis: Vec2) -> Self {
        Self {
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            local_axis_a: body_a.local_vector(axis),
            reference_angle: body_b.angle() - body_a.angle(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_translation = lower;
        self.upper_translation = upper;
        self
    }

    pub fn with_motor(mut self, speed: f32, max_force: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_force = max_force;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PrismaticJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    local_x_axis_a: Vec2,
    local_y_axis_a: Vec2,
    reference_angle: f32,
    enable_limit: bool,
    lower_translation: f32,
    upper_translation: f32,
    enable_motor: bool,
    max_motor_force: f32,
    motor_speed: f32,

    /// Perpendicular and angular impulses.
    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    axis: Vec2,
    perp: Vec2,
    s1: f32,
    s2: f32,
    a1: f32,
    a2: f32,
    k: Mat2,
    translation: f32,
    axial_mass: f32,
}

impl PrismaticJoint {
    pub(crate) fn new(def: &PrismaticJointDef) -> PhysicsResult<Self> {
        require(
            def.local_axis_a.length_squared() > f32::EPSILON,
            "prismatic joint axis must be non-zero",
        )?;
        require(
            def.lower_translation <= def.upper_translation,
            "prismatic joint lower translation exceeds upper translation",
        )?;
        require(
            def.max_motor_force >= 0.0,
            "prismatic joint motor force must be non-negative",
        )?;

        let local_x_axis_a = def.local_axis_a.normalize();
        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis_a,
            local_y_axis_a: local_x_axis_a.perp(),
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            enable_motor: def.enable_motor,
            max_motor_force: def.max_motor_force,
            motor_speed: def.motor_speed,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            axis: Vec2::ZERO,
            perp: Vec2::ZERO,
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            k: Mat2::ZERO,
            translation: 0.0,
            axial_mass: 0.0,
        })
    }

    pub fn local_axis_a(&self) -> Vec2 {
        self.local_x_axis_a
    }

    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    /// Current translation of anchor B along the axis.
    pub fn joint_translation(&self, body_a: &Body, body_b: &Body) -> f32 {
        let pa = body_a.world_point(self.local_anchor_a);
        let pb = body_b.world_point(self.local_anchor_b);
        let axis = body_a.world_vector(self.local_x_axis_a);
        (pb - pa).dot(axis)
    }

    /// Current translation speed along the axis.
    pub fn joint_speed(&self, body_a: &Body, body_b: &Body) -> f32 {
        let r_a = body_a.world_vector(self.local_anchor_a - body_a.local_center());
        let r_b = body_b.world_vector(self.local_anchor_b - body_b.local_center());
        let p1 = body_a.world_center() + r_a;
        let p2 = body_b.world_center() + r_b;
        let d = p2 - p1;
        let axis = body_a.world_vector(self.local_x_axis_a);

        let (va, wa) = (body_a.linear_velocity(), body_a.angular_velocity());
        let (vb, wb) = (body_b.linear_velocity(), body_b.angular_velocity());
        d.dot(cross_sv(wa, axis))
            + axis.dot(vb + cross_sv(wb, r_b) - va - cross_sv(wa, r_a))
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
        self.lower_translation
    }

    pub fn upper_limit(&self) -> f32 {
        self.upper_translation
    }

    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        if lower != self.lower_translation || upper != self.upper_translation {
            self.lower_translation = lower.min(upper);
            self.upper_translation = upper.max(lower);
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
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

    pub fn max_motor_force(&self) -> f32 {
        self.max_motor_force
    }

    pub fn set_max_motor_force(&mut self, force: f32) {
        self.max_motor_force = force;
    }

    pub fn motor_force(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        let axial = self.motor_impulse + self.lower_impulse - self.upper_impulse;
        inv_dt * (self.impulse.x * self.perp + axial * self.axis)
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.y
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
        let d = (cb - ca) + r_b - r_a;

        self.axis = qa.mul(self.local_x_axis_a);
        self.a1 = cross(d + r_a, self.axis);
        self.a2 = cross(r_b, self.axis);
        self.axial_mass = ma + mb + ia * self.a1 * self.a1 + ib * self.a2 * self.a2;
        if self.axial_mass > 0.0 {
            self.axial_mass = 1.0 / self.axial_mass;
        }

        self.perp = qa.mul(self.local_y_axis_a);
        self.s1 = cross(d + r_a, self.perp);
        self.s2 = cross(r_b, self.perp);

        let k11 = ma + mb + ia * self.s1 * self.s1 + ib * self.s2 * self.s2;
        let k12 = ia * self.s1 + ib * self.s2;
        let mut k22 = ia + ib;
        if k22 == 0.0 {
            // Both bodies have fixed rotation.
            k22 = 1.0;
        }
        self.k = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));

        if self.enable_limit {
            self.translation = self.axis.dot(d);
        } else {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.motor_impulse *= ratio;
            self.lower_impulse *= ratio;
            self.upper_impulse *= ratio;

            let axial = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse.x * self.perp + axial * self.axis;
            let la = self.impulse.x * self.s1 + self.impulse.y + axial * self.a1;
            let lb = self.impulse.x * self.s2 + self.impulse.y + axial * self.a2;

            b.apply_impulse(data, p, la, lb);
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
        let (ma, mb, ia, ib) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);

        if self.enable_motor {
            let cdot = self.axis.dot(vb - va) + self.a2 * wb - self.a1 * wa;
            let mut impulse = self.axial_mass * (self.motor_speed - cdot);
            let old = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_force;
            self.motor_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old;

            let p = impulse * self.axis;
            va -= ma * p;
            wa -= ia * impulse * self.a1;
            vb += mb * p;
            wb += ib * impulse * self.a2;
        }

        if self.enable_limit {
            // Lower limit.
            {
                let c = self.translation - self.lower_translation;
                let cdot = self.axis.dot(vb - va) + self.a2 * wb - self.a1 * wa;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old = self.lower_impulse;
                self.lower_impulse = (old + impulse).max(0.0);
                impulse = self.lower_impulse - old;

                let p = impulse * self.axis;
                va -= ma * p;
                wa -= ia * impulse * self.a1;
                vb += mb * p;
                wb += ib * impulse * self.a2;
            }

            // Upper limit, with the constraint negated.
            {
                let c = self.upper_translation - self.translation;
                let cdot = self.axis.dot(va - vb) + self.a1 * wa - self.a2 * wb;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old = self.upper_impulse;
                self.upper_impulse = (old + impulse).max(0.0);
                impulse = self.upper_impulse - old;

                let p = impulse * self.axis;
                va += ma * p;
                wa += ia * impulse * self.a1;
                vb -= mb * p;
                wb -= ib * impulse * self.a2;
            }
        }

        // Perpendicular and angular rows.
        {
            let cdot = Vec2::new(
                self.perp.dot(vb - va) + self.s2 * wb - self.s1 * wa,
                wb - wa,
            );
            let df = solve22(&self.k, -cdot);
            self.impulse += df;

            let p = df.x * self.perp;
            let la = df.x * self.s1 + df.y;
            let lb = df.x * self.s2 + df.y;

            va -= ma * p;
            wa -= ia * la;
            vb += mb * p;
            wb += ib * lb;
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
        let config = data.config;

        let qa = Rot::new(aa);
        let qb = Rot::new(ab);
        let r_a = qa.mul(self.local_anchor_a - b.local_center_a);
        let r_b = qb.mul(self.local_anchor_b - b.local_center_b);
        let d = cb + r_b - ca - r_a;

        let axis = qa.mul(self.local_x_axis_a);
        let a1 = cross(d + r_a, axis);
        let a2 = cross(r_b, axis);
        let perp = qa.mul(self.local_y_axis_a);
        let s1 = cross(d + r_a, perp);
        let s2 = cross(r_b, perp);

        let c1 = Vec2::new(perp.dot(d), ab - aa - self.reference_angle);
        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut active = false;
        let mut c2 = 0.0;
        if self.enable_limit {
            let translation = axis.dot(d);
            let (lower, upper) = (self.lower_translation, self.upper_translation);
            if (upper - lower).abs() < 2.0 * config.linear_slop {
                c2 = translation - lower;
                linear_error = linear_error.max(c2.abs());
                active = true;
            } else if translation <= lower {
                c2 = (translation - lower).min(0.0);
                linear_error = linear_error.max(lower - translation);
                active = true;
            } else if translation >= upper {
                c2 = (translation - upper).max(0.0);
                linear_error = linear_error.max(translation - upper);
                active = true;
            }
        }

        let k11 = ma + mb + ia * s1 * s1 + ib * s2 * s2;
        let k12 = ia * s1 + ib * s2;
        let mut k22 = ia + ib;
        if k22 == 0.0 {
            k22 = 1.0;
        }

        let impulse = if active {
            let k13 = ia * s1 * a1 + ib * s2 * a2;
            let k23 = ia * a1 + ib * a2;
            let k33 = ma + mb + ia * a1 * a1 + ib * a2 * a2;
            let k = Mat3::from_cols(
                Vec3::new(k11, k12, k13),
                Vec3::new(k12, k22, k23),
                Vec3::new(k13, k23, k33),
            );
            solve33(&k, -Vec3::new(c1.x, c1.y, c2))
        } else {
            let k = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
            solve22(&k, -c1).extend(0.0)
        };

        let p = impulse.x * perp + impulse.z * axis;
        let la = impulse.x * s1 + impulse.y + impulse.z * a1;
        let lb = impulse.x * s2 + impulse.y + impulse.z * a2;

        ca -= ma * p;
        aa -= ia * la;
        cb += mb * p;
        ab += ib * lb;

        b.store_positions(data, ca, aa, cb, ab);

        linear_error <= config.linear_slop && angular_error <= config.angular_slop
    }
}
