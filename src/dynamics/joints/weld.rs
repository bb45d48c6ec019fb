use glam::{Mat3, Vec2, Vec3};

use crate::dynamics::body::Body;
use crate::dynamics::island::SolverData;
use crate::error::PhysicsResult;
use crate::math::{cross, cross_sv, inverse22_of33, solve33, solve33_block22, sym_inverse33, Rot};

use super::{require, soft_coefficients, SolverBodies};

/// Glues two bodies together. With a positive stiffness the angular row
/// becomes a spring.
#[derive(Debug, Clone, Default)]
pub struct WeldJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub reference_angle: f32,
    /// Angular stiffness in N*m/rad. Zero makes the weld rigid.
    pub stiffness: f32,
    /// Angular damping in N*m*s/rad.
    pub damping: f32,
}

impl WeldJointDef {
    /// Weld at a world anchor, using the current body poses.
    pub fn new(body_a: &Body, body_b: &Body, anchor: Vec2) -> Self {
        Self {
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            reference_angle: body_b.angle() - body_a.angle(),
            ..Default::default()
        }
    }

    pub fn with_spring(mut self, stiffness: f32, damping: f32) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }
}

#[derive(Debug, Clone)]
pub struct WeldJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    reference_angle: f32,
    stiffness: f32,
    damping: f32,
    gamma: f32,
    bias: f32,

    impulse: Vec3,

    r_a: Vec2,
    r_b: Vec2,
    mass: Mat3,
}

impl WeldJoint {
    pub(crate) fn new(def: &WeldJointDef) -> PhysicsResult<Self> {
        require(
            def.stiffness >= 0.0 && def.damping >= 0.0,
            "weld joint spring must be non-negative",
        )?;

        Ok(Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            stiffness: def.stiffness,
            damping: def.damping,
            gamma: 0.0,
            bias: 0.0,
            impulse: Vec3::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Mat3::ZERO,
        })
    }

    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
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
        inv_dt * self.impulse.truncate()
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.z
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

        let k = weld_mass(b, self.r_a, self.r_b);

        if self.stiffness > 0.0 {
            self.mass = inverse22_of33(&k);

            let c = ab - aa - self.reference_angle;
            let (gamma, bias_factor) =
                soft_coefficients(self.stiffness, self.damping, data.step.dt);
            self.gamma = gamma;
            self.bias = c * bias_factor;

            let inv_m = b.inv_i_a + b.inv_i_b + self.gamma;
            self.mass.z_axis.z = if inv_m != 0.0 { 1.0 / inv_m } else { 0.0 };
        } else if k.z_axis.z == 0.0 {
            self.mass = inverse22_of33(&k);
            self.gamma = 0.0;
            self.bias = 0.0;
        } else {
            self.mass = sym_inverse33(&k);
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            let p = self.impulse.truncate();
            let (la, lb) = (cross(self.r_a, p), cross(self.r_b, p));
            b.apply_impulse(data, p, la + self.impulse.z, lb + self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
        }
    }

    pub(crate) fn solve_velocity_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) {
        let (mut va, mut wa, mut vb, mut wb) = b.velocities(data);
        let (ma, mb, ia, ib) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);

        if self.stiffness > 0.0 {
            let cdot2 = wb - wa;
            let impulse2 =
                -self.mass.z_axis.z * (cdot2 + self.bias + self.gamma * self.impulse.z);
            self.impulse.z += impulse2;

            wa -= ia * impulse2;
            wb += ib * impulse2;

            let cdot1 = vb + cross_sv(wb, self.r_b) - va - cross_sv(wa, self.r_a);
            let impulse1 = -(self.mass * cdot1.extend(0.0)).truncate();
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;

            va -= ma * impulse1;
            wa -= ia * cross(self.r_a, impulse1);
            vb += mb * impulse1;
            wb += ib * cross(self.r_b, impulse1);
        } else {
            let cdot1 = vb + cross_sv(wb, self.r_b) - va - cross_sv(wa, self.r_a);
            let cdot2 = wb - wa;
            let impulse = -(self.mass * cdot1.extend(cdot2));
            self.impulse += impulse;

            let p = impulse.truncate();
            va -= ma * p;
            wa -= ia * (cross(self.r_a, p) + impulse.z);
            vb += mb * p;
            wb += ib * (cross(self.r_b, p) + impulse.z);
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

        let r_a = Rot::new(aa).mul(self.local_anchor_a - b.local_center_a);
        let r_b = Rot::new(ab).mul(self.local_anchor_b - b.local_center_b);
        let k = weld_mass(b, r_a, r_b);

        let c1 = cb + r_b - ca - r_a;
        let position_error = c1.length();
        let angular_error;

        if self.stiffness > 0.0 {
            angular_error = 0.0;
            let p = -solve33_block22(&k, c1);

            ca -= ma * p;
            aa -= ia * cross(r_a, p);
            cb += mb * p;
            ab += ib * cross(r_b, p);
        } else {
            let c2 = ab - aa - self.reference_angle;
            angular_error = c2.abs();

            let impulse = if k.z_axis.z > 0.0 {
                -solve33(&k, c1.extend(c2))
            } else {
                (-solve33_block22(&k, c1)).extend(0.0)
            };

            let p = impulse.truncate();
            ca -= ma * p;
            aa -= ia * (cross(r_a, p) + impulse.z);
            cb += mb * p;
            ab += ib * (cross(r_b, p) + impulse.z);
        }

        b.store_positions(data, ca, aa, cb, ab);

        position_error <= config.linear_slop && angular_error <= config.angular_slop
    }
}

/// Effective mass of the combined point and angle constraint.
fn weld_mass(b: &SolverBodies, r_a: Vec2, r_b: Vec2) -> Mat3 {
    let (ma, mb, ia, ib) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);
    let ex = Vec3::new(
        ma + mb + r_a.y * r_a.y * ia + r_b.y * r_b.y * ib,
        -r_a.y * r_a.x * ia - r_b.y * r_b.x * ib,
        -r_a.y * ia - r_b.y * ib,
    );
    let ey = Vec3::new(
        ex.y,
        ma + mb + r_a.x * r_a.x * ia + r_b.x * r_b.x * ib,
        r_a.x * ia + r_b.x * ib,
    );
    let ez = Vec3::new(ex.z, ey.z, ia + ib);
    Mat3::from_cols(ex, ey, ez)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weld_rejects_negative_spring() {
        let def = WeldJointDef::default().with_spring(-1.0, 0.0);
        assert!(WeldJoint::new(&def).is_err());
    }

    #[test]
    fn test_weld_mass_is_symmetric() {
        let b = SolverBodies {
            inv_mass_a: 1.0,
            inv_mass_b: 1.0,
            inv_i_a: 0.5,
            inv_i_b: 0.25,
            ..Default::default()
        };
        let k = weld_mass(&b, Vec2::new(0.5, 0.1), Vec2::new(-0.5, 0.2));
        assert!((k.x_axis.z - k.z_axis.x).abs() < 1e-6);
        assert!((k.y_axis.z - k.z_axis.y).abs() < 1e-6);
        assert!((k.z_axis.z - 0.75).abs() < 1e-6);
    }
}
