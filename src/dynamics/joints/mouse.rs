use glam::{Mat2, Vec2};

use crate::dynamics::body::Body;
use crate::dynamics::island::SolverData;
use crate::error::PhysicsResult;
use crate::math::{cross, cross_sv, inverse22, Rot};

use super::{require, soft_coefficients, SolverBodies};

/// Soft spring pulling a point on body B toward a world target. Body A is
/// only used for island membership; usually the ground.
#[derive(Debug, Clone, Default)]
pub struct MouseJointDef {
    /// World target point.
    pub target: Vec2,
    /// Grabbed point in body B's frame.
    pub local_anchor_b: Vec2,
    /// N. Usually a multiple of the body's weight.
    pub max_force: f32,
    /// N/m.
    pub stiffness: f32,
    /// N*s/m.
    pub damping: f32,
}

impl MouseJointDef {
    /// Grab body B at `target`, using its current pose.
    pub fn new(body_b: &Body, target: Vec2, max_force: f32) -> Self {
        Self {
            target,
            local_anchor_b: body_b.local_point(target),
            max_force,
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
pub struct MouseJoint {
    pub(crate) local_anchor_b: Vec2,
    target: Vec2,
    stiffness: f32,
    damping: f32,
    max_force: f32,

    impulse: Vec2,

    gamma: f32,
    r_b: Vec2,
    c: Vec2,
    mass: Mat2,
}

impl MouseJoint {
    pub(crate) fn new(def: &MouseJointDef) -> PhysicsResult<Self> {
        require(def.target.is_finite(), "mouse joint target must be finite")?;
        require(
            def.max_force >= 0.0 && def.stiffness >= 0.0 && def.damping >= 0.0,
            "mouse joint force and spring must be non-negative",
        )?;

        Ok(Self {
            local_anchor_b: def.local_anchor_b,
            target: def.target,
            stiffness: def.stiffness,
            damping: def.damping,
            max_force: def.max_force,
            impulse: Vec2::ZERO,
            gamma: 0.0,
            r_b: Vec2::ZERO,
            c: Vec2::ZERO,
            mass: Mat2::ZERO,
        })
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// Move the target without waking body B. Use
    /// [`World::set_mouse_target`](crate::World::set_mouse_target) to wake it as well.
    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn set_max_force(&mut self, force: f32) {
        self.max_force = force;
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
        inv_dt * self.impulse
    }

    pub fn reaction_torque(&self, _inv_dt: f32) -> f32 {
        0.0
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) {
        let cb = data.positions[b.index_b].c;
        let ab = data.positions[b.index_b].a;
        let (mb, ib) = (b.inv_mass_b, b.inv_i_b);

        let (gamma, beta) = soft_coefficients(self.stiffness, self.damping, data.step.dt);
        self.gamma = gamma;

        self.r_b = Rot::new(ab).mul(self.local_anchor_b - b.local_center_b);

        let r = self.r_b;
        let k = Mat2::from_cols(
            Vec2::new(mb + ib * r.y * r.y + self.gamma, -ib * r.x * r.y),
            Vec2::new(-ib * r.x * r.y, mb + ib * r.x * r.x + self.gamma),
        );
        self.mass = inverse22(&k);

        self.c = beta * (cb + self.r_b - self.target);

        let vb = &mut data.velocities[b.index_b];
        // Angular damping while grabbed.
        vb.w *= 0.98;

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            vb.v += mb * self.impulse;
            vb.w += ib * cross(self.r_b, self.impulse);
        } else {
            self.impulse = Vec2::ZERO;
        }
    }

    pub(crate) fn solve_velocity_constraints(
        &mut self,
        b: &SolverBodies,
        data: &mut SolverData<'_>,
    ) {
        let vb = &mut data.velocities[b.index_b];

        let cdot = vb.v + cross_sv(vb.w, self.r_b);
        let mut impulse = self.mass * -(cdot + self.c + self.gamma * self.impulse);

        let old = self.impulse;
        self.impulse += impulse;
        let max_impulse = data.step.dt * self.max_force;
        if self.impulse.length_squared() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.length();
        }
        impulse = self.impulse - old;

        vb.v += b.inv_mass_b * impulse;
        vb.w += b.inv_i_b * cross(self.r_b, impulse);
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
    use crate::dynamics::body::BodyDef;

    #[test]
    fn test_mouse_def_grabs_target_point() {
        let body = Body::new(&BodyDef::dynamic(Vec2::new(2.0, 0.0)));
        let def = MouseJointDef::new(&body, Vec2::new(2.5, 1.0), 100.0);
        assert!((def.local_anchor_b - Vec2::new(0.5, 1.0)).length() < 1e-6);
        let joint = MouseJoint::new(&def).unwrap();
        assert_eq!(joint.target(), Vec2::new(2.5, 1.0));
    }

    #[test]
    fn test_mouse_rejects_negative_force() {
        let def = MouseJointDef {
            max_force: -1.0,
            ..Default::default()
        };
        assert!(MouseJoint::new(&def).is_err());
    }
}
