//! Rigid bodies.

use glam::Vec2;

use crate::collision::shapes::MassData;
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::{cross, cross_sv, Rot, Sweep, Transform};

use super::contact::ContactHandle;
use super::fixture::FixtureHandle;
use super::joints::JointHandle;

/// How a body takes part in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    /// Zero velocity, infinite mass. Moved only by the user.
    #[default]
    Static,
    /// Moved by its velocity, infinite mass, not affected by forces.
    Kinematic,
    /// Fully simulated.
    Dynamic,
}

/// Generation-checked reference to a body owned by a [`World`](crate::World).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub(crate) hecs::Entity);

impl BodyHandle {
    /// Stable bit representation, usable as a map key outside the world.
    pub fn to_bits(self) -> u64 {
        self.0.to_bits().get()
    }

    pub(crate) fn get(self, registry: &hecs::World) -> PhysicsResult<hecs::Ref<'_, Body>> {
        registry
            .get::<&Body>(self.0)
            .map_err(|_| PhysicsError::InvalidHandle { kind: "body" })
    }

    pub(crate) fn get_mut(self, registry: &hecs::World) -> PhysicsResult<hecs::RefMut<'_, Body>> {
        registry
            .get::<&mut Body>(self.0)
            .map_err(|_| PhysicsError::InvalidHandle { kind: "body" })
    }
}

/// Everything needed to create a body. Shapes are attached afterwards as fixtures.
#[derive(Debug, Clone)]
pub struct BodyDef {
    pub body_type: BodyType,
    /// World position of the body origin.
    pub position: Vec2,
    /// World angle in radians.
    pub angle: f32,
    /// Linear velocity of the body origin.
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Set to false for bodies that should never sleep.
    pub allow_sleep: bool,
    pub awake: bool,
    /// Prevents rotation. Useful for characters.
    pub fixed_rotation: bool,
    /// Fast moving body that should be swept against dynamic bodies too.
    pub bullet: bool,
    pub enabled: bool,
    pub gravity_scale: f32,
    pub user_data: u64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
            gravity_scale: 1.0,
            user_data: 0,
        }
    }
}

impl BodyDef {
    pub fn dynamic(position: Vec2) -> Self {
        Self {
            body_type: BodyType::Dynamic,
            position,
            ..Default::default()
        }
    }

    pub fn kinematic(position: Vec2) -> Self {
        Self {
            body_type: BodyType::Kinematic,
            position,
            ..Default::default()
        }
    }

    pub fn fixed(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

/// A rigid body.
///
/// Read through [`World::body`](crate::World::body). Forces, impulses,
/// velocities and the awake flag can be changed through
/// [`World::body_mut`](crate::World::body_mut); anything that touches fixtures
/// or the broadphase goes through `World`.
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) body_type: BodyType,

    /// Body origin transform.
    pub(crate) xf: Transform,
    /// Center of mass motion for the current step.
    pub(crate) sweep: Sweep,

    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: f32,

    pub(crate) force: Vec2,
    pub(crate) torque: f32,

    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,
    /// Rotational inertia about the center of mass.
    pub(crate) inertia: f32,
    pub(crate) inv_inertia: f32,

    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) gravity_scale: f32,

    pub(crate) sleep_time: f32,
    pub(crate) awake: bool,
    pub(crate) sleeping_allowed: bool,
    pub(crate) bullet: bool,
    pub(crate) fixed_rotation: bool,
    pub(crate) enabled: bool,

    pub(crate) island_flag: bool,
    pub(crate) island_index: usize,

    pub(crate) fixtures: Vec<FixtureHandle>,
    pub(crate) joints: Vec<JointHandle>,
    pub(crate) contacts: Vec<ContactHandle>,

    pub(crate) user_data: u64,
}

impl Body {
    pub(crate) fn new(def: &BodyDef) -> Self {
        let xf = Transform::new(def.position, def.angle);
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: xf.p,
            c: xf.p,
            a0: def.angle,
            a: def.angle,
            alpha0: 0.0,
        };

        let (mass, inv_mass) = if def.body_type == BodyType::Dynamic {
            (1.0, 1.0)
        } else {
            (0.0, 0.0)
        };

        let (linear_velocity, angular_velocity) = if def.body_type == BodyType::Static {
            (Vec2::ZERO, 0.0)
        } else {
            (def.linear_velocity, def.angular_velocity)
        };

        Self {
            body_type: def.body_type,
            xf,
            sweep,
            linear_velocity,
            angular_velocity,
            force: Vec2::ZERO,
            torque: 0.0,
            mass,
            inv_mass,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            awake: def.awake && def.body_type != BodyType::Static,
            sleeping_allowed: def.allow_sleep,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            enabled: def.enabled,
            island_flag: false,
            island_index: 0,
            fixtures: Vec::new(),
            joints: Vec::new(),
            contacts: Vec::new(),
            user_data: def.user_data,
        }
    }

    #[inline]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Transform of the body origin.
    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.xf
    }

    /// World position of the body origin.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    #[inline]
    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    #[inline]
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    #[inline]
    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    #[inline]
    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    #[inline]
    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Rotational inertia about the body origin.
    #[inline]
    pub fn inertia(&self) -> f32 {
        self.inertia + self.mass * self.sweep.local_center.length_squared()
    }

    pub fn mass_data(&self) -> MassData {
        MassData {
            mass: self.mass,
            center: self.sweep.local_center,
            inertia: self.inertia(),
        }
    }

    #[inline]
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn is_bullet(&self) -> bool {
        self.bullet
    }

    #[inline]
    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    #[inline]
    pub fn is_sleeping_allowed(&self) -> bool {
        self.sleeping_allowed
    }

    #[inline]
    pub fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    #[inline]
    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    #[inline]
    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    /// Fixtures attached to this body.
    pub fn fixtures(&self) -> &[FixtureHandle] {
        &self.fixtures
    }

    /// Joints attached to this body.
    pub fn joints(&self) -> &[JointHandle] {
        &self.joints
    }

    /// Contacts that involve one of this body's fixtures.
    pub fn contacts(&self) -> &[ContactHandle] {
        &self.contacts
    }

    pub fn set_linear_velocity(&mut self, v: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        if v.dot(v) > 0.0 {
            self.set_awake(true);
        }
        self.linear_velocity = v;
    }

    pub fn set_angular_velocity(&mut self, w: f32) {
        if self.body_type == BodyType::Static {
            return;
        }
        if w * w > 0.0 {
            self.set_awake(true);
        }
        self.angular_velocity = w;
    }

    /// Apply a force at a world point. Off-center forces also produce torque.
    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.force += force;
        self.torque += cross(point - self.sweep.c, force);
    }

    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.force += force;
    }

    pub fn apply_torque(&mut self, torque: f32, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.torque += torque;
    }

    /// Apply an impulse at a world point. Changes velocity immediately.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.linear_velocity += self.inv_mass * impulse;
        self.angular_velocity += self.inv_inertia * cross(point - self.sweep.c, impulse);
    }

    pub fn apply_linear_impulse_to_center(&mut self, impulse: Vec2, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.linear_velocity += self.inv_mass * impulse;
    }

    pub fn apply_angular_impulse(&mut self, impulse: f32, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.angular_velocity += self.inv_inertia * impulse;
    }

    // Forces only apply to dynamic bodies. A sleeping body ignores input unless woken.
    fn accepts_input(&mut self, wake: bool) -> bool {
        if self.body_type != BodyType::Dynamic {
            return false;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        self.awake
    }

    /// Wake the body or put it to sleep. A sleeping body has zero velocity.
    pub fn set_awake(&mut self, flag: bool) {
        if self.body_type == BodyType::Static {
            return;
        }
        if flag {
            self.awake = true;
            self.sleep_time = 0.0;
        } else {
            self.awake = false;
            self.sleep_time = 0.0;
            self.linear_velocity = Vec2::ZERO;
            self.angular_velocity = 0.0;
            self.force = Vec2::ZERO;
            self.torque = 0.0;
        }
    }

    pub fn set_sleeping_allowed(&mut self, flag: bool) {
        self.sleeping_allowed = flag;
        if !flag {
            self.set_awake(true);
        }
    }

    pub fn set_bullet(&mut self, flag: bool) {
        self.bullet = flag;
    }

    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.gravity_scale = scale;
    }

    pub fn set_linear_damping(&mut self, damping: f32) {
        self.linear_damping = damping;
    }

    pub fn set_angular_damping(&mut self, damping: f32) {
        self.angular_damping = damping;
    }

    pub fn set_user_data(&mut self, data: u64) {
        self.user_data = data;
    }

    #[inline]
    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.xf.mul(local_point)
    }

    #[inline]
    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.xf.q.mul(local_vector)
    }

    #[inline]
    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.xf.mul_t(world_point)
    }

    #[inline]
    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.xf.q.mul_t(world_vector)
    }

    /// Velocity of a world point attached to this body.
    pub fn linear_velocity_from_world_point(&self, world_point: Vec2) -> Vec2 {
        self.linear_velocity + cross_sv(self.angular_velocity, world_point - self.sweep.c)
    }

    pub fn linear_velocity_from_local_point(&self, local_point: Vec2) -> Vec2 {
        self.linear_velocity_from_world_point(self.world_point(local_point))
    }

    /// Can a contact form between this body and `other` based on body types alone?
    pub(crate) fn types_collide(&self, other: &Body) -> bool {
        self.body_type == BodyType::Dynamic || other.body_type == BodyType::Dynamic
    }

    /// Recompute the origin transform from the end of the sweep.
    pub(crate) fn synchronize_transform(&mut self) {
        self.xf.q = Rot::new(self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q.mul(self.sweep.local_center);
    }

    /// Transform at the start of the sweep.
    pub(crate) fn start_transform(&self) -> Transform {
        let q = Rot::new(self.sweep.a0);
        Transform {
            p: self.sweep.c0 - q.mul(self.sweep.local_center),
            q,
        }
    }

    /// Move the body back in time to `alpha` and drop the rest of the sweep.
    pub(crate) fn advance(&mut self, alpha: f32) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    /// Set mass properties from accumulated fixture mass data.
    pub(crate) fn apply_mass(&mut self, mass: f32, weighted_center: Vec2, inertia: f32) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;
        self.sweep.local_center = Vec2::ZERO;

        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.xf.p;
            self.sweep.c = self.xf.p;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        let mut local_center = Vec2::ZERO;
        if mass > 0.0 {
            self.mass = mass;
            self.inv_mass = 1.0 / mass;
            local_center = weighted_center * self.inv_mass;
        } else {
            // Bodies without massive fixtures still respond to gravity.
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if inertia > 0.0 && !self.fixed_rotation {
            self.inertia = inertia - self.mass * local_center.dot(local_center);
            if self.inertia > 0.0 {
                self.inv_inertia = 1.0 / self.inertia;
            } else {
                self.inertia = 0.0;
            }
        }

        self.move_center(local_center);
    }

    /// Caller-fixed mass properties. Ignored for static and kinematic bodies.
    pub(crate) fn set_mass_data(&mut self, data: &MassData) {
        if self.body_type != BodyType::Dynamic {
            return;
        }

        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;

        self.mass = if data.mass > 0.0 { data.mass } else { 1.0 };
        self.inv_mass = 1.0 / self.mass;

        if data.inertia > 0.0 && !self.fixed_rotation {
            self.inertia = data.inertia - self.mass * data.center.dot(data.center);
            if self.inertia > 0.0 {
                self.inv_inertia = 1.0 / self.inertia;
            } else {
                self.inertia = 0.0;
            }
        }

        self.move_center(data.center);
    }

    fn move_center(&mut self, local_center: Vec2) {
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.xf.mul(local_center);
        self.sweep.c0 = self.sweep.c;

        // Keep the velocity of the origin unchanged.
        self.linear_velocity += cross_sv(self.angular_velocity, self.sweep.c - old_center);
    }

    pub(crate) fn set_transform(&mut self, position: Vec2, angle: f32) {
        self.xf = Transform::new(position, angle);
        self.sweep.c = self.xf.mul(self.sweep.local_center);
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamic_body() -> Body {
        Body::new(&BodyDef::dynamic(Vec2::new(1.0, 2.0)))
    }

    #[test]
    fn test_body_def_defaults() {
        let def = BodyDef::default();
        assert_eq!(def.body_type, BodyType::Static);
        assert!(def.awake);
        assert!(def.allow_sleep);
        assert_eq!(def.gravity_scale, 1.0);
    }

    #[test]
    fn test_static_body_is_not_awake() {
        let body = Body::new(&BodyDef::fixed(Vec2::ZERO));
        assert!(!body.is_awake());
        assert_eq!(body.mass(), 0.0);
    }

    #[test]
    fn test_apply_force_off_center_produces_torque() {
        let mut body = dynamic_body();
        body.apply_force(Vec2::new(0.0, 1.0), Vec2::new(2.0, 2.0), true);
        assert_eq!(body.force, Vec2::new(0.0, 1.0));
        assert!((body.torque - 1.0).abs() < 1e-6, "torque = {}", body.torque);
    }

    #[test]
    fn test_sleeping_body_ignores_force_without_wake() {
        let mut body = dynamic_body();
        body.set_awake(false);
        body.apply_force_to_center(Vec2::new(5.0, 0.0), false);
        assert_eq!(body.force, Vec2::ZERO);

        body.apply_force_to_center(Vec2::new(5.0, 0.0), true);
        assert!(body.is_awake());
        assert_eq!(body.force, Vec2::new(5.0, 0.0));
    }

    #[test]
    fn test_set_awake_false_clears_motion() {
        let mut body = dynamic_body();
        body.set_linear_velocity(Vec2::new(3.0, 0.0));
        body.set_angular_velocity(1.0);
        body.set_awake(false);
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        assert_eq!(body.angular_velocity(), 0.0);
    }

    #[test]
    fn test_apply_mass_moves_center() {
        let mut body = dynamic_body();
        body.apply_mass(2.0, Vec2::new(2.0, 0.0), 4.0);
        assert_eq!(body.mass(), 2.0);
        assert!((body.local_center() - Vec2::new(1.0, 0.0)).length() < 1e-6);
        assert!((body.world_center() - Vec2::new(2.0, 2.0)).length() < 1e-6);
        // Inertia about the center: 4 - 2 * 1.
        assert!((body.inertia - 2.0).abs() < 1e-6);
        assert!((body.inertia() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_fixed_rotation_has_no_inertia() {
        let mut body = Body::new(&BodyDef {
            fixed_rotation: true,
            ..BodyDef::dynamic(Vec2::ZERO)
        });
        body.apply_mass(1.0, Vec2::ZERO, 1.0);
        assert_eq!(body.inv_inertia, 0.0);
    }

    #[test]
    fn test_point_conversions_roundtrip() {
        let body = Body::new(&BodyDef {
            angle: 0.5,
            ..BodyDef::dynamic(Vec2::new(3.0, -1.0))
        });
        let p = Vec2::new(0.25, 4.0);
        let back = body.local_point(body.world_point(p));
        assert!((back - p).length() < 1e-5);
    }

    #[test]
    fn test_velocity_of_point() {
        let mut body = dynamic_body();
        body.set_angular_velocity(2.0);
        let v = body.linear_velocity_from_world_point(body.world_center() + Vec2::new(1.0, 0.0));
        assert!((v - Vec2::new(0.0, 2.0)).length() < 1e-6);
    }
}
