//! Joint constraints.
//!
//! Every joint follows the same three-phase protocol as contacts:
//! `init_velocity_constraints` computes Jacobians and effective masses from the
//! current positions, `solve_velocity_constraints` applies impulses, and
//! `solve_position_constraints` removes residual drift with a non-linear
//! Gauss-Seidel pass.
//!
//! A joint carries a breakpoint. When its reaction force exceeds the
//! breakpoint the world disables it and queues a
//! [`WorldEvent::JointBroke`](crate::WorldEvent::JointBroke).

mod distance;
mod friction;
mod motor;
mod mouse;
mod prismatic;
mod pulley;
mod revolute;
mod weld;
mod wheel;

pub use distance::{DistanceJoint, DistanceJointDef};
pub use friction::{FrictionJoint, FrictionJointDef};
pub use motor::{MotorJoint, MotorJointDef};
pub use mouse::{MouseJoint, MouseJointDef};
pub use prismatic::{PrismaticJoint, PrismaticJointDef};
pub use pulley::{PulleyJoint, PulleyJointDef};
pub use revolute::{RevoluteJoint, RevoluteJointDef};
pub use weld::{WeldJoint, WeldJointDef};
pub use wheel::{WheelJoint, WheelJointDef};

use glam::{Mat2, Vec2};

use crate::error::{PhysicsError, PhysicsResult};

use super::body::{Body, BodyHandle};
use super::island::SolverData;

/// Generation-checked reference to a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JointHandle(pub(crate) hecs::Entity);

impl JointHandle {
    pub fn to_bits(self) -> u64 {
        self.0.to_bits().get()
    }

    pub(crate) fn get(self, registry: &hecs::World) -> PhysicsResult<hecs::Ref<'_, Joint>> {
        registry
            .get::<&Joint>(self.0)
            .map_err(|_| PhysicsError::InvalidHandle { kind: "joint" })
    }

    pub(crate) fn get_mut(self, registry: &hecs::World) -> PhysicsResult<hecs::RefMut<'_, Joint>> {
        registry
            .get::<&mut Joint>(self.0)
            .map_err(|_| PhysicsError::InvalidHandle { kind: "joint" })
    }
}

/// Island-local view of the two bodies, filled in before each solve.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SolverBodies {
    pub index_a: usize,
    pub index_b: usize,
    pub local_center_a: Vec2,
    pub local_center_b: Vec2,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
}

impl SolverBodies {
    /// `(c_a, a_a, c_b, a_b)`.
    pub(crate) fn positions(&self, data: &SolverData<'_>) -> (Vec2, f32, Vec2, f32) {
        let (a, b) = (data.positions[self.index_a], data.positions[self.index_b]);
        (a.c, a.a, b.c, b.a)
    }

    pub(crate) fn store_positions(
        &self,
        data: &mut SolverData<'_>,
        ca: Vec2,
        aa: f32,
        cb: Vec2,
        ab: f32,
    ) {
        data.positions[self.index_a].c = ca;
        data.positions[self.index_a].a = aa;
        data.positions[self.index_b].c = cb;
        data.positions[self.index_b].a = ab;
    }

    /// `(v_a, w_a, v_b, w_b)`.
    pub(crate) fn velocities(&self, data: &SolverData<'_>) -> (Vec2, f32, Vec2, f32) {
        let (a, b) = (data.velocities[self.index_a], data.velocities[self.index_b]);
        (a.v, a.w, b.v, b.w)
    }

    pub(crate) fn store_velocities(
        &self,
        data: &mut SolverData<'_>,
        va: Vec2,
        wa: f32,
        vb: Vec2,
        wb: f32,
    ) {
        data.velocities[self.index_a].v = va;
        data.velocities[self.index_a].w = wa;
        data.velocities[self.index_b].v = vb;
        data.velocities[self.index_b].w = wb;
    }

    /// Apply `p` to B and `-p` to A, with angular impulses `la` on A and `lb` on B
    /// (A receives `-la`).
    pub(crate) fn apply_impulse(&self, data: &mut SolverData<'_>, p: Vec2, la: f32, lb: f32) {
        let va = &mut data.velocities[self.index_a];
        va.v -= self.inv_mass_a * p;
        va.w -= self.inv_i_a * la;
        let vb = &mut data.velocities[self.index_b];
        vb.v += self.inv_mass_b * p;
        vb.w += self.inv_i_b * lb;
    }

    /// Effective mass matrix of a point-to-point constraint with lever arms `r_a`, `r_b`.
    pub(crate) fn point_mass(&self, r_a: Vec2, r_b: Vec2) -> Mat2 {
        let (ma, mb, ia, ib) = (self.inv_mass_a, self.inv_mass_b, self.inv_i_a, self.inv_i_b);
        let exy = -r_a.y * r_a.x * ia - r_b.y * r_b.x * ib;
        Mat2::from_cols(
            Vec2::new(ma + mb + r_a.y * r_a.y * ia + r_b.y * r_b.y * ib, exy),
            Vec2::new(exy, ma + mb + r_a.x * r_a.x * ia + r_b.x * r_b.x * ib),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointType {
    Distance,
    Revolute,
    Prismatic,
    Weld,
    Pulley,
    Motor,
    Mouse,
    Wheel,
    Friction,
}

/// Per-kind parameters for [`JointDef`].
#[derive(Debug, Clone)]
pub enum JointDefKind {
    Distance(DistanceJointDef),
    Revolute(RevoluteJointDef),
    Prismatic(PrismaticJointDef),
    Weld(WeldJointDef),
    Pulley(PulleyJointDef),
    Motor(MotorJointDef),
    Mouse(MouseJointDef),
    Wheel(WheelJointDef),
    Friction(FrictionJointDef),
}

macro_rules! impl_from_def {
    ($($variant:ident => $def:ty),* $(,)?) => {
        $(
            impl From<$def> for JointDefKind {
                fn from(def: $def) -> Self {
                    JointDefKind::$variant(def)
                }
            }
        )*
    };
}

impl_from_def! {
    Distance => DistanceJointDef,
    Revolute => RevoluteJointDef,
    Prismatic => PrismaticJointDef,
    Weld => WeldJointDef,
    Pulley => PulleyJointDef,
    Motor => MotorJointDef,
    Mouse => MouseJointDef,
    Wheel => WheelJointDef,
    Friction => FrictionJointDef,
}

/// Everything needed to create a joint.
#[derive(Debug, Clone)]
pub struct JointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Allow contacts between the two connected bodies.
    pub collide_connected: bool,
    /// Reaction force above which the joint breaks. Default: infinity.
    pub breakpoint: f32,
    pub user_data: u64,
    pub kind: JointDefKind,
}

impl JointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, kind: impl Into<JointDefKind>) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            breakpoint: f32::INFINITY,
            user_data: 0,
            kind: kind.into(),
        }
    }

    pub fn with_breakpoint(mut self, breakpoint: f32) -> Self {
        self.breakpoint = breakpoint;
        self
    }

    pub fn with_collide_connected(mut self, flag: bool) -> Self {
        self.collide_connected = flag;
        self
    }
}

/// Joint state for each kind.
#[derive(Debug, Clone)]
pub enum JointKind {
    Distance(DistanceJoint),
    Revolute(RevoluteJoint),
    Prismatic(PrismaticJoint),
    Weld(WeldJoint),
    Pulley(PulleyJoint),
    Motor(MotorJoint),
    Mouse(MouseJoint),
    Wheel(WheelJoint),
    Friction(FrictionJoint),
}

macro_rules! dispatch {
    ($kind:expr, $joint:ident => $body:expr) => {
        match $kind {
            JointKind::Distance($joint) => $body,
            JointKind::Revolute($joint) => $body,
            JointKind::Prismatic($joint) => $body,
            JointKind::Weld($joint) => $body,
            JointKind::Pulley($joint) => $body,
            JointKind::Motor($joint) => $body,
            JointKind::Mouse($joint) => $body,
            JointKind::Wheel($joint) => $body,
            JointKind::Friction($joint) => $body,
        }
    };
}

/// A constraint between two bodies.
#[derive(Debug, Clone)]
pub struct Joint {
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) collide_connected: bool,
    pub(crate) enabled: bool,
    pub(crate) breakpoint: f32,
    pub(crate) user_data: u64,
    pub(crate) island_flag: bool,
    pub(crate) bodies: SolverBodies,
    pub(crate) kind: JointKind,
}

impl Joint {
    pub(crate) fn new(def: &JointDef) -> PhysicsResult<Self> {
        if def.body_a == def.body_b {
            return Err(PhysicsError::InvalidJoint {
                reason: "joint connects a body to itself",
            });
        }
        if def.breakpoint.is_nan() || def.breakpoint < 0.0 {
            return Err(PhysicsError::InvalidJoint {
                reason: "breakpoint must be non-negative",
            });
        }

        let kind = match &def.kind {
            JointDefKind::Distance(d) => JointKind::Distance(DistanceJoint::new(d)?),
            JointDefKind::Revolute(d) => JointKind::Revolute(RevoluteJoint::new(d)?),
            JointDefKind::Prismatic(d) => JointKind::Prismatic(PrismaticJoint::new(d)?),
            JointDefKind::Weld(d) => JointKind::Weld(WeldJoint::new(d)?),
            JointDefKind::Pulley(d) => JointKind::Pulley(PulleyJoint::new(d)?),
            JointDefKind::Motor(d) => JointKind::Motor(MotorJoint::new(d)?),
            JointDefKind::Mouse(d) => JointKind::Mouse(MouseJoint::new(d)?),
            JointDefKind::Wheel(d) => JointKind::Wheel(WheelJoint::new(d)?),
            JointDefKind::Friction(d) => JointKind::Friction(FrictionJoint::new(d)?),
        };

        Ok(Self {
            body_a: def.body_a,
            body_b: def.body_b,
            collide_connected: def.collide_connected,
            enabled: true,
            breakpoint: def.breakpoint,
            user_data: def.user_data,
            island_flag: false,
            bodies: SolverBodies::default(),
            kind,
        })
    }

    pub fn joint_type(&self) -> JointType {
        match self.kind {
            JointKind::Distance(_) => JointType::Distance,
            JointKind::Revolute(_) => JointType::Revolute,
            JointKind::Prismatic(_) => JointType::Prismatic,
            JointKind::Weld(_) => JointType::Weld,
            JointKind::Pulley(_) => JointType::Pulley,
            JointKind::Motor(_) => JointType::Motor,
            JointKind::Mouse(_) => JointType::Mouse,
            JointKind::Wheel(_) => JointType::Wheel,
            JointKind::Friction(_) => JointType::Friction,
        }
    }

    #[inline]
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    #[inline]
    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// The body on the other side of the joint from `body`.
    pub fn other_body(&self, body: BodyHandle) -> BodyHandle {
        if self.body_a == body {
            self.body_b
        } else {
            self.body_a
        }
    }

    #[inline]
    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    /// False once the joint has broken or was disabled by the caller.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Re-enable a broken joint, or disable one without destroying it.
    pub fn set_enabled(&mut self, flag: bool) {
        self.enabled = flag;
    }

    #[inline]
    pub fn breakpoint(&self) -> f32 {
        self.breakpoint
    }

    pub fn set_breakpoint(&mut self, breakpoint: f32) {
        self.breakpoint = breakpoint;
    }

    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    pub fn set_user_data(&mut self, data: u64) {
        self.user_data = data;
    }

    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    /// Mutable access to motor speeds, limits, targets and so on.
    /// Sleeping bodies are not woken by changes made here.
    pub fn kind_mut(&mut self) -> &mut JointKind {
        &mut self.kind
    }

    /// World anchor on body A.
    pub fn anchor_a(&self, body_a: &Body) -> Vec2 {
        match &self.kind {
            JointKind::Mouse(j) => j.target(),
            JointKind::Motor(_) => body_a.position(),
            JointKind::Distance(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Revolute(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Prismatic(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Weld(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Pulley(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Wheel(j) => body_a.world_point(j.local_anchor_a),
            JointKind::Friction(j) => body_a.world_point(j.local_anchor_a),
        }
    }

    /// World anchor on body B.
    pub fn anchor_b(&self, body_b: &Body) -> Vec2 {
        match &self.kind {
            JointKind::Motor(_) => body_b.position(),
            JointKind::Distance(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Revolute(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Prismatic(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Weld(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Pulley(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Mouse(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Wheel(j) => body_b.world_point(j.local_anchor_b),
            JointKind::Friction(j) => body_b.world_point(j.local_anchor_b),
        }
    }

    /// Reaction force on body B at the anchor, in newtons.
    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        dispatch!(&self.kind, j => j.reaction_force(inv_dt))
    }

    /// Reaction torque on body B, in newton-meters.
    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        dispatch!(&self.kind, j => j.reaction_torque(inv_dt))
    }

    pub(crate) fn init_velocity_constraints(&mut self, data: &mut SolverData<'_>) {
        let bodies = &self.bodies;
        dispatch!(&mut self.kind, j => j.init_velocity_constraints(bodies, data))
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData<'_>) {
        let bodies = &self.bodies;
        dispatch!(&mut self.kind, j => j.solve_velocity_constraints(bodies, data))
    }

    /// Returns true when the position error is within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData<'_>) -> bool {
        let bodies = &self.bodies;
        dispatch!(&mut self.kind, j => j.solve_position_constraints(bodies, data))
    }

    /// Disable the joint if its reaction exceeds the breakpoint. Returns true
    /// on the transition from enabled to broken.
    pub(crate) fn check_break(&mut self, inv_dt: f32) -> bool {
        if !self.enabled || !self.breakpoint.is_finite() {
            return false;
        }
        let force = self.reaction_force(inv_dt).length();
        if force <= self.breakpoint {
            return false;
        }
        self.enabled = false;
        true
    }
}

/// Spring stiffness and damping for a linear spring of the given frequency
/// and damping ratio between two bodies.
pub fn linear_stiffness(
    frequency_hertz: f32,
    damping_ratio: f32,
    body_a: &Body,
    body_b: &Body,
) -> (f32, f32) {
    let mass = effective_mass(body_a.mass(), body_b.mass());
    let omega = 2.0 * std::f32::consts::PI * frequency_hertz;
    let stiffness = mass * omega * omega;
    let damping = 2.0 * mass * damping_ratio * omega;
    (stiffness, damping)
}

/// Spring stiffness and damping for an angular spring.
pub fn angular_stiffness(
    frequency_hertz: f32,
    damping_ratio: f32,
    body_a: &Body,
    body_b: &Body,
) -> (f32, f32) {
    let inertia = effective_mass(body_a.inertia(), body_b.inertia());
    let omega = 2.0 * std::f32::consts::PI * frequency_hertz;
    let stiffness = inertia * omega * omega;
    let damping = 2.0 * inertia * damping_ratio * omega;
    (stiffness, damping)
}

fn effective_mass(mass_a: f32, mass_b: f32) -> f32 {
    if mass_a > 0.0 && mass_b > 0.0 {
        mass_a * mass_b / (mass_a + mass_b)
    } else if mass_a > 0.0 {
        mass_a
    } else {
        mass_b
    }
}

pub(crate) fn require(condition: bool, reason: &'static str) -> PhysicsResult<()> {
    if condition {
        Ok(())
    } else {
        Err(PhysicsError::InvalidJoint { reason })
    }
}

/// Soft constraint coefficients `(gamma, bias_factor)` for a spring with the
/// given stiffness and damping over one step of length `h`.
pub(crate) fn soft_coefficients(stiffness: f32, damping: f32, h: f32) -> (f32, f32) {
    let mut gamma = h * (damping + h * stiffness);
    if gamma != 0.0 {
        gamma = 1.0 / gamma;
    }
    (gamma, h * stiffness * gamma)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::body::BodyDef;

    fn handles() -> (BodyHandle, BodyHandle) {
        let mut world = hecs::World::new();
        (BodyHandle(world.spawn(())), BodyHandle(world.spawn(())))
    }

    #[test]
    fn test_joint_rejects_self_connection() {
        let (a, _) = handles();
        let def = JointDef::new(a, a, WeldJointDef::default());
        assert!(matches!(
            Joint::new(&def),
            Err(PhysicsError::InvalidJoint { .. })
        ));
    }

    #[test]
    fn test_joint_def_defaults() {
        let (a, b) = handles();
        let def = JointDef::new(a, b, RevoluteJointDef::default());
        assert!(def.breakpoint.is_infinite());
        assert!(!def.collide_connected);
        let joint = Joint::new(&def).unwrap();
        assert_eq!(joint.joint_type(), JointType::Revolute);
        assert!(joint.is_enabled());
        assert_eq!(joint.other_body(a), b);
    }

    #[test]
    fn test_unbreakable_joint_never_breaks() {
        let (a, b) = handles();
        let mut joint = Joint::new(&JointDef::new(a, b, WeldJointDef::default())).unwrap();
        assert!(!joint.check_break(60.0));
        assert!(joint.is_enabled());
    }

    #[test]
    fn test_linear_stiffness_against_static_body() {
        let ground = Body::new(&BodyDef::default());
        let mut body = Body::new(&BodyDef::dynamic(Vec2::ZERO));
        body.apply_mass(2.0, Vec2::ZERO, 1.0);
        let (k, d) = linear_stiffness(1.0, 0.5, &ground, &body);
        let omega = 2.0 * std::f32::consts::PI;
        assert!((k - 2.0 * omega * omega).abs() < 1e-3, "k = {}", k);
        assert!((d - 2.0 * omega).abs() < 1e-4, "d = {}", d);
    }

    #[test]
    fn test_soft_coefficients_zero_spring() {
        let (gamma, bias) = soft_coefficients(0.0, 0.0, 1.0 / 60.0);
        assert_eq!(gamma, 0.0);
        assert_eq!(bias, 0.0);
    }

    #[test]
    fn test_point_mass_is_symmetric() {
        let b = SolverBodies {
            inv_mass_a: 1.0,
            inv_mass_b: 0.5,
            inv_i_a: 2.0,
            inv_i_b: 1.0,
            ..Default::default()
        };
        let k = b.point_mass(Vec2::new(0.3, -0.2), Vec2::new(-1.0, 0.5));
        assert!((k.x_axis.y - k.y_axis.x).abs() < 1e-6);
        assert!(k.x_axis.x > 0.0 && k.y_axis.y > 0.0);
    }
}
