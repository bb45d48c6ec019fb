//! rein2d
//!
//! A 2D rigid-body physics core: collision detection, a sequential-impulse
//! constraint solver, joints, sleeping and continuous collision.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **math** - 2D rotation, transform and sweep helpers on top of glam
//! 2. **collision** - Shapes, AABBs, GJK distance, contact manifolds, time of impact
//! 3. **broadphase** - Dynamic AABB tree and pair generation
//! 4. **dynamics** - Bodies, fixtures, contacts, joints, islands and the [`World`]
//! 5. **events** - Contact and joint events queued during a step
//! 6. **debug_draw** - Read-only debug visualization through a caller-supplied sink
//!
//! # Example
//!
//! ```
//! use rein2d::{BodyDef, CircleShape, FixtureDef, PolygonShape, World, WorldConfig};
//! use rein2d::glam::Vec2;
//!
//! # fn main() -> Result<(), rein2d::PhysicsError> {
//! let mut world = World::new(WorldConfig::default())?;
//!
//! let ground = world.create_body(&BodyDef::fixed(Vec2::ZERO));
//! world.create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(10.0, 0.5)?))?;
//!
//! let ball = world.create_body(&BodyDef::dynamic(Vec2::new(0.0, 4.0)));
//! world.create_fixture(ball, &FixtureDef::new(CircleShape::new(0.5)?).with_density(1.0))?;
//!
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0, 8, 3);
//! }
//! assert!(world.body(ball)?.position().y < 4.0);
//! # Ok(())
//! # }
//! ```

pub mod broadphase;
pub mod collision;
pub mod config;
pub mod debug_draw;
pub mod dynamics;
pub mod error;
pub mod events;
pub mod math;

// Re-export commonly used types
pub use broadphase::{BroadPhase, DynamicTree, ProxyId};

pub use collision::{
    Aabb, ChainShape, CircleShape, EdgeShape, Manifold, MassData, PolygonShape, RayCastInput,
    RayCastOutput, Shape, ShapeType, WorldManifold,
};

pub use config::{TimeStep, WorldConfig, MAX_MANIFOLD_POINTS, MAX_POLYGON_VERTICES};

pub use debug_draw::{Color, DebugDraw, DrawFlags};

pub use dynamics::{
    Body, BodyDef, BodyHandle, BodyType, Contact, ContactHandle, Filter, Fixture, FixtureDef,
    FixtureHandle, Joint, JointDef, JointDefKind, JointHandle, JointKind, JointType, World,
};

pub use dynamics::joints::{
    DistanceJointDef, FrictionJointDef, MotorJointDef, MouseJointDef, PrismaticJointDef,
    PulleyJointDef, RevoluteJointDef, WeldJointDef, WheelJointDef,
};

pub use error::{PhysicsError, PhysicsResult};

pub use events::WorldEvent;

pub use math::{Rot, Sweep, Transform};

// Re-export glam for convenience
pub use glam;
