//! Rigid-body dynamics: bodies, fixtures, contacts, joints, islands and the world.
//!
//! # Architecture
//!
//! Bodies, fixtures, joints and contacts are single-component entities in a
//! private `hecs::World`. Handles wrap the entity id, so a handle to a
//! destroyed object fails its lookup instead of aliasing a new one.
//!
//! Each step copies the state of one island into dense arrays, runs the
//! contact and joint solvers over them and writes the result back.

pub mod body;
pub mod contact;
pub(crate) mod contact_manager;
pub(crate) mod contact_solver;
pub mod fixture;
pub(crate) mod island;
pub mod joints;
pub mod world;

pub use body::{Body, BodyDef, BodyHandle, BodyType};
pub use contact::{mix_friction, mix_restitution, Contact, ContactHandle};
pub use fixture::{Filter, Fixture, FixtureDef, FixtureHandle};
pub use joints::{
    angular_stiffness, linear_stiffness, DistanceJoint, DistanceJointDef, FrictionJoint,
    FrictionJointDef, Joint, JointDef, JointDefKind, JointHandle, JointKind, JointType,
    MotorJoint, MotorJointDef, MouseJoint, MouseJointDef, PrismaticJoint, PrismaticJointDef,
    PulleyJoint, PulleyJointDef, RevoluteJoint, RevoluteJointDef, WeldJoint, WeldJointDef,
    WheelJoint, WheelJointDef,
};
pub use world::World;
