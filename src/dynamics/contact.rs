//! Persistent contacts between fixture children whose fat AABBs overlap.

use crate::collision::collide::collide;
use crate::collision::distance::test_overlap;
use crate::collision::manifold::Manifold;
use crate::collision::shapes::Shape;
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::Transform;

use super::body::BodyHandle;
use super::fixture::FixtureHandle;

/// Generation-checked reference to a contact. Contacts are created and
/// destroyed by the world; a handle goes stale once the fat AABBs separate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContactHandle(pub(crate) hecs::Entity);

impl ContactHandle {
    pub fn to_bits(self) -> u64 {
        self.0.to_bits().get()
    }

    pub(crate) fn get(self, registry: &hecs::World) -> PhysicsResult<hecs::Ref<'_, Contact>> {
        registry
            .get::<&Contact>(self.0)
            .map_err(|_| PhysicsError::InvalidHandle { kind: "contact" })
    }

    pub(crate) fn get_mut(
        self,
        registry: &hecs::World,
    ) -> PhysicsResult<hecs::RefMut<'_, Contact>> {
        registry
            .get::<&mut Contact>(self.0)
            .map_err(|_| PhysicsError::InvalidHandle { kind: "contact" })
    }
}

/// Friction mixing: geometric mean, so a zero-friction surface slides on anything.
#[inline]
pub fn mix_friction(friction_a: f32, friction_b: f32) -> f32 {
    (friction_a * friction_b).sqrt()
}

/// Restitution mixing: the bouncier surface wins.
#[inline]
pub fn mix_restitution(restitution_a: f32, restitution_b: f32) -> f32 {
    restitution_a.max(restitution_b)
}

/// Contact between one child of fixture A and one child of fixture B.
///
/// A contact exists while the fat AABBs overlap; it is touching only while
/// the manifold has points (or, for sensors, while the shapes overlap).
#[derive(Debug, Clone)]
pub struct Contact {
    pub(crate) fixture_a: FixtureHandle,
    pub(crate) fixture_b: FixtureHandle,
    pub(crate) child_a: usize,
    pub(crate) child_b: usize,
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,

    pub(crate) manifold: Manifold,

    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    /// Surface speed along the tangent, for conveyor belts.
    pub(crate) tangent_speed: f32,

    pub(crate) sensor: bool,
    pub(crate) touching: bool,
    pub(crate) enabled: bool,
    /// Re-run filtering before the next narrowphase.
    pub(crate) filter_flag: bool,
    pub(crate) island_flag: bool,

    pub(crate) toi_flag: bool,
    pub(crate) toi: f32,
    pub(crate) toi_count: u32,
}

/// Touching state before and after a narrowphase update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TouchTransition {
    pub was_touching: bool,
    pub touching: bool,
}

impl TouchTransition {
    pub fn began(&self) -> bool {
        !self.was_touching && self.touching
    }

    pub fn ended(&self) -> bool {
        self.was_touching && !self.touching
    }
}

impl Contact {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        fixture_a: FixtureHandle,
        child_a: usize,
        body_a: BodyHandle,
        fixture_b: FixtureHandle,
        child_b: usize,
        body_b: BodyHandle,
        friction: f32,
        restitution: f32,
        sensor: bool,
    ) -> Self {
        Self {
            fixture_a,
            fixture_b,
            child_a,
            child_b,
            body_a,
            body_b,
            manifold: Manifold::default(),
            friction,
            restitution,
            tangent_speed: 0.0,
            sensor,
            touching: false,
            enabled: true,
            filter_flag: false,
            island_flag: false,
            toi_flag: false,
            toi: 1.0,
            toi_count: 0,
        }
    }

    #[inline]
    pub fn fixture_a(&self) -> FixtureHandle {
        self.fixture_a
    }

    #[inline]
    pub fn fixture_b(&self) -> FixtureHandle {
        self.fixture_b
    }

    #[inline]
    pub fn child_index_a(&self) -> usize {
        self.child_a
    }

    #[inline]
    pub fn child_index_b(&self) -> usize {
        self.child_b
    }

    #[inline]
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    #[inline]
    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// Local contact geometry from the last update.
    #[inline]
    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    #[inline]
    pub fn is_touching(&self) -> bool {
        self.touching
    }

    #[inline]
    pub fn is_sensor(&self) -> bool {
        self.sensor
    }

    /// Disabled contacts are skipped by the solver for the current step only.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, flag: bool) {
        self.enabled = flag;
    }

    #[inline]
    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    #[inline]
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    #[inline]
    pub fn tangent_speed(&self) -> f32 {
        self.tangent_speed
    }

    pub fn set_tangent_speed(&mut self, speed: f32) {
        self.tangent_speed = speed;
    }

    /// Flag the contact for re-filtering before the next narrowphase.
    pub fn flag_for_filtering(&mut self) {
        self.filter_flag = true;
    }

    /// Recompute the manifold and carry accumulated impulses over to points
    /// with a matching feature id.
    pub(crate) fn update(
        &mut self,
        shape_a: &Shape,
        shape_b: &Shape,
        xf_a: &Transform,
        xf_b: &Transform,
    ) -> TouchTransition {
        let old_manifold = self.manifold;

        // Re-enabled every update; the caller may disable it again.
        self.enabled = true;

        let was_touching = self.touching;
        let touching = if self.sensor {
            self.manifold.point_count = 0;
            test_overlap(shape_a, self.child_a, shape_b, self.child_b, xf_a, xf_b)
        } else {
            self.manifold = collide(shape_a, self.child_a, xf_a, shape_b, xf_b);

            for point in self.manifold.points_mut() {
                point.normal_impulse = 0.0;
                point.tangent_impulse = 0.0;
                let key = point.id.key();
                if let Some(old) = old_manifold.points().iter().find(|old| old.id.key() == key) {
                    point.normal_impulse = old.normal_impulse;
                    point.tangent_impulse = old.tangent_impulse;
                }
            }

            self.manifold.point_count > 0
        };

        self.touching = touching;
        TouchTransition {
            was_touching,
            touching,
        }
    }
}
