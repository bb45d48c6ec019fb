//! Fixtures bind a shape to a body.

use glam::Vec2;

use crate::broadphase::{BroadPhase, ProxyId};
use crate::collision::aabb::{Aabb, RayCastInput, RayCastOutput};
use crate::collision::shapes::{MassData, Shape, ShapeType};
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::Transform;

use super::body::{BodyHandle, BodyType};

/// Generation-checked reference to a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixtureHandle(pub(crate) hecs::Entity);

impl FixtureHandle {
    pub fn to_bits(self) -> u64 {
        self.0.to_bits().get()
    }

    pub(crate) fn get(self, registry: &hecs::World) -> PhysicsResult<hecs::Ref<'_, Fixture>> {
        registry
            .get::<&Fixture>(self.0)
            .map_err(|_| PhysicsError::InvalidHandle { kind: "fixture" })
    }

    pub(crate) fn get_mut(
        self,
        registry: &hecs::World,
    ) -> PhysicsResult<hecs::RefMut<'_, Fixture>> {
        registry
            .get::<&mut Fixture>(self.0)
            .map_err(|_| PhysicsError::InvalidHandle { kind: "fixture" })
    }
}

/// Collision filtering data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    /// The category bits this fixture belongs to.
    pub category_bits: u16,
    /// The categories this fixture accepts collisions with.
    pub mask_bits: u16,
    /// Fixtures sharing a non-zero group always collide (positive) or never
    /// collide (negative). Zero means no group.
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl Filter {
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }
        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

/// Everything needed to attach a shape to a body.
#[derive(Debug, Clone)]
pub struct FixtureDef {
    pub shape: Shape,
    /// Coulomb friction coefficient, usually in `[0, 1]`.
    pub friction: f32,
    /// Elasticity, usually in `[0, 1]`.
    pub restitution: f32,
    /// Mass per unit area.
    pub density: f32,
    /// Sensors detect overlap but never produce a collision response.
    pub is_sensor: bool,
    pub filter: Filter,
    pub user_data: u64,
}

impl FixtureDef {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            friction: 0.2,
            restitution: 0.0,
            density: 0.0,
            is_sensor: false,
            filter: Filter::default(),
            user_data: 0,
        }
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

/// Reject densities that would corrupt the body's mass.
pub(crate) fn validate_density(
    density: f32,
    shape_type: ShapeType,
    is_sensor: bool,
    body_type: BodyType,
) -> PhysicsResult<()> {
    if !density.is_finite() || density < 0.0 {
        return Err(PhysicsError::InvalidDensity { density });
    }
    let massive_shape = matches!(shape_type, ShapeType::Circle | ShapeType::Polygon);
    if density == 0.0 && massive_shape && !is_sensor && body_type == BodyType::Dynamic {
        return Err(PhysicsError::InvalidDensity { density });
    }
    Ok(())
}

/// Broadphase user data: which fixture child a tree leaf belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProxyKey {
    pub fixture: FixtureHandle,
    pub child_index: usize,
}

/// One broadphase leaf per shape child.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixtureProxy {
    /// Swept tight bounds from the last synchronization.
    pub aabb: Aabb,
    pub proxy_id: ProxyId,
    pub child_index: usize,
}

/// A shape attached to a body.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub(crate) body: BodyHandle,
    pub(crate) shape: Shape,
    pub(crate) density: f32,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    pub(crate) proxies: Vec<FixtureProxy>,
    pub(crate) user_data: u64,
}

impl Fixture {
    pub(crate) fn new(body: BodyHandle, def: &FixtureDef) -> Self {
        Self {
            body,
            shape: def.shape.clone(),
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxies: Vec::new(),
            user_data: def.user_data,
        }
    }

    #[inline]
    pub fn body(&self) -> BodyHandle {
        self.body
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn shape_type(&self) -> ShapeType {
        self.shape.shape_type()
    }

    #[inline]
    pub fn density(&self) -> f32 {
        self.density
    }

    #[inline]
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Takes effect for new contacts; existing contacts keep their mixed value.
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
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    #[inline]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    pub fn set_user_data(&mut self, data: u64) {
        self.user_data = data;
    }

    /// Number of broadphase proxies, zero while the body is disabled.
    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    pub fn mass_data(&self) -> MassData {
        self.shape.compute_mass(self.density)
    }

    pub(crate) fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        self.shape.test_point(xf, p)
    }

    pub(crate) fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        self.shape.ray_cast(input, xf, child_index)
    }

    pub(crate) fn create_proxies(
        &mut self,
        broad_phase: &mut BroadPhase<ProxyKey>,
        xf: &Transform,
        handle: FixtureHandle,
    ) {
        debug_assert!(self.proxies.is_empty());
        for child_index in 0..self.shape.child_count() {
            let aabb = self.shape.compute_aabb(xf, child_index);
            let proxy_id = broad_phase.create_proxy(
                &aabb,
                ProxyKey {
                    fixture: handle,
                    child_index,
                },
            );
            self.proxies.push(FixtureProxy {
                aabb,
                proxy_id,
                child_index,
            });
        }
    }

    pub(crate) fn destroy_proxies(&mut self, broad_phase: &mut BroadPhase<ProxyKey>) {
        for proxy in self.proxies.drain(..) {
            broad_phase.destroy_proxy(proxy.proxy_id);
        }
    }

    /// Move every proxy to cover the motion from `xf1` to `xf2`.
    pub(crate) fn synchronize(
        &mut self,
        broad_phase: &mut BroadPhase<ProxyKey>,
        xf1: &Transform,
        xf2: &Transform,
    ) {
        for proxy in &mut self.proxies {
            let aabb1 = self.shape.compute_aabb(xf1, proxy.child_index);
            let aabb2 = self.shape.compute_aabb(xf2, proxy.child_index);
            proxy.aabb = aabb1.union(&aabb2);
            let displacement = aabb2.center() - aabb1.center();
            broad_phase.move_proxy(proxy.proxy_id, &proxy.aabb, displacement);
        }
    }

    pub(crate) fn touch_proxies(&self, broad_phase: &mut BroadPhase<ProxyKey>) {
        for proxy in &self.proxies {
            broad_phase.touch_proxy(proxy.proxy_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::{CircleShape, EdgeShape};

    #[test]
    fn test_filter_default_collides() {
        let a = Filter::default();
        let b = Filter::default();
        assert!(a.should_collide(&b));
    }

    #[test]
    fn test_filter_group_overrides_mask() {
        let a = Filter {
            group_index: -2,
            ..Default::default()
        };
        assert!(!a.should_collide(&a));

        let b = Filter {
            mask_bits: 0,
            group_index: 3,
            ..Default::default()
        };
        assert!(b.should_collide(&b));
    }

    #[test]
    fn test_filter_mask_is_symmetric() {
        let a = Filter {
            category_bits: 0x2,
            mask_bits: 0x4,
            group_index: 0,
        };
        let b = Filter {
            category_bits: 0x4,
            mask_bits: 0x1,
            group_index: 0,
        };
        assert!(!a.should_collide(&b));
        assert!(!b.should_collide(&a));
    }

    #[test]
    fn test_validate_density() {
        assert!(validate_density(1.0, ShapeType::Circle, false, BodyType::Dynamic).is_ok());
        assert!(validate_density(0.0, ShapeType::Circle, false, BodyType::Dynamic).is_err());
        assert!(validate_density(0.0, ShapeType::Circle, true, BodyType::Dynamic).is_ok());
        assert!(validate_density(0.0, ShapeType::Polygon, false, BodyType::Static).is_ok());
        assert!(validate_density(0.0, ShapeType::Edge, false, BodyType::Dynamic).is_ok());
        assert!(validate_density(-1.0, ShapeType::Edge, false, BodyType::Static).is_err());
        assert!(validate_density(f32::NAN, ShapeType::Circle, false, BodyType::Static).is_err());
    }

    #[test]
    fn test_fixture_def_builder() -> anyhow::Result<()> {
        let def = FixtureDef::new(CircleShape::new(0.5)?)
            .with_density(2.0)
            .with_friction(0.6)
            .sensor();
        assert_eq!(def.density, 2.0);
        assert_eq!(def.friction, 0.6);
        assert!(def.is_sensor);
        assert_eq!(def.shape.shape_type(), ShapeType::Circle);

        let edge = FixtureDef::new(EdgeShape::new_two_sided(Vec2::ZERO, Vec2::X)?);
        assert_eq!(edge.shape.child_count(), 1);
        Ok(())
    }
}
