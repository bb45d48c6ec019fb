//! The physics world: owns every body, fixture, joint and contact and steps them.
//!
//! # Step pipeline
//!
//! 1. Apply queued body destruction
//! 2. Create contacts for new broadphase pairs
//! 3. Narrowphase: update manifolds, queue begin/end events
//! 4. Build islands from awake bodies and solve each one
//! 5. Synchronize broadphase proxies, find new pairs
//! 6. Continuous collision: move fast bodies back to their time of impact
//! 7. Clear force accumulators

use glam::Vec2;
use tracing::{debug, trace};

use crate::collision::{
    time_of_impact, Aabb, DistanceProxy, MassData, RayCastInput, RayCastOutput, ToiInput,
    ToiState, WorldManifold,
};
use crate::config::{TimeStep, WorldConfig};
use crate::error::{PhysicsError, PhysicsResult};
use crate::events::{EventQueue, WorldEvent};

use super::body::{Body, BodyDef, BodyHandle, BodyType};
use super::contact::{Contact, ContactHandle};
use super::contact_manager::{
    destroy_body_contacts, flag_contacts_between, update_contact, ContactManager,
};
use super::fixture::{validate_density, Filter, Fixture, FixtureDef, FixtureHandle};
use super::island::Island;
use super::joints::{Joint, JointDef, JointHandle, JointKind};

/// Position iterations used to resolve a TOI mini-island.
const TOI_POSITION_ITERATIONS: u32 = 20;

/// The simulation. See the module docs for what one step does.
pub struct World {
    pub(crate) registry: hecs::World,
    pub(crate) contact_manager: ContactManager,
    events: EventQueue,
    config: WorldConfig,
    accumulator: f64,
    inv_dt0: f32,
    pending_destroy: Vec<BodyHandle>,
    new_contacts: bool,
    step_complete: bool,
    island: Island,
}

impl Default for World {
    fn default() -> Self {
        let config = WorldConfig::default();
        Self {
            registry: hecs::World::new(),
            contact_manager: ContactManager::new(&config),
            events: EventQueue::default(),
            config,
            accumulator: 0.0,
            inv_dt0: 0.0,
            pending_destroy: Vec::new(),
            new_contacts: false,
            step_complete: true,
            island: Island::default(),
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("bodies", &self.body_count())
            .field("joints", &self.joint_count())
            .field("contacts", &self.contact_count())
            .field("proxies", &self.proxy_count())
            .finish()
    }
}

impl World {
    /// Create an empty world. Fails if the configuration is out of range.
    pub fn new(config: WorldConfig) -> PhysicsResult<Self> {
        config.validate()?;
        Ok(Self {
            contact_manager: ContactManager::new(&config),
            config,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
    }

    /// Enable or disable sleeping. Disabling wakes every body.
    pub fn set_allow_sleep(&mut self, flag: bool) {
        if flag == self.config.allow_sleep {
            return;
        }
        self.config.allow_sleep = flag;
        if !flag {
            for (_, body) in self.registry.query_mut::<&mut Body>() {
                body.set_awake(true);
            }
        }
    }

    pub fn set_warm_starting(&mut self, flag: bool) {
        self.config.warm_starting = flag;
    }

    pub fn set_continuous_physics(&mut self, flag: bool) {
        self.config.continuous_physics = flag;
    }

    pub fn set_sub_stepping(&mut self, flag: bool) {
        self.config.sub_stepping = flag;
    }

    pub fn set_auto_clear_forces(&mut self, flag: bool) {
        self.config.auto_clear_forces = flag;
    }

    // ---------------------------------------------------------------------
    // Bodies
    // ---------------------------------------------------------------------

    pub fn create_body(&mut self, def: &BodyDef) -> BodyHandle {
        let handle = BodyHandle(self.registry.spawn((Body::new(def),)));
        debug!(
            body = handle.to_bits(),
            body_type = ?def.body_type,
            "body created"
        );
        handle
    }

    /// Destroy a body with its fixtures, joints and contacts.
    ///
    /// Touching contacts report [`WorldEvent::EndContact`]. Call this between
    /// steps; to destroy in response to an event use
    /// [`queue_destroy_body`](Self::queue_destroy_body).
    pub fn destroy_body(&mut self, handle: BodyHandle) -> PhysicsResult<()> {
        let (joints, fixtures) = {
            let body = handle.get(&self.registry)?;
            (body.joints.clone(), body.fixtures.clone())
        };

        for joint in joints {
            self.remove_joint(joint);
        }

        destroy_body_contacts(&mut self.registry, &mut self.events, handle, None);

        for fixture in &fixtures {
            if let Ok(mut f) = fixture.get_mut(&self.registry) {
                f.destroy_proxies(&mut self.contact_manager.broad_phase);
            }
            let _ = self.registry.despawn(fixture.0);
        }

        let _ = self.registry.despawn(handle.0);
        self.pending_destroy.retain(|&h| h != handle);
        debug!(
            body = handle.to_bits(),
            fixtures = fixtures.len(),
            "body destroyed"
        );
        Ok(())
    }

    /// Destroy a body at the start of the next step.
    pub fn queue_destroy_body(&mut self, handle: BodyHandle) -> PhysicsResult<()> {
        handle.get(&self.registry)?;
        if !self.pending_destroy.contains(&handle) {
            self.pending_destroy.push(handle);
        }
        Ok(())
    }

    pub fn body(&self, handle: BodyHandle) -> PhysicsResult<hecs::Ref<'_, Body>> {
        handle.get(&self.registry)
    }

    /// Mutable body access for velocities, forces and flags.
    pub fn body_mut(&mut self, handle: BodyHandle) -> PhysicsResult<hecs::RefMut<'_, Body>> {
        handle.get_mut(&self.registry)
    }

    pub fn body_handles(&self) -> Vec<BodyHandle> {
        self.registry
            .query::<&Body>()
            .iter()
            .map(|(entity, _)| BodyHandle(entity))
            .collect()
    }

    pub fn body_count(&self) -> usize {
        self.registry.query::<&Body>().iter().count()
    }

    /// Teleport a body. Contacts are updated on the next step.
    pub fn set_transform(
        &mut self,
        handle: BodyHandle,
        position: Vec2,
        angle: f32,
    ) -> PhysicsResult<()> {
        let (xf, fixtures) = {
            let mut body = handle.get_mut(&self.registry)?;
            body.set_transform(position, angle);
            (body.xf, body.fixtures.clone())
        };
        for fixture in fixtures {
            if let Ok(mut f) = fixture.get_mut(&self.registry) {
                f.synchronize(&mut self.contact_manager.broad_phase, &xf, &xf);
            }
        }
        self.new_contacts = true;
        Ok(())
    }

    /// A disabled body keeps its fixtures and joints but has no proxies or contacts.
    pub fn set_enabled(&mut self, handle: BodyHandle, flag: bool) -> PhysicsResult<()> {
        let (xf, fixtures) = {
            let mut body = handle.get_mut(&self.registry)?;
            if body.enabled == flag {
                return Ok(());
            }
            body.enabled = flag;
            (body.xf, body.fixtures.clone())
        };

        if flag {
            for fixture in fixtures {
                if let Ok(mut f) = fixture.get_mut(&self.registry) {
                    f.create_proxies(&mut self.contact_manager.broad_phase, &xf, fixture);
                }
            }
            self.new_contacts = true;
        } else {
            for fixture in fixtures {
                if let Ok(mut f) = fixture.get_mut(&self.registry) {
                    f.destroy_proxies(&mut self.contact_manager.broad_phase);
                }
            }
            destroy_body_contacts(&mut self.registry, &mut self.events, handle, None);
        }
        Ok(())
    }

    /// Change the body type. Mass is recomputed and contacts are rebuilt.
    pub fn set_type(&mut self, handle: BodyHandle, body_type: BodyType) -> PhysicsResult<()> {
        {
            let mut body = handle.get_mut(&self.registry)?;
            if body.body_type == body_type {
                return Ok(());
            }
            body.body_type = body_type;
        }

        self.reset_mass_data(handle)?;

        let (xf, fixtures) = {
            let mut body = handle.get_mut(&self.registry)?;
            if body_type == BodyType::Static {
                body.linear_velocity = Vec2::ZERO;
                body.angular_velocity = 0.0;
                body.sweep.a0 = body.sweep.a;
                body.sweep.c0 = body.sweep.c;
                body.awake = false;
                body.synchronize_transform();
            } else {
                body.set_awake(true);
            }
            body.force = Vec2::ZERO;
            body.torque = 0.0;
            (body.xf, body.fixtures.clone())
        };

        destroy_body_contacts(&mut self.registry, &mut self.events, handle, None);

        for fixture in fixtures {
            if let Ok(mut f) = fixture.get_mut(&self.registry) {
                if body_type == BodyType::Static {
                    f.synchronize(&mut self.contact_manager.broad_phase, &xf, &xf);
                }
                f.touch_proxies(&mut self.contact_manager.broad_phase);
            }
        }
        self.new_contacts = true;
        Ok(())
    }

    pub fn set_fixed_rotation(&mut self, handle: BodyHandle, flag: bool) -> PhysicsResult<()> {
        {
            let mut body = handle.get_mut(&self.registry)?;
            if body.fixed_rotation == flag {
                return Ok(());
            }
            body.fixed_rotation = flag;
            body.angular_velocity = 0.0;
        }
        self.reset_mass_data(handle)
    }

    /// Override the mass computed from fixtures. Ignored for non-dynamic bodies.
    pub fn set_mass_data(&mut self, handle: BodyHandle, data: &MassData) -> PhysicsResult<()> {
        handle.get_mut(&self.registry)?.set_mass_data(data);
        Ok(())
    }

    /// Recompute mass, center of mass and inertia from the body's fixtures.
    pub fn reset_mass_data(&mut self, handle: BodyHandle) -> PhysicsResult<()> {
        let fixtures = handle.get(&self.registry)?.fixtures.clone();

        let mut mass = 0.0;
        let mut weighted_center = Vec2::ZERO;
        let mut inertia = 0.0;
        for fixture in fixtures {
            let Ok(f) = fixture.get(&self.registry) else {
                continue;
            };
            if f.is_sensor || f.density == 0.0 {
                continue;
            }
            let data = f.mass_data();
            mass += data.mass;
            weighted_center += data.mass * data.center;
            inertia += data.inertia;
        }

        handle
            .get_mut(&self.registry)?
            .apply_mass(mass, weighted_center, inertia);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Fixtures
    // ---------------------------------------------------------------------

    /// Attach a shape to a body. Updates the body's mass when `density > 0`.
    pub fn create_fixture(
        &mut self,
        body: BodyHandle,
        def: &FixtureDef,
    ) -> PhysicsResult<FixtureHandle> {
        let (xf, enabled, body_type) = {
            let b = body.get(&self.registry)?;
            (b.xf, b.enabled, b.body_type)
        };
        validate_density(def.density, def.shape.shape_type(), def.is_sensor, body_type)?;

        let handle = FixtureHandle(self.registry.spawn((Fixture::new(body, def),)));
        if enabled {
            if let Ok(mut f) = handle.get_mut(&self.registry) {
                f.create_proxies(&mut self.contact_manager.broad_phase, &xf, handle);
            }
        }
        body.get_mut(&self.registry)?.fixtures.push(handle);

        if def.density > 0.0 {
            self.reset_mass_data(body)?;
        }

        // Let the broadphase pair the new proxies on the next step.
        self.new_contacts = true;

        debug!(
            fixture = handle.to_bits(),
            body = body.to_bits(),
            shape = ?def.shape.shape_type(),
            "fixture created"
        );
        Ok(handle)
    }

    /// Detach and destroy a fixture. The body's mass is recomputed.
    pub fn destroy_fixture(&mut self, handle: FixtureHandle) -> PhysicsResult<()> {
        let body = handle.get(&self.registry)?.body;

        destroy_body_contacts(&mut self.registry, &mut self.events, body, Some(handle));

        if let Ok(mut f) = handle.get_mut(&self.registry) {
            f.destroy_proxies(&mut self.contact_manager.broad_phase);
        }
        if let Ok(mut b) = body.get_mut(&self.registry) {
            b.fixtures.retain(|&f| f != handle);
        }
        let _ = self.registry.despawn(handle.0);

        debug!(fixture = handle.to_bits(), "fixture destroyed");
        self.reset_mass_data(body)
    }

    pub fn fixture(&self, handle: FixtureHandle) -> PhysicsResult<hecs::Ref<'_, Fixture>> {
        handle.get(&self.registry)
    }

    /// Mutable fixture access for friction, restitution and user data.
    pub fn fixture_mut(
        &mut self,
        handle: FixtureHandle,
    ) -> PhysicsResult<hecs::RefMut<'_, Fixture>> {
        handle.get_mut(&self.registry)
    }

    /// Replace the collision filter. Existing contacts are re-filtered on the next step.
    pub fn set_filter(&mut self, handle: FixtureHandle, filter: Filter) -> PhysicsResult<()> {
        let body = {
            let mut f = handle.get_mut(&self.registry)?;
            f.filter = filter;
            f.touch_proxies(&mut self.contact_manager.broad_phase);
            f.body
        };

        let contacts = body.get(&self.registry)?.contacts.clone();
        for contact in contacts {
            if let Ok(mut c) = contact.get_mut(&self.registry) {
                if c.fixture_a == handle || c.fixture_b == handle {
                    c.flag_for_filtering();
                }
            }
        }
        self.new_contacts = true;
        Ok(())
    }

    /// Turn a fixture into a sensor or back. Wakes the body.
    pub fn set_sensor(&mut self, handle: FixtureHandle, flag: bool) -> PhysicsResult<()> {
        let body = {
            let mut f = handle.get_mut(&self.registry)?;
            if f.is_sensor == flag {
                return Ok(());
            }
            f.is_sensor = flag;
            f.body
        };

        let contacts = body.get(&self.registry)?.contacts.clone();
        for contact in contacts {
            let Ok(mut c) = contact.get_mut(&self.registry) else {
                continue;
            };
            if c.fixture_a != handle && c.fixture_b != handle {
                continue;
            }
            let sensor_a = c.fixture_a.get(&self.registry).map(|f| f.is_sensor);
            let sensor_b = c.fixture_b.get(&self.registry).map(|f| f.is_sensor);
            c.sensor = sensor_a.unwrap_or(false) || sensor_b.unwrap_or(false);
        }

        body.get_mut(&self.registry)?.set_awake(true);
        self.reset_mass_data(body)
    }

    pub fn set_fixture_density(&mut self, handle: FixtureHandle, density: f32) -> PhysicsResult<()> {
        let body = {
            let f = handle.get(&self.registry)?;
            let body_type = f.body.get(&self.registry)?.body_type;
            validate_density(density, f.shape_type(), f.is_sensor, body_type)?;
            f.body
        };
        handle.get_mut(&self.registry)?.density = density;
        self.reset_mass_data(body)
    }

    /// Is `point` inside the fixture's shape?
    pub fn fixture_test_point(&self, handle: FixtureHandle, point: Vec2) -> PhysicsResult<bool> {
        let f = handle.get(&self.registry)?;
        let xf = f.body.get(&self.registry)?.xf;
        Ok(f.test_point(&xf, point))
    }

    /// Cast a ray against one child of the fixture's shape.
    pub fn fixture_ray_cast(
        &self,
        handle: FixtureHandle,
        input: &RayCastInput,
        child_index: usize,
    ) -> PhysicsResult<Option<RayCastOutput>> {
        let f = handle.get(&self.registry)?;
        let xf = f.body.get(&self.registry)?.xf;
        Ok(f.ray_cast(input, &xf, child_index))
    }

    /// Tight world AABB of one child at the body's current pose.
    pub fn fixture_aabb(&self, handle: FixtureHandle, child_index: usize) -> PhysicsResult<Aabb> {
        let f = handle.get(&self.registry)?;
        if child_index >= f.shape.child_count() {
            return Err(PhysicsError::InvalidShape {
                reason: "child index out of range",
            });
        }
        let xf = f.body.get(&self.registry)?.xf;
        Ok(f.shape.compute_aabb(&xf, child_index))
    }

    // ---------------------------------------------------------------------
    // Joints
    // ---------------------------------------------------------------------

    pub fn create_joint(&mut self, def: &JointDef) -> PhysicsResult<JointHandle> {
        def.body_a.get(&self.registry)?;
        def.body_b.get(&self.registry)?;

        let joint = Joint::new(def)?;
        let joint_type = joint.joint_type();
        let handle = JointHandle(self.registry.spawn((joint,)));

        for body in [def.body_a, def.body_b] {
            if let Ok(mut b) = body.get_mut(&self.registry) {
                b.joints.push(handle);
            }
        }

        // Contacts between the connected bodies are dropped on the next collide.
        if !def.collide_connected {
            flag_contacts_between(&self.registry, def.body_a, def.body_b);
        }

        debug!(
            joint = handle.to_bits(),
            joint_type = ?joint_type,
            "joint created"
        );
        Ok(handle)
    }

    /// Destroy a joint and wake the bodies it connected.
    pub fn destroy_joint(&mut self, handle: JointHandle) -> PhysicsResult<()> {
        handle.get(&self.registry)?;
        self.remove_joint(handle);
        Ok(())
    }

    fn remove_joint(&mut self, handle: JointHandle) {
        let Ok(joint) = handle.get(&self.registry) else {
            return;
        };
        let (body_a, body_b) = (joint.body_a, joint.body_b);
        let collide_connected = joint.collide_connected;
        drop(joint);

        for body in [body_a, body_b] {
            if let Ok(mut b) = body.get_mut(&self.registry) {
                b.joints.retain(|&j| j != handle);
                b.set_awake(true);
            }
        }
        let _ = self.registry.despawn(handle.0);

        // The pair may collide now; let the broadphase report it again.
        if !collide_connected {
            let fixtures = body_b
                .get(&self.registry)
                .map(|b| b.fixtures.clone())
                .unwrap_or_default();
            for fixture in fixtures {
                if let Ok(f) = fixture.get(&self.registry) {
                    f.touch_proxies(&mut self.contact_manager.broad_phase);
                }
            }
            self.new_contacts = true;
        }

        debug!(joint = handle.to_bits(), "joint destroyed");
    }

    pub fn joint(&self, handle: JointHandle) -> PhysicsResult<hecs::Ref<'_, Joint>> {
        handle.get(&self.registry)
    }

    /// Mutable joint access for motors, limits and targets.
    pub fn joint_mut(&mut self, handle: JointHandle) -> PhysicsResult<hecs::RefMut<'_, Joint>> {
        handle.get_mut(&self.registry)
    }

    pub fn joint_handles(&self) -> Vec<JointHandle> {
        self.registry
            .query::<&Joint>()
            .iter()
            .map(|(entity, _)| JointHandle(entity))
            .collect()
    }

    pub fn joint_count(&self) -> usize {
        self.registry.query::<&Joint>().iter().count()
    }

    /// World anchors of the joint on body A and body B.
    pub fn joint_anchors(&self, handle: JointHandle) -> PhysicsResult<(Vec2, Vec2)> {
        let joint = handle.get(&self.registry)?;
        let body_a = joint.body_a.get(&self.registry)?;
        let body_b = joint.body_b.get(&self.registry)?;
        Ok((joint.anchor_a(&body_a), joint.anchor_b(&body_b)))
    }

    /// Reaction force and torque on body B over the last step.
    pub fn joint_reaction(&self, handle: JointHandle) -> PhysicsResult<(Vec2, f32)> {
        let joint = handle.get(&self.registry)?;
        Ok((
            joint.reaction_force(self.inv_dt0),
            joint.reaction_torque(self.inv_dt0),
        ))
    }

    /// Move a mouse joint's target and wake the dragged body.
    pub fn set_mouse_target(&mut self, handle: JointHandle, target: Vec2) -> PhysicsResult<()> {
        let body_b = {
            let mut joint = handle.get_mut(&self.registry)?;
            let body_b = joint.body_b;
            match &mut joint.kind {
                JointKind::Mouse(mouse) => mouse.set_target(target),
                _ => {
                    return Err(PhysicsError::InvalidHandle {
                        kind: "mouse joint",
                    })
                }
            }
            body_b
        };
        body_b.get_mut(&self.registry)?.set_awake(true);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Contacts
    // ---------------------------------------------------------------------

    pub fn contact(&self, handle: ContactHandle) -> PhysicsResult<hecs::Ref<'_, Contact>> {
        handle.get(&self.registry)
    }

    /// Mutable contact access. Friction, restitution, tangent speed and the
    /// enabled flag are reset or recomputed by the next narrowphase update.
    pub fn contact_mut(
        &mut self,
        handle: ContactHandle,
    ) -> PhysicsResult<hecs::RefMut<'_, Contact>> {
        handle.get_mut(&self.registry)
    }

    pub fn contact_handles(&self) -> Vec<ContactHandle> {
        self.registry
            .query::<&Contact>()
            .iter()
            .map(|(entity, _)| ContactHandle(entity))
            .collect()
    }

    pub fn contact_count(&self) -> usize {
        self.registry.query::<&Contact>().iter().count()
    }

    /// Contact points and normal in world space.
    pub fn contact_world_manifold(&self, handle: ContactHandle) -> PhysicsResult<WorldManifold> {
        let contact = handle.get(&self.registry)?;
        let fixture_a = contact.fixture_a.get(&self.registry)?;
        let fixture_b = contact.fixture_b.get(&self.registry)?;
        let xf_a = contact.body_a.get(&self.registry)?.xf;
        let xf_b = contact.body_b.get(&self.registry)?.xf;
        Ok(WorldManifold::new(
            &contact.manifold,
            &xf_a,
            fixture_a.shape.radius(),
            &xf_b,
            fixture_b.shape.radius(),
        ))
    }

    // ---------------------------------------------------------------------
    // Stepping
    // ---------------------------------------------------------------------

    /// Advance the simulation by exactly `dt` seconds.
    pub fn step(&mut self, dt: f32, velocity_iterations: u32, position_iterations: u32) {
        self.flush_destroyed();

        // New fixtures since the last step.
        if self.new_contacts {
            self.contact_manager.find_new_contacts(&mut self.registry);
            self.new_contacts = false;
        }

        let step = TimeStep {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            dt_ratio: self.inv_dt0 * dt,
            velocity_iterations,
            position_iterations,
            warm_starting: self.config.warm_starting,
        };

        self.contact_manager
            .collide(&mut self.registry, &mut self.events);

        if self.step_complete && step.dt > 0.0 {
            self.solve(&step);
        }

        if self.config.continuous_physics && step.dt > 0.0 {
            self.solve_toi(&step);
        }

        if step.dt > 0.0 {
            self.inv_dt0 = step.inv_dt;
        }

        if self.config.auto_clear_forces {
            self.clear_forces();
        }

        trace!(
            dt,
            contacts = self.contact_count(),
            events = self.events.len(),
            "world stepped"
        );
    }

    /// [`step`](Self::step) with the iteration counts from the config.
    pub fn step_with_config(&mut self, dt: f32) {
        self.step(
            dt,
            self.config.velocity_iterations,
            self.config.position_iterations,
        );
    }

    /// Step the simulation forward by `delta_time` seconds of wall time.
    ///
    /// Uses a fixed timestep accumulator so the simulation is deterministic.
    /// Returns the number of fixed steps taken.
    pub fn advance(&mut self, delta_time: f64) -> u32 {
        self.accumulator += delta_time;

        let fixed_timestep = self.config.fixed_timestep;
        let mut substeps = 0u32;
        while self.accumulator >= fixed_timestep && substeps < self.config.max_substeps {
            self.step_with_config(fixed_timestep as f32);
            self.accumulator -= fixed_timestep;
            substeps += 1;
        }

        // Clamp accumulator to avoid spiral of death
        if self.accumulator > fixed_timestep * self.config.max_substeps as f64 {
            self.accumulator = 0.0;
        }

        substeps
    }

    /// Zero every body's force and torque accumulator.
    pub fn clear_forces(&mut self) {
        for (_, body) in self.registry.query_mut::<&mut Body>() {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    /// Take every event queued since the last call, in occurrence order.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        self.events.take()
    }

    fn flush_destroyed(&mut self) {
        for handle in std::mem::take(&mut self.pending_destroy) {
            if let Err(err) = self.destroy_body(handle) {
                debug!(body = handle.to_bits(), %err, "queued body already gone");
            }
        }
    }

    /// Build islands by depth-first search from awake bodies and solve them.
    fn solve(&mut self, step: &TimeStep) {
        for (_, body) in self.registry.query_mut::<&mut Body>() {
            body.island_flag = false;
        }
        for (_, contact) in self.registry.query_mut::<&mut Contact>() {
            contact.island_flag = false;
        }
        for (_, joint) in self.registry.query_mut::<&mut Joint>() {
            joint.island_flag = false;
        }

        let seeds = self.body_handles();
        let mut stack: Vec<BodyHandle> = Vec::with_capacity(seeds.len());
        let mut islands = 0usize;
        let mut asleep = 0usize;

        for seed in seeds {
            let eligible = seed
                .get(&self.registry)
                .map(|b| {
                    !b.island_flag && b.awake && b.enabled && b.body_type != BodyType::Static
                })
                .unwrap_or(false);
            if !eligible {
                continue;
            }

            self.island.clear();
            stack.clear();
            stack.push(seed);
            if let Ok(mut b) = seed.get_mut(&self.registry) {
                b.island_flag = true;
            }

            while let Some(handle) = stack.pop() {
                self.island.add_body(&self.registry, handle);

                let (contacts, joints) = {
                    let Ok(mut b) = handle.get_mut(&self.registry) else {
                        continue;
                    };
                    // Static bodies join islands but do not propagate them.
                    if b.body_type == BodyType::Static {
                        continue;
                    }
                    // Awake without resetting the sleep timer.
                    b.awake = true;
                    (b.contacts.clone(), b.joints.clone())
                };

                for contact in contacts {
                    let other = {
                        let Ok(c) = contact.get(&self.registry) else {
                            continue;
                        };
                        if c.island_flag || !c.enabled || !c.touching || c.sensor {
                            continue;
                        }
                        if c.body_a == handle {
                            c.body_b
                        } else {
                            c.body_a
                        }
                    };

                    if let Ok(mut c) = contact.get_mut(&self.registry) {
                        c.island_flag = true;
                    }
                    self.island.contacts.push(contact);

                    if let Ok(mut o) = other.get_mut(&self.registry) {
                        if !o.island_flag {
                            o.island_flag = true;
                            stack.push(other);
                        }
                    }
                }

                for joint in joints {
                    let other = {
                        let Ok(j) = joint.get(&self.registry) else {
                            continue;
                        };
                        if j.island_flag || !j.enabled {
                            continue;
                        }
                        j.other_body(handle)
                    };

                    // Joints to disabled bodies are ignored.
                    let other_enabled = other
                        .get(&self.registry)
                        .map(|o| o.enabled)
                        .unwrap_or(false);
                    if !other_enabled {
                        continue;
                    }

                    if let Ok(mut j) = joint.get_mut(&self.registry) {
                        j.island_flag = true;
                    }
                    self.island.joints.push(joint);

                    if let Ok(mut o) = other.get_mut(&self.registry) {
                        if !o.island_flag {
                            o.island_flag = true;
                            stack.push(other);
                        }
                    }
                }
            }

            let report = self
                .island
                .solve(&self.registry, step, &self.config, &mut self.events);
            islands += 1;
            if report.fell_asleep {
                asleep += 1;
            }

            // Static bodies may take part in other islands.
            for &handle in &self.island.bodies {
                if let Ok(mut b) = handle.get_mut(&self.registry) {
                    if b.body_type == BodyType::Static {
                        b.island_flag = false;
                    }
                }
            }
        }

        let moved: Vec<BodyHandle> = self
            .registry
            .query::<&Body>()
            .iter()
            .filter(|(_, b)| b.island_flag && b.body_type != BodyType::Static)
            .map(|(entity, _)| BodyHandle(entity))
            .collect();
        for handle in moved {
            self.synchronize_fixtures(handle);
        }

        self.contact_manager.find_new_contacts(&mut self.registry);

        trace!(islands, asleep, "islands solved");
    }

    /// Move the body's proxies to cover its motion over the step.
    fn synchronize_fixtures(&mut self, handle: BodyHandle) {
        let (xf1, xf2, fixtures) = {
            let Ok(b) = handle.get(&self.registry) else {
                return;
            };
            let xf1 = if b.awake { b.start_transform() } else { b.xf };
            (xf1, b.xf, b.fixtures.clone())
        };
        for fixture in fixtures {
            if let Ok(mut f) = fixture.get_mut(&self.registry) {
                f.synchronize(&mut self.contact_manager.broad_phase, &xf1, &xf2);
            }
        }
    }

    /// Continuous collision: find the earliest time of impact, move the two
    /// bodies there, solve a mini island and repeat.
    fn solve_toi(&mut self, step: &TimeStep) {
        if self.step_complete {
            for (_, body) in self.registry.query_mut::<&mut Body>() {
                body.island_flag = false;
                body.sweep.alpha0 = 0.0;
            }
            for (_, contact) in self.registry.query_mut::<&mut Contact>() {
                contact.toi_flag = false;
                contact.island_flag = false;
                contact.toi_count = 0;
                contact.toi = 1.0;
            }
        }

        let mut events = 0usize;
        loop {
            let Some((min_contact, min_alpha)) = self.min_toi_contact() else {
                self.step_complete = true;
                break;
            };
            if min_alpha > 1.0 - 10.0 * f32::EPSILON {
                self.step_complete = true;
                break;
            }

            let (body_a, body_b) = {
                let Ok(c) = min_contact.get(&self.registry) else {
                    break;
                };
                (c.body_a, c.body_b)
            };
            let (Ok(backup_a), Ok(backup_b)) = (
                body_a.get(&self.registry).map(|b| b.sweep),
                body_b.get(&self.registry).map(|b| b.sweep),
            ) else {
                break;
            };

            for body in [body_a, body_b] {
                if let Ok(mut b) = body.get_mut(&self.registry) {
                    b.advance(min_alpha);
                }
            }

            // Refresh the manifold at the TOI pose.
            update_contact(&self.registry, &mut self.events, min_contact);
            let usable = match min_contact.get_mut(&self.registry) {
                Ok(mut c) => {
                    c.toi_flag = false;
                    c.toi_count += 1;
                    let usable = c.enabled && c.touching;
                    if !usable {
                        // Skipped for the rest of this step.
                        c.enabled = false;
                    }
                    usable
                }
                Err(_) => false,
            };
            if !usable {
                // Not touching after all: undo the advance.
                for (body, backup) in [(body_a, backup_a), (body_b, backup_b)] {
                    if let Ok(mut b) = body.get_mut(&self.registry) {
                        b.sweep = backup;
                        b.synchronize_transform();
                    }
                }
                continue;
            }

            for body in [body_a, body_b] {
                if let Ok(mut b) = body.get_mut(&self.registry) {
                    b.set_awake(true);
                    b.island_flag = true;
                }
            }
            if let Ok(mut c) = min_contact.get_mut(&self.registry) {
                c.island_flag = true;
            }

            self.island.clear();
            self.island.add_body(&self.registry, body_a);
            self.island.add_body(&self.registry, body_b);
            self.island.contacts.push(min_contact);

            // Gather contacts the TOI bodies may hit on the way.
            for body in [body_a, body_b] {
                self.gather_toi_contacts(body, min_alpha);
            }

            let dt = (1.0 - min_alpha) * step.dt;
            let sub_step = TimeStep {
                dt,
                inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
                dt_ratio: 1.0,
                velocity_iterations: step.velocity_iterations,
                position_iterations: TOI_POSITION_ITERATIONS,
                warm_starting: false,
            };
            let (index_a, index_b) = match (body_a.get(&self.registry), body_b.get(&self.registry))
            {
                (Ok(a), Ok(b)) => (a.island_index, b.island_index),
                _ => break,
            };
            self.island
                .solve_toi(&self.registry, &sub_step, &self.config, index_a, index_b);
            events += 1;

            // Clear flags, move proxies.
            let bodies = std::mem::take(&mut self.island.bodies);
            for &handle in &bodies {
                let contacts = {
                    let Ok(mut b) = handle.get_mut(&self.registry) else {
                        continue;
                    };
                    b.island_flag = false;
                    if b.body_type != BodyType::Dynamic {
                        continue;
                    }
                    b.contacts.clone()
                };

                self.synchronize_fixtures(handle);

                // Cached TOIs on the moved body are stale.
                for contact in contacts {
                    if let Ok(mut c) = contact.get_mut(&self.registry) {
                        c.toi_flag = false;
                        c.island_flag = false;
                    }
                }
            }
            self.island.bodies = bodies;

            // Also finds new contacts created by the displacement.
            self.contact_manager.find_new_contacts(&mut self.registry);

            if self.config.sub_stepping {
                self.step_complete = false;
                break;
            }
        }

        if events > 0 {
            trace!(events, "time of impact events solved");
        }
    }

    /// Find the contact with the smallest time of impact, computing and
    /// caching TOIs for contacts that do not have one yet.
    fn min_toi_contact(&mut self) -> Option<(ContactHandle, f32)> {
        let mut min: Option<(ContactHandle, f32)> = None;
        for handle in self.contact_handles() {
            let Some(alpha) = self.contact_toi(handle) else {
                continue;
            };
            if min.map_or(alpha < 1.0, |(_, min_alpha)| alpha < min_alpha) {
                min = Some((handle, alpha));
            }
        }
        min
    }

    fn contact_toi(&mut self, handle: ContactHandle) -> Option<f32> {
        let (fixture_a, fixture_b, child_a, child_b, body_a, body_b) = {
            let c = handle.get(&self.registry).ok()?;
            // Disabled contacts are never solved; these were already
            // sub-stepped too many times.
            if !c.enabled || c.toi_count > self.config.max_toi_sub_steps {
                return None;
            }
            if c.toi_flag {
                return Some(c.toi);
            }
            if c.sensor {
                return None;
            }
            (
                c.fixture_a,
                c.fixture_b,
                c.child_a,
                c.child_b,
                c.body_a,
                c.body_b,
            )
        };

        let (mut sweep_a, mut sweep_b) = {
            let a = body_a.get(&self.registry).ok()?;
            let b = body_b.get(&self.registry).ok()?;

            let active_a = a.awake && a.body_type != BodyType::Static;
            let active_b = b.awake && b.body_type != BodyType::Static;
            if !active_a && !active_b {
                return None;
            }

            // Only bullets sweep against other dynamic bodies.
            let collide_a = a.bullet || a.body_type != BodyType::Dynamic;
            let collide_b = b.bullet || b.body_type != BodyType::Dynamic;
            if !collide_a && !collide_b {
                return None;
            }
            (a.sweep, b.sweep)
        };

        // Align both sweeps at the later alpha0.
        let alpha0 = if sweep_a.alpha0 < sweep_b.alpha0 {
            sweep_a.advance(sweep_b.alpha0);
            body_a.get_mut(&self.registry).ok()?.sweep = sweep_a;
            sweep_b.alpha0
        } else if sweep_b.alpha0 < sweep_a.alpha0 {
            sweep_b.advance(sweep_a.alpha0);
            body_b.get_mut(&self.registry).ok()?.sweep = sweep_b;
            sweep_a.alpha0
        } else {
            sweep_a.alpha0
        };

        let proxy_a = DistanceProxy::from_shape(&fixture_a.get(&self.registry).ok()?.shape, child_a);
        let proxy_b = DistanceProxy::from_shape(&fixture_b.get(&self.registry).ok()?.shape, child_b);

        let mut input = ToiInput::new(proxy_a, proxy_b, sweep_a, sweep_b, 1.0);
        input.linear_slop = self.config.linear_slop;
        input.max_iterations = self.config.max_toi_iterations;
        input.gjk_iterations = self.config.max_gjk_iterations;
        let output = time_of_impact(&input);

        let alpha = if output.state == ToiState::Touching {
            (alpha0 + (1.0 - alpha0) * output.t).min(1.0)
        } else {
            1.0
        };

        let mut c = handle.get_mut(&self.registry).ok()?;
        c.toi = alpha;
        c.toi_flag = true;
        Some(alpha)
    }

    /// Add touching contacts of a TOI body against static, kinematic or
    /// bullet bodies to the mini island, advancing the other bodies to `alpha`.
    fn gather_toi_contacts(&mut self, body: BodyHandle, alpha: f32) {
        let (contacts, is_bullet) = {
            let Ok(b) = body.get(&self.registry) else {
                return;
            };
            if b.body_type != BodyType::Dynamic {
                return;
            }
            (b.contacts.clone(), b.bullet)
        };

        for contact in contacts {
            if self.island.contacts.len() >= self.config.max_toi_contacts {
                break;
            }

            let other = {
                let Ok(c) = contact.get(&self.registry) else {
                    continue;
                };
                if c.island_flag || c.sensor {
                    continue;
                }
                if c.body_a == body {
                    c.body_b
                } else {
                    c.body_a
                }
            };

            let (backup, other_in_island, other_type) = {
                let Ok(o) = other.get(&self.registry) else {
                    continue;
                };
                // Dynamic neighbours only join when a bullet is involved.
                if o.body_type == BodyType::Dynamic && !is_bullet && !o.bullet {
                    continue;
                }
                (o.sweep, o.island_flag, o.body_type)
            };

            // Advance the neighbour to the TOI; reverted unless it touches.
            if !other_in_island {
                if let Ok(mut o) = other.get_mut(&self.registry) {
                    o.advance(alpha);
                }
            }

            update_contact(&self.registry, &mut self.events, contact);

            let usable = contact
                .get(&self.registry)
                .map(|c| c.enabled && c.touching)
                .unwrap_or(false);
            if !usable {
                if let Ok(mut o) = other.get_mut(&self.registry) {
                    o.sweep = backup;
                    o.synchronize_transform();
                }
                continue;
            }

            if let Ok(mut c) = contact.get_mut(&self.registry) {
                c.island_flag = true;
            }
            self.island.contacts.push(contact);

            if other_in_island {
                continue;
            }
            if let Ok(mut o) = other.get_mut(&self.registry) {
                o.island_flag = true;
                if other_type != BodyType::Static {
                    o.set_awake(true);
                }
            }
            self.island.add_body(&self.registry, other);
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Visit every fixture whose fat AABB overlaps `aabb`.
    ///
    /// The callback returns whether to keep visiting. A chain fixture is
    /// reported once per overlapping child.
    pub fn query_aabb<F>(&self, aabb: &Aabb, mut callback: F)
    where
        F: FnMut(FixtureHandle) -> bool,
    {
        let broad_phase = &self.contact_manager.broad_phase;
        broad_phase.query(aabb, |proxy_id| match broad_phase.user_data(proxy_id) {
            Some(key) => callback(key.fixture),
            None => true,
        });
    }

    /// Cast a ray from `p1` to `p2` against every fixture it crosses.
    ///
    /// The callback receives the fixture, hit point, normal and fraction, and
    /// returns the new max fraction: `-1` ignores the fixture, `0` ends the
    /// cast, `fraction` clips to the closest hit and `1` continues unclipped.
    pub fn ray_cast<F>(&self, p1: Vec2, p2: Vec2, mut callback: F)
    where
        F: FnMut(FixtureHandle, Vec2, Vec2, f32) -> f32,
    {
        let input = RayCastInput {
            p1,
            p2,
            max_fraction: 1.0,
        };
        let broad_phase = &self.contact_manager.broad_phase;
        broad_phase.ray_cast(&input, |sub_input, proxy_id| {
            let Some(key) = broad_phase.user_data(proxy_id) else {
                return sub_input.max_fraction;
            };
            let hit = key.fixture.get(&self.registry).ok().and_then(|f| {
                let xf = f.body.get(&self.registry).ok()?.xf;
                f.ray_cast(sub_input, &xf, key.child_index)
            });
            match hit {
                Some(output) => {
                    let fraction = output.fraction;
                    let point = (1.0 - fraction) * sub_input.p1 + fraction * sub_input.p2;
                    callback(key.fixture, point, output.normal, fraction)
                }
                None => sub_input.max_fraction,
            }
        });
    }

    /// Every fixture whose shape contains `point`.
    pub fn test_point(&self, point: Vec2) -> Vec<FixtureHandle> {
        let aabb = Aabb::from_center(point, Vec2::splat(self.config.linear_slop));
        let mut found: Vec<FixtureHandle> = Vec::new();
        self.query_aabb(&aabb, |fixture| {
            if !found.contains(&fixture)
                && self.fixture_test_point(fixture, point).unwrap_or(false)
            {
                found.push(fixture);
            }
            true
        });
        found
    }

    pub fn proxy_count(&self) -> usize {
        self.contact_manager.broad_phase.proxy_count()
    }

    pub fn tree_height(&self) -> i32 {
        self.contact_manager.broad_phase.tree().height()
    }

    pub fn tree_balance(&self) -> i32 {
        self.contact_manager.broad_phase.tree().max_balance()
    }

    /// Sum of node perimeters over the root perimeter. Lower is better.
    pub fn tree_quality(&self) -> f32 {
        self.contact_manager.broad_phase.tree().area_ratio()
    }

    /// Check the tree's structural invariants.
    pub fn validate_tree(&self) -> bool {
        self.contact_manager.broad_phase.tree().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CircleShape, PolygonShape};

    fn ground(world: &mut World) -> anyhow::Result<BodyHandle> {
        let ground = world.create_body(&BodyDef::fixed(Vec2::ZERO));
        world.create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(10.0, 0.5)?))?;
        Ok(ground)
    }

    fn ball(world: &mut World, position: Vec2, radius: f32) -> anyhow::Result<BodyHandle> {
        let body = world.create_body(&BodyDef::dynamic(position));
        world.create_fixture(
            body,
            &FixtureDef::new(CircleShape::new(radius)?).with_density(1.0),
        )?;
        Ok(body)
    }

    #[test]
    fn test_world_rejects_invalid_config() {
        let config = WorldConfig {
            fixed_timestep: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            World::new(config),
            Err(PhysicsError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_destroyed_body_handle_is_invalid() -> anyhow::Result<()> {
        let mut world = World::default();
        let body = ball(&mut world, Vec2::ZERO, 0.5)?;
        let fixture = world.body(body)?.fixtures()[0];
        assert_eq!(world.proxy_count(), 1);

        world.destroy_body(body)?;
        assert!(matches!(
            world.body(body),
            Err(PhysicsError::InvalidHandle { kind: "body" })
        ));
        assert!(world.fixture(fixture).is_err());
        assert_eq!(world.proxy_count(), 0);
        assert!(world.destroy_body(body).is_err());
        Ok(())
    }

    #[test]
    fn test_free_fall_velocity() -> anyhow::Result<()> {
        let mut world = World::default();
        let body = ball(&mut world, Vec2::new(0.0, 100.0), 0.5)?;

        for _ in 0..60 {
            world.step(1.0 / 60.0, 8, 3);
        }

        let v = world.body(body)?.linear_velocity();
        assert!((v.y + 10.0).abs() < 1e-3, "vy = {}", v.y);
        assert!(v.x.abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_fixture_density_sets_mass() -> anyhow::Result<()> {
        let mut world = World::default();
        let body = ball(&mut world, Vec2::ZERO, 1.0)?;
        let mass = world.body(body)?.mass();
        assert!((mass - std::f32::consts::PI).abs() < 1e-4, "mass = {}", mass);

        let fixture = world.body(body)?.fixtures()[0];
        world.set_fixture_density(fixture, 2.0)?;
        let mass = world.body(body)?.mass();
        assert!((mass - 2.0 * std::f32::consts::PI).abs() < 1e-4, "mass = {}", mass);
        Ok(())
    }

    #[test]
    fn test_zero_density_rejected_on_dynamic_body() -> anyhow::Result<()> {
        let mut world = World::default();
        let body = world.create_body(&BodyDef::dynamic(Vec2::ZERO));
        let result = world.create_fixture(body, &FixtureDef::new(CircleShape::new(0.5)?));
        assert!(matches!(result, Err(PhysicsError::InvalidDensity { .. })));
        Ok(())
    }

    #[test]
    fn test_box_comes_to_rest_on_ground() -> anyhow::Result<()> {
        let mut world = World::default();
        ground(&mut world)?;
        let body = world.create_body(&BodyDef::dynamic(Vec2::new(0.0, 2.0)));
        world.create_fixture(
            body,
            &FixtureDef::new(PolygonShape::new_box(0.5, 0.5)?).with_density(1.0),
        )?;

        for _ in 0..180 {
            world.step(1.0 / 60.0, 8, 3);
        }

        let b = world.body(body)?;
        assert!((b.position().y - 1.0).abs() < 0.05, "y = {}", b.position().y);
        assert!(b.linear_velocity().length() < 0.05);
        Ok(())
    }

    #[test]
    fn test_begin_contact_reported_once() -> anyhow::Result<()> {
        let mut world = World::default();
        ground(&mut world)?;
        ball(&mut world, Vec2::new(0.0, 1.5), 0.5)?;

        let mut begins = 0;
        for _ in 0..120 {
            world.step(1.0 / 60.0, 8, 3);
            begins += world
                .drain_events()
                .iter()
                .filter(|e| matches!(e, WorldEvent::BeginContact { .. }))
                .count();
        }
        assert_eq!(begins, 1);
        Ok(())
    }

    #[test]
    fn test_destroying_touching_body_ends_contact() -> anyhow::Result<()> {
        let mut world = World::default();
        ground(&mut world)?;
        let body = ball(&mut world, Vec2::new(0.0, 0.95), 0.5)?;

        world.step(1.0 / 60.0, 8, 3);
        assert!(world
            .drain_events()
            .iter()
            .any(|e| matches!(e, WorldEvent::BeginContact { .. })));

        world.destroy_body(body)?;
        let events = world.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], WorldEvent::EndContact { .. }));
        assert_eq!(world.contact_count(), 0);
        Ok(())
    }

    #[test]
    fn test_queued_destroy_applies_on_next_step() -> anyhow::Result<()> {
        let mut world = World::default();
        let body = ball(&mut world, Vec2::ZERO, 0.5)?;

        world.queue_destroy_body(body)?;
        assert!(world.body(body).is_ok());

        world.step(1.0 / 60.0, 8, 3);
        assert!(world.body(body).is_err());
        assert_eq!(world.body_count(), 0);
        Ok(())
    }

    #[test]
    fn test_advance_takes_fixed_steps() {
        let mut world = World::default();
        assert_eq!(world.advance(1.0 / 120.0), 0);
        assert_eq!(world.advance(1.0 / 120.0 + 1e-9), 1);
        assert_eq!(world.advance(1.0 / 30.0), 2);

        // A long frame is capped and the backlog dropped.
        assert_eq!(world.advance(1.0), 4);
        assert_eq!(world.advance(0.0), 0);
    }

    #[test]
    fn test_query_aabb_stops_on_false() -> anyhow::Result<()> {
        let mut world = World::default();
        for i in 0..5 {
            ball(&mut world, Vec2::new(i as f32 * 0.1, 0.0), 0.5)?;
        }

        let mut all = 0;
        world.query_aabb(&Aabb::from_center(Vec2::ZERO, Vec2::splat(1.0)), |_| {
            all += 1;
            true
        });
        assert_eq!(all, 5);

        let mut visited = 0;
        world.query_aabb(&Aabb::from_center(Vec2::ZERO, Vec2::splat(1.0)), |_| {
            visited += 1;
            false
        });
        assert_eq!(visited, 1);
        Ok(())
    }

    #[test]
    fn test_ray_cast_closest_hit() -> anyhow::Result<()> {
        let mut world = World::default();
        let near = ball(&mut world, Vec2::new(2.0, 0.0), 0.5)?;
        ball(&mut world, Vec2::new(5.0, 0.0), 0.5)?;
        let near_fixture = world.body(near)?.fixtures()[0];

        let mut closest = None;
        world.ray_cast(Vec2::ZERO, Vec2::new(10.0, 0.0), |fixture, point, normal, fraction| {
            closest = Some((fixture, point, normal));
            fraction
        });

        let (fixture, point, normal) = closest.ok_or_else(|| anyhow::anyhow!("no hit"))?;
        assert_eq!(fixture, near_fixture);
        assert!((point.x - 1.5).abs() < 1e-4, "x = {}", point.x);
        assert!((normal - Vec2::new(-1.0, 0.0)).length() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_test_point_finds_containing_fixture() -> anyhow::Result<()> {
        let mut world = World::default();
        let body = ball(&mut world, Vec2::new(1.0, 1.0), 0.5)?;
        let fixture = world.body(body)?.fixtures()[0];

        assert_eq!(world.test_point(Vec2::new(1.2, 1.0)), vec![fixture]);
        assert!(world.test_point(Vec2::new(3.0, 3.0)).is_empty());
        Ok(())
    }

    #[test]
    fn test_joint_suppresses_contact_between_bodies() -> anyhow::Result<()> {
        let mut world = World::default();
        world.set_gravity(Vec2::ZERO);
        let a = ball(&mut world, Vec2::ZERO, 0.5)?;
        let b = ball(&mut world, Vec2::new(0.99, 0.0), 0.5)?;

        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.contact_count(), 1);

        let def = {
            let body_a = world.body(a)?;
            let body_b = world.body(b)?;
            crate::dynamics::joints::RevoluteJointDef::new(&body_a, &body_b, Vec2::new(0.5, 0.0))
        };
        let joint = world.create_joint(&JointDef::new(a, b, def))?;
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.contact_count(), 0);

        world.destroy_joint(joint)?;
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.contact_count(), 1);
        Ok(())
    }

    #[test]
    fn test_fast_ball_does_not_tunnel_through_ground() -> anyhow::Result<()> {
        let mut world = World::default();
        let ground = world.create_body(&BodyDef::fixed(Vec2::ZERO));
        world.create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(5.0, 0.05)?))?;
        let body = ball(&mut world, Vec2::new(0.0, 3.0), 0.25)?;
        world.body_mut(body)?.set_linear_velocity(Vec2::new(0.0, -100.0));

        for _ in 0..10 {
            world.step(1.0 / 60.0, 8, 3);
        }

        let y = world.body(body)?.position().y;
        assert!(y > 0.0, "ball tunneled to y = {}", y);
        Ok(())
    }

    #[test]
    fn test_disabled_body_has_no_proxies() -> anyhow::Result<()> {
        let mut world = World::default();
        let body = ball(&mut world, Vec2::ZERO, 0.5)?;

        world.set_enabled(body, false)?;
        assert_eq!(world.proxy_count(), 0);
        world.step(1.0 / 60.0, 8, 3);
        assert_eq!(world.body(body)?.position(), Vec2::ZERO);

        world.set_enabled(body, true)?;
        assert_eq!(world.proxy_count(), 1);
        Ok(())
    }

    #[test]
    fn test_set_type_static_stops_motion() -> anyhow::Result<()> {
        let mut world = World::default();
        let body = ball(&mut world, Vec2::ZERO, 0.5)?;
        world.step(1.0 / 60.0, 8, 3);

        world.set_type(body, BodyType::Static)?;
        let b = world.body(body)?;
        assert_eq!(b.linear_velocity(), Vec2::ZERO);
        assert_eq!(b.mass(), 0.0);
        assert!(!b.is_awake());
        Ok(())
    }
}
