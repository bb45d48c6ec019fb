//! Islands: bodies connected through touching contacts and enabled joints,
//! solved together and put to sleep together.

use glam::Vec2;
use tracing::{debug, info};

use crate::config::{TimeStep, WorldConfig};
use crate::events::{EventQueue, WorldEvent};

use super::body::{BodyHandle, BodyType};
use super::contact::ContactHandle;
use super::contact_solver::{ContactSolver, ContactSolverInput};
use super::joints::{Joint, JointHandle, SolverBodies};

/// Center of mass position and angle of an island body.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Position {
    pub c: Vec2,
    pub a: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Velocity {
    pub v: Vec2,
    pub w: f32,
}

/// Island-local state handed to joint solvers.
pub(crate) struct SolverData<'a> {
    pub step: TimeStep,
    pub config: &'a WorldConfig,
    pub positions: &'a mut [Position],
    pub velocities: &'a mut [Velocity],
}

/// Bodies, contacts and joints gathered by the world's graph traversal.
#[derive(Debug, Default)]
pub(crate) struct Island {
    pub bodies: Vec<BodyHandle>,
    pub contacts: Vec<ContactHandle>,
    pub joints: Vec<JointHandle>,
}

/// What happened while solving an island.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct IslandReport {
    pub fell_asleep: bool,
    pub broken_joints: usize,
}

impl Island {
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }

    /// Add a body and record its island index on it.
    pub fn add_body(&mut self, registry: &hecs::World, handle: BodyHandle) {
        if let Ok(mut body) = handle.get_mut(registry) {
            body.island_index = self.bodies.len();
        }
        self.bodies.push(handle);
    }

    /// Integrate velocities, solve constraints, integrate positions and update sleep timers.
    pub fn solve(
        &mut self,
        registry: &hecs::World,
        step: &TimeStep,
        config: &WorldConfig,
        events: &mut EventQueue,
    ) -> IslandReport {
        let h = step.dt;
        let mut report = IslandReport::default();

        let mut positions = Vec::with_capacity(self.bodies.len());
        let mut velocities = Vec::with_capacity(self.bodies.len());
        for &handle in &self.bodies {
            let Ok(mut body) = handle.get_mut(registry) else {
                positions.push(Position::default());
                velocities.push(Velocity::default());
                continue;
            };

            let c = body.sweep.c;
            let a = body.sweep.a;
            let mut v = body.linear_velocity;
            let mut w = body.angular_velocity;

            // Sweep start for CCD.
            body.sweep.c0 = c;
            body.sweep.a0 = a;

            if body.body_type == BodyType::Dynamic {
                v += h * (body.gravity_scale * config.gravity + body.inv_mass * body.force);
                w += h * body.inv_inertia * body.torque;

                // v *= 1 / (1 + h * c)
                v *= 1.0 / (1.0 + h * body.linear_damping);
                w *= 1.0 / (1.0 + h * body.angular_damping);
            }

            positions.push(Position { c, a });
            velocities.push(Velocity { v, w });
        }

        let inputs = self
            .contacts
            .iter()
            .filter_map(|&handle| contact_input(registry, handle))
            .collect();
        let mut contact_solver = ContactSolver::new(step, config, inputs);
        contact_solver.initialize_velocity_constraints(&positions, &velocities);
        if step.warm_starting {
            contact_solver.warm_start(&mut velocities);
        }

        let mut joints: Vec<(JointHandle, Joint)> = self
            .joints
            .iter()
            .filter_map(|&handle| {
                let mut joint = (*handle.get(registry).ok()?).clone();
                joint.bodies = solver_bodies(registry, &joint)?;
                Some((handle, joint))
            })
            .collect();

        let mut data = SolverData {
            step: *step,
            config,
            positions: &mut positions,
            velocities: &mut velocities,
        };

        for (_, joint) in &mut joints {
            joint.init_velocity_constraints(&mut data);
        }

        for _ in 0..step.velocity_iterations {
            for (_, joint) in &mut joints {
                joint.solve_velocity_constraints(&mut data);
            }
            contact_solver.solve_velocity_constraints(data.velocities);
        }

        contact_solver.store_impulses(registry);

        for (handle, joint) in &mut joints {
            if joint.check_break(step.inv_dt) {
                let reaction_force = joint.reaction_force(step.inv_dt);
                let reaction_torque = joint.reaction_torque(step.inv_dt);
                info!(
                    force = reaction_force.length(),
                    breakpoint = joint.breakpoint,
                    "joint broke"
                );
                events.push(WorldEvent::JointBroke {
                    joint: *handle,
                    reaction_force,
                    reaction_torque,
                });
                report.broken_joints += 1;
            }
        }

        integrate_positions(&mut data, config);

        let mut position_solved = false;
        for _ in 0..step.position_iterations {
            let contacts_okay = contact_solver.solve_position_constraints(data.positions);

            let mut joints_okay = true;
            for (_, joint) in joints.iter_mut().filter(|(_, j)| j.enabled) {
                let okay = joint.solve_position_constraints(&mut data);
                joints_okay = joints_okay && okay;
            }

            if contacts_okay && joints_okay {
                // All constraints within slop.
                position_solved = true;
                break;
            }
        }

        for (i, &handle) in self.bodies.iter().enumerate() {
            if let Ok(mut body) = handle.get_mut(registry) {
                body.sweep.c = positions[i].c;
                body.sweep.a = positions[i].a;
                body.linear_velocity = velocities[i].v;
                body.angular_velocity = velocities[i].w;
                body.synchronize_transform();
            }
        }

        for (handle, joint) in joints {
            if let Ok(mut stored) = handle.get_mut(registry) {
                *stored = joint;
            }
        }

        if config.allow_sleep {
            report.fell_asleep = self.update_sleep(registry, h, config, position_solved);
        }

        report
    }

    /// Advance sleep timers. Returns true if the whole island went to sleep.
    fn update_sleep(
        &self,
        registry: &hecs::World,
        h: f32,
        config: &WorldConfig,
        position_solved: bool,
    ) -> bool {
        let lin_tol_sqr = config.linear_sleep_tolerance * config.linear_sleep_tolerance;
        let ang_tol_sqr = config.angular_sleep_tolerance * config.angular_sleep_tolerance;

        let mut min_sleep_time = f32::MAX;
        for &handle in &self.bodies {
            let Ok(mut body) = handle.get_mut(registry) else {
                continue;
            };
            if body.body_type == BodyType::Static {
                continue;
            }

            let moving = body.angular_velocity * body.angular_velocity > ang_tol_sqr
                || body.linear_velocity.length_squared() > lin_tol_sqr;
            if !body.sleeping_allowed || moving {
                body.sleep_time = 0.0;
                min_sleep_time = 0.0;
            } else {
                body.sleep_time += h;
                min_sleep_time = min_sleep_time.min(body.sleep_time);
            }
        }

        if min_sleep_time < config.time_to_sleep || !position_solved {
            return false;
        }

        for &handle in &self.bodies {
            if let Ok(mut body) = handle.get_mut(registry) {
                body.set_awake(false);
            }
        }
        debug!(bodies = self.bodies.len(), "island asleep");
        true
    }

    /// Resolve a TOI event: push the two TOI bodies out of penetration, then
    /// solve velocities for the remainder of the step without warm starting.
    pub fn solve_toi(
        &mut self,
        registry: &hecs::World,
        sub_step: &TimeStep,
        config: &WorldConfig,
        toi_index_a: usize,
        toi_index_b: usize,
    ) {
        let mut positions = Vec::with_capacity(self.bodies.len());
        let mut velocities = Vec::with_capacity(self.bodies.len());
        for &handle in &self.bodies {
            let (position, velocity) = handle
                .get(registry)
                .map(|b| {
                    (
                        Position {
                            c: b.sweep.c,
                            a: b.sweep.a,
                        },
                        Velocity {
                            v: b.linear_velocity,
                            w: b.angular_velocity,
                        },
                    )
                })
                .unwrap_or_default();
            positions.push(position);
            velocities.push(velocity);
        }

        let inputs = self
            .contacts
            .iter()
            .filter_map(|&handle| contact_input(registry, handle))
            .collect();
        let mut contact_solver = ContactSolver::new(sub_step, config, inputs);

        for _ in 0..sub_step.position_iterations {
            if contact_solver.solve_toi_position_constraints(
                &mut positions,
                toi_index_a,
                toi_index_b,
            ) {
                break;
            }
        }

        // The solved pose becomes the new sweep start.
        for index in [toi_index_a, toi_index_b] {
            if let Ok(mut body) = self.bodies[index].get_mut(registry) {
                body.sweep.c0 = positions[index].c;
                body.sweep.a0 = positions[index].a;
            }
        }

        // No warm starting: TOI impulses can be large and are not stored.
        contact_solver.initialize_velocity_constraints(&positions, &velocities);
        for _ in 0..sub_step.velocity_iterations {
            contact_solver.solve_velocity_constraints(&mut velocities);
        }

        let mut data = SolverData {
            step: *sub_step,
            config,
            positions: &mut positions,
            velocities: &mut velocities,
        };
        integrate_positions(&mut data, config);

        for (i, &handle) in self.bodies.iter().enumerate() {
            if let Ok(mut body) = handle.get_mut(registry) {
                body.sweep.c = positions[i].c;
                body.sweep.a = positions[i].a;
                body.linear_velocity = velocities[i].v;
                body.angular_velocity = velocities[i].w;
                body.synchronize_transform();
            }
        }
    }
}

/// Integrate positions, clamping motion that would exceed the per-step limits.
fn integrate_positions(data: &mut SolverData<'_>, config: &WorldConfig) {
    let h = data.step.dt;
    for (position, velocity) in data.positions.iter_mut().zip(data.velocities.iter_mut()) {
        let translation = h * velocity.v;
        if translation.length_squared() > config.max_translation * config.max_translation {
            let ratio = config.max_translation / translation.length();
            velocity.v *= ratio;
        }

        let rotation = h * velocity.w;
        if rotation * rotation > config.max_rotation * config.max_rotation {
            let ratio = config.max_rotation / rotation.abs();
            velocity.w *= ratio;
        }

        position.c += h * velocity.v;
        position.a += h * velocity.w;
    }
}

/// Solver snapshot of a touching, enabled contact.
fn contact_input(registry: &hecs::World, handle: ContactHandle) -> Option<ContactSolverInput> {
    let contact = handle.get(registry).ok()?;
    let radius_a = contact.fixture_a.get(registry).ok()?.shape.radius();
    let radius_b = contact.fixture_b.get(registry).ok()?.shape.radius();
    let body_a = contact.body_a.get(registry).ok()?;
    let body_b = contact.body_b.get(registry).ok()?;

    Some(ContactSolverInput {
        contact: handle,
        manifold: contact.manifold,
        friction: contact.friction,
        restitution: contact.restitution,
        tangent_speed: contact.tangent_speed,
        index_a: body_a.island_index,
        index_b: body_b.island_index,
        inv_mass_a: body_a.inv_mass,
        inv_mass_b: body_b.inv_mass,
        inv_i_a: body_a.inv_inertia,
        inv_i_b: body_b.inv_inertia,
        local_center_a: body_a.sweep.local_center,
        local_center_b: body_b.sweep.local_center,
        radius_a,
        radius_b,
    })
}

fn solver_bodies(registry: &hecs::World, joint: &Joint) -> Option<SolverBodies> {
    let body_a = joint.body_a.get(registry).ok()?;
    let body_b = joint.body_b.get(registry).ok()?;
    Some(SolverBodies {
        index_a: body_a.island_index,
        index_b: body_b.island_index,
        local_center_a: body_a.sweep.local_center,
        local_center_b: body_b.sweep.local_center,
        inv_mass_a: body_a.inv_mass,
        inv_mass_b: body_b.inv_mass,
        inv_i_a: body_a.inv_inertia,
        inv_i_b: body_b.inv_inertia,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::body::{Body, BodyDef};
    use crate::dynamics::joints::{JointDef, RevoluteJointDef};

    fn step_60hz() -> TimeStep {
        TimeStep {
            dt: 1.0 / 60.0,
            inv_dt: 60.0,
            dt_ratio: 1.0,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
        }
    }

    #[test]
    fn test_integrate_positions_clamps_translation() {
        let config = WorldConfig::default();
        let mut positions = vec![Position::default()];
        let mut velocities = vec![Velocity {
            v: Vec2::new(1000.0, 0.0),
            w: 1000.0,
        }];
        let mut data = SolverData {
            step: step_60hz(),
            config: &config,
            positions: &mut positions,
            velocities: &mut velocities,
        };
        integrate_positions(&mut data, &config);

        assert!(
            (positions[0].c.x - config.max_translation).abs() < 1e-4,
            "x = {}",
            positions[0].c.x
        );
        assert!((positions[0].a - config.max_rotation).abs() < 1e-4);
    }

    #[test]
    fn test_solve_island_with_revolute_joint_keeps_bob_on_circle() -> anyhow::Result<()> {
        let config = WorldConfig::default();
        let step = step_60hz();
        let mut registry = hecs::World::new();
        let mut events = EventQueue::default();

        let pivot = Body::new(&BodyDef::fixed(Vec2::ZERO));
        let mut bob = Body::new(&BodyDef::dynamic(Vec2::new(1.0, 0.0)));
        bob.apply_mass(1.0, Vec2::ZERO, 0.1);
        let hinge = RevoluteJointDef::new(&pivot, &bob, Vec2::ZERO);

        let pivot = BodyHandle(registry.spawn((pivot,)));
        let bob = BodyHandle(registry.spawn((bob,)));
        let joint = JointHandle(registry.spawn((Joint::new(&JointDef::new(pivot, bob, hinge))?,)));

        let mut island = Island::default();
        for _ in 0..60 {
            island.clear();
            island.add_body(&registry, pivot);
            island.add_body(&registry, bob);
            island.joints.push(joint);
            let report = island.solve(&registry, &step, &config, &mut events);
            assert_eq!(report.broken_joints, 0);
        }

        let center = bob.get(&registry)?.world_center();
        assert!(
            (center.length() - 1.0).abs() < 1e-2,
            "bob should stay one unit from the pivot, got {}",
            center.length()
        );
        assert!(center.y < -0.1, "bob should swing down, y = {}", center.y);
        assert!(joint.get(&registry)?.is_enabled());
        Ok(())
    }
}
