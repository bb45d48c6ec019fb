//! Contact lifecycle: broadphase pairs in, touching contacts out.

use tracing::trace;

use crate::broadphase::BroadPhase;
use crate::collision::collide::contact_order;
use crate::config::WorldConfig;
use crate::events::{EventQueue, WorldEvent};

use super::body::{BodyHandle, BodyType};
use super::contact::{mix_friction, mix_restitution, Contact, ContactHandle, TouchTransition};
use super::fixture::{FixtureHandle, ProxyKey};

/// Owns the broadphase and creates, updates and destroys contacts.
#[derive(Debug)]
pub(crate) struct ContactManager {
    pub broad_phase: BroadPhase<ProxyKey>,
}

impl ContactManager {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            broad_phase: BroadPhase::new(config.aabb_extension, config.aabb_multiplier),
        }
    }

    /// Create contacts for every new broadphase pair.
    pub fn find_new_contacts(&mut self, registry: &mut hecs::World) {
        let mut pairs = Vec::new();
        self.broad_phase.update_pairs(|a, b| pairs.push((a, b)));
        let candidates = pairs.len();

        let created = pairs
            .into_iter()
            .filter(|&(a, b)| add_pair(registry, a, b))
            .count();
        if created > 0 {
            trace!(candidates, created, "new contacts");
        }
    }

    /// Narrowphase: refilter, drop contacts whose fat AABBs separated, update the rest.
    pub fn collide(&mut self, registry: &mut hecs::World, events: &mut EventQueue) {
        let handles: Vec<ContactHandle> = registry
            .query::<&Contact>()
            .iter()
            .map(|(entity, _)| ContactHandle(entity))
            .collect();

        for handle in handles {
            let Ok(contact) = handle.get(registry) else {
                continue;
            };
            let fixture_a = contact.fixture_a;
            let fixture_b = contact.fixture_b;
            let child_a = contact.child_a;
            let child_b = contact.child_b;
            let body_a = contact.body_a;
            let body_b = contact.body_b;
            let filter_flag = contact.filter_flag;
            drop(contact);

            if filter_flag {
                if !bodies_should_collide(registry, body_a, body_b)
                    || !fixtures_should_collide(registry, fixture_a, fixture_b)
                {
                    destroy_contact(registry, events, handle);
                    continue;
                }
                if let Ok(mut contact) = handle.get_mut(registry) {
                    contact.filter_flag = false;
                }
            }

            if !is_active(registry, body_a) && !is_active(registry, body_b) {
                continue;
            }

            let proxy_a = proxy_id(registry, fixture_a, child_a);
            let proxy_b = proxy_id(registry, fixture_b, child_b);
            let overlap = match (proxy_a, proxy_b) {
                (Some(a), Some(b)) => self.broad_phase.test_overlap(a, b),
                _ => false,
            };
            if !overlap {
                destroy_contact(registry, events, handle);
                continue;
            }

            update_contact(registry, events, handle);
        }
    }
}

fn is_active(registry: &hecs::World, body: BodyHandle) -> bool {
    body.get(registry)
        .map(|b| b.awake && b.body_type != BodyType::Static)
        .unwrap_or(false)
}

fn proxy_id(registry: &hecs::World, fixture: FixtureHandle, child: usize) -> Option<usize> {
    let fixture = fixture.get(registry).ok()?;
    fixture.proxies.get(child).map(|p| p.proxy_id)
}

/// Body types and joints allow a contact between the two bodies.
pub(crate) fn bodies_should_collide(
    registry: &hecs::World,
    body_a: BodyHandle,
    body_b: BodyHandle,
) -> bool {
    let (Ok(a), Ok(b)) = (body_a.get(registry), body_b.get(registry)) else {
        return false;
    };
    if !a.types_collide(&b) {
        return false;
    }

    // A joint between the two bodies may suppress collision.
    for joint in &b.joints {
        let Ok(joint) = joint.get(registry) else {
            continue;
        };
        let connects = (joint.body_a == body_a && joint.body_b == body_b)
            || (joint.body_a == body_b && joint.body_b == body_a);
        if connects && !joint.collide_connected {
            return false;
        }
    }
    true
}

fn fixtures_should_collide(
    registry: &hecs::World,
    fixture_a: FixtureHandle,
    fixture_b: FixtureHandle,
) -> bool {
    match (fixture_a.get(registry), fixture_b.get(registry)) {
        (Ok(a), Ok(b)) => a.filter.should_collide(&b.filter),
        _ => false,
    }
}

/// Create a contact for a new broadphase pair. Returns true if one was created.
fn add_pair(registry: &mut hecs::World, key_a: ProxyKey, key_b: ProxyKey) -> bool {
    let (Ok(fixture_a), Ok(fixture_b)) = (key_a.fixture.get(registry), key_b.fixture.get(registry))
    else {
        return false;
    };
    let body_a = fixture_a.body;
    let body_b = fixture_b.body;
    let type_a = fixture_a.shape_type();
    let type_b = fixture_b.shape_type();
    let filter_ok = fixture_a.filter.should_collide(&fixture_b.filter);
    let friction = mix_friction(fixture_a.friction, fixture_b.friction);
    let restitution = mix_restitution(fixture_a.restitution, fixture_b.restitution);
    let sensor = fixture_a.is_sensor || fixture_b.is_sensor;
    drop(fixture_a);
    drop(fixture_b);

    // Fixtures on the same body never collide.
    if body_a == body_b {
        return false;
    }

    if contact_exists(registry, key_a, key_b, body_b) {
        return false;
    }

    if !bodies_should_collide(registry, body_a, body_b) || !filter_ok {
        return false;
    }

    let Some(swap) = contact_order(type_a, type_b) else {
        return false;
    };
    let contact = if swap {
        Contact::new(
            key_b.fixture,
            key_b.child_index,
            body_b,
            key_a.fixture,
            key_a.child_index,
            body_a,
            friction,
            restitution,
            sensor,
        )
    } else {
        Contact::new(
            key_a.fixture,
            key_a.child_index,
            body_a,
            key_b.fixture,
            key_b.child_index,
            body_b,
            friction,
            restitution,
            sensor,
        )
    };

    let handle = ContactHandle(registry.spawn((contact,)));
    for body in [body_a, body_b] {
        if let Ok(mut body) = body.get_mut(registry) {
            body.contacts.push(handle);
        }
    }
    true
}

fn contact_exists(
    registry: &hecs::World,
    key_a: ProxyKey,
    key_b: ProxyKey,
    body_b: BodyHandle,
) -> bool {
    let Ok(body) = body_b.get(registry) else {
        return false;
    };
    body.contacts.iter().any(|&handle| {
        let Ok(c) = handle.get(registry) else {
            return false;
        };
        let same = c.fixture_a == key_a.fixture
            && c.fixture_b == key_b.fixture
            && c.child_a == key_a.child_index
            && c.child_b == key_b.child_index;
        let swapped = c.fixture_a == key_b.fixture
            && c.fixture_b == key_a.fixture
            && c.child_a == key_b.child_index
            && c.child_b == key_a.child_index;
        same || swapped
    })
}

/// Run the narrowphase for one contact, wake bodies on touch changes and queue events.
pub(crate) fn update_contact(
    registry: &hecs::World,
    events: &mut EventQueue,
    handle: ContactHandle,
) -> Option<TouchTransition> {
    let contact = handle.get(registry).ok()?;
    let (fixture_a, fixture_b) = (contact.fixture_a, contact.fixture_b);
    let (body_a, body_b) = (contact.body_a, contact.body_b);
    let sensor = contact.sensor;
    drop(contact);

    let xf_a = body_a.get(registry).ok()?.xf;
    let xf_b = body_b.get(registry).ok()?.xf;

    let transition = {
        let shape_a = fixture_a.get(registry).ok()?;
        let shape_b = fixture_b.get(registry).ok()?;
        let mut contact = handle.get_mut(registry).ok()?;
        contact.update(&shape_a.shape, &shape_b.shape, &xf_a, &xf_b)
    };

    if !sensor && transition.touching != transition.was_touching {
        for body in [body_a, body_b] {
            if let Ok(mut body) = body.get_mut(registry) {
                body.set_awake(true);
            }
        }
    }

    if transition.began() {
        events.push(WorldEvent::BeginContact {
            contact: handle,
            fixture_a,
            fixture_b,
        });
    } else if transition.ended() {
        events.push(WorldEvent::EndContact {
            contact: handle,
            fixture_a,
            fixture_b,
        });
    }

    Some(transition)
}

/// Destroy a contact, reporting the end of touch if it was touching.
pub(crate) fn destroy_contact(
    registry: &mut hecs::World,
    events: &mut EventQueue,
    handle: ContactHandle,
) {
    let Ok(contact) = handle.get(registry) else {
        return;
    };
    let touching = contact.touching;
    let had_points = contact.manifold.point_count > 0 && !contact.sensor;
    let (fixture_a, fixture_b) = (contact.fixture_a, contact.fixture_b);
    let (body_a, body_b) = (contact.body_a, contact.body_b);
    drop(contact);

    if touching {
        events.push(WorldEvent::EndContact {
            contact: handle,
            fixture_a,
            fixture_b,
        });
    }

    for body in [body_a, body_b] {
        if let Ok(mut body) = body.get_mut(registry) {
            body.contacts.retain(|&c| c != handle);
            if had_points {
                body.set_awake(true);
            }
        }
    }

    let _ = registry.despawn(handle.0);
}

/// Destroy every contact on `body` that involves `fixture`, or all of them when `fixture` is None.
pub(crate) fn destroy_body_contacts(
    registry: &mut hecs::World,
    events: &mut EventQueue,
    body: BodyHandle,
    fixture: Option<FixtureHandle>,
) {
    let Ok(b) = body.get(registry) else {
        return;
    };
    let contacts = b.contacts.clone();
    drop(b);

    for handle in contacts {
        let involved = match fixture {
            None => true,
            Some(f) => handle
                .get(registry)
                .map(|c| c.fixture_a == f || c.fixture_b == f)
                .unwrap_or(false),
        };
        if involved {
            destroy_contact(registry, events, handle);
        }
    }
}

/// Flag every contact between the two bodies for refiltering.
pub(crate) fn flag_contacts_between(registry: &hecs::World, body_a: BodyHandle, body_b: BodyHandle) {
    let Ok(b) = body_b.get(registry) else {
        return;
    };
    for &handle in &b.contacts {
        if let Ok(mut c) = handle.get_mut(registry) {
            if c.body_a == body_a || c.body_b == body_a {
                c.flag_for_filtering();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::{CircleShape, PolygonShape};
    use crate::dynamics::body::{Body, BodyDef};
    use crate::dynamics::fixture::{Fixture, FixtureDef};
    use crate::math::Transform;
    use glam::Vec2;

    fn spawn_body(registry: &mut hecs::World, def: &BodyDef) -> BodyHandle {
        BodyHandle(registry.spawn((Body::new(def),)))
    }

    fn attach(
        registry: &mut hecs::World,
        manager: &mut ContactManager,
        body: BodyHandle,
        def: &FixtureDef,
    ) -> FixtureHandle {
        let handle = FixtureHandle(registry.spawn((Fixture::new(body, def),)));
        let xf: Transform = body.get(registry).map(|b| b.xf).unwrap();
        handle
            .get_mut(registry)
            .unwrap()
            .create_proxies(&mut manager.broad_phase, &xf, handle);
        body.get_mut(registry).unwrap().fixtures.push(handle);
        handle
    }

    #[test]
    fn test_overlapping_fixtures_create_one_contact() {
        let mut registry = hecs::World::new();
        let mut events = EventQueue::default();
        let mut manager = ContactManager::new(&WorldConfig::default());

        let ground = spawn_body(&mut registry, &BodyDef::fixed(Vec2::ZERO));
        let ball = spawn_body(&mut registry, &BodyDef::dynamic(Vec2::new(0.0, 1.4)));
        attach(
            &mut registry,
            &mut manager,
            ground,
            &FixtureDef::new(PolygonShape::new_box(5.0, 1.0).unwrap()),
        );
        attach(
            &mut registry,
            &mut manager,
            ball,
            &FixtureDef::new(CircleShape::new(0.5).unwrap()).with_density(1.0),
        );

        manager.find_new_contacts(&mut registry);
        manager.find_new_contacts(&mut registry);
        assert_eq!(registry.query::<&Contact>().iter().count(), 1);

        manager.collide(&mut registry, &mut events);
        let taken = events.take();
        assert_eq!(taken.len(), 1);
        assert!(matches!(taken[0], WorldEvent::BeginContact { .. }));

        // Polygon sorts before circle.
        let (_, contact) = registry.query_mut::<&Contact>().into_iter().next().unwrap();
        assert!(contact.is_touching());
        assert_eq!(contact.body_a(), ground);
    }

    #[test]
    fn test_static_pairs_never_get_contacts() {
        let mut registry = hecs::World::new();
        let mut manager = ContactManager::new(&WorldConfig::default());
        let a = spawn_body(&mut registry, &BodyDef::fixed(Vec2::ZERO));
        let b = spawn_body(&mut registry, &BodyDef::fixed(Vec2::new(0.5, 0.0)));
        for body in [a, b] {
            attach(
                &mut registry,
                &mut manager,
                body,
                &FixtureDef::new(CircleShape::new(1.0).unwrap()),
            );
        }
        manager.find_new_contacts(&mut registry);
        assert_eq!(registry.query::<&Contact>().iter().count(), 0);
    }

    #[test]
    fn test_destroy_touching_contact_reports_end() {
        let mut registry = hecs::World::new();
        let mut events = EventQueue::default();
        let mut manager = ContactManager::new(&WorldConfig::default());
        let a = spawn_body(&mut registry, &BodyDef::dynamic(Vec2::ZERO));
        let b = spawn_body(&mut registry, &BodyDef::dynamic(Vec2::new(0.5, 0.0)));
        for body in [a, b] {
            attach(
                &mut registry,
                &mut manager,
                body,
                &FixtureDef::new(CircleShape::new(1.0).unwrap()).with_density(1.0),
            );
        }
        manager.find_new_contacts(&mut registry);
        manager.collide(&mut registry, &mut events);
        events.take();

        destroy_body_contacts(&mut registry, &mut events, a, None);
        let taken = events.take();
        assert_eq!(taken.len(), 1);
        assert!(matches!(taken[0], WorldEvent::EndContact { .. }));
        assert!(a.get(&registry).unwrap().contacts.is_empty());
        assert!(b.get(&registry).unwrap().contacts.is_empty());
    }
}
