//! End-to-end scenarios driven through the public API only.

use rein2d::glam::Vec2;
use rein2d::{
    Aabb, BodyDef, BodyHandle, CircleShape, Filter, FixtureDef, JointDef, PhysicsError,
    PolygonShape, WeldJointDef, World, WorldConfig, WorldEvent,
};

// ============================================================================
// Helpers
// ============================================================================

const DT: f32 = 1.0 / 60.0;

fn run(world: &mut World, steps: usize) {
    for _ in 0..steps {
        world.step(DT, 8, 3);
    }
}

fn world_with_gravity(gravity: Vec2) -> anyhow::Result<World> {
    Ok(World::new(WorldConfig {
        gravity,
        ..WorldConfig::default()
    })?)
}

fn ground_box(world: &mut World, center: Vec2, half_width: f32) -> anyhow::Result<BodyHandle> {
    let ground = world.create_body(&BodyDef::fixed(center));
    world.create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(half_width, 0.5)?))?;
    Ok(ground)
}

fn dynamic_box(world: &mut World, center: Vec2, half: f32) -> anyhow::Result<BodyHandle> {
    let body = world.create_body(&BodyDef::dynamic(center));
    world.create_fixture(
        body,
        &FixtureDef::new(PolygonShape::new_box(half, half)?).with_density(1.0),
    )?;
    Ok(body)
}

// ============================================================================
// Sleep
// ============================================================================

/// Gravity points up here, so the ground sits above the ball.
#[test]
fn test_resting_ball_falls_asleep() -> anyhow::Result<()> {
    let mut world = world_with_gravity(Vec2::new(0.0, 9.8))?;
    ground_box(&mut world, Vec2::new(0.0, 2.5), 100.0)?;

    let ball = world.create_body(&BodyDef::dynamic(Vec2::ZERO));
    world.create_fixture(ball, &FixtureDef::new(CircleShape::new(0.5)?).with_density(1.0))?;

    // Reach the ground, settle, then stay still for longer than time_to_sleep.
    run(&mut world, 300);

    let body = world.body(ball)?;
    assert!(!body.is_awake(), "ball should be asleep after settling");
    assert!(
        (body.position().y - 1.5).abs() < 0.05,
        "ball should rest against the ground, y = {}",
        body.position().y
    );
    assert_eq!(body.linear_velocity(), Vec2::ZERO, "sleeping bodies have zero velocity");
    Ok(())
}

#[test]
fn test_sleep_disabled_keeps_ball_awake() -> anyhow::Result<()> {
    let mut world = world_with_gravity(Vec2::new(0.0, 9.8))?;
    world.set_allow_sleep(false);
    ground_box(&mut world, Vec2::new(0.0, 2.5), 100.0)?;

    let ball = world.create_body(&BodyDef::dynamic(Vec2::ZERO));
    world.create_fixture(ball, &FixtureDef::new(CircleShape::new(0.5)?).with_density(1.0))?;
    run(&mut world, 300);

    assert!(world.body(ball)?.is_awake());
    Ok(())
}

#[test]
fn test_impulse_wakes_sleeping_body() -> anyhow::Result<()> {
    let mut world = World::default();
    ground_box(&mut world, Vec2::ZERO, 20.0)?;
    let crate_box = dynamic_box(&mut world, Vec2::new(0.0, 1.0), 0.5)?;
    run(&mut world, 300);
    assert!(!world.body(crate_box)?.is_awake());

    world
        .body_mut(crate_box)?
        .apply_linear_impulse_to_center(Vec2::new(0.0, 5.0), true);
    assert!(world.body(crate_box)?.is_awake());
    run(&mut world, 10);
    assert!(world.body(crate_box)?.position().y > 1.1, "impulse should lift the box");
    Ok(())
}

// ============================================================================
// Joint breakpoint
// ============================================================================

#[test]
fn test_weld_breaks_exactly_once() -> anyhow::Result<()> {
    let mut world = world_with_gravity(Vec2::ZERO)?;
    let anchor_body = world.create_body(&BodyDef::fixed(Vec2::ZERO));
    let payload = dynamic_box(&mut world, Vec2::new(1.0, 0.0), 0.5)?;

    let weld = {
        let a = world.body(anchor_body)?;
        let b = world.body(payload)?;
        WeldJointDef::new(&a, &b, Vec2::new(0.5, 0.0))
    };
    let joint = world.create_joint(&JointDef::new(anchor_body, payload, weld).with_breakpoint(5.0))?;

    // Unloaded weld holds.
    run(&mut world, 10);
    assert!(world.drain_events().is_empty());
    assert!(world.joint(joint)?.is_enabled());

    // Pull with ten times the breakpoint.
    for _ in 0..60 {
        world
            .body_mut(payload)?
            .apply_force_to_center(Vec2::new(50.0, 0.0), true);
        world.step(DT, 8, 3);
    }

    let broke: Vec<_> = world
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            WorldEvent::JointBroke {
                joint,
                reaction_force,
                ..
            } => Some((joint, reaction_force)),
            _ => None,
        })
        .collect();
    assert_eq!(broke.len(), 1, "exactly one break event");
    assert_eq!(broke[0].0, joint);
    assert!(broke[0].1.length() > 5.0);
    assert!(!world.joint(joint)?.is_enabled());

    // Free flight after the break: F = m a with m = 1 for most of a second.
    let x = world.body(payload)?.position().x;
    assert!(x > 5.0, "payload should fly away once released, x = {x}");
    Ok(())
}

#[test]
fn test_infinite_breakpoint_never_breaks() -> anyhow::Result<()> {
    let mut world = world_with_gravity(Vec2::ZERO)?;
    let anchor_body = world.create_body(&BodyDef::fixed(Vec2::ZERO));
    let payload = dynamic_box(&mut world, Vec2::new(1.0, 0.0), 0.5)?;
    let weld = {
        let a = world.body(anchor_body)?;
        let b = world.body(payload)?;
        WeldJointDef::new(&a, &b, Vec2::new(0.5, 0.0))
    };
    let joint = world.create_joint(&JointDef::new(anchor_body, payload, weld))?;

    for _ in 0..60 {
        world
            .body_mut(payload)?
            .apply_force_to_center(Vec2::new(50.0, 0.0), true);
        world.step(DT, 8, 3);
    }

    assert!(world.joint(joint)?.is_enabled());
    assert!(world.drain_events().is_empty());
    let x = world.body(payload)?.position().x;
    assert!((x - 1.0).abs() < 0.1, "weld should hold the payload, x = {x}");
    Ok(())
}

// ============================================================================
// Warm starting
// ============================================================================

#[test]
fn test_step_at_rest_is_idempotent() -> anyhow::Result<()> {
    let mut world = world_with_gravity(Vec2::ZERO)?;
    ground_box(&mut world, Vec2::ZERO, 5.0)?;
    // Separated by exactly the linear slop once polygon skins are counted.
    let resting = dynamic_box(&mut world, Vec2::new(0.0, 1.015), 0.5)?;
    let floating = world.create_body(&BodyDef::dynamic(Vec2::new(3.0, 4.0)));
    world.create_fixture(floating, &FixtureDef::new(CircleShape::new(0.25)?).with_density(1.0))?;

    let before: Vec<(Vec2, f32)> = [resting, floating]
        .iter()
        .map(|&h| world.body(h).map(|b| (b.position(), b.angle())))
        .collect::<Result<_, _>>()?;

    world.step(DT, 8, 3);
    world.step(DT, 8, 3);

    for (&handle, &(position, angle)) in [resting, floating].iter().zip(&before) {
        let body = world.body(handle)?;
        assert!(
            (body.position() - position).length() < 1e-3,
            "position drifted from {position} to {}",
            body.position()
        );
        assert!((body.angle() - angle).abs() < 1e-3);
        assert!(body.linear_velocity().length() < 1e-3);
        assert!(body.angular_velocity().abs() < 1e-3);
    }
    Ok(())
}

// ============================================================================
// Broadphase tree
// ============================================================================

#[test]
fn test_tree_stays_valid_through_churn() -> anyhow::Result<()> {
    let mut world = world_with_gravity(Vec2::ZERO)?;
    let mut bodies = Vec::new();
    for i in 0..128 {
        let x = (i % 16) as f32 * 1.5;
        let y = (i / 16) as f32 * 1.5;
        bodies.push(dynamic_box(&mut world, Vec2::new(x, y), 0.4)?);
    }
    assert_eq!(world.proxy_count(), 128);
    assert!(world.validate_tree());

    // A balanced tree of 128 leaves needs 7 levels; allow slack.
    assert!(world.tree_height() <= 16, "height {}", world.tree_height());

    for &body in bodies.iter().step_by(2) {
        world.destroy_body(body)?;
    }
    for &body in bodies.iter().skip(1).step_by(2) {
        world
            .body_mut(body)?
            .set_linear_velocity(Vec2::new(3.0, -2.0));
    }
    run(&mut world, 30);

    assert_eq!(world.proxy_count(), 64);
    assert!(world.validate_tree());
    assert!(world.tree_quality() >= 1.0);
    Ok(())
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_query_aabb_reports_only_overlapping_fixtures() -> anyhow::Result<()> {
    let mut world = world_with_gravity(Vec2::ZERO)?;
    let near = dynamic_box(&mut world, Vec2::new(0.0, 0.0), 0.5)?;
    dynamic_box(&mut world, Vec2::new(20.0, 0.0), 0.5)?;

    let mut hits = Vec::new();
    world.query_aabb(&Aabb::from_center(Vec2::ZERO, Vec2::splat(1.0)), |fixture| {
        hits.push(fixture);
        true
    });

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0], world.body(near)?.fixtures()[0]);
    Ok(())
}

#[test]
fn test_ray_cast_all_hits_in_path() -> anyhow::Result<()> {
    let mut world = world_with_gravity(Vec2::ZERO)?;
    for i in 0..3 {
        dynamic_box(&mut world, Vec2::new(2.0 + 3.0 * i as f32, 0.0), 0.5)?;
    }
    dynamic_box(&mut world, Vec2::new(5.0, 5.0), 0.5)?;

    // Returning 1 keeps the full ray, so every fixture along it is reported.
    let mut fractions = Vec::new();
    world.ray_cast(Vec2::ZERO, Vec2::new(10.0, 0.0), |_, point, normal, fraction| {
        assert!((point.y).abs() < 1e-4);
        assert!((normal - Vec2::new(-1.0, 0.0)).length() < 1e-4);
        fractions.push(fraction);
        1.0
    });
    fractions.sort_by(|a, b| a.total_cmp(b));

    assert_eq!(fractions.len(), 3);
    for (fraction, expected) in fractions.iter().zip([0.15, 0.45, 0.75]) {
        assert!((fraction - expected).abs() < 1e-4, "{fraction} vs {expected}");
    }
    Ok(())
}

#[test]
fn test_ray_cast_terminates_on_zero() -> anyhow::Result<()> {
    let mut world = world_with_gravity(Vec2::ZERO)?;
    for i in 0..3 {
        dynamic_box(&mut world, Vec2::new(2.0 + 3.0 * i as f32, 0.0), 0.5)?;
    }

    let mut calls = 0;
    world.ray_cast(Vec2::ZERO, Vec2::new(10.0, 0.0), |_, _, _, _| {
        calls += 1;
        0.0
    });
    assert_eq!(calls, 1);
    Ok(())
}

// ============================================================================
// Handles
// ============================================================================

#[test]
fn test_handles_of_destroyed_objects_are_rejected() -> anyhow::Result<()> {
    let mut world = World::default();
    let body = dynamic_box(&mut world, Vec2::ZERO, 0.5)?;
    let fixture = world.body(body)?.fixtures()[0];

    world.destroy_body(body)?;

    assert!(matches!(
        world.body(body),
        Err(PhysicsError::InvalidHandle { kind: "body" })
    ));
    assert!(matches!(
        world.fixture(fixture),
        Err(PhysicsError::InvalidHandle { .. })
    ));
    assert!(world.destroy_body(body).is_err());
    assert_eq!(world.body_count(), 0);
    assert_eq!(world.proxy_count(), 0);

    // A fresh body never aliases the old handle.
    let fresh = dynamic_box(&mut world, Vec2::ZERO, 0.5)?;
    assert_ne!(fresh, body);
    assert!(world.body(body).is_err());
    Ok(())
}

// ============================================================================
// Events and filtering
// ============================================================================

#[test]
fn test_sensor_reports_enter_and_exit() -> anyhow::Result<()> {
    let mut world = World::default();
    let gate = world.create_body(&BodyDef::fixed(Vec2::ZERO));
    let sensor = world.create_fixture(gate, &FixtureDef::new(PolygonShape::new_box(2.0, 0.5)?).sensor())?;

    let ball = world.create_body(&BodyDef::dynamic(Vec2::new(0.0, 3.0)));
    world.create_fixture(ball, &FixtureDef::new(CircleShape::new(0.25)?).with_density(1.0))?;

    let mut begins = 0;
    let mut ends = 0;
    for _ in 0..120 {
        world.step(DT, 8, 3);
        for event in world.drain_events() {
            match event {
                WorldEvent::BeginContact {
                    fixture_a,
                    fixture_b,
                    ..
                } => {
                    assert!(fixture_a == sensor || fixture_b == sensor);
                    assert_eq!(ends, 0, "enter must precede exit");
                    begins += 1;
                }
                WorldEvent::EndContact { .. } => ends += 1,
                WorldEvent::JointBroke { .. } => {}
            }
        }
    }

    assert_eq!((begins, ends), (1, 1));
    assert!(world.body(ball)?.position().y < -1.0, "sensors never block");
    Ok(())
}

#[test]
fn test_mask_bits_let_bodies_pass_through() -> anyhow::Result<()> {
    let mut world = World::default();
    let ground = ground_box(&mut world, Vec2::ZERO, 10.0)?;
    let ground_fixture = world.body(ground)?.fixtures()[0];
    world.set_filter(
        ground_fixture,
        Filter {
            category_bits: 0x0002,
            ..Filter::default()
        },
    )?;

    let ghost = world.create_body(&BodyDef::dynamic(Vec2::new(0.0, 2.0)));
    world.create_fixture(
        ghost,
        &FixtureDef::new(CircleShape::new(0.5)?)
            .with_density(1.0)
            .with_filter(Filter {
                mask_bits: 0xFFFF & !0x0002,
                ..Filter::default()
            }),
    )?;

    run(&mut world, 90);
    assert!(world.body(ghost)?.position().y < -1.0);
    assert!(world.drain_events().is_empty());
    Ok(())
}
