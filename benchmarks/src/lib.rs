//! Scene builders shared by the benchmarks.

use glam::Vec2;
use rein2d::{
    BodyDef, BodyHandle, CircleShape, FixtureDef, PolygonShape, World, WorldConfig,
};

/// Deterministic pseudo-random sequence in `[0, 1)`.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_f32(&mut self) -> f32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 40) as f32) / (1u64 << 24) as f32
    }

    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }
}

/// A static floor with two walls, wide enough for `n` bodies.
pub fn setup_ground(world: &mut World, half_width: f32) -> anyhow::Result<BodyHandle> {
    let ground = world.create_body(&BodyDef::fixed(Vec2::ZERO));
    world.create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(half_width, 0.5)?))?;
    for side in [-1.0, 1.0] {
        let wall = PolygonShape::new_oriented_box(
            0.5,
            20.0,
            Vec2::new(side * half_width, 20.0),
            0.0,
        )?;
        world.create_fixture(ground, &FixtureDef::new(wall))?;
    }
    Ok(ground)
}

/// `n` circles and boxes dropped at random above a floor.
pub fn setup_scene(n: usize) -> anyhow::Result<World> {
    let mut world = World::new(WorldConfig::default())?;
    let half_width = (n as f32).sqrt() * 2.0 + 5.0;
    setup_ground(&mut world, half_width)?;

    let mut rng = Lcg::new(42);
    for i in 0..n {
        let position = Vec2::new(
            rng.range(-half_width + 1.0, half_width - 1.0),
            rng.range(1.0, 2.0 * half_width),
        );
        let body = world.create_body(&BodyDef::dynamic(position));
        let def = if i % 2 == 0 {
            FixtureDef::new(CircleShape::new(rng.range(0.25, 0.5))?)
        } else {
            FixtureDef::new(PolygonShape::new_box(
                rng.range(0.25, 0.5),
                rng.range(0.25, 0.5),
            )?)
        };
        world.create_fixture(body, &def.with_density(1.0).with_friction(0.6))?;
    }
    Ok(world)
}

/// A pyramid of `rows` rows of unit boxes, the classic stacking test.
pub fn setup_pyramid(rows: usize) -> anyhow::Result<World> {
    let mut world = World::new(WorldConfig::default())?;
    setup_ground(&mut world, rows as f32 + 5.0)?;

    let shape = PolygonShape::new_box(0.5, 0.5)?;
    for row in 0..rows {
        let count = rows - row;
        let y = 1.0 + row as f32 * 1.0;
        let x0 = -(count as f32 - 1.0) * 0.5 * 1.05;
        for i in 0..count {
            let body = world.create_body(&BodyDef::dynamic(Vec2::new(x0 + i as f32 * 1.05, y)));
            world.create_fixture(body, &FixtureDef::new(shape.clone()).with_density(1.0))?;
        }
    }
    Ok(world)
}

/// Step a world `steps` times at 60 Hz.
pub fn run_steps(world: &mut World, steps: usize) {
    for _ in 0..steps {
        world.step(1.0 / 60.0, 8, 3);
    }
}
