//! Debug visualization.
//!
//! The world walks its shapes, joints, proxies and contact points and hands
//! primitives to a [`DebugDraw`] implementation. Rendering is up to the caller.

use glam::Vec2;

use crate::collision::Shape;
use crate::dynamics::{Body, BodyType, World};
use crate::math::Transform;

/// RGBA color, components in `[0, 1]`.
pub type Color = [f32; 4];

/// Sink for debug primitives.
pub trait DebugDraw {
    /// Closed polygon outline, counter-clockwise.
    fn draw_polygon(&mut self, vertices: &[Vec2], color: Color);
    /// Circle outline. `axis` marks the body rotation.
    fn draw_circle(&mut self, center: Vec2, radius: f32, axis: Vec2, color: Color);
    fn draw_segment(&mut self, p1: Vec2, p2: Vec2, color: Color);
    /// Body frame: the x and y axes at the center of mass.
    fn draw_transform(&mut self, xf: &Transform);
    fn draw_point(&mut self, p: Vec2, size: f32, color: Color);
}

/// Which layers [`World::debug_draw`] emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawFlags {
    pub shapes: bool,
    pub joints: bool,
    /// Fat AABBs of broadphase proxies.
    pub aabbs: bool,
    pub center_of_mass: bool,
    pub contact_points: bool,
}

impl Default for DrawFlags {
    fn default() -> Self {
        Self {
            shapes: true,
            joints: true,
            aabbs: false,
            center_of_mass: false,
            contact_points: false,
        }
    }
}

const JOINT_COLOR: Color = [0.5, 0.8, 0.8, 1.0];
const AABB_COLOR: Color = [0.9, 0.3, 0.9, 1.0];
const CONTACT_COLOR: Color = [1.0, 0.2, 0.2, 1.0];

fn body_color(body: &Body) -> Color {
    match body.body_type() {
        _ if !body.is_enabled() => [0.5, 0.5, 0.3, 1.0],
        BodyType::Static => [0.5, 0.9, 0.5, 1.0],
        BodyType::Kinematic => [0.5, 0.5, 0.9, 1.0],
        BodyType::Dynamic if !body.is_awake() => [0.6, 0.6, 0.6, 1.0],
        BodyType::Dynamic => [0.9, 0.7, 0.7, 1.0],
    }
}

impl World {
    /// Emit debug primitives for the layers enabled in `flags`.
    pub fn debug_draw(&self, draw: &mut dyn DebugDraw, flags: DrawFlags) {
        for handle in self.body_handles() {
            let Ok(body) = self.body(handle) else {
                continue;
            };
            let xf = *body.transform();
            for fixture in body.fixtures().iter().filter_map(|&f| self.fixture(f).ok()) {
                if flags.shapes {
                    draw_shape(draw, fixture.shape(), &xf, body_color(&body));
                }
                if flags.aabbs && body.is_enabled() {
                    for proxy in &fixture.proxies {
                        let aabb = self.contact_manager.broad_phase.fat_aabb(proxy.proxy_id);
                        let vertices = [
                            aabb.min,
                            Vec2::new(aabb.max.x, aabb.min.y),
                            aabb.max,
                            Vec2::new(aabb.min.x, aabb.max.y),
                        ];
                        draw.draw_polygon(&vertices, AABB_COLOR);
                    }
                }
            }
            if flags.center_of_mass {
                draw.draw_transform(&Transform {
                    p: body.world_center(),
                    q: xf.q,
                });
            }
        }

        if flags.joints {
            // Body origin to anchor on each side, then anchor to anchor.
            for handle in self.joint_handles() {
                let (Ok(joint), Ok((p1, p2))) = (self.joint(handle), self.joint_anchors(handle))
                else {
                    continue;
                };
                if let Ok(body) = self.body(joint.body_a()) {
                    draw.draw_segment(body.position(), p1, JOINT_COLOR);
                }
                if let Ok(body) = self.body(joint.body_b()) {
                    draw.draw_segment(body.position(), p2, JOINT_COLOR);
                }
                draw.draw_segment(p1, p2, JOINT_COLOR);
            }
        }

        if flags.contact_points {
            for handle in self.contact_handles() {
                let count = match self.contact(handle) {
                    Ok(c) if c.is_touching() && !c.is_sensor() => c.manifold().point_count,
                    _ => continue,
                };
                let Ok(manifold) = self.contact_world_manifold(handle) else {
                    continue;
                };
                for &point in &manifold.points[..count] {
                    draw.draw_point(point, 5.0, CONTACT_COLOR);
                    draw.draw_segment(point, point + 0.3 * manifold.normal, CONTACT_COLOR);
                }
            }
        }
    }
}

fn draw_shape(draw: &mut dyn DebugDraw, shape: &Shape, xf: &Transform, color: Color) {
    match shape {
        Shape::Circle(circle) => {
            draw.draw_circle(xf.mul(circle.position), circle.radius, xf.q.x_axis(), color)
        }
        Shape::Polygon(polygon) => {
            let vertices: Vec<Vec2> = polygon.vertices.iter().map(|&v| xf.mul(v)).collect();
            draw.draw_polygon(&vertices, color);
        }
        Shape::Edge(edge) => draw.draw_segment(xf.mul(edge.v1), xf.mul(edge.v2), color),
        Shape::Chain(chain) => {
            for pair in chain.vertices.windows(2) {
                draw.draw_segment(xf.mul(pair[0]), xf.mul(pair[1]), color);
            }
        }
    }
}
