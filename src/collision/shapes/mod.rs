//! Collision shapes: a closed set of convex primitives plus chains of edges.
//!
//! Every shape answers the same four questions: its bounds, a ray test, its
//! mass properties, and (through [`DistanceProxy`](crate::collision::distance::DistanceProxy))
//! its support points.

mod chain;
mod circle;
mod edge;
mod polygon;

pub use chain::ChainShape;
pub use circle::CircleShape;
pub use edge::EdgeShape;
pub use polygon::PolygonShape;

use glam::Vec2;

use crate::collision::aabb::{Aabb, RayCastInput, RayCastOutput};
use crate::math::Transform;

/// Mass properties of a shape or body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassData {
    pub mass: f32,
    /// Center of mass relative to the shape (or body) origin.
    pub center: Vec2,
    /// Rotational inertia about the shape (or body) origin.
    pub inertia: f32,
}

/// Discriminant of [`Shape`], used for collision dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Circle,
    Edge,
    Polygon,
    Chain,
}

/// Collision shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle(CircleShape),
    Polygon(PolygonShape),
    Edge(EdgeShape),
    Chain(ChainShape),
}

impl Shape {
    #[inline]
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::Edge(_) => ShapeType::Edge,
            Shape::Chain(_) => ShapeType::Chain,
        }
    }

    /// Skin radius.
    #[inline]
    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(s) => s.radius,
            Shape::Polygon(s) => s.radius,
            Shape::Edge(s) => s.radius,
            Shape::Chain(s) => s.radius,
        }
    }

    /// Number of broadphase children (one per edge for chains).
    #[inline]
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(s) => s.child_count(),
            _ => 1,
        }
    }

    /// Is `p` (world space) inside the shape? Always false for edges and chains.
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        match self {
            Shape::Circle(s) => s.test_point(xf, p),
            Shape::Polygon(s) => s.test_point(xf, p),
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }

    /// Cast a ray against one child of the shape.
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(s) => s.ray_cast(input, xf),
            Shape::Polygon(s) => s.ray_cast(input, xf),
            Shape::Edge(s) => s.ray_cast(input, xf),
            Shape::Chain(s) => s.child_edge(child_index).ray_cast(input, xf),
        }
    }

    /// Tight world-space bounds of one child.
    pub fn compute_aabb(&self, xf: &Transform, child_index: usize) -> Aabb {
        match self {
            Shape::Circle(s) => s.compute_aabb(xf),
            Shape::Polygon(s) => s.compute_aabb(xf),
            Shape::Edge(s) => s.compute_aabb(xf),
            Shape::Chain(s) => s.child_edge(child_index).compute_aabb(xf),
        }
    }

    /// Mass properties for the given density. Edges and chains are massless.
    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(s) => s.compute_mass(density),
            Shape::Polygon(s) => s.compute_mass(density),
            Shape::Edge(s) => MassData {
                mass: 0.0,
                center: 0.5 * (s.v1 + s.v2),
                inertia: 0.0,
            },
            Shape::Chain(_) => MassData::default(),
        }
    }
}

impl From<CircleShape> for Shape {
    fn from(s: CircleShape) -> Self {
        Shape::Circle(s)
    }
}

impl From<PolygonShape> for Shape {
    fn from(s: PolygonShape) -> Self {
        Shape::Polygon(s)
    }
}

impl From<EdgeShape> for Shape {
    fn from(s: EdgeShape) -> Self {
        Shape::Edge(s)
    }
}

impl From<ChainShape> for Shape {
    fn from(s: ChainShape) -> Self {
        Shape::Chain(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_dispatch() {
        let circle: Shape = CircleShape::new(0.5).unwrap().into();
        assert_eq!(circle.shape_type(), ShapeType::Circle);
        assert_eq!(circle.child_count(), 1);

        let chain: Shape = ChainShape::new_loop(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ])
        .unwrap()
        .into();
        assert_eq!(chain.child_count(), 4);
        assert_eq!(chain.compute_mass(1.0).mass, 0.0);
        assert!(!chain.test_point(&Transform::IDENTITY, Vec2::splat(0.5)));
    }

    #[test]
    fn test_chain_child_aabb() {
        let chain: Shape = ChainShape::new_chain(
            &[Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(2.0, 3.0)],
            None,
            None,
        )
        .unwrap()
        .into();
        let aabb = chain.compute_aabb(&Transform::IDENTITY, 1);
        assert!((aabb.min.x - (2.0 - chain.radius())).abs() < 1e-6);
        assert!((aabb.max.y - (3.0 + chain.radius())).abs() < 1e-6);
    }
}
