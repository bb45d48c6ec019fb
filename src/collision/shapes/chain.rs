use glam::Vec2;

use crate::config::POLYGON_RADIUS;
use crate::error::{PhysicsError, PhysicsResult};

use super::edge::{validate_segment, EdgeShape};

/// A polyline of one-sided edges, open or closed.
///
/// The collision side of every edge is to the right of the chain direction,
/// so a counter-clockwise loop collides from the outside.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainShape {
    /// Chain vertices. A loop repeats its first vertex at the end.
    pub vertices: Vec<Vec2>,
    pub prev_vertex: Vec2,
    pub next_vertex: Vec2,
    pub radius: f32,
}

impl ChainShape {
    /// Closed loop through `vertices`. Needs at least three.
    pub fn new_loop(vertices: &[Vec2]) -> PhysicsResult<Self> {
        if vertices.len() < 3 {
            return Err(PhysicsError::InvalidShape {
                reason: "chain loop needs at least 3 vertices",
            });
        }
        validate_chain(vertices)?;
        validate_segment(vertices[vertices.len() - 1], vertices[0])?;

        let mut vs = vertices.to_vec();
        vs.push(vertices[0]);
        let prev_vertex = vs[vs.len() - 2];
        let next_vertex = vs[1];
        Ok(Self {
            vertices: vs,
            prev_vertex,
            next_vertex,
            radius: POLYGON_RADIUS,
        })
    }

    /// Open chain through `vertices`. Missing ghost neighbours are extended
    /// collinearly from the end segments.
    pub fn new_chain(
        vertices: &[Vec2],
        prev_vertex: Option<Vec2>,
        next_vertex: Option<Vec2>,
    ) -> PhysicsResult<Self> {
        if vertices.len() < 2 {
            return Err(PhysicsError::InvalidShape {
                reason: "chain needs at least 2 vertices",
            });
        }
        validate_chain(vertices)?;

        let n = vertices.len();
        let prev_vertex = prev_vertex.unwrap_or(2.0 * vertices[0] - vertices[1]);
        let next_vertex = next_vertex.unwrap_or(2.0 * vertices[n - 1] - vertices[n - 2]);
        if !(prev_vertex.is_finite() && next_vertex.is_finite()) {
            return Err(PhysicsError::InvalidShape {
                reason: "chain ghost vertices must be finite",
            });
        }

        Ok(Self {
            vertices: vertices.to_vec(),
            prev_vertex,
            next_vertex,
            radius: POLYGON_RADIUS,
        })
    }

    /// One child per edge.
    #[inline]
    pub fn child_count(&self) -> usize {
        self.vertices.len() - 1
    }

    /// The `index`-th edge with its neighbours as ghost vertices.
    pub fn child_edge(&self, index: usize) -> EdgeShape {
        let vs = &self.vertices;
        let count = vs.len();
        debug_assert!(index + 1 < count);

        let v0 = if index > 0 {
            vs[index - 1]
        } else {
            self.prev_vertex
        };
        let v3 = if index + 2 < count {
            vs[index + 2]
        } else {
            self.next_vertex
        };

        EdgeShape {
            v0,
            v1: vs[index],
            v2: vs[index + 1],
            v3,
            one_sided: true,
            radius: self.radius,
        }
    }
}

fn validate_chain(vertices: &[Vec2]) -> PhysicsResult<()> {
    vertices
        .windows(2)
        .try_for_each(|w| validate_segment(w[0], w[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_loop_ghosts() {
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let chain = ChainShape::new_loop(&square).unwrap();
        assert_eq!(chain.child_count(), 4);

        let first = chain.child_edge(0);
        assert_eq!(first.v0, Vec2::new(0.0, 1.0));
        assert_eq!(first.v3, Vec2::new(1.0, 1.0));

        let last = chain.child_edge(3);
        assert_eq!(last.v1, Vec2::new(0.0, 1.0));
        assert_eq!(last.v2, Vec2::new(0.0, 0.0));
        assert_eq!(last.v3, Vec2::new(1.0, 0.0));
        assert!(last.one_sided);
    }

    #[test]
    fn test_chain_open_extrapolates_ghosts() {
        let chain =
            ChainShape::new_chain(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)], None, None).unwrap();
        let edge = chain.child_edge(0);
        assert_eq!(edge.v0, Vec2::new(-1.0, 0.0));
        assert_eq!(edge.v3, Vec2::new(2.0, 0.0));
    }

    #[test]
    fn test_chain_rejects_duplicate_vertices() {
        let result = ChainShape::new_chain(&[Vec2::ZERO, Vec2::ZERO, Vec2::X], None, None);
        assert!(result.is_err());
        assert!(ChainShape::new_loop(&[Vec2::ZERO, Vec2::X]).is_err());
    }
}
