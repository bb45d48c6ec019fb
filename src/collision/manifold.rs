//! Contact manifolds and the helpers shared by the collide routines.

use glam::Vec2;

use crate::config::MAX_MANIFOLD_POINTS;
use crate::math::{Transform, EPSILON};

/// Kind of feature a contact point was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FeatureType {
    #[default]
    Vertex,
    Face,
}

/// Features that intersect to form a contact point. Stable from step to step
/// while the same features stay in contact, so it keys warm starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContactFeature {
    pub index_a: u8,
    pub index_b: u8,
    pub type_a: FeatureType,
    pub type_b: FeatureType,
}

impl ContactFeature {
    /// Packed key for fast comparison.
    #[inline]
    pub fn key(&self) -> u32 {
        u32::from(self.index_a)
            | u32::from(self.index_b) << 8
            | (self.type_a as u32) << 16
            | (self.type_b as u32) << 24
    }

    /// The same feature seen from the other shape.
    #[inline]
    pub fn swapped(&self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

/// One manifold point, in the local frame of the incident shape.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManifoldPoint {
    /// Usage depends on manifold type:
    /// - Circles: the local center of circle B
    /// - FaceA: the local center of circle B or the clip point of polygon B
    /// - FaceB: the clip point of polygon A
    pub local_point: Vec2,
    /// Accumulated normal impulse, carried between steps.
    pub normal_impulse: f32,
    /// Accumulated friction impulse, carried between steps.
    pub tangent_impulse: f32,
    pub id: ContactFeature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// Contact geometry between two shapes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    /// Not used for `Circles`.
    pub local_normal: Vec2,
    /// Usage depends on manifold type:
    /// - Circles: the local center of circle A
    /// - FaceA: the center of the reference face on A
    /// - FaceB: the center of the reference face on B
    pub local_point: Vec2,
    pub kind: ManifoldType,
    pub point_count: usize,
}

impl Manifold {
    #[inline]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    #[inline]
    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }
}

/// A manifold evaluated in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldManifold {
    /// Points from A to B.
    pub normal: Vec2,
    /// Midpoints between the two surfaces.
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Negative when overlapping.
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    pub fn new(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: f32,
        xf_b: &Transform,
        radius_b: f32,
    ) -> Self {
        let mut wm = WorldManifold::default();
        if manifold.point_count == 0 {
            return wm;
        }

        match manifold.kind {
            ManifoldType::Circles => {
                let mut normal = Vec2::X;
                let point_a = xf_a.mul(manifold.local_point);
                let point_b = xf_b.mul(manifold.points[0].local_point);
                if point_a.distance_squared(point_b) > EPSILON * EPSILON {
                    normal = (point_b - point_a).normalize_or_zero();
                }

                let c_a = point_a + radius_a * normal;
                let c_b = point_b - radius_b * normal;
                wm.normal = normal;
                wm.points[0] = 0.5 * (c_a + c_b);
                wm.separations[0] = (c_b - c_a).dot(normal);
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q.mul(manifold.local_normal);
                let plane_point = xf_a.mul(manifold.local_point);

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_b.mul(mp.local_point);
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(normal)) * normal;
                    let c_b = clip_point - radius_b * normal;
                    wm.points[i] = 0.5 * (c_a + c_b);
                    wm.separations[i] = (c_b - c_a).dot(normal);
                }
                wm.normal = normal;
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.mul(manifold.local_normal);
                let plane_point = xf_b.mul(manifold.local_point);

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_a.mul(mp.local_point);
                    let c_b = clip_point
                        + (radius_b - (clip_point - plane_point).dot(normal)) * normal;
                    let c_a = clip_point - radius_a * normal;
                    wm.points[i] = 0.5 * (c_a + c_b);
                    wm.separations[i] = (c_a - c_b).dot(normal);
                }
                // Keep the normal pointing from A to B.
                wm.normal = -normal;
            }
        }

        wm
    }
}

/// How a manifold point changed between two updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointState {
    /// Point does not exist.
    #[default]
    Null,
    /// Point was added in the update.
    Add,
    /// Point persisted across the update.
    Persist,
    /// Point was removed in the update.
    Remove,
}

/// Compare the point ids of an old and a new manifold.
///
/// Returns the states of the old points (`Persist` or `Remove`) and of the new
/// points (`Add` or `Persist`).
pub fn get_point_states(
    manifold1: &Manifold,
    manifold2: &Manifold,
) -> (
    [PointState; MAX_MANIFOLD_POINTS],
    [PointState; MAX_MANIFOLD_POINTS],
) {
    let mut state1 = [PointState::Null; MAX_MANIFOLD_POINTS];
    let mut state2 = [PointState::Null; MAX_MANIFOLD_POINTS];

    for (i, mp) in manifold1.points().iter().enumerate() {
        let key = mp.id.key();
        state1[i] = if manifold2.points().iter().any(|p| p.id.key() == key) {
            PointState::Persist
        } else {
            PointState::Remove
        };
    }

    for (i, mp) in manifold2.points().iter().enumerate() {
        let key = mp.id.key();
        state2[i] = if manifold1.points().iter().any(|p| p.id.key() == key) {
            PointState::Persist
        } else {
            PointState::Add
        };
    }

    (state1, state2)
}

/// Vertex used while clipping an incident edge.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: ContactFeature,
}

/// Clip a segment against the half-plane `dot(normal, x) <= offset`.
///
/// Returns the clipped vertices and how many of them are valid.
pub fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: u8,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut count = 0;

    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // Points behind the plane survive.
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // The points straddle the plane.
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        v_out[count] = ClipVertex {
            v: v_in[0].v + interp * (v_in[1].v - v_in[0].v),
            id: ContactFeature {
                index_a: vertex_index_a,
                index_b: v_in[0].id.index_b,
                type_a: FeatureType::Vertex,
                type_b: FeatureType::Face,
            },
        };
        count += 1;
    }

    (v_out, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_with_key(index_a: u8, index_b: u8) -> ManifoldPoint {
        ManifoldPoint {
            id: ContactFeature {
                index_a,
                index_b,
                type_a: FeatureType::Vertex,
                type_b: FeatureType::Face,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_point_states() {
        let mut old = Manifold::default();
        old.points[0] = point_with_key(0, 1);
        old.points[1] = point_with_key(1, 1);
        old.point_count = 2;

        let mut new = Manifold::default();
        new.points[0] = point_with_key(1, 1);
        new.points[1] = point_with_key(2, 1);
        new.point_count = 2;

        let (s1, s2) = get_point_states(&old, &new);
        assert_eq!(s1, [PointState::Remove, PointState::Persist]);
        assert_eq!(s2, [PointState::Persist, PointState::Add]);
    }

    #[test]
    fn test_clip_segment_straddling() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(-1.0, 0.0),
                id: ContactFeature::default(),
            },
            ClipVertex {
                v: Vec2::new(1.0, 0.0),
                id: ContactFeature::default(),
            },
        ];
        let (out, count) = clip_segment_to_line(&v_in, Vec2::X, 0.5, 3);
        assert_eq!(count, 2);
        assert!((out[1].v - Vec2::new(0.5, 0.0)).length() < 1e-6);
        assert_eq!(out[1].id.index_a, 3);
        assert_eq!(out[1].id.type_b, FeatureType::Face);

        let (_, count) = clip_segment_to_line(&v_in, Vec2::X, -2.0, 0);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_feature_key_distinguishes_types() {
        let a = ContactFeature {
            index_a: 1,
            index_b: 2,
            type_a: FeatureType::Face,
            type_b: FeatureType::Vertex,
        };
        assert_ne!(a.key(), a.swapped().key());
        assert_eq!(a.swapped().swapped(), a);
    }
}
