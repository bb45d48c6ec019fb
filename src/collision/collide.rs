//! Manifold generation for each supported shape pair.

use glam::Vec2;

use crate::collision::manifold::{
    clip_segment_to_line, ClipVertex, ContactFeature, FeatureType, Manifold, ManifoldType,
};
use crate::collision::shapes::{CircleShape, EdgeShape, PolygonShape, Shape, ShapeType};
use crate::config::{LINEAR_SLOP, MAX_MANIFOLD_POINTS, MAX_POLYGON_VERTICES};
use crate::math::{cross, cross_vs, Transform, EPSILON};

/// How a pair of shape types is collided.
///
/// Returns `Some(false)` if `(a, b)` can be collided as given, `Some(true)` if
/// the pair must be swapped first, and `None` if the pair never collides
/// (edges and chains against each other).
pub fn contact_order(a: ShapeType, b: ShapeType) -> Option<bool> {
    use ShapeType::*;
    match (a, b) {
        (Circle, Circle)
        | (Polygon, Circle)
        | (Polygon, Polygon)
        | (Edge, Circle)
        | (Edge, Polygon)
        | (Chain, Circle)
        | (Chain, Polygon) => Some(false),
        (Circle, Polygon) | (Circle, Edge) | (Polygon, Edge) | (Circle, Chain) | (Polygon, Chain) => {
            Some(true)
        }
        _ => None,
    }
}

/// Collide two shape children. The pair must be ordered per [`contact_order`],
/// so only shape A can be a chain; unsupported pairs produce an empty manifold.
pub fn collide(
    shape_a: &Shape,
    index_a: usize,
    xf_a: &Transform,
    shape_b: &Shape,
    xf_b: &Transform,
) -> Manifold {
    match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_and_circle(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Circle(b)) => collide_edge_and_circle(a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Polygon(b)) => collide_edge_and_polygon(a, xf_a, b, xf_b),
        (Shape::Chain(a), Shape::Circle(b)) => {
            collide_edge_and_circle(&a.child_edge(index_a), xf_a, b, xf_b)
        }
        (Shape::Chain(a), Shape::Polygon(b)) => {
            collide_edge_and_polygon(&a.child_edge(index_a), xf_a, b, xf_b)
        }
        _ => Manifold::default(),
    }
}

fn single_point(
    kind: ManifoldType,
    local_normal: Vec2,
    local_point: Vec2,
    point: Vec2,
    id: ContactFeature,
) -> Manifold {
    let mut manifold = Manifold {
        kind,
        local_normal,
        local_point,
        point_count: 1,
        ..Default::default()
    };
    manifold.points[0].local_point = point;
    manifold.points[0].id = id;
    manifold
}

pub fn collide_circles(
    circle_a: &CircleShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let p_a = xf_a.mul(circle_a.position);
    let p_b = xf_b.mul(circle_b.position);

    let radius = circle_a.radius + circle_b.radius;
    if p_a.distance_squared(p_b) > radius * radius {
        return Manifold::default();
    }

    single_point(
        ManifoldType::Circles,
        Vec2::ZERO,
        circle_a.position,
        circle_b.position,
        ContactFeature::default(),
    )
}

pub fn collide_polygon_and_circle(
    polygon_a: &PolygonShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    // Circle center in the polygon frame.
    let c = xf_b.mul(circle_b.position);
    let c_local = xf_a.mul_t(c);

    let radius = polygon_a.radius + circle_b.radius;
    let count = polygon_a.count();
    let vertices = &polygon_a.vertices;
    let normals = &polygon_a.normals;

    // Edge of least penetration.
    let mut normal_index = 0;
    let mut separation = -f32::MAX;
    for i in 0..count {
        let s = normals[i].dot(c_local - vertices[i]);
        if s > radius {
            return Manifold::default();
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let v1 = vertices[normal_index];
    let v2 = vertices[(normal_index + 1) % count];
    let id = ContactFeature::default();

    // Center is inside the polygon.
    if separation < EPSILON {
        return single_point(
            ManifoldType::FaceA,
            normals[normal_index],
            0.5 * (v1 + v2),
            circle_b.position,
            id,
        );
    }

    // Voronoi regions of the closest edge.
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if c_local.distance_squared(v1) > radius * radius {
            return Manifold::default();
        }
        single_point(
            ManifoldType::FaceA,
            (c_local - v1).normalize_or_zero(),
            v1,
            circle_b.position,
            id,
        )
    } else if u2 <= 0.0 {
        if c_local.distance_squared(v2) > radius * radius {
            return Manifold::default();
        }
        single_point(
            ManifoldType::FaceA,
            (c_local - v2).normalize_or_zero(),
            v2,
            circle_b.position,
            id,
        )
    } else {
        let face_center = 0.5 * (v1 + v2);
        let s = (c_local - face_center).dot(normals[normal_index]);
        if s > radius {
            return Manifold::default();
        }
        single_point(
            ManifoldType::FaceA,
            normals[normal_index],
            face_center,
            circle_b.position,
            id,
        )
    }
}

/// Edge of `poly1` with the largest separation from `poly2`, and that separation.
fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &Transform,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> (usize, f32) {
    let xf = xf2.mul_t_xf(xf1);

    let mut best_index = 0;
    let mut max_separation = -f32::MAX;
    for (i, (v1, n1)) in poly1.vertices.iter().zip(&poly1.normals).enumerate() {
        // Poly1 normal and vertex in the poly2 frame.
        let n = xf.q.mul(*n1);
        let v = xf.mul(*v1);

        let si = poly2
            .vertices
            .iter()
            .map(|v2| n.dot(*v2 - v))
            .fold(f32::MAX, f32::min);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

/// Edge of `poly2` most anti-parallel to the reference edge `edge1` of `poly1`, in world space.
fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    let normal1 = xf2.q.mul_t(xf1.q.mul(poly1.normals[edge1]));

    let mut index = 0;
    let mut min_dot = f32::MAX;
    for (i, n2) in poly2.normals.iter().enumerate() {
        let dot = normal1.dot(*n2);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = if i1 + 1 < poly2.count() { i1 + 1 } else { 0 };
    let feature = |index_b: usize| ContactFeature {
        index_a: edge1 as u8,
        index_b: index_b as u8,
        type_a: FeatureType::Face,
        type_b: FeatureType::Vertex,
    };

    [
        ClipVertex {
            v: xf2.mul(poly2.vertices[i1]),
            id: feature(i1),
        },
        ClipVertex {
            v: xf2.mul(poly2.vertices[i2]),
            id: feature(i2),
        },
    ]
}

/// Reference-face search on both polygons, then clip the incident edge
/// against the side planes of the reference face.
pub fn collide_polygons(
    poly_a: &PolygonShape,
    xf_a: &Transform,
    poly_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let total_radius = poly_a.radius + poly_b.radius;

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return Manifold::default();
    }

    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return Manifold::default();
    }

    // Prefer A's face unless B's is clearly better, to avoid flip-flopping.
    let k_tol = 0.1 * LINEAR_SLOP;
    let (poly1, poly2, xf1, xf2, edge1, kind, flip) = if separation_b > separation_a + k_tol {
        (poly_b, poly_a, xf_b, xf_a, edge_b, ManifoldType::FaceB, true)
    } else {
        (poly_a, poly_b, xf_a, xf_b, edge_a, ManifoldType::FaceA, false)
    };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let count1 = poly1.count();
    let iv1 = edge1;
    let iv2 = if edge1 + 1 < count1 { edge1 + 1 } else { 0 };

    let mut v11 = poly1.vertices[iv1];
    let mut v12 = poly1.vertices[iv2];

    let local_tangent = (v12 - v11).normalize_or_zero();
    let local_normal = cross_vs(local_tangent, 1.0);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf1.q.mul(local_tangent);
    let normal = cross_vs(tangent, 1.0);

    v11 = xf1.mul(v11);
    v12 = xf1.mul(v12);

    // Face offset.
    let front_offset = normal.dot(v11);

    // Side offsets, extended by the polygon skins.
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    let (clip_points1, np) =
        clip_segment_to_line(&incident_edge, -tangent, side_offset1, iv1 as u8);
    if np < 2 {
        return Manifold::default();
    }

    let (clip_points2, np) = clip_segment_to_line(&clip_points1, tangent, side_offset2, iv2 as u8);
    if np < 2 {
        return Manifold::default();
    }

    let mut manifold = Manifold {
        kind,
        local_normal,
        local_point: plane_point,
        ..Default::default()
    };

    for cp in clip_points2.iter().take(MAX_MANIFOLD_POINTS) {
        let separation = normal.dot(cp.v) - front_offset;
        if separation <= total_radius {
            let mp = &mut manifold.points[manifold.point_count];
            mp.local_point = xf2.mul_t(cp.v);
            mp.id = if flip { cp.id.swapped() } else { cp.id };
            manifold.point_count += 1;
        }
    }

    manifold
}

/// Edge against circle, with ghost vertices suppressing collisions owned by
/// the neighbouring edges of a chain.
pub fn collide_edge_and_circle(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    // Circle center in the edge frame.
    let q = xf_a.mul_t(xf_b.mul(circle_b.position));

    let a = edge_a.v1;
    let b = edge_a.v2;
    let e = b - a;

    // Normal points to the right for a CCW winding.
    let mut n = Vec2::new(e.y, -e.x);
    let offset = n.dot(q - a);

    if edge_a.one_sided && offset < 0.0 {
        return Manifold::default();
    }

    // Barycentric coordinates.
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = edge_a.radius + circle_b.radius;

    let vertex_feature = |index_a: u8| ContactFeature {
        index_a,
        index_b: 0,
        type_a: FeatureType::Vertex,
        type_b: FeatureType::Vertex,
    };

    // Region A
    if v <= 0.0 {
        let p = a;
        if q.distance_squared(p) > radius * radius {
            return Manifold::default();
        }

        // The previous edge owns this region.
        if edge_a.one_sided {
            let a1 = edge_a.v0;
            let b1 = a;
            let e1 = b1 - a1;
            if e1.dot(b1 - q) > 0.0 {
                return Manifold::default();
            }
        }

        return single_point(
            ManifoldType::Circles,
            Vec2::ZERO,
            p,
            circle_b.position,
            vertex_feature(0),
        );
    }

    // Region B
    if u <= 0.0 {
        let p = b;
        if q.distance_squared(p) > radius * radius {
            return Manifold::default();
        }

        // The next edge owns this region.
        if edge_a.one_sided {
            let b2 = edge_a.v3;
            let a2 = b;
            let e2 = b2 - a2;
            if e2.dot(q - a2) > 0.0 {
                return Manifold::default();
            }
        }

        return single_point(
            ManifoldType::Circles,
            Vec2::ZERO,
            p,
            circle_b.position,
            vertex_feature(1),
        );
    }

    // Region AB
    let den = e.length_squared();
    debug_assert!(den > 0.0);
    let p = (1.0 / den) * (u * a + v * b);
    if q.distance_squared(p) > radius * radius {
        return Manifold::default();
    }

    if offset < 0.0 {
        n = -n;
    }

    single_point(
        ManifoldType::FaceA,
        n.normalize_or_zero(),
        a,
        circle_b.position,
        ContactFeature {
            index_a: 0,
            index_b: 0,
            type_a: FeatureType::Face,
            type_b: FeatureType::Vertex,
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisKind {
    Unknown,
    EdgeA,
    EdgeB,
}

#[derive(Debug, Clone, Copy)]
struct SeparatingAxis {
    kind: AxisKind,
    index: usize,
    separation: f32,
    normal: Vec2,
}

/// Polygon expressed in the edge frame.
struct TempPolygon {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
}

fn edge_separation(polygon_b: &TempPolygon, v1: Vec2, normal1: Vec2) -> SeparatingAxis {
    let mut axis = SeparatingAxis {
        kind: AxisKind::EdgeA,
        index: 0,
        separation: -f32::MAX,
        normal: Vec2::ZERO,
    };

    // Axis with least overlap, over both edge sides.
    for (j, candidate) in [normal1, -normal1].into_iter().enumerate() {
        let sj = polygon_b.vertices[..polygon_b.count]
            .iter()
            .map(|v| candidate.dot(*v - v1))
            .fold(f32::MAX, f32::min);

        if sj > axis.separation {
            axis.index = j;
            axis.separation = sj;
            axis.normal = candidate;
        }
    }

    axis
}

fn polygon_separation(polygon_b: &TempPolygon, v1: Vec2, v2: Vec2) -> SeparatingAxis {
    let mut axis = SeparatingAxis {
        kind: AxisKind::Unknown,
        index: 0,
        separation: -f32::MAX,
        normal: Vec2::ZERO,
    };

    for i in 0..polygon_b.count {
        let n = -polygon_b.normals[i];

        let s1 = n.dot(polygon_b.vertices[i] - v1);
        let s2 = n.dot(polygon_b.vertices[i] - v2);
        let s = s1.min(s2);

        if s > axis.separation {
            axis.kind = AxisKind::EdgeB;
            axis.index = i;
            axis.separation = s;
            axis.normal = n;
        }
    }

    axis
}

struct ReferenceFace {
    i1: usize,
    i2: usize,
    v1: Vec2,
    normal: Vec2,
    side_normal1: Vec2,
    side_offset1: f32,
    side_normal2: Vec2,
    side_offset2: f32,
}

/// Edge against polygon. One-sided edges consult their ghost vertices and
/// skip or snap normals that belong to a neighbouring edge.
pub fn collide_edge_and_polygon(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    polygon_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let xf = xf_a.mul_t_xf(xf_b);

    let centroid_b = xf.mul(polygon_b.centroid);

    let v1 = edge_a.v1;
    let v2 = edge_a.v2;

    let edge1 = (v2 - v1).normalize_or_zero();

    // Normal points to the right for a CCW winding.
    let normal1 = Vec2::new(edge1.y, -edge1.x);
    let offset1 = normal1.dot(centroid_b - v1);

    let one_sided = edge_a.one_sided;
    if one_sided && offset1 < 0.0 {
        return Manifold::default();
    }

    let mut temp = TempPolygon {
        vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        count: polygon_b.count(),
    };
    for i in 0..temp.count {
        temp.vertices[i] = xf.mul(polygon_b.vertices[i]);
        temp.normals[i] = xf.q.mul(polygon_b.normals[i]);
    }

    let radius = polygon_b.radius + edge_a.radius;

    let edge_axis = edge_separation(&temp, v1, normal1);
    if edge_axis.separation > radius {
        return Manifold::default();
    }

    let polygon_axis = polygon_separation(&temp, v1, v2);
    if polygon_axis.separation > radius {
        return Manifold::default();
    }

    // Favour the edge normal unless the polygon axis is clearly better.
    const RELATIVE_TOL: f32 = 0.98;
    const ABSOLUTE_TOL: f32 = 0.001;

    let mut primary_axis = if polygon_axis.separation - radius
        > RELATIVE_TOL * (edge_axis.separation - radius) + ABSOLUTE_TOL
    {
        polygon_axis
    } else {
        edge_axis
    };

    if one_sided {
        let edge0 = (v1 - edge_a.v0).normalize_or_zero();
        let normal0 = Vec2::new(edge0.y, -edge0.x);
        let convex1 = cross(edge0, edge1) >= 0.0;

        let edge2 = (edge_a.v3 - v2).normalize_or_zero();
        let normal2 = Vec2::new(edge2.y, -edge2.x);
        let convex2 = cross(edge1, edge2) >= 0.0;

        const SIN_TOL: f32 = 0.1;
        let side1 = primary_axis.normal.dot(edge1) <= 0.0;

        // Reject normals outside the edge's admissible cone.
        if side1 {
            if convex1 {
                if cross(primary_axis.normal, normal0) > SIN_TOL {
                    // Behind the previous edge
                    return Manifold::default();
                }
            } else {
                // Behind the next edge
                primary_axis = edge_axis;
            }
        } else if convex2 {
            if cross(normal2, primary_axis.normal) > SIN_TOL {
                return Manifold::default();
            }
        } else {
            primary_axis = edge_axis;
        }
    }

    let mut manifold = Manifold::default();
    let clip_points: [ClipVertex; 2];
    let mut reference: ReferenceFace;

    if primary_axis.kind == AxisKind::EdgeA {
        manifold.kind = ManifoldType::FaceA;

        // Polygon normal most anti-parallel to the edge normal.
        let mut best_index = 0;
        let mut best_value = primary_axis.normal.dot(temp.normals[0]);
        for i in 1..temp.count {
            let value = primary_axis.normal.dot(temp.normals[i]);
            if value < best_value {
                best_value = value;
                best_index = i;
            }
        }

        let i1 = best_index;
        let i2 = if i1 + 1 < temp.count { i1 + 1 } else { 0 };
        let feature = |index_b: usize| ContactFeature {
            index_a: 0,
            index_b: index_b as u8,
            type_a: FeatureType::Face,
            type_b: FeatureType::Vertex,
        };

        clip_points = [
            ClipVertex {
                v: temp.vertices[i1],
                id: feature(i1),
            },
            ClipVertex {
                v: temp.vertices[i2],
                id: feature(i2),
            },
        ];

        reference = ReferenceFace {
            i1: 0,
            i2: 1,
            v1,
            normal: primary_axis.normal,
            side_normal1: -edge1,
            side_offset1: 0.0,
            side_normal2: edge1,
            side_offset2: 0.0,
        };
        reference.side_offset1 = reference.side_normal1.dot(v1);
        reference.side_offset2 = reference.side_normal2.dot(v2);
    } else {
        manifold.kind = ManifoldType::FaceB;

        let feature = |index_a: u8| ContactFeature {
            index_a,
            index_b: primary_axis.index as u8,
            type_a: FeatureType::Vertex,
            type_b: FeatureType::Face,
        };
        clip_points = [
            ClipVertex {
                v: v2,
                id: feature(1),
            },
            ClipVertex {
                v: v1,
                id: feature(0),
            },
        ];

        let i1 = primary_axis.index;
        let i2 = if i1 + 1 < temp.count { i1 + 1 } else { 0 };
        let normal = temp.normals[i1];
        // CCW winding
        let side_normal1 = Vec2::new(normal.y, -normal.x);
        reference = ReferenceFace {
            i1,
            i2,
            v1: temp.vertices[i1],
            normal,
            side_normal1,
            side_offset1: side_normal1.dot(temp.vertices[i1]),
            side_normal2: -side_normal1,
            side_offset2: (-side_normal1).dot(temp.vertices[i2]),
        };
    }

    // Clip the incident edge against the reference face side planes.
    let (clip_points1, np) = clip_segment_to_line(
        &clip_points,
        reference.side_normal1,
        reference.side_offset1,
        reference.i1 as u8,
    );
    if np < MAX_MANIFOLD_POINTS {
        return Manifold::default();
    }

    let (clip_points2, np) = clip_segment_to_line(
        &clip_points1,
        reference.side_normal2,
        reference.side_offset2,
        reference.i2 as u8,
    );
    if np < MAX_MANIFOLD_POINTS {
        return Manifold::default();
    }

    if primary_axis.kind == AxisKind::EdgeA {
        manifold.local_normal = reference.normal;
        manifold.local_point = reference.v1;
    } else {
        manifold.local_normal = polygon_b.normals[reference.i1];
        manifold.local_point = polygon_b.vertices[reference.i1];
    }

    for cp in clip_points2.iter() {
        let separation = reference.normal.dot(cp.v - reference.v1);
        if separation <= radius {
            let mp = &mut manifold.points[manifold.point_count];
            if primary_axis.kind == AxisKind::EdgeA {
                mp.local_point = xf.mul_t(cp.v);
                mp.id = cp.id;
            } else {
                mp.local_point = cp.v;
                mp.id = cp.id.swapped();
            }
            manifold.point_count += 1;
        }
    }

    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::manifold::WorldManifold;

    #[test]
    fn test_collide_equal_boxes_two_points() {
        let a = PolygonShape::new_box(1.0, 1.0).unwrap();
        let b = PolygonShape::new_box(1.0, 1.0).unwrap();
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(0.3, 1.9), 0.0);

        let manifold = collide_polygons(&a, &xf_a, &b, &xf_b);
        assert_eq!(manifold.point_count, 2);

        let wm = WorldManifold::new(&manifold, &xf_a, a.radius, &xf_b, b.radius);
        assert!((wm.normal - Vec2::Y).length() < 1e-5, "normal: {:?}", wm.normal);
        for i in 0..2 {
            let expected = -0.1 - a.radius - b.radius;
            assert!((wm.separations[i] - expected).abs() < 1e-4);
        }
        assert_ne!(manifold.points[0].id.key(), manifold.points[1].id.key());
    }

    #[test]
    fn test_collide_polygons_never_exceeds_two_points() {
        let a = PolygonShape::new_box(1.0, 1.0).unwrap();
        let b = PolygonShape::new(&[
            Vec2::new(-0.8, -0.5),
            Vec2::new(0.8, -0.5),
            Vec2::new(1.0, 0.3),
            Vec2::new(0.0, 0.9),
            Vec2::new(-1.0, 0.3),
        ])
        .unwrap();

        for step in 0..36 {
            let angle = step as f32 * 0.17;
            let xf_b = Transform::new(Vec2::new(0.4, 1.2), angle);
            let manifold = collide_polygons(&a, &Transform::IDENTITY, &b, &xf_b);
            assert!(manifold.point_count <= MAX_MANIFOLD_POINTS);
        }
    }

    #[test]
    fn test_collide_separated_boxes() {
        let a = PolygonShape::new_box(1.0, 1.0).unwrap();
        let xf_b = Transform::new(Vec2::new(0.0, 2.5), 0.0);
        let manifold = collide_polygons(&a, &Transform::IDENTITY, &a, &xf_b);
        assert_eq!(manifold.point_count, 0);
    }

    #[test]
    fn test_collide_circles() {
        let a = CircleShape::new(0.5).unwrap();
        let b = CircleShape::new(0.5).unwrap();
        let xf_b = Transform::new(Vec2::new(0.8, 0.0), 0.0);
        let manifold = collide_circles(&a, &Transform::IDENTITY, &b, &xf_b);
        assert_eq!(manifold.point_count, 1);

        let wm = WorldManifold::new(&manifold, &Transform::IDENTITY, 0.5, &xf_b, 0.5);
        assert!((wm.normal - Vec2::X).length() < 1e-5);
        assert!((wm.separations[0] + 0.2).abs() < 1e-5);

        let far = Transform::new(Vec2::new(1.1, 0.0), 0.0);
        assert_eq!(collide_circles(&a, &Transform::IDENTITY, &b, &far).point_count, 0);
    }

    #[test]
    fn test_collide_polygon_and_circle_regions() {
        let poly = PolygonShape::new_box(1.0, 1.0).unwrap();
        let circle = CircleShape::new(0.5).unwrap();

        // Face region.
        let xf_b = Transform::new(Vec2::new(0.0, 1.4), 0.0);
        let m = collide_polygon_and_circle(&poly, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.kind, ManifoldType::FaceA);
        assert!((m.local_normal - Vec2::Y).length() < 1e-5);

        // Vertex region.
        let xf_b = Transform::new(Vec2::new(1.3, 1.3), 0.0);
        let m = collide_polygon_and_circle(&poly, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert!((m.local_normal - Vec2::splat(std::f32::consts::FRAC_1_SQRT_2)).length() < 1e-4);

        // Out of reach diagonally.
        let xf_b = Transform::new(Vec2::new(1.5, 1.5), 0.0);
        let m = collide_polygon_and_circle(&poly, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.point_count, 0);
    }

    #[test]
    fn test_collide_edge_and_polygon_one_sided() {
        // Right side of (1,0) -> (-1,0) is up.
        let edge = EdgeShape::new_one_sided(
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(-2.0, 0.0),
        )
        .unwrap();
        let poly = PolygonShape::new_box(0.5, 0.5).unwrap();

        let above = Transform::new(Vec2::new(0.0, 0.49), 0.0);
        let m = collide_edge_and_polygon(&edge, &Transform::IDENTITY, &poly, &above);
        assert_eq!(m.point_count, 2);
        let wm = WorldManifold::new(&m, &Transform::IDENTITY, edge.radius, &above, poly.radius);
        assert!((wm.normal - Vec2::Y).length() < 1e-4, "normal: {:?}", wm.normal);

        let below = Transform::new(Vec2::new(0.0, -0.49), 0.0);
        let m = collide_edge_and_polygon(&edge, &Transform::IDENTITY, &poly, &below);
        assert_eq!(m.point_count, 0);
    }

    #[test]
    fn test_collide_edge_and_circle_ghost_region() {
        // Chain continues flat past v1, so the vertex region is owned by the neighbour.
        let edge = EdgeShape::new_one_sided(
            Vec2::new(-2.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
        )
        .unwrap();
        let circle = CircleShape::new(0.5).unwrap();

        // Right side of (-1,0) -> (1,0) is down.
        let under_face = Transform::new(Vec2::new(0.0, -0.45), 0.0);
        let m = collide_edge_and_circle(&edge, &Transform::IDENTITY, &circle, &under_face);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.kind, ManifoldType::FaceA);

        let past_v1 = Transform::new(Vec2::new(-1.2, -0.45), 0.0);
        let m = collide_edge_and_circle(&edge, &Transform::IDENTITY, &circle, &past_v1);
        assert_eq!(m.point_count, 0);

        let two_sided = EdgeShape::new_two_sided(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)).unwrap();
        let m = collide_edge_and_circle(&two_sided, &Transform::IDENTITY, &circle, &past_v1);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.kind, ManifoldType::Circles);
    }

    #[test]
    fn test_contact_order() {
        use ShapeType::*;
        assert_eq!(contact_order(Polygon, Circle), Some(false));
        assert_eq!(contact_order(Circle, Polygon), Some(true));
        assert_eq!(contact_order(Edge, Chain), None);
        assert_eq!(contact_order(Chain, Chain), None);
    }
}
