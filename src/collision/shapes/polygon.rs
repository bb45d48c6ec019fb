use glam::Vec2;

use crate::collision::aabb::{Aabb, RayCastInput, RayCastOutput};
use crate::config::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS};
use crate::error::{PhysicsError, PhysicsResult};
use crate::math::{cross, cross_vs, Transform};

use super::MassData;

/// A convex polygon with counter-clockwise winding and a thin skin radius.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonShape {
    pub centroid: Vec2,
    pub vertices: Vec<Vec2>,
    /// Outward edge normals; `normals[i]` belongs to the edge `vertices[i] -> vertices[i + 1]`.
    pub normals: Vec<Vec2>,
    pub radius: f32,
}

impl PolygonShape {
    /// Build the convex hull of a point cloud.
    ///
    /// Points closer than half the linear slop are welded together. Fails if
    /// more than [`MAX_POLYGON_VERTICES`] points are given or fewer than three
    /// distinct, non-collinear points remain.
    pub fn new(points: &[Vec2]) -> PhysicsResult<Self> {
        if points.len() < 3 {
            return Err(PhysicsError::DegeneratePolygon {
                reason: "fewer than 3 vertices",
            });
        }
        if points.len() > MAX_POLYGON_VERTICES {
            return Err(PhysicsError::DegeneratePolygon {
                reason: "too many vertices",
            });
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(PhysicsError::DegeneratePolygon {
                reason: "non-finite vertex",
            });
        }

        let weld_sq = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut ps: Vec<Vec2> = Vec::with_capacity(points.len());
        for &v in points {
            if ps.iter().all(|p| v.distance_squared(*p) >= weld_sq) {
                ps.push(v);
            }
        }
        if ps.len() < 3 {
            return Err(PhysicsError::DegeneratePolygon {
                reason: "vertices are too close together",
            });
        }

        let hull = gift_wrap(&ps);
        if hull.len() < 3 {
            return Err(PhysicsError::DegeneratePolygon {
                reason: "vertices are collinear",
            });
        }

        Ok(Self::from_hull(hull))
    }

    /// Axis-aligned box with half extents `hx`, `hy` centered on the body origin.
    pub fn new_box(hx: f32, hy: f32) -> PhysicsResult<Self> {
        Self::new_oriented_box(hx, hy, Vec2::ZERO, 0.0)
    }

    /// Box with half extents `hx`, `hy`, placed at `center` and rotated by `angle`.
    pub fn new_oriented_box(hx: f32, hy: f32, center: Vec2, angle: f32) -> PhysicsResult<Self> {
        if !(hx.is_finite() && hy.is_finite() && hx > 0.0 && hy > 0.0) {
            return Err(PhysicsError::DegeneratePolygon {
                reason: "box half extents must be positive",
            });
        }
        let xf = Transform::new(center, angle);
        let vertices = vec![
            xf.mul(Vec2::new(-hx, -hy)),
            xf.mul(Vec2::new(hx, -hy)),
            xf.mul(Vec2::new(hx, hy)),
            xf.mul(Vec2::new(-hx, hy)),
        ];
        let normals = [
            Vec2::new(0.0, -1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
        ]
        .iter()
        .map(|n| xf.q.mul(*n))
        .collect();
        Ok(Self {
            centroid: center,
            vertices,
            normals,
            radius: POLYGON_RADIUS,
        })
    }

    fn from_hull(vertices: Vec<Vec2>) -> Self {
        let n = vertices.len();
        let normals = (0..n)
            .map(|i| {
                let edge = vertices[(i + 1) % n] - vertices[i];
                cross_vs(edge, 1.0).normalize_or_zero()
            })
            .collect();
        let centroid = compute_centroid(&vertices);
        Self {
            centroid,
            vertices,
            normals,
            radius: POLYGON_RADIUS,
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.vertices.len()
    }

    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let local = xf.mul_t(p);
        self.vertices
            .iter()
            .zip(&self.normals)
            .all(|(v, n)| n.dot(local - *v) <= 0.0)
    }

    /// Clip the ray against every edge half-plane. Rays starting inside report no hit.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let p1 = xf.mul_t(input.p1);
        let p2 = xf.mul_t(input.p2);
        let d = p2 - p1;

        let mut lower = 0.0_f32;
        let mut upper = input.max_fraction;
        let mut index = None;

        for (i, (v, n)) in self.vertices.iter().zip(&self.normals).enumerate() {
            let numerator = n.dot(*v - p1);
            let denominator = n.dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // The segment enters this half-space.
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // The segment exits this half-space.
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        index.map(|i| RayCastOutput {
            fraction: lower,
            normal: xf.q.mul(self.normals[i]),
        })
    }

    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let first = xf.mul(self.vertices[0]);
        let (min, max) = self.vertices[1..]
            .iter()
            .map(|v| xf.mul(*v))
            .fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let r = Vec2::splat(self.radius);
        Aabb::new(min - r, max + r)
    }

    /// Mass, centroid and inertia from a triangle fan rooted at the first vertex.
    pub fn compute_mass(&self, density: f32) -> MassData {
        const INV3: f32 = 1.0 / 3.0;
        let s = self.vertices[0];
        let n = self.vertices.len();

        let mut center = Vec2::ZERO;
        let mut area = 0.0;
        let mut inertia = 0.0;

        for i in 0..n {
            let e1 = self.vertices[i] - s;
            let e2 = self.vertices[(i + 1) % n] - s;

            let d = cross(e1, e2);
            let triangle_area = 0.5 * d;
            area += triangle_area;
            center += triangle_area * INV3 * (e1 + e2);

            let int_x2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let int_y2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (0.25 * INV3 * d) * (int_x2 + int_y2);
        }

        let mass = density * area;
        if area > 0.0 {
            center /= area;
        }
        let world_center = center + s;

        // Inertia about the fan root, shifted to the shape origin.
        let inertia = density * inertia
            + mass * (world_center.length_squared() - center.length_squared());

        MassData {
            mass,
            center: world_center,
            inertia,
        }
    }
}

/// Gift-wrap hull starting from the rightmost (then lowest) point.
fn gift_wrap(ps: &[Vec2]) -> Vec<Vec2> {
    let n = ps.len();
    let mut i0 = 0;
    for i in 1..n {
        let (x, x0) = (ps[i].x, ps[i0].x);
        if x > x0 || (x == x0 && ps[i].y < ps[i0].y) {
            i0 = i;
        }
    }

    let mut hull: Vec<usize> = Vec::with_capacity(n);
    let mut ih = i0;
    loop {
        if hull.len() >= n {
            // Numerically degenerate input; the wrap did not close.
            return Vec::new();
        }
        hull.push(ih);

        let mut ie = 0;
        for j in 1..n {
            if ie == ih {
                ie = j;
                continue;
            }
            let r = ps[ie] - ps[ih];
            let v = ps[j] - ps[ih];
            let c = cross(r, v);
            if c < 0.0 || (c == 0.0 && v.length_squared() > r.length_squared()) {
                ie = j;
            }
        }

        ih = ie;
        if ie == i0 {
            break;
        }
    }

    hull.into_iter().map(|i| ps[i]).collect()
}

fn compute_centroid(vs: &[Vec2]) -> Vec2 {
    const INV3: f32 = 1.0 / 3.0;
    let s = vs[0];
    let n = vs.len();
    let mut c = Vec2::ZERO;
    let mut area = 0.0;

    for i in 1..n - 1 {
        let e1 = vs[i] - s;
        let e2 = vs[i + 1] - s;
        let triangle_area = 0.5 * cross(e1, e2);
        area += triangle_area;
        c += triangle_area * INV3 * (e1 + e2);
    }

    if area > 0.0 {
        c / area + s
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_hull_orders_ccw() {
        let points = [
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, -1.0),
            Vec2::new(0.0, 0.0), // interior
            Vec2::new(1.0, -1.0),
            Vec2::new(-1.0, 1.0),
        ];
        let poly = PolygonShape::new(&points).unwrap();
        assert_eq!(poly.count(), 4);

        for i in 0..poly.count() {
            let a = poly.vertices[i];
            let b = poly.vertices[(i + 1) % 4];
            let c = poly.vertices[(i + 2) % 4];
            assert!(cross(b - a, c - b) > 0.0, "hull is not counter-clockwise");
        }
        assert!(poly.centroid.length() < 1e-5);
    }

    #[test]
    fn test_polygon_rejects_degenerate() {
        assert!(PolygonShape::new(&[Vec2::ZERO, Vec2::X]).is_err());
        assert!(PolygonShape::new(&[Vec2::ZERO, Vec2::X, Vec2::new(2.0, 0.0)]).is_err());
        assert!(PolygonShape::new_box(0.0, 1.0).is_err());
        let too_many: Vec<Vec2> = (0..9)
            .map(|i| Vec2::from_angle(i as f32 * 0.7))
            .collect();
        assert!(PolygonShape::new(&too_many).is_err());
    }

    #[test]
    fn test_polygon_box_mass() {
        let poly = PolygonShape::new_box(1.0, 0.5).unwrap();
        let md = poly.compute_mass(2.0);
        // 2 x 1 box, density 2.
        assert!((md.mass - 4.0).abs() < 1e-5);
        assert!(md.center.length() < 1e-5);
        let expected_inertia = 4.0 * (4.0 + 1.0) / 12.0;
        assert!(
            (md.inertia - expected_inertia).abs() < 1e-4,
            "inertia: {}",
            md.inertia
        );
    }

    #[test]
    fn test_polygon_offset_box_mass() {
        let poly = PolygonShape::new_oriented_box(0.5, 0.5, Vec2::new(2.0, 0.0), 0.3).unwrap();
        let md = poly.compute_mass(1.0);
        assert!((md.mass - 1.0).abs() < 1e-5);
        assert!((md.center - Vec2::new(2.0, 0.0)).length() < 1e-5);
        // Parallel axis theorem.
        let expected = 1.0 / 6.0 + 4.0;
        assert!((md.inertia - expected).abs() < 1e-4);
    }

    #[test]
    fn test_polygon_ray_cast() {
        let poly = PolygonShape::new_box(1.0, 1.0).unwrap();
        let xf = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = poly.ray_cast(&input, &xf).unwrap();
        assert!((hit.fraction - 0.4).abs() < 1e-5);
        assert!((hit.normal - Vec2::new(-1.0, 0.0)).length() < 1e-5);

        // Starting inside reports nothing.
        let inside = RayCastInput {
            p1: Vec2::new(5.0, 0.0),
            ..input
        };
        assert!(poly.ray_cast(&inside, &xf).is_none());
    }

    #[test]
    fn test_polygon_test_point_and_aabb() {
        let poly = PolygonShape::new_box(1.0, 2.0).unwrap();
        let xf = Transform::new(Vec2::new(1.0, 1.0), std::f32::consts::FRAC_PI_2);
        assert!(poly.test_point(&xf, Vec2::new(2.5, 1.0)));
        assert!(!poly.test_point(&xf, Vec2::new(1.0, 2.5)));

        let aabb = poly.compute_aabb(&xf);
        let r = poly.radius;
        assert!((aabb.min - Vec2::new(-1.0 - r, 0.0 - r)).length() < 1e-4);
        assert!((aabb.max - Vec2::new(3.0 + r, 2.0 + r)).length() < 1e-4);
    }
}
