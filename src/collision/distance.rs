//! GJK closest-point queries between convex proxies.
//!
//! The simplex from the previous query is kept in a [`SimplexCache`] and used
//! to seed the next one, so slowly moving pairs converge in one or two
//! iterations.

use glam::Vec2;
use tracing::warn;

use crate::collision::shapes::Shape;
use crate::config::MAX_POLYGON_VERTICES;
use crate::math::{cross, cross_sv, cross_vs, Transform, EPSILON};

/// Default cap on GJK iterations.
pub const DEFAULT_GJK_ITERATIONS: u32 = 20;

/// Support-point view of a convex shape: a vertex list plus skin radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceProxy {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    pub radius: f32,
}

impl DistanceProxy {
    /// Proxy over an explicit vertex list. At most [`MAX_POLYGON_VERTICES`] are used.
    pub fn new(vertices: &[Vec2], radius: f32) -> Self {
        let mut buffer = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let count = vertices.len().min(MAX_POLYGON_VERTICES);
        buffer[..count].copy_from_slice(&vertices[..count]);
        Self {
            vertices: buffer,
            count,
            radius,
        }
    }

    /// Proxy for one child of a shape.
    pub fn from_shape(shape: &Shape, child_index: usize) -> Self {
        match shape {
            Shape::Circle(s) => Self::new(&[s.position], s.radius),
            Shape::Polygon(s) => Self::new(&s.vertices, s.radius),
            Shape::Edge(s) => Self::new(&[s.v1, s.v2], s.radius),
            Shape::Chain(s) => {
                let edge = s.child_edge(child_index);
                Self::new(&[edge.v1, edge.v2], s.radius)
            }
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn vertex(&self, index: usize) -> Vec2 {
        debug_assert!(index < self.count);
        self.vertices[index]
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    /// Index of the vertex farthest along `d`.
    pub fn support(&self, d: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(d);
        for i in 1..self.count {
            let value = self.vertices[i].dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }
}

/// Warm-start data for GJK, stored per contact between steps.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimplexCache {
    /// Length or area of the cached simplex.
    pub metric: f32,
    pub count: usize,
    pub index_a: [u8; 3],
    pub index_b: [u8; 3],
}

/// Input for [`compute_distance`].
#[derive(Debug, Clone, Copy)]
pub struct DistanceInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// Subtract the skin radii from the core distance.
    pub use_radii: bool,
    pub max_iterations: u32,
}

impl DistanceInput {
    /// Capped at [`DEFAULT_GJK_ITERATIONS`]; set `max_iterations` to override.
    pub fn new(
        proxy_a: DistanceProxy,
        proxy_b: DistanceProxy,
        transform_a: Transform,
        transform_b: Transform,
        use_radii: bool,
    ) -> Self {
        Self {
            proxy_a,
            proxy_b,
            transform_a,
            transform_b,
            use_radii,
            max_iterations: DEFAULT_GJK_ITERATIONS,
        }
    }
}

/// Result of [`compute_distance`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistanceOutput {
    /// Closest point on shape A.
    pub point_a: Vec2,
    /// Closest point on shape B.
    pub point_b: Vec2,
    pub distance: f32,
    /// Number of GJK iterations used.
    pub iterations: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimplexVertex {
    /// Support point in proxy A, world space.
    w_a: Vec2,
    /// Support point in proxy B, world space.
    w_b: Vec2,
    /// `w_b - w_a`
    w: Vec2,
    /// Barycentric coordinate of the closest point.
    a: f32,
    index_a: usize,
    index_b: usize,
}

#[derive(Debug, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) -> Self {
        debug_assert!(cache.count <= 3);
        let mut simplex = Simplex::default();

        simplex.count = cache.count;
        for i in 0..simplex.count {
            let index_a = cache.index_a[i] as usize;
            let index_b = cache.index_b[i] as usize;
            // A cache from a different proxy pair is discarded.
            if index_a >= proxy_a.count || index_b >= proxy_b.count {
                simplex.count = 0;
                break;
            }
            let w_a = xf_a.mul(proxy_a.vertex(index_a));
            let w_b = xf_b.mul(proxy_b.vertex(index_b));
            simplex.v[i] = SimplexVertex {
                w_a,
                w_b,
                w: w_b - w_a,
                a: 0.0,
                index_a,
                index_b,
            };
        }

        // Drop a cached simplex whose size changed too much.
        if simplex.count > 1 {
            let metric1 = cache.metric;
            let metric2 = simplex.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < EPSILON {
                simplex.count = 0;
            }
        }

        if simplex.count == 0 {
            let w_a = xf_a.mul(proxy_a.vertex(0));
            let w_b = xf_b.mul(proxy_b.vertex(0));
            simplex.v[0] = SimplexVertex {
                w_a,
                w_b,
                w: w_b - w_a,
                a: 1.0,
                index_a: 0,
                index_b: 0,
            };
            simplex.count = 1;
        }

        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a as u8;
            cache.index_b[i] = self.v[i].index_b as u8;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = cross(e12, -self.v[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    cross_sv(1.0, e12)
                } else {
                    cross_vs(e12, 1.0)
                }
            }
            _ => Vec2::ZERO,
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        let v = &self.v;
        match self.count {
            1 => (v[0].w_a, v[0].w_b),
            2 => (
                v[0].a * v[0].w_a + v[1].a * v[1].w_a,
                v[0].a * v[0].w_b + v[1].a * v[1].w_b,
            ),
            3 => {
                let p = v[0].a * v[0].w_a + v[1].a * v[1].w_a + v[2].a * v[2].w_a;
                (p, p)
            }
            _ => (Vec2::ZERO, Vec2::ZERO),
        }
    }

    fn metric(&self) -> f32 {
        let v = &self.v;
        match self.count {
            2 => v[0].w.distance(v[1].w),
            3 => cross(v[1].w - v[0].w, v[2].w - v[0].w),
            _ => 0.0,
        }
    }

    /// Closest point on a segment to the origin, by barycentric regions.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Closest feature of a triangle to the origin: a vertex, an edge, or the interior.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        let n123 = cross(e12, e13);
        let d123_1 = n123 * cross(w2, w3);
        let d123_2 = n123 * cross(w3, w1);
        let d123_3 = n123 * cross(w1, w2);

        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv;
            self.v[1].a = d12_2 * inv;
            self.count = 2;
            return;
        }

        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv;
            self.v[2].a = d13_2 * inv;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[2].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv;
            self.v[2].a = d23_2 * inv;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        let inv = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv;
        self.v[1].a = d123_2 * inv;
        self.v[2].a = d123_3 * inv;
        self.count = 3;
    }
}

/// Closest points between two convex proxies.
///
/// Terminates after at most `input.max_iterations` support evaluations, or
/// earlier when the simplex encloses the origin or a support point repeats.
/// `cache` is read as the starting simplex and overwritten with the final one.
pub fn compute_distance(input: &DistanceInput, cache: &mut SimplexCache) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = &input.transform_a;
    let xf_b = &input.transform_b;

    let mut simplex = Simplex::read_cache(cache, proxy_a, xf_a, proxy_b, xf_b);

    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iter = 0;
    while iter < input.max_iterations {
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        // Origin is inside the triangle: the shapes overlap.
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();
        if d.length_squared() < EPSILON * EPSILON {
            // The origin is on the simplex (or too close to tell); overlap.
            break;
        }

        let index_a = proxy_a.support(xf_a.q.mul_t(-d));
        let index_b = proxy_b.support(xf_b.q.mul_t(d));
        let w_a = xf_a.mul(proxy_a.vertex(index_a));
        let w_b = xf_b.mul(proxy_b.vertex(index_b));

        iter += 1;

        // A repeated support point means no more progress is possible.
        let duplicate =
            (0..save_count).any(|i| save_a[i] == index_a && save_b[i] == index_b);
        if duplicate {
            break;
        }

        simplex.v[simplex.count] = SimplexVertex {
            w_a,
            w_b,
            w: w_b - w_a,
            a: 0.0,
            index_a,
            index_b,
        };
        simplex.count += 1;
    }

    if iter >= input.max_iterations {
        warn!(iterations = iter, "GJK reached its iteration cap");
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut distance = point_a.distance(point_b);
    simplex.write_cache(cache);

    if input.use_radii {
        let r_a = proxy_a.radius;
        let r_b = proxy_b.radius;

        if distance > r_a + r_b && distance > EPSILON {
            // Move the witness points to the outer surfaces.
            distance -= r_a + r_b;
            let normal = (point_b - point_a).normalize_or_zero();
            point_a += r_a * normal;
            point_b -= r_b * normal;
        } else {
            // Surfaces overlap; report the midpoint.
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            distance = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance,
        iterations: iter,
    }
}

/// Do the two shape children overlap (including skin radii)?
pub fn test_overlap(
    shape_a: &Shape,
    index_a: usize,
    shape_b: &Shape,
    index_b: usize,
    xf_a: &Transform,
    xf_b: &Transform,
) -> bool {
    let input = DistanceInput::new(
        DistanceProxy::from_shape(shape_a, index_a),
        DistanceProxy::from_shape(shape_b, index_b),
        *xf_a,
        *xf_b,
        true,
    );
    let mut cache = SimplexCache::default();
    let output = compute_distance(&input, &mut cache);
    output.distance < 10.0 * EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::{CircleShape, PolygonShape};

    fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
        let ab = b - a;
        let t = ((p - a).dot(ab) / ab.length_squared()).clamp(0.0, 1.0);
        p.distance(a + t * ab)
    }

    /// Exhaustive edge-pair distance between two separated convex polygons.
    fn brute_force_distance(a: &[Vec2], xf_a: &Transform, b: &[Vec2], xf_b: &Transform) -> f32 {
        let wa: Vec<Vec2> = a.iter().map(|v| xf_a.mul(*v)).collect();
        let wb: Vec<Vec2> = b.iter().map(|v| xf_b.mul(*v)).collect();
        let mut best = f32::MAX;
        for i in 0..wa.len() {
            let (a1, a2) = (wa[i], wa[(i + 1) % wa.len()]);
            for j in 0..wb.len() {
                let (b1, b2) = (wb[j], wb[(j + 1) % wb.len()]);
                best = best
                    .min(point_segment_distance(a1, b1, b2))
                    .min(point_segment_distance(a2, b1, b2))
                    .min(point_segment_distance(b1, a1, a2))
                    .min(point_segment_distance(b2, a1, a2));
            }
        }
        best
    }

    struct Lcg(u64);

    impl Lcg {
        fn next_f32(&mut self) -> f32 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((self.0 >> 40) as f32) / (1u64 << 24) as f32
        }

        fn range(&mut self, lo: f32, hi: f32) -> f32 {
            lo + (hi - lo) * self.next_f32()
        }
    }

    fn random_polygon(rng: &mut Lcg) -> Option<PolygonShape> {
        let n = 3 + (rng.next_f32() * 6.0) as usize;
        let points: Vec<Vec2> = (0..n.min(MAX_POLYGON_VERTICES))
            .map(|_| Vec2::new(rng.range(-1.0, 1.0), rng.range(-1.0, 1.0)))
            .collect();
        PolygonShape::new(&points).ok()
    }

    #[test]
    fn test_distance_matches_brute_force() {
        let mut rng = Lcg(0x5eed);
        let mut checked = 0;

        for _ in 0..200 {
            let (Some(a), Some(b)) = (random_polygon(&mut rng), random_polygon(&mut rng)) else {
                continue;
            };
            let angle = rng.range(0.0, std::f32::consts::TAU);
            let offset = Vec2::from_angle(angle) * rng.range(3.0, 6.0);
            let xf_a = Transform::new(Vec2::ZERO, rng.range(-3.0, 3.0));
            let xf_b = Transform::new(offset, rng.range(-3.0, 3.0));

            let input = DistanceInput::new(
                DistanceProxy::new(&a.vertices, a.radius),
                DistanceProxy::new(&b.vertices, b.radius),
                xf_a,
                xf_b,
                false,
            );
            let mut cache = SimplexCache::default();
            let output = compute_distance(&input, &mut cache);

            let expected = brute_force_distance(&a.vertices, &xf_a, &b.vertices, &xf_b);
            assert!(
                (output.distance - expected).abs() < 1e-3,
                "gjk {} vs brute force {}",
                output.distance,
                expected
            );
            assert!(output.iterations <= DEFAULT_GJK_ITERATIONS);
            checked += 1;
        }
        assert!(checked > 100);
    }

    #[test]
    fn test_distance_thin_rectangles() {
        let a = PolygonShape::new_box(5.0, 0.1).unwrap();
        let b = PolygonShape::new_box(1.0, 0.1).unwrap();
        let xf_a = Transform::new(Vec2::new(0.0, -0.2), 0.0);
        let xf_b = Transform::new(Vec2::new(12.017401, 0.13678508), -0.0109265);

        let input = DistanceInput::new(
            DistanceProxy::new(&a.vertices, a.radius),
            DistanceProxy::new(&b.vertices, b.radius),
            xf_a,
            xf_b,
            true,
        );
        let mut cache = SimplexCache::default();
        let output = compute_distance(&input, &mut cache);

        let expected =
            brute_force_distance(&a.vertices, &xf_a, &b.vertices, &xf_b) - a.radius - b.radius;
        assert!(
            (output.distance - expected).abs() < 1e-3,
            "distance: {} expected: {}",
            output.distance,
            expected
        );
        assert!(output.iterations <= DEFAULT_GJK_ITERATIONS);
    }

    #[test]
    fn test_distance_warm_start_converges_immediately() {
        let a = PolygonShape::new_box(1.0, 1.0).unwrap();
        let b = PolygonShape::new_box(1.0, 1.0).unwrap();
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(4.0, 0.5), 0.2);
        let input = DistanceInput::new(
            DistanceProxy::new(&a.vertices, 0.0),
            DistanceProxy::new(&b.vertices, 0.0),
            xf_a,
            xf_b,
            false,
        );

        let mut cache = SimplexCache::default();
        let first = compute_distance(&input, &mut cache);
        let second = compute_distance(&input, &mut cache);
        assert!((first.distance - second.distance).abs() < 1e-5);
        assert!(second.iterations <= first.iterations);
    }

    #[test]
    fn test_distance_degenerate_duplicate_vertices_terminates() {
        // Repeated vertices produce duplicate support points.
        let proxy = DistanceProxy::new(&[Vec2::ZERO, Vec2::ZERO, Vec2::ZERO], 0.0);
        let input = DistanceInput::new(
            proxy,
            proxy,
            Transform::IDENTITY,
            Transform::new(Vec2::new(1.0, 0.0), 0.0),
            false,
        );
        let mut cache = SimplexCache::default();
        let output = compute_distance(&input, &mut cache);
        assert!((output.distance - 1.0).abs() < 1e-5);
        assert!(output.iterations <= DEFAULT_GJK_ITERATIONS);
    }

    #[test]
    fn test_distance_respects_iteration_override() {
        let a = PolygonShape::new_box(5.0, 0.1).unwrap();
        let b = PolygonShape::new_box(1.0, 0.1).unwrap();
        let mut input = DistanceInput::new(
            DistanceProxy::new(&a.vertices, a.radius),
            DistanceProxy::new(&b.vertices, b.radius),
            Transform::IDENTITY,
            Transform::new(Vec2::new(8.0, 3.0), 0.7),
            true,
        );
        input.max_iterations = 2;
        let output = compute_distance(&input, &mut SimplexCache::default());
        assert!(output.iterations <= 2, "iterations: {}", output.iterations);
    }

    #[test]
    fn test_overlap_circles() {
        let a: Shape = CircleShape::new(1.0).unwrap().into();
        let b: Shape = CircleShape::new(1.0).unwrap().into();
        let near = Transform::new(Vec2::new(1.5, 0.0), 0.0);
        let far = Transform::new(Vec2::new(2.5, 0.0), 0.0);
        assert!(test_overlap(&a, 0, &b, 0, &Transform::IDENTITY, &near));
        assert!(!test_overlap(&a, 0, &b, 0, &Transform::IDENTITY, &far));
    }
}
