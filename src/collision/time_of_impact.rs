//! Time of impact between two swept convex proxies.
//!
//! Conservative advancement over a separating axis: at each outer iteration
//! GJK finds the closest features, the axis they define is tracked forward in
//! time with a root finder until the separation drops to the target, and the
//! process repeats from that time.

use glam::Vec2;
use tracing::warn;

use crate::collision::distance::{
    compute_distance, DistanceInput, DistanceProxy, SimplexCache, DEFAULT_GJK_ITERATIONS,
};
use crate::config::{LINEAR_SLOP, MAX_POLYGON_VERTICES};
use crate::math::{cross_vs, Sweep, Transform};

/// Default cap on outer TOI iterations.
pub const DEFAULT_TOI_ITERATIONS: u32 = 20;

const MAX_ROOT_ITERATIONS: u32 = 50;

/// Input for [`time_of_impact`].
#[derive(Debug, Clone, Copy)]
pub struct ToiInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Sweep interval is `[0, t_max]`.
    pub t_max: f32,
    pub linear_slop: f32,
    pub max_iterations: u32,
    /// Iteration cap for each inner distance query.
    pub gjk_iterations: u32,
}

impl ToiInput {
    pub fn new(
        proxy_a: DistanceProxy,
        proxy_b: DistanceProxy,
        sweep_a: Sweep,
        sweep_b: Sweep,
        t_max: f32,
    ) -> Self {
        Self {
            proxy_a,
            proxy_b,
            sweep_a,
            sweep_b,
            t_max,
            linear_slop: LINEAR_SLOP,
            max_iterations: DEFAULT_TOI_ITERATIONS,
            gjk_iterations: DEFAULT_GJK_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToiState {
    Unknown,
    /// The root finder did not converge.
    Failed,
    /// Already overlapping at the start of the sweep.
    Overlapped,
    /// Touching at `t`.
    Touching,
    /// Never closer than the target over the interval.
    Separated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeparationKind {
    Points,
    FaceA,
    FaceB,
}

/// Separating axis taken from the GJK simplex, evaluated along the sweeps.
struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationKind,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: Sweep,
        t1: f32,
    ) -> Self {
        debug_assert!(0 < cache.count && cache.count < 3);

        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);

        let mut f = Self {
            proxy_a,
            proxy_b,
            sweep_a,
            sweep_b,
            kind: SeparationKind::Points,
            local_point: Vec2::ZERO,
            axis: Vec2::ZERO,
        };

        if cache.count == 1 {
            let point_a = xf_a.mul(proxy_a.vertex(cache.index_a[0] as usize));
            let point_b = xf_b.mul(proxy_b.vertex(cache.index_b[0] as usize));
            f.axis = (point_b - point_a).normalize_or_zero();
        } else if cache.index_a[0] == cache.index_a[1] {
            // Two points on B and one on A.
            f.kind = SeparationKind::FaceB;
            let local_b1 = proxy_b.vertex(cache.index_b[0] as usize);
            let local_b2 = proxy_b.vertex(cache.index_b[1] as usize);

            f.axis = cross_vs(local_b2 - local_b1, 1.0).normalize_or_zero();
            let normal = xf_b.q.mul(f.axis);

            f.local_point = 0.5 * (local_b1 + local_b2);
            let point_b = xf_b.mul(f.local_point);
            let point_a = xf_a.mul(proxy_a.vertex(cache.index_a[0] as usize));

            if (point_a - point_b).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
        } else {
            // Two points on A and one or two points on B.
            f.kind = SeparationKind::FaceA;
            let local_a1 = proxy_a.vertex(cache.index_a[0] as usize);
            let local_a2 = proxy_a.vertex(cache.index_a[1] as usize);

            f.axis = cross_vs(local_a2 - local_a1, 1.0).normalize_or_zero();
            let normal = xf_a.q.mul(f.axis);

            f.local_point = 0.5 * (local_a1 + local_a2);
            let point_a = xf_a.mul(f.local_point);
            let point_b = xf_b.mul(proxy_b.vertex(cache.index_b[0] as usize));

            if (point_b - point_a).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
        }

        f
    }

    fn transforms(&self, t: f32) -> (Transform, Transform) {
        (self.sweep_a.transform_at(t), self.sweep_b.transform_at(t))
    }

    /// Deepest points along the axis at time `t`, and their separation.
    fn find_min_separation(&self, t: f32) -> (usize, usize, f32) {
        let (xf_a, xf_b) = self.transforms(t);

        match self.kind {
            SeparationKind::Points => {
                let index_a = self.proxy_a.support(xf_a.q.mul_t(self.axis));
                let index_b = self.proxy_b.support(xf_b.q.mul_t(-self.axis));
                let point_a = xf_a.mul(self.proxy_a.vertex(index_a));
                let point_b = xf_b.mul(self.proxy_b.vertex(index_b));
                (index_a, index_b, (point_b - point_a).dot(self.axis))
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.mul(self.axis);
                let point_a = xf_a.mul(self.local_point);
                let index_b = self.proxy_b.support(xf_b.q.mul_t(-normal));
                let point_b = xf_b.mul(self.proxy_b.vertex(index_b));
                (usize::MAX, index_b, (point_b - point_a).dot(normal))
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.mul(self.axis);
                let point_b = xf_b.mul(self.local_point);
                let index_a = self.proxy_a.support(xf_a.q.mul_t(-normal));
                let point_a = xf_a.mul(self.proxy_a.vertex(index_a));
                (index_a, usize::MAX, (point_a - point_b).dot(normal))
            }
        }
    }

    /// Separation of the given feature pair at time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f32) -> f32 {
        let (xf_a, xf_b) = self.transforms(t);

        match self.kind {
            SeparationKind::Points => {
                let point_a = xf_a.mul(self.proxy_a.vertex(index_a));
                let point_b = xf_b.mul(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.mul(self.axis);
                let point_a = xf_a.mul(self.local_point);
                let point_b = xf_b.mul(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(normal)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.mul(self.axis);
                let point_b = xf_b.mul(self.local_point);
                let point_a = xf_a.mul(self.proxy_a.vertex(index_a));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// First time in `[0, t_max]` at which the proxies come within the linear
/// slop of touching.
///
/// The result never lets the shapes tunnel through each other, but may be
/// early when the sweeps rotate quickly.
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    let mut output = ToiOutput {
        state: ToiState::Unknown,
        t: input.t_max,
    };

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;

    // Keep the angles small for the root finder.
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;
    let slop = input.linear_slop;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = slop.max(total_radius - 3.0 * slop);
    let tolerance = 0.25 * slop;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0;
    let mut iteration = 0;

    let mut cache = SimplexCache::default();
    let mut distance_input = DistanceInput::new(
        *proxy_a,
        *proxy_b,
        Transform::IDENTITY,
        Transform::IDENTITY,
        false,
    );
    distance_input.max_iterations = input.gjk_iterations;

    // One separating axis per outer iteration, until the axis stops changing.
    loop {
        distance_input.transform_a = sweep_a.transform_at(t1);
        distance_input.transform_b = sweep_b.transform_at(t1);

        // Closest features at t1, with the simplex cached for the separation function.
        let distance_output = compute_distance(&distance_input, &mut cache);

        if distance_output.distance <= 0.0 {
            output.state = ToiState::Overlapped;
            output.t = 0.0;
            break;
        }

        if distance_output.distance < target + tolerance {
            output.state = ToiState::Touching;
            output.t = t1;
            break;
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // Resolve the deepest point along the axis. Bounded by the vertex count
        // since each push back exposes a new deepest point.
        let mut done = false;
        let mut t2 = t_max;
        for _ in 0..MAX_POLYGON_VERTICES {
            let (index_a, index_b, mut s2) = fcn.find_min_separation(t2);

            // Separated at the end of the interval.
            if s2 > target + tolerance {
                output.state = ToiState::Separated;
                output.t = t_max;
                done = true;
                break;
            }

            // Within tolerance.
            if s2 > target - tolerance {
                t1 = t2;
                break;
            }

            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // The initial separation must be above the target; otherwise the
            // root finder would go backwards.
            if s1 < target - tolerance {
                output.state = ToiState::Failed;
                output.t = t1;
                done = true;
                break;
            }

            if s1 <= target + tolerance {
                // t1 is the time of impact, possibly 0.
                output.state = ToiState::Touching;
                output.t = t1;
                done = true;
                break;
            }

            // 1D root of f(t) - target = 0, alternating secant and bisection.
            let mut a1 = t1;
            let mut a2 = t2;
            for root_iteration in 0..MAX_ROOT_ITERATIONS {
                let t = if root_iteration & 1 == 1 {
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    0.5 * (a1 + a2)
                };

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    t2 = t;
                    break;
                }

                // Keep the root bracketed.
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }
            }
        }

        iteration += 1;

        if done {
            break;
        }

        if iteration == input.max_iterations {
            warn!(iterations = iteration, t = t1, "time of impact reached its iteration cap");
            output.state = ToiState::Failed;
            output.t = t1;
            break;
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::{CircleShape, PolygonShape};

    fn box_proxy(hx: f32, hy: f32) -> DistanceProxy {
        let poly = PolygonShape::new_box(hx, hy).unwrap();
        DistanceProxy::new(&poly.vertices, poly.radius)
    }

    fn linear_sweep(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            c0: from,
            c: to,
            ..Default::default()
        }
    }

    #[test]
    fn test_toi_fast_box_hits_static_box() {
        let input = ToiInput::new(
            box_proxy(1.0, 1.0),
            box_proxy(0.5, 0.5),
            linear_sweep(Vec2::ZERO, Vec2::ZERO),
            linear_sweep(Vec2::new(-20.0, 0.0), Vec2::new(20.0, 0.0)),
            1.0,
        );
        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Touching);

        // Cores touch when B's center reaches x = -1.5 (less the target gap).
        let expected = (-1.5 + 20.0) / 40.0;
        assert!(
            (output.t - expected).abs() < 1e-3,
            "toi: {} expected: {}",
            output.t,
            expected
        );
    }

    #[test]
    fn test_toi_separated() {
        let input = ToiInput::new(
            box_proxy(1.0, 1.0),
            box_proxy(0.5, 0.5),
            linear_sweep(Vec2::ZERO, Vec2::ZERO),
            linear_sweep(Vec2::new(-20.0, 5.0), Vec2::new(20.0, 5.0)),
            1.0,
        );
        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Separated);
        assert_eq!(output.t, 1.0);
    }

    #[test]
    fn test_toi_rotating_circle_against_box() {
        let circle = CircleShape::new(0.25).unwrap();
        let input = ToiInput::new(
            box_proxy(2.0, 0.1),
            DistanceProxy::new(&[circle.position], circle.radius),
            linear_sweep(Vec2::ZERO, Vec2::ZERO),
            Sweep {
                c0: Vec2::new(0.0, 5.0),
                c: Vec2::new(0.0, -5.0),
                a0: 0.0,
                a: 20.0,
                ..Default::default()
            },
            1.0,
        );
        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Touching);

        let xf_b = input.sweep_b.transform_at(output.t);
        // Stops within a few slops of the box skin, never past it.
        let touching_y = 0.1 + 0.25 + 0.01;
        assert!((xf_b.p.y - touching_y).abs() < 0.03, "y: {}", xf_b.p.y);
    }
}
