//! Sequential-impulse contact solver with non-linear position correction.
//!
//! Per contact point the tangent (friction) impulse is solved before the
//! normal impulse, so friction is clamped against the normal impulse
//! accumulated up to the previous iteration. Two-point manifolds use a block
//! solver for the normal impulses when the 2x2 system is well conditioned.
//!
//! Accuracy degrades with extreme mass ratios. The iteration counts are
//! fixed, so the solver returns an approximate answer instead of diverging.

use glam::{Mat2, Vec2};

use crate::collision::manifold::{Manifold, ManifoldType, WorldManifold};
use crate::config::{TimeStep, WorldConfig, MAX_MANIFOLD_POINTS};
use crate::math::{cross, cross_sv, cross_vs, inverse22, normalize_mut, Rot, Transform};

use super::contact::ContactHandle;
use super::island::{Position, Velocity};

/// Largest condition number for which the two-point block solver is used.
const MAX_CONDITION_NUMBER: f32 = 1000.0;

/// Snapshot of one touching contact handed to the solver.
#[derive(Debug, Clone)]
pub(crate) struct ContactSolverInput {
    pub contact: ContactHandle,
    pub manifold: Manifold,
    pub friction: f32,
    pub restitution: f32,
    pub tangent_speed: f32,
    pub index_a: usize,
    pub index_b: usize,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
    pub local_center_a: Vec2,
    pub local_center_b: Vec2,
    pub radius_a: f32,
    pub radius_b: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct VelocityConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f32,
    tangent_impulse: f32,
    normal_mass: f32,
    tangent_mass: f32,
    /// Restitution target for the normal velocity.
    velocity_bias: f32,
    /// Separation bias used by soft contacts.
    soft_bias: f32,
}

#[derive(Debug, Clone)]
struct ContactVelocityConstraint {
    points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    normal: Vec2,
    normal_matrix: Mat2,
    k: Mat2,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    friction: f32,
    restitution: f32,
    tangent_speed: f32,
    point_count: usize,
    contact: ContactHandle,
}

#[derive(Debug, Clone)]
struct ContactPositionConstraint {
    local_points: [Vec2; MAX_MANIFOLD_POINTS],
    local_normal: Vec2,
    local_point: Vec2,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_i_a: f32,
    inv_i_b: f32,
    kind: ManifoldType,
    radius_a: f32,
    radius_b: f32,
    point_count: usize,
}

/// Soft contact coefficients derived from `contact_hertz`.
#[derive(Debug, Clone, Copy)]
struct Softness {
    bias_rate: f32,
    mass_scale: f32,
    impulse_scale: f32,
}

impl Softness {
    fn new(hertz: f32, damping_ratio: f32, h: f32) -> Option<Self> {
        if hertz <= 0.0 || h <= 0.0 {
            return None;
        }
        let omega = 2.0 * std::f32::consts::PI * hertz;
        let a1 = 2.0 * damping_ratio + h * omega;
        let a2 = h * omega * a1;
        let a3 = 1.0 / (1.0 + a2);
        Some(Self {
            bias_rate: omega / a1,
            mass_scale: a2 * a3,
            impulse_scale: a3,
        })
    }
}

/// Solver tunables copied from the world configuration.
#[derive(Debug, Clone, Copy)]
struct Tolerances {
    block_solve: bool,
    velocity_threshold: f32,
    linear_slop: f32,
    baumgarte: f32,
    toi_baumgarte: f32,
    max_linear_correction: f32,
    push_velocity: f32,
}

pub(crate) struct ContactSolver {
    step: TimeStep,
    tolerances: Tolerances,
    softness: Option<Softness>,
    manifolds: Vec<Manifold>,
    velocity_constraints: Vec<ContactVelocityConstraint>,
    position_constraints: Vec<ContactPositionConstraint>,
}

impl ContactSolver {
    pub fn new(step: &TimeStep, config: &WorldConfig, inputs: Vec<ContactSolverInput>) -> Self {
        let count = inputs.len();
        let mut manifolds = Vec::with_capacity(count);
        let mut velocity_constraints = Vec::with_capacity(count);
        let mut position_constraints = Vec::with_capacity(count);

        for input in inputs {
            let manifold = input.manifold;
            let point_count = manifold.point_count;
            debug_assert!(point_count > 0);

            let mut points = [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS];
            let mut local_points = [Vec2::ZERO; MAX_MANIFOLD_POINTS];
            for (j, mp) in manifold.points().iter().enumerate() {
                if step.warm_starting {
                    points[j].normal_impulse = step.dt_ratio * mp.normal_impulse;
                    points[j].tangent_impulse = step.dt_ratio * mp.tangent_impulse;
                }
                local_points[j] = mp.local_point;
            }

            velocity_constraints.push(ContactVelocityConstraint {
                points,
                normal: Vec2::ZERO,
                normal_matrix: Mat2::ZERO,
                k: Mat2::ZERO,
                index_a: input.index_a,
                index_b: input.index_b,
                inv_mass_a: input.inv_mass_a,
                inv_mass_b: input.inv_mass_b,
                inv_i_a: input.inv_i_a,
                inv_i_b: input.inv_i_b,
                friction: input.friction,
                restitution: input.restitution,
                tangent_speed: input.tangent_speed,
                point_count,
                contact: input.contact,
            });

            position_constraints.push(ContactPositionConstraint {
                local_points,
                local_normal: manifold.local_normal,
                local_point: manifold.local_point,
                index_a: input.index_a,
                index_b: input.index_b,
                inv_mass_a: input.inv_mass_a,
                inv_mass_b: input.inv_mass_b,
                local_center_a: input.local_center_a,
                local_center_b: input.local_center_b,
                inv_i_a: input.inv_i_a,
                inv_i_b: input.inv_i_b,
                kind: manifold.kind,
                radius_a: input.radius_a,
                radius_b: input.radius_b,
                point_count,
            });

            manifolds.push(manifold);
        }

        Self {
            step: *step,
            tolerances: Tolerances {
                block_solve: config.block_solve,
                velocity_threshold: config.velocity_threshold,
                linear_slop: config.linear_slop,
                baumgarte: config.baumgarte,
                toi_baumgarte: config.toi_baumgarte,
                max_linear_correction: config.max_linear_correction,
                push_velocity: config.contact_push_velocity,
            },
            softness: Softness::new(config.contact_hertz, config.contact_damping_ratio, step.dt),
            manifolds,
            velocity_constraints,
            position_constraints,
        }
    }

    /// Compute anchors, effective masses and restitution bias from the current positions.
    pub fn initialize_velocity_constraints(
        &mut self,
        positions: &[Position],
        velocities: &[Velocity],
    ) {
        let tol = self.tolerances;
        let use_block = tol.block_solve && self.softness.is_none();

        for ((vc, pc), manifold) in self
            .velocity_constraints
            .iter_mut()
            .zip(&self.position_constraints)
            .zip(&self.manifolds)
        {
            let (m_a, m_b) = (vc.inv_mass_a, vc.inv_mass_b);
            let (i_a, i_b) = (vc.inv_i_a, vc.inv_i_b);

            let Position { c: c_a, a: a_a } = positions[vc.index_a];
            let Velocity { v: v_a, w: w_a } = velocities[vc.index_a];
            let Position { c: c_b, a: a_b } = positions[vc.index_b];
            let Velocity { v: v_b, w: w_b } = velocities[vc.index_b];

            let xf_a = body_transform(c_a, a_a, pc.local_center_a);
            let xf_b = body_transform(c_b, a_b, pc.local_center_b);

            let wm = WorldManifold::new(manifold, &xf_a, pc.radius_a, &xf_b, pc.radius_b);
            vc.normal = wm.normal;
            let normal = wm.normal;
            let tangent = cross_vs(normal, 1.0);

            for j in 0..vc.point_count {
                let vcp = &mut vc.points[j];
                vcp.r_a = wm.points[j] - c_a;
                vcp.r_b = wm.points[j] - c_b;

                let rn_a = cross(vcp.r_a, normal);
                let rn_b = cross(vcp.r_b, normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = cross(vcp.r_a, tangent);
                let rt_b = cross(vcp.r_b, tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Restitution only above the threshold, so resting contacts do not jitter.
                vcp.velocity_bias = 0.0;
                let v_rel = normal.dot(
                    v_b + cross_sv(w_b, vcp.r_b) - v_a - cross_sv(w_a, vcp.r_a),
                );
                if v_rel < -tol.velocity_threshold {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }

                vcp.soft_bias = 0.0;
                if let Some(soft) = self.softness {
                    let s = wm.separations[j] + tol.linear_slop;
                    vcp.soft_bias = if s > 0.0 {
                        s * self.step.inv_dt
                    } else {
                        (soft.bias_rate * s).max(-tol.push_velocity)
                    };
                }
            }

            if vc.point_count == 2 && use_block {
                let cp1 = vc.points[0];
                let cp2 = vc.points[1];

                let rn1_a = cross(cp1.r_a, normal);
                let rn1_b = cross(cp1.r_b, normal);
                let rn2_a = cross(cp2.r_a, normal);
                let rn2_b = cross(cp2.r_b, normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    vc.k = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_matrix = inverse22(&vc.k);
                } else {
                    // Redundant points: solve only the first.
                    vc.point_count = 1;
                }
            }
        }
    }

    /// Apply last step's impulses scaled by the step ratio.
    pub fn warm_start(&self, velocities: &mut [Velocity]) {
        for vc in &self.velocity_constraints {
            let (m_a, m_b) = (vc.inv_mass_a, vc.inv_mass_b);
            let (i_a, i_b) = (vc.inv_i_a, vc.inv_i_b);
            let normal = vc.normal;
            let tangent = cross_vs(normal, 1.0);

            let Velocity { v: mut v_a, w: mut w_a } = velocities[vc.index_a];
            let Velocity { v: mut v_b, w: mut w_b } = velocities[vc.index_b];

            for vcp in &vc.points[..vc.point_count] {
                let p = vcp.normal_impulse * normal + vcp.tangent_impulse * tangent;
                w_a -= i_a * cross(vcp.r_a, p);
                v_a -= m_a * p;
                w_b += i_b * cross(vcp.r_b, p);
                v_b += m_b * p;
            }

            velocities[vc.index_a] = Velocity { v: v_a, w: w_a };
            velocities[vc.index_b] = Velocity { v: v_b, w: w_b };
        }
    }

    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        let use_block = self.tolerances.block_solve && self.softness.is_none();
        let softness = self.softness;

        for vc in &mut self.velocity_constraints {
            let (m_a, m_b) = (vc.inv_mass_a, vc.inv_mass_b);
            let (i_a, i_b) = (vc.inv_i_a, vc.inv_i_b);
            let normal = vc.normal;
            let tangent = cross_vs(normal, 1.0);
            let friction = vc.friction;

            let Velocity { v: mut v_a, w: mut w_a } = velocities[vc.index_a];
            let Velocity { v: mut v_b, w: mut w_b } = velocities[vc.index_b];

            // Friction first: it is clamped by the normal impulse.
            for vcp in &mut vc.points[..vc.point_count] {
                let dv = v_b + cross_sv(w_b, vcp.r_b) - v_a - cross_sv(w_a, vcp.r_a);
                let vt = dv.dot(tangent) - vc.tangent_speed;
                let lambda = vcp.tangent_mass * -vt;

                let max_friction = friction * vcp.normal_impulse;
                let new_impulse = (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                let p = lambda * tangent;
                v_a -= m_a * p;
                w_a -= i_a * cross(vcp.r_a, p);
                v_b += m_b * p;
                w_b += i_b * cross(vcp.r_b, p);
            }

            if vc.point_count == 1 || !use_block {
                for vcp in &mut vc.points[..vc.point_count] {
                    let dv = v_b + cross_sv(w_b, vcp.r_b) - v_a - cross_sv(w_a, vcp.r_a);
                    let vn = dv.dot(normal);

                    let lambda = match softness {
                        Some(soft) if vcp.velocity_bias == 0.0 => {
                            -vcp.normal_mass * soft.mass_scale * (vn + vcp.soft_bias)
                                - soft.impulse_scale * vcp.normal_impulse
                        }
                        _ => -vcp.normal_mass * (vn - vcp.velocity_bias),
                    };

                    // Accumulated normal impulse never pulls.
                    let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                    let lambda = new_impulse - vcp.normal_impulse;
                    vcp.normal_impulse = new_impulse;

                    let p = lambda * normal;
                    v_a -= m_a * p;
                    w_a -= i_a * cross(vcp.r_a, p);
                    v_b += m_b * p;
                    w_b += i_b * cross(vcp.r_b, p);
                }
            } else {
                let mut body_velocities = [v_a, v_b];
                let mut body_spins = [w_a, w_b];
                solve_block(vc, &mut body_velocities, &mut body_spins);
                [v_a, v_b] = body_velocities;
                [w_a, w_b] = body_spins;
            }

            velocities[vc.index_a] = Velocity { v: v_a, w: w_a };
            velocities[vc.index_b] = Velocity { v: v_b, w: w_b };
        }
    }

    /// Write accumulated impulses back into the contacts for warm starting.
    pub fn store_impulses(&self, registry: &hecs::World) {
        for vc in &self.velocity_constraints {
            let Ok(mut contact) = vc.contact.get_mut(registry) else {
                continue;
            };
            for (mp, vcp) in contact
                .manifold
                .points_mut()
                .iter_mut()
                .zip(&vc.points[..vc.point_count])
            {
                mp.normal_impulse = vcp.normal_impulse;
                mp.tangent_impulse = vcp.tangent_impulse;
            }
        }
    }

    /// One NGS pass over all contacts. Returns true when the largest
    /// penetration is within three times the linear slop.
    pub fn solve_position_constraints(&self, positions: &mut [Position]) -> bool {
        let tol = self.tolerances;
        let mut min_separation: f32 = 0.0;

        for pc in &self.position_constraints {
            let separation = solve_position_constraint(
                pc,
                positions,
                (pc.inv_mass_a, pc.inv_i_a),
                (pc.inv_mass_b, pc.inv_i_b),
                tol.baumgarte,
                &tol,
            );
            min_separation = min_separation.min(separation);
        }

        min_separation >= -3.0 * tol.linear_slop
    }

    /// Position pass for a TOI sub-step: only the two TOI bodies move.
    pub fn solve_toi_position_constraints(
        &self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        let tol = self.tolerances;
        let mut min_separation: f32 = 0.0;

        let is_toi_body = |index: usize| index == toi_index_a || index == toi_index_b;

        for pc in &self.position_constraints {
            let body_a = if is_toi_body(pc.index_a) {
                (pc.inv_mass_a, pc.inv_i_a)
            } else {
                (0.0, 0.0)
            };
            let body_b = if is_toi_body(pc.index_b) {
                (pc.inv_mass_b, pc.inv_i_b)
            } else {
                (0.0, 0.0)
            };

            let separation =
                solve_position_constraint(pc, positions, body_a, body_b, tol.toi_baumgarte, &tol);
            min_separation = min_separation.min(separation);
        }

        min_separation >= -1.5 * tol.linear_slop
    }
}

fn body_transform(center: Vec2, angle: f32, local_center: Vec2) -> Transform {
    let q = Rot::new(angle);
    Transform {
        p: center - q.mul(local_center),
        q,
    }
}

/// Two-point normal solve as a linear complementarity problem. Each case
/// of the complementarity conditions is tried in turn.
fn solve_block(vc: &mut ContactVelocityConstraint, v: &mut [Vec2; 2], w: &mut [f32; 2]) {
    let (m_a, m_b) = (vc.inv_mass_a, vc.inv_mass_b);
    let (i_a, i_b) = (vc.inv_i_a, vc.inv_i_b);
    let normal = vc.normal;
    let cp1 = vc.points[0];
    let cp2 = vc.points[1];

    let a = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);
    debug_assert!(a.x >= 0.0 && a.y >= 0.0);

    let dv1 = v[1] + cross_sv(w[1], cp1.r_b) - v[0] - cross_sv(w[0], cp1.r_a);
    let dv2 = v[1] + cross_sv(w[1], cp2.r_b) - v[0] - cross_sv(w[0], cp2.r_a);
    let vn1 = dv1.dot(normal);
    let vn2 = dv2.dot(normal);

    let b = Vec2::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias) - vc.k * a;

    let mut apply = |x: Vec2| {
        let d = x - a;
        let p1 = d.x * normal;
        let p2 = d.y * normal;
        v[0] -= m_a * (p1 + p2);
        w[0] -= i_a * (cross(cp1.r_a, p1) + cross(cp2.r_a, p2));
        v[1] += m_b * (p1 + p2);
        w[1] += i_b * (cross(cp1.r_b, p1) + cross(cp2.r_b, p2));
        x
    };

    // Both points active.
    let x = -(vc.normal_matrix * b);
    let solution = if x.x >= 0.0 && x.y >= 0.0 {
        Some(apply(x))
    } else {
        // Only point 1 active.
        let x = Vec2::new(-cp1.normal_mass * b.x, 0.0);
        let vn2 = vc.k.x_axis.y * x.x + b.y;
        if x.x >= 0.0 && vn2 >= 0.0 {
            Some(apply(x))
        } else {
            // Only point 2 active.
            let x = Vec2::new(0.0, -cp2.normal_mass * b.y);
            let vn1 = vc.k.y_axis.x * x.y + b.x;
            if x.y >= 0.0 && vn1 >= 0.0 {
                Some(apply(x))
            } else if b.x >= 0.0 && b.y >= 0.0 {
                // Both separating.
                Some(apply(Vec2::ZERO))
            } else {
                // No solution; keep the previous impulses.
                None
            }
        }
    };

    if let Some(x) = solution {
        vc.points[0].normal_impulse = x.x;
        vc.points[1].normal_impulse = x.y;
    }
}

/// Contact plane for one point of a position constraint.
fn position_manifold(
    pc: &ContactPositionConstraint,
    xf_a: &Transform,
    xf_b: &Transform,
    index: usize,
) -> (Vec2, Vec2, f32) {
    match pc.kind {
        ManifoldType::Circles => {
            let point_a = xf_a.mul(pc.local_point);
            let point_b = xf_b.mul(pc.local_points[0]);
            let mut normal = point_b - point_a;
            normalize_mut(&mut normal);
            let point = 0.5 * (point_a + point_b);
            let separation = (point_b - point_a).dot(normal) - pc.radius_a - pc.radius_b;
            (normal, point, separation)
        }
        ManifoldType::FaceA => {
            let normal = xf_a.q.mul(pc.local_normal);
            let plane_point = xf_a.mul(pc.local_point);
            let clip_point = xf_b.mul(pc.local_points[index]);
            let separation = (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b;
            (normal, clip_point, separation)
        }
        ManifoldType::FaceB => {
            let normal = xf_b.q.mul(pc.local_normal);
            let plane_point = xf_b.mul(pc.local_point);
            let clip_point = xf_a.mul(pc.local_points[index]);
            let separation = (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b;
            // Keep the normal pointing from A to B.
            (-normal, clip_point, separation)
        }
    }
}

/// Push the two bodies apart along each contact normal. Returns the most
/// negative separation seen.
fn solve_position_constraint(
    pc: &ContactPositionConstraint,
    positions: &mut [Position],
    (m_a, i_a): (f32, f32),
    (m_b, i_b): (f32, f32),
    baumgarte: f32,
    tol: &Tolerances,
) -> f32 {
    let Position { c: mut c_a, a: mut a_a } = positions[pc.index_a];
    let Position { c: mut c_b, a: mut a_b } = positions[pc.index_b];
    let mut min_separation = 0.0f32;

    for j in 0..pc.point_count {
        let xf_a = body_transform(c_a, a_a, pc.local_center_a);
        let xf_b = body_transform(c_b, a_b, pc.local_center_b);

        let (normal, point, separation) = position_manifold(pc, &xf_a, &xf_b, j);
        let r_a = point - c_a;
        let r_b = point - c_b;

        min_separation = min_separation.min(separation);

        // Prevent large corrections and allow slop.
        let c = (baumgarte * (separation + tol.linear_slop)).clamp(-tol.max_linear_correction, 0.0);

        let rn_a = cross(r_a, normal);
        let rn_b = cross(r_b, normal);
        let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
        let impulse = if k > 0.0 { -c / k } else { 0.0 };

        let p = impulse * normal;
        c_a -= m_a * p;
        a_a -= i_a * cross(r_a, p);
        c_b += m_b * p;
        a_b += i_b * cross(r_b, p);
    }

    positions[pc.index_a] = Position { c: c_a, a: a_a };
    positions[pc.index_b] = Position { c: c_b, a: a_b };
    min_separation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::collide::collide;
    use crate::collision::shapes::{PolygonShape, Shape};

    fn step() -> TimeStep {
        TimeStep {
            dt: 1.0 / 60.0,
            inv_dt: 60.0,
            dt_ratio: 1.0,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
        }
    }

    /// Unit box resting on a wide static box, overlapping by `depth`.
    fn box_on_ground(depth: f32) -> (ContactSolverInput, Vec<Position>) {
        let ground: Shape = PolygonShape::new_box(5.0, 0.5).unwrap().into();
        let block: Shape = PolygonShape::new_box(0.5, 0.5).unwrap().into();
        let y = 1.0 - depth;
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(0.0, y), 0.0);
        let manifold = collide(&ground, 0, &xf_a, &block, &xf_b);
        assert_eq!(manifold.point_count, 2);

        let mut world = hecs::World::new();
        let input = ContactSolverInput {
            contact: ContactHandle(world.spawn(())),
            manifold,
            friction: 0.6,
            restitution: 0.0,
            tangent_speed: 0.0,
            index_a: 0,
            index_b: 1,
            inv_mass_a: 0.0,
            inv_mass_b: 1.0,
            inv_i_a: 0.0,
            inv_i_b: 6.0,
            local_center_a: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            radius_a: ground.radius(),
            radius_b: block.radius(),
        };
        let positions = vec![
            Position {
                c: Vec2::ZERO,
                a: 0.0,
            },
            Position {
                c: Vec2::new(0.0, y),
                a: 0.0,
            },
        ];
        (input, positions)
    }

    #[test]
    fn test_falling_box_is_stopped() {
        let (input, positions) = box_on_ground(0.0);
        let mut velocities = vec![
            Velocity::default(),
            Velocity {
                v: Vec2::new(0.0, -3.0),
                w: 0.0,
            },
        ];
        let mut solver = ContactSolver::new(&step(), &WorldConfig::default(), vec![input]);
        solver.initialize_velocity_constraints(&positions, &velocities);
        solver.warm_start(&mut velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut velocities);
        }

        let v = velocities[1].v;
        assert!(v.y.abs() < 1e-3, "normal velocity not removed: {}", v.y);
        assert!(velocities[1].w.abs() < 1e-3, "spin = {}", velocities[1].w);
        assert_eq!(velocities[0].v, Vec2::ZERO);
        for vcp in &solver.velocity_constraints[0].points[..2] {
            assert!(vcp.normal_impulse >= 0.0);
        }
    }

    #[test]
    fn test_friction_bounded_by_normal_impulse() {
        let (input, positions) = box_on_ground(0.0);
        let mut velocities = vec![
            Velocity::default(),
            Velocity {
                v: Vec2::new(10.0, -1.0),
                w: 0.0,
            },
        ];
        let mut solver = ContactSolver::new(&step(), &WorldConfig::default(), vec![input]);
        solver.initialize_velocity_constraints(&positions, &velocities);
        // Friction is clamped by the previous iteration's normal impulse;
        // iterate long enough for the normal impulses to settle.
        for _ in 0..50 {
            solver.solve_velocity_constraints(&mut velocities);
        }

        let vc = &solver.velocity_constraints[0];
        for vcp in &vc.points[..vc.point_count] {
            assert!(
                vcp.tangent_impulse.abs() <= vc.friction * vcp.normal_impulse + 1e-2,
                "friction {} exceeds cone {}",
                vcp.tangent_impulse,
                vc.friction * vcp.normal_impulse
            );
        }
        // Sliding continues: friction cannot absorb 10 m/s from a 1 m/s impact.
        assert!(velocities[1].v.x > 1.0);
    }

    #[test]
    fn test_position_correction_reduces_penetration() {
        let (input, mut positions) = box_on_ground(0.1);
        let solver = ContactSolver::new(&step(), &WorldConfig::default(), vec![input]);
        let start = positions[1].c.y;
        let mut solved = false;
        for _ in 0..20 {
            solved = solver.solve_position_constraints(&mut positions);
            if solved {
                break;
            }
        }
        assert!(solved);
        assert!(positions[1].c.y > start);
        assert_eq!(positions[0].c, Vec2::ZERO);
    }

    #[test]
    fn test_restitution_above_threshold() {
        let (mut input, positions) = box_on_ground(0.0);
        input.restitution = 1.0;
        let mut velocities = vec![
            Velocity::default(),
            Velocity {
                v: Vec2::new(0.0, -4.0),
                w: 0.0,
            },
        ];
        let mut solver = ContactSolver::new(&step(), &WorldConfig::default(), vec![input]);
        solver.initialize_velocity_constraints(&positions, &velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut velocities);
        }
        assert!(
            (velocities[1].v.y - 4.0).abs() < 1e-2,
            "bounce velocity = {}",
            velocities[1].v.y
        );
    }
}
