//! 2D rigid transforms, sweeps, and small linear-algebra helpers on glam types.

use glam::{Mat2, Mat3, Vec2, Vec3};

/// Machine epsilon used by the geometry routines.
pub const EPSILON: f32 = f32::EPSILON;

/// 2D cross product of two vectors (a scalar).
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.perp_dot(b)
}

/// Cross product of a vector and a scalar: `v x s`.
#[inline]
pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Cross product of a scalar and a vector: `s x v`.
#[inline]
pub fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Normalize `v` in place, returning its previous length. Vectors shorter than
/// [`EPSILON`] are left unchanged and report zero.
#[inline]
pub fn normalize_mut(v: &mut Vec2) -> f32 {
    let length = v.length();
    if length < EPSILON {
        return 0.0;
    }
    *v /= length;
    length
}

/// Solve `m * x = b` for a 2x2 matrix. A singular matrix yields a zero-scaled answer.
#[inline]
pub fn solve22(m: &Mat2, b: Vec2) -> Vec2 {
    let (a11, a21) = (m.x_axis.x, m.x_axis.y);
    let (a12, a22) = (m.y_axis.x, m.y_axis.y);
    let mut det = a11 * a22 - a12 * a21;
    if det != 0.0 {
        det = 1.0 / det;
    }
    Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
}

/// Inverse of a 2x2 matrix, or zero if it is singular.
#[inline]
pub fn inverse22(m: &Mat2) -> Mat2 {
    let det = m.determinant();
    if det == 0.0 {
        return Mat2::ZERO;
    }
    m.inverse()
}

/// Solve `m * x = b` for a 3x3 matrix using Cramer's rule.
pub fn solve33(m: &Mat3, b: Vec3) -> Vec3 {
    let (ex, ey, ez) = (m.x_axis, m.y_axis, m.z_axis);
    let mut det = ex.dot(ey.cross(ez));
    if det != 0.0 {
        det = 1.0 / det;
    }
    Vec3::new(
        det * b.dot(ey.cross(ez)),
        det * ex.dot(b.cross(ez)),
        det * ex.dot(ey.cross(b)),
    )
}

/// Solve the upper-left 2x2 block of `m` against `b`.
pub fn solve33_block22(m: &Mat3, b: Vec2) -> Vec2 {
    let block = Mat2::from_cols(m.x_axis.truncate(), m.y_axis.truncate());
    solve22(&block, b)
}

/// Inverse of the upper-left 2x2 block, embedded in a 3x3 with zeros elsewhere.
pub fn inverse22_of33(m: &Mat3) -> Mat3 {
    let (a, b) = (m.x_axis.x, m.y_axis.x);
    let (c, d) = (m.x_axis.y, m.y_axis.y);
    let mut det = a * d - b * c;
    if det != 0.0 {
        det = 1.0 / det;
    }
    Mat3::from_cols(
        Vec3::new(det * d, -det * c, 0.0),
        Vec3::new(-det * b, det * a, 0.0),
        Vec3::ZERO,
    )
}

/// Symmetric inverse of a 3x3 matrix, or zero if it is singular.
pub fn sym_inverse33(m: &Mat3) -> Mat3 {
    let (ex, ey, ez) = (m.x_axis, m.y_axis, m.z_axis);
    let mut det = ex.dot(ey.cross(ez));
    if det != 0.0 {
        det = 1.0 / det;
    }

    let (a11, a12, a13) = (ex.x, ey.x, ez.x);
    let (a22, a23) = (ey.y, ez.y);
    let a33 = ez.z;

    let m11 = det * (a22 * a33 - a23 * a23);
    let m12 = det * (a13 * a23 - a12 * a33);
    let m13 = det * (a12 * a23 - a13 * a22);
    let m22 = det * (a11 * a33 - a13 * a13);
    let m23 = det * (a13 * a12 - a11 * a23);
    let m33 = det * (a11 * a22 - a12 * a12);

    Mat3::from_cols(
        Vec3::new(m11, m12, m13),
        Vec3::new(m12, m22, m23),
        Vec3::new(m13, m23, m33),
    )
}

/// A rotation stored as sine/cosine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rot {
    pub s: f32,
    pub c: f32,
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rot {
    pub const IDENTITY: Self = Self { s: 0.0, c: 1.0 };

    /// Rotation from an angle in radians.
    #[inline]
    pub fn new(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { s, c }
    }

    #[inline]
    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    #[inline]
    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    #[inline]
    pub fn y_axis(&self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Rotate a vector.
    #[inline]
    pub fn mul(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse-rotate a vector.
    #[inline]
    pub fn mul_t(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Compose two rotations: `self * r`.
    #[inline]
    pub fn mul_rot(&self, r: &Rot) -> Rot {
        Rot {
            s: self.s * r.c + self.c * r.s,
            c: self.c * r.c - self.s * r.s,
        }
    }

    /// `transpose(self) * r`.
    #[inline]
    pub fn mul_t_rot(&self, r: &Rot) -> Rot {
        Rot {
            s: self.c * r.s - self.s * r.c,
            c: self.c * r.c + self.s * r.s,
        }
    }
}

/// A rigid 2D transform: translation plus rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    #[inline]
    pub fn new(position: Vec2, angle: f32) -> Self {
        Self {
            p: position,
            q: Rot::new(angle),
        }
    }

    /// Transform a point from local to world space.
    #[inline]
    pub fn mul(&self, v: Vec2) -> Vec2 {
        self.q.mul(v) + self.p
    }

    /// Transform a point from world to local space.
    #[inline]
    pub fn mul_t(&self, v: Vec2) -> Vec2 {
        self.q.mul_t(v - self.p)
    }

    /// Compose transforms: `self * b`.
    #[inline]
    pub fn mul_xf(&self, b: &Transform) -> Transform {
        Transform {
            q: self.q.mul_rot(&b.q),
            p: self.q.mul(b.p) + self.p,
        }
    }

    /// `inverse(self) * b`.
    #[inline]
    pub fn mul_t_xf(&self, b: &Transform) -> Transform {
        Transform {
            q: self.q.mul_t_rot(&b.q),
            p: self.q.mul_t(b.p - self.p),
        }
    }
}

/// Motion of a body's center of mass over one step, used for continuous collision.
///
/// `c0`/`a0` are the pose at time `alpha0`, `c`/`a` the pose at time 1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sweep {
    /// Center of mass in body-local coordinates.
    pub local_center: Vec2,
    pub c0: Vec2,
    pub c: Vec2,
    pub a0: f32,
    pub a: f32,
    /// Fraction of the current step in `[0, 1)` that `c0`/`a0` correspond to.
    pub alpha0: f32,
}

impl Sweep {
    /// Interpolated body transform at `beta` in `[0, 1]`.
    pub fn transform_at(&self, beta: f32) -> Transform {
        let center = (1.0 - beta) * self.c0 + beta * self.c;
        let angle = (1.0 - beta) * self.a0 + beta * self.a;
        let q = Rot::new(angle);
        Transform {
            p: center - q.mul(self.local_center),
            q,
        }
    }

    /// Move the start of the sweep forward to `alpha`.
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += beta * (self.c - self.c0);
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Wrap the angles back into `[-pi, pi]` around `a0`.
    pub fn normalize(&mut self) {
        let two_pi = std::f32::consts::TAU;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}
