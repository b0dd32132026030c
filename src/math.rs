//! Geometry primitives and floating-point-tolerant predicates.
//!
//! Everything in this module is pure: 3-vectors, the affine transform used to
//! place room boundaries in the world, infinite mirror planes, and the
//! equality predicates shared by plane deduplication and reflection-path
//! validation.

use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub};
use serde::{Deserialize, Serialize};

/// Shared tolerance for all geometric comparisons.
///
/// The same constant drives plane deduplication during extraction and plane
/// matching during path validation; using two tolerances would let a plane
/// merge under one test and fail the other.
pub const EPSILON: f64 = 1e-5;

/// A 3D vector / point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Unit vector in the same direction; the zero vector maps to itself.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len == 0.0 { self } else { self / len }
    }

    pub fn distance_to(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Mirror this point across the plane `x · normal = offset`.
    pub fn mirror_across(self, normal: Vec3, offset: f64) -> Self {
        self - 2.0 * (self.dot(normal) - offset) * normal
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Vec3 {
        rhs * self
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

/// Row-major 3x3 matrix, the linear part of a boundary transform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mat3 {
    m: [[f64; 3]; 3],
}

impl Mat3 {
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub const fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self { m: rows }
    }

    pub const fn from_scale(scale: Vec3) -> Self {
        Self {
            m: [
                [scale.x, 0.0, 0.0],
                [0.0, scale.y, 0.0],
                [0.0, 0.0, scale.z],
            ],
        }
    }

    /// Rotation about the +y axis by `angle` radians.
    pub fn from_rotation_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            m: [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]],
        }
    }

    pub fn transpose(self) -> Self {
        let m = self.m;
        Self {
            m: [
                [m[0][0], m[1][0], m[2][0]],
                [m[0][1], m[1][1], m[2][1]],
                [m[0][2], m[1][2], m[2][2]],
            ],
        }
    }

    pub fn determinant(self) -> f64 {
        let m = self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Matrix inverse via the adjugate. A singular basis (degenerate
    /// geometry) yields non-finite entries rather than an error.
    pub fn inverse(self) -> Self {
        let m = self.m;
        let inv_det = 1.0 / self.determinant();
        Self {
            m: [
                [
                    (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
                    (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
                    (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
                ],
                [
                    (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
                    (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
                    (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
                ],
                [
                    (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
                    (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
                    (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
                ],
            ],
        }
    }
}

impl Mul<Vec3> for Mat3 {
    type Output = Vec3;
    fn mul(self, v: Vec3) -> Vec3 {
        let m = self.m;
        Vec3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }
}

impl Mul<Mat3> for Mat3 {
    type Output = Mat3;
    fn mul(self, rhs: Mat3) -> Mat3 {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = self.m[i][0] * rhs.m[0][j]
                    + self.m[i][1] * rhs.m[1][j]
                    + self.m[i][2] * rhs.m[2][j];
            }
        }
        Mat3 { m: out }
    }
}

/// Affine world transform of a room boundary: a linear basis plus a
/// translation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub basis: Mat3,
    pub origin: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        basis: Mat3::IDENTITY,
        origin: Vec3::ZERO,
    };

    pub const fn new(basis: Mat3, origin: Vec3) -> Self {
        Self { basis, origin }
    }

    pub const fn from_translation(origin: Vec3) -> Self {
        Self {
            basis: Mat3::IDENTITY,
            origin,
        }
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.basis * p + self.origin
    }

    /// Inverse-transpose of the basis, the correct map for surface normals
    /// under non-uniform scale. Results still need normalization.
    pub fn normal_matrix(&self) -> Mat3 {
        self.basis.inverse().transpose()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// An infinite reflecting plane: a point on the plane and its unit normal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub point: Vec3,
    pub normal: Vec3,
}

impl Plane {
    pub const fn new(point: Vec3, normal: Vec3) -> Self {
        Self { point, normal }
    }

    /// Signed distance of the plane from the origin along its normal.
    pub fn offset(&self) -> f64 {
        self.point.dot(self.normal)
    }
}

/// Test whether two unit vectors point in the same direction.
pub fn direction_equal(u1: Vec3, u2: Vec3) -> bool {
    u1.dot(u2) > 1.0 - EPSILON
}

/// Test whether two positions coincide.
pub fn position_equal(p1: Vec3, p2: Vec3) -> bool {
    (p1 - p2).length() < EPSILON
}

/// Test whether the planes through `p1` and `p2` with normals `n1` and `n2`
/// are the same plane.
pub fn planes_equal(p1: Vec3, n1: Vec3, p2: Vec3, n2: Vec3) -> bool {
    direction_equal(n1, n2) && (p1.dot(n1) - p2.dot(n1)).abs() < EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_is_involutive() {
        let n = Vec3::new(0.0, 1.0, 0.0);
        let d = 2.5;
        let p = Vec3::new(0.3, -1.7, 4.2);

        let mirrored = p.mirror_across(n, d);
        assert!((mirrored.y - 6.7).abs() < 1e-12);

        let back = mirrored.mirror_across(n, d);
        assert!(position_equal(p, back));
    }

    #[test]
    fn test_mirror_across_tilted_plane() {
        let n = Vec3::new(1.0, 1.0, 0.0).normalized();
        let point_on_plane = Vec3::new(1.0, 0.0, 0.0);
        let d = point_on_plane.dot(n);

        // A point on the plane mirrors to itself
        let fixed = point_on_plane.mirror_across(n, d);
        assert!(position_equal(fixed, point_on_plane));

        let p = Vec3::new(2.0, 3.0, -1.0);
        let back = p.mirror_across(n, d).mirror_across(n, d);
        assert!(position_equal(p, back));
    }

    #[test]
    fn test_direction_equal_tolerance() {
        let u = Vec3::new(0.0, 0.0, 1.0);
        assert!(direction_equal(u, u));

        // A rotation well past the tolerance must not compare equal
        let tilted = Vec3::new(0.01, 0.0, 1.0).normalized();
        assert!(!direction_equal(u, tilted));

        // Opposite directions are different planes, not duplicates
        assert!(!direction_equal(u, -u));
    }

    #[test]
    fn test_position_equal_tolerance() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert!(position_equal(p, p));
        assert!(position_equal(p, p + Vec3::new(1e-7, 0.0, 0.0)));
        assert!(!position_equal(p, p + Vec3::new(1e-3, 0.0, 0.0)));
    }

    #[test]
    fn test_planes_equal_same_plane_different_points() {
        // Two points on the z = 1 plane describe the same plane
        let n = Vec3::new(0.0, 0.0, 1.0);
        let p1 = Vec3::new(0.0, 0.0, 1.0);
        let p2 = Vec3::new(5.0, -3.0, 1.0);
        assert!(planes_equal(p1, n, p2, n));

        // Parallel but offset planes are distinct
        let p3 = Vec3::new(0.0, 0.0, 1.5);
        assert!(!planes_equal(p1, n, p3, n));
    }

    #[test]
    fn test_mat3_inverse_roundtrip() {
        let m = Mat3::from_rows([[2.0, 1.0, 0.0], [0.0, 3.0, 1.0], [1.0, 0.0, 2.0]]);
        let inv = m.inverse();
        for v in [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-2.0, 5.0, 0.5),
            Vec3::new(0.1, 0.2, 0.3),
        ] {
            let back = inv * (m * v);
            assert!((back - v).length() < 1e-12);
        }
    }

    #[test]
    fn test_normal_matrix_non_uniform_scale() {
        // Stretching a surface along x leaves an x-facing normal intact but
        // requires the inverse-transpose for anything slanted.
        let t = Transform::new(Mat3::from_scale(Vec3::new(2.0, 1.0, 1.0)), Vec3::ZERO);
        let nm = t.normal_matrix();

        let slanted = Vec3::new(1.0, 1.0, 0.0).normalized();
        let mapped = (nm * slanted).normalized();

        // The transformed surface is flatter, so its normal leans toward y
        assert!(mapped.y > mapped.x);

        // Tangent of the stretched surface stays perpendicular to the mapped normal
        let tangent = t.transform_point(Vec3::new(1.0, -1.0, 0.0));
        assert!(mapped.dot(tangent).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_y_transform() {
        let t = Transform::new(Mat3::from_rotation_y(std::f64::consts::FRAC_PI_2), Vec3::ZERO);
        let p = t.transform_point(Vec3::new(1.0, 0.0, 0.0));
        assert!(position_equal(p, Vec3::new(0.0, 0.0, -1.0)));
    }
}
