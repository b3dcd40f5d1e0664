//! Rigid-body transforms.
//!
//! Every placed volume carries a [`Transform3D`] mapping points from its own
//! (local) frame into the frame of its mother volume:
//!
//! ```text
//! master = R · local + t
//! ```
//!
//! Rotations are stored as row-major 3×3 matrices.  [`Rotation::from_euler_deg`]
//! follows the geometry-engine Euler convention (Z-X-Z, angles in degrees),
//! which is what the telescope builder uses to compose plane orientations.
//!
//! # Example
//!
//! ```rust
//! use telgeo_geometry::transform::{Rotation, Transform3D, Vec3};
//!
//! // Sensor 100 mm downstream, rotated 90° about Z.
//! let t = Transform3D::new(Vec3::new(0.0, 0.0, 100.0), Rotation::from_euler_deg(90.0, 0.0, 0.0));
//!
//! let g = t.local_to_master(Vec3::new(1.0, 0.0, 0.0));
//! assert!(g.x.abs() < 1e-12);
//! assert!((g.y - 1.0).abs() < 1e-12);
//! assert!((g.z - 100.0).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D point or direction vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Euclidean length.
    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Distance between two points.
    pub fn distance(self, other: Self) -> f64 {
        other.sub(self).norm()
    }

    /// Active rotation about the global X axis by `angle` radians.
    pub fn rotate_x(self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new(self.x, c * self.y - s * self.z, s * self.y + c * self.z)
    }

    /// Active rotation about the global Y axis by `angle` radians.
    pub fn rotate_y(self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new(s * self.z + c * self.x, self.y, c * self.z - s * self.x)
    }

    /// Active rotation about the global Z axis by `angle` radians.
    pub fn rotate_z(self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new(c * self.x - s * self.y, s * self.x + c * self.y, self.z)
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rotation
// ────────────────────────────────────────────────────────────────────────────

/// A 3×3 rotation matrix stored row-major.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    m: [f64; 9],
}

impl Default for Rotation {
    fn default() -> Self {
        Self::identity()
    }
}

impl Rotation {
    /// The identity rotation.
    pub const fn identity() -> Self {
        Self {
            m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Build from a row-major matrix.  The caller is responsible for
    /// orthonormality.
    pub const fn from_rows(m: [f64; 9]) -> Self {
        Self { m }
    }

    /// Euler rotation in the geometry-engine convention: `phi` about Z, then
    /// `theta` about the new X, then `psi` about the new Z.  Angles in degrees.
    pub fn from_euler_deg(phi: f64, theta: f64, psi: f64) -> Self {
        let (sinphi, cosphi) = phi.to_radians().sin_cos();
        let (sinthe, costhe) = theta.to_radians().sin_cos();
        let (sinpsi, cospsi) = psi.to_radians().sin_cos();
        Self {
            m: [
                cospsi * cosphi - costhe * sinphi * sinpsi,
                -sinpsi * cosphi - costhe * sinphi * cospsi,
                sinthe * sinphi,
                cospsi * sinphi + costhe * cosphi * sinpsi,
                -sinpsi * sinphi + costhe * cosphi * cospsi,
                -sinthe * cosphi,
                sinpsi * sinthe,
                cospsi * sinthe,
                costhe,
            ],
        }
    }

    /// Row-major matrix elements.
    pub fn matrix(&self) -> &[f64; 9] {
        &self.m
    }

    /// Matrix product `self · rhs` (apply `rhs` first, then `self`).
    pub fn multiply_by(self, rhs: Self) -> Self {
        let mut out = [0.0; 9];
        for i in 0..3 {
            for j in 0..3 {
                out[3 * i + j] = (0..3).map(|k| self.m[3 * i + k] * rhs.m[3 * k + j]).sum();
            }
        }
        Self { m: out }
    }

    /// Transpose (== inverse for an orthonormal matrix).
    pub fn transpose(self) -> Self {
        let m = self.m;
        Self {
            m: [m[0], m[3], m[6], m[1], m[4], m[7], m[2], m[5], m[8]],
        }
    }

    /// `R · v`
    pub fn apply(&self, v: Vec3) -> Vec3 {
        let m = &self.m;
        Vec3::new(
            m[0] * v.x + m[1] * v.y + m[2] * v.z,
            m[3] * v.x + m[4] * v.y + m[5] * v.z,
            m[6] * v.x + m[7] * v.y + m[8] * v.z,
        )
    }

    /// `Rᵀ · v`
    pub fn apply_inverse(&self, v: Vec3) -> Vec3 {
        let m = &self.m;
        Vec3::new(
            m[0] * v.x + m[3] * v.y + m[6] * v.z,
            m[1] * v.x + m[4] * v.y + m[7] * v.z,
            m[2] * v.x + m[5] * v.y + m[8] * v.z,
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A combined rotation + translation.
///
/// Maps a point expressed in a daughter frame into the mother frame: rotate
/// by `rotation`, then add `translation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Rotation,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform3D {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Rotation) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Rotation::identity())
    }

    /// Compose two transforms: `self` is the mother placement, `other` the
    /// daughter placement inside it.
    ///
    /// If `self` = T_world_A and `other` = T_A_B, the result is T_world_B.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.apply(other.translation));
        let rotated = self.rotation.multiply_by(other.rotation);
        Self::new(translated, rotated)
    }

    pub fn local_to_master(&self, p: Vec3) -> Vec3 {
        self.rotation.apply(p).add(self.translation)
    }

    pub fn master_to_local(&self, p: Vec3) -> Vec3 {
        self.rotation.apply_inverse(p.sub(self.translation))
    }

    /// Direction vectors ignore the translation.
    pub fn local_to_master_vect(&self, v: Vec3) -> Vec3 {
        self.rotation.apply(v)
    }

    pub fn master_to_local_vect(&self, v: Vec3) -> Vec3 {
        self.rotation.apply_inverse(v)
    }

    /// The 4×4 homogeneous matrix (row-major, last row `0 0 0 1`).
    pub fn to_homogeneous(&self) -> [[f64; 4]; 4] {
        let m = self.rotation.matrix();
        let t = self.translation;
        [
            [m[0], m[1], m[2], t.x],
            [m[3], m[4], m[5], t.y],
            [m[6], m[7], m[8], t.z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
