//! Solid shapes and bounding boxes.
//!
//! # Key types
//!
//! | Type | Role |
//! |------|------|
//! | [`BoxShape`] | Box centred on its local origin, given by half-extents. |
//! | [`Aabb`]     | Axis-aligned bounding box in a mother frame.           |
//!
//! Distances along a ray are computed in the shape's local frame; the
//! navigator transforms points and directions before calling in.

use serde::{Deserialize, Serialize};

use crate::transform::{Transform3D, Vec3};

// ────────────────────────────────────────────────────────────────────────────
// BoxShape
// ────────────────────────────────────────────────────────────────────────────

/// An axis-aligned box in its own frame, `[-dx, dx] × [-dy, dy] × [-dz, dz]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxShape {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl BoxShape {
    /// Create a box from its half-extents.
    pub fn new(dx: f64, dy: f64, dz: f64) -> Self {
        Self { dx, dy, dz }
    }

    /// Create a box from full sizes along each axis.
    pub fn from_size(size: Vec3) -> Self {
        Self::new(size.x / 2.0, size.y / 2.0, size.z / 2.0)
    }

    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(self.dx, self.dy, self.dz)
    }

    /// True when the local point lies inside or on the surface.
    pub fn contains(&self, p: Vec3) -> bool {
        p.x.abs() <= self.dx && p.y.abs() <= self.dy && p.z.abs() <= self.dz
    }

    /// Distance along `dir` from an interior point `p` to the surface.
    ///
    /// Returns `0.0` when the point already sits on (or past) the face the
    /// ray is heading for.
    pub fn dist_out(&self, p: Vec3, dir: Vec3) -> f64 {
        let h = self.half_extents().to_array();
        let p = p.to_array();
        let d = dir.to_array();
        let mut best = f64::INFINITY;
        for axis in 0..3 {
            let t = if d[axis] > 0.0 {
                (h[axis] - p[axis]) / d[axis]
            } else if d[axis] < 0.0 {
                (-h[axis] - p[axis]) / d[axis]
            } else {
                continue;
            };
            best = best.min(t);
        }
        best.max(0.0)
    }

    /// Distance along `dir` from `p` to the first surface crossing into the
    /// box, or `None` when the ray misses it.
    ///
    /// Slab test; a point already inside yields `Some(0.0)`.
    pub fn dist_in(&self, p: Vec3, dir: Vec3) -> Option<f64> {
        let h = self.half_extents().to_array();
        let p = p.to_array();
        let d = dir.to_array();
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        for axis in 0..3 {
            if d[axis] == 0.0 {
                if p[axis].abs() > h[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d[axis];
            let t1 = (-h[axis] - p[axis]) * inv;
            let t2 = (h[axis] - p[axis]) * inv;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }
        if t_max >= t_min && t_max > 0.0 {
            Some(t_min.max(0.0))
        } else {
            None
        }
    }

    /// Bounding box of this shape once placed by `placement`.
    pub fn bounding_box(&self, placement: &Transform3D) -> Aabb {
        let mut corners = Vec::with_capacity(8);
        for sx in [-1.0, 1.0] {
            for sy in [-1.0, 1.0] {
                for sz in [-1.0, 1.0] {
                    let c = Vec3::new(sx * self.dx, sy * self.dy, sz * self.dz);
                    corners.push(placement.local_to_master(c));
                }
            }
        }
        Aabb::enclosing(&corners)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Aabb
// ────────────────────────────────────────────────────────────────────────────

/// An axis-aligned bounding box, defined by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create a bounding box from its two opposite corners.
    ///
    /// The constructor normalises the corners so that `min ≤ max` per axis.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Smallest box enclosing every point in `points`.
    pub fn enclosing(points: &[Vec3]) -> Self {
        let init = Self {
            min: Vec3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Vec3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        };
        points.iter().fold(init, |acc, p| Self {
            min: Vec3::new(acc.min.x.min(p.x), acc.min.y.min(p.y), acc.min.z.min(p.z)),
            max: Vec3::new(acc.max.x.max(p.x), acc.max.y.max(p.y), acc.max.z.max(p.z)),
        })
    }

    /// True when the point lies inside or on the boundary of the box.
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// True when `other` overlaps this box with a non-zero volume.  Boxes
    /// that only touch do not count.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }
}
