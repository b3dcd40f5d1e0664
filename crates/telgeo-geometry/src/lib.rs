//! `telgeo-geometry` – solid-geometry engine.
//!
//! A small engine covering what a tracking telescope needs:
//! box-shaped volumes placed inside one another, materials for radiation
//! length bookkeeping, and a navigator that can locate points and step a
//! straight track across volume boundaries.
//!
//! # Modules
//!
//! - [`transform`] – [`Vec3`][transform::Vec3], [`Rotation`][transform::Rotation]
//!   and [`Transform3D`][transform::Transform3D]: rigid-body placements and
//!   local ↔ master conversions.
//! - [`shape`] – [`BoxShape`][shape::BoxShape]: containment and ray distances;
//!   [`Aabb`][shape::Aabb] for overlap checks.
//! - [`material`] – [`Material`][material::Material] and
//!   [`Medium`][material::Medium].
//! - [`model`] – [`GeoModel`][model::GeoModel]: the volume tree, its closing
//!   step, and JSON import/export.
//! - [`navigator`] – [`Navigator`][navigator::Navigator]: per-query point
//!   location and boundary stepping over a closed model.

pub mod material;
pub mod model;
pub mod navigator;
pub mod shape;
pub mod transform;

pub use model::{GeoModel, NodeId, VolumeId};
pub use navigator::{Navigator, NodeRef};
pub use transform::{Rotation, Transform3D, Vec3};
