//! [`PlaneRegistry`] – per-plane parameters keyed by sensor ID.
//!
//! The registry is populated once from a [`DescriptionSource`] and is
//! read-only afterwards.  Planes keep their *discovery* order (source order,
//! with the optional DUT last); a separate [`ZOrderMap`] ranks them along the
//! beam axis.
//!
//! Lookups by an unknown sensor ID return `None` rather than failing:
//! callers routinely try many candidate IDs per event.

use std::collections::{BTreeMap, HashMap};

use telgeo_geometry::Vec3;
use telgeo_types::{GeoError, SensorId};
use tracing::{info, warn};

use crate::source::{DescriptionSource, LayerLayout};

/// Two planes whose z-positions differ by less than this share a z-order.
pub const Z_TOLERANCE: f64 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// Plane
// ────────────────────────────────────────────────────────────────────────────

/// One sensor layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub id: SensorId,
    /// Centre position (mm).
    pub position: Vec3,
    /// Rotation angles about x, y and z (rad).
    pub rotation: Vec3,
    /// Full extents; `size.z` is the thickness (mm).
    pub size: Vec3,
    /// cm
    pub radiation_length: f64,
    pub is_dut: bool,
}

impl Plane {
    /// Unit normal: (0,0,1) rotated about x, then y, then z.
    pub fn normal(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, 1.0)
            .rotate_x(self.rotation.x)
            .rotate_y(self.rotation.y)
            .rotate_z(self.rotation.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ZOrderMap
// ────────────────────────────────────────────────────────────────────────────

/// Bidirectional sensor ID ↔ z-order association.
///
/// Both directions are filled by the one constructor and never mutated
/// afterwards.  A plane's z-order is the number of other planes lying
/// upstream of it by more than [`Z_TOLERANCE`]; coincident planes share a
/// rank, in which case the rank → ID direction keeps the first one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZOrderMap {
    by_id: BTreeMap<SensorId, usize>,
    by_rank: BTreeMap<usize, SensorId>,
}

impl ZOrderMap {
    /// Rank `planes` along z.
    ///
    /// # Errors
    ///
    /// [`GeoError::InvalidDescription`] when a sensor ID occurs twice.
    pub fn from_planes(planes: &[Plane]) -> Result<Self, GeoError> {
        let mut map = Self::default();
        for plane in planes {
            let rank = planes
                .iter()
                .filter(|other| other.position.z + Z_TOLERANCE < plane.position.z)
                .count();
            if map.by_id.insert(plane.id, rank).is_some() {
                return Err(GeoError::InvalidDescription(format!(
                    "sensor ID {} is defined more than once",
                    plane.id
                )));
            }
            if let Some(first) = map.by_rank.get(&rank) {
                warn!(
                    sensor = plane.id,
                    coincident_with = *first,
                    z_order = rank,
                    "coincident planes share a z-order"
                );
            } else {
                map.by_rank.insert(rank, plane.id);
            }
        }
        Ok(map)
    }

    pub fn z_order_of(&self, id: SensorId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    pub fn id_at(&self, rank: usize) -> Option<SensorId> {
        self.by_rank.get(&rank).copied()
    }

    /// Sensor IDs in z-order.
    pub fn ids_by_z(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.by_rank.values().copied()
    }

    /// `(sensor ID, z-order)` pairs sorted by sensor ID.
    pub fn iter(&self) -> impl Iterator<Item = (SensorId, usize)> + '_ {
        self.by_id.iter().map(|(id, rank)| (*id, *rank))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PlaneRegistry
// ────────────────────────────────────────────────────────────────────────────

/// All telescope planes, keyed by sensor ID.
#[derive(Debug, Clone)]
pub struct PlaneRegistry {
    planes: Vec<Plane>,
    index: HashMap<SensorId, usize>,
    sensor_ids: Vec<SensorId>,
    z_order: ZOrderMap,
    magnetic_field: Vec3,
}

impl PlaneRegistry {
    /// Read every plane from `source`.
    ///
    /// The DUT, when present, is appended after the regular layers with a
    /// zero rotation: the description format has no field for it.
    ///
    /// # Errors
    ///
    /// Propagates [`GeoError::DescriptionUnavailable`] from the source and
    /// returns [`GeoError::InvalidDescription`] for duplicate IDs or
    /// non-finite parameters.
    pub fn load(source: &dyn DescriptionSource) -> Result<Self, GeoError> {
        let layout = source.layout()?;
        let registry = Self::from_layout(layout)?;
        info!(
            source = %source.name(),
            planes = registry.plane_count(),
            "plane registry loaded"
        );
        Ok(registry)
    }

    /// Build directly from an already-read layout.
    pub fn from_layout(layout: LayerLayout) -> Result<Self, GeoError> {
        let mut planes: Vec<Plane> = layout
            .layers
            .into_iter()
            .map(|l| Plane {
                id: l.id,
                position: l.position.into(),
                rotation: l.rotation.into(),
                size: l.size.into(),
                radiation_length: l.radiation_length,
                is_dut: false,
            })
            .collect();
        if let Some(dut) = layout.dut {
            planes.push(Plane {
                id: dut.id,
                position: dut.position.into(),
                rotation: Vec3::zero(),
                size: dut.size.into(),
                radiation_length: dut.radiation_length,
                is_dut: true,
            });
        }

        for plane in &planes {
            let vectors = [plane.position, plane.rotation, plane.size];
            let mut values = vectors
                .into_iter()
                .flat_map(Vec3::to_array)
                .chain([plane.radiation_length]);
            if values.any(|v| !v.is_finite()) {
                return Err(GeoError::InvalidDescription(format!(
                    "sensor {} has non-finite parameters",
                    plane.id
                )));
            }
            if plane.size.x < 0.0 || plane.size.y < 0.0 || plane.size.z < 0.0 {
                return Err(GeoError::InvalidDescription(format!(
                    "sensor {} has a negative size",
                    plane.id
                )));
            }
        }

        let z_order = ZOrderMap::from_planes(&planes)?;
        let index = planes.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
        let sensor_ids = planes.iter().map(|p| p.id).collect();

        Ok(Self {
            planes,
            index,
            sensor_ids,
            z_order,
            magnetic_field: layout.magnetic_field.into(),
        })
    }

    /// Total number of planes, DUT included.
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Planes in discovery order.
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn plane(&self, id: SensorId) -> Option<&Plane> {
        self.index.get(&id).map(|i| &self.planes[*i])
    }

    pub fn contains(&self, id: SensorId) -> bool {
        self.index.contains_key(&id)
    }

    /// Sensor IDs in discovery order (not z-order).
    pub fn sensor_ids(&self) -> &[SensorId] {
        &self.sensor_ids
    }

    pub fn position(&self, id: SensorId) -> Option<Vec3> {
        self.plane(id).map(|p| p.position)
    }

    pub fn rotation(&self, id: SensorId) -> Option<Vec3> {
        self.plane(id).map(|p| p.rotation)
    }

    pub fn size(&self, id: SensorId) -> Option<Vec3> {
        self.plane(id).map(|p| p.size)
    }

    pub fn radiation_length(&self, id: SensorId) -> Option<f64> {
        self.plane(id).map(|p| p.radiation_length)
    }

    pub fn plane_normal(&self, id: SensorId) -> Option<Vec3> {
        self.plane(id).map(Plane::normal)
    }

    pub fn z_order_of(&self, id: SensorId) -> Option<usize> {
        self.z_order.z_order_of(id)
    }

    pub fn id_at_z_order(&self, rank: usize) -> Option<SensorId> {
        self.z_order.id_at(rank)
    }

    pub fn z_order_map(&self) -> &ZOrderMap {
        &self.z_order
    }

    /// Every plane's z-position, ascending.
    pub fn z_positions(&self) -> Vec<f64> {
        let mut z: Vec<f64> = self.planes.iter().map(|p| p.position.z).collect();
        z.sort_by(f64::total_cmp);
        z
    }

    /// Constant field from the description (T).
    pub fn magnetic_field(&self) -> Vec3 {
        self.magnetic_field
    }
}
