//! Point location and sensor-frame transforms.
//!
//! [`SpatialQuery`] borrows a closed model together with the registry and the
//! [`SensorTable`].  Every query clones a fresh [`Navigator`], so queries have
//! no shared mutable state and a `SpatialQuery` can be used from several
//! threads at once.
//!
//! # Frame selection
//!
//! Sensor-frame operations (`local_to_global`, the vector variants and
//! `global_to_local_in`) select the frame by locating the plane's own centre.
//! For non-overlapping planes this is the plane's node.

use std::collections::HashMap;

use telgeo_geometry::{GeoModel, Navigator, NodeId, NodeRef, Transform3D, Vec3};
use telgeo_types::{GeoError, SensorId};
use tracing::debug;

use crate::registry::PlaneRegistry;

// ────────────────────────────────────────────────────────────────────────────
// SensorTable
// ────────────────────────────────────────────────────────────────────────────

/// Placed node ↔ sensor ID, derived from node copy numbers.
#[derive(Debug, Clone, Default)]
pub struct SensorTable {
    by_node: HashMap<NodeId, SensorId>,
    by_sensor: HashMap<SensorId, NodeId>,
}

impl SensorTable {
    /// Map every node placed directly in the top volume whose copy number is
    /// a registered sensor ID.  Nested nodes are not sensors.
    pub fn from_model(model: &GeoModel, registry: &PlaneRegistry) -> Self {
        let mut table = Self::default();
        let Some(top) = model.top_volume() else {
            return table;
        };
        for id in &top.daughters {
            let Some(node) = model.node(*id) else { continue };
            if registry.contains(node.copy_number) {
                table.by_node.insert(*id, node.copy_number);
                table.by_sensor.entry(node.copy_number).or_insert(*id);
            }
        }
        table
    }

    pub fn sensor_of(&self, node: NodeId) -> Option<SensorId> {
        self.by_node.get(&node).copied()
    }

    pub fn node_of(&self, sensor: SensorId) -> Option<NodeId> {
        self.by_sensor.get(&sensor).copied()
    }

    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SpatialQuery
// ────────────────────────────────────────────────────────────────────────────

/// Read-only geometric queries over a closed model.
#[derive(Debug, Clone)]
pub struct SpatialQuery<'a> {
    registry: &'a PlaneRegistry,
    sensors: &'a SensorTable,
    navigator: Navigator<'a>,
}

impl<'a> SpatialQuery<'a> {
    /// # Errors
    ///
    /// [`GeoError::ModelOpen`] when `model` has not been closed.
    pub fn new(
        model: &'a GeoModel,
        registry: &'a PlaneRegistry,
        sensors: &'a SensorTable,
    ) -> Result<Self, GeoError> {
        Ok(Self {
            registry,
            sensors,
            navigator: Navigator::new(model)?,
        })
    }

    /// A navigator located at `point`.
    fn locate(&self, point: Vec3) -> Navigator<'a> {
        let mut nav = self.navigator.clone();
        nav.find_node(point);
        nav
    }

    /// A navigator located at the centre of sensor `id`.
    fn locate_sensor(&self, id: SensorId) -> Option<Navigator<'a>> {
        let centre = self.registry.position(id)?;
        Some(self.locate(centre))
    }

    /// Sensor whose volume contains `point`.
    ///
    /// `None` in world air, outside the world, or in a node that is not a
    /// registered sensor.
    pub fn sensor_id_at(&self, point: Vec3) -> Option<SensorId> {
        let nav = self.locate(point);
        let found = match nav.current_node() {
            NodeRef::Daughter(node) if !nav.is_outside() => self.sensors.sensor_of(node),
            _ => None,
        };
        debug!(?point, path = %nav.path_name(), sensor = ?found, "sensor lookup");
        found
    }

    /// Sensor-local point → global point.  `None` for an unknown sensor.
    pub fn local_to_global(&self, id: SensorId, local: Vec3) -> Option<Vec3> {
        self.locate_sensor(id).map(|nav| nav.local_to_master(local))
    }

    /// Global point → local frame of whichever node contains it.  Points in
    /// world air or outside the world are returned unchanged.
    pub fn global_to_local(&self, point: Vec3) -> Vec3 {
        self.locate(point).master_to_local(point)
    }

    /// Global point → local frame of sensor `id`, wherever the point lies.
    pub fn global_to_local_in(&self, id: SensorId, point: Vec3) -> Option<Vec3> {
        self.locate_sensor(id).map(|nav| nav.master_to_local(point))
    }

    /// Direction in the frame of sensor `id` → global direction.
    pub fn local_to_global_vec(&self, id: SensorId, v: Vec3) -> Option<Vec3> {
        self.locate_sensor(id).map(|nav| nav.local_to_master_vect(v))
    }

    /// Global direction → frame of sensor `id`.
    pub fn global_to_local_vec(&self, id: SensorId, v: Vec3) -> Option<Vec3> {
        self.locate_sensor(id).map(|nav| nav.master_to_local_vect(v))
    }

    /// Global placement of the node containing `point`; identity in world
    /// air and outside the world.
    pub fn transform_at(&self, point: Vec3) -> Transform3D {
        self.locate(point).current_matrix()
    }

    /// Global placement of sensor `id`.
    pub fn sensor_transform(&self, id: SensorId) -> Option<Transform3D> {
        self.locate_sensor(id).map(|nav| nav.current_matrix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_model;
    use crate::source::{LayerLayout, LayerRecord};
    use telgeo_types::Sentinel;

    fn registry() -> PlaneRegistry {
        let layers = vec![
            LayerRecord {
                id: 3,
                position: [1.0, -2.0, 0.0],
                rotation: [0.0, 0.0, 0.0],
                size: [20.0, 10.0, 0.3],
                radiation_length: 9.37,
            },
            LayerRecord {
                id: 7,
                position: [0.0, 0.0, 100.0],
                rotation: [0.01, -0.05, 0.3],
                size: [20.0, 10.0, 0.3],
                radiation_length: 9.37,
            },
        ];
        PlaneRegistry::from_layout(LayerLayout { layers, ..Default::default() }).unwrap()
    }

    fn fixture() -> (PlaneRegistry, GeoModel, SensorTable) {
        let reg = registry();
        let model = build_model(&reg, "query").unwrap();
        let table = SensorTable::from_model(&model, &reg);
        (reg, model, table)
    }

    #[test]
    fn sensor_table_uses_copy_numbers() {
        let (_, model, table) = fixture();
        assert_eq!(table.len(), 2);
        let node = table.node_of(7).unwrap();
        assert_eq!(model.node(node).unwrap().copy_number, 7);
        assert_eq!(table.sensor_of(node), Some(7));
        assert_eq!(table.node_of(99), None);
    }

    #[test]
    fn locate_sensor_centres_and_air() {
        let (reg, model, table) = fixture();
        let q = SpatialQuery::new(&model, &reg, &table).unwrap();

        assert_eq!(q.sensor_id_at(Vec3::new(1.0, -2.0, 0.0)), Some(3));
        assert_eq!(q.sensor_id_at(Vec3::new(0.0, 0.0, 100.0)), Some(7));
        assert_eq!(q.sensor_id_at(Vec3::new(0.0, 0.0, 50.0)).or_sentinel(), -999);
        assert_eq!(q.sensor_id_at(Vec3::new(0.0, 0.0, 9000.0)), None);
    }

    #[test]
    fn local_global_round_trip() {
        let (reg, model, table) = fixture();
        let q = SpatialQuery::new(&model, &reg, &table).unwrap();
        for id in [3, 7] {
            let p = Vec3::new(4.0, -3.0, 20.0);
            let local = q.global_to_local_in(id, p).unwrap();
            let back = q.local_to_global(id, local).unwrap();
            assert!(back.distance(p) < 1e-9, "sensor {id}: {back:?}");
        }
    }

    #[test]
    fn local_origin_maps_to_plane_centre() {
        let (reg, model, table) = fixture();
        let q = SpatialQuery::new(&model, &reg, &table).unwrap();
        let g = q.local_to_global(3, Vec3::zero()).unwrap();
        assert!(g.distance(Vec3::new(1.0, -2.0, 0.0)) < 1e-12);
        // Unrotated plane: local axes are global axes.
        let g = q.local_to_global(3, Vec3::new(1.0, 1.0, 0.0)).unwrap();
        assert!(g.distance(Vec3::new(2.0, -1.0, 0.0)) < 1e-12);
        assert!(q.local_to_global(42, Vec3::zero()).is_none());
    }

    #[test]
    fn global_to_local_uses_containing_node() {
        let (reg, model, table) = fixture();
        let q = SpatialQuery::new(&model, &reg, &table).unwrap();
        let local = q.global_to_local(Vec3::new(2.0, -1.0, 0.1));
        assert!(local.distance(Vec3::new(1.0, 1.0, 0.1)) < 1e-12);
        // World air: identity.
        let p = Vec3::new(0.0, 0.0, 50.0);
        assert_eq!(q.global_to_local(p), p);
        assert_eq!(q.transform_at(p), Transform3D::identity());
    }

    #[test]
    fn vector_variants_ignore_translation() {
        let (reg, model, table) = fixture();
        let q = SpatialQuery::new(&model, &reg, &table).unwrap();
        let v = Vec3::new(0.0, 0.0, 1.0);
        assert!(q.local_to_global_vec(3, v).unwrap().distance(v) < 1e-12);
        let g = q.local_to_global_vec(7, v).unwrap();
        assert!((g.norm() - 1.0).abs() < 1e-12);
        let back = q.global_to_local_vec(7, g).unwrap();
        assert!(back.distance(v) < 1e-12);
        assert!(q.global_to_local_vec(1234, v).is_none());
    }

    #[test]
    fn transform_at_sensor_matches_sensor_transform() {
        let (reg, model, table) = fixture();
        let q = SpatialQuery::new(&model, &reg, &table).unwrap();
        let t = q.transform_at(Vec3::new(0.0, 0.0, 100.0));
        assert_eq!(Some(t), q.sensor_transform(7));
        assert!((t.to_homogeneous()[2][3] - 100.0).abs() < 1e-12);
    }
}
