//! Point location and ray stepping over a closed [`GeoModel`].
//!
//! A [`Navigator`] carries the transient state of one query: the current
//! point and direction, the path of placed nodes from the top volume down to
//! the current location, and the accumulated global matrix of that path.
//! The model itself is only borrowed, so any number of navigators can walk
//! the same model concurrently.
//!
//! # Example
//!
//! ```rust
//! use telgeo_geometry::material::{Material, Medium};
//! use telgeo_geometry::model::GeoModel;
//! use telgeo_geometry::navigator::{Navigator, NodeRef};
//! use telgeo_geometry::shape::BoxShape;
//! use telgeo_geometry::transform::{Rotation, Transform3D, Vec3};
//!
//! let mut model = GeoModel::new("demo", "v0");
//! let air = model
//!     .add_medium(Medium::new("air", Material::new("air", 14.6, 7.3, 1.2e-3, 36.62, 0.0)))
//!     .unwrap();
//! let world = model.add_volume("world", BoxShape::new(50.0, 50.0, 50.0), Some(air)).unwrap();
//! model.set_top_volume(world).unwrap();
//! let slab = model.add_volume("slab", BoxShape::new(5.0, 5.0, 0.5), Some(air)).unwrap();
//! let node = model
//!     .add_node(world, slab, 7, Transform3D::new(Vec3::new(0.0, 0.0, 20.0), Rotation::identity()))
//!     .unwrap();
//! model.close_geometry().unwrap();
//!
//! let mut nav = Navigator::new(&model).unwrap();
//! assert_eq!(nav.find_node(Vec3::new(0.0, 0.0, 20.0)), Some(NodeRef::Daughter(node)));
//! assert_eq!(nav.find_node(Vec3::new(0.0, 0.0, 0.0)), Some(NodeRef::Top));
//! assert_eq!(nav.find_node(Vec3::new(0.0, 0.0, 99.0)), None);
//! ```

use telgeo_types::GeoError;

use crate::material::Medium;
use crate::model::{GeoModel, NodeId, Volume};
use crate::transform::{Transform3D, Vec3};

/// Extra distance a crossing point is pushed past a boundary before the new
/// location is resolved, so that it lands strictly inside the next volume.
pub const BOUNDARY_PUSH: f64 = 1e-9;

/// The node a navigator currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// The implicit placement of the top volume.
    Top,
    Daughter(NodeId),
}

/// Per-query navigation state over a shared model.
#[derive(Debug, Clone)]
pub struct Navigator<'m> {
    model: &'m GeoModel,
    point: Vec3,
    direction: Vec3,
    /// Placed nodes from just below the top volume down to the current one.
    path: Vec<NodeId>,
    /// Global transform of the current node.
    matrix: Transform3D,
    step: f64,
    outside: bool,
}

impl<'m> Navigator<'m> {
    /// Start a navigator at the top volume.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::ModelOpen`] unless the model is closed.
    pub fn new(model: &'m GeoModel) -> Result<Self, GeoError> {
        if !model.is_closed() || model.top_volume().is_none() {
            return Err(GeoError::ModelOpen);
        }
        Ok(Self {
            model,
            point: Vec3::zero(),
            direction: Vec3::new(0.0, 0.0, 1.0),
            path: Vec::new(),
            matrix: Transform3D::identity(),
            step: 0.0,
            outside: false,
        })
    }

    pub fn model(&self) -> &'m GeoModel {
        self.model
    }

    // ── State accessors ─────────────────────────────────────────────────────

    pub fn current_point(&self) -> Vec3 {
        self.point
    }

    pub fn current_direction(&self) -> Vec3 {
        self.direction
    }

    pub fn current_node(&self) -> NodeRef {
        match self.path.last() {
            Some(id) => NodeRef::Daughter(*id),
            None => NodeRef::Top,
        }
    }

    pub fn current_volume(&self) -> &'m Volume {
        let top = self.top();
        match self.path.last().and_then(|id| self.model.node(*id)) {
            Some(node) => self.model.volume(node.volume).unwrap_or(top),
            None => top,
        }
    }

    /// Medium of the current volume, if it resolves.
    pub fn current_medium(&self) -> Option<&'m Medium> {
        self.model.medium_of(self.current_volume())
    }

    /// Global placement of the current node.
    pub fn current_matrix(&self) -> Transform3D {
        self.matrix
    }

    /// Length of the last step taken by
    /// [`find_next_boundary_and_step`][Self::find_next_boundary_and_step].
    pub fn step(&self) -> f64 {
        self.step
    }

    /// True when the last location query ended outside the top volume.
    pub fn is_outside(&self) -> bool {
        self.outside
    }

    pub fn path_name(&self) -> String {
        self.model.path_name(&self.path)
    }

    // ── Frame conversions at the current node ───────────────────────────────

    pub fn local_to_master(&self, p: Vec3) -> Vec3 {
        self.matrix.local_to_master(p)
    }

    pub fn master_to_local(&self, p: Vec3) -> Vec3 {
        self.matrix.master_to_local(p)
    }

    pub fn local_to_master_vect(&self, v: Vec3) -> Vec3 {
        self.matrix.local_to_master_vect(v)
    }

    pub fn master_to_local_vect(&self, v: Vec3) -> Vec3 {
        self.matrix.master_to_local_vect(v)
    }

    // ── Location ────────────────────────────────────────────────────────────

    /// Reset to the top volume.
    pub fn cd_top(&mut self) {
        self.path.clear();
        self.matrix = Transform3D::identity();
        self.outside = false;
    }

    /// Climb one level towards the top volume.  No-op at the top.
    pub fn cd_up(&mut self) {
        if self.path.pop().is_some() {
            self.matrix = self.matrix_of(&self.path);
        }
    }

    /// Locate the deepest node containing `p` and make it current.
    ///
    /// Returns `None` (and sets [`is_outside`][Self::is_outside]) when `p`
    /// lies outside the top volume.
    pub fn find_node(&mut self, p: Vec3) -> Option<NodeRef> {
        self.point = p;
        match self.locate(p) {
            Some((path, matrix)) => {
                self.path = path;
                self.matrix = matrix;
                self.outside = false;
                Some(self.current_node())
            }
            None => {
                self.path.clear();
                self.matrix = Transform3D::identity();
                self.outside = true;
                None
            }
        }
    }

    /// True when `p` resolves to the same node as the current location.
    /// Does not change the navigator state.
    pub fn is_same_location(&self, p: Vec3) -> bool {
        match self.locate(p) {
            Some((path, _)) => !self.outside && path == self.path,
            None => self.outside,
        }
    }

    /// Set point and direction and locate the starting node.
    ///
    /// `direction` is normalised; a zero vector leaves the previous
    /// direction in place.
    pub fn init_track(&mut self, start: Vec3, direction: Vec3) -> Option<NodeRef> {
        let n = direction.norm();
        if n > 0.0 {
            self.direction = direction.scale(1.0 / n);
        }
        self.step = 0.0;
        self.find_node(start)
    }

    /// Move along the current direction to the next volume boundary, but no
    /// further than `step_max`, and relocate.
    ///
    /// The distance actually travelled is available from
    /// [`step`][Self::step].  When `step_max` is reached before any boundary
    /// the node does not change.  Returns `None` once the track has left the
    /// top volume.
    pub fn find_next_boundary_and_step(&mut self, step_max: f64) -> Option<NodeRef> {
        if self.outside {
            self.step = 0.0;
            return None;
        }
        let volume = self.current_volume();
        let local_p = self.matrix.master_to_local(self.point);
        let local_d = self.matrix.master_to_local_vect(self.direction);

        let mut snext = volume.shape.dist_out(local_p, local_d);
        for id in &volume.daughters {
            let Some(node) = self.model.node(*id) else { continue };
            let Some(daughter) = self.model.volume(node.volume) else { continue };
            let p = node.placement.master_to_local(local_p);
            let d = node.placement.master_to_local_vect(local_d);
            if let Some(t) = daughter.shape.dist_in(p, d) {
                snext = snext.min(t);
            }
        }

        if snext >= step_max {
            self.step = step_max;
            self.point = self.point.add(self.direction.scale(step_max));
            return Some(self.current_node());
        }

        self.step = snext;
        let crossed = self.point.add(self.direction.scale(snext + BOUNDARY_PUSH));
        self.find_node(crossed)
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn top(&self) -> &'m Volume {
        // Checked non-empty in `new`; the model is immutable from then on.
        self.model
            .top_volume()
            .unwrap_or_else(|| unreachable!("closed model without top volume"))
    }

    fn matrix_of(&self, path: &[NodeId]) -> Transform3D {
        path.iter()
            .filter_map(|id| self.model.node(*id))
            .fold(Transform3D::identity(), |acc, node| acc.compose(node.placement))
    }

    /// Descend from the top volume to the deepest node containing `p`.
    fn locate(&self, p: Vec3) -> Option<(Vec<NodeId>, Transform3D)> {
        let mut volume = self.top();
        if !volume.shape.contains(p) {
            return None;
        }
        let mut path = Vec::new();
        let mut matrix = Transform3D::identity();
        let mut local = p;
        'descend: loop {
            for id in &volume.daughters {
                let Some(node) = self.model.node(*id) else { continue };
                let Some(daughter) = self.model.volume(node.volume) else { continue };
                let candidate = node.placement.master_to_local(local);
                if daughter.shape.contains(candidate) {
                    path.push(*id);
                    matrix = matrix.compose(node.placement);
                    volume = daughter;
                    local = candidate;
                    continue 'descend;
                }
            }
            break;
        }
        Some((path, matrix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::model::VolumeId;
    use crate::shape::BoxShape;
    use crate::transform::Rotation;

    /// World of half-size 100 with two slabs at z = ±10 (thickness 1) and a
    /// small box nested inside the second slab.
    fn model() -> GeoModel {
        let mut m = GeoModel::new("nav", "v0");
        let air = m
            .add_medium(Medium::new("air", Material::new("air", 14.6, 7.3, 1.2e-3, 36.62, 0.0)))
            .unwrap();
        let si = m
            .add_medium(Medium::new("si", Material::new("si", 28.0855, 14.0, 2.33, 9.37, 45.75)))
            .unwrap();
        let world = m.add_volume("world", BoxShape::new(100.0, 100.0, 100.0), Some(air)).unwrap();
        m.set_top_volume(world).unwrap();
        let slab = m.add_volume("slab", BoxShape::new(5.0, 5.0, 0.5), Some(si)).unwrap();
        let pixel = m.add_volume("pixel", BoxShape::new(1.0, 1.0, 0.5), Some(si)).unwrap();
        for (copy, z) in [(1, -10.0), (2, 10.0)] {
            let placement = Transform3D::new(Vec3::new(0.0, 0.0, z), Rotation::identity());
            m.add_node(world, slab, copy, placement).unwrap();
        }
        m.add_node(slab, pixel, 1, Transform3D::new(Vec3::new(3.0, 0.0, 0.0), Rotation::identity()))
            .unwrap();
        m.close_geometry().unwrap();
        m
    }

    #[test]
    fn new_requires_closed_model() {
        let m = GeoModel::new("open", "v0");
        assert!(matches!(Navigator::new(&m), Err(GeoError::ModelOpen)));
    }

    #[test]
    fn find_node_descends_to_deepest_volume() {
        let m = model();
        let mut nav = Navigator::new(&m).unwrap();

        assert_eq!(nav.find_node(Vec3::new(0.0, 0.0, 10.0)), Some(NodeRef::Daughter(NodeId(1))));
        assert_eq!(nav.current_volume().name, "slab");

        // Pixel lives inside slab; the path has two entries.
        let found = nav.find_node(Vec3::new(3.0, 0.0, 10.0));
        assert!(matches!(found, Some(NodeRef::Daughter(_))));
        assert_eq!(nav.current_volume().name, "pixel");
        assert_eq!(nav.path_name(), "/world/slab_2/pixel_1");
        let local = nav.master_to_local(Vec3::new(3.0, 0.0, 10.0));
        assert!(local.norm() < 1e-12);

        assert_eq!(nav.find_node(Vec3::new(0.0, 0.0, 50.0)), Some(NodeRef::Top));
        assert!(!nav.is_outside());
        assert_eq!(nav.find_node(Vec3::new(0.0, 0.0, 500.0)), None);
        assert!(nav.is_outside());
    }

    #[test]
    fn cd_up_restores_parent_matrix() {
        let m = model();
        let mut nav = Navigator::new(&m).unwrap();
        nav.find_node(Vec3::new(3.0, 0.0, 10.0));
        nav.cd_up();
        assert_eq!(nav.current_volume().name, "slab");
        assert!((nav.current_matrix().translation.z - 10.0).abs() < 1e-12);
        nav.cd_up();
        nav.cd_up();
        assert_eq!(nav.current_node(), NodeRef::Top);
    }

    #[test]
    fn is_same_location_is_pure() {
        let m = model();
        let mut nav = Navigator::new(&m).unwrap();
        nav.find_node(Vec3::new(0.0, 0.0, -10.0));
        assert!(nav.is_same_location(Vec3::new(1.0, 1.0, -10.2)));
        assert!(!nav.is_same_location(Vec3::new(0.0, 0.0, 10.0)));
        assert_eq!(nav.current_node(), NodeRef::Daughter(NodeId(0)));
    }

    #[test]
    fn stepping_crosses_each_boundary() {
        let m = model();
        let mut nav = Navigator::new(&m).unwrap();
        nav.init_track(Vec3::new(0.0, 0.0, -20.0), Vec3::new(0.0, 0.0, 2.0));

        let mut steps = Vec::new();
        let mut remaining = 40.0;
        let mut node = Some(nav.current_node());
        while node.is_some() && remaining > 1e-9 {
            node = nav.find_next_boundary_and_step(remaining);
            remaining -= nav.step();
            steps.push(nav.step());
        }
        let expected = [9.5, 1.0, 19.0, 1.0, 9.5];
        assert_eq!(steps.len(), expected.len(), "{steps:?}");
        for (s, e) in steps.iter().zip(expected) {
            assert!((s - e).abs() < 1e-6, "{steps:?}");
        }
    }

    #[test]
    fn stepping_out_of_the_world_returns_none() {
        let m = model();
        let mut nav = Navigator::new(&m).unwrap();
        nav.init_track(Vec3::new(50.0, 50.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(nav.find_next_boundary_and_step(1e6), None);
        assert!((nav.step() - 50.0).abs() < 1e-9);
        assert!(nav.is_outside());
    }

    #[test]
    fn rotated_daughter_is_located_in_its_own_frame() {
        let mut m = GeoModel::new("rot", "v0");
        let world = m.add_volume("world", BoxShape::new(100.0, 100.0, 100.0), None).unwrap();
        m.set_top_volume(world).unwrap();
        let bar = m.add_volume("bar", BoxShape::new(10.0, 1.0, 1.0), None).unwrap();
        m.add_node(
            world,
            bar,
            1,
            Transform3D::new(Vec3::zero(), Rotation::from_euler_deg(90.0, 0.0, 0.0)),
        )
        .unwrap();
        m.close_geometry().unwrap();

        let mut nav = Navigator::new(&m).unwrap();
        // Bar is long along local x, which the rotation maps onto global y.
        assert!(matches!(nav.find_node(Vec3::new(0.0, 8.0, 0.0)), Some(NodeRef::Daughter(_))));
        assert_eq!(nav.find_node(Vec3::new(8.0, 0.0, 0.0)), Some(NodeRef::Top));
        assert!(nav.current_medium().is_none());
        assert_eq!(m.volume(VolumeId(1)).unwrap().name, "bar");
    }
}
