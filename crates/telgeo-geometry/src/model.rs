//! Hierarchical volume model.
//!
//! A [`GeoModel`] is a tree of [`Volume`]s.  Each volume owns a shape and a
//! medium and lists the [`PlacedNode`]s (daughter placements) it contains.
//! One volume is designated the *top* volume; it is implicitly placed at the
//! origin with the identity transform.
//!
//! The model is built with the `add_*` methods and then sealed with
//! [`GeoModel::close_geometry`].  A closed model is immutable: navigation
//! borrows it shared, and further structural edits are rejected.
//!
//! Models can be written to and read back from JSON with
//! [`GeoModel::export`] / [`GeoModel::import`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use telgeo_types::GeoError;
use tracing::{debug, info};

use crate::material::Medium;
use crate::shape::BoxShape;
use crate::transform::Transform3D;

// ────────────────────────────────────────────────────────────────────────────
// Handles
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediumId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

// ────────────────────────────────────────────────────────────────────────────
// Volume / PlacedNode
// ────────────────────────────────────────────────────────────────────────────

/// A shape filled with a medium, possibly containing daughter placements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub shape: BoxShape,
    /// `None` for pure containers without material.
    pub medium: Option<MediumId>,
    pub daughters: Vec<NodeId>,
}

/// A volume placed inside a mother volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedNode {
    /// `<volume name>_<copy number>`
    pub name: String,
    pub volume: VolumeId,
    pub mother: VolumeId,
    pub copy_number: i32,
    /// Daughter frame → mother frame.
    pub placement: Transform3D,
}

// ────────────────────────────────────────────────────────────────────────────
// GeoModel
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoModel {
    pub name: String,
    pub title: String,
    media: Vec<Medium>,
    volumes: Vec<Volume>,
    nodes: Vec<PlacedNode>,
    top: Option<VolumeId>,
    #[serde(default)]
    closed: bool,
}

impl GeoModel {
    /// Create an empty, open model.
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            media: Vec::new(),
            volumes: Vec::new(),
            nodes: Vec::new(),
            top: None,
            closed: false,
        }
    }

    fn ensure_open(&self, what: &str) -> Result<(), GeoError> {
        if self.closed {
            return Err(GeoError::ModelClosed(format!("cannot {what}")));
        }
        Ok(())
    }

    pub fn add_medium(&mut self, medium: Medium) -> Result<MediumId, GeoError> {
        self.ensure_open("add a medium")?;
        self.media.push(medium);
        Ok(MediumId(self.media.len() - 1))
    }

    pub fn add_volume(
        &mut self,
        name: impl Into<String>,
        shape: BoxShape,
        medium: Option<MediumId>,
    ) -> Result<VolumeId, GeoError> {
        self.ensure_open("add a volume")?;
        self.volumes.push(Volume {
            name: name.into(),
            shape,
            medium,
            daughters: Vec::new(),
        });
        Ok(VolumeId(self.volumes.len() - 1))
    }

    pub fn set_top_volume(&mut self, volume: VolumeId) -> Result<(), GeoError> {
        self.ensure_open("change the top volume")?;
        if volume.0 >= self.volumes.len() {
            return Err(GeoError::InvalidDescription(format!(
                "top volume {} does not exist",
                volume.0
            )));
        }
        self.top = Some(volume);
        Ok(())
    }

    /// Place `daughter` inside `mother` with the given copy number.
    pub fn add_node(
        &mut self,
        mother: VolumeId,
        daughter: VolumeId,
        copy_number: i32,
        placement: Transform3D,
    ) -> Result<NodeId, GeoError> {
        self.ensure_open("add a node")?;
        if mother.0 >= self.volumes.len() || daughter.0 >= self.volumes.len() {
            return Err(GeoError::InvalidDescription(format!(
                "cannot place volume {} in volume {}: unknown volume",
                daughter.0, mother.0
            )));
        }
        if mother == daughter {
            return Err(GeoError::InvalidDescription(format!(
                "volume {} cannot contain itself",
                mother.0
            )));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(PlacedNode {
            name: format!("{}_{}", self.volumes[daughter.0].name, copy_number),
            volume: daughter,
            mother,
            copy_number,
            placement,
        });
        self.volumes[mother.0].daughters.push(id);
        Ok(id)
    }

    /// Seal the model.  Requires a top volume.
    pub fn close_geometry(&mut self) -> Result<(), GeoError> {
        if self.top.is_none() {
            return Err(GeoError::InvalidDescription(
                "no top volume set".to_string(),
            ));
        }
        if !self.closed {
            self.closed = true;
            info!(
                model = %self.name,
                volumes = self.volumes.len(),
                nodes = self.nodes.len(),
                "geometry closed"
            );
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn top_volume_id(&self) -> Option<VolumeId> {
        self.top
    }

    pub fn top_volume(&self) -> Option<&Volume> {
        self.top.and_then(|id| self.volume(id))
    }

    pub fn volume(&self, id: VolumeId) -> Option<&Volume> {
        self.volumes.get(id.0)
    }

    pub fn node(&self, id: NodeId) -> Option<&PlacedNode> {
        self.nodes.get(id.0)
    }

    pub fn medium(&self, id: MediumId) -> Option<&Medium> {
        self.media.get(id.0)
    }

    /// Medium filling `volume`, if it has one and the index resolves.
    pub fn medium_of(&self, volume: &Volume) -> Option<&Medium> {
        volume.medium.and_then(|id| self.medium(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &PlacedNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn volumes(&self) -> impl Iterator<Item = (VolumeId, &Volume)> {
        self.volumes.iter().enumerate().map(|(i, v)| (VolumeId(i), v))
    }

    /// `/volume_World/volume_SensorID:3_3` style path for diagnostics.
    pub fn path_name(&self, path: &[NodeId]) -> String {
        let mut out = String::new();
        if let Some(top) = self.top_volume() {
            out.push('/');
            out.push_str(&top.name);
        }
        for id in path {
            if let Some(node) = self.node(*id) {
                out.push('/');
                out.push_str(&node.name);
            }
        }
        out
    }

    /// Pairs of sibling nodes whose placed bounding boxes overlap.
    ///
    /// Rotated boxes are approximated by their axis-aligned bounds, so a
    /// reported pair is a candidate overlap rather than a proven one.
    pub fn check_overlaps(&self) -> Vec<(NodeId, NodeId)> {
        let mut found = Vec::new();
        for volume in &self.volumes {
            let boxes: Vec<_> = volume
                .daughters
                .iter()
                .filter_map(|id| {
                    let node = self.node(*id)?;
                    let shape = self.volume(node.volume)?.shape;
                    Some((*id, shape.bounding_box(&node.placement)))
                })
                .collect();
            for (i, (a, box_a)) in boxes.iter().enumerate() {
                for (b, box_b) in &boxes[i + 1..] {
                    if box_a.overlaps(box_b) {
                        found.push((*a, *b));
                    }
                }
            }
        }
        found
    }

    // ── Persistence ─────────────────────────────────────────────────────────

    /// Write the model to `path` as pretty-printed JSON.
    pub fn export(&self, path: &Path) -> Result<(), GeoError> {
        let err = |details: String| GeoError::ModelExport {
            path: path.display().to_string(),
            details,
        };
        let raw = serde_json::to_string_pretty(self).map_err(|e| err(e.to_string()))?;
        fs::write(path, raw).map_err(|e| err(e.to_string()))?;
        info!(path = %path.display(), "geometry exported");
        Ok(())
    }

    /// Read a model previously written by [`GeoModel::export`].
    ///
    /// The model is validated and closed before it is returned.
    pub fn import(path: &Path) -> Result<Self, GeoError> {
        let err = |details: String| GeoError::ModelImport {
            path: path.display().to_string(),
            details,
        };
        let raw = fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
        let mut model: GeoModel = serde_json::from_str(&raw).map_err(|e| err(e.to_string()))?;
        model.validate().map_err(err)?;
        model.closed = false;
        model.close_geometry().map_err(|e| err(e.to_string()))?;
        debug!(path = %path.display(), "geometry imported");
        Ok(model)
    }

    /// Check that every handle stored in the model resolves.
    fn validate(&self) -> Result<(), String> {
        let top = self.top.ok_or("no top volume")?;
        if top.0 >= self.volumes.len() {
            return Err(format!("top volume {} out of range", top.0));
        }
        for (i, v) in self.volumes.iter().enumerate() {
            if let Some(m) = v.medium
                && m.0 >= self.media.len()
            {
                return Err(format!("volume {i} references missing medium {}", m.0));
            }
            for d in &v.daughters {
                match self.nodes.get(d.0) {
                    Some(node) if node.mother.0 == i => {}
                    _ => return Err(format!("volume {i} lists invalid daughter {}", d.0)),
                }
            }
        }
        for (i, n) in self.nodes.iter().enumerate() {
            if n.volume.0 >= self.volumes.len() || n.mother.0 >= self.volumes.len() {
                return Err(format!("node {i} references a missing volume"));
            }
            if n.volume == top {
                return Err(format!("node {i} places the top volume"));
            }
            if n.volume == n.mother {
                return Err(format!("node {i} places volume {} inside itself", n.volume.0));
            }
        }
        self.check_acyclic(top.0)
    }

    /// Depth-first walk from the top volume; a volume reached again while it
    /// is still on the stack closes a placement cycle.
    fn check_acyclic(&self, top: usize) -> Result<(), String> {
        let mut on_stack = vec![false; self.volumes.len()];
        let mut done = vec![false; self.volumes.len()];
        // (volume, next daughter slot)
        let mut stack = vec![(top, 0_usize)];
        on_stack[top] = true;
        while let Some((vol, slot)) = stack.last_mut() {
            let vol = *vol;
            let Some(node) = self.volumes[vol].daughters.get(*slot) else {
                on_stack[vol] = false;
                done[vol] = true;
                stack.pop();
                continue;
            };
            *slot += 1;
            let child = self.nodes[node.0].volume.0;
            if on_stack[child] {
                return Err(format!("placement cycle through volume {child}"));
            }
            if !done[child] {
                on_stack[child] = true;
                stack.push((child, 0));
            }
        }
        Ok(())
    }
}
