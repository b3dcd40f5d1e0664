//! Detector-description sources.
//!
//! The plane registry does not care where plane parameters come from; it
//! reads a [`LayerLayout`] through the [`DescriptionSource`] trait.  Two
//! sources are provided:
//!
//! - [`LayerLayout`] itself (in-memory, used by tests and embedding code);
//! - [`TomlDescription`], which reads the layout from a TOML file:
//!
//! ```toml
//! magnetic_field = [0.0, 0.0, 0.0]   # tesla, optional
//!
//! [[layer]]
//! id = 10
//! position = [0.0, 0.0, 0.0]         # mm
//! rotation = [0.0, 0.0, 0.0]         # rad: zy, zx, xy (optional)
//! size = [21.2, 10.6, 0.3]           # mm: x, y, thickness
//! radiation_length = 9.37            # cm
//!
//! [dut]                              # optional; no rotation field
//! id = 6
//! position = [0.0, 0.0, 250.0]
//! size = [20.0, 20.0, 0.5]
//! radiation_length = 9.37
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use telgeo_types::{GeoError, SensorId};

/// Parameters of one telescope layer, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub id: SensorId,
    /// Centre position (mm).
    pub position: [f64; 3],
    /// Rotations (rad) in the ZY, ZX and XY planes, i.e. about x, y and z.
    #[serde(default)]
    pub rotation: [f64; 3],
    /// Extent along x, y and thickness along z (mm).
    pub size: [f64; 3],
    /// Radiation length of the sensor material (cm).
    pub radiation_length: f64,
}

/// The optional device under test.  The description format carries no
/// rotation for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutRecord {
    pub id: SensorId,
    pub position: [f64; 3],
    pub size: [f64; 3],
    pub radiation_length: f64,
}

/// Everything the registry needs from a detector description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerLayout {
    #[serde(default, rename = "layer")]
    pub layers: Vec<LayerRecord>,
    #[serde(default)]
    pub dut: Option<DutRecord>,
    /// Constant magnetic field (T).
    #[serde(default)]
    pub magnetic_field: [f64; 3],
}

/// A provider of [`LayerLayout`]s.
///
/// Implementations report an unreachable or unreadable description as
/// [`GeoError::DescriptionUnavailable`] and malformed content as
/// [`GeoError::InvalidDescription`].
pub trait DescriptionSource {
    /// Human-readable name used in log messages.
    fn name(&self) -> String;

    fn layout(&self) -> Result<LayerLayout, GeoError>;
}

impl DescriptionSource for LayerLayout {
    fn name(&self) -> String {
        "in-memory layout".to_string()
    }

    fn layout(&self) -> Result<LayerLayout, GeoError> {
        Ok(self.clone())
    }
}

/// A layout stored as a TOML file.
#[derive(Debug, Clone)]
pub struct TomlDescription {
    path: PathBuf,
}

impl TomlDescription {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a layout from TOML text.
    pub fn parse(raw: &str) -> Result<LayerLayout, GeoError> {
        toml::from_str(raw).map_err(|e| GeoError::InvalidDescription(e.to_string()))
    }
}

impl DescriptionSource for TomlDescription {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn layout(&self) -> Result<LayerLayout, GeoError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            GeoError::DescriptionUnavailable(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Self::parse(&raw)
    }
}
