use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Externally assigned sensor identifier.  Not necessarily contiguous or
/// ordered along the beam axis.
pub type SensorId = i32;

/// Legacy value for "unknown sensor" on scalar geometric accessors.
pub const UNKNOWN_SCALAR: f64 = -999.0;

/// Legacy value for "point is not inside any known sensor".
pub const SENSOR_NOT_FOUND: SensorId = -999;

/// Legacy value for an unknown sensor ID ↔ z-order mapping.
pub const UNKNOWN_Z_ORDER: i32 = -1;

/// Collapse an `Option` lookup into the numeric sentinel that downstream
/// fitting code expects at the system boundary.
///
/// Internally every lookup returns an `Option`; only callers that need the
/// old numeric convention (dumps, the CLI) go through this trait.
pub trait Sentinel {
    type Raw;

    fn or_sentinel(self) -> Self::Raw;
}

impl Sentinel for Option<f64> {
    type Raw = f64;

    fn or_sentinel(self) -> f64 {
        self.unwrap_or(UNKNOWN_SCALAR)
    }
}

/// Z-order indices.
impl Sentinel for Option<usize> {
    type Raw = i32;

    fn or_sentinel(self) -> i32 {
        self.and_then(|i| i32::try_from(i).ok())
            .unwrap_or(UNKNOWN_Z_ORDER)
    }
}

/// Point-location results.
impl Sentinel for Option<SensorId> {
    type Raw = SensorId;

    fn or_sentinel(self) -> SensorId {
        self.unwrap_or(SENSOR_NOT_FOUND)
    }
}

/// Errors raised while constructing or querying the telescope geometry.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeoError {
    #[error("Detector description unavailable: {0}")]
    DescriptionUnavailable(String),

    #[error("Invalid detector description: {0}")]
    InvalidDescription(String),

    #[error("Geometry import from {path} failed: {details}")]
    ModelImport { path: String, details: String },

    #[error("Geometry export to {path} failed: {details}")]
    ModelExport { path: String, details: String },

    #[error("Geometry model has not been initialised")]
    ModelAbsent,

    #[error("Geometry model is closed: {0}")]
    ModelClosed(String),

    #[error("Geometry model is not closed")]
    ModelOpen,
}
