//! `telgeo-telescope` – geometry of a beam-telescope plane stack.
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`]   | [`DescriptionSource`] trait, in-memory and TOML layouts. |
//! | [`registry`] | [`PlaneRegistry`]: per-sensor parameters and z-ordering. |
//! | [`builder`]  | World + silicon planes as a closed [`GeoModel`][telgeo_geometry::GeoModel]. |
//! | [`query`]    | [`SpatialQuery`]: point location and sensor-frame transforms. |
//! | [`radlen`]   | [`RadLengthIntegrator`]: material budget along a segment. |
//! | [`service`]  | [`GeometryService`]: owns all of the above. |
//!
//! # Example
//!
//! ```rust
//! use telgeo_geometry::Vec3;
//! use telgeo_telescope::{GeometryService, LayerLayout, LayerRecord};
//!
//! let layout = LayerLayout {
//!     layers: vec![LayerRecord {
//!         id: 1,
//!         position: [0.0, 0.0, 0.0],
//!         rotation: [0.0, 0.0, 0.0],
//!         size: [20.0, 10.0, 0.3],
//!         radiation_length: 9.37,
//!     }],
//!     ..Default::default()
//! };
//! let mut svc = GeometryService::new(&layout).unwrap();
//! svc.initialize("demo", false).unwrap();
//! assert_eq!(svc.sensor_id_at(Vec3::zero()).unwrap(), Some(1));
//! ```

pub mod builder;
pub mod query;
pub mod radlen;
pub mod registry;
pub mod service;
pub mod source;

pub use query::{SensorTable, SpatialQuery};
pub use radlen::{Integration, RadLengthIntegrator, Termination};
pub use registry::{Plane, PlaneRegistry, ZOrderMap};
pub use service::GeometryService;
pub use source::{DescriptionSource, DutRecord, LayerLayout, LayerRecord, TomlDescription};
