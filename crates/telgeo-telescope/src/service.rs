//! [`GeometryService`] – the context object tying the pieces together.
//!
//! ```text
//!  DescriptionSource ──► PlaneRegistry ──► build_model / GeoModel::import
//!                                                   │
//!                                      GeoModel + SensorTable
//!                                        │                │
//!                                  SpatialQuery   RadLengthIntegrator
//! ```
//!
//! The registry is loaded in [`GeometryService::new`]; the model is created
//! later by [`initialize`][GeometryService::initialize] or
//! [`initialize_from_file`][GeometryService::initialize_from_file].  Until
//! then every model-dependent call returns [`GeoError::ModelAbsent`].
//!
//! The service holds no per-query state and is `Send + Sync`; share it with
//! `Arc<GeometryService>`.

use std::path::Path;

use telgeo_geometry::{GeoModel, Transform3D, Vec3};
use telgeo_types::{GeoError, SensorId};
use tracing::{info, warn};

use crate::builder::build_model;
use crate::query::{SensorTable, SpatialQuery};
use crate::radlen::RadLengthIntegrator;
use crate::registry::PlaneRegistry;
use crate::source::DescriptionSource;

#[derive(Debug)]
pub struct GeometryService {
    registry: PlaneRegistry,
    model: Option<GeoModel>,
    sensors: SensorTable,
}

impl GeometryService {
    /// Load the plane registry.  No model exists yet.
    pub fn new(source: &dyn DescriptionSource) -> Result<Self, GeoError> {
        Ok(Self {
            registry: PlaneRegistry::load(source)?,
            model: None,
            sensors: SensorTable::default(),
        })
    }

    /// Build the model from the registry, replacing any previous one.
    ///
    /// With `dump_to_file`, the finished model is exported to the path
    /// `name`; an export failure is only logged.  On a build failure the
    /// service is left without a model.
    pub fn initialize(&mut self, name: &str, dump_to_file: bool) -> Result<(), GeoError> {
        let model = match build_model(&self.registry, name) {
            Ok(model) => model,
            Err(e) => {
                warn!(error = %e, "geometry construction failed; no model available");
                self.model = None;
                self.sensors = SensorTable::default();
                return Err(e);
            }
        };
        if dump_to_file
            && let Err(e) = model.export(Path::new(name))
        {
            warn!(error = %e, "geometry dump failed");
        }
        self.install(model);
        Ok(())
    }

    /// Import a model previously written by [`export_model`][Self::export_model].
    ///
    /// On failure the service is left without a model.
    pub fn initialize_from_file(&mut self, path: &Path) -> Result<(), GeoError> {
        match GeoModel::import(path) {
            Ok(model) => {
                self.install(model);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "geometry import failed; no model available");
                self.model = None;
                self.sensors = SensorTable::default();
                Err(e)
            }
        }
    }

    fn install(&mut self, model: GeoModel) {
        self.sensors = SensorTable::from_model(&model, &self.registry);
        if self.sensors.len() != self.registry.plane_count() {
            warn!(
                mapped = self.sensors.len(),
                planes = self.registry.plane_count(),
                "not every plane has a sensor node"
            );
        }
        info!(model = %model.name, sensors = self.sensors.len(), "geometry ready");
        self.model = Some(model);
    }

    pub fn export_model(&self, path: &Path) -> Result<(), GeoError> {
        self.model()?.export(path)
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn registry(&self) -> &PlaneRegistry {
        &self.registry
    }

    pub fn model(&self) -> Result<&GeoModel, GeoError> {
        self.model.as_ref().ok_or(GeoError::ModelAbsent)
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn sensor_table(&self) -> &SensorTable {
        &self.sensors
    }

    pub fn queries(&self) -> Result<SpatialQuery<'_>, GeoError> {
        SpatialQuery::new(self.model()?, &self.registry, &self.sensors)
    }

    pub fn integrator(&self) -> Result<RadLengthIntegrator<'_>, GeoError> {
        RadLengthIntegrator::new(self.model()?)
    }

    /// Constant field from the description (T).
    pub fn magnetic_field(&self) -> Vec3 {
        self.registry.magnetic_field()
    }

    // ── Pass-throughs ───────────────────────────────────────────────────────

    pub fn sensor_id_at(&self, point: Vec3) -> Result<Option<SensorId>, GeoError> {
        Ok(self.queries()?.sensor_id_at(point))
    }

    pub fn local_to_global(&self, id: SensorId, local: Vec3) -> Result<Option<Vec3>, GeoError> {
        Ok(self.queries()?.local_to_global(id, local))
    }

    pub fn global_to_local(&self, point: Vec3) -> Result<Vec3, GeoError> {
        Ok(self.queries()?.global_to_local(point))
    }

    pub fn transform_at(&self, point: Vec3) -> Result<Transform3D, GeoError> {
        Ok(self.queries()?.transform_at(point))
    }

    pub fn rad_length_integral(
        &self,
        start: Vec3,
        finish: Vec3,
        skip_boundary_volumes: bool,
    ) -> Result<f64, GeoError> {
        Ok(self.integrator()?.integrate(start, finish, skip_boundary_volumes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DutRecord, LayerLayout, LayerRecord, TomlDescription};
    use std::sync::Arc;
    use std::thread;

    fn layout() -> LayerLayout {
        LayerLayout {
            layers: (0..6)
                .map(|i| LayerRecord {
                    id: 10 + i,
                    position: [0.0, 0.0, 100.0 * f64::from(i)],
                    rotation: [0.0, 0.0, 0.0],
                    size: [21.2, 10.6, 0.3],
                    radiation_length: 9.37,
                })
                .collect(),
            dut: Some(DutRecord {
                id: 6,
                position: [0.0, 0.0, 250.0],
                size: [20.0, 20.0, 0.5],
                radiation_length: 9.37,
            }),
            magnetic_field: [0.0, 0.0, 1.5],
        }
    }

    fn ready() -> GeometryService {
        let mut svc = GeometryService::new(&layout()).unwrap();
        svc.initialize("telescope", false).unwrap();
        svc
    }

    #[test]
    fn service_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GeometryService>();
    }

    #[test]
    fn queries_need_a_model() {
        let svc = GeometryService::new(&layout()).unwrap();
        assert!(!svc.has_model());
        assert_eq!(svc.model().unwrap_err(), GeoError::ModelAbsent);
        assert_eq!(svc.sensor_id_at(Vec3::zero()).unwrap_err(), GeoError::ModelAbsent);
        assert_eq!(
            svc.rad_length_integral(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), false).unwrap_err(),
            GeoError::ModelAbsent
        );
        // The registry is usable regardless.
        assert_eq!(svc.registry().plane_count(), 7);
    }

    #[test]
    fn unavailable_description_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = TomlDescription::new(dir.path().join("absent.toml"));
        let err = GeometryService::new(&source).unwrap_err();
        assert!(matches!(err, GeoError::DescriptionUnavailable(_)));
    }

    #[test]
    fn initialized_service_answers_queries() {
        let svc = ready();
        assert_eq!(svc.sensor_table().len(), 7);
        assert_eq!(svc.sensor_id_at(Vec3::new(0.0, 0.0, 250.0)).unwrap(), Some(6));
        assert_eq!(svc.sensor_id_at(Vec3::new(0.0, 0.0, 300.0)).unwrap(), Some(13));
        assert_eq!(svc.sensor_id_at(Vec3::new(0.0, 0.0, 50.0)).unwrap(), None);

        let g = svc.local_to_global(12, Vec3::new(1.0, 0.0, 0.0)).unwrap().unwrap();
        assert!(g.distance(Vec3::new(1.0, 0.0, 200.0)) < 1e-12);
        let local = svc.global_to_local(Vec3::new(1.0, 2.0, 200.1)).unwrap();
        assert!(local.distance(Vec3::new(1.0, 2.0, 0.1)) < 1e-12);
        assert_eq!(svc.magnetic_field(), Vec3::new(0.0, 0.0, 1.5));
    }

    #[test]
    fn dump_and_reimport_preserve_queries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telescope.json");
        let name = path.to_str().unwrap();

        let mut built = GeometryService::new(&layout()).unwrap();
        built.initialize(name, true).unwrap();
        assert!(path.exists());

        let mut imported = GeometryService::new(&layout()).unwrap();
        imported.initialize_from_file(&path).unwrap();
        assert!(imported.model().unwrap().is_closed());

        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(3.0, 1.0, 250.1),
            Vec3::new(0.0, 0.0, 123.0),
            Vec3::new(0.0, 0.0, 500.0),
        ];
        for p in points {
            assert_eq!(built.sensor_id_at(p).unwrap(), imported.sensor_id_at(p).unwrap());
            assert_eq!(built.transform_at(p).unwrap(), imported.transform_at(p).unwrap());
        }
        let a = Vec3::new(0.0, 0.0, -10.0);
        let b = Vec3::new(0.0, 0.0, 510.0);
        assert_eq!(
            built.rad_length_integral(a, b, false).unwrap(),
            imported.rad_length_integral(a, b, false).unwrap()
        );
    }

    #[test]
    fn failed_build_drops_previous_model() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        ready().export_model(&good).unwrap();

        let mut bad = layout();
        bad.layers[5].position = [0.0, 0.0, 6000.0];
        let mut svc = GeometryService::new(&bad).unwrap();
        svc.initialize_from_file(&good).unwrap();
        assert!(svc.has_model());

        let err = svc.initialize("telescope", false).unwrap_err();
        assert!(matches!(err, GeoError::InvalidDescription(_)));
        assert!(!svc.has_model());
        assert!(svc.sensor_table().is_empty());
        assert_eq!(svc.sensor_id_at(Vec3::zero()).unwrap_err(), GeoError::ModelAbsent);
    }

    #[test]
    fn failed_import_leaves_model_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut svc = ready();
        let err = svc.initialize_from_file(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, GeoError::ModelImport { .. }));
        assert!(!svc.has_model());
        assert_eq!(svc.transform_at(Vec3::zero()).unwrap_err(), GeoError::ModelAbsent);
    }

    #[test]
    fn export_without_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let svc = GeometryService::new(&layout()).unwrap();
        assert_eq!(
            svc.export_model(&dir.path().join("m.json")).unwrap_err(),
            GeoError::ModelAbsent
        );
    }

    #[test]
    fn shared_across_threads() {
        let svc = Arc::new(ready());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let svc = Arc::clone(&svc);
                thread::spawn(move || {
                    let z = 100.0 * f64::from(i);
                    svc.sensor_id_at(Vec3::new(0.0, 0.0, z)).unwrap()
                })
            })
            .collect();
        let found: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(found, vec![Some(10), Some(11), Some(12), Some(13)]);
    }
}
