//! Turn a [`PlaneRegistry`] into a closed [`GeoModel`].
//!
//! The model is a 10 m air-filled world box with one silicon box per plane
//! placed directly inside it.  Each sensor node carries the sensor ID as its
//! copy number, which is how point location maps nodes back to sensors.

use telgeo_geometry::material::{Element, Material, Medium};
use telgeo_geometry::shape::{Aabb, BoxShape};
use telgeo_geometry::{GeoModel, Rotation, Transform3D, Vec3};
use telgeo_types::{GeoError, SensorId};
use tracing::{debug, warn};

use crate::registry::{Plane, PlaneRegistry};

/// Half-size of the world cube (mm).
pub const WORLD_HALF_EXTENT: f64 = 5000.0;

pub const WORLD_VOLUME_NAME: &str = "volume_World";
pub const AIR_MEDIUM_NAME: &str = "medium_World_AIR";

/// g/cm³
pub const AIR_DENSITY: f64 = 1.2e-3;
/// cm
pub const AIR_RADIATION_LENGTH: f64 = 36.62;

pub const SILICON_A: f64 = 28.0855;
pub const SILICON_Z: f64 = 14.0;
pub const SILICON_DENSITY: f64 = 2.33;
pub const SILICON_ABSORPTION_LENGTH: f64 = 45.753206;

/// Dry air by mass fraction: N, O, Ar, C.
pub fn air_medium() -> Medium {
    let air = Material::mixture(
        "AIR",
        AIR_DENSITY,
        vec![
            Element::new(14.007, 7.0, 0.755267),
            Element::new(15.999, 8.0, 0.231781),
            Element::new(39.948, 18.0, 0.012827),
            Element::new(12.011, 6.0, 0.000124),
        ],
    )
    .with_radiation_length(AIR_RADIATION_LENGTH);
    Medium::new(AIR_MEDIUM_NAME, air)
}

/// Silicon with the plane's own radiation length.
pub fn sensor_medium(id: SensorId, radiation_length: f64) -> Medium {
    let material = Material::new(
        format!("materialSensor{id}"),
        SILICON_A,
        SILICON_Z,
        SILICON_DENSITY,
        radiation_length,
        SILICON_ABSORPTION_LENGTH,
    );
    Medium::new(format!("mediumSensor{id}"), material)
}

pub fn sensor_volume_name(id: SensorId) -> String {
    format!("volume_SensorID:{id}")
}

/// Orientation of a plane from its rotation angles (rad, about x, y, z).
///
/// Built as `Rx(α) · Ry(β) · Rz(γ)`, where the y rotation is assembled from
/// two Euler rotations (`(90°, β, 0)` then `(-90°, 0, 0)`).  Note the order
/// differs from [`Plane::normal`], which applies x first.
pub fn plane_rotation(angles: Vec3) -> Rotation {
    let rot_x = Rotation::from_euler_deg(0.0, angles.x.to_degrees(), 0.0);
    let rot_y = Rotation::from_euler_deg(90.0, angles.y.to_degrees(), 0.0);
    let rot_y_back = Rotation::from_euler_deg(-90.0, 0.0, 0.0);
    let rot_z = Rotation::from_euler_deg(0.0, 0.0, angles.z.to_degrees());
    rot_x
        .multiply_by(rot_y)
        .multiply_by(rot_y_back)
        .multiply_by(rot_z)
}

/// Placement of a plane's volume inside the world.
pub fn plane_placement(plane: &Plane) -> Transform3D {
    Transform3D::new(plane.position, plane_rotation(plane.rotation))
}

/// Build and close the telescope model.
///
/// Overlapping planes are reported with `warn!` but do not fail the build.
/// A plane reaching outside the world box is an
/// [`InvalidDescription`][GeoError::InvalidDescription].
pub fn build_model(registry: &PlaneRegistry, name: &str) -> Result<GeoModel, GeoError> {
    let mut model = GeoModel::new(name, "Telescope geometry");
    let half = Vec3::new(WORLD_HALF_EXTENT, WORLD_HALF_EXTENT, WORLD_HALF_EXTENT);
    let world_bounds = Aabb::new(half.scale(-1.0), half);

    let air = model.add_medium(air_medium())?;
    let world = model.add_volume(
        WORLD_VOLUME_NAME,
        BoxShape::new(WORLD_HALF_EXTENT, WORLD_HALF_EXTENT, WORLD_HALF_EXTENT),
        Some(air),
    )?;
    model.set_top_volume(world)?;

    for plane in registry.planes() {
        let shape = BoxShape::from_size(plane.size);
        let bounds = shape.bounding_box(&plane_placement(plane));
        if !world_bounds.contains_point(bounds.min) || !world_bounds.contains_point(bounds.max) {
            return Err(GeoError::InvalidDescription(format!(
                "sensor {} extends outside the world volume",
                plane.id
            )));
        }
        let medium = model.add_medium(sensor_medium(plane.id, plane.radiation_length))?;
        let volume = model.add_volume(sensor_volume_name(plane.id), shape, Some(medium))?;
        model.add_node(world, volume, plane.id, plane_placement(plane))?;
        debug!(sensor = plane.id, z = plane.position.z, dut = plane.is_dut, "sensor placed");
    }

    model.close_geometry()?;

    for (a, b) in model.check_overlaps() {
        let name = |id| model.node(id).map(|n| n.name.as_str()).unwrap_or("?");
        warn!(first = name(a), second = name(b), "sensor volumes overlap");
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{LayerLayout, LayerRecord};

    fn assert_rot_eq(a: &Rotation, b: &[f64; 9]) {
        for (x, y) in a.matrix().iter().zip(b) {
            assert!((x - y).abs() < 1e-12, "{:?} != {b:?}", a.matrix());
        }
    }

    #[test]
    fn zero_angles_give_identity() {
        assert_rot_eq(&plane_rotation(Vec3::zero()), Rotation::identity().matrix());
    }

    #[test]
    fn y_angle_gives_rotation_about_y() {
        let beta: f64 = 0.05;
        let (s, c) = beta.sin_cos();
        assert_rot_eq(
            &plane_rotation(Vec3::new(0.0, beta, 0.0)),
            &[c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c],
        );
    }

    #[test]
    fn x_and_z_angles_are_plain_axis_rotations() {
        let a: f64 = 0.1;
        let (s, c) = a.sin_cos();
        assert_rot_eq(
            &plane_rotation(Vec3::new(a, 0.0, 0.0)),
            &[1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c],
        );
        assert_rot_eq(
            &plane_rotation(Vec3::new(0.0, 0.0, a)),
            &[c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0],
        );
    }

    #[test]
    fn local_normal_matches_plane_normal_for_single_axis() {
        let plane = Plane {
            id: 1,
            position: Vec3::zero(),
            rotation: Vec3::new(0.0, 0.2, 0.0),
            size: Vec3::new(1.0, 1.0, 1.0),
            radiation_length: 9.37,
            is_dut: false,
        };
        let placed = plane_placement(&plane).local_to_master_vect(Vec3::new(0.0, 0.0, 1.0));
        assert!(placed.distance(plane.normal()) < 1e-12);
    }

    #[test]
    fn build_places_every_plane() {
        let layout = LayerLayout {
            layers: (0..3)
                .map(|i| LayerRecord {
                    id: 20 + i,
                    position: [0.0, 0.0, 50.0 * f64::from(i)],
                    rotation: [0.0, 0.0, 0.0],
                    size: [20.0, 10.0, 0.3],
                    radiation_length: 9.37,
                })
                .collect(),
            ..Default::default()
        };
        let registry = PlaneRegistry::from_layout(layout).unwrap();
        let model = build_model(&registry, "three").unwrap();

        assert!(model.is_closed());
        let world = model.top_volume().unwrap();
        assert_eq!(world.name, WORLD_VOLUME_NAME);
        assert_eq!(world.daughters.len(), 3);
        assert_eq!(model.medium_of(world).unwrap().radiation_length(), AIR_RADIATION_LENGTH);

        let copies: Vec<i32> = model.nodes().map(|(_, n)| n.copy_number).collect();
        assert_eq!(copies, vec![20, 21, 22]);
        let (_, node) = model.nodes().nth(1).unwrap();
        let vol = model.volume(node.volume).unwrap();
        assert_eq!(vol.name, "volume_SensorID:21");
        assert!((vol.shape.dz - 0.15).abs() < 1e-12);
        assert_eq!(model.medium_of(vol).unwrap().name, "mediumSensor21");
        assert!(model.check_overlaps().is_empty());
    }

    #[test]
    fn plane_outside_world_is_rejected() {
        let far = |z| LayerRecord {
            id: 7,
            position: [0.0, 0.0, z],
            rotation: [0.0, 0.0, 0.0],
            size: [20.0, 10.0, 0.3],
            radiation_length: 9.37,
        };
        let layout = |z| LayerLayout { layers: vec![far(z)], ..Default::default() };
        let registry = PlaneRegistry::from_layout(layout(WORLD_HALF_EXTENT - 1.0)).unwrap();
        assert!(build_model(&registry, "edge").is_ok());

        let registry = PlaneRegistry::from_layout(layout(6000.0)).unwrap();
        match build_model(&registry, "outside") {
            Err(GeoError::InvalidDescription(msg)) => assert!(msg.contains("sensor 7")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn air_composition() {
        let air = air_medium();
        assert_eq!(air.material.elements.len(), 4);
        let total: f64 = air.material.elements.iter().map(|e| e.weight).sum();
        assert!((total - 0.999999).abs() < 1e-9);
    }
}
