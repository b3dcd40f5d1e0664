//! Materials and tracking media.
//!
//! Units follow the geometry-engine convention: densities in g/cm³,
//! radiation and absorption lengths in cm.  Only the radiation length is
//! consumed by navigation; the remaining properties are kept so that exported
//! models stay self-describing.

use serde::{Deserialize, Serialize};

/// One component of a mixture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Atomic mass (g/mol).
    pub a: f64,
    /// Atomic number.
    pub z: f64,
    /// Mass fraction within the mixture.
    pub weight: f64,
}

impl Element {
    pub const fn new(a: f64, z: f64, weight: f64) -> Self {
        Self { a, z, weight }
    }
}

/// A material, either a single element or a mixture of [`Element`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Effective atomic mass.
    pub a: f64,
    /// Effective atomic number.
    pub z: f64,
    /// g/cm³
    pub density: f64,
    /// cm
    pub radiation_length: f64,
    /// cm
    pub absorption_length: f64,
    /// Empty for single-element materials.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<Element>,
}

impl Material {
    /// Single-element material with explicit radiation and absorption lengths.
    pub fn new(
        name: impl Into<String>,
        a: f64,
        z: f64,
        density: f64,
        radiation_length: f64,
        absorption_length: f64,
    ) -> Self {
        Self {
            name: name.into(),
            a,
            z,
            density,
            radiation_length,
            absorption_length,
            elements: Vec::new(),
        }
    }

    /// Mixture of elements given by mass fraction.
    ///
    /// The effective A and Z are the weight-averaged component values.  The
    /// radiation length starts at zero (unset) and must be provided with
    /// [`Material::with_radiation_length`].
    pub fn mixture(name: impl Into<String>, density: f64, elements: Vec<Element>) -> Self {
        let total: f64 = elements.iter().map(|e| e.weight).sum();
        let (a, z) = if total > 0.0 {
            (
                elements.iter().map(|e| e.a * e.weight).sum::<f64>() / total,
                elements.iter().map(|e| e.z * e.weight).sum::<f64>() / total,
            )
        } else {
            (0.0, 0.0)
        };
        Self {
            name: name.into(),
            a,
            z,
            density,
            radiation_length: 0.0,
            absorption_length: 0.0,
            elements,
        }
    }

    pub fn with_radiation_length(mut self, radiation_length: f64) -> Self {
        self.radiation_length = radiation_length;
        self
    }
}

/// A tracking medium: a named wrapper around a [`Material`].  Volumes refer
/// to media, not materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medium {
    pub name: String,
    pub material: Material,
}

impl Medium {
    pub fn new(name: impl Into<String>, material: Material) -> Self {
        Self {
            name: name.into(),
            material,
        }
    }

    pub fn radiation_length(&self) -> f64 {
        self.material.radiation_length
    }
}
