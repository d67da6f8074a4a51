//! Mass properties of a solid, as reported by the CAD mass endpoint.

use armature_math::{Mat3, Transform, Vec3};
use serde::{Deserialize, Serialize};

/// One principal axis of the inertia ellipsoid.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrincipalAxis {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// Mass properties record. Scalar quantities arrive as `[value, min, max]`
/// triples; only the value is used here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MassProperties {
    pub mass: Vec<f64>,
    #[serde(default)]
    pub volume: Vec<f64>,
    pub centroid: Vec<f64>,
    /// Row-major 3x3 inertia tensor about the centroid (first 9 entries).
    pub inertia: Vec<f64>,
    #[serde(default)]
    pub principal_inertia: Vec<f64>,
    #[serde(default)]
    pub principal_axes: Vec<PrincipalAxis>,
}

impl MassProperties {
    /// An all-zero record, used when a part's fetch fails and the part is
    /// kept with zero inertia.
    pub fn zero() -> Self {
        Self {
            mass: vec![0.0; 3],
            volume: vec![0.0; 3],
            centroid: vec![0.0; 3],
            inertia: vec![0.0; 9],
            principal_inertia: vec![0.0; 3],
            principal_axes: Vec::new(),
        }
    }

    /// The mass value in kilograms.
    pub fn mass(&self) -> f64 {
        self.mass.first().copied().unwrap_or(0.0)
    }

    /// Center of mass in the body frame.
    pub fn center_of_mass(&self) -> Vec3 {
        Vec3::new(
            self.centroid.first().copied().unwrap_or(0.0),
            self.centroid.get(1).copied().unwrap_or(0.0),
            self.centroid.get(2).copied().unwrap_or(0.0),
        )
    }

    /// The 3x3 inertia tensor.
    pub fn inertia_matrix(&self) -> Mat3 {
        let mut m = Mat3::zeros();
        for r in 0..3 {
            for c in 0..3 {
                m[(r, c)] = self.inertia.get(r * 3 + c).copied().unwrap_or(0.0);
            }
        }
        m
    }

    /// The inertia tensor re-expressed in a frame rotated by `reference`:
    /// `R * I * R^T`.
    pub fn inertia_wrt(&self, reference: &Mat3) -> Mat3 {
        reference * self.inertia_matrix() * reference.transpose()
    }

    /// The center of mass re-expressed through a full 4x4 `reference`.
    pub fn center_of_mass_wrt(&self, reference: &Transform) -> Vec3 {
        reference.apply_point(&self.center_of_mass())
    }
}
