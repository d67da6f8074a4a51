#![warn(missing_docs)]

//! Frame math for the armature assembly compiler.
//!
//! Thin wrappers around nalgebra providing the 4x4 coordinate-frame
//! transform used throughout the pipeline, plus the two Euler-angle
//! conventions the emitters need: URDF roll-pitch-yaw (extrinsic x-y-z)
//! and MuJoCo `eulerseq="xyz"` (intrinsic X-Y'-Z'').

use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A 3x3 rotation (or inertia) matrix.
pub type Mat3 = Matrix3<f64>;

/// A 4x4 homogeneous coordinate-frame transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Build from 16 row-major floats, the wire layout of occurrence
    /// and mate transforms.
    pub fn from_row_major(values: &[f64]) -> Option<Self> {
        if values.len() != 16 {
            return None;
        }
        Some(Self {
            matrix: Matrix4::from_row_slice(values),
        })
    }

    /// The 16 row-major floats of this transform.
    pub fn to_row_major(&self) -> [f64; 16] {
        let mut out = [0.0; 16];
        for r in 0..4 {
            for c in 0..4 {
                out[r * 4 + c] = self.matrix[(r, c)];
            }
        }
        out
    }

    /// Translation by `offset`.
    pub fn from_translation(offset: Vec3) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = offset.x;
        m[(1, 3)] = offset.y;
        m[(2, 3)] = offset.z;
        Self { matrix: m }
    }

    /// Build from a rotation whose columns are `x`, `y`, `z` and a
    /// translation `origin`.
    pub fn from_basis(x: Vec3, y: Vec3, z: Vec3, origin: Vec3) -> Self {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 1>(0, 0).copy_from(&x);
        m.fixed_view_mut::<3, 1>(0, 1).copy_from(&y);
        m.fixed_view_mut::<3, 1>(0, 2).copy_from(&z);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&origin);
        Self { matrix: m }
    }

    /// The upper-left 3x3 rotation block.
    pub fn rotation(&self) -> Mat3 {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// The translation column.
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.matrix[(0, 3)], self.matrix[(1, 3)], self.matrix[(2, 3)])
    }

    /// Compose: apply `other` first, then `self` (`self * other`).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point (applies rotation and translation).
    pub fn apply_point(&self, p: &Vec3) -> Vec3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Vec3::new(v.x, v.y, v.z)
    }

    /// Transform a direction (rotation only).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        self.rotation() * v
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Largest absolute elementwise difference to `other`.
    pub fn distance(&self, other: &Transform) -> f64 {
        (self.matrix - other.matrix).abs().max()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// URDF `rpy`: extrinsic rotations about the fixed x, then y, then z axes,
/// i.e. `R = Rz(yaw) * Ry(pitch) * Rx(roll)`.
pub fn rotation_from_rpy(rpy: [f64; 3]) -> Mat3 {
    let (sr, cr) = rpy[0].sin_cos();
    let (sp, cp) = rpy[1].sin_cos();
    let (sy, cy) = rpy[2].sin_cos();
    let rx = Mat3::new(1.0, 0.0, 0.0, 0.0, cr, -sr, 0.0, sr, cr);
    let ry = Mat3::new(cp, 0.0, sp, 0.0, 1.0, 0.0, -sp, 0.0, cp);
    let rz = Mat3::new(cy, -sy, 0.0, sy, cy, 0.0, 0.0, 0.0, 1.0);
    rz * ry * rx
}

/// Recover URDF `rpy` angles from a rotation matrix.
///
/// Near the pitch singularity (`|R31| ≈ 1`) yaw is fixed to zero and the
/// remaining angle folded into roll.
pub fn rpy_from_rotation(r: &Mat3) -> [f64; 3] {
    let sp = -r[(2, 0)];
    if sp.abs() > 1.0 - 1e-12 {
        let pitch = if sp > 0.0 {
            std::f64::consts::FRAC_PI_2
        } else {
            -std::f64::consts::FRAC_PI_2
        };
        let roll = f64::atan2(-r[(0, 1)], r[(1, 1)]);
        [roll, pitch, 0.0]
    } else {
        let pitch = sp.asin();
        let roll = f64::atan2(r[(2, 1)], r[(2, 2)]);
        let yaw = f64::atan2(r[(1, 0)], r[(0, 0)]);
        [roll, pitch, yaw]
    }
}

/// MuJoCo `eulerseq="xyz"`: intrinsic rotations about the body x, y', z''
/// axes, i.e. `R = Rx(a) * Ry(b) * Rz(c)`.
pub fn rotation_from_euler_xyz(euler: [f64; 3]) -> Mat3 {
    let (sa, ca) = euler[0].sin_cos();
    let (sb, cb) = euler[1].sin_cos();
    let (sc, cc) = euler[2].sin_cos();
    let rx = Mat3::new(1.0, 0.0, 0.0, 0.0, ca, -sa, 0.0, sa, ca);
    let ry = Mat3::new(cb, 0.0, sb, 0.0, 1.0, 0.0, -sb, 0.0, cb);
    let rz = Mat3::new(cc, -sc, 0.0, sc, cc, 0.0, 0.0, 0.0, 1.0);
    rx * ry * rz
}

/// Recover intrinsic x-y'-z'' angles from a rotation matrix.
pub fn euler_xyz_from_rotation(r: &Mat3) -> [f64; 3] {
    let sb = r[(0, 2)];
    if sb.abs() > 1.0 - 1e-12 {
        let b = if sb > 0.0 {
            std::f64::consts::FRAC_PI_2
        } else {
            -std::f64::consts::FRAC_PI_2
        };
        let a = f64::atan2(r[(1, 0)], r[(1, 1)]);
        [a, b, 0.0]
    } else {
        let b = sb.asin();
        let a = f64::atan2(-r[(1, 2)], r[(2, 2)]);
        let c = f64::atan2(-r[(0, 1)], r[(0, 0)]);
        [a, b, c]
    }
}

/// Parallel-axis adjustment: the inertia of a body of mass `m` displaced by
/// `d` from the reference point, given its own inertia `i` about its COM:
/// `i + m * (|d|^2 * I3 - d * d^T)`.
pub fn parallel_axis(i: &Mat3, mass: f64, d: &Vec3) -> Mat3 {
    i + mass * (d.norm_squared() * Mat3::identity() - d * d.transpose())
}
