//! Link records: visual, collision and inertial blocks.

use armature_math::{
    euler_xyz_from_rotation, rotation_from_rpy, rpy_from_rotation, Mat3, Transform, Vec3,
};

use crate::element::XmlElement;
use crate::format_number;

/// A pose: position plus URDF roll-pitch-yaw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Origin {
    pub xyz: [f64; 3],
    pub rpy: [f64; 3],
}

impl Origin {
    /// The zero pose.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Extract position and XYZ Euler angles from a frame transform.
    pub fn from_transform(tf: &Transform) -> Self {
        let t = tf.translation();
        Self {
            xyz: [t.x, t.y, t.z],
            rpy: rpy_from_rotation(&tf.rotation()),
        }
    }

    /// Rebuild the frame transform.
    pub fn to_transform(&self) -> Transform {
        let r = rotation_from_rpy(self.rpy);
        let mut m = Transform::from_translation(Vec3::new(self.xyz[0], self.xyz[1], self.xyz[2]));
        m.matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
        m
    }

    /// Space-joined `xyz` attribute value.
    pub fn xyz_attr(&self) -> String {
        join3(&self.xyz)
    }

    /// Space-joined `rpy` attribute value.
    pub fn rpy_attr(&self) -> String {
        join3(&self.rpy)
    }

    /// Set MJCF `pos`/`euler` on an element, re-expressing the rotation in
    /// MuJoCo's intrinsic XYZ convention.
    pub fn apply_mjcf(&self, element: &mut XmlElement) {
        element.set("pos", self.xyz_attr());
        let euler = euler_xyz_from_rotation(&rotation_from_rpy(self.rpy));
        element.set("euler", join3(&euler));
    }
}

pub(crate) fn join3(values: &[f64; 3]) -> String {
    format!(
        "{} {} {}",
        format_number(values[0]),
        format_number(values[1]),
        format_number(values[2])
    )
}

/// A symmetric inertia tensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Inertia {
    pub ixx: f64,
    pub iyy: f64,
    pub izz: f64,
    pub ixy: f64,
    pub ixz: f64,
    pub iyz: f64,
}

impl Inertia {
    /// All-zero inertia, used for dummy links.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Take the six unique entries of a 3x3 tensor.
    pub fn from_matrix(m: &Mat3) -> Self {
        Self {
            ixx: m[(0, 0)],
            iyy: m[(1, 1)],
            izz: m[(2, 2)],
            ixy: m[(0, 1)],
            ixz: m[(0, 2)],
            iyz: m[(1, 2)],
        }
    }

    /// Rebuild the full tensor.
    pub fn to_matrix(&self) -> Mat3 {
        Mat3::new(
            self.ixx, self.ixy, self.ixz, self.ixy, self.iyy, self.iyz, self.ixz, self.iyz,
            self.izz,
        )
    }
}

/// A named RGBA material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub color: [f64; 4],
}

/// The fixed palette links are colored from.
const PALETTE: [[f64; 4]; 7] = [
    [1.0, 0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0, 1.0],
    [0.0, 0.0, 1.0, 1.0],
    [1.0, 1.0, 0.0, 1.0],
    [0.0, 1.0, 1.0, 1.0],
    [1.0, 0.0, 1.0, 1.0],
    [1.0, 1.0, 1.0, 1.0],
];

impl Material {
    /// Pick a palette color for a link, keyed by its name so repeated
    /// compiles of the same assembly stay bytewise identical.
    pub fn for_link(link_name: &str) -> Self {
        let index = link_name
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        Self {
            name: format!("{link_name}-material"),
            color: PALETTE[index % PALETTE.len()],
        }
    }

    fn rgba_attr(&self) -> String {
        self.color
            .iter()
            .map(|v| format_number(*v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Link geometry, one variant per URDF shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Mesh { filename: String },
    Box { size: [f64; 3] },
    Cylinder { radius: f64, length: f64 },
    Sphere { radius: f64 },
}

impl Geometry {
    /// Set MJCF geometry attributes on a `geom` element.
    pub fn apply_mjcf(&self, geom: &mut XmlElement) {
        match self {
            Geometry::Mesh { filename } => {
                geom.set("type", "mesh");
                let stem = filename
                    .rsplit('/')
                    .next()
                    .unwrap_or(filename)
                    .trim_end_matches(".stl");
                geom.set("mesh", stem);
            }
            Geometry::Box { size } => {
                geom.set("type", "box");
                geom.set("size", join3(&size.map(|v| v / 2.0)));
            }
            Geometry::Cylinder { radius, length } => {
                geom.set("type", "cylinder");
                geom.set(
                    "size",
                    format!("{} {}", format_number(*radius), format_number(length / 2.0)),
                );
            }
            Geometry::Sphere { radius } => {
                geom.set("type", "sphere");
                geom.set("size", format_number(*radius));
            }
        }
    }
}

/// Visual block of a link.
#[derive(Debug, Clone, PartialEq)]
pub struct Visual {
    pub name: Option<String>,
    pub origin: Origin,
    pub geometry: Geometry,
    pub material: Material,
}

/// Collision block of a link.
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub name: Option<String>,
    pub origin: Origin,
    pub geometry: Geometry,
}

/// Inertial block of a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inertial {
    pub origin: Origin,
    pub mass: f64,
    pub inertia: Inertia,
}

/// A rigid body of the robot.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub name: String,
    pub visual: Option<Visual>,
    pub collision: Option<Collision>,
    pub inertial: Option<Inertial>,
}

impl Link {
    /// A massless helper link, used to chain ball-joint axes.
    pub fn dummy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visual: None,
            collision: None,
            inertial: Some(Inertial {
                origin: Origin::zero(),
                mass: 0.0,
                inertia: Inertia::zero(),
            }),
        }
    }

    /// Emit this link as an MJCF `<body>`, positioned at its visual
    /// origin, carrying collision and visual geoms plus the inertial.
    pub fn to_mjcf_body(&self) -> XmlElement {
        let mut body = XmlElement::new("body").with("name", self.name.clone());

        if let Some(visual) = &self.visual {
            body.set("pos", visual.origin.xyz_attr());
            let euler = euler_xyz_from_rotation(&rotation_from_rpy(visual.origin.rpy));
            body.set("euler", join3(&euler));
        }

        if let Some(collision) = &self.collision {
            let mut geom = XmlElement::new("geom");
            if let Some(name) = &collision.name {
                geom.set("name", name.clone());
            }
            geom.set("contype", "1");
            geom.set("conaffinity", "1");
            collision.origin.apply_mjcf(&mut geom);
            collision.geometry.apply_mjcf(&mut geom);
            geom.set("group", "0");
            body.push(geom);
        }

        if let Some(visual) = &self.visual {
            let mut geom = XmlElement::new("geom");
            if let Some(name) = &visual.name {
                geom.set("name", name.clone());
            }
            visual.origin.apply_mjcf(&mut geom);
            visual.geometry.apply_mjcf(&mut geom);
            geom.set("rgba", visual.material.rgba_attr());
            geom.set("conaffinity", "0");
            geom.set("condim", "1");
            geom.set("contype", "0");
            geom.set("density", "0");
            geom.set("group", "1");
            body.push(geom);
        }

        if let Some(inertial) = &self.inertial {
            let mut element = XmlElement::new("inertial");
            element.set("mass", format_number(inertial.mass));
            inertial.origin.apply_mjcf(&mut element);
            element.set(
                "diaginertia",
                join3(&[
                    inertial.inertia.ixx,
                    inertial.inertia.iyy,
                    inertial.inertia.izz,
                ]),
            );
            body.push(element);
        }

        body
    }
}
