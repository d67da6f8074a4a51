//! URDF emission and parsing.
//!
//! The structs here mirror the URDF XML schema one to one; numbers are
//! pre-formatted to 8 significant figures so serialization is plain
//! string emission. Conversion to and from the typed [`Link`]/[`Joint`]
//! records lives alongside.

use serde::{Deserialize, Serialize};

use crate::joint::{Joint, JointDynamics, JointKind, JointLimits, JointMimic};
use crate::link::{Collision, Geometry, Inertia, Inertial, Link, Material, Origin, Visual};
use crate::{format_number, Result, RobotError};

/// Root `<robot>` element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "robot")]
pub struct XmlRobot {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "link", default)]
    pub links: Vec<XmlLink>,
    #[serde(rename = "joint", default)]
    pub joints: Vec<XmlJoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlLink {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual: Option<XmlVisual>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collision: Option<XmlCollision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inertial: Option<XmlInertial>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlVisual {
    #[serde(rename = "@name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<XmlOrigin>,
    pub geometry: XmlGeometry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<XmlMaterial>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlCollision {
    #[serde(rename = "@name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<XmlOrigin>,
    pub geometry: XmlGeometry,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct XmlOrigin {
    #[serde(rename = "@xyz", skip_serializing_if = "Option::is_none")]
    pub xyz: Option<String>,
    #[serde(rename = "@rpy", skip_serializing_if = "Option::is_none")]
    pub rpy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct XmlGeometry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<XmlMesh>,
    #[serde(rename = "box", skip_serializing_if = "Option::is_none")]
    pub box_geom: Option<XmlBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cylinder: Option<XmlCylinder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sphere: Option<XmlSphere>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlMesh {
    #[serde(rename = "@filename")]
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlBox {
    #[serde(rename = "@size")]
    pub size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlCylinder {
    #[serde(rename = "@radius")]
    pub radius: f64,
    #[serde(rename = "@length")]
    pub length: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlSphere {
    #[serde(rename = "@radius")]
    pub radius: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlMaterial {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<XmlColor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlColor {
    #[serde(rename = "@rgba")]
    pub rgba: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlInertial {
    pub mass: XmlMass,
    pub inertia: XmlInertia,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<XmlOrigin>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlMass {
    #[serde(rename = "@value")]
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct XmlInertia {
    #[serde(rename = "@ixx")]
    pub ixx: f64,
    #[serde(rename = "@iyy")]
    pub iyy: f64,
    #[serde(rename = "@izz")]
    pub izz: f64,
    #[serde(rename = "@ixy")]
    pub ixy: f64,
    #[serde(rename = "@ixz")]
    pub ixz: f64,
    #[serde(rename = "@iyz")]
    pub iyz: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlJoint {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@type")]
    pub joint_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<XmlOrigin>,
    pub parent: XmlLinkRef,
    pub child: XmlLinkRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis: Option<XmlAxis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<XmlLimit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamics: Option<XmlDynamics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimic: Option<XmlMimic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlLinkRef {
    #[serde(rename = "@link")]
    pub link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlAxis {
    #[serde(rename = "@xyz")]
    pub xyz: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct XmlLimit {
    #[serde(rename = "@lower")]
    pub lower: f64,
    #[serde(rename = "@upper")]
    pub upper: f64,
    #[serde(rename = "@effort")]
    pub effort: f64,
    #[serde(rename = "@velocity")]
    pub velocity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct XmlDynamics {
    #[serde(rename = "@damping")]
    pub damping: f64,
    #[serde(rename = "@friction")]
    pub friction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlMimic {
    #[serde(rename = "@joint")]
    pub joint: String,
    #[serde(rename = "@multiplier")]
    pub multiplier: f64,
    #[serde(rename = "@offset")]
    pub offset: f64,
}

fn triple_attr(values: &[f64; 3]) -> String {
    format!(
        "{} {} {}",
        format_number(values[0]),
        format_number(values[1]),
        format_number(values[2])
    )
}

fn parse_triple(s: &str) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (slot, token) in out.iter_mut().zip(s.split_whitespace()) {
        *slot = token.parse().unwrap_or(0.0);
    }
    out
}

fn origin_to_xml(origin: &Origin) -> XmlOrigin {
    XmlOrigin {
        xyz: Some(triple_attr(&origin.xyz)),
        rpy: Some(triple_attr(&origin.rpy)),
    }
}

fn origin_from_xml(origin: Option<&XmlOrigin>) -> Origin {
    match origin {
        Some(o) => Origin {
            xyz: o.xyz.as_deref().map(parse_triple).unwrap_or_default(),
            rpy: o.rpy.as_deref().map(parse_triple).unwrap_or_default(),
        },
        None => Origin::zero(),
    }
}

fn geometry_to_xml(geometry: &Geometry) -> XmlGeometry {
    let mut out = XmlGeometry::default();
    match geometry {
        Geometry::Mesh { filename } => {
            out.mesh = Some(XmlMesh {
                filename: filename.clone(),
            })
        }
        Geometry::Box { size } => {
            out.box_geom = Some(XmlBox {
                size: triple_attr(size),
            })
        }
        Geometry::Cylinder { radius, length } => {
            out.cylinder = Some(XmlCylinder {
                radius: *radius,
                length: *length,
            })
        }
        Geometry::Sphere { radius } => out.sphere = Some(XmlSphere { radius: *radius }),
    }
    out
}

fn geometry_from_xml(geometry: &XmlGeometry) -> Option<Geometry> {
    if let Some(mesh) = &geometry.mesh {
        return Some(Geometry::Mesh {
            filename: mesh.filename.clone(),
        });
    }
    if let Some(b) = &geometry.box_geom {
        return Some(Geometry::Box {
            size: parse_triple(&b.size),
        });
    }
    if let Some(c) = &geometry.cylinder {
        return Some(Geometry::Cylinder {
            radius: c.radius,
            length: c.length,
        });
    }
    geometry
        .sphere
        .as_ref()
        .map(|s| Geometry::Sphere { radius: s.radius })
}

fn link_to_xml(link: &Link) -> XmlLink {
    XmlLink {
        name: link.name.clone(),
        visual: link.visual.as_ref().map(|v| XmlVisual {
            name: v.name.clone(),
            origin: Some(origin_to_xml(&v.origin)),
            geometry: geometry_to_xml(&v.geometry),
            material: Some(XmlMaterial {
                name: v.material.name.clone(),
                color: Some(XmlColor {
                    rgba: v
                        .material
                        .color
                        .iter()
                        .map(|c| format_number(*c))
                        .collect::<Vec<_>>()
                        .join(" "),
                }),
            }),
        }),
        collision: link.collision.as_ref().map(|c| XmlCollision {
            name: c.name.clone(),
            origin: Some(origin_to_xml(&c.origin)),
            geometry: geometry_to_xml(&c.geometry),
        }),
        inertial: link.inertial.as_ref().map(|i| XmlInertial {
            mass: XmlMass { value: i.mass },
            inertia: XmlInertia {
                ixx: i.inertia.ixx,
                iyy: i.inertia.iyy,
                izz: i.inertia.izz,
                ixy: i.inertia.ixy,
                ixz: i.inertia.ixz,
                iyz: i.inertia.iyz,
            },
            origin: Some(origin_to_xml(&i.origin)),
        }),
    }
}

fn link_from_xml(link: &XmlLink) -> Link {
    Link {
        name: link.name.clone(),
        visual: link.visual.as_ref().and_then(|v| {
            Some(Visual {
                name: v.name.clone(),
                origin: origin_from_xml(v.origin.as_ref()),
                geometry: geometry_from_xml(&v.geometry)?,
                material: v
                    .material
                    .as_ref()
                    .map(|m| {
                        let mut color = [0.5, 0.5, 0.5, 1.0];
                        if let Some(c) = &m.color {
                            for (slot, token) in
                                color.iter_mut().zip(c.rgba.split_whitespace())
                            {
                                *slot = token.parse().unwrap_or(0.0);
                            }
                        }
                        Material {
                            name: m.name.clone(),
                            color,
                        }
                    })
                    .unwrap_or_else(|| Material::for_link(&link.name)),
            })
        }),
        collision: link.collision.as_ref().and_then(|c| {
            Some(Collision {
                name: c.name.clone(),
                origin: origin_from_xml(c.origin.as_ref()),
                geometry: geometry_from_xml(&c.geometry)?,
            })
        }),
        inertial: link.inertial.as_ref().map(|i| Inertial {
            origin: origin_from_xml(i.origin.as_ref()),
            mass: i.mass.value,
            inertia: Inertia {
                ixx: i.inertia.ixx,
                iyy: i.inertia.iyy,
                izz: i.inertia.izz,
                ixy: i.inertia.ixy,
                ixz: i.inertia.ixz,
                iyz: i.inertia.iyz,
            },
        }),
    }
}

fn joint_to_xml(joint: &Joint) -> XmlJoint {
    XmlJoint {
        name: joint.name.clone(),
        joint_type: joint.kind.urdf_type().to_owned(),
        origin: Some(origin_to_xml(&joint.origin)),
        parent: XmlLinkRef {
            link: joint.parent.clone(),
        },
        child: XmlLinkRef {
            link: joint.child.clone(),
        },
        axis: joint.axis.map(|xyz| XmlAxis {
            xyz: triple_attr(&xyz),
        }),
        limit: joint.limits.map(|l| XmlLimit {
            lower: l.lower,
            upper: l.upper,
            effort: l.effort,
            velocity: l.velocity,
        }),
        dynamics: joint.dynamics.map(|d| XmlDynamics {
            damping: d.damping,
            friction: d.friction,
        }),
        mimic: joint.mimic.as_ref().map(|m| XmlMimic {
            joint: m.joint.clone(),
            multiplier: m.multiplier,
            offset: m.offset,
        }),
    }
}

fn joint_from_xml(joint: &XmlJoint) -> Option<Joint> {
    Some(Joint {
        name: joint.name.clone(),
        kind: JointKind::from_urdf_type(&joint.joint_type)?,
        parent: joint.parent.link.clone(),
        child: joint.child.link.clone(),
        origin: origin_from_xml(joint.origin.as_ref()),
        axis: joint.axis.as_ref().map(|a| parse_triple(&a.xyz)),
        limits: joint.limit.as_ref().map(|l| JointLimits {
            lower: l.lower,
            upper: l.upper,
            effort: l.effort,
            velocity: l.velocity,
        }),
        dynamics: joint.dynamics.as_ref().map(|d| JointDynamics {
            damping: d.damping,
            friction: d.friction,
        }),
        mimic: joint.mimic.as_ref().map(|m| JointMimic {
            joint: m.joint.clone(),
            multiplier: m.multiplier,
            offset: m.offset,
        }),
    })
}

/// Serialize a robot's links and joints into a URDF document with the
/// XML declaration prepended and a two-space indent.
pub fn write_urdf(name: &str, links: &[Link], joints: &[Joint]) -> Result<String> {
    use serde::Serialize as _;

    let xml = XmlRobot {
        name: name.to_owned(),
        links: links.iter().map(link_to_xml).collect(),
        joints: joints.iter().map(joint_to_xml).collect(),
    };
    let mut buf = String::new();
    let mut serializer = quick_xml::se::Serializer::new(&mut buf);
    serializer.indent(' ', 2);
    xml.serialize(serializer)?;
    Ok(format!("<?xml version=\"1.0\" ?>\n{buf}\n"))
}

/// Parse a URDF document back into typed links and joints. Joints whose
/// type attribute is unknown are dropped.
pub fn read_urdf(content: &str) -> Result<(String, Vec<Link>, Vec<Joint>)> {
    let xml: XmlRobot = quick_xml::de::from_str(content).map_err(RobotError::Xml)?;
    let links = xml.links.iter().map(link_from_xml).collect();
    let joints = xml.joints.iter().filter_map(joint_from_xml).collect();
    Ok((xml.name, links, joints))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Origin;

    fn sample_link() -> Link {
        Link {
            name: "base".into(),
            visual: Some(Visual {
                name: Some("base-visual".into()),
                origin: Origin::zero(),
                geometry: Geometry::Mesh {
                    filename: "meshes/base.stl".into(),
                },
                material: Material::for_link("base"),
            }),
            collision: Some(Collision {
                name: Some("base-collision".into()),
                origin: Origin::zero(),
                geometry: Geometry::Mesh {
                    filename: "meshes/base.stl".into(),
                },
            }),
            inertial: Some(Inertial {
                origin: Origin {
                    xyz: [0.0, -0.0505, 0.0],
                    rpy: [0.0; 3],
                },
                mass: 0.7,
                inertia: Inertia {
                    ixx: 0.01,
                    iyy: 0.02,
                    izz: 0.03,
                    ixy: 0.0,
                    ixz: 0.0,
                    iyz: 0.0,
                },
            }),
        }
    }

    fn sample_joint() -> Joint {
        Joint {
            name: "j1".into(),
            kind: JointKind::Revolute,
            parent: "base".into(),
            child: "arm".into(),
            origin: Origin {
                xyz: [0.0, -0.0505, 0.0],
                rpy: [1.5707963, 0.0, 0.0],
            },
            axis: Some([0.0, 0.0, -1.0]),
            limits: None,
            dynamics: None,
            mimic: Some(JointMimic {
                joint: "j0".into(),
                multiplier: 2.0,
                offset: 0.0,
            }),
        }
    }

    #[test]
    fn writes_declaration_and_shape() {
        let urdf = write_urdf("bot", &[sample_link()], &[sample_joint()]).unwrap();
        assert!(urdf.starts_with("<?xml version=\"1.0\" ?>\n<robot name=\"bot\">"));
        assert!(urdf.contains("<link name=\"base\">"));
        assert!(urdf.contains("<joint name=\"j1\" type=\"revolute\">"));
        assert!(urdf.contains("<mimic joint=\"j0\" multiplier=\"2\" offset=\"0\"/>"));
        assert!(urdf.contains("<axis xyz=\"0 0 -1\"/>"));
        assert!(urdf.contains("xyz=\"0 -0.0505 0\""));
    }

    #[test]
    fn roundtrip_preserves_structure() {
        let links = vec![sample_link()];
        let joints = vec![sample_joint()];
        let urdf = write_urdf("bot", &links, &joints).unwrap();
        let (name, parsed_links, parsed_joints) = read_urdf(&urdf).unwrap();
        assert_eq!(name, "bot");
        assert_eq!(parsed_links.len(), 1);
        assert_eq!(parsed_joints.len(), 1);
        assert_eq!(parsed_joints[0].kind, JointKind::Revolute);
        assert_eq!(parsed_joints[0].axis, Some([0.0, 0.0, -1.0]));

        // Re-emitting the parsed model reproduces the document.
        let again = write_urdf(&name, &parsed_links, &parsed_joints).unwrap();
        assert_eq!(urdf, again);
    }

    #[test]
    fn reads_hand_written_urdf() {
        let content = r#"<?xml version="1.0" ?>
<robot name="simple">
  <link name="a">
    <visual>
      <geometry>
        <box size="0.1 0.2 0.3"/>
      </geometry>
    </visual>
  </link>
  <link name="b"/>
  <joint name="a_to_b" type="fixed">
    <origin xyz="0 0 0.15" rpy="0 0 0"/>
    <parent link="a"/>
    <child link="b"/>
  </joint>
</robot>"#;
        let (name, links, joints) = read_urdf(content).unwrap();
        assert_eq!(name, "simple");
        assert_eq!(links.len(), 2);
        assert!(matches!(
            links[0].visual.as_ref().unwrap().geometry,
            Geometry::Box { .. }
        ));
        assert_eq!(joints[0].kind, JointKind::Fixed);
    }
}
