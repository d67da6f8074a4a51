//! The robot description: links and joints in insertion order, the mesh
//! assets behind them, and the MJCF user-layer state.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use armature_client::{download_assets, CadClient, MeshAsset, StlTransformer, WorkspaceType};
use armature_math::Transform;
use armature_model::name::uniquify;
use tracing::{info, warn};

use crate::element::XmlElement;
use crate::joint::Joint;
use crate::link::{Geometry, Link};
use crate::mjcf::{self, Actuator, CustomElement, Light, Sensor};
use crate::urdf;
use crate::{Result, RobotError};

/// Which description format to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Urdf,
    Mjcf,
}

impl OutputFormat {
    /// File extension of the artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Urdf => "urdf",
            OutputFormat::Mjcf => "xml",
        }
    }

    /// Parse a user-facing format name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "urdf" => Some(OutputFormat::Urdf),
            "mjcf" | "xml" => Some(OutputFormat::Mjcf),
            _ => None,
        }
    }
}

/// A compiled robot description.
#[derive(Debug, Clone, Default)]
pub struct Robot {
    pub name: String,
    pub links: Vec<Link>,
    pub joints: Vec<Joint>,
    /// Mesh assets keyed by link name; BTreeMap keeps emission stable.
    pub assets: BTreeMap<String, MeshAsset>,
    pub lights: Vec<(String, Light)>,
    pub actuators: Vec<(String, Actuator)>,
    pub sensors: Vec<(String, Sensor)>,
    pub custom_elements: Vec<(String, CustomElement)>,
    pub overrides: Vec<(String, Vec<(String, String)>)>,
    /// World pose of the free-jointed robot root body.
    pub position: [f64; 3],
    pub ground_position: [f64; 3],
    pub compiler_attributes: Vec<(String, String)>,
    pub option_attributes: Vec<(String, String)>,
}

impl Robot {
    /// A robot with the default MJCF compiler and option blocks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            compiler_attributes: vec![
                ("angle".into(), "radian".into()),
                ("eulerseq".into(), "xyz".into()),
            ],
            option_attributes: vec![
                ("timestep".into(), "0.001".into()),
                ("gravity".into(), "0 0 -9.81".into()),
                ("iterations".into(), "50".into()),
            ],
            ..Default::default()
        }
    }

    /// Whether a link with this name exists.
    pub fn has_link(&self, name: &str) -> bool {
        self.links.iter().any(|l| l.name == name)
    }

    /// Append a link.
    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    /// Append a joint.
    pub fn add_joint(&mut self, joint: Joint) {
        self.joints.push(joint);
    }

    /// Rename duplicate link and joint names by appending `-1, -2, …` in
    /// insertion order. The first occurrence keeps its name, so existing
    /// references (joint endpoints, mimic targets) resolve to it.
    pub fn uniquify_names(&mut self) {
        let link_names: Vec<String> = self.links.iter().map(|l| l.name.clone()).collect();
        for (link, new_name) in self.links.iter_mut().zip(uniquify(&link_names)) {
            if link.name != new_name {
                warn!(old = %link.name, new = %new_name, "renaming duplicate link");
                link.name = new_name;
            }
        }

        let joint_names: Vec<String> = self.joints.iter().map(|j| j.name.clone()).collect();
        for (joint, new_name) in self.joints.iter_mut().zip(uniquify(&joint_names)) {
            if joint.name != new_name {
                warn!(old = %joint.name, new = %new_name, "renaming duplicate joint");
                joint.name = new_name;
            }
        }
    }

    /// Assert the post-uniquification invariants: pairwise-distinct names
    /// and joints whose endpoints exist.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for link in &self.links {
            if !seen.insert(&link.name) {
                return Err(RobotError::DuplicateName(link.name.clone()));
            }
        }
        let mut seen = HashSet::new();
        for joint in &self.joints {
            if !seen.insert(&joint.name) {
                return Err(RobotError::DuplicateName(joint.name.clone()));
            }
            for link in [&joint.parent, &joint.child] {
                if !self.has_link(link) {
                    return Err(RobotError::UnknownLink {
                        joint: joint.name.clone(),
                        link: link.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Serialize to URDF.
    pub fn to_urdf(&self) -> Result<String> {
        urdf::write_urdf(&self.name, &self.links, &self.joints)
    }

    /// Serialize to MJCF.
    pub fn to_mjcf(&self) -> Result<String> {
        mjcf::emit(self)
    }

    /// Write the description (and, when `download` is set, the meshes)
    /// under `out_dir`. Returns the description path.
    pub async fn save<C: CadClient, T: StlTransformer>(
        &self,
        out_dir: &Path,
        format: OutputFormat,
        download: bool,
        client: &C,
        transformer: &T,
    ) -> Result<PathBuf> {
        if download && !self.assets.is_empty() {
            download_assets(self.assets.values(), client, transformer, out_dir).await?;
        }

        let content = match format {
            OutputFormat::Urdf => self.to_urdf()?,
            OutputFormat::Mjcf => self.to_mjcf()?,
        };
        let path = out_dir.join(format!("{}.{}", self.name, format.extension()));
        tokio::fs::write(&path, content).await?;
        info!(path = %path.display(), "robot description saved");
        Ok(path)
    }

    /// Rebuild a robot from URDF text, registering file-backed assets for
    /// every referenced mesh.
    pub fn from_urdf_str(content: &str) -> Result<Self> {
        let (name, links, joints) = urdf::read_urdf(content)?;
        let mut robot = Robot::new(name);
        for link in &links {
            for geometry in link
                .visual
                .as_ref()
                .map(|v| &v.geometry)
                .into_iter()
                .chain(link.collision.as_ref().map(|c| &c.geometry))
            {
                if let Geometry::Mesh { filename } = geometry {
                    let file_name = filename
                        .rsplit('/')
                        .next()
                        .unwrap_or(filename.as_str())
                        .to_owned();
                    robot.assets.entry(link.name.clone()).or_insert(MeshAsset {
                        did: String::new(),
                        wtype: WorkspaceType::Workspace,
                        wid: String::new(),
                        eid: String::new(),
                        part_id: String::new(),
                        is_rigid_assembly: false,
                        file_name,
                        stl_to_link_tf: Transform::identity(),
                        is_from_file: true,
                    });
                }
            }
        }
        robot.links = links;
        robot.joints = joints;
        Ok(robot)
    }

    /// Load a URDF file from disk.
    pub fn from_urdf_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_urdf_str(&content)
    }

    /// Set the world pose of the robot root body.
    pub fn set_robot_position(&mut self, position: [f64; 3]) {
        self.position = position;
    }

    /// Set the ground plane position.
    pub fn set_ground_position(&mut self, position: [f64; 3]) {
        self.ground_position = position;
    }

    /// Replace the `<compiler>` attribute set.
    pub fn set_compiler_attributes(&mut self, attributes: Vec<(String, String)>) {
        self.compiler_attributes = attributes;
    }

    /// Replace the `<option>` attribute set.
    pub fn set_option_attributes(&mut self, attributes: Vec<(String, String)>) {
        self.option_attributes = attributes;
    }

    /// Register a light in the world body.
    pub fn add_light(&mut self, name: impl Into<String>, light: Light) {
        self.lights.push((name.into(), light));
    }

    /// Register a motor on a joint, optionally with encoder and force
    /// sensors wired to it.
    pub fn add_actuator(
        &mut self,
        actuator_name: impl Into<String>,
        joint_name: impl Into<String>,
        ctrl_limited: bool,
        ctrl_range: (f64, f64),
        gear: f64,
        add_encoder: bool,
        add_force_sensor: bool,
    ) {
        let actuator_name = actuator_name.into();
        self.actuators.push((
            actuator_name.clone(),
            Actuator {
                name: actuator_name.clone(),
                joint: joint_name.into(),
                ctrl_limited,
                ctrl_range,
                gear,
            },
        ));
        if add_encoder {
            let name = format!("{actuator_name}-enc");
            self.add_sensor(
                name.clone(),
                Sensor::Encoder {
                    name,
                    actuator: actuator_name.clone(),
                },
            );
        }
        if add_force_sensor {
            let name = format!("{actuator_name}-frc");
            self.add_sensor(
                name.clone(),
                Sensor::Force {
                    name,
                    actuator: actuator_name.clone(),
                },
            );
        }
    }

    /// Register a sensor.
    pub fn add_sensor(&mut self, name: impl Into<String>, sensor: Sensor) {
        self.sensors.push((name.into(), sensor));
    }

    /// Insert `element` under the first element with tag `parent_tag`
    /// once the MJCF tree is assembled.
    pub fn add_custom_element_by_tag(
        &mut self,
        name: impl Into<String>,
        parent_tag: impl Into<String>,
        element: XmlElement,
    ) {
        self.custom_elements.push((
            name.into(),
            CustomElement {
                parent: parent_tag.into(),
                by_tag: true,
                element,
            },
        ));
    }

    /// Insert `element` under the element whose `name` attribute is
    /// `parent_name`.
    pub fn add_custom_element_by_name(
        &mut self,
        name: impl Into<String>,
        parent_name: impl Into<String>,
        element: XmlElement,
    ) {
        self.custom_elements.push((
            name.into(),
            CustomElement {
                parent: parent_name.into(),
                by_tag: false,
                element,
            },
        ));
    }

    /// Set attributes on a named element as the final emission step,
    /// without regard to schema.
    pub fn set_element_attributes(
        &mut self,
        element_name: impl Into<String>,
        attributes: Vec<(String, String)>,
    ) {
        self.overrides.push((element_name.into(), attributes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::{JointKind, JointMimic};
    use crate::link::Origin;

    fn link(name: &str) -> Link {
        Link {
            name: name.into(),
            visual: None,
            collision: None,
            inertial: None,
        }
    }

    fn joint(name: &str, parent: &str, child: &str) -> Joint {
        Joint::fixed(name, parent, child, Origin::zero())
    }

    #[test]
    fn uniquify_renames_in_insertion_order() {
        let mut robot = Robot::new("bot");
        robot.add_link(link("part"));
        robot.add_link(link("part"));
        robot.add_link(link("part"));
        robot.add_joint(joint("j", "part", "part"));
        robot.uniquify_names();

        let names: Vec<&str> = robot.links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["part", "part-1", "part-2"]);
        robot.validate().unwrap();
    }

    #[test]
    fn uniquify_rewrites_mimic_references() {
        let mut robot = Robot::new("bot");
        for name in ["a", "b", "c"] {
            robot.add_link(link(name));
        }
        robot.add_joint(joint("drive", "a", "b"));
        let follower = Joint {
            kind: JointKind::Revolute,
            axis: Some([0.0, 0.0, -1.0]),
            mimic: Some(JointMimic {
                joint: "drive".into(),
                multiplier: 2.0,
                offset: 0.0,
            }),
            ..joint("drive", "a", "c")
        };
        robot.add_joint(follower);
        robot.uniquify_names();

        assert_eq!(robot.joints[0].name, "drive");
        assert_eq!(robot.joints[1].name, "drive-1");
        // The mimic keeps pointing at the original joint.
        assert_eq!(robot.joints[1].mimic.as_ref().unwrap().joint, "drive");
    }

    #[test]
    fn validate_flags_unknown_links() {
        let mut robot = Robot::new("bot");
        robot.add_link(link("a"));
        robot.add_joint(joint("j", "a", "ghost"));
        assert!(matches!(
            robot.validate(),
            Err(RobotError::UnknownLink { .. })
        ));
    }

    #[test]
    fn urdf_import_registers_assets() {
        let content = r#"<?xml version="1.0" ?>
<robot name="bot">
  <link name="base">
    <visual>
      <geometry>
        <mesh filename="meshes/base.stl"/>
      </geometry>
    </visual>
  </link>
</robot>"#;
        let robot = Robot::from_urdf_str(content).unwrap();
        let asset = robot.assets.get("base").unwrap();
        assert!(asset.is_from_file);
        assert_eq!(asset.file_name, "base.stl");
    }
}
