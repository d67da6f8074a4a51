//! MJCF scene emission.
//!
//! Builds a `<mujoco>` element tree from the robot graph. Fixed joints do
//! not exist in MJCF bodies the way URDF models them, so they are
//! dissolved: the child body's geometry is folded into the surviving
//! parent with composed transforms, and the inertials are combined with
//! the parallel-axis theorem. Non-fixed joints then nest their child
//! bodies with the joint frame baked into the body pose.

use armature_math::{
    euler_xyz_from_rotation, parallel_axis, rotation_from_euler_xyz, rotation_from_rpy, Mat3, Vec3,
};
use std::collections::HashMap;
use tracing::warn;

use crate::element::XmlElement;
use crate::format_number;
use crate::link::join3;
use crate::robot::Robot;
use crate::Result;

/// A light source in the world body.
#[derive(Debug, Clone)]
pub struct Light {
    pub directional: bool,
    pub diffuse: [f64; 3],
    pub specular: [f64; 3],
    pub pos: [f64; 3],
    pub direction: [f64; 3],
    pub castshadow: bool,
}

impl Light {
    fn to_mjcf(&self, worldbody: &mut XmlElement) {
        let mut light = XmlElement::new("light");
        light.set("directional", bool_attr(self.directional));
        light.set("diffuse", join3(&self.diffuse));
        light.set("specular", join3(&self.specular));
        light.set("pos", join3(&self.pos));
        light.set("dir", join3(&self.direction));
        light.set("castshadow", bool_attr(self.castshadow));
        worldbody.push(light);
    }
}

/// A `<motor>` actuator bound to a joint.
#[derive(Debug, Clone)]
pub struct Actuator {
    pub name: String,
    pub joint: String,
    pub ctrl_limited: bool,
    pub ctrl_range: (f64, f64),
    pub gear: f64,
}

impl Actuator {
    fn to_mjcf(&self, block: &mut XmlElement) {
        let mut motor = XmlElement::new("motor");
        motor.set("name", self.name.clone());
        motor.set("joint", self.joint.clone());
        motor.set("ctrllimited", bool_attr(self.ctrl_limited));
        if self.ctrl_limited {
            motor.set(
                "ctrlrange",
                format!(
                    "{} {}",
                    format_number(self.ctrl_range.0),
                    format_number(self.ctrl_range.1)
                ),
            );
        }
        motor.set("gear", format_number(self.gear));
        block.push(motor);
    }
}

/// Sensors emitted into the `<sensor>` block.
#[derive(Debug, Clone)]
pub enum Sensor {
    /// Joint encoder: actuator position plus velocity channels.
    Encoder { name: String, actuator: String },
    /// Actuator force channel.
    Force { name: String, actuator: String },
    /// Angular velocity at a site.
    Gyro {
        name: String,
        site: String,
        noise: Option<f64>,
    },
    /// Body orientation (frame quaternion).
    Imu {
        name: String,
        objtype: String,
        objname: String,
        noise: Option<f64>,
    },
}

impl Sensor {
    fn to_mjcf(&self, block: &mut XmlElement) {
        match self {
            Sensor::Encoder { name, actuator } => {
                block.push(
                    XmlElement::new("actuatorpos")
                        .with("name", format!("{name}-pos"))
                        .with("actuator", actuator.clone()),
                );
                block.push(
                    XmlElement::new("actuatorvel")
                        .with("name", format!("{name}-vel"))
                        .with("actuator", actuator.clone()),
                );
            }
            Sensor::Force { name, actuator } => {
                block.push(
                    XmlElement::new("actuatorfrc")
                        .with("name", name.clone())
                        .with("actuator", actuator.clone()),
                );
            }
            Sensor::Gyro { name, site, noise } => {
                let mut gyro = XmlElement::new("gyro")
                    .with("name", name.clone())
                    .with("site", site.clone());
                if let Some(noise) = noise {
                    gyro.set("noise", format_number(*noise));
                }
                block.push(gyro);
            }
            Sensor::Imu {
                name,
                objtype,
                objname,
                noise,
            } => {
                let mut imu = XmlElement::new("framequat")
                    .with("name", name.clone())
                    .with("objtype", objtype.clone())
                    .with("objname", objname.clone());
                if let Some(noise) = noise {
                    imu.set("noise", format_number(*noise));
                }
                block.push(imu);
            }
        }
    }
}

/// A user-registered element, inserted after the tree is assembled.
#[derive(Debug, Clone)]
pub struct CustomElement {
    /// Tag name (when `by_tag`) or `name` attribute of the parent.
    pub parent: String,
    /// Whether `parent` addresses a tag or a `name` attribute.
    pub by_tag: bool,
    pub element: XmlElement,
}

fn bool_attr(v: bool) -> &'static str {
    if v {
        "true"
    } else {
        "false"
    }
}

fn parse3(value: Option<&str>) -> [f64; 3] {
    let mut out = [0.0; 3];
    if let Some(s) = value {
        for (slot, token) in out.iter_mut().zip(s.split_whitespace()) {
            *slot = token.parse().unwrap_or(0.0);
        }
    }
    out
}

fn vec3(a: [f64; 3]) -> Vec3 {
    Vec3::new(a[0], a[1], a[2])
}

/// Running inertial accumulator for one surviving parent body.
struct InertialAccum {
    mass: f64,
    weighted_pos: Vec3,
    weighted_euler: Vec3,
    inertia: Mat3,
}

impl InertialAccum {
    fn new() -> Self {
        Self {
            mass: 0.0,
            weighted_pos: Vec3::zeros(),
            weighted_euler: Vec3::zeros(),
            inertia: Mat3::zeros(),
        }
    }

    /// Fold in one inertial element already expressed in the surviving
    /// parent's frame.
    fn add(&mut self, mass: f64, pos: Vec3, euler: [f64; 3], diaginertia: [f64; 3]) {
        let rot = rotation_from_euler_xyz(euler);
        let diag = Mat3::from_diagonal(&vec3(diaginertia));
        self.inertia += parallel_axis(&(rot * diag * rot.transpose()), mass, &pos);
        self.mass += mass;
        self.weighted_pos += pos * mass;
        self.weighted_euler += vec3(euler) * mass;
    }

    fn write_into(&self, inertial: &mut XmlElement) {
        let (pos, euler) = if self.mass > 0.0 {
            (self.weighted_pos / self.mass, self.weighted_euler / self.mass)
        } else {
            (Vec3::zeros(), Vec3::zeros())
        };
        inertial.set("mass", format_number(self.mass));
        inertial.set("pos", join3(&[pos.x, pos.y, pos.z]));
        inertial.set("euler", join3(&[euler.x, euler.y, euler.z]));
        inertial.set(
            "diaginertia",
            join3(&[
                self.inertia[(0, 0)],
                self.inertia[(1, 1)],
                self.inertia[(2, 2)],
            ]),
        );
    }
}

/// Locate a body element by name, either still detached or already in the
/// assembled tree.
fn body_mut<'a>(
    tree: &'a mut XmlElement,
    detached: &'a mut Vec<(String, XmlElement)>,
    name: &str,
) -> Option<&'a mut XmlElement> {
    if tree.contains_named(name) {
        return tree.find_named_mut(name);
    }
    for (_, element) in detached.iter_mut() {
        if element.name() == Some(name) {
            return Some(element);
        }
        if element.contains_named(name) {
            return element.find_named_mut(name);
        }
    }
    None
}

/// Take ownership of a body element wherever it currently lives.
fn take_body(
    tree: &mut XmlElement,
    detached: &mut Vec<(String, XmlElement)>,
    name: &str,
) -> Option<XmlElement> {
    if let Some(index) = detached.iter().position(|(n, _)| n == name) {
        return Some(detached.remove(index).1);
    }
    if let Some(found) = tree.detach_named(name) {
        return Some(found);
    }
    for (_, element) in detached.iter_mut() {
        if let Some(found) = element.detach_named(name) {
            return Some(found);
        }
    }
    None
}

/// Follow the body map to the surviving ancestor of a dissolved link.
fn resolve<'a>(body_map: &'a HashMap<String, String>, mut name: &'a str) -> &'a str {
    while let Some(next) = body_map.get(name) {
        if next == name {
            break;
        }
        name = next;
    }
    name
}

/// Emit the MJCF document for a robot.
pub fn emit(robot: &Robot) -> Result<String> {
    let model = emit_tree(robot)?;
    Ok(format!(
        "<?xml version=\"1.0\" ?>\n{}",
        model.to_pretty_string()
    ))
}

/// Build the full `<mujoco>` element tree.
pub(crate) fn emit_tree(robot: &Robot) -> Result<XmlElement> {
    let mut model = XmlElement::new("mujoco").with("model", robot.name.clone());

    let mut compiler = XmlElement::new("compiler");
    for (key, value) in &robot.compiler_attributes {
        compiler.set(key.clone(), value.clone());
    }
    model.push(compiler);

    let mut option = XmlElement::new("option");
    for (key, value) in &robot.option_attributes {
        option.set(key.clone(), value.clone());
    }
    model.push(option);

    let mut asset_block = XmlElement::new("asset");
    for asset in robot.assets.values() {
        let stem = asset.file_name.trim_end_matches(".stl");
        asset_block.push(
            XmlElement::new("mesh")
                .with("name", stem)
                .with("file", asset.relative_path()),
        );
    }
    model.push(asset_block);

    let mut worldbody = XmlElement::new("worldbody");
    for (_, light) in &robot.lights {
        light.to_mjcf(&mut worldbody);
    }

    let mut root_body = XmlElement::new("body")
        .with("name", robot.name.clone())
        .with("pos", join3(&robot.position));
    root_body.push(XmlElement::new("freejoint").with("name", format!("{}_freejoint", robot.name)));

    // Bodies start detached; joints decide where each one ends up.
    let mut detached: Vec<(String, XmlElement)> = robot
        .links
        .iter()
        .map(|link| (link.name.clone(), link.to_mjcf_body()))
        .collect();

    let mut body_map: HashMap<String, String> = HashMap::new();
    let mut dissolved: HashMap<String, (Vec3, Mat3)> = HashMap::new();
    let mut accumulators: HashMap<String, InertialAccum> = HashMap::new();

    // Pass 1: dissolve fixed joints.
    for joint in robot.joints.iter().filter(|j| j.is_fixed()) {
        let survivor = resolve(&body_map, &joint.parent).to_owned();

        let mut joint_pos = vec3(joint.origin.xyz);
        let mut joint_rot = rotation_from_rpy(joint.origin.rpy);
        if let Some((parent_pos, parent_rot)) = dissolved.get(&joint.parent) {
            joint_pos = parent_rot * joint_pos + parent_pos;
            joint_rot = parent_rot * joint_rot;
        }
        dissolved.insert(joint.child.clone(), (joint_pos, joint_rot));

        let Some(child_body) = take_body(&mut root_body, &mut detached, &joint.child) else {
            warn!(joint = %joint.name, child = %joint.child, "fixed joint child body missing");
            continue;
        };

        let accum = accumulators.entry(survivor.clone()).or_insert_with(|| {
            let mut accum = InertialAccum::new();
            // Seed with the surviving parent's own inertial.
            if let Some(parent_body) = body_mut(&mut root_body, &mut detached, &survivor) {
                if let Some(index) = parent_body
                    .children
                    .iter()
                    .position(|c| c.tag == "inertial")
                {
                    let inertial = &parent_body.children[index];
                    accum.add(
                        inertial
                            .get("mass")
                            .and_then(|m| m.parse().ok())
                            .unwrap_or(0.0),
                        vec3(parse3(inertial.get("pos"))),
                        parse3(inertial.get("euler")),
                        parse3(inertial.get("diaginertia")),
                    );
                }
            }
            accum
        });

        let mut carried: Vec<XmlElement> = Vec::new();
        for mut element in child_body.children {
            match element.tag.as_str() {
                "inertial" => {
                    let pos = joint_rot * vec3(parse3(element.get("pos"))) + joint_pos;
                    let rot = joint_rot * rotation_from_euler_xyz(parse3(element.get("euler")));
                    accum.add(
                        element.get("mass").and_then(|m| m.parse().ok()).unwrap_or(0.0),
                        pos,
                        euler_xyz_from_rotation(&rot),
                        parse3(element.get("diaginertia")),
                    );
                }
                "geom" => {
                    let pos = joint_rot * vec3(parse3(element.get("pos"))) + joint_pos;
                    let rot = joint_rot * rotation_from_euler_xyz(parse3(element.get("euler")));
                    let euler = euler_xyz_from_rotation(&rot);
                    element.set("pos", join3(&[pos.x, pos.y, pos.z]));
                    element.set("euler", join3(&euler));
                    carried.push(element);
                }
                _ => carried.push(element),
            }
        }
        if let Some(parent_body) = body_mut(&mut root_body, &mut detached, &survivor) {
            for element in carried {
                parent_body.push(element);
            }
        }
        body_map.insert(joint.child.clone(), survivor);
    }

    // Write combined inertials back onto the surviving parents.
    for (name, accum) in &accumulators {
        if let Some(parent_body) = body_mut(&mut root_body, &mut detached, name) {
            if !parent_body.children.iter().any(|c| c.tag == "inertial") {
                parent_body.push(XmlElement::new("inertial"));
            }
            if let Some(inertial) = parent_body
                .children
                .iter_mut()
                .find(|c| c.tag == "inertial")
            {
                accum.write_into(inertial);
            }
        }
    }

    // Pass 2: articulated joints nest their child bodies.
    for joint in robot.joints.iter().filter(|j| !j.is_fixed()) {
        let parent_name = resolve(&body_map, &joint.parent).to_owned();
        let child_name = resolve(&body_map, &joint.child).to_owned();

        let (parent_pos, parent_rot) = dissolved
            .get(&joint.parent)
            .copied()
            .unwrap_or((Vec3::zeros(), Mat3::identity()));
        let joint_pos = vec3(joint.origin.xyz);
        let joint_rot = rotation_from_rpy(joint.origin.rpy);
        let final_pos = parent_rot * joint_pos + parent_pos;
        let final_euler = euler_xyz_from_rotation(&(parent_rot * joint_rot));

        let Some(mut child_body) = take_body(&mut root_body, &mut detached, &child_name) else {
            warn!(joint = %joint.name, child = %child_name, "joint child body missing");
            continue;
        };
        child_body.set("pos", join3(&[final_pos.x, final_pos.y, final_pos.z]));
        child_body.set("euler", join3(&final_euler));
        joint.to_mjcf(&mut child_body);

        match body_mut(&mut root_body, &mut detached, &parent_name) {
            Some(parent_body) => {
                parent_body.push(child_body);
            }
            None => {
                warn!(joint = %joint.name, parent = %parent_name, "joint parent body missing");
                detached.push((child_name, child_body));
            }
        }
    }

    // Whatever is still detached roots a subtree under the robot body.
    for (_, body) in detached {
        root_body.push(body);
    }
    worldbody.push(root_body);
    model.push(worldbody);

    if !robot.actuators.is_empty() {
        let mut block = XmlElement::new("actuator");
        for (_, actuator) in &robot.actuators {
            actuator.to_mjcf(&mut block);
        }
        model.push(block);
    }

    if !robot.sensors.is_empty() {
        let mut block = XmlElement::new("sensor");
        for (_, sensor) in &robot.sensors {
            sensor.to_mjcf(&mut block);
        }
        model.push(block);
    }

    // Ground plane assets and geom, then user-registered custom elements.
    let mut custom: Vec<&CustomElement> = Vec::new();
    let ground = ground_elements(robot);
    custom.extend(ground.iter());
    custom.extend(robot.custom_elements.iter().map(|(_, e)| e));

    for entry in custom {
        let parent = if entry.by_tag {
            if entry.parent == "mujoco" {
                Some(&mut model)
            } else {
                model.find_tag_mut(&entry.parent)
            }
        } else {
            model.find_named_mut(&entry.parent)
        };
        match parent {
            Some(parent) => {
                parent.push(entry.element.clone());
            }
            None => warn!(parent = %entry.parent, "custom element parent not found"),
        }
    }

    for (name, attributes) in &robot.overrides {
        match model.find_named_mut(name) {
            Some(element) => {
                for (key, value) in attributes {
                    element.set(key.clone(), value.clone());
                }
            }
            None => warn!(element = %name, "override target not found"),
        }
    }

    Ok(model)
}

/// The built-in ground plane: checker texture, grid material, plane geom.
pub(crate) fn ground_elements(robot: &Robot) -> Vec<CustomElement> {
    vec![
        CustomElement {
            parent: "asset".into(),
            by_tag: true,
            element: XmlElement::new("texture")
                .with("name", "checker")
                .with("type", "2d")
                .with("builtin", "checker")
                .with("rgb1", ".1 .2 .3")
                .with("rgb2", ".2 .3 .4")
                .with("width", "300")
                .with("height", "300"),
        },
        CustomElement {
            parent: "asset".into(),
            by_tag: true,
            element: XmlElement::new("material")
                .with("name", "grid")
                .with("texture", "checker")
                .with("texrepeat", "8 8")
                .with("reflectance", ".2"),
        },
        CustomElement {
            parent: "worldbody".into(),
            by_tag: true,
            element: XmlElement::new("geom")
                .with("name", "ground")
                .with("type", "plane")
                .with("pos", join3(&robot.ground_position))
                .with("euler", "0 0 0")
                .with("size", "2 2 0.001")
                .with("condim", "3")
                .with("conaffinity", "15")
                .with("material", "grid"),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::{Joint, JointKind};
    use crate::link::{Inertia, Inertial, Link, Origin};
    use crate::robot::Robot;
    use approx::assert_relative_eq;

    fn inertial_link(name: &str, mass: f64, com: [f64; 3], diag: [f64; 3]) -> Link {
        Link {
            name: name.into(),
            visual: None,
            collision: None,
            inertial: Some(Inertial {
                origin: Origin {
                    xyz: com,
                    rpy: [0.0; 3],
                },
                mass,
                inertia: Inertia {
                    ixx: diag[0],
                    iyy: diag[1],
                    izz: diag[2],
                    ixy: 0.0,
                    ixz: 0.0,
                    iyz: 0.0,
                },
            }),
        }
    }

    fn parse_triple_attr(element: &XmlElement, key: &str) -> [f64; 3] {
        parse3(element.get(key))
    }

    fn find_named<'a>(element: &'a XmlElement, name: &str) -> Option<&'a XmlElement> {
        if element.name() == Some(name) {
            return Some(element);
        }
        element.children.iter().find_map(|c| find_named(c, name))
    }

    fn find_inertial<'a>(model: &'a XmlElement, body: &str) -> &'a XmlElement {
        let body = find_named(model, body).expect("body present");
        body.children
            .iter()
            .find(|c| c.tag == "inertial")
            .expect("inertial present")
    }

    #[test]
    fn fixed_dissolution_combines_inertials() {
        // Parent with unit inertia at the origin, child fixed-joined one
        // meter down the x axis: mass 2, COM at the midpoint, and the
        // parallel-axis theorem adds to the y/z moments.
        let mut robot = Robot::new("bot");
        robot.add_link(inertial_link("parent", 1.0, [0.0; 3], [1.0; 3]));
        robot.add_link(inertial_link("child", 1.0, [0.0; 3], [1.0; 3]));
        robot.add_joint(Joint::fixed(
            "weld",
            "parent",
            "child",
            Origin {
                xyz: [1.0, 0.0, 0.0],
                rpy: [0.0; 3],
            },
        ));

        let model = emit_tree(&robot).unwrap();
        assert!(
            model.to_pretty_string().matches("<body").count() >= 2,
            "robot root and surviving parent"
        );
        let inertial = find_inertial(&model, "parent");
        assert_relative_eq!(
            inertial.get("mass").unwrap().parse::<f64>().unwrap(),
            2.0,
            epsilon = 1e-12
        );
        let pos = parse_triple_attr(inertial, "pos");
        assert_relative_eq!(pos[0], 0.5, epsilon = 1e-12);
        let diag = parse_triple_attr(inertial, "diaginertia");
        assert_relative_eq!(diag[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(diag[1], 3.0, epsilon = 1e-12);
        assert_relative_eq!(diag[2], 3.0, epsilon = 1e-12);
        // The dissolved body is gone.
        assert!(find_named(&model, "child").is_none());
    }

    #[test]
    fn dissolution_preserves_total_mass() {
        let mut robot = Robot::new("bot");
        robot.add_link(inertial_link("a", 0.4, [0.0; 3], [0.1; 3]));
        robot.add_link(inertial_link("b", 1.1, [0.1, 0.0, 0.0], [0.2; 3]));
        robot.add_link(inertial_link("c", 2.5, [0.0, 0.2, 0.0], [0.3; 3]));
        robot.add_joint(Joint::fixed(
            "ab",
            "a",
            "b",
            Origin {
                xyz: [0.3, 0.0, 0.1],
                rpy: [0.2, 0.0, 0.0],
            },
        ));
        robot.add_joint(Joint::fixed(
            "bc",
            "b",
            "c",
            Origin {
                xyz: [0.0, -0.2, 0.0],
                rpy: [0.0, 0.4, 0.0],
            },
        ));

        let model = emit_tree(&robot).unwrap();
        let inertial = find_inertial(&model, "a");
        let mass: f64 = inertial.get("mass").unwrap().parse().unwrap();
        assert_relative_eq!(mass, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn articulated_child_nests_under_parent() {
        let mut robot = Robot::new("bot");
        robot.add_link(inertial_link("base", 1.0, [0.0; 3], [1.0; 3]));
        robot.add_link(inertial_link("arm", 1.0, [0.0; 3], [1.0; 3]));
        robot.add_joint(Joint {
            name: "hinge".into(),
            kind: JointKind::Revolute,
            parent: "base".into(),
            child: "arm".into(),
            origin: Origin {
                xyz: [0.0, 0.1, 0.0],
                rpy: [0.0; 3],
            },
            axis: Some([0.0, 0.0, -1.0]),
            limits: None,
            dynamics: None,
            mimic: None,
        });

        let mut model = emit_tree(&robot).unwrap();
        let base = model.find_named_mut("base").unwrap();
        let arm = base
            .children
            .iter()
            .find(|c| c.tag == "body" && c.name() == Some("arm"))
            .expect("arm nested under base");
        assert_eq!(arm.get("pos"), Some("0 0.1 0"));
        let joint = arm
            .children
            .iter()
            .find(|c| c.tag == "joint")
            .expect("joint inside arm");
        assert_eq!(joint.get("type"), Some("hinge"));
        assert_eq!(joint.get("pos"), Some("0 0 0"));
    }

    #[test]
    fn document_scaffolding() {
        let mut robot = Robot::new("bot");
        robot.add_link(inertial_link("base", 1.0, [0.0; 3], [1.0; 3]));
        robot.set_robot_position([0.0, 0.0, 0.6]);
        robot.add_actuator("hinge-actuator", "hinge", false, (0.0, 0.0), 1.0, true, true);

        let text = emit(&robot).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" ?>\n<mujoco model=\"bot\">"));
        assert!(text.contains("<compiler angle=\"radian\" eulerseq=\"xyz\"/>"));
        assert!(text.contains("<option timestep=\"0.001\" gravity=\"0 0 -9.81\" iterations=\"50\"/>"));
        assert!(text.contains("<freejoint name=\"bot_freejoint\"/>"));
        assert!(text.contains("pos=\"0 0 0.6\""));
        // Ground plane and its assets were registered.
        assert!(text.contains("<texture name=\"checker\""));
        assert!(text.contains("<material name=\"grid\""));
        assert!(text.contains("type=\"plane\""));
        // Actuator block with encoder and force sensors.
        assert!(text.contains("<motor name=\"hinge-actuator\" joint=\"hinge\""));
        assert!(text.contains("<actuatorpos name=\"hinge-actuator-enc-pos\""));
        assert!(text.contains("<actuatorfrc name=\"hinge-actuator-frc\""));
    }

    #[test]
    fn overrides_and_custom_elements_apply() {
        let mut robot = Robot::new("bot");
        robot.add_link(inertial_link("base", 1.0, [0.0; 3], [1.0; 3]));
        robot.add_custom_element_by_name(
            "imu-site",
            "base",
            XmlElement::new("site").with("name", "imu"),
        );
        robot.set_element_attributes(
            "ground",
            vec![("size".into(), "3 3 0.001".into())],
        );

        let text = emit(&robot).unwrap();
        assert!(text.contains("<site name=\"imu\"/>"));
        assert!(text.contains("size=\"3 3 0.001\""));
    }
}
