//! Link/joint synthesis: from the oriented graph and resolved mates to a
//! robot description.

use std::collections::{BTreeMap, HashMap};

use armature_client::{MeshAsset, WorkspaceType};
use armature_math::Transform;
use armature_model::name::{sanitize, MATE_JOINER};
use armature_model::{MateFeatureData, MateType, Part, CHILD, PARENT};
use armature_robot::{
    Collision, Geometry, Inertia, Inertial, Joint, JointKind, JointMimic, Link, Material, Origin,
    Robot, Visual,
};
use tracing::{debug, info, warn};

use crate::graph::KinematicGraph;
use crate::parse::{relation_driver, relation_multiplier, MateMap, PartMap, RelationMap};
use crate::Result;

/// Align each mate with its directed edge: when only the reversed key
/// exists, adopt that record with its entities swapped so index 0 is the
/// edge's child again.
pub fn topological_mates(
    edges: &[(String, String)],
    mates: &MateMap,
) -> BTreeMap<String, MateFeatureData> {
    let mut aligned = BTreeMap::new();
    for (parent, child) in edges {
        let key = format!("{parent}{MATE_JOINER}{child}");
        if let Some(mate) = mates.get(&key) {
            aligned.insert(key, mate.clone());
            continue;
        }
        let reversed = format!("{child}{MATE_JOINER}{parent}");
        if let Some(mate) = mates.get(&reversed) {
            let mut mate = mate.clone();
            mate.mated_entities.reverse();
            aligned.insert(key, mate);
        } else {
            warn!(parent = %parent, child = %child, "no mate record for oriented edge");
        }
    }
    aligned
}

/// The link-frame → STL-frame transform of a link.
///
/// The root link keeps the STL orientation and sits at the part centroid;
/// a child link's frame is its mate frame (composed through the rigid
/// sub-assembly frame when the entity was collapsed).
fn link_to_stl_tf(part: &Part, mate: Option<&MateFeatureData>) -> Result<Transform> {
    match mate {
        None => {
            let centroid = part
                .mass_property
                .as_ref()
                .map(|mp| mp.center_of_mass())
                .unwrap_or_else(|| {
                    warn!("root part has no mass properties, centering link at the STL origin");
                    nalgebra::Vector3::zeros()
                });
            Ok(Transform::from_translation(centroid))
        }
        Some(mate) => Ok(mate.mated_entities[CHILD].part_to_mate_tf()?),
    }
}

/// Build one link, its STL→link transform and its mesh asset.
pub fn build_link(
    name: &str,
    part: &Part,
    wid: &str,
    mate: Option<&MateFeatureData>,
) -> Result<(Link, Transform, MeshAsset)> {
    debug!(link = %name, "building link");
    let link_to_stl = link_to_stl_tf(part, mate)?;
    let stl_to_link = link_to_stl.inverse().unwrap_or_else(|| {
        warn!(link = %name, "degenerate link frame, falling back to identity");
        Transform::identity()
    });

    let (mass, com, inertia) = match &part.mass_property {
        Some(mp) => (
            mp.mass(),
            mp.center_of_mass_wrt(&stl_to_link),
            Inertia::from_matrix(&mp.inertia_wrt(&stl_to_link.rotation())),
        ),
        None => {
            warn!(link = %name, "no mass properties, emitting zero inertia");
            (0.0, nalgebra::Vector3::zeros(), Inertia::zero())
        }
    };

    let (wtype, asset_wid) = if !part.document_version.is_empty() {
        (WorkspaceType::Version, part.document_version.clone())
    } else if part.is_rigid_assembly {
        (
            WorkspaceType::Workspace,
            part.rigid_assembly_workspace_id
                .clone()
                .unwrap_or_else(|| wid.to_owned()),
        )
    } else {
        (WorkspaceType::Workspace, wid.to_owned())
    };

    let asset = MeshAsset {
        did: part.document_id.clone(),
        wtype,
        wid: asset_wid,
        eid: part.element_id.clone(),
        part_id: part.part_id.clone(),
        is_rigid_assembly: part.is_rigid_assembly,
        file_name: format!("{name}.stl"),
        stl_to_link_tf: stl_to_link,
        is_from_file: false,
    };
    let mesh_path = asset.relative_path();

    let link = Link {
        name: name.to_owned(),
        visual: Some(Visual {
            name: Some(format!("{name}-visual")),
            origin: Origin::zero(),
            geometry: Geometry::Mesh {
                filename: mesh_path.clone(),
            },
            material: Material::for_link(name),
        }),
        collision: Some(Collision {
            name: Some(format!("{name}-collision")),
            origin: Origin::zero(),
            geometry: Geometry::Mesh {
                filename: mesh_path,
            },
        }),
        inertial: Some(Inertial {
            origin: Origin {
                xyz: [com.x, com.y, com.z],
                rpy: [0.0; 3],
            },
            mass,
            inertia,
        }),
    };

    Ok((link, stl_to_link, asset))
}

/// Translate one mate into its joints (plus dummy links for BALL mates).
///
/// The joint frame is `stl_to_parent_tf * parent_to_mate_tf`.
pub fn build_joints(
    parent: &str,
    child: &str,
    mate: &MateFeatureData,
    stl_to_parent_tf: &Transform,
    mimic: Option<JointMimic>,
) -> Result<(Vec<Joint>, Vec<Link>)> {
    let parent_to_mate = mate.mated_entities[PARENT].part_to_mate_tf()?;
    let origin = Origin::from_transform(&stl_to_parent_tf.then(&parent_to_mate));
    let name = sanitize(&mate.name);
    debug!(joint = %name, parent = %parent, child = %child, "building joint");

    let revolute = |name: String, parent: &str, child: &str, origin, axis| Joint {
        name,
        kind: JointKind::Revolute,
        parent: parent.to_owned(),
        child: child.to_owned(),
        origin,
        axis: Some(axis),
        limits: None,
        dynamics: None,
        mimic: mimic.clone(),
    };

    match mate.mate_type {
        MateType::Revolute => Ok((
            vec![revolute(name, parent, child, origin, [0.0, 0.0, -1.0])],
            Vec::new(),
        )),
        MateType::Fastened => Ok((vec![Joint::fixed(name, parent, child, origin)], Vec::new())),
        MateType::Slider | MateType::Cylindrical => Ok((
            vec![Joint {
                name,
                kind: JointKind::Prismatic,
                parent: parent.to_owned(),
                child: child.to_owned(),
                origin,
                axis: Some([0.0, 0.0, -1.0]),
                limits: None,
                dynamics: None,
                mimic,
            }],
            Vec::new(),
        )),
        MateType::Ball => {
            let dummy_x = Link::dummy(format!("{parent}-{name}-x"));
            let dummy_y = Link::dummy(format!("{parent}-{name}-y"));
            let joints = vec![
                revolute(
                    format!("{name}-x"),
                    parent,
                    &dummy_x.name,
                    origin,
                    [1.0, 0.0, 0.0],
                ),
                revolute(
                    format!("{name}-y"),
                    &dummy_x.name,
                    &dummy_y.name,
                    Origin::zero(),
                    [0.0, 1.0, 0.0],
                ),
                revolute(
                    format!("{name}-z"),
                    &dummy_y.name,
                    child,
                    Origin::zero(),
                    [0.0, 0.0, -1.0],
                ),
            ];
            Ok((joints, vec![dummy_x, dummy_y]))
        }
        MateType::Planar | MateType::PinSlot | MateType::Parallel => {
            warn!(mate = %mate.name, mate_type = ?mate.mate_type, "unsupported mate type, emitting dummy joint");
            Ok((
                vec![Joint {
                    name,
                    kind: JointKind::Dummy,
                    parent: parent.to_owned(),
                    child: child.to_owned(),
                    origin,
                    axis: None,
                    limits: None,
                    dynamics: None,
                    mimic: None,
                }],
                Vec::new(),
            ))
        }
    }
}

/// The joint name of a mate feature id, for mimic references.
fn joint_name_of(feature_id: &str, mates: &MateMap) -> Option<String> {
    mates
        .values()
        .find(|mate| mate.id == feature_id)
        .map(|mate| sanitize(&mate.name))
}

/// Synthesize the robot: one link per graph node (plus ball dummies), one
/// or more joints per edge, mesh assets for every solid link.
pub fn build_robot(
    robot_name: &str,
    graph: &KinematicGraph,
    parts: &PartMap,
    mates: &MateMap,
    relations: &RelationMap,
    wid: &str,
) -> Result<Robot> {
    let aligned = topological_mates(&graph.edges, mates);
    let mut robot = Robot::new(robot_name);
    let mut stl_tf: HashMap<String, Transform> = HashMap::new();

    info!(root = %graph.root, "building root link");
    let root_part = parts
        .get(&graph.root)
        .ok_or_else(|| crate::CompileError::RootNotInGraph(graph.root.clone()))?;
    let (root_link, root_tf, root_asset) = build_link(&graph.root, root_part, wid, None)?;
    robot.add_link(root_link);
    robot.assets.insert(graph.root.clone(), root_asset);
    stl_tf.insert(graph.root.clone(), root_tf);

    for (parent, child) in &graph.edges {
        let key = format!("{parent}{MATE_JOINER}{child}");
        let Some(mate) = aligned.get(&key) else {
            continue;
        };
        let Some(parent_tf) = stl_tf.get(parent).copied() else {
            warn!(parent = %parent, child = %child, "parent frame unknown, skipping edge");
            continue;
        };
        let (Some(_), Some(child_part)) = (parts.get(parent), parts.get(child)) else {
            warn!(parent = %parent, child = %child, "part record missing, skipping edge");
            continue;
        };

        let mimic = relations.get(&mate.id).map(|relation| {
            let driver = relation_driver(relation).unwrap_or_default();
            let joint = joint_name_of(driver, mates).unwrap_or_else(|| {
                warn!(feature = %driver, "driving mate not found, mimicking by feature id");
                driver.to_owned()
            });
            JointMimic {
                joint,
                multiplier: relation_multiplier(relation),
                offset: 0.0,
            }
        });

        let (joints, dummy_links) = build_joints(parent, child, mate, &parent_tf, mimic)?;
        let (child_link, child_tf, child_asset) = build_link(child, child_part, wid, Some(mate))?;
        stl_tf.insert(child.clone(), child_tf);
        robot.assets.insert(child.clone(), child_asset);

        if robot.has_link(child) {
            debug!(link = %child, "link already present, keeping the first record");
        } else {
            robot.add_link(child_link);
        }
        for link in dummy_links {
            if !robot.has_link(&link.name) {
                robot.add_link(link);
            }
        }
        for joint in joints {
            robot.add_joint(joint);
        }
    }

    robot.uniquify_names();
    robot.validate()?;
    Ok(robot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::*;
    use approx::assert_relative_eq;
    use armature_model::{MateType, MatedCS, MatedEntity};

    fn identity_cs(origin: [f64; 3]) -> MatedCS {
        MatedCS {
            x_axis: vec![1.0, 0.0, 0.0],
            y_axis: vec![0.0, 1.0, 0.0],
            z_axis: vec![0.0, 0.0, 1.0],
            origin: origin.to_vec(),
            part_tf: None,
        }
    }

    fn mate(name: &str, mate_type: MateType, child_cs: MatedCS, parent_cs: MatedCS) -> MateFeatureData {
        MateFeatureData {
            id: format!("{name}-id"),
            name: name.to_owned(),
            mate_type,
            mated_entities: vec![
                MatedEntity {
                    mated_occurrence: vec!["child".into()],
                    mated_cs: child_cs,
                    parent_cs: None,
                },
                MatedEntity {
                    mated_occurrence: vec!["parent".into()],
                    mated_cs: parent_cs,
                    parent_cs: None,
                },
            ],
        }
    }

    #[test]
    fn fastened_pair_joint_origin() {
        // One fastened mate with a slanted parent frame: the joint origin
        // is the parent's mate frame expressed in the parent link frame.
        let child_cs = identity_cs([0.0, -0.0505, 0.0]);
        let parent_cs = MatedCS {
            x_axis: vec![0.8660254037844387, 0.0, -0.5],
            y_axis: vec![-0.5, 0.0, -0.8660254037844387],
            z_axis: vec![0.0, 1.0, 0.0],
            origin: vec![0.0, -0.0505, 0.0],
            part_tf: None,
        };
        let m = mate("weld", MateType::Fastened, child_cs, parent_cs);
        let (joints, links) =
            build_joints("parent", "child", &m, &Transform::identity(), None).unwrap();
        assert!(links.is_empty());
        assert_eq!(joints.len(), 1);
        let joint = &joints[0];
        assert_eq!(joint.kind, JointKind::Fixed);
        assert_relative_eq!(joint.origin.xyz[1], -0.0505, epsilon = 1e-12);
        // The rpy rebuilds the mate rotation exactly.
        let rebuilt = armature_math::rotation_from_rpy(joint.origin.rpy);
        let expected = m.mated_entities[PARENT].part_to_mate_tf().unwrap().rotation();
        assert!((rebuilt - expected).abs().max() < 1e-9);
    }

    #[test]
    fn ball_mate_decomposes_into_three_revolutes() {
        let m = mate(
            "shoulder",
            MateType::Ball,
            identity_cs([0.0; 3]),
            identity_cs([0.0; 3]),
        );
        let (joints, links) = build_joints("a", "b", &m, &Transform::identity(), None).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(joints.len(), 3);
        assert_eq!(links[0].name, "a-shoulder-x");
        assert_eq!(links[1].name, "a-shoulder-y");
        assert_eq!(joints[0].name, "shoulder-x");
        assert_eq!(joints[1].name, "shoulder-y");
        assert_eq!(joints[2].name, "shoulder-z");
        // Chain a -> a-shoulder-x -> a-shoulder-y -> b.
        assert_eq!(joints[0].parent, "a");
        assert_eq!(joints[0].child, "a-shoulder-x");
        assert_eq!(joints[1].parent, "a-shoulder-x");
        assert_eq!(joints[1].child, "a-shoulder-y");
        assert_eq!(joints[2].parent, "a-shoulder-y");
        assert_eq!(joints[2].child, "b");
        assert_eq!(joints[0].axis, Some([1.0, 0.0, 0.0]));
        assert_eq!(joints[1].axis, Some([0.0, 1.0, 0.0]));
        assert_eq!(joints[2].axis, Some([0.0, 0.0, -1.0]));
        // The dummies carry no inertia.
        assert_relative_eq!(links[0].inertial.unwrap().mass, 0.0);
    }

    #[test]
    fn unsupported_mate_becomes_dummy_joint() {
        let m = mate(
            "slot",
            MateType::PinSlot,
            identity_cs([0.0; 3]),
            identity_cs([0.0; 3]),
        );
        let (joints, _) = build_joints("a", "b", &m, &Transform::identity(), None).unwrap();
        assert_eq!(joints[0].kind, JointKind::Dummy);
    }

    #[test]
    fn link_frames_invert_consistently() {
        // Frame consistency: stl_to_link * link_to_stl == identity.
        let part = part_fixture("p", 1.0, [0.2, 0.0, 0.1]);
        let m = mate(
            "hinge",
            MateType::Revolute,
            identity_cs([0.1, 0.2, 0.3]),
            identity_cs([0.0; 3]),
        );
        let (_, stl_to_link, _) = build_link("p", &part, WID, Some(&m)).unwrap();
        let link_to_stl = m.mated_entities[CHILD].part_to_mate_tf().unwrap();
        let product = stl_to_link.then(&link_to_stl);
        assert!(product.distance(&Transform::identity()) < 1e-9);
    }

    #[test]
    fn root_link_sits_at_centroid() {
        let part = part_fixture("root", 2.0, [0.5, -0.25, 0.0]);
        let (link, stl_to_link, asset) = build_link("root", &part, WID, None).unwrap();
        // COM re-expressed in the link frame lands at the origin.
        let inertial = link.inertial.unwrap();
        for v in inertial.origin.xyz {
            assert_relative_eq!(v, 0.0, epsilon = 1e-12);
        }
        assert_relative_eq!(inertial.mass, 2.0);
        assert_eq!(asset.file_name, "root.stl");
        assert_relative_eq!(stl_to_link.translation().x, -0.5);
    }
}
