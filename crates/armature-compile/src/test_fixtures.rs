//! Shared fixtures for the compiler unit tests.

use std::collections::HashMap;

use armature_model::{
    Assembly, AssemblyInstance, Instance, MassProperties, MateFeatureData, MateType, MatedCS,
    MatedEntity, Occurrence, Part, PartInstance, RootAssembly, SubAssembly,
};

use crate::parse::{InstanceMap, MateMap, OccurrenceMap, PartMap};

/// Workspace id used across fixtures.
pub const WID: &str = "0d17b8ebb2a4c76be9fff3c7";

/// Pad a seed into a 24-character id.
pub fn id24(seed: &str) -> String {
    let mut id = seed.to_owned();
    while id.len() < 24 {
        id.push('0');
    }
    id.truncate(24);
    id
}

fn identity_transform() -> Vec<f64> {
    vec![
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

/// A part instance named `name` with ids derived from `seed`.
pub fn part_instance(seed: &str, name: &str) -> PartInstance {
    PartInstance {
        id: id24(seed),
        name: name.to_owned(),
        suppressed: false,
        full_configuration: "default".into(),
        configuration: "default".into(),
        document_id: id24("doc"),
        element_id: id24(&format!("el{seed}")),
        document_microversion: id24("mv"),
        part_id: format!("P{seed}"),
        is_standard_content: false,
    }
}

/// A part definition matching [`part_instance`] with the given mass and
/// centroid and a unit diagonal inertia.
pub fn part_fixture(seed: &str, mass: f64, centroid: [f64; 3]) -> Part {
    Part {
        is_standard_content: false,
        part_id: format!("P{seed}"),
        body_type: "solid".into(),
        full_configuration: "default".into(),
        configuration: "default".into(),
        document_id: id24("doc"),
        element_id: id24(&format!("el{seed}")),
        document_microversion: id24("mv"),
        document_version: String::new(),
        mass_property: Some(MassProperties {
            mass: vec![mass; 3],
            volume: vec![0.001; 3],
            centroid: centroid.to_vec(),
            inertia: vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            principal_inertia: vec![1.0, 1.0, 1.0],
            principal_axes: Vec::new(),
        }),
        is_rigid_assembly: false,
        rigid_assembly_workspace_id: None,
        rigid_assembly_to_part_tf: HashMap::new(),
    }
}

fn mated_entity(occurrence_seed: &str) -> MatedEntity {
    MatedEntity {
        mated_occurrence: vec![id24(occurrence_seed)],
        mated_cs: MatedCS {
            x_axis: vec![1.0, 0.0, 0.0],
            y_axis: vec![0.0, 1.0, 0.0],
            z_axis: vec![0.0, 0.0, 1.0],
            origin: vec![0.0, 0.0, 0.0],
            part_tf: None,
        },
        parent_cs: None,
    }
}

/// Nodes for graph tests: one visible part occurrence, instance and part
/// record per name.
pub fn chain_nodes(names: &[&str]) -> (OccurrenceMap, InstanceMap, PartMap) {
    let mut occurrences = OccurrenceMap::new();
    let mut instances = InstanceMap::new();
    let mut parts = PartMap::new();
    for name in names {
        occurrences.insert(
            (*name).to_owned(),
            Occurrence {
                fixed: false,
                hidden: false,
                transform: identity_transform(),
                path: vec![id24(name)],
            },
        );
        instances.insert(
            (*name).to_owned(),
            Instance::Part(part_instance(name, name)),
        );
        parts.insert((*name).to_owned(), part_fixture(name, 1.0, [0.0; 3]));
    }
    (occurrences, instances, parts)
}

/// Fastened mates keyed `parent_to_child` for graph tests.
pub fn chain_mates(pairs: &[(&str, &str)]) -> MateMap {
    let mut mates = MateMap::new();
    for (parent, child) in pairs {
        mates.insert(
            format!("{parent}_to_{child}"),
            MateFeatureData {
                id: format!("feat-{parent}-{child}"),
                name: format!("{parent} to {child}"),
                mate_type: MateType::Fastened,
                mated_entities: vec![mated_entity(child), mated_entity(parent)],
            },
        );
    }
    mates
}

/// A root assembly holding a part and a one-part sub-assembly, used by
/// the traversal tests.
pub fn nested_assembly_fixture() -> Assembly {
    let base = part_instance("base", "base");
    let inner = part_instance("inner", "inner part");
    let sub_instance = AssemblyInstance {
        id: id24("sub"),
        name: "sub 1".into(),
        suppressed: false,
        full_configuration: "default".into(),
        configuration: "default".into(),
        document_id: id24("doc"),
        element_id: id24("elsub"),
        document_microversion: id24("mv"),
        is_rigid: false,
    };

    let sub_assembly = SubAssembly {
        instances: vec![Instance::Part(inner.clone())],
        features: Vec::new(),
        full_configuration: "default".into(),
        configuration: "default".into(),
        document_id: id24("doc"),
        element_id: id24("elsub"),
        document_microversion: id24("mv"),
    };

    let occurrences = vec![
        Occurrence {
            fixed: false,
            hidden: false,
            transform: identity_transform(),
            path: vec![base.id.clone()],
        },
        Occurrence {
            fixed: false,
            hidden: false,
            transform: identity_transform(),
            path: vec![sub_instance.id.clone()],
        },
        Occurrence {
            fixed: false,
            hidden: false,
            transform: identity_transform(),
            path: vec![sub_instance.id.clone(), inner.id.clone()],
        },
    ];

    Assembly {
        root_assembly: RootAssembly {
            instances: vec![
                Instance::Part(base),
                Instance::Assembly(sub_instance),
            ],
            features: Vec::new(),
            occurrences,
            full_configuration: "default".into(),
            configuration: "default".into(),
            document_id: id24("doc"),
            element_id: id24("elroot"),
            document_microversion: id24("mv"),
            mass_property: None,
            document_meta_data: None,
        },
        sub_assemblies: vec![sub_assembly],
        parts: vec![part_fixture("base", 1.0, [0.0; 3]), part_fixture("inner", 1.0, [0.0; 3])],
    }
}
