//! Traversal and resolution: instances, sub-assemblies, parts, mates.

use std::collections::{BTreeMap, HashMap};

use armature_client::{CadClient, WorkspaceType};
use armature_model::name::{mate_key, sanitize, SUBASSEMBLY_JOINER};
use armature_model::{
    Assembly, AssemblyInstance, FeatureData, Instance, MassProperties, MateFeatureData,
    MateRelationFeatureData, MatedCS, Occurrence, Part, RelationType, RootAssembly, SubAssembly,
};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::{CompileError, Result};

/// Index of the driving mate in a relation's `mates` array.
pub const RELATION_PARENT: usize = 0;

/// Index of the driven mate in a relation's `mates` array.
pub const RELATION_CHILD: usize = 1;

/// Path-keyed instances, ordered for deterministic iteration.
pub type InstanceMap = BTreeMap<String, Instance>;

/// Path-keyed leaf occurrences.
pub type OccurrenceMap = BTreeMap<String, Occurrence>;

/// Instance id → sanitized name.
pub type IdNameMap = HashMap<String, String>;

/// Path-keyed part records (including rigid-assembly stubs).
pub type PartMap = BTreeMap<String, Part>;

/// `parent_to_child`-keyed mates.
pub type MateMap = BTreeMap<String, MateFeatureData>;

/// Driven-feature-id-keyed relations.
pub type RelationMap = BTreeMap<String, MateRelationFeatureData>;

/// Walk the instance tree to `max_depth`, producing the path-keyed
/// instance map, the occurrence map, and the id→name map.
///
/// Assemblies at or beyond the depth limit are marked rigid and not
/// descended into. Each recursion level builds branch-local maps that the
/// parent merges, so branches never share mutable state; branch keys are
/// disjoint by prefix construction.
pub fn get_instances(
    assembly: &Assembly,
    max_depth: usize,
) -> Result<(InstanceMap, OccurrenceMap, IdNameMap)> {
    fn traverse(
        instances: &[Instance],
        sub_assemblies: &[SubAssembly],
        prefix: Option<&str>,
        depth: usize,
        max_depth: usize,
    ) -> (InstanceMap, IdNameMap) {
        let mut instance_map = InstanceMap::new();
        let mut id_to_name = IdNameMap::new();

        for instance in instances {
            let sanitized = sanitize(instance.name());
            debug!(instance = %sanitized, depth, "visiting instance");
            let key = match prefix {
                Some(p) => format!("{p}{SUBASSEMBLY_JOINER}{sanitized}"),
                None => sanitized.clone(),
            };
            id_to_name.insert(instance.id().to_owned(), sanitized);

            match instance {
                Instance::Part(_) => {
                    instance_map.insert(key, instance.clone());
                }
                Instance::Assembly(assembly_instance) => {
                    let mut assembly_instance: AssemblyInstance = assembly_instance.clone();
                    if depth >= max_depth {
                        debug!(key = %key, "depth limit reached, treating sub-assembly as rigid");
                        assembly_instance.is_rigid = true;
                        instance_map.insert(key, Instance::Assembly(assembly_instance));
                        continue;
                    }
                    let uid = assembly_instance.uid();
                    instance_map.insert(key.clone(), Instance::Assembly(assembly_instance));

                    match sub_assemblies.iter().find(|s| s.uid() == uid) {
                        Some(definition) => {
                            let (branch_instances, branch_names) = traverse(
                                &definition.instances,
                                sub_assemblies,
                                Some(&key),
                                depth + 1,
                                max_depth,
                            );
                            instance_map.extend(branch_instances);
                            id_to_name.extend(branch_names);
                        }
                        None => {
                            warn!(key = %key, "sub-assembly definition not found for instance")
                        }
                    }
                }
            }
        }
        (instance_map, id_to_name)
    }

    let (instance_map, mut id_to_name) = traverse(
        &assembly.root_assembly.instances,
        &assembly.sub_assemblies,
        None,
        0,
        max_depth,
    );

    // Register the names of every definition's instances as well: mates can
    // reach inside rigid sub-assemblies the walk did not descend into.
    for definition in &assembly.sub_assemblies {
        for instance in &definition.instances {
            id_to_name
                .entry(instance.id().to_owned())
                .or_insert_with(|| sanitize(instance.name()));
        }
    }

    let occurrence_map = get_occurrences(assembly, &id_to_name, max_depth)?;
    Ok((instance_map, occurrence_map, id_to_name))
}

/// Key every occurrence within the depth limit by its translated path.
fn get_occurrences(
    assembly: &Assembly,
    id_to_name: &IdNameMap,
    max_depth: usize,
) -> Result<OccurrenceMap> {
    let mut occurrence_map = OccurrenceMap::new();
    for occurrence in &assembly.root_assembly.occurrences {
        if occurrence.path.len() > max_depth + 1 {
            continue;
        }
        let mut segments = Vec::with_capacity(occurrence.path.len());
        for id in &occurrence.path {
            let name = id_to_name
                .get(id)
                .ok_or_else(|| CompileError::UnknownInstanceRef(id.clone()))?;
            segments.push(name.clone());
        }
        occurrence_map.insert(segments.join(SUBASSEMBLY_JOINER), occurrence.clone());
    }
    Ok(occurrence_map)
}

/// Classify every referenced sub-assembly as articulated or rigid; fetch a
/// flattened expansion with aggregate mass for the rigid ones.
///
/// One fetch per rigid instance, issued concurrently; the first failure
/// aborts.
pub async fn get_subassemblies<C: CadClient>(
    assembly: &Assembly,
    client: &C,
    instances: &mut InstanceMap,
) -> Result<(
    BTreeMap<String, SubAssembly>,
    BTreeMap<String, RootAssembly>,
)> {
    let mut articulated_map = BTreeMap::new();
    let mut rigid_keys: Vec<(String, &SubAssembly)> = Vec::new();

    for (key, instance) in instances.iter_mut() {
        let Instance::Assembly(assembly_instance) = instance else {
            continue;
        };
        let uid = assembly_instance.uid();
        let Some(definition) = assembly.sub_assemblies.iter().find(|s| s.uid() == uid) else {
            warn!(key = %key, "no definition for assembly instance");
            continue;
        };

        // A depth-limited instance stays rigid even when its definition
        // articulates; an articulation-free definition is rigid everywhere.
        if assembly_instance.is_rigid || !definition.articulated() {
            assembly_instance.is_rigid = true;
            rigid_keys.push((key.clone(), definition));
        } else {
            articulated_map.insert(key.clone(), definition.clone());
        }
    }

    let fetches = rigid_keys.into_iter().map(|(key, definition)| async move {
        debug!(key = %key, "fetching rigid sub-assembly expansion");
        let fetched = client
            .get_root_assembly(
                &definition.document_id,
                WorkspaceType::Microversion,
                &definition.document_microversion,
                &definition.element_id,
                true,
            )
            .await;
        (key, fetched)
    });

    let mut rigid_map = BTreeMap::new();
    for (key, fetched) in join_all(fetches).await {
        rigid_map.insert(key, fetched?);
    }
    Ok((articulated_map, rigid_map))
}

/// Pair each part instance with its definition record, fetching mass
/// properties for parts that do not live inside a rigid sub-assembly.
///
/// A failed mass fetch keeps the part with zero inertia and a warning;
/// everything else aborts. Also synthesizes one stub record per rigid
/// sub-assembly, carrying the aggregate mass.
pub async fn get_parts<C: CadClient>(
    assembly: &Assembly,
    rigid_subassemblies: &BTreeMap<String, RootAssembly>,
    client: &C,
    instances: &InstanceMap,
) -> Result<PartMap> {
    let mut by_uid: HashMap<String, Vec<&str>> = HashMap::new();
    for (key, instance) in instances {
        if let Instance::Part(part_instance) = instance {
            by_uid.entry(part_instance.uid()).or_default().push(key);
        }
    }

    let fetches = assembly.parts.iter().flat_map(|part| {
        let keys = by_uid.get(&part.uid()).cloned().unwrap_or_default();
        keys.into_iter().map(move |key| async move {
            let inside_rigid = key
                .split(SUBASSEMBLY_JOINER)
                .next()
                .is_some_and(|head| rigid_subassemblies.contains_key(head));
            let mut resolved = part.clone();
            if !inside_rigid {
                debug!(key = %key, part = %part.part_id, "fetching mass properties");
                match client
                    .get_mass_property(
                        &part.document_id,
                        WorkspaceType::Microversion,
                        &part.document_microversion,
                        &part.element_id,
                        &part.part_id,
                    )
                    .await
                {
                    Ok(mass) => resolved.mass_property = Some(mass),
                    Err(error) => {
                        warn!(key = %key, %error, "mass properties unavailable, using zero inertia");
                        resolved.mass_property = Some(MassProperties::zero());
                    }
                }
            }
            (key.to_owned(), resolved)
        })
    });

    let mut part_map = PartMap::new();
    for (key, part) in join_all(fetches).await {
        part_map.insert(key, part);
    }

    for (key, rigid) in rigid_subassemblies {
        part_map.insert(
            key.clone(),
            Part {
                is_standard_content: false,
                part_id: String::new(),
                body_type: String::new(),
                full_configuration: rigid.full_configuration.clone(),
                configuration: rigid.configuration.clone(),
                document_id: rigid.document_id.clone(),
                element_id: rigid.element_id.clone(),
                document_microversion: rigid.document_microversion.clone(),
                document_version: String::new(),
                mass_property: rigid.mass_property.clone(),
                is_rigid_assembly: true,
                rigid_assembly_workspace_id: rigid
                    .document_meta_data
                    .as_ref()
                    .map(|meta| meta.default_workspace.id.clone()),
                rigid_assembly_to_part_tf: HashMap::new(),
            },
        );
    }

    Ok(part_map)
}

/// Occurrences of each rigid expansion, keyed by translated path within
/// the expansion. Also folds the expansions' instance names into the
/// id→name map.
fn rigid_occurrence_maps(
    rigid_subassemblies: &BTreeMap<String, RootAssembly>,
    id_to_name: &mut IdNameMap,
) -> BTreeMap<String, BTreeMap<String, Occurrence>> {
    let mut maps = BTreeMap::new();
    for (assembly_key, rigid) in rigid_subassemblies {
        for instance in &rigid.instances {
            id_to_name
                .entry(instance.id().to_owned())
                .or_insert_with(|| sanitize(instance.name()));
        }
        let mut occurrences = BTreeMap::new();
        for occurrence in &rigid.occurrences {
            let mut segments = Vec::with_capacity(occurrence.path.len());
            let mut complete = true;
            for id in &occurrence.path {
                match id_to_name.get(id) {
                    Some(name) => segments.push(name.clone()),
                    None => {
                        warn!(id = %id, key = %assembly_key, "occurrence path element unknown");
                        complete = false;
                        break;
                    }
                }
            }
            if complete {
                occurrences.insert(segments.join(SUBASSEMBLY_JOINER), occurrence.clone());
            }
        }
        maps.insert(assembly_key.clone(), occurrences);
    }
    maps
}

/// Walk the root scope and every articulated sub-assembly scope, emitting
/// the parent→child keyed mate map and the feature-id keyed relation map.
///
/// A mate side whose first path element names a rigid sub-assembly is
/// rewritten: the entity collapses onto the rigid link, the intra-rigid
/// transform is cached as the entity's `parent_cs` and recorded on the
/// rigid stub's `rigid_assembly_to_part_tf`.
pub fn get_mates_and_relations(
    assembly: &Assembly,
    subassemblies: &BTreeMap<String, SubAssembly>,
    rigid_subassemblies: &BTreeMap<String, RootAssembly>,
    id_to_name: &mut IdNameMap,
    parts: &mut PartMap,
) -> Result<(MateMap, RelationMap)> {
    let rigid_occurrences = rigid_occurrence_maps(rigid_subassemblies, id_to_name);

    let mut mates = MateMap::new();
    let mut relations = RelationMap::new();

    let mut scopes: Vec<(Option<&str>, &[armature_model::AssemblyFeature])> =
        vec![(None, &assembly.root_assembly.features)];
    for (key, subassembly) in subassemblies {
        scopes.push((Some(key.as_str()), &subassembly.features));
    }

    for (prefix, features) in scopes {
        for feature in features {
            if feature.suppressed {
                continue;
            }
            match &feature.data {
                FeatureData::Mate(data) => {
                    if data.mated_entities.len() < 2 {
                        warn!(feature = %feature.id, "mate with fewer than two entities");
                        continue;
                    }
                    let mut mate = data.clone();
                    mate.id = feature.id.clone();

                    let mut sides: [Vec<String>; 2] = [Vec::new(), Vec::new()];
                    for (index, entity) in mate.mated_entities.iter().enumerate().take(2) {
                        for id in &entity.mated_occurrence {
                            let name = id_to_name
                                .get(id)
                                .ok_or_else(|| CompileError::UnknownInstanceRef(id.clone()))?;
                            sides[index].push(name.clone());
                        }
                    }

                    for (index, names) in sides.iter_mut().enumerate() {
                        collapse_rigid_side(
                            &mut mate.mated_entities[index],
                            names,
                            &rigid_occurrences,
                            parts,
                        )?;
                    }

                    let [child_names, parent_names] = sides;
                    mates.insert(mate_key(&parent_names, &child_names, prefix), mate);
                }
                FeatureData::MateRelation(data) => {
                    let mut relation = data.clone();
                    relation.id = feature.id.clone();
                    let driven = if relation.relation_type == RelationType::Screw {
                        relation.mates.first()
                    } else {
                        relation.mates.get(RELATION_CHILD)
                    };
                    match driven {
                        Some(mate_ref) => {
                            relations.insert(mate_ref.feature_id.clone(), relation);
                        }
                        None => warn!(feature = %feature.id, "relation without mate references"),
                    }
                }
                FeatureData::MateGroup(_) | FeatureData::MateConnector(_) => {}
            }
        }
    }

    Ok((mates, relations))
}

/// If `names` starts at a rigid sub-assembly, collapse the entity onto
/// the rigid link and cache the intra-rigid transform.
fn collapse_rigid_side(
    entity: &mut armature_model::MatedEntity,
    names: &mut Vec<String>,
    rigid_occurrences: &BTreeMap<String, BTreeMap<String, Occurrence>>,
    parts: &mut PartMap,
) -> Result<()> {
    let Some(head) = names.first().cloned() else {
        return Ok(());
    };
    let Some(occurrences) = rigid_occurrences.get(&head) else {
        return Ok(());
    };
    let tail = names[1..].join(SUBASSEMBLY_JOINER);
    if let Some(occurrence) = occurrences.get(&tail) {
        let tf = occurrence.tf().map_err(CompileError::Model)?;
        let parent_cs = MatedCS::from_tf(tf);
        if let Some(part) = parts.get_mut(&head) {
            part.rigid_assembly_to_part_tf.insert(tail.clone(), tf);
        }
        entity.parent_cs = Some(parent_cs);
    } else {
        warn!(head = %head, tail = %tail, "rigid sub-assembly occurrence not found for mate side");
    }
    entity.mated_occurrence.truncate(1);
    names.truncate(1);
    Ok(())
}

/// The driving mate's feature id for a relation, as keyed into the
/// relation map by [`get_mates_and_relations`].
pub fn relation_driver(relation: &MateRelationFeatureData) -> Option<&str> {
    relation
        .mates
        .get(RELATION_PARENT)
        .map(|m| m.feature_id.as_str())
}

/// The follower's multiplier for a relation.
pub fn relation_multiplier(relation: &MateRelationFeatureData) -> f64 {
    match relation.relation_type {
        RelationType::RackAndPinion => relation.relation_length.unwrap_or(1.0),
        _ => relation.relation_ratio.unwrap_or(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::*;

    #[test]
    fn traversal_respects_depth_limit() {
        let assembly = nested_assembly_fixture();
        let (instances, occurrences, _) = get_instances(&assembly, 0).unwrap();
        // Only root-level instances; the sub-assembly is rigid.
        assert!(instances.contains_key("sub-1"));
        assert!(!instances.keys().any(|k| k.contains(SUBASSEMBLY_JOINER)));
        match &instances["sub-1"] {
            Instance::Assembly(a) => assert!(a.is_rigid),
            _ => panic!("expected assembly instance"),
        }
        // Occurrences deeper than the limit are dropped.
        assert!(occurrences.keys().all(|k| !k.contains(SUBASSEMBLY_JOINER)));
    }

    #[test]
    fn traversal_descends_within_limit() {
        let assembly = nested_assembly_fixture();
        let (instances, occurrences, _) = get_instances(&assembly, 1).unwrap();
        assert!(instances.contains_key("sub-1-SUB-inner-part"));
        match &instances["sub-1"] {
            Instance::Assembly(a) => assert!(!a.is_rigid),
            _ => panic!("expected assembly instance"),
        }
        assert!(occurrences.contains_key("sub-1-SUB-inner-part"));
    }

    #[test]
    fn max_depth_equal_to_real_depth_matches_unbounded() {
        let assembly = nested_assembly_fixture();
        let deep = get_instances(&assembly, 1).unwrap();
        let unbounded = get_instances(&assembly, usize::MAX - 1).unwrap();
        let deep_keys: Vec<_> = deep.0.keys().collect();
        let unbounded_keys: Vec<_> = unbounded.0.keys().collect();
        assert_eq!(deep_keys, unbounded_keys);
        assert_eq!(
            deep.1.keys().collect::<Vec<_>>(),
            unbounded.1.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn relations_key_by_driven_feature() {
        use armature_model::{AssemblyFeature, MateRelationMate};

        let mut assembly = nested_assembly_fixture();
        // Two revolute mates at root scope plus a screw relation on the
        // first and a suppressed mate that must be ignored.
        let cs = || MatedCS {
            x_axis: vec![1.0, 0.0, 0.0],
            y_axis: vec![0.0, 1.0, 0.0],
            z_axis: vec![0.0, 0.0, 1.0],
            origin: vec![0.0, 0.0, 0.0],
            part_tf: None,
        };
        let entity = |seed: &str| armature_model::MatedEntity {
            mated_occurrence: vec![id24(seed)],
            mated_cs: cs(),
            parent_cs: None,
        };
        assembly.root_assembly.features = vec![
            AssemblyFeature {
                id: "m1".into(),
                suppressed: false,
                data: FeatureData::Mate(MateFeatureData {
                    id: String::new(),
                    name: "hinge".into(),
                    mate_type: armature_model::MateType::Revolute,
                    mated_entities: vec![entity("sub"), entity("base")],
                }),
            },
            AssemblyFeature {
                id: "m2".into(),
                suppressed: true,
                data: FeatureData::Mate(MateFeatureData {
                    id: String::new(),
                    name: "ghost".into(),
                    mate_type: armature_model::MateType::Fastened,
                    mated_entities: vec![entity("base"), entity("sub")],
                }),
            },
            AssemblyFeature {
                id: "r1".into(),
                suppressed: false,
                data: FeatureData::MateRelation(MateRelationFeatureData {
                    id: String::new(),
                    name: "screw".into(),
                    relation_type: RelationType::Screw,
                    mates: vec![MateRelationMate {
                        feature_id: "m1".into(),
                    }],
                    reverse_direction: false,
                    relation_ratio: None,
                    relation_length: Some(0.004),
                }),
            },
        ];

        let (_, _, mut id_to_name) = get_instances(&assembly, 1).unwrap();
        let subassemblies = BTreeMap::new();
        let rigid = BTreeMap::new();
        let mut parts = PartMap::new();
        let (mates, relations) = get_mates_and_relations(
            &assembly,
            &subassemblies,
            &rigid,
            &mut id_to_name,
            &mut parts,
        )
        .unwrap();

        // parent "base" to child "sub-1"; the suppressed mate is gone.
        assert_eq!(mates.len(), 1);
        assert!(mates.contains_key("base_to_sub-1"));
        assert_eq!(mates["base_to_sub-1"].id, "m1");
        // A screw relation keys by its only mate reference.
        assert_eq!(relations.len(), 1);
        assert_eq!(relations["m1"].name, "screw");
    }

    #[test]
    fn keys_are_deterministic() {
        let assembly = nested_assembly_fixture();
        let a = get_instances(&assembly, 1).unwrap();
        let b = get_instances(&assembly, 1).unwrap();
        assert_eq!(
            a.0.keys().collect::<Vec<_>>(),
            b.0.keys().collect::<Vec<_>>()
        );
        assert_eq!(
            a.1.keys().collect::<Vec<_>>(),
            b.1.keys().collect::<Vec<_>>()
        );
    }
}
