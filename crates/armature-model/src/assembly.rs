//! Assembly snapshot entities: occurrences, instances, parts, sub-assemblies,
//! mates and mate relations.
//!
//! Field names follow the camelCase wire shape. Two fields are never on the
//! wire and are filled in by the compiler: [`AssemblyInstance::is_rigid`]
//! (set during traversal) and [`MatedEntity::parent_cs`] (set when a mate
//! side is collapsed into a rigid sub-assembly).

use std::collections::HashMap;

use armature_math::{Transform, Vec3};
use serde::{Deserialize, Serialize};

use crate::mass::MassProperties;
use crate::{uid, validate_id, ModelError, Result};

/// A leaf occurrence: the path of instance ids from the root assembly down
/// to one instance, with its world-relative transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occurrence {
    /// Whether the user pinned this occurrence in place.
    #[serde(default)]
    pub fixed: bool,
    /// Whether the occurrence is hidden in the source document.
    #[serde(default)]
    pub hidden: bool,
    /// Row-major 4x4 world transform.
    pub transform: Vec<f64>,
    /// Instance ids from the root assembly to this occurrence.
    pub path: Vec<String>,
}

impl Occurrence {
    /// The world transform as a typed matrix.
    pub fn tf(&self) -> Result<Transform> {
        Transform::from_row_major(&self.transform)
            .ok_or(ModelError::BadTransform(self.transform.len()))
    }

    /// Check the 16-element transform invariant.
    pub fn validate(&self) -> Result<()> {
        if self.transform.len() != 16 {
            return Err(ModelError::BadTransform(self.transform.len()));
        }
        Ok(())
    }
}

/// An instance of a part definition inside an assembly scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartInstance {
    /// Opaque instance id, unique within the snapshot.
    pub id: String,
    /// User-facing name, unsanitized.
    pub name: String,
    /// Whether the instance is suppressed in the source document.
    #[serde(default)]
    pub suppressed: bool,
    pub full_configuration: String,
    pub configuration: String,
    pub document_id: String,
    pub element_id: String,
    pub document_microversion: String,
    pub part_id: String,
    #[serde(default)]
    pub is_standard_content: bool,
}

impl PartInstance {
    /// Join key to the matching [`Part`] definition.
    pub fn uid(&self) -> String {
        uid::part_uid(
            &self.document_id,
            &self.document_microversion,
            &self.element_id,
            &self.part_id,
            &self.full_configuration,
        )
    }
}

/// An instance of a sub-assembly definition inside an assembly scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyInstance {
    /// Opaque instance id, unique within the snapshot.
    pub id: String,
    /// User-facing name, unsanitized.
    pub name: String,
    #[serde(default)]
    pub suppressed: bool,
    pub full_configuration: String,
    pub configuration: String,
    pub document_id: String,
    pub element_id: String,
    pub document_microversion: String,
    /// Set during traversal when this instance is treated as a single
    /// rigid link (depth limit, or no articulating features).
    #[serde(skip)]
    pub is_rigid: bool,
}

impl AssemblyInstance {
    /// Join key to the matching [`SubAssembly`] definition.
    pub fn uid(&self) -> String {
        uid::assembly_uid(
            &self.document_id,
            &self.document_microversion,
            &self.element_id,
            &self.full_configuration,
        )
    }
}

/// Either kind of instance, tagged by the wire `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Instance {
    /// A part instance.
    Part(PartInstance),
    /// A sub-assembly instance.
    Assembly(AssemblyInstance),
}

impl Instance {
    /// The instance id.
    pub fn id(&self) -> &str {
        match self {
            Instance::Part(p) => &p.id,
            Instance::Assembly(a) => &a.id,
        }
    }

    /// The unsanitized user-facing name.
    pub fn name(&self) -> &str {
        match self {
            Instance::Part(p) => &p.name,
            Instance::Assembly(a) => &a.name,
        }
    }

    /// Whether the instance is suppressed.
    pub fn suppressed(&self) -> bool {
        match self {
            Instance::Part(p) => p.suppressed,
            Instance::Assembly(a) => a.suppressed,
        }
    }

    /// The definition join key.
    pub fn uid(&self) -> String {
        match self {
            Instance::Part(p) => p.uid(),
            Instance::Assembly(a) => a.uid(),
        }
    }
}

/// A part definition: the solid a part instance points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub is_standard_content: bool,
    /// Empty for rigid-assembly stubs.
    #[serde(default)]
    pub part_id: String,
    #[serde(default)]
    pub body_type: String,
    pub full_configuration: String,
    pub configuration: String,
    pub document_id: String,
    pub element_id: String,
    pub document_microversion: String,
    #[serde(default)]
    pub document_version: String,
    /// Mass properties, fetched lazily; absent until resolved.
    #[serde(rename = "MassProperty", default)]
    pub mass_property: Option<MassProperties>,
    /// True when this record stands for a whole rigid sub-assembly.
    #[serde(default)]
    pub is_rigid_assembly: bool,
    /// Workspace id used to fetch the rigid assembly's mesh.
    #[serde(default)]
    pub rigid_assembly_workspace_id: Option<String>,
    /// Occurrence-key → intra-assembly transform, recorded when mates
    /// reach inside this rigid assembly.
    #[serde(skip)]
    pub rigid_assembly_to_part_tf: HashMap<String, Transform>,
}

impl Part {
    /// Join key matched by [`PartInstance::uid`].
    pub fn uid(&self) -> String {
        uid::part_uid(
            &self.document_id,
            &self.document_microversion,
            &self.element_id,
            &self.part_id,
            &self.full_configuration,
        )
    }

    /// Validate the id tuple.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.document_id)?;
        validate_id(&self.element_id)?;
        validate_id(&self.document_microversion)?;
        Ok(())
    }
}

/// A right-handed orthonormal frame attached to a mated entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatedCS {
    #[serde(rename = "xAxis")]
    pub x_axis: Vec<f64>,
    #[serde(rename = "yAxis")]
    pub y_axis: Vec<f64>,
    #[serde(rename = "zAxis")]
    pub z_axis: Vec<f64>,
    pub origin: Vec<f64>,
    /// Cached full transform when this frame was built from an occurrence
    /// transform rather than from axes.
    #[serde(skip)]
    pub part_tf: Option<Transform>,
}

impl MatedCS {
    /// Check the three-element invariant of every vector.
    pub fn validate(&self) -> Result<()> {
        for (context, v) in [
            ("xAxis", &self.x_axis),
            ("yAxis", &self.y_axis),
            ("zAxis", &self.z_axis),
            ("origin", &self.origin),
        ] {
            if v.len() != 3 {
                return Err(ModelError::BadBasis { context, len: v.len() });
            }
        }
        Ok(())
    }

    /// The part-frame → mate-frame transform: rotation columns are the
    /// three axes, translation is the origin. Returns the cached transform
    /// when one is present.
    pub fn part_to_mate_tf(&self) -> Result<Transform> {
        if let Some(tf) = &self.part_tf {
            return Ok(*tf);
        }
        self.validate()?;
        let col = |v: &Vec<f64>| Vec3::new(v[0], v[1], v[2]);
        Ok(Transform::from_basis(
            col(&self.x_axis),
            col(&self.y_axis),
            col(&self.z_axis),
            col(&self.origin),
        ))
    }

    /// Build a frame from a full transform, caching it.
    pub fn from_tf(tf: Transform) -> Self {
        let r = tf.rotation();
        let t = tf.translation();
        let col = |c: usize| vec![r[(0, c)], r[(1, c)], r[(2, c)]];
        Self {
            x_axis: col(0),
            y_axis: col(1),
            z_axis: col(2),
            origin: vec![t.x, t.y, t.z],
            part_tf: Some(tf),
        }
    }
}

/// One side of a mate: an occurrence path plus its local frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatedEntity {
    /// Instance-id path of the mated occurrence.
    pub mated_occurrence: Vec<String>,
    #[serde(rename = "matedCS")]
    pub mated_cs: MatedCS,
    /// Transform from the enclosing rigid assembly's frame to this
    /// entity's part frame; set when the occurrence is collapsed.
    #[serde(skip)]
    pub parent_cs: Option<MatedCS>,
}

impl MatedEntity {
    /// The effective part-frame → mate-frame transform, composing the
    /// rigid-assembly frame when the entity was collapsed.
    pub fn part_to_mate_tf(&self) -> Result<Transform> {
        let base = self.mated_cs.part_to_mate_tf()?;
        match &self.parent_cs {
            Some(parent) => Ok(parent.part_to_mate_tf()?.then(&base)),
            None => Ok(base),
        }
    }
}

/// The kind of constraint a mate applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MateType {
    Fastened,
    Revolute,
    Slider,
    Cylindrical,
    Planar,
    Ball,
    PinSlot,
    Parallel,
}

/// Data of a `mate` feature. `matedEntities` ordering is semantic:
/// index [`crate::CHILD`] is the child, [`crate::PARENT`] the parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MateFeatureData {
    /// Feature id, copied down from the enclosing feature.
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub mate_type: MateType,
    pub mated_entities: Vec<MatedEntity>,
}

/// Numeric relation kinds between two mates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Gear,
    Linear,
    Screw,
    RackAndPinion,
}

/// A reference to one mate participating in a relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MateRelationMate {
    pub feature_id: String,
}

/// Data of a `mateRelation` feature. `mates[0]` drives `mates[1]` except
/// for screws, which relate a single mate to itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MateRelationFeatureData {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub relation_type: RelationType,
    pub mates: Vec<MateRelationMate>,
    #[serde(default)]
    pub reverse_direction: bool,
    #[serde(default)]
    pub relation_ratio: Option<f64>,
    #[serde(default)]
    pub relation_length: Option<f64>,
}

/// Feature payload, adjacently tagged by the wire `featureType` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "featureType", content = "featureData")]
pub enum FeatureData {
    #[serde(rename = "mate")]
    Mate(MateFeatureData),
    #[serde(rename = "mateRelation")]
    MateRelation(MateRelationFeatureData),
    /// Mate groups do not articulate; the payload is opaque.
    #[serde(rename = "mateGroup")]
    MateGroup(serde_json::Value),
    #[serde(rename = "mateConnector")]
    MateConnector(serde_json::Value),
}

impl FeatureData {
    /// Whether this feature articulates the assembly it belongs to.
    pub fn articulates(&self) -> bool {
        !matches!(self, FeatureData::MateGroup(_))
    }
}

/// A feature inside an assembly scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyFeature {
    pub id: String,
    #[serde(default)]
    pub suppressed: bool,
    #[serde(flatten)]
    pub data: FeatureData,
}

/// A sub-assembly definition: instances and features, no occurrences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAssembly {
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub features: Vec<AssemblyFeature>,
    pub full_configuration: String,
    pub configuration: String,
    pub document_id: String,
    pub element_id: String,
    pub document_microversion: String,
}

impl SubAssembly {
    /// Join key matched by [`AssemblyInstance::uid`].
    pub fn uid(&self) -> String {
        uid::assembly_uid(
            &self.document_id,
            &self.document_microversion,
            &self.element_id,
            &self.full_configuration,
        )
    }

    /// A sub-assembly with no feature other than mate groups is rigid.
    pub fn articulated(&self) -> bool {
        self.features.iter().any(|f| f.data.articulates())
    }
}

/// Default-workspace metadata carried by flattened root assemblies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetaData {
    pub default_workspace: WorkspaceRef,
}

/// A bare workspace reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRef {
    pub id: String,
}

/// The root assembly scope; also the shape of a flattened rigid
/// sub-assembly expansion (which additionally carries aggregate mass).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootAssembly {
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub features: Vec<AssemblyFeature>,
    /// Every leaf occurrence below this scope.
    #[serde(default)]
    pub occurrences: Vec<Occurrence>,
    pub full_configuration: String,
    pub configuration: String,
    pub document_id: String,
    pub element_id: String,
    pub document_microversion: String,
    /// Aggregate mass properties; present on rigid expansions.
    #[serde(rename = "MassProperty", default)]
    pub mass_property: Option<MassProperties>,
    #[serde(default)]
    pub document_meta_data: Option<DocumentMetaData>,
}

impl RootAssembly {
    /// Join key matched by [`AssemblyInstance::uid`].
    pub fn uid(&self) -> String {
        uid::assembly_uid(
            &self.document_id,
            &self.document_microversion,
            &self.element_id,
            &self.full_configuration,
        )
    }
}

/// A complete assembly snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assembly {
    pub root_assembly: RootAssembly,
    #[serde(default)]
    pub sub_assemblies: Vec<SubAssembly>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Assembly {
    /// Validate ids, occurrence transforms and mate bases across the
    /// whole snapshot.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.root_assembly.document_id)?;
        validate_id(&self.root_assembly.element_id)?;
        for occurrence in &self.root_assembly.occurrences {
            occurrence.validate()?;
        }
        for part in &self.parts {
            part.validate()?;
        }
        for feature in self
            .root_assembly
            .features
            .iter()
            .chain(self.sub_assemblies.iter().flat_map(|s| s.features.iter()))
        {
            if let FeatureData::Mate(mate) = &feature.data {
                for entity in &mate.mated_entities {
                    entity.mated_cs.validate()?;
                }
            }
        }
        Ok(())
    }

    /// Parse a snapshot from its JSON wire form.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
