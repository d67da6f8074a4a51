//! The assembly compiler.
//!
//! Turns an assembly snapshot into a [`armature_robot::Robot`] in six
//! phases: instance traversal, sub-assembly resolution, part/mass
//! resolution, mate/relation resolution, graph build + orientation, and
//! link/joint synthesis. The phases hand each other owned maps; after the
//! mate resolver runs, nothing is mutated again.

use armature_client::{CadClient, ClientError, Document};
use armature_model::ModelError;
use armature_robot::{Robot, RobotError};
use thiserror::Error;
use tracing::info;

pub mod builder;
pub mod graph;
pub mod parse;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use graph::KinematicGraph;
pub use parse::{
    get_instances, get_mates_and_relations, get_parts, get_subassemblies, IdNameMap, InstanceMap,
    MateMap, OccurrenceMap, PartMap, RelationMap,
};

/// Compile failures.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Snapshot validation failure.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// CAD service failure.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Emitter failure.
    #[error(transparent)]
    Robot(#[from] RobotError),

    /// An occurrence path element has no entry in the id→name map.
    #[error("unknown instance reference: {0}")]
    UnknownInstanceRef(String),

    /// The mate graph has nodes but no edges at all.
    #[error("assembly has no mates connecting its parts")]
    DisconnectedAssembly,

    /// The elected root is not a node of the mate graph.
    #[error("root {0} is not present in the mate graph")]
    RootNotInGraph(String),

    /// A mate references an occurrence that is hidden or missing.
    #[error("mate {mate}: side {side} is hidden or missing")]
    MateSideMissing {
        mate: String,
        side: String,
    },
}

/// Result alias for compile operations.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Pipeline options.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    /// Sub-assemblies at or beyond this depth become rigid links.
    pub max_depth: usize,
    /// Elect a user-fixed occurrence as the tree root when one exists.
    pub use_user_defined_root: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_depth: 0,
            use_user_defined_root: false,
        }
    }
}

/// Run the whole pipeline against a document address.
pub async fn compile<C: CadClient>(
    client: &C,
    document: &Document,
    robot_name: &str,
    options: CompileOptions,
) -> Result<Robot> {
    let assembly = client
        .get_assembly(
            &document.did,
            document.wtype,
            &document.wid,
            &document.eid,
            "default",
            true,
        )
        .await?;
    assembly.validate()?;
    compile_assembly(client, &assembly, &document.wid, robot_name, options).await
}

/// Run the pipeline against an already-fetched snapshot.
pub async fn compile_assembly<C: CadClient>(
    client: &C,
    assembly: &armature_model::Assembly,
    wid: &str,
    robot_name: &str,
    options: CompileOptions,
) -> Result<Robot> {
    let (mut instances, occurrences, mut id_to_name) =
        get_instances(assembly, options.max_depth)?;
    info!(
        instances = instances.len(),
        occurrences = occurrences.len(),
        "traversal complete"
    );

    let (subassemblies, rigid_subassemblies) =
        get_subassemblies(assembly, client, &mut instances).await?;
    let mut parts = get_parts(assembly, &rigid_subassemblies, client, &instances).await?;
    let (mates, relations) = get_mates_and_relations(
        assembly,
        &subassemblies,
        &rigid_subassemblies,
        &mut id_to_name,
        &mut parts,
    )?;
    info!(
        parts = parts.len(),
        mates = mates.len(),
        relations = relations.len(),
        "resolution complete"
    );

    let graph = graph::create_graph(
        &occurrences,
        &instances,
        &parts,
        &mates,
        options.use_user_defined_root,
    )?;
    info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        root = %graph.root,
        "kinematic graph oriented"
    );

    builder::build_robot(robot_name, &graph, &parts, &mates, &relations, wid)
}
