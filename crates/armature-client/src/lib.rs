//! The CAD service boundary of the armature compiler.
//!
//! The compiler core never talks HTTP itself: it is generic over the
//! narrow [`CadClient`] trait. A production implementation signs REST
//! requests against the CAD host; this workspace ships only the trait, a
//! snapshot-backed implementation used by tests and offline compiles, and
//! the mesh-asset download machinery.

pub mod asset;
pub mod document;
pub mod error;
pub mod snapshot;

pub use asset::{download_assets, MeshAsset, PassthroughStl, StlTransformer, MESHES_DIR};
pub use document::{Document, WorkspaceType};
pub use error::{ClientError, Result, DEFAULT_REQUEST_TIMEOUT};
pub use snapshot::{Snapshot, SnapshotClient};

use armature_model::{Assembly, MassProperties, RootAssembly};

/// API credentials loaded from the environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    /// Read `ACCESS_KEY` / `SECRET_KEY`; `None` when either is missing.
    pub fn from_env() -> Option<Self> {
        let access_key = std::env::var("ACCESS_KEY").ok()?;
        let secret_key = std::env::var("SECRET_KEY").ok()?;
        Some(Self {
            access_key,
            secret_key,
        })
    }
}

/// The narrow service interface the compiler depends on.
///
/// Implementations are expected to apply [`DEFAULT_REQUEST_TIMEOUT`] per
/// request and to map HTTP statuses as documented on [`ClientError`].
/// No retries: throttling surfaces as [`ClientError::Throttled`].
#[allow(async_fn_in_trait)]
pub trait CadClient {
    /// Fetch a read-only assembly snapshot.
    async fn get_assembly(
        &self,
        did: &str,
        wtype: WorkspaceType,
        wid: &str,
        eid: &str,
        configuration: &str,
        with_meta: bool,
    ) -> Result<Assembly>;

    /// Fetch a flattened root-assembly expansion, used for rigid
    /// sub-assemblies; `with_mass` requests aggregate mass properties.
    async fn get_root_assembly(
        &self,
        did: &str,
        wtype: WorkspaceType,
        wid: &str,
        eid: &str,
        with_mass: bool,
    ) -> Result<RootAssembly>;

    /// Fetch mass properties of one part.
    async fn get_mass_property(
        &self,
        did: &str,
        wtype: WorkspaceType,
        wid: &str,
        eid: &str,
        part_id: &str,
    ) -> Result<MassProperties>;

    /// Download one part's mesh as STL bytes.
    async fn download_part_stl(
        &self,
        did: &str,
        wtype: WorkspaceType,
        wid: &str,
        eid: &str,
        part_id: &str,
    ) -> Result<Vec<u8>>;

    /// Download a whole element's mesh as STL bytes. Implementations poll
    /// the export job until it reports `DONE` or `FAILED`.
    async fn download_assembly_stl(
        &self,
        did: &str,
        wtype: WorkspaceType,
        wid: &str,
        eid: &str,
    ) -> Result<Vec<u8>>;
}
