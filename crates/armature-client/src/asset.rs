//! Mesh assets: one STL per link, downloaded concurrently on save.

use std::path::Path;

use armature_math::Transform;
use futures::future::join_all;
use tracing::{info, warn};

use crate::document::WorkspaceType;
use crate::error::Result;
use crate::CadClient;

/// Directory next to the robot description that receives the meshes.
pub const MESHES_DIR: &str = "meshes";

/// Applies a 4x4 transform to an STL stream. The actual mesh rewrite is an
/// external collaborator; the compiler only fixes the call shape.
pub trait StlTransformer {
    /// Return the transformed STL bytes.
    fn apply(&self, stl: &[u8], tf: &Transform) -> Result<Vec<u8>>;
}

/// Writes meshes through unchanged. Used by tests and offline compiles;
/// warns once per non-identity transform it swallows.
pub struct PassthroughStl;

impl StlTransformer for PassthroughStl {
    fn apply(&self, stl: &[u8], tf: &Transform) -> Result<Vec<u8>> {
        if tf.distance(&Transform::identity()) > 1e-9 {
            warn!("passthrough STL transformer dropping a non-identity transform");
        }
        Ok(stl.to_vec())
    }
}

/// Everything needed to materialize one link's mesh file.
#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub did: String,
    pub wtype: WorkspaceType,
    pub wid: String,
    pub eid: String,
    /// Empty for rigid-assembly exports.
    pub part_id: String,
    /// Rigid assemblies export the whole element, not a single part.
    pub is_rigid_assembly: bool,
    /// `<sanitized-link-name>.stl`.
    pub file_name: String,
    /// STL frame → link frame; applied before writing.
    pub stl_to_link_tf: Transform,
    /// Set when the asset came from an existing file on disk (URDF import)
    /// and must not be re-downloaded.
    pub is_from_file: bool,
}

impl MeshAsset {
    /// Path of the mesh file relative to the robot description.
    pub fn relative_path(&self) -> String {
        format!("{MESHES_DIR}/{}", self.file_name)
    }

    /// Download, transform and write this asset under `out_dir`.
    pub async fn download<C: CadClient, T: StlTransformer>(
        &self,
        client: &C,
        transformer: &T,
        out_dir: &Path,
    ) -> Result<()> {
        let raw = if self.is_rigid_assembly {
            client
                .download_assembly_stl(&self.did, self.wtype, &self.wid, &self.eid)
                .await?
        } else {
            client
                .download_part_stl(&self.did, self.wtype, &self.wid, &self.eid, &self.part_id)
                .await?
        };
        let transformed = transformer.apply(&raw, &self.stl_to_link_tf)?;

        let dir = out_dir.join(MESHES_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, transformed).await?;
        info!(path = %path.display(), "mesh saved");
        Ok(())
    }
}

/// Download every asset concurrently; the first failure aborts the save.
pub async fn download_assets<'a, C, T, I>(
    assets: I,
    client: &C,
    transformer: &T,
    out_dir: &Path,
) -> Result<()>
where
    C: CadClient,
    T: StlTransformer,
    I: IntoIterator<Item = &'a MeshAsset>,
{
    let downloads = assets
        .into_iter()
        .filter(|asset| !asset.is_from_file)
        .map(|asset| asset.download(client, transformer, out_dir));
    for result in join_all(downloads).await {
        result?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_is_under_meshes() {
        let asset = MeshAsset {
            did: String::new(),
            wtype: WorkspaceType::Workspace,
            wid: String::new(),
            eid: String::new(),
            part_id: String::new(),
            is_rigid_assembly: false,
            file_name: "base-link.stl".into(),
            stl_to_link_tf: Transform::identity(),
            is_from_file: false,
        };
        assert_eq!(asset.relative_path(), "meshes/base-link.stl");
    }

    #[test]
    fn passthrough_returns_bytes() {
        let out = PassthroughStl
            .apply(b"solid x", &Transform::identity())
            .unwrap();
        assert_eq!(out, b"solid x");
    }
}
