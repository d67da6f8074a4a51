//! A [`CadClient`] served from a pre-fetched snapshot document.
//!
//! Used by the integration tests and by the CLI's offline mode: the
//! assembly, any rigid root-assembly expansions and per-part mass
//! properties are read from one JSON file instead of the network.

use std::collections::HashMap;
use std::path::Path;

use armature_model::{Assembly, MassProperties, RootAssembly};
use serde::{Deserialize, Serialize};

use crate::document::WorkspaceType;
use crate::error::{ClientError, Result};
use crate::CadClient;

/// An empty binary STL: 80-byte header plus a zero triangle count.
fn empty_stl() -> Vec<u8> {
    let mut bytes = vec![0u8; 84];
    bytes[..8].copy_from_slice(b"exported");
    bytes
}

/// The on-disk snapshot shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// The assembly returned by `get_assembly`.
    pub assembly: Assembly,
    /// Rigid expansions keyed `{did}/{wid}/{eid}`.
    #[serde(default)]
    pub root_assemblies: HashMap<String, RootAssembly>,
    /// Mass properties keyed `{did}/{wid}/{eid}/{part_id}`.
    #[serde(default)]
    pub mass_properties: HashMap<String, MassProperties>,
}

/// Snapshot-backed client. Mesh downloads yield an empty but well-formed
/// binary STL so offline saves still produce a complete artifact tree.
pub struct SnapshotClient {
    snapshot: Snapshot,
}

impl SnapshotClient {
    /// Wrap an in-memory snapshot.
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&json)?;
        Ok(Self::new(snapshot))
    }

    fn element_key(did: &str, wid: &str, eid: &str) -> String {
        format!("{did}/{wid}/{eid}")
    }
}

impl CadClient for SnapshotClient {
    async fn get_assembly(
        &self,
        _did: &str,
        _wtype: WorkspaceType,
        _wid: &str,
        _eid: &str,
        _configuration: &str,
        _with_meta: bool,
    ) -> Result<Assembly> {
        Ok(self.snapshot.assembly.clone())
    }

    async fn get_root_assembly(
        &self,
        did: &str,
        _wtype: WorkspaceType,
        wid: &str,
        eid: &str,
        _with_mass: bool,
    ) -> Result<RootAssembly> {
        let key = Self::element_key(did, wid, eid);
        self.snapshot
            .root_assemblies
            .get(&key)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("root assembly {key}")))
    }

    async fn get_mass_property(
        &self,
        did: &str,
        _wtype: WorkspaceType,
        wid: &str,
        eid: &str,
        part_id: &str,
    ) -> Result<MassProperties> {
        let key = format!("{did}/{wid}/{eid}/{part_id}");
        self.snapshot
            .mass_properties
            .get(&key)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("mass properties {key}")))
    }

    async fn download_part_stl(
        &self,
        _did: &str,
        _wtype: WorkspaceType,
        _wid: &str,
        _eid: &str,
        _part_id: &str,
    ) -> Result<Vec<u8>> {
        Ok(empty_stl())
    }

    async fn download_assembly_stl(
        &self,
        _did: &str,
        _wtype: WorkspaceType,
        _wid: &str,
        _eid: &str,
    ) -> Result<Vec<u8>> {
        Ok(empty_stl())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stl_has_zero_triangles() {
        let bytes = empty_stl();
        assert_eq!(bytes.len(), 84);
        assert_eq!(&bytes[80..84], &[0, 0, 0, 0]);
    }
}
