//! Typed model of a parametric CAD assembly snapshot.
//!
//! These types mirror the JSON shape delivered by the CAD REST API:
//! a root assembly with instances, features and leaf occurrences, a flat
//! list of sub-assembly definitions, and a flat list of part definitions.
//! Instances carry identity only; the definition record is found through a
//! 16-hex-character UID digest.
//!
//! Construction and validation never perform I/O.

use thiserror::Error;

pub mod assembly;
pub mod mass;
pub mod name;
pub mod uid;

pub use assembly::{
    Assembly, AssemblyFeature, AssemblyInstance, FeatureData, Instance, MateFeatureData,
    MateRelationFeatureData, MateRelationMate, MateType, MatedCS, MatedEntity, Occurrence, Part,
    PartInstance, RelationType, RootAssembly, SubAssembly,
};
pub use mass::MassProperties;

/// Length of every opaque entity identifier on the wire.
pub const ID_LENGTH: usize = 24;

/// Index of the child entity in `matedEntities`.
pub const CHILD: usize = 0;

/// Index of the parent entity in `matedEntities`.
pub const PARENT: usize = 1;

/// Validation failures of a snapshot. Each variant names the offending
/// value so the caller can point back at the source document.
#[derive(Error, Debug)]
pub enum ModelError {
    /// An entity id is not exactly 24 characters.
    #[error("invalid id {0:?}: expected {ID_LENGTH} characters")]
    InvalidId(String),

    /// An occurrence or cached transform does not have 16 elements.
    #[error("bad transform: expected 16 elements, got {0}")]
    BadTransform(usize),

    /// A mated coordinate system vector does not have 3 elements.
    #[error("bad basis vector in {context}: expected 3 elements, got {len}")]
    BadBasis {
        /// Which vector failed (`xAxis`, `yAxis`, `zAxis` or `origin`).
        context: &'static str,
        /// The observed length.
        len: usize,
    },
}

/// Result alias for model validation.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Check that `id` is a well-formed 24-character identifier.
pub fn validate_id(id: &str) -> Result<()> {
    if id.len() != ID_LENGTH {
        return Err(ModelError::InvalidId(id.to_owned()));
    }
    Ok(())
}
