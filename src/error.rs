//! Error types for the ism-reverb crate.
//!
//! The simulation pipeline itself never fails: invalid reflection paths and
//! out-of-range delays are pruned silently, and out-of-range parameters are
//! clamped at assignment. Errors only arise at the construction seams (mesh
//! data that does not describe a triangle list) and at keyed lookups.

use thiserror::Error;

/// Error type for room geometry construction and simulation lookups.
#[derive(Debug, Error)]
pub enum IsmError {
    /// Vertex normal count does not match vertex position count.
    #[error("mesh attribute mismatch: {positions} positions vs {normals} normals")]
    MeshAttributeMismatch {
        /// Number of vertex positions.
        positions: usize,
        /// Number of vertex normals.
        normals: usize,
    },

    /// Triangle index buffer length is not a multiple of three.
    #[error("triangle index count {count} is not a multiple of three")]
    MeshIndexCount {
        /// Length of the index buffer.
        count: usize,
    },

    /// A triangle index points past the end of the vertex buffer.
    #[error("triangle index {index} out of bounds for {vertices} vertices")]
    MeshIndexOutOfBounds {
        /// The offending index.
        index: u32,
        /// Number of vertices in the mesh.
        vertices: usize,
    },

    /// A source id that was never returned by `Simulation::add_source`.
    #[error("unknown source id: {id}")]
    UnknownSource {
        /// The id that failed to resolve.
        id: usize,
    },
}

/// Convenience result type for ism-reverb operations.
pub type Result<T> = std::result::Result<T, IsmError>;
