// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for mesh snapshots and topology indexing.

/// Result type alias for topology operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while snapshotting or indexing a mesh.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required vertex attribute or the triangle list is empty.
    #[error("mesh has no {0}")]
    MissingAttribute(&'static str),

    /// A per-vertex attribute does not have one entry per vertex.
    #[error("mesh has {len} {attribute} for {vertex_count} vertices")]
    AttributeLength {
        attribute: &'static str,
        len: usize,
        vertex_count: usize,
    },

    /// A submesh index list does not describe whole triangles.
    #[error("submesh {sub_mesh} has {len} indices, which is not a multiple of 3")]
    TriangleListLength { sub_mesh: usize, len: usize },

    /// A triangle references a vertex that does not exist.
    #[error("submesh {sub_mesh} references vertex {index} of a {vertex_count}-vertex mesh")]
    IndexOutOfRange {
        sub_mesh: usize,
        index: u32,
        vertex_count: usize,
    },

    /// Colors cannot move between meshes with different vertex counts.
    #[error("cannot transfer colors from {source_count} onto {destination_count} vertices")]
    VertexCountMismatch {
        source_count: usize,
        destination_count: usize,
    },

    /// The squared-distance tolerance for duplicate detection is unusable.
    #[error("duplicate tolerance must be positive and finite, got {0}")]
    InvalidTolerance(f32),
}

impl Error {
    /// True for errors caused by bake settings rather than by the geometry.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::InvalidTolerance(_))
    }
}
