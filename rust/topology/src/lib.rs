// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Vertex-Bake Topology
//!
//! Per-bake mesh snapshots and the seam-aware topology index shared by the
//! occlusion and color-smoothing bakes.
//!
//! UV seams split one surface point into several vertices with identical
//! positions. The [`TopologyIndex`] records, for every vertex, each triangle
//! slot it occupies and the group of vertices it was split from, so that a
//! neighborhood walk can cross a seam as if the mesh were welded.

pub mod duplicates;
pub mod error;
pub mod index;
pub mod mesh;
pub mod multimap;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3, Vector4};

pub use duplicates::{DuplicateGroups, DEFAULT_DUPLICATE_TOLERANCE_SQ};
pub use error::{Error, Result};
pub use index::TopologyIndex;
pub use mesh::{Color, MeshSnapshot, SubMesh, TriangleRecord, VertexRecord};
pub use multimap::MultiMap;
