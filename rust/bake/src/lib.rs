// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vertex-Bake
//!
//! Bakes approximate shading into per-vertex colors of static meshes:
//!
//! - brute-force ambient occlusion, sampled over a hemisphere sweep of
//!   directions through a pluggable compute backend, and
//! - seam-aware color smoothing that averages each vertex with its
//!   topological neighbors, treating UV-seam duplicates as one vertex.
//!
//! A [`BakeDriver`] runs either bake one batch at a time so a host can stay
//! responsive, report progress and cancel between batches.

pub mod accumulator;
pub mod config;
pub mod cpu;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod occluder;
pub mod progress;
pub mod raycast;
pub mod sampler;
pub mod smooth;
pub mod transform;

// Re-export the mesh layer for convenience
pub use vertex_bake_topology::{
    Color, DuplicateGroups, MeshSnapshot, SubMesh, TopologyIndex, DEFAULT_DUPLICATE_TOLERANCE_SQ,
};

pub use accumulator::SampleAccumulator;
pub use config::{BakeConfig, BakeTarget, CommitPolicy, SweepParams};
pub use cpu::CpuDispatcher;
pub use dispatch::{
    ComputeDispatch, DispatchError, KernelBinding, KernelBuffers, KernelId, SampleUniforms,
    BRUTE_AO_VERT_BAKE,
};
pub use driver::{BakeDriver, DriverStep};
pub use error::{BakeStage, Error, Result};
pub use occluder::{Occluder, OccluderSource};
pub use progress::{
    CancelFlag, NoProgress, Progress, ProgressSink, LABEL_AVERAGING, LABEL_BAKING, LABEL_OVERLAP,
};
pub use sampler::{bake_occlusion, OcclusionSampler, SampleReport, SamplerState};
pub use smooth::{smooth_colors, smooth_colors_iterated};
pub use transform::Transform;
