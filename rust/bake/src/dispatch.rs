// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compute dispatch capability
//!
//! The occlusion test runs as a data-parallel kernel over all baked
//! vertices. Backends bind the mesh buffers once per bake, run one dispatch
//! per sweep sample and release the buffers when the bake ends. A dispatch
//! returns only after every vertex has been written, which is the barrier
//! the sweep relies on between samples.

use std::fmt;

use nalgebra::{Point3, Vector3, Vector4};
use thiserror::Error;

use crate::transform::Transform;

/// Name of a compute kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelId(pub &'static str);

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Per-vertex occlusion test: writes 1.0 for vertices whose sample ray hits
/// the occluder and 0.0 for vertices that see past it.
pub const BRUTE_AO_VERT_BAKE: KernelId = KernelId("BruteAOVertBake");

/// Errors raised by a compute backend
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Kernel not found: {0}")]
    UnknownKernel(KernelId),

    #[error("Kernel {0} has no bound buffers")]
    NotBound(KernelId),

    #[error("Result buffer holds {actual} values but {expected} vertices are bound")]
    ResultLength { expected: usize, actual: usize },

    #[error("Compute device unavailable: {0}")]
    Device(String),
}

/// Buffers uploaded once per bake and shared read-only by every dispatch.
#[derive(Debug, Clone, Default)]
pub struct KernelBuffers {
    /// Baked vertices in object space
    pub vertices: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub tangents: Vec<Vector4<f32>>,
    /// Occluder vertices, already in world space
    pub occluder_vertices: Vec<Point3<f32>>,
    pub occluder_indices: Vec<u32>,
}

impl KernelBuffers {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Values that change from one sample to the next
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleUniforms {
    /// Placement of the baked mesh
    pub transform: Transform,
    /// Elevation above the tangent plane, radians
    pub height_angle: f32,
    /// Turn around the normal, fraction of a revolution
    pub rotation: f32,
    pub surface_offset: f32,
}

/// A compute backend able to run bake kernels.
pub trait ComputeDispatch {
    /// Upload the buffers `kernel` reads
    fn bind(&mut self, kernel: KernelId, buffers: KernelBuffers) -> Result<(), DispatchError>;

    /// Run `kernel` over every bound vertex, writing one value per vertex
    /// into `results`. Returns once all values are written.
    fn dispatch(
        &mut self,
        kernel: KernelId,
        uniforms: &SampleUniforms,
        results: &mut [f32],
    ) -> Result<(), DispatchError>;

    /// Free the buffers bound to `kernel`. Releasing twice is harmless.
    fn release(&mut self, kernel: KernelId);
}

impl<T: ComputeDispatch + ?Sized> ComputeDispatch for &mut T {
    fn bind(&mut self, kernel: KernelId, buffers: KernelBuffers) -> Result<(), DispatchError> {
        (**self).bind(kernel, buffers)
    }

    fn dispatch(
        &mut self,
        kernel: KernelId,
        uniforms: &SampleUniforms,
        results: &mut [f32],
    ) -> Result<(), DispatchError> {
        (**self).dispatch(kernel, uniforms, results)
    }

    fn release(&mut self, kernel: KernelId) {
        (**self).release(kernel)
    }
}

impl<T: ComputeDispatch + ?Sized> ComputeDispatch for Box<T> {
    fn bind(&mut self, kernel: KernelId, buffers: KernelBuffers) -> Result<(), DispatchError> {
        (**self).bind(kernel, buffers)
    }

    fn dispatch(
        &mut self,
        kernel: KernelId,
        uniforms: &SampleUniforms,
        results: &mut [f32],
    ) -> Result<(), DispatchError> {
        (**self).dispatch(kernel, uniforms, results)
    }

    fn release(&mut self, kernel: KernelId) {
        (**self).release(kernel)
    }
}

/// A kernel with buffers bound on a backend.
///
/// The buffers are released when the binding is dropped, whichever way the
/// bake ends.
pub struct KernelBinding<D: ComputeDispatch> {
    dispatcher: D,
    kernel: KernelId,
    vertex_count: usize,
    released: bool,
}

impl<D: ComputeDispatch> KernelBinding<D> {
    /// Bind `buffers` to `kernel` on `dispatcher`
    pub fn bind(
        mut dispatcher: D,
        kernel: KernelId,
        buffers: KernelBuffers,
    ) -> Result<Self, DispatchError> {
        let vertex_count = buffers.vertex_count();
        if let Err(err) = dispatcher.bind(kernel, buffers) {
            dispatcher.release(kernel);
            return Err(err);
        }
        tracing::debug!(kernel = %kernel, vertex_count, "Bound kernel buffers");
        Ok(Self {
            dispatcher,
            kernel,
            vertex_count,
            released: false,
        })
    }

    #[inline]
    pub fn kernel(&self) -> KernelId {
        self.kernel
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Run one dispatch; `results` must hold one value per bound vertex
    pub fn dispatch(
        &mut self,
        uniforms: &SampleUniforms,
        results: &mut [f32],
    ) -> Result<(), DispatchError> {
        if self.released {
            return Err(DispatchError::NotBound(self.kernel));
        }
        if results.len() != self.vertex_count {
            return Err(DispatchError::ResultLength {
                expected: self.vertex_count,
                actual: results.len(),
            });
        }
        self.dispatcher.dispatch(self.kernel, uniforms, results)
    }

    pub fn release(&mut self) {
        if !self.released {
            self.dispatcher.release(self.kernel);
            self.released = true;
            tracing::debug!(kernel = %self.kernel, "Released kernel buffers");
        }
    }
}

impl<D: ComputeDispatch> Drop for KernelBinding<D> {
    fn drop(&mut self) {
        self.release();
    }
}
