// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CPU compute backend
//!
//! Runs the per-vertex occlusion kernel as a rayon parallel loop. Each
//! vertex is evaluated independently against read-only buffers, so results
//! do not depend on thread count or scheduling.

use std::f32::consts::TAU;

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::dispatch::{
    ComputeDispatch, DispatchError, KernelBuffers, KernelId, SampleUniforms, BRUTE_AO_VERT_BAKE,
};
use crate::raycast::{any_hit, Ray};

/// Reference backend running bake kernels on the CPU
#[derive(Debug, Default)]
pub struct CpuDispatcher {
    buffers: Option<KernelBuffers>,
    dispatch_count: usize,
}

impl CpuDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches run since creation
    #[inline]
    pub fn dispatch_count(&self) -> usize {
        self.dispatch_count
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.buffers.is_some()
    }
}

impl ComputeDispatch for CpuDispatcher {
    fn bind(&mut self, kernel: KernelId, buffers: KernelBuffers) -> Result<(), DispatchError> {
        if kernel != BRUTE_AO_VERT_BAKE {
            return Err(DispatchError::UnknownKernel(kernel));
        }
        let n = buffers.vertex_count();
        if buffers.normals.len() != n || buffers.tangents.len() != n {
            return Err(DispatchError::Device(format!(
                "vertex buffers disagree: {} vertices, {} normals, {} tangents",
                n,
                buffers.normals.len(),
                buffers.tangents.len()
            )));
        }
        let occluder_len = buffers.occluder_vertices.len();
        if buffers.occluder_indices.len() % 3 != 0
            || buffers.occluder_indices.iter().any(|&i| i as usize >= occluder_len)
        {
            return Err(DispatchError::Device("occluder index buffer is malformed".into()));
        }
        self.buffers = Some(buffers);
        Ok(())
    }

    fn dispatch(
        &mut self,
        kernel: KernelId,
        uniforms: &SampleUniforms,
        results: &mut [f32],
    ) -> Result<(), DispatchError> {
        if kernel != BRUTE_AO_VERT_BAKE {
            return Err(DispatchError::UnknownKernel(kernel));
        }
        let buffers = self.buffers.as_ref().ok_or(DispatchError::NotBound(kernel))?;
        if results.len() != buffers.vertex_count() {
            return Err(DispatchError::ResultLength {
                expected: buffers.vertex_count(),
                actual: results.len(),
            });
        }

        results
            .par_iter_mut()
            .enumerate()
            .for_each(|(vertex, out)| *out = vertex_occlusion(buffers, uniforms, vertex));

        self.dispatch_count += 1;
        Ok(())
    }

    fn release(&mut self, _kernel: KernelId) {
        self.buffers = None;
    }
}

/// Occlusion of one vertex for one sample direction: 1.0 if the ray leaving
/// the vertex hits the occluder, 0.0 otherwise.
///
/// Vertices with a zero-length normal have no hemisphere and report 0.0.
pub fn vertex_occlusion(buffers: &KernelBuffers, uniforms: &SampleUniforms, vertex: usize) -> f32 {
    let transform = &uniforms.transform;
    let position = transform.transform_point(&buffers.vertices[vertex]);
    let Some(normal) = transform
        .transform_normal(&buffers.normals[vertex])
        .try_normalize(f32::EPSILON)
    else {
        return 0.0;
    };

    let tangent = buffers.tangents[vertex];
    let (tangent_dir, bitangent) = tangent_frame(
        &normal,
        &transform.transform_vector(&tangent.xyz()),
        tangent.w,
    );

    let direction = sample_direction(
        &normal,
        &tangent_dir,
        &bitangent,
        uniforms.height_angle,
        uniforms.rotation,
    );
    let origin: Point3<f32> = position + normal * uniforms.surface_offset;
    let ray = Ray::new(origin, direction);

    if any_hit(&ray, &buffers.occluder_vertices, &buffers.occluder_indices) {
        1.0
    } else {
        0.0
    }
}

/// World direction `height_angle` above the tangent plane, turned
/// `rotation` of a revolution from the tangent towards the bitangent.
pub fn sample_direction(
    normal: &Vector3<f32>,
    tangent: &Vector3<f32>,
    bitangent: &Vector3<f32>,
    height_angle: f32,
    rotation: f32,
) -> Vector3<f32> {
    let (sin_h, cos_h) = height_angle.sin_cos();
    let (sin_r, cos_r) = (rotation * TAU).sin_cos();
    (tangent * (cos_h * cos_r) + bitangent * (cos_h * sin_r) + normal * sin_h).normalize()
}

/// Orthonormal tangent and bitangent around a unit `normal`.
///
/// The tangent is projected onto the surface plane; a missing or
/// normal-parallel tangent is replaced by an arbitrary perpendicular.
fn tangent_frame(
    normal: &Vector3<f32>,
    tangent: &Vector3<f32>,
    sign: f32,
) -> (Vector3<f32>, Vector3<f32>) {
    let projected = tangent - normal * normal.dot(tangent);
    let tangent = projected.try_normalize(1.0e-6).unwrap_or_else(|| {
        let helper = if normal.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
        helper.cross(normal).normalize()
    });
    let sign = if sign < 0.0 { -1.0 } else { 1.0 };
    (tangent, normal.cross(&tangent) * sign)
}
