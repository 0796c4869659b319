// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Occlusion sampler
//!
//! Sweeps `height_steps x rotation_steps` directions over each vertex's
//! hemisphere. Every sample is one kernel dispatch over all vertices
//! followed by a fold into the running per-vertex average. Samples never
//! overlap: the next dispatch starts only after the previous fold.
//!
//! Values follow the kernel convention: 0 = unoccluded, 1 = occluded.

use vertex_bake_topology::MeshSnapshot;

use crate::accumulator::SampleAccumulator;
use crate::config::SweepParams;
use crate::dispatch::{
    ComputeDispatch, KernelBinding, KernelBuffers, SampleUniforms, BRUTE_AO_VERT_BAKE,
};
use crate::error::{Error, Result};
use crate::occluder::OccluderSource;
use crate::transform::Transform;

/// Where a sampler is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    /// Parameters checked, no buffers bound
    Idle,
    /// Buffers bound, no sample taken
    Configured,
    /// Dispatching sample `(height, rotation)`
    Sweeping { height: u32, rotation: u32 },
    /// Folding the results of sample `(height, rotation)`
    Accumulating { height: u32, rotation: u32 },
    /// Every sample folded
    Done,
    /// Buffers released
    Released,
}

/// Outcome of one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleReport {
    /// 1-based position of this sample in the sweep
    pub sample_index: u32,
    pub sample_count: u32,
    pub height_step: u32,
    pub rotation_step: u32,
    pub height_angle: f32,
    pub rotation: f32,
}

impl SampleReport {
    /// Fraction of the sweep completed, exactly 1.0 after the last sample
    #[inline]
    pub fn progress(&self) -> f32 {
        self.sample_index as f32 / self.sample_count as f32
    }

    #[inline]
    pub fn is_last(&self) -> bool {
        self.sample_index == self.sample_count
    }
}

/// Steppable hemisphere sweep over one mesh.
pub struct OcclusionSampler<D: ComputeDispatch> {
    params: SweepParams,
    transform: Transform,
    binding: Option<KernelBinding<D>>,
    accumulator: SampleAccumulator,
    results: Vec<f32>,
    state: SamplerState,
}

impl<D: ComputeDispatch> OcclusionSampler<D> {
    /// Create an idle sampler; fails on unusable sweep parameters
    pub fn new(params: SweepParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            transform: Transform::identity(),
            binding: None,
            accumulator: SampleAccumulator::new(0),
            results: Vec::new(),
            state: SamplerState::Idle,
        })
    }

    /// Upload `mesh` and its occluder to `dispatcher`
    pub fn configure(
        &mut self,
        dispatcher: D,
        mesh: &MeshSnapshot,
        transform: Transform,
        occluder: &OccluderSource,
    ) -> Result<()> {
        if self.state != SamplerState::Idle {
            return Err(Error::configuration(format!(
                "sampler can only be configured once, state is {:?}",
                self.state
            )));
        }
        mesh.validate()?;

        let (occluder_vertices, occluder_indices) = occluder.resolve(mesh, &transform);
        let buffers = KernelBuffers {
            vertices: mesh.positions().to_vec(),
            normals: mesh.normals().to_vec(),
            tangents: mesh.tangents().to_vec(),
            occluder_vertices,
            occluder_indices,
        };

        self.binding = Some(KernelBinding::bind(dispatcher, BRUTE_AO_VERT_BAKE, buffers)?);
        self.transform = transform;
        self.accumulator = SampleAccumulator::new(mesh.vertex_count());
        self.results = vec![0.0; mesh.vertex_count()];
        self.state = SamplerState::Configured;
        Ok(())
    }

    #[inline]
    pub fn state(&self) -> SamplerState {
        self.state
    }

    #[inline]
    pub fn params(&self) -> &SweepParams {
        &self.params
    }

    #[inline]
    pub fn sample_count(&self) -> u32 {
        self.params.sample_count()
    }

    /// Current per-vertex averages
    #[inline]
    pub fn averages(&self) -> &[f32] {
        self.accumulator.averages()
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.state == SamplerState::Done
    }

    /// Take the next sample: dispatch, wait for results, fold them in.
    ///
    /// Returns `None` once the sweep is complete. A failed dispatch releases
    /// the buffers and leaves the averages of earlier samples in place.
    pub fn step(&mut self) -> Result<Option<SampleReport>> {
        match self.state {
            SamplerState::Configured | SamplerState::Accumulating { .. } => {}
            SamplerState::Done => return Ok(None),
            state => {
                return Err(Error::configuration(format!(
                    "sampler cannot take a sample in state {state:?}"
                )))
            }
        }

        let next = self.accumulator.sample_count();
        let height = next / self.params.rotation_steps;
        let rotation = next % self.params.rotation_steps;
        let uniforms = SampleUniforms {
            transform: self.transform,
            height_angle: self.params.height_angle(height),
            rotation: self.params.rotation(rotation),
            surface_offset: self.params.surface_offset,
        };

        self.state = SamplerState::Sweeping { height, rotation };
        let Some(binding) = self.binding.as_mut() else {
            return Err(Error::configuration("sampler has no bound kernel"));
        };
        if let Err(err) = binding.dispatch(&uniforms, &mut self.results) {
            tracing::warn!(height, rotation, error = %err, "Occlusion dispatch failed");
            self.release();
            return Err(err.into());
        }

        self.state = SamplerState::Accumulating { height, rotation };
        let sample_index = self.accumulator.fold(&self.results)?;

        let report = SampleReport {
            sample_index,
            sample_count: self.sample_count(),
            height_step: height,
            rotation_step: rotation,
            height_angle: uniforms.height_angle,
            rotation: uniforms.rotation,
        };
        tracing::debug!(
            sample_index,
            sample_count = report.sample_count,
            height_angle = report.height_angle,
            rotation = report.rotation,
            "Folded occlusion sample"
        );

        if report.is_last() {
            self.state = SamplerState::Done;
        }
        Ok(Some(report))
    }

    /// Free the kernel buffers. The averages stay readable.
    pub fn release(&mut self) {
        if let Some(mut binding) = self.binding.take() {
            binding.release();
        }
        self.state = SamplerState::Released;
    }

    /// Consume the sampler, returning the per-vertex averages
    pub fn into_averages(mut self) -> Vec<f32> {
        self.release();
        std::mem::replace(&mut self.accumulator, SampleAccumulator::new(0)).into_averages()
    }
}

/// Run a full sweep and return per-vertex occlusion (0 = unoccluded,
/// 1 = occluded in every sampled direction).
pub fn bake_occlusion<D: ComputeDispatch>(
    mesh: &MeshSnapshot,
    transform: Transform,
    occluder: &OccluderSource,
    params: &SweepParams,
    dispatcher: D,
) -> Result<Vec<f32>> {
    let mut sampler = OcclusionSampler::new(*params)?;
    sampler.configure(dispatcher, mesh, transform, occluder)?;
    while sampler.step()?.is_some() {}
    Ok(sampler.into_averages())
}
