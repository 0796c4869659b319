// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cooperative bake driver
//!
//! A bake is split into batches: one occlusion sample, one index build or
//! one smoothing pass. [`BakeDriver::resume`] runs exactly one batch on the
//! driver's worker pool and returns, so the host decides when the next
//! batch runs. Dropping the driver between batches cancels the bake and
//! releases every buffer it holds; the borrowed snapshot keeps whatever
//! colors were committed so far.

use rayon::{ThreadPool, ThreadPoolBuilder};
use vertex_bake_topology::{Color, MeshSnapshot, TopologyIndex};

use crate::config::{BakeConfig, CommitPolicy};
use crate::cpu::CpuDispatcher;
use crate::dispatch::ComputeDispatch;
use crate::error::{BakeStage, Error, Result};
use crate::occluder::OccluderSource;
use crate::progress::{
    CancelFlag, Progress, ProgressSink, LABEL_AVERAGING, LABEL_BAKING, LABEL_OVERLAP,
};
use crate::sampler::OcclusionSampler;
use crate::smooth::smooth_colors;
use crate::transform::Transform;

/// Share of smoothing progress reported once the index is built
const INDEX_FRACTION: f32 = 0.2;

/// Outcome of one [`BakeDriver::resume`] call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriverStep {
    /// A batch ran; more may follow
    Progress(Progress),
    /// Nothing left to do
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Sweep,
    BuildIndex,
    Smooth { pass: u32 },
    Finished,
    Aborted(BakeStage),
}

/// Drives an occlusion or smoothing bake over a borrowed mesh snapshot.
pub struct BakeDriver<'m, D: ComputeDispatch + Send = CpuDispatcher> {
    mesh: &'m mut MeshSnapshot,
    config: BakeConfig,
    sampler: Option<OcclusionSampler<D>>,
    index: Option<TopologyIndex>,
    working: Vec<Color>,
    phase: Phase,
    pool: ThreadPool,
}

impl<'m, D: ComputeDispatch + Send> BakeDriver<'m, D> {
    /// Prepare an occlusion bake of `mesh` placed by `transform`.
    ///
    /// The configuration and mesh are checked before any buffer is bound.
    pub fn occlusion(
        mesh: &'m mut MeshSnapshot,
        transform: Transform,
        occluder: OccluderSource,
        config: BakeConfig,
        dispatcher: D,
    ) -> Result<Self> {
        config.validate()?;
        mesh.validate()?;

        let pool = build_pool(config.worker_threads)?;
        let mut sampler = OcclusionSampler::new(config.sweep)?;
        sampler.configure(dispatcher, mesh, transform, &occluder)?;

        tracing::info!(
            vertex_count = mesh.vertex_count(),
            sample_count = sampler.sample_count(),
            target = ?config.sweep.target,
            commit = ?config.commit,
            "Starting occlusion bake"
        );

        let working = mesh.colors().to_vec();
        Ok(Self {
            mesh,
            config,
            sampler: Some(sampler),
            index: None,
            working,
            phase: Phase::Sweep,
            pool,
        })
    }

    /// Advance the bake by one batch.
    ///
    /// Once a batch has failed or the bake was cancelled, every further call
    /// returns [`Error::Aborted`].
    pub fn resume(&mut self) -> Result<DriverStep> {
        let result = match self.phase {
            Phase::Sweep => self.sweep_step(),
            Phase::BuildIndex => self.index_step(),
            Phase::Smooth { pass } => self.smooth_step(pass),
            Phase::Finished => return Ok(DriverStep::Finished),
            Phase::Aborted(stage) => return Err(Error::Aborted(stage)),
        };
        if let Err(err) = &result {
            tracing::warn!(stage = ?err.stage(), error = %err, "Bake aborted");
            self.teardown(err.stage());
        }
        result.map(DriverStep::Progress)
    }

    /// Resume until the bake finishes, reporting each batch to `sink`.
    ///
    /// `cancel` is checked before every batch; a cancelled bake releases
    /// its buffers and returns [`Error::Cancelled`].
    pub fn run<S: ProgressSink>(&mut self, mut sink: S, cancel: &CancelFlag) -> Result<()> {
        loop {
            if cancel.is_cancelled() && self.is_running() {
                tracing::warn!(stage = "cancelled", "Bake cancelled by host");
                self.teardown(BakeStage::Cancelled);
                return Err(Error::Cancelled);
            }
            match self.resume()? {
                DriverStep::Progress(progress) => sink.report(&progress),
                DriverStep::Finished => return Ok(()),
            }
        }
    }

    /// True once every batch has run and the result is committed
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted_stage().is_some()
    }

    /// Stage of the failure or cancellation that stopped the bake
    pub fn aborted_stage(&self) -> Option<BakeStage> {
        match self.phase {
            Phase::Aborted(stage) => Some(stage),
            _ => None,
        }
    }

    fn is_running(&self) -> bool {
        !matches!(self.phase, Phase::Finished | Phase::Aborted(_))
    }

    #[inline]
    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    #[inline]
    pub fn mesh(&self) -> &MeshSnapshot {
        self.mesh
    }

    fn sweep_step(&mut self) -> Result<Progress> {
        let Some(sampler) = self.sampler.as_mut() else {
            return Err(Error::configuration("occlusion bake has no sampler"));
        };
        let report = self
            .pool
            .install(|| sampler.step())?
            .ok_or_else(|| Error::configuration("occlusion sweep already complete"))?;

        let target = self.config.sweep.target;
        for (color, &value) in self.working.iter_mut().zip(sampler.averages()) {
            target.write(color, value);
        }
        if self.config.commit == CommitPolicy::Incremental {
            self.publish();
        }

        if report.is_last() {
            self.sampler = None;
            if self.config.smooth_after_occlusion {
                self.phase = Phase::BuildIndex;
            } else {
                self.finish();
            }
        }
        Ok(Progress::new(LABEL_BAKING, report.progress()))
    }

    fn index_step(&mut self) -> Result<Progress> {
        let mesh = &*self.mesh;
        let tolerance_sq = self.config.duplicate_tolerance_sq;
        let index = self.pool.install(|| TopologyIndex::build(mesh, tolerance_sq))?;
        self.index = Some(index);
        self.phase = Phase::Smooth { pass: 0 };
        Ok(Progress::new(LABEL_OVERLAP, INDEX_FRACTION))
    }

    fn smooth_step(&mut self, pass: u32) -> Result<Progress> {
        let Some(index) = self.index.as_ref() else {
            return Err(Error::configuration("smoothing pass without a topology index"));
        };
        let (mesh, read) = (&*self.mesh, &self.working);
        self.working = self.pool.install(|| smooth_colors(mesh, index, read))?;

        let iterations = self.config.smooth_iterations;
        tracing::debug!(pass = pass + 1, iterations, "Smoothing pass complete");
        if self.config.commit == CommitPolicy::Incremental {
            self.publish();
        }

        let done = pass + 1;
        if done >= iterations {
            self.index = None;
            self.finish();
            return Ok(Progress::new(LABEL_AVERAGING, 1.0));
        }
        self.phase = Phase::Smooth { pass: done };
        let fraction = INDEX_FRACTION + (1.0 - INDEX_FRACTION) * done as f32 / iterations as f32;
        Ok(Progress::new(LABEL_AVERAGING, fraction))
    }

    fn publish(&mut self) {
        self.mesh.colors_mut().copy_from_slice(&self.working);
    }

    fn finish(&mut self) {
        self.publish();
        self.phase = Phase::Finished;
        tracing::info!(vertex_count = self.mesh.vertex_count(), "Bake finished");
    }

    fn teardown(&mut self, stage: BakeStage) {
        self.sampler = None;
        self.index = None;
        self.phase = Phase::Aborted(stage);
    }
}

impl<'m> BakeDriver<'m, CpuDispatcher> {
    /// Prepare a smoothing bake of the mesh's own colors
    pub fn smoothing(mesh: &'m mut MeshSnapshot, config: BakeConfig) -> Result<Self> {
        config.validate()?;
        mesh.validate()?;

        let pool = build_pool(config.worker_threads)?;
        tracing::info!(
            vertex_count = mesh.vertex_count(),
            iterations = config.smooth_iterations,
            commit = ?config.commit,
            "Starting smoothing bake"
        );

        let working = mesh.colors().to_vec();
        Ok(Self {
            mesh,
            config,
            sampler: None,
            index: None,
            working,
            phase: Phase::BuildIndex,
            pool,
        })
    }
}

fn build_pool(threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("vertex-bake-{i}"))
        .build()
        .map_err(|e| Error::configuration(format!("failed to start worker pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BakeTarget, SweepParams};
    use nalgebra::{Point3, Vector3, Vector4};
    use vertex_bake_topology::SubMesh;

    fn triangle() -> MeshSnapshot {
        MeshSnapshot::new(
            vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            vec![Vector3::z(); 3],
            vec![Vector4::new(1.0, 0.0, 0.0, 1.0); 3],
            Some(vec![Color::RED, Color::GREEN, Color::BLUE]),
            vec![SubMesh::new(vec![0, 1, 2])],
        )
        .unwrap()
    }

    fn small_config() -> BakeConfig {
        BakeConfig {
            sweep: SweepParams {
                height_steps: 2,
                rotation_steps: 2,
                ..SweepParams::default()
            },
            worker_threads: 2,
            ..BakeConfig::default()
        }
    }

    #[test]
    fn occlusion_steps_once_per_sample() {
        let mut mesh = triangle();
        let mut driver = BakeDriver::occlusion(
            &mut mesh,
            Transform::identity(),
            OccluderSource::SelfMesh,
            small_config(),
            CpuDispatcher::new(),
        )
        .unwrap();

        let mut fractions = Vec::new();
        while let DriverStep::Progress(p) = driver.resume().unwrap() {
            assert_eq!(p.label, LABEL_BAKING);
            fractions.push(p.fraction);
        }
        assert_eq!(fractions, vec![0.25, 0.5, 0.75, 1.0]);
        assert!(driver.is_finished());
        assert_eq!(driver.resume().unwrap(), DriverStep::Finished);
        assert_eq!(driver.mesh().colors()[0], Color::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn smoothing_reports_index_then_passes() {
        let mut mesh = triangle();
        let config = BakeConfig {
            smooth_iterations: 4,
            worker_threads: 1,
            ..BakeConfig::default()
        };
        let mut driver = BakeDriver::smoothing(&mut mesh, config).unwrap();

        let mut steps = Vec::new();
        driver.run(|p: &Progress| steps.push(*p), &CancelFlag::new()).unwrap();

        assert_eq!(steps.len(), 5);
        assert_eq!(steps[0], Progress::new(LABEL_OVERLAP, 0.2));
        assert!(steps[1..].iter().all(|p| p.label == LABEL_AVERAGING));
        assert_eq!(steps.last().unwrap().fraction, 1.0);
        for pair in steps.windows(2) {
            assert!(pair[1].fraction > pair[0].fraction);
        }
    }

    #[test]
    fn smoothing_after_occlusion_runs_both_phases() {
        let mut mesh = triangle();
        let config = BakeConfig {
            smooth_after_occlusion: true,
            sweep: SweepParams {
                height_steps: 1,
                rotation_steps: 1,
                target: BakeTarget::Alpha,
                ..SweepParams::default()
            },
            worker_threads: 1,
            ..BakeConfig::default()
        };
        let mut driver = BakeDriver::occlusion(
            &mut mesh,
            Transform::identity(),
            OccluderSource::SelfMesh,
            config,
            CpuDispatcher::new(),
        )
        .unwrap();

        let mut labels = Vec::new();
        driver.run(|p: &Progress| labels.push(p.label), &CancelFlag::new()).unwrap();
        assert_eq!(labels, vec![LABEL_BAKING, LABEL_OVERLAP, LABEL_AVERAGING]);
    }

    #[test]
    fn cancelled_run_stops_before_first_batch() {
        let mut mesh = triangle();
        let mut driver = BakeDriver::smoothing(&mut mesh, BakeConfig::default()).unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = driver.run(|_: &Progress| {}, &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(!driver.is_finished());
        assert_eq!(driver.aborted_stage(), Some(BakeStage::Cancelled));

        // A later run must not report success
        let err = driver
            .run(|_: &Progress| {}, &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, Error::Aborted(BakeStage::Cancelled)));
        assert!(matches!(driver.resume(), Err(Error::Aborted(_))));
        drop(driver);
        assert_eq!(mesh.colors(), &[Color::RED, Color::GREEN, Color::BLUE]);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut mesh = triangle();
        let config = BakeConfig {
            smooth_iterations: 0,
            ..BakeConfig::default()
        };
        assert!(matches!(
            BakeDriver::smoothing(&mut mesh, config),
            Err(Error::Configuration(_))
        ));
    }
}
