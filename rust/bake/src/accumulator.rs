// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Running per-vertex average over sweep samples

use rayon::prelude::*;

use crate::dispatch::DispatchError;

/// Per-vertex running mean of sample values.
///
/// Only the mean and a single sample count are stored. After `n` folds each
/// value is the arithmetic mean of the `n` samples folded into it.
#[derive(Debug, Clone)]
pub struct SampleAccumulator {
    averages: Vec<f32>,
    samples: u32,
}

impl SampleAccumulator {
    /// Accumulator for `vertex_count` vertices, all starting at 0
    pub fn new(vertex_count: usize) -> Self {
        Self {
            averages: vec![0.0; vertex_count],
            samples: 0,
        }
    }

    /// Fold one sample per vertex into the running means and return the
    /// 1-based index of that sample.
    ///
    /// Uses `avg + (s - avg) / n`, the same mean as `(avg * (n - 1) + s) / n`
    /// but exact when every sample equals the current mean. A buffer without
    /// one value per vertex is rejected and leaves the means untouched.
    pub fn fold(&mut self, samples: &[f32]) -> Result<u32, DispatchError> {
        if samples.len() != self.averages.len() {
            return Err(DispatchError::ResultLength {
                expected: self.averages.len(),
                actual: samples.len(),
            });
        }
        self.samples += 1;
        let n = self.samples as f32;
        self.averages
            .par_iter_mut()
            .zip(samples.par_iter())
            .for_each(|(avg, &sample)| *avg += (sample - *avg) / n);
        Ok(self.samples)
    }

    /// Samples folded so far
    #[inline]
    pub fn sample_count(&self) -> u32 {
        self.samples
    }

    #[inline]
    pub fn averages(&self) -> &[f32] {
        &self.averages
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.averages.len()
    }

    /// Forget every sample
    pub fn reset(&mut self) {
        self.averages.fill(0.0);
        self.samples = 0;
    }

    pub fn into_averages(self) -> Vec<f32> {
        self.averages
    }
}
