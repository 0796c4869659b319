// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Progress reporting and cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shown while duplicate groups and triangle adjacency are built
pub const LABEL_OVERLAP: &str = "Calculating Overlapping Verts..";
/// Shown during smoothing passes
pub const LABEL_AVERAGING: &str = "Averaging Vertex Colors..";
/// Shown during the occlusion sweep
pub const LABEL_BAKING: &str = "Baking Vertex Colors..";

/// A progress update for the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub label: &'static str,
    /// Fraction of the current bake in `[0, 1]`
    pub fraction: f32,
}

impl Progress {
    #[inline]
    pub fn new(label: &'static str, fraction: f32) -> Self {
        Self {
            label,
            fraction: fraction.clamp(0.0, 1.0),
        }
    }
}

/// Receives progress updates between batches
pub trait ProgressSink {
    fn report(&mut self, progress: &Progress);
}

impl<F: FnMut(&Progress)> ProgressSink for F {
    fn report(&mut self, progress: &Progress) {
        self(progress)
    }
}

/// Discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _progress: &Progress) {}
}

/// Shared cancellation request, checked by the driver between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
