// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Duplicate-position detection for seam-split vertices.
//!
//! Importers split a vertex wherever a UV seam or hard edge passes through
//! it, leaving several vertices at exactly the same position. This module
//! finds those vertices and groups them so later passes can treat a group as
//! one surface point.
//!
//! Detection is a brute-force pairwise scan, parallel over vertices.

use nalgebra::Point3;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::multimap::MultiMap;

/// Smallest positive `f32`: with a strict `<` comparison only exactly
/// coincident positions match.
pub const DEFAULT_DUPLICATE_TOLERANCE_SQ: f32 = 1.0e-45;

/// Groups of vertices sharing a position.
///
/// Membership is an equivalence relation: if `a` is a duplicate of `b` and
/// `b` of `c`, then `a` is a duplicate of `c`, even when `a` and `c` are
/// further apart than the tolerance.
#[derive(Debug, Clone, Default)]
pub struct DuplicateGroups {
    /// vertex -> every other member of its group, ascending
    duplicates: MultiMap<u32, u32>,
    group_count: usize,
}

impl DuplicateGroups {
    /// Find all vertices whose squared distance is below `tolerance_sq`.
    pub fn build(positions: &[Point3<f32>], tolerance_sq: f32) -> Result<Self> {
        validate_tolerance(tolerance_sq)?;

        let matches: Vec<(u32, SmallVec<[u32; 4]>)> = (0..positions.len())
            .into_par_iter()
            .filter_map(|vertex| {
                let position = positions[vertex];
                let found: SmallVec<[u32; 4]> = positions
                    .iter()
                    .enumerate()
                    .filter(|&(other, p)| {
                        other != vertex && (*p - position).norm_squared() < tolerance_sq
                    })
                    .map(|(other, _)| other as u32)
                    .collect();
                (!found.is_empty()).then_some((vertex as u32, found))
            })
            .collect();

        let mut forest = DisjointSet::new(positions.len());
        for (vertex, found) in &matches {
            for &other in found {
                forest.union(*vertex, other);
            }
        }

        // `matches` is in ascending vertex order, so members are too.
        let mut groups: FxHashMap<u32, SmallVec<[u32; 4]>> = FxHashMap::default();
        for (vertex, _) in &matches {
            groups.entry(forest.find(*vertex)).or_default().push(*vertex);
        }

        let mut duplicates = MultiMap::with_capacity(matches.len());
        for members in groups.values() {
            for &vertex in members {
                for &other in members {
                    if other != vertex {
                        duplicates.insert(vertex, other);
                    }
                }
            }
        }

        tracing::debug!(
            vertex_count = positions.len(),
            duplicated_vertices = matches.len(),
            group_count = groups.len(),
            "Built duplicate groups"
        );

        Ok(Self {
            duplicates,
            group_count: groups.len(),
        })
    }

    /// Other members of `vertex`'s group, ascending. Empty when the vertex
    /// has no duplicates.
    #[inline]
    pub fn duplicates_of(&self, vertex: u32) -> &[u32] {
        self.duplicates.get(&vertex)
    }

    #[inline]
    pub fn has_duplicates(&self, vertex: u32) -> bool {
        self.duplicates.contains_key(&vertex)
    }

    /// True if `a` and `b` are distinct members of the same group
    #[inline]
    pub fn are_duplicates(&self, a: u32, b: u32) -> bool {
        self.duplicates.contains(&a, &b)
    }

    /// Lowest vertex index in `vertex`'s group
    pub fn representative(&self, vertex: u32) -> u32 {
        self.duplicates_of(vertex)
            .first()
            .map_or(vertex, |&first| first.min(vertex))
    }

    /// Number of groups with two or more members
    #[inline]
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Number of vertices that belong to some group
    #[inline]
    pub fn duplicated_vertex_count(&self) -> usize {
        self.duplicates.key_count()
    }
}

pub(crate) fn validate_tolerance(tolerance_sq: f32) -> Result<()> {
    if tolerance_sq.is_finite() && tolerance_sq > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidTolerance(tolerance_sq))
    }
}

/// Union-find over vertex indices with path halving
struct DisjointSet {
    parent: Vec<u32>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len as u32).collect(),
        }
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grandparent = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grandparent;
            x = grandparent;
        }
        x
    }

    fn union(&mut self, a: u32, b: u32) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Lower index becomes the root
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child as usize] = root;
        }
    }
}
