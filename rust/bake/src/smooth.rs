// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Seam-aware color smoothing
//!
//! Each vertex is replaced by the mean of its duplicate group and every
//! triangle neighbor of any group member. Duplicates split along UV seams
//! therefore share one neighborhood and come out with the same color.

use rayon::prelude::*;
use smallvec::SmallVec;
use vertex_bake_topology::{Color, Error as MeshError, MeshSnapshot, TopologyIndex};

use crate::error::Result;

/// One averaging pass over `read`, returning a fresh color buffer.
pub fn smooth_colors(
    mesh: &MeshSnapshot,
    index: &TopologyIndex,
    read: &[Color],
) -> Result<Vec<Color>> {
    if read.len() != mesh.vertex_count() {
        return Err(MeshError::AttributeLength {
            attribute: "colors",
            len: read.len(),
            vertex_count: mesh.vertex_count(),
        }
        .into());
    }

    let colors = (0..mesh.vertex_count() as u32)
        .into_par_iter()
        .map(|vertex| average_neighborhood(mesh, index, read, vertex))
        .collect();
    Ok(colors)
}

/// Run `iterations` passes, each reading the previous pass's output.
///
/// Zero iterations returns `read` unchanged.
pub fn smooth_colors_iterated(
    mesh: &MeshSnapshot,
    index: &TopologyIndex,
    read: &[Color],
    iterations: u32,
) -> Result<Vec<Color>> {
    let mut current = read.to_vec();
    for pass in 0..iterations {
        current = smooth_colors(mesh, index, &current)?;
        tracing::debug!(pass = pass + 1, iterations, "Smoothing pass complete");
    }
    Ok(current)
}

fn average_neighborhood(
    mesh: &MeshSnapshot,
    index: &TopologyIndex,
    read: &[Color],
    vertex: u32,
) -> Color {
    let duplicates = index.duplicates();

    // Sorted, so every member of a group sums in the same order
    let mut group: SmallVec<[u32; 8]> = SmallVec::new();
    group.extend_from_slice(duplicates.duplicates_of(vertex));
    group.push(vertex);
    group.sort_unstable();

    let mut sum = Color::CLEAR;
    for &member in &group {
        sum += read[member as usize];
    }
    let mut count = group.len() as u32;

    for &owner in &group {
        for triangle in index.incident_triangles(mesh, owner) {
            for neighbor in triangle {
                if group.binary_search(&neighbor).is_err() {
                    sum += read[neighbor as usize];
                    count += 1;
                }
            }
        }
    }

    if count == 0 {
        read[vertex as usize]
    } else {
        sum / count as f32
    }
}
