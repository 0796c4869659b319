// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vertex adjacency index
//!
//! Maps every vertex to each triangle slot it occupies, to the first
//! sub-mesh it appears in, and to its duplicate group.

use rustc_hash::FxHashMap;

use crate::duplicates::{validate_tolerance, DuplicateGroups};
use crate::error::Result;
use crate::mesh::MeshSnapshot;
use crate::multimap::MultiMap;

/// Topology of one mesh snapshot, built once per bake.
///
/// A triangle slot is a position in a sub-mesh's index list. Every
/// occurrence is recorded, so a vertex used by five triangles has five
/// slots; the triangle owning slot `s` starts at `s - s % 3`.
///
/// The index does not hold on to the mesh it was built from; pass the same
/// snapshot back to the lookups that need it.
#[derive(Debug, Clone)]
pub struct TopologyIndex {
    vertex_triangles: MultiMap<u32, u32>,
    vertex_sub_meshes: FxHashMap<u32, usize>,
    duplicates: DuplicateGroups,
}

impl TopologyIndex {
    /// Build the index for `mesh`, grouping vertices closer than
    /// `tolerance_sq` (squared distance).
    pub fn build(mesh: &MeshSnapshot, tolerance_sq: f32) -> Result<Self> {
        mesh.validate()?;
        validate_tolerance(tolerance_sq)?;

        let mut vertex_triangles = MultiMap::with_capacity(mesh.vertex_count());
        let mut vertex_sub_meshes =
            FxHashMap::with_capacity_and_hasher(mesh.vertex_count(), Default::default());

        for (sub_mesh, sm) in mesh.sub_meshes().iter().enumerate() {
            for (slot, &vertex) in sm.indices().iter().enumerate() {
                // A vertex shared between sub-meshes keeps the first one
                vertex_sub_meshes.entry(vertex).or_insert(sub_mesh);
                vertex_triangles.insert(vertex, slot as u32);
            }
        }

        let duplicates = DuplicateGroups::build(mesh.positions(), tolerance_sq)?;

        tracing::debug!(
            vertex_count = mesh.vertex_count(),
            triangle_slots = vertex_triangles.len(),
            sub_meshes = mesh.sub_meshes().len(),
            duplicate_groups = duplicates.group_count(),
            "Built topology index"
        );

        Ok(Self {
            vertex_triangles,
            vertex_sub_meshes,
            duplicates,
        })
    }

    /// Every triangle slot `vertex` occupies, in its first sub-mesh's
    /// numbering
    #[inline]
    pub fn triangle_slots(&self, vertex: u32) -> &[u32] {
        self.vertex_triangles.get(&vertex)
    }

    /// First sub-mesh that references `vertex`, `None` for loose vertices
    #[inline]
    pub fn sub_mesh_of(&self, vertex: u32) -> Option<usize> {
        self.vertex_sub_meshes.get(&vertex).copied()
    }

    #[inline]
    pub fn duplicates(&self) -> &DuplicateGroups {
        &self.duplicates
    }

    /// The three vertices of the triangle holding `slot`, resolved through
    /// `owner`'s sub-mesh.
    ///
    /// Returns `None` if `owner` is loose or the slot lies outside that
    /// sub-mesh, which happens when `owner` also appears in a later sub-mesh.
    pub fn triangle_at(&self, mesh: &MeshSnapshot, owner: u32, slot: u32) -> Option<[u32; 3]> {
        let sub_mesh = self.sub_mesh_of(owner)?;
        let indices = mesh.sub_meshes().get(sub_mesh)?.indices();
        let start = (slot - slot % 3) as usize;
        indices.get(start..start + 3).map(|tri| [tri[0], tri[1], tri[2]])
    }

    /// Every triangle occurrence incident to `vertex`, repeats included
    pub fn incident_triangles<'a>(
        &'a self,
        mesh: &'a MeshSnapshot,
        vertex: u32,
    ) -> impl Iterator<Item = [u32; 3]> + 'a {
        self.triangle_slots(vertex)
            .iter()
            .filter_map(move |&slot| self.triangle_at(mesh, vertex, slot))
    }
}
