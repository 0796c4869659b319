// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry that sample rays are tested against

use nalgebra::Point3;
use vertex_bake_topology::{Error as MeshError, MeshSnapshot};

use crate::error::Result;
use crate::transform::Transform;

/// A triangle soup with its own placement, such as a garment occluding the
/// skin underneath it.
#[derive(Debug, Clone)]
pub struct Occluder {
    positions: Vec<Point3<f32>>,
    indices: Vec<u32>,
    transform: Transform,
}

impl Occluder {
    /// Use every triangle of every sub-mesh of `mesh`
    pub fn from_mesh(mesh: &MeshSnapshot, transform: Transform) -> Self {
        Self {
            positions: mesh.positions().to_vec(),
            indices: mesh.flattened_indices(),
            transform,
        }
    }

    /// Build from raw object-space triangles
    pub fn from_triangles(
        positions: Vec<Point3<f32>>,
        indices: Vec<u32>,
        transform: Transform,
    ) -> Result<Self> {
        if positions.is_empty() {
            return Err(MeshError::MissingAttribute("occluder vertices").into());
        }
        if indices.is_empty() {
            return Err(MeshError::MissingAttribute("occluder triangles").into());
        }
        if indices.len() % 3 != 0 {
            return Err(MeshError::TriangleListLength {
                sub_mesh: 0,
                len: indices.len(),
            }
            .into());
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(MeshError::IndexOutOfRange {
                sub_mesh: 0,
                index,
                vertex_count: positions.len(),
            }
            .into());
        }
        Ok(Self {
            positions,
            indices,
            transform,
        })
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertices placed in the world
    pub fn world_vertices(&self) -> Vec<Point3<f32>> {
        self.positions
            .iter()
            .map(|p| self.transform.transform_point(p))
            .collect()
    }
}

/// What the occlusion rays are cast against
#[derive(Debug, Clone, Default)]
pub enum OccluderSource {
    /// The baked mesh occludes itself
    #[default]
    SelfMesh,
    /// A separate mesh occludes the baked one; the baked mesh is ignored
    Target(Occluder),
}

impl OccluderSource {
    /// World-space vertices and triangle indices for a bake of `mesh`
    /// placed by `transform`
    pub fn resolve(
        &self,
        mesh: &MeshSnapshot,
        transform: &Transform,
    ) -> (Vec<Point3<f32>>, Vec<u32>) {
        match self {
            OccluderSource::SelfMesh => (
                mesh.positions()
                    .iter()
                    .map(|p| transform.transform_point(p))
                    .collect(),
                mesh.flattened_indices(),
            ),
            OccluderSource::Target(occluder) => {
                (occluder.world_vertices(), occluder.indices.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BakeStage, Error};
    use nalgebra::Vector3;

    #[test]
    fn from_triangles_validates() {
        let err =
            Occluder::from_triangles(vec![], vec![0, 1, 2], Transform::identity()).unwrap_err();
        assert_eq!(err.stage(), BakeStage::Validation);

        let corners = vec![Point3::origin(); 3];
        let err = Occluder::from_triangles(corners.clone(), vec![0, 1], Transform::identity())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(MeshError::TriangleListLength { len: 2, .. })
        ));

        let err =
            Occluder::from_triangles(corners, vec![0, 1, 3], Transform::identity()).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(MeshError::IndexOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn target_vertices_are_placed_in_world() {
        let occluder = Occluder::from_triangles(
            vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            vec![0, 1, 2],
            Transform::translation(Vector3::new(0.0, 0.0, 2.0)),
        )
        .unwrap();
        assert_eq!(occluder.triangle_count(), 1);

        let world = occluder.world_vertices();
        assert_eq!(world[1], Point3::new(1.0, 0.0, 2.0));
    }
}
