// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh snapshot data structures

use std::ops::{Add, AddAssign, Div};

use nalgebra::{Point3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Linear RGBA vertex color
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const CLEAR: Color = Color::new(0.0, 0.0, 0.0, 0.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Color = Color::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Color = Color::new(0.0, 0.0, 1.0, 1.0);

    /// Create a new color
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque gray with all three color channels set to `value`
    #[inline]
    pub const fn gray(value: f32) -> Self {
        Self::new(value, value, value, 1.0)
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<[f32; 4]> for Color {
    #[inline]
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self { r, g, b, a }
    }
}

impl Add for Color {
    type Output = Color;

    #[inline]
    fn add(self, rhs: Color) -> Color {
        Color::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b, self.a + rhs.a)
    }
}

impl AddAssign for Color {
    #[inline]
    fn add_assign(&mut self, rhs: Color) {
        *self = *self + rhs;
    }
}

impl Div<f32> for Color {
    type Output = Color;

    #[inline]
    fn div(self, rhs: f32) -> Color {
        Color::new(self.r / rhs, self.g / rhs, self.b / rhs, self.a / rhs)
    }
}

/// One material slot's triangle list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubMesh {
    indices: Vec<u32>,
}

impl SubMesh {
    /// Create a sub-mesh from a flat triangle index list (i0, i1, i2, ...)
    pub fn new(indices: Vec<u32>) -> Self {
        Self { indices }
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// A single vertex with all of its baked attributes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexRecord {
    pub index: u32,
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    /// Tangent direction; `w` carries the bitangent sign
    pub tangent: Vector4<f32>,
    pub color: Color,
}

/// An ordered vertex triple and the sub-mesh that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangleRecord {
    pub vertices: [u32; 3],
    pub sub_mesh: usize,
}

/// Immutable per-bake copy of a mesh's geometry plus its color buffer.
///
/// Construction validates every attribute, so a snapshot that exists is
/// always safe to index: every triangle index is in range, every per-vertex
/// attribute has one entry per vertex and every sub-mesh holds whole
/// triangles.
#[derive(Debug, Clone)]
pub struct MeshSnapshot {
    positions: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    tangents: Vec<Vector4<f32>>,
    colors: Vec<Color>,
    sub_meshes: Vec<SubMesh>,
}

impl MeshSnapshot {
    /// Snapshot mesh data for a bake.
    ///
    /// Meshes without vertex colors get opaque white.
    pub fn new(
        positions: Vec<Point3<f32>>,
        normals: Vec<Vector3<f32>>,
        tangents: Vec<Vector4<f32>>,
        colors: Option<Vec<Color>>,
        sub_meshes: Vec<SubMesh>,
    ) -> Result<Self> {
        let vertex_count = positions.len();
        let colors = colors.unwrap_or_else(|| vec![Color::WHITE; vertex_count]);
        let snapshot = Self {
            positions,
            normals,
            tangents,
            colors,
            sub_meshes,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check that the snapshot describes bakeable geometry
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.positions.len();
        if vertex_count == 0 {
            return Err(Error::MissingAttribute("vertices"));
        }
        if self.normals.is_empty() {
            return Err(Error::MissingAttribute("normals"));
        }
        if self.tangents.is_empty() {
            return Err(Error::MissingAttribute("tangents"));
        }
        if self.triangle_index_count() == 0 {
            return Err(Error::MissingAttribute("triangles"));
        }

        for (attribute, len) in [
            ("normals", self.normals.len()),
            ("tangents", self.tangents.len()),
            ("colors", self.colors.len()),
        ] {
            if len != vertex_count {
                return Err(Error::AttributeLength {
                    attribute,
                    len,
                    vertex_count,
                });
            }
        }

        for (sub_mesh, sm) in self.sub_meshes.iter().enumerate() {
            if sm.indices.len() % 3 != 0 {
                return Err(Error::TriangleListLength {
                    sub_mesh,
                    len: sm.indices.len(),
                });
            }
            if let Some(&index) = sm.indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(Error::IndexOutOfRange {
                    sub_mesh,
                    index,
                    vertex_count,
                });
            }
        }

        Ok(())
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Total number of triangle indices across all sub-meshes
    #[inline]
    pub fn triangle_index_count(&self) -> usize {
        self.sub_meshes.iter().map(|sm| sm.indices.len()).sum()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangle_index_count() / 3
    }

    #[inline]
    pub fn positions(&self) -> &[Point3<f32>] {
        &self.positions
    }

    #[inline]
    pub fn normals(&self) -> &[Vector3<f32>] {
        &self.normals
    }

    #[inline]
    pub fn tangents(&self) -> &[Vector4<f32>] {
        &self.tangents
    }

    #[inline]
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    #[inline]
    pub fn sub_meshes(&self) -> &[SubMesh] {
        &self.sub_meshes
    }

    /// Gather every attribute of one vertex
    pub fn vertex(&self, index: u32) -> Option<VertexRecord> {
        let i = index as usize;
        Some(VertexRecord {
            index,
            position: *self.positions.get(i)?,
            normal: *self.normals.get(i)?,
            tangent: *self.tangents.get(i)?,
            color: *self.colors.get(i)?,
        })
    }

    /// Iterate all triangles, sub-mesh by sub-mesh
    pub fn triangles(&self) -> impl Iterator<Item = TriangleRecord> + '_ {
        self.sub_meshes
            .iter()
            .enumerate()
            .flat_map(|(sub_mesh, sm)| {
                sm.indices.chunks_exact(3).map(move |tri| TriangleRecord {
                    vertices: [tri[0], tri[1], tri[2]],
                    sub_mesh,
                })
            })
    }

    /// All sub-mesh index lists concatenated into one triangle list
    pub fn flattened_indices(&self) -> Vec<u32> {
        let mut indices = Vec::with_capacity(self.triangle_index_count());
        for sm in &self.sub_meshes {
            indices.extend_from_slice(&sm.indices);
        }
        indices
    }

    /// Replace the color buffer
    pub fn set_colors(&mut self, colors: Vec<Color>) -> Result<()> {
        if colors.len() != self.vertex_count() {
            return Err(Error::AttributeLength {
                attribute: "colors",
                len: colors.len(),
                vertex_count: self.vertex_count(),
            });
        }
        self.colors = colors;
        Ok(())
    }

    /// Mutable access to the color buffer; its length cannot change
    #[inline]
    pub fn colors_mut(&mut self) -> &mut [Color] {
        &mut self.colors
    }

    /// Copy the color buffer of another snapshot with the same vertex layout
    pub fn transfer_colors_from(&mut self, source: &MeshSnapshot) -> Result<()> {
        if source.vertex_count() != self.vertex_count() {
            return Err(Error::VertexCountMismatch {
                source_count: source.vertex_count(),
                destination_count: self.vertex_count(),
            });
        }
        self.colors.copy_from_slice(&source.colors);
        Ok(())
    }

    /// Consume the snapshot, handing the color buffer back to the caller
    pub fn into_colors(self) -> Vec<Color> {
        self.colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_mesh(colors: Option<Vec<Color>>) -> Result<MeshSnapshot> {
        MeshSnapshot::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![Vector3::z(); 3],
            vec![Vector4::new(1.0, 0.0, 0.0, 1.0); 3],
            colors,
            vec![SubMesh::new(vec![0, 1, 2])],
        )
    }

    #[test]
    fn test_snapshot_defaults_to_white() {
        let mesh = triangle_mesh(None).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!(mesh.colors().iter().all(|&c| c == Color::WHITE));
    }

    #[test]
    fn test_missing_attributes_are_rejected() {
        let err = MeshSnapshot::new(vec![], vec![], vec![], None, vec![]).unwrap_err();
        assert!(matches!(err, Error::MissingAttribute("vertices")));

        let err = MeshSnapshot::new(
            vec![Point3::origin()],
            vec![],
            vec![Vector4::zeros()],
            None,
            vec![SubMesh::new(vec![0, 0, 0])],
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingAttribute("normals")));

        let err = MeshSnapshot::new(
            vec![Point3::origin()],
            vec![Vector3::z()],
            vec![],
            None,
            vec![SubMesh::new(vec![0, 0, 0])],
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingAttribute("tangents")));

        let err = MeshSnapshot::new(
            vec![Point3::origin()],
            vec![Vector3::z()],
            vec![Vector4::zeros()],
            None,
            vec![SubMesh::new(vec![])],
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingAttribute("triangles")));
    }

    #[test]
    fn test_malformed_triangles_are_rejected() {
        let err = MeshSnapshot::new(
            vec![Point3::origin(); 3],
            vec![Vector3::z(); 3],
            vec![Vector4::zeros(); 3],
            None,
            vec![SubMesh::new(vec![0, 1, 2, 0])],
        )
        .unwrap_err();
        assert!(matches!(err, Error::TriangleListLength { sub_mesh: 0, len: 4 }));

        let err = MeshSnapshot::new(
            vec![Point3::origin(); 3],
            vec![Vector3::z(); 3],
            vec![Vector4::zeros(); 3],
            None,
            vec![SubMesh::new(vec![0, 1, 2]), SubMesh::new(vec![0, 1, 7])],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::IndexOutOfRange {
                sub_mesh: 1,
                index: 7,
                ..
            }
        ));
    }

    #[test]
    fn test_color_length_mismatch() {
        let err = triangle_mesh(Some(vec![Color::RED])).unwrap_err();
        assert!(matches!(
            err,
            Error::AttributeLength {
                attribute: "colors",
                len: 1,
                vertex_count: 3
            }
        ));
    }

    #[test]
    fn test_triangles_carry_sub_mesh() {
        let mesh = MeshSnapshot::new(
            vec![Point3::origin(); 4],
            vec![Vector3::z(); 4],
            vec![Vector4::zeros(); 4],
            None,
            vec![SubMesh::new(vec![0, 1, 2]), SubMesh::new(vec![1, 2, 3])],
        )
        .unwrap();

        let triangles: Vec<_> = mesh.triangles().collect();
        assert_eq!(triangles.len(), 2);
        assert_eq!(triangles[1].vertices, [1, 2, 3]);
        assert_eq!(triangles[1].sub_mesh, 1);
        assert_eq!(mesh.flattened_indices(), vec![0, 1, 2, 1, 2, 3]);
    }

    #[test]
    fn test_transfer_colors() {
        let source = triangle_mesh(Some(vec![Color::RED, Color::GREEN, Color::BLUE])).unwrap();
        let mut destination = triangle_mesh(None).unwrap();
        destination.transfer_colors_from(&source).unwrap();
        assert_eq!(destination.colors(), source.colors());
        assert_eq!(destination.vertex(2).unwrap().color, Color::BLUE);
    }

    #[test]
    fn test_transfer_colors_rejects_other_layouts() {
        let source = MeshSnapshot::new(
            vec![Point3::origin(); 4],
            vec![Vector3::z(); 4],
            vec![Vector4::zeros(); 4],
            Some(vec![Color::RED; 4]),
            vec![SubMesh::new(vec![0, 1, 2])],
        )
        .unwrap();
        let mut destination = triangle_mesh(None).unwrap();

        let err = destination.transfer_colors_from(&source).unwrap_err();
        assert!(matches!(
            err,
            Error::VertexCountMismatch {
                source_count: 4,
                destination_count: 3
            }
        ));
        assert!(destination.colors().iter().all(|&c| c == Color::WHITE));
    }

    #[test]
    fn test_color_arithmetic() {
        let sum = Color::RED + Color::BLUE;
        assert_eq!(sum, Color::new(1.0, 0.0, 1.0, 2.0));
        assert_eq!(sum / 2.0, Color::new(0.5, 0.0, 0.5, 1.0));
        assert_eq!(Color::from([0.1, 0.2, 0.3, 0.4]).to_array(), [0.1, 0.2, 0.3, 0.4]);
    }
}
