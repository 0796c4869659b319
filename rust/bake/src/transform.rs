// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Object-to-world transforms for baked and occluding meshes.

use nalgebra::{Matrix4, Point3, Vector3};

use crate::error::{Error, Result};

/// A placement in the world, stored together with its inverse.
///
/// Normals go through the inverse transpose so non-uniform scale keeps them
/// perpendicular to the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    object_to_world: Matrix4<f32>,
    world_to_object: Matrix4<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            object_to_world: Matrix4::identity(),
            world_to_object: Matrix4::identity(),
        }
    }

    /// Build from an object-to-world matrix, inverting it
    pub fn from_object_to_world(object_to_world: Matrix4<f32>) -> Result<Self> {
        let world_to_object = object_to_world
            .try_inverse()
            .ok_or_else(|| Error::configuration("object-to-world matrix is not invertible"))?;
        Ok(Self {
            object_to_world,
            world_to_object,
        })
    }

    /// Build from a matrix pair supplied by the host, which is trusted to
    /// hold inverse matrices
    pub fn from_matrices(object_to_world: Matrix4<f32>, world_to_object: Matrix4<f32>) -> Self {
        Self {
            object_to_world,
            world_to_object,
        }
    }

    /// Pure translation
    pub fn translation(offset: Vector3<f32>) -> Self {
        Self {
            object_to_world: Matrix4::new_translation(&offset),
            world_to_object: Matrix4::new_translation(&-offset),
        }
    }

    #[inline]
    pub fn object_to_world(&self) -> &Matrix4<f32> {
        &self.object_to_world
    }

    #[inline]
    pub fn world_to_object(&self) -> &Matrix4<f32> {
        &self.world_to_object
    }

    #[inline]
    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        self.object_to_world.transform_point(point)
    }

    /// Transform a direction, ignoring translation. Not normalized.
    #[inline]
    pub fn transform_vector(&self, vector: &Vector3<f32>) -> Vector3<f32> {
        self.object_to_world.transform_vector(vector)
    }

    /// Transform a surface normal. Not normalized.
    #[inline]
    pub fn transform_normal(&self, normal: &Vector3<f32>) -> Vector3<f32> {
        self.world_to_object.fixed_view::<3, 3>(0, 0).transpose() * normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_translation_moves_points_not_vectors() {
        let t = Transform::translation(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(t.transform_point(&Point3::origin()), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(t.transform_vector(&Vector3::x()), Vector3::x());
        assert_eq!(t.transform_normal(&Vector3::z()), Vector3::z());
    }

    #[test]
    fn test_normals_stay_perpendicular_under_scale() {
        let scale = Matrix4::new_nonuniform_scaling(&Vector3::new(4.0, 1.0, 1.0));
        let t = Transform::from_object_to_world(scale).unwrap();

        // Surface spanned by (1, 1, 0) and z; its normal is (1, -1, 0)
        let tangent = t.transform_vector(&Vector3::new(1.0, 1.0, 0.0));
        let normal = t.transform_normal(&Vector3::new(1.0, -1.0, 0.0));
        assert_relative_eq!(tangent.dot(&normal), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_singular_matrix_is_rejected() {
        let err = Transform::from_object_to_world(Matrix4::zeros()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
