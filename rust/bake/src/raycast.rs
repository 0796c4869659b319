// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ray casting against triangle soups

use nalgebra::{Point3, Vector3};

/// Hits closer than this along the ray are treated as the ray's own surface
pub const RAY_EPSILON: f32 = 1.0e-5;

/// Rays nearly parallel to a triangle's plane never hit it
const PARALLEL_EPSILON: f32 = 1.0e-9;

/// Slack on the barycentric bounds so neighbouring triangles overlap at
/// shared edges and corners
const EDGE_EPSILON: f32 = 1.0e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self { origin, direction }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }
}

/// Triangle for intersection tests
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f32>,
    pub v1: Point3<f32>,
    pub v2: Point3<f32>,
}

impl Triangle {
    pub fn new(v0: Point3<f32>, v1: Point3<f32>, v2: Point3<f32>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Distance along `ray` to this triangle, either side facing.
    ///
    /// Möller–Trumbore with the barycentric bounds widened by
    /// [`EDGE_EPSILON`], so a ray along a shared edge of a closed mesh hits
    /// at least one of the two triangles despite rounding.
    #[inline]
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let p = ray.direction.cross(&edge2);
        let det = edge1.dot(&p);
        if det.abs() < PARALLEL_EPSILON {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = ray.origin - self.v0;
        let u = s.dot(&p) * inv_det;
        if !(-EDGE_EPSILON..=1.0 + EDGE_EPSILON).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = ray.direction.dot(&q) * inv_det;
        if v < -EDGE_EPSILON || u + v > 1.0 + EDGE_EPSILON {
            return None;
        }

        let t = edge2.dot(&q) * inv_det;
        (t > RAY_EPSILON).then_some(t)
    }
}

/// True if `ray` hits any triangle of the indexed soup.
///
/// `indices` must be whole triangles referencing `vertices`.
pub fn any_hit(ray: &Ray, vertices: &[Point3<f32>], indices: &[u32]) -> bool {
    indices.chunks_exact(3).any(|tri| {
        Triangle::new(
            vertices[tri[0] as usize],
            vertices[tri[1] as usize],
            vertices[tri[2] as usize],
        )
        .intersect(ray)
        .is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle_at(z: f32) -> Triangle {
        Triangle::new(
            Point3::new(-1.0, -1.0, z),
            Point3::new(1.0, -1.0, z),
            Point3::new(0.0, 1.0, z),
        )
    }

    #[test]
    fn test_hit_from_either_side() {
        let tri = unit_triangle_at(2.0);
        let up = Ray::new(Point3::origin(), Vector3::z());
        assert_relative_eq!(tri.intersect(&up).unwrap(), 2.0);

        let down = Ray::new(Point3::new(0.0, 0.0, 5.0), -Vector3::z());
        assert_relative_eq!(tri.intersect(&down).unwrap(), 3.0);
        assert_relative_eq!(down.at(3.0).z, 2.0);
    }

    #[test]
    fn test_miss_behind_and_beside() {
        let tri = unit_triangle_at(2.0);
        let away = Ray::new(Point3::origin(), -Vector3::z());
        assert!(tri.intersect(&away).is_none());

        let beside = Ray::new(Point3::new(5.0, 0.0, 0.0), Vector3::z());
        assert!(tri.intersect(&beside).is_none());

        let parallel = Ray::new(Point3::origin(), Vector3::x());
        assert!(tri.intersect(&parallel).is_none());
    }

    #[test]
    fn test_origin_on_surface_is_not_a_hit() {
        let tri = unit_triangle_at(0.0);
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.3, 0.0, 1.0).normalize());
        assert!(tri.intersect(&ray).is_none());
    }

    /// Closed UV sphere of radius 3 around the origin
    fn uv_sphere(rings: u32, segments: u32) -> (Vec<Point3<f32>>, Vec<u32>) {
        let mut vertices = Vec::new();
        for ring in 0..=rings {
            let theta = std::f32::consts::PI * ring as f32 / rings as f32;
            for segment in 0..=segments {
                let phi = std::f32::consts::TAU * segment as f32 / segments as f32;
                vertices.push(Point3::new(
                    3.0 * theta.sin() * phi.cos(),
                    3.0 * theta.sin() * phi.sin(),
                    3.0 * theta.cos(),
                ));
            }
        }
        let stride = segments + 1;
        let mut indices = Vec::new();
        for ring in 0..rings {
            for segment in 0..segments {
                let a = ring * stride + segment;
                let b = a + stride;
                indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }
        (vertices, indices)
    }

    #[test]
    fn test_rays_through_shared_edges_hit_closed_mesh() {
        let (vertices, indices) = uv_sphere(16, 32);
        let ray_to = |target: Point3<f32>| Ray::new(Point3::origin(), target.coords.normalize());

        // Straight through every corner
        for &corner in &vertices {
            assert!(
                any_hit(&ray_to(corner), &vertices, &indices),
                "escaped at corner {corner:?}"
            );
        }

        // Through the middle of every edge
        for tri in indices.chunks_exact(3) {
            for (i, j) in [(0, 1), (1, 2), (2, 0)] {
                let a = vertices[tri[i] as usize];
                let b = vertices[tri[j] as usize];
                if a == b {
                    continue;
                }
                let mid = nalgebra::center(&a, &b);
                assert!(
                    any_hit(&ray_to(mid), &vertices, &indices),
                    "escaped at edge {a:?} {b:?}"
                );
            }
        }
    }

    #[test]
    fn test_shared_edge_of_quad_is_covered() {
        // Two triangles meeting along the diagonal x = y
        let vertices = vec![
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let indices = [0, 1, 2, 0, 2, 3];
        for k in 1..10 {
            let t = k as f32 / 10.0;
            let ray = Ray::new(Point3::new(t, t, 0.0), Vector3::z());
            assert!(any_hit(&ray, &vertices, &indices), "escaped at ({t}, {t})");
        }
    }

    #[test]
    fn test_any_hit_over_soup() {
        let vertices = vec![
            Point3::new(-1.0, -1.0, 3.0),
            Point3::new(1.0, -1.0, 3.0),
            Point3::new(0.0, 1.0, 3.0),
            Point3::new(10.0, 10.0, 0.0),
        ];
        let up = Ray::new(Point3::origin(), Vector3::z());
        let sideways = Ray::new(Point3::origin(), Vector3::y());
        assert!(any_hit(&up, &vertices, &[3, 3, 3, 0, 1, 2]));
        assert!(!any_hit(&sideways, &vertices, &[0, 1, 2]));
        assert!(!any_hit(&up, &vertices, &[]));
    }
}
