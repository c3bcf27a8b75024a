// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use crate::error::{Error, Result};
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Triangle mesh
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mesh {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz), empty when the source provided none
    pub normals: Vec<f32>,
    /// Triangle indices (i0, i1, i2), empty for non-indexed meshes
    pub indices: Vec<u32>,
}

/// Range of indices drawn with one material after a grouped merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DrawGroup {
    /// First index of the group
    pub start: u32,
    /// Number of indices in the group
    pub count: u32,
    /// Position of the group's material in the owner's material list
    pub material_index: u32,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Create a mesh with capacity
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            normals: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// Build a mesh from raw buffers, checking their layout
    pub fn from_buffers(positions: Vec<f32>, normals: Vec<f32>, indices: Vec<u32>) -> Result<Self> {
        let mesh = Self {
            positions,
            normals,
            indices,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Add a vertex with normal
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>) {
        self.positions.push(position.x as f32);
        self.positions.push(position.y as f32);
        self.positions.push(position.z as f32);

        self.normals.push(normal.x as f32);
        self.normals.push(normal.y as f32);
        self.normals.push(normal.z as f32);
    }

    /// Add a triangle
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }

    /// Check buffer lengths and index ranges
    pub fn validate(&self) -> Result<()> {
        if self.positions.len() % 3 != 0 {
            return Err(Error::invalid_mesh(format!(
                "position buffer length {} is not a multiple of 3",
                self.positions.len()
            )));
        }
        if !self.normals.is_empty() && self.normals.len() != self.positions.len() {
            return Err(Error::invalid_mesh(format!(
                "normal buffer length {} does not match position buffer length {}",
                self.normals.len(),
                self.positions.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(Error::invalid_mesh(format!(
                "index buffer length {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertex_count() as u32;
        if let Some(&bad) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(Error::invalid_mesh(format!(
                "index {} out of range for {} vertices",
                bad, vertex_count
            )));
        }
        Ok(())
    }

    /// Whether the mesh stores explicit triangle indices
    #[inline]
    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Give a non-indexed mesh the implicit sequential index buffer
    pub fn ensure_indexed(&mut self) {
        if self.indices.is_empty() && !self.positions.is_empty() {
            self.indices = (0..self.vertex_count() as u32).collect();
        }
    }

    /// Merge another mesh into this one
    #[inline]
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }
        self.ensure_indexed();

        let vertex_offset = self.vertex_count() as u32;

        // Keep normals aligned with positions when only one side has them
        if self.normals.is_empty() && !other.normals.is_empty() {
            self.normals.resize(self.positions.len(), 0.0);
        }

        self.positions.reserve(other.positions.len());
        self.indices.reserve(other.indices.len().max(other.vertex_count()));

        self.positions.extend_from_slice(&other.positions);
        if !other.normals.is_empty() {
            self.normals.extend_from_slice(&other.normals);
        } else if !self.normals.is_empty() {
            self.normals.resize(self.positions.len(), 0.0);
        }

        if other.is_indexed() {
            self.indices
                .extend(other.indices.iter().map(|&i| i + vertex_offset));
        } else {
            self.indices
                .extend((0..other.vertex_count() as u32).map(|i| i + vertex_offset));
        }
    }

    /// Merge groups of meshes, emitting one draw group per non-empty input group.
    ///
    /// Group `i` of the result refers to material index `i` of the caller's list,
    /// so empty groups still consume their material slot.
    pub fn merge_grouped<'a, G, I>(groups: G) -> (Mesh, Vec<DrawGroup>)
    where
        G: IntoIterator<Item = I>,
        I: IntoIterator<Item = &'a Mesh>,
    {
        let mut merged = Mesh::new();
        let mut draw_groups = Vec::new();

        for (material_index, group) in groups.into_iter().enumerate() {
            let start = merged.indices.len() as u32;
            for mesh in group {
                merged.merge(mesh);
            }
            let count = merged.indices.len() as u32 - start;
            if count > 0 {
                draw_groups.push(DrawGroup {
                    start,
                    count,
                    material_index: material_index as u32,
                });
            }
        }

        (merged, draw_groups)
    }

    /// Transform positions (and normals, if present) in place
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        self.positions.chunks_exact_mut(3).for_each(|chunk| {
            let point = Point3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
            let t = matrix.transform_point(&point);
            chunk[0] = t.x as f32;
            chunk[1] = t.y as f32;
            chunk[2] = t.z as f32;
        });

        if self.normals.is_empty() {
            return;
        }

        let linear: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear
            .try_inverse()
            .map(|inv| inv.transpose())
            .unwrap_or(linear);

        self.normals.chunks_exact_mut(3).for_each(|chunk| {
            let n = Vector3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
            let t = normal_matrix * n;
            let t = t.try_normalize(1e-12).unwrap_or(t);
            chunk[0] = t.x as f32;
            chunk[1] = t.y as f32;
            chunk[2] = t.z as f32;
        });
    }

    /// Iterate vertex positions in f64
    #[inline]
    pub fn points(&self) -> impl Iterator<Item = Point3<f64>> + '_ {
        self.positions
            .chunks_exact(3)
            .map(|c| Point3::new(c[0] as f64, c[1] as f64, c[2] as f64))
    }

    /// Iterate triangles as vertex index triples, covering non-indexed meshes too
    pub fn triangles(&self) -> Box<dyn Iterator<Item = [u32; 3]> + '_> {
        if self.is_indexed() {
            Box::new(self.indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]]))
        } else {
            let n = (self.vertex_count() / 3) as u32;
            Box::new((0..n).map(|t| [t * 3, t * 3 + 1, t * 3 + 2]))
        }
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Get triangle count
    #[inline]
    pub fn triangle_count(&self) -> usize {
        if self.is_indexed() {
            self.indices.len() / 3
        } else {
            self.vertex_count() / 3
        }
    }

    /// Check if mesh is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Calculate bounds (min, max)
    #[inline]
    pub fn bounds(&self) -> (Point3<f32>, Point3<f32>) {
        if self.is_empty() {
            return (Point3::origin(), Point3::origin());
        }

        let mut min = Point3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Point3::new(f32::MIN, f32::MIN, f32::MIN);

        self.positions.chunks_exact(3).for_each(|chunk| {
            let (x, y, z) = (chunk[0], chunk[1], chunk[2]);
            min.x = min.x.min(x);
            min.y = min.y.min(y);
            min.z = min.z.min(z);
            max.x = max.x.max(x);
            max.y = max.y.max(y);
            max.z = max.z.max(z);
        });

        (min, max)
    }

    /// Release all buffers
    #[inline]
    pub fn clear(&mut self) {
        self.positions = Vec::new();
        self.normals = Vec::new();
        self.indices = Vec::new();
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}
