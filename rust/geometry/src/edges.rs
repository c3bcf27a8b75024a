// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Threshold-angle edge extraction
//!
//! Emits a line segment for every triangle edge whose two adjacent faces meet at
//! an angle above the threshold, plus every boundary edge (used by one face only).
//! Vertices are matched by position quantized to [`EDGE_PRECISION`], so meshes
//! with split normals (duplicated corner vertices) still pair up their edges.

use crate::error::Result;
use crate::mesh::Mesh;
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;

/// Default crease angle in degrees
pub const DEFAULT_THRESHOLD_DEG: f64 = 80.0;

/// Positions are matched after scaling by this factor and rounding
pub const EDGE_PRECISION: f64 = 1e4;

type VertexKey = [i64; 3];

/// Line segments (pairs of points) in the mesh's local frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeGeometry {
    /// Segment endpoints, 6 floats per segment
    pub positions: Vec<f32>,
}

impl EdgeGeometry {
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.positions.len() / 6
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Iterate segments as point pairs
    pub fn segments(&self) -> impl Iterator<Item = (Point3<f32>, Point3<f32>)> + '_ {
        self.positions.chunks_exact(6).map(|c| {
            (
                Point3::new(c[0], c[1], c[2]),
                Point3::new(c[3], c[4], c[5]),
            )
        })
    }

    fn push_segment(&mut self, a: &Point3<f32>, b: &Point3<f32>) {
        self.positions.extend_from_slice(&[a.x, a.y, a.z, b.x, b.y, b.z]);
    }
}

struct HalfEdge {
    start: Point3<f32>,
    end: Point3<f32>,
    normal: Vector3<f64>,
    open: bool,
}

#[inline]
fn quantize(p: &Point3<f32>) -> VertexKey {
    [
        (p.x as f64 * EDGE_PRECISION).round() as i64,
        (p.y as f64 * EDGE_PRECISION).round() as i64,
        (p.z as f64 * EDGE_PRECISION).round() as i64,
    ]
}

/// Extract crease and boundary edges of `mesh`
pub fn extract_edges(mesh: &Mesh, threshold_deg: f64) -> Result<EdgeGeometry> {
    mesh.validate()?;

    let threshold_dot = threshold_deg.to_radians().cos();
    let point = |i: u32| {
        let i = i as usize * 3;
        Point3::new(
            mesh.positions[i],
            mesh.positions[i + 1],
            mesh.positions[i + 2],
        )
    };

    // Insertion-ordered so the output is deterministic
    let mut half_edges: Vec<HalfEdge> = Vec::new();
    let mut lookup: FxHashMap<(VertexKey, VertexKey), usize> = FxHashMap::default();
    let mut out = EdgeGeometry::default();

    for tri in mesh.triangles() {
        let corners = [point(tri[0]), point(tri[1]), point(tri[2])];
        let keys = [quantize(&corners[0]), quantize(&corners[1]), quantize(&corners[2])];

        if keys[0] == keys[1] || keys[1] == keys[2] || keys[2] == keys[0] {
            continue;
        }

        let a = corners[0].cast::<f64>();
        let b = corners[1].cast::<f64>();
        let c = corners[2].cast::<f64>();
        let normal = (c - b).cross(&(a - b));
        let normal = normal.try_normalize(f64::EPSILON).unwrap_or(normal);

        for j in 0..3 {
            let next = (j + 1) % 3;
            let forward = (keys[j], keys[next]);
            let reverse = (keys[next], keys[j]);

            match lookup.get(&reverse).copied() {
                Some(idx) if half_edges[idx].open => {
                    if normal.dot(&half_edges[idx].normal) <= threshold_dot {
                        out.push_segment(&corners[j], &corners[next]);
                    }
                    half_edges[idx].open = false;
                }
                _ => {
                    if !lookup.contains_key(&forward) {
                        lookup.insert(forward, half_edges.len());
                        half_edges.push(HalfEdge {
                            start: corners[j],
                            end: corners[next],
                            normal,
                            open: true,
                        });
                    }
                }
            }
        }
    }

    for edge in half_edges.iter().filter(|e| e.open) {
        out.push_segment(&edge.start, &edge.end);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Axis-aligned unit box with shared corner vertices
    fn unit_box() -> Mesh {
        let mut mesh = Mesh::new();
        for i in 0..8 {
            let p = Point3::new(
                (i & 1) as f64,
                ((i >> 1) & 1) as f64,
                ((i >> 2) & 1) as f64,
            );
            mesh.add_vertex(p, Vector3::z());
        }
        let quads: [[u32; 4]; 6] = [
            [0, 2, 3, 1], // bottom
            [4, 5, 7, 6], // top
            [0, 1, 5, 4], // front
            [2, 6, 7, 3], // back
            [0, 4, 6, 2], // left
            [1, 3, 7, 5], // right
        ];
        for q in quads.iter() {
            mesh.add_triangle(q[0], q[1], q[2]);
            mesh.add_triangle(q[0], q[2], q[3]);
        }
        mesh
    }

    #[test]
    fn test_box_yields_twelve_edges() {
        let edges = extract_edges(&unit_box(), DEFAULT_THRESHOLD_DEG).unwrap();
        assert_eq!(edges.segment_count(), 12);
    }

    #[test]
    fn test_low_threshold_keeps_no_coplanar_diagonals() {
        // Diagonals join coplanar faces (0 degrees), so even a 1 degree threshold drops them
        let edges = extract_edges(&unit_box(), 1.0).unwrap();
        assert_eq!(edges.segment_count(), 12);
    }

    #[test]
    fn test_single_triangle_has_three_boundary_edges() {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Point3::new(0.0, 0.0, 0.0), Vector3::z());
        mesh.add_vertex(Point3::new(1.0, 0.0, 0.0), Vector3::z());
        mesh.add_vertex(Point3::new(0.0, 1.0, 0.0), Vector3::z());
        mesh.add_triangle(0, 1, 2);

        let edges = extract_edges(&mesh, DEFAULT_THRESHOLD_DEG).unwrap();
        assert_eq!(edges.segment_count(), 3);
    }

    #[test]
    fn test_split_vertices_are_welded_by_position() {
        // Same box, but every triangle owns its own vertices
        let indexed = unit_box();
        let mut soup = Mesh::new();
        for tri in indexed.triangles() {
            for &i in tri.iter() {
                let i = i as usize * 3;
                soup.positions.extend_from_slice(&indexed.positions[i..i + 3]);
            }
        }

        let edges = extract_edges(&soup, DEFAULT_THRESHOLD_DEG).unwrap();
        assert_eq!(edges.segment_count(), 12);
    }

    #[test]
    fn test_degenerate_triangles_are_skipped() {
        let mut mesh = Mesh::new();
        mesh.positions = vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let edges = extract_edges(&mesh, DEFAULT_THRESHOLD_DEG).unwrap();
        assert!(edges.is_empty());
    }
}
