// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Oriented bounding box estimation
//!
//! Approximates the minimum-volume oriented box around one or more meshes that
//! share a local frame. The search samples a fixed table of 15 primary axis
//! directions (axis-aligned, face-diagonal, edge-diagonal and half-diagonal
//! directions of a cube) and keeps the frame with the smallest volume. This is a
//! bounded heuristic: it is exact for boxes aligned with one of the candidates and
//! an over-estimate otherwise.
//!
//! The resulting transform maps the unit cube `[-0.5, 0.5]^3` onto the box: its
//! columns are the three axes scaled to their extents and its translation is the
//! box center.

use crate::mesh::Mesh;
use nalgebra::{Matrix4, Point3, Vector3, Vector4};

/// Candidate primary axes, in search order. Normalized at use.
pub const CANDIDATE_AXES: [[f64; 3]; 15] = [
    [1.0, 0.0, 0.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 0.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
    [1.0, 0.0, 0.5],
    [1.0, 0.5, 0.0],
    [1.0, 1.0, 0.5],
    [0.0, 1.0, 0.5],
    [0.5, 0.0, 1.0],
    [0.5, 1.0, 0.0],
    [0.5, 1.0, 1.0],
    [0.0, 0.5, 1.0],
    [0.5, 0.5, 1.0],
    [1.0, 0.5, 0.5],
];

/// Reference up direction of the modeling space (IFC is Z-up)
pub const WORLD_UP: [f64; 3] = [0.0, 0.0, 1.0];

/// Oriented box: center, unit axes and full extent along each axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: Point3<f64>,
    pub axes: [Vector3<f64>; 3],
    pub extents: Vector3<f64>,
}

impl OrientedBox {
    /// Zero-extent box at the origin
    pub fn degenerate() -> Self {
        Self {
            center: Point3::origin(),
            axes: [Vector3::x(), Vector3::y(), Vector3::z()],
            extents: Vector3::zeros(),
        }
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.extents.x * self.extents.y * self.extents.z
    }

    /// Transform whose columns are the scaled axes and whose translation is the center
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let x = self.axes[0] * self.extents.x;
        let y = self.axes[1] * self.extents.y;
        let z = self.axes[2] * self.extents.z;
        Matrix4::from_columns(&[
            Vector4::new(x.x, x.y, x.z, 0.0),
            Vector4::new(y.x, y.y, y.z, 0.0),
            Vector4::new(z.x, z.y, z.z, 0.0),
            Vector4::new(self.center.x, self.center.y, self.center.z, 1.0),
        ])
    }
}

/// Column-major 16 numbers of a transform, the layout renderers expect
#[inline]
pub fn matrix_elements(matrix: &Matrix4<f64>) -> [f64; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}

/// Estimate the oriented box enclosing every vertex of `meshes`.
///
/// Empty input yields [`OrientedBox::degenerate`].
pub fn estimate_oriented_box<'a, I>(meshes: I) -> OrientedBox
where
    I: IntoIterator<Item = &'a Mesh>,
{
    let meshes: Vec<&Mesh> = meshes.into_iter().collect();

    let mut sum = Vector3::zeros();
    let mut count = 0usize;
    for point in meshes.iter().flat_map(|m| m.points()) {
        sum += point.coords;
        count += 1;
    }
    if count == 0 {
        return OrientedBox::degenerate();
    }
    let centroid = Point3::from(sum / count as f64);
    let up = Vector3::from(WORLD_UP);

    let mut best: Option<(f64, [Vector3<f64>; 3], Vector3<f64>, Vector3<f64>)> = None;

    for candidate in CANDIDATE_AXES.iter() {
        let a = Vector3::from(*candidate).normalize();
        let b = a.cross(&up).normalize();
        let c = b.cross(&a).normalize();

        let mut min = Vector3::repeat(f64::INFINITY);
        let mut max = Vector3::repeat(f64::NEG_INFINITY);
        for point in meshes.iter().flat_map(|m| m.points()) {
            let d = point - centroid;
            let p = Vector3::new(a.dot(&d), b.dot(&d), c.dot(&d));
            min = min.inf(&p);
            max = max.sup(&p);
        }

        let extents = max - min;
        let volume = extents.x * extents.y * extents.z;
        let better = match &best {
            Some((best_volume, ..)) => volume < *best_volume,
            None => true,
        };
        if better {
            best = Some((volume, [a, b, c], extents, (max + min) / 2.0));
        }
    }

    let Some((_, axes, extents, offset)) = best else {
        return OrientedBox::degenerate();
    };

    let center = centroid + axes[0] * offset.x + axes[1] * offset.y + axes[2] * offset.z;

    OrientedBox {
        center,
        axes,
        extents,
    }
}

/// Estimate the bounding transform of `meshes` (see module docs)
pub fn estimate_bounding_transform<'a, I>(meshes: I) -> Matrix4<f64>
where
    I: IntoIterator<Item = &'a Mesh>,
{
    estimate_oriented_box(meshes).to_matrix()
}

/// World axis-aligned box of the unit cube `[-0.5, 0.5]^3` mapped through `transform`
pub fn unit_cube_aabb(transform: &Matrix4<f64>) -> (Point3<f64>, Point3<f64>) {
    let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
    let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for i in 0..8 {
        let corner = Point3::new(
            if i & 1 == 0 { -0.5 } else { 0.5 },
            if i & 2 == 0 { -0.5 } else { 0.5 },
            if i & 4 == 0 { -0.5 } else { 0.5 },
        );
        let p = transform.transform_point(&corner);
        min = min.inf(&p);
        max = max.sup(&p);
    }
    (min, max)
}
