// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-Fragments Geometry
//!
//! Mesh buffers and the pure geometry routines behind fragment generation:
//! oriented bounding box estimation, transform decomposition and
//! threshold-angle edge extraction. Uses nalgebra for all math.

pub mod bounds;
pub mod decompose;
pub mod edges;
pub mod error;
pub mod mesh;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};

pub use bounds::{
    estimate_bounding_transform, estimate_oriented_box, matrix_elements, unit_cube_aabb,
    OrientedBox, CANDIDATE_AXES,
};
pub use decompose::{check_no_shear, decompose, decompose_checked, Trs};
pub use edges::{extract_edges, EdgeGeometry, DEFAULT_THRESHOLD_DEG};
pub use error::{Error, Result};
pub use mesh::{DrawGroup, Mesh};
