// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for fragment generation.

use thiserror::Error;

/// Result type alias for fragment operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while consolidating geometry into fragments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A geometry group arrived without any instance.
    #[error("geometry group has no instances")]
    EmptyGroup,

    /// A merge candidate has no floor in the spatial structure.
    #[error("item {item_id} has no floor assignment; excluded from merging")]
    MissingFloor { item_id: u32 },

    /// A merge candidate has no category code.
    #[error("item {item_id} has no category; excluded from merging")]
    MissingCategory { item_id: u32 },

    /// A material id referenced by geometry is absent from the material list.
    #[error("material {material_id} referenced by item {item_id} is not defined")]
    UnknownMaterial { material_id: u32, item_id: u32 },

    /// A merged buffer grew past the 32-bit index range.
    #[error("merged buffer for category {category} floor {floor} exceeds {vertices} vertices")]
    BufferOverflow {
        category: u32,
        floor: u32,
        vertices: usize,
    },

    /// No fragment with the given id.
    #[error("fragment {0} not found")]
    FragmentNotFound(u32),

    #[error("Geometry error: {0}")]
    Geometry(#[from] ifc_fragments_geometry::Error),
}
