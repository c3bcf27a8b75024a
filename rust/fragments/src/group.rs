// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Assembled fragment model
//!
//! [`FragmentGroup`] is what a conversion session hands to the renderer: every
//! fragment, the opaque and transparent bounding maps, floor and category tables,
//! the coordination matrix and a coarse voxel summary of the model extent. It is
//! read-only once assembled.

use crate::error::Error;
use crate::fragment::{BoundingEntry, BoundingMaps, Fragment, FragmentId};
use crate::model::{CategoryCode, FloorId, ItemId};
use crate::spatial::FloorProperties;
use ifc_fragments_geometry::unit_cube_aabb;
use nalgebra::{Matrix4, Point3, Vector3};
use rustc_hash::FxHashMap;

/// World axis-aligned extent accumulated from item bounding transforms
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelBounds {
    min: Point3<f64>,
    max: Point3<f64>,
}

impl ModelBounds {
    /// Bounds containing nothing
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn include_point(&mut self, point: &Point3<f64>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Grow to contain the box a bounding transform describes
    pub fn include_transform(&mut self, transform: &Matrix4<f64>) {
        let (min, max) = unit_cube_aabb(transform);
        self.include_point(&min);
        self.include_point(&max);
    }

    #[inline]
    pub fn min(&self) -> Point3<f64> {
        self.min
    }

    #[inline]
    pub fn max(&self) -> Point3<f64> {
        self.max
    }

    /// Size along each axis, zero when empty
    pub fn extent(&self) -> Vector3<f64> {
        if self.is_empty() {
            return Vector3::zeros();
        }
        self.max - self.min
    }
}

impl Default for ModelBounds {
    fn default() -> Self {
        Self::empty()
    }
}

/// Regular grid of cubic cells covering the model bounds
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoxelGrid {
    pub bounds: ModelBounds,
    pub voxel_size: f64,
    /// Cell count per axis
    pub dims: [u32; 3],
}

impl VoxelGrid {
    pub fn new(bounds: ModelBounds, voxel_size: f64) -> Self {
        let dims = if bounds.is_empty() || voxel_size <= 0.0 {
            [0; 3]
        } else {
            let extent = bounds.extent();
            let cells = |e: f64| ((e / voxel_size).ceil() as u32).max(1);
            [cells(extent.x), cells(extent.y), cells(extent.z)]
        };
        Self {
            bounds,
            voxel_size,
            dims,
        }
    }

    #[inline]
    pub fn cell_count(&self) -> u64 {
        self.dims.iter().map(|&d| d as u64).product()
    }

    /// Cell containing `point`, if inside the grid
    pub fn cell_of(&self, point: &Point3<f64>) -> Option<[u32; 3]> {
        if self.cell_count() == 0 {
            return None;
        }
        let local = point - self.bounds.min();
        let mut cell = [0u32; 3];
        for axis in 0..3 {
            let v = local[axis] / self.voxel_size;
            if v < 0.0 {
                return None;
            }
            // Points on the max face belong to the last cell
            let index = (v.floor() as u32).min(self.dims[axis] - 1);
            if v > self.dims[axis] as f64 {
                return None;
            }
            cell[axis] = index;
        }
        Some(cell)
    }
}

/// The output of one conversion
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FragmentGroup {
    pub(crate) fragments: Vec<Fragment>,
    pub(crate) bounding: BoundingMaps,
    pub(crate) level_relationships: FxHashMap<ItemId, FloorId>,
    pub(crate) floors_properties: FxHashMap<FloorId, FloorProperties>,
    pub(crate) all_types: FxHashMap<CategoryCode, String>,
    pub(crate) item_types: FxHashMap<ItemId, CategoryCode>,
    pub(crate) coordination_matrix: Matrix4<f64>,
    pub(crate) voxel_grid: VoxelGrid,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) diagnostics: Vec<Error>,
}

impl FragmentGroup {
    #[inline]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragment(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.id() == id)
    }

    /// Fragment and instance index holding `item`
    pub fn locate_item(&self, item: ItemId) -> Option<(FragmentId, usize)> {
        self.fragments.iter().find_map(|fragment| {
            fragment
                .instances()
                .iter()
                .position(|instance| instance.ids.contains(&item))
                .map(|index| (fragment.id(), index))
        })
    }

    #[inline]
    pub fn bounding_maps(&self) -> &BoundingMaps {
        &self.bounding
    }

    #[inline]
    pub fn opaque_bounding_boxes(&self) -> &FxHashMap<ItemId, BoundingEntry> {
        self.bounding.opaque()
    }

    #[inline]
    pub fn transparent_bounding_boxes(&self) -> &FxHashMap<ItemId, BoundingEntry> {
        self.bounding.transparent()
    }

    #[inline]
    pub fn level_relationships(&self) -> &FxHashMap<ItemId, FloorId> {
        &self.level_relationships
    }

    #[inline]
    pub fn floors_properties(&self) -> &FxHashMap<FloorId, FloorProperties> {
        &self.floors_properties
    }

    /// Category code → name
    #[inline]
    pub fn all_types(&self) -> &FxHashMap<CategoryCode, String> {
        &self.all_types
    }

    /// Item id → category code
    #[inline]
    pub fn item_types(&self) -> &FxHashMap<ItemId, CategoryCode> {
        &self.item_types
    }

    #[inline]
    pub fn coordination_matrix(&self) -> &Matrix4<f64> {
        &self.coordination_matrix
    }

    #[inline]
    pub fn voxel_grid(&self) -> &VoxelGrid {
        &self.voxel_grid
    }

    /// Data-consistency problems found while converting
    #[inline]
    pub fn diagnostics(&self) -> &[Error] {
        &self.diagnostics
    }

    /// Release every buffer and table
    pub fn dispose(&mut self) {
        for fragment in &mut self.fragments {
            fragment.dispose();
        }
        self.fragments.clear();
        self.bounding.clear();
        self.level_relationships.clear();
        self.floors_properties.clear();
        self.all_types.clear();
        self.item_types.clear();
        self.diagnostics.clear();
        self.voxel_grid = VoxelGrid::new(ModelBounds::empty(), self.voxel_grid.voxel_size);
    }
}
