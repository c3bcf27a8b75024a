// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fragments: render-ready geometry units
//!
//! An instanced fragment holds one local-frame mesh drawn once per instance
//! transform. A merged fragment holds the world-space geometry of many items of
//! one category, floor and material set, with a per-vertex block id naming the
//! owning item; its single instance lists every contained item id (in block id
//! order) with the identity transform.

use crate::model::{CategoryCode, FloorId, ItemId, MaterialId};
use ifc_fragments_geometry::{DrawGroup, Mesh};
use nalgebra::Matrix4;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::ops::Range;

/// Identifier of a fragment within one model
pub type FragmentId = u32;

/// Item ids carried by one fragment instance
pub type InstanceIds = SmallVec<[ItemId; 1]>;

/// One drawn copy of a fragment's mesh
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FragmentInstance {
    pub ids: InstanceIds,
    pub transform: Matrix4<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FragmentKind {
    Instanced,
    Merged {
        /// Dense block id per vertex; block `b` belongs to `instances[0].ids[b]`
        block_ids: Vec<u32>,
        category: CategoryCode,
        floor: FloorId,
    },
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fragment {
    id: FragmentId,
    mesh: Mesh,
    draw_groups: Vec<DrawGroup>,
    materials: Vec<MaterialId>,
    instances: Vec<FragmentInstance>,
    kind: FragmentKind,
}

impl Fragment {
    pub(crate) fn instanced(
        id: FragmentId,
        mesh: Mesh,
        draw_groups: Vec<DrawGroup>,
        materials: Vec<MaterialId>,
        instances: Vec<FragmentInstance>,
    ) -> Self {
        Self {
            id,
            mesh,
            draw_groups,
            materials,
            instances,
            kind: FragmentKind::Instanced,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn merged(
        id: FragmentId,
        mesh: Mesh,
        draw_groups: Vec<DrawGroup>,
        materials: Vec<MaterialId>,
        block_ids: Vec<u32>,
        item_ids: InstanceIds,
        category: CategoryCode,
        floor: FloorId,
    ) -> Self {
        Self {
            id,
            mesh,
            draw_groups,
            materials,
            instances: vec![FragmentInstance {
                ids: item_ids,
                transform: Matrix4::identity(),
            }],
            kind: FragmentKind::Merged {
                block_ids,
                category,
                floor,
            },
        }
    }

    #[inline]
    pub fn id(&self) -> FragmentId {
        self.id
    }

    #[inline]
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    #[inline]
    pub fn draw_groups(&self) -> &[DrawGroup] {
        &self.draw_groups
    }

    #[inline]
    pub fn materials(&self) -> &[MaterialId] {
        &self.materials
    }

    #[inline]
    pub fn kind(&self) -> &FragmentKind {
        &self.kind
    }

    #[inline]
    pub fn is_merged(&self) -> bool {
        matches!(self.kind, FragmentKind::Merged { .. })
    }

    #[inline]
    pub fn instances(&self) -> &[FragmentInstance] {
        &self.instances
    }

    #[inline]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn get_instance(&self, index: usize) -> Option<&FragmentInstance> {
        self.instances.get(index)
    }

    /// Item id `id_index` of instance `instance`
    #[inline]
    pub fn get_item_id(&self, instance: usize, id_index: usize) -> Option<ItemId> {
        self.instances.get(instance)?.ids.get(id_index).copied()
    }

    /// Every item id in the fragment, instance by instance
    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.instances.iter().flat_map(|i| i.ids.iter().copied())
    }

    /// Per-vertex block ids of a merged fragment
    pub fn block_ids(&self) -> Option<&[u32]> {
        match &self.kind {
            FragmentKind::Merged { block_ids, .. } => Some(block_ids),
            FragmentKind::Instanced => None,
        }
    }

    /// Source item owning `block` in a merged fragment
    pub fn item_for_block(&self, block: u32) -> Option<ItemId> {
        self.block_ids()?;
        self.get_item_id(0, block as usize)
    }

    /// Contiguous vertex runs of a merged fragment, as (item id, vertex range).
    ///
    /// One item may own several runs when its geometry spans several materials.
    pub fn block_ranges(&self) -> Vec<(ItemId, Range<usize>)> {
        let Some(block_ids) = self.block_ids() else {
            return Vec::new();
        };

        let mut ranges = Vec::new();
        let mut start = 0;
        for i in 1..=block_ids.len() {
            if i == block_ids.len() || block_ids[i] != block_ids[start] {
                if let Some(item) = self.item_for_block(block_ids[start]) {
                    ranges.push((item, start..i));
                }
                start = i;
            }
        }
        ranges
    }

    /// Release the fragment's buffers
    pub(crate) fn dispose(&mut self) {
        self.mesh.clear();
        self.draw_groups = Vec::new();
        self.instances = Vec::new();
        if let FragmentKind::Merged { block_ids, .. } = &mut self.kind {
            *block_ids = Vec::new();
        }
    }
}

/// Column-major oriented box transform of one item
pub type BoundingEntry = [f64; 16];

/// Which bounding map an item lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundingPartition {
    Opaque,
    /// Transparent material or voided shape
    Transparent,
}

/// Oriented boxes per item, split into opaque and transparent/voided items
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingMaps {
    opaque: FxHashMap<ItemId, BoundingEntry>,
    transparent: FxHashMap<ItemId, BoundingEntry>,
}

impl BoundingMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the box of `item`.
    ///
    /// An item's partition is fixed by its first insertion; a later insertion into
    /// the other partition is refused and returns `false`.
    pub fn insert(&mut self, partition: BoundingPartition, item: ItemId, entry: BoundingEntry) -> bool {
        let (target, other) = match partition {
            BoundingPartition::Opaque => (&mut self.opaque, &self.transparent),
            BoundingPartition::Transparent => (&mut self.transparent, &self.opaque),
        };
        if other.contains_key(&item) {
            return false;
        }
        target.insert(item, entry);
        true
    }

    pub fn get(&self, item: ItemId) -> Option<(BoundingPartition, &BoundingEntry)> {
        if let Some(entry) = self.opaque.get(&item) {
            return Some((BoundingPartition::Opaque, entry));
        }
        self.transparent
            .get(&item)
            .map(|entry| (BoundingPartition::Transparent, entry))
    }

    #[inline]
    pub fn opaque(&self) -> &FxHashMap<ItemId, BoundingEntry> {
        &self.opaque
    }

    #[inline]
    pub fn transparent(&self) -> &FxHashMap<ItemId, BoundingEntry> {
        &self.transparent
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }

    pub fn clear(&mut self) {
        self.opaque.clear();
        self.transparent.clear();
    }
}
