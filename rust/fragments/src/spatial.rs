// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Floor membership of items

use crate::model::{FloorId, ItemId};
use rustc_hash::FxHashMap;

/// Properties of a building storey
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FloorProperties {
    pub id: FloorId,
    pub name: Option<String>,
    /// Storey elevation in metres
    pub elevation: f64,
}

/// Item → floor relationships and per-floor properties
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpatialStructure {
    items_by_floor: FxHashMap<ItemId, FloorId>,
    floor_properties: FxHashMap<FloorId, FloorProperties>,
}

impl SpatialStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a storey
    pub fn add_floor(&mut self, id: FloorId, name: Option<String>, elevation: f64) {
        self.floor_properties.insert(
            id,
            FloorProperties {
                id,
                name,
                elevation,
            },
        );
    }

    /// Place an item on a floor, replacing any previous assignment
    pub fn assign(&mut self, item: ItemId, floor: FloorId) {
        self.items_by_floor.insert(item, floor);
    }

    #[inline]
    pub fn floor_of(&self, item: ItemId) -> Option<FloorId> {
        self.items_by_floor.get(&item).copied()
    }

    /// Items on `floor`, sorted by id
    pub fn items_on(&self, floor: FloorId) -> Vec<ItemId> {
        let mut items: Vec<ItemId> = self
            .items_by_floor
            .iter()
            .filter(|(_, f)| **f == floor)
            .map(|(item, _)| *item)
            .collect();
        items.sort_unstable();
        items
    }

    #[inline]
    pub fn items_by_floor(&self) -> &FxHashMap<ItemId, FloorId> {
        &self.items_by_floor
    }

    #[inline]
    pub fn floor_properties(&self) -> &FxHashMap<FloorId, FloorProperties> {
        &self.floor_properties
    }

    /// Drop every relationship
    pub fn clean_up(&mut self) {
        self.items_by_floor.clear();
        self.floor_properties.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_and_query() {
        let mut spatial = SpatialStructure::new();
        spatial.add_floor(100, Some("Level 1".into()), 0.0);
        spatial.assign(3, 100);
        spatial.assign(1, 100);
        spatial.assign(2, 200);

        assert_eq!(spatial.floor_of(1), Some(100));
        assert_eq!(spatial.floor_of(9), None);
        assert_eq!(spatial.items_on(100), vec![1, 3]);
        assert_eq!(spatial.floor_properties()[&100].name.as_deref(), Some("Level 1"));

        spatial.clean_up();
        assert!(spatial.items_by_floor().is_empty());
    }
}
