// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Input data model handed over by the geometry parser

use crate::spatial::SpatialStructure;
use crate::units::LengthUnit;
use ifc_fragments_geometry::Mesh;
use nalgebra::Matrix4;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Express id of an IFC item
pub type ItemId = u32;
/// Material identifier assigned by the parser
pub type MaterialId = u32;
/// Integer IFC category (type) code
pub type CategoryCode = u32;
/// Express id of a building storey
pub type FloorId = u32;

/// One occurrence of a logical element
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instance {
    pub id: ItemId,
    /// Placement in source-model units, not yet normalized
    pub transform: Matrix4<f64>,
    /// The element has boolean-subtracted openings
    pub voids: bool,
}

impl Instance {
    pub fn new(id: ItemId, transform: Matrix4<f64>) -> Self {
        Self {
            id,
            transform,
            voids: false,
        }
    }

    pub fn with_voids(mut self, voids: bool) -> Self {
        self.voids = voids;
        self
    }
}

/// Surface material of a geometry buffer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    /// RGBA in 0..1
    pub color: [f32; 4],
    pub transparent: bool,
}

impl Material {
    pub fn opaque(r: f32, g: f32, b: f32) -> Self {
        Self {
            color: [r, g, b, 1.0],
            transparent: false,
        }
    }

    pub fn translucent(r: f32, g: f32, b: f32, opacity: f32) -> Self {
        Self {
            color: [r, g, b, opacity],
            transparent: true,
        }
    }
}

/// Materials by id
pub type MaterialList = FxHashMap<MaterialId, Material>;

/// All geometry of one logical element, shared by its instances.
///
/// Meshes are in the element's local frame. Materials iterate in ascending id
/// order, which fixes the material order of every fragment built from the group.
#[derive(Debug, Clone, Default)]
pub struct GeometryGroup {
    pub instances: Vec<Instance>,
    pub geometries_by_material: BTreeMap<MaterialId, Vec<Mesh>>,
}

impl GeometryGroup {
    pub fn new(instances: Vec<Instance>) -> Self {
        Self {
            instances,
            geometries_by_material: BTreeMap::new(),
        }
    }

    /// Add a mesh drawn with `material`
    pub fn add_geometry(&mut self, material: MaterialId, mesh: Mesh) {
        self.geometries_by_material
            .entry(material)
            .or_default()
            .push(mesh);
    }

    /// Builder form of [`GeometryGroup::add_geometry`]
    pub fn with_geometry(mut self, material: MaterialId, mesh: Mesh) -> Self {
        self.add_geometry(material, mesh);
        self
    }

    /// Id of the first instance, which names the element
    #[inline]
    pub fn key(&self) -> Option<ItemId> {
        self.instances.first().map(|i| i.id)
    }

    /// Exactly one instance
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.instances.len() == 1
    }

    /// The single instance has voids; always false for repeated elements
    #[inline]
    pub fn has_voids(&self) -> bool {
        self.is_unique() && self.instances[0].voids
    }

    pub fn vertex_count(&self) -> usize {
        self.geometries_by_material
            .values()
            .flatten()
            .map(Mesh::vertex_count)
            .sum()
    }
}

/// Per-model metadata from the parser: materials, categories, storeys,
/// coordination and units
#[derive(Debug, Clone)]
pub struct SourceModel {
    pub materials: MaterialList,
    /// Category code per item
    pub categories: FxHashMap<ItemId, CategoryCode>,
    pub spatial: SpatialStructure,
    pub coordination_matrix: Matrix4<f64>,
    pub length_unit: LengthUnit,
}

impl SourceModel {
    pub fn new() -> Self {
        Self {
            materials: MaterialList::default(),
            categories: FxHashMap::default(),
            spatial: SpatialStructure::new(),
            coordination_matrix: Matrix4::identity(),
            length_unit: LengthUnit::METRE,
        }
    }

    #[inline]
    pub fn category_of(&self, item: ItemId) -> Option<CategoryCode> {
        self.categories.get(&item).copied()
    }

    /// Whether any of the given materials is transparent
    pub fn any_transparent<'a>(&self, materials: impl IntoIterator<Item = &'a MaterialId>) -> bool {
        materials
            .into_iter()
            .any(|id| self.materials.get(id).is_some_and(|m| m.transparent))
    }
}

impl Default for SourceModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_voids_only_for_single_instance() {
        let single = GeometryGroup::new(vec![
            Instance::new(1, Matrix4::identity()).with_voids(true),
        ]);
        assert!(single.has_voids());

        let repeated = GeometryGroup::new(vec![
            Instance::new(1, Matrix4::identity()).with_voids(true),
            Instance::new(2, Matrix4::identity()),
        ]);
        assert!(!repeated.has_voids());
        assert_eq!(repeated.key(), Some(1));
    }

    #[test]
    fn test_any_transparent() {
        let mut source = SourceModel::new();
        source.materials.insert(1, Material::opaque(1.0, 0.0, 0.0));
        source.materials.insert(2, Material::translucent(0.0, 0.0, 1.0, 0.3));

        assert!(!source.any_transparent(&[1]));
        assert!(source.any_transparent(&[1, 2]));
        assert!(!source.any_transparent(&[7]));
    }
}
