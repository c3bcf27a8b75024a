// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry consolidation
//!
//! Each logical element is either kept as GPU instances or merged into a shared
//! per-category, per-floor buffer:
//!
//! - repeated elements, always-instanced categories and single elements with
//!   voids are instanced immediately;
//! - everything else is transformed to world space and collected into buckets
//!   keyed by (category, floor, material), which [`Consolidator::finalize_merged`]
//!   turns into merged fragments with per-vertex block ids.
//!
//! Every produced item gets an oriented bounding transform, recorded in the
//! opaque or the transparent/voided bounding map.

use crate::error::{Error, Result};
use crate::fragment::{
    BoundingMaps, BoundingPartition, Fragment, FragmentId, FragmentInstance, InstanceIds,
};
use crate::group::ModelBounds;
use crate::model::{CategoryCode, FloorId, GeometryGroup, ItemId, MaterialId, SourceModel};
use crate::settings::Settings;
use crate::units::UnitNormalizer;
use ifc_fragments_geometry::{estimate_bounding_transform, matrix_elements, Mesh};
use nalgebra::Matrix4;
use rustc_hash::FxHashMap;
use smallvec::smallvec;
use std::collections::BTreeMap;

/// How an element is turned into fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Instanced,
    Merged,
}

/// Decide the strategy of an element.
///
/// Instanced when the element repeats, its category is always instanced, or its
/// single instance has voids. Merged otherwise.
pub fn classify(group: &GeometryGroup, category: Option<CategoryCode>, settings: &Settings) -> Strategy {
    let unique = group.is_unique();
    let forced = category.is_some_and(|c| settings.is_instanced_category(c));
    let voids = group.has_voids();

    if !unique || forced || (unique && voids) {
        Strategy::Instanced
    } else {
        Strategy::Merged
    }
}

/// World-space mesh of one merge candidate
#[derive(Debug, Clone)]
struct TaggedMesh {
    item: ItemId,
    mesh: Mesh,
}

type BucketKey = (CategoryCode, FloorId);
type Bucket = BTreeMap<MaterialId, Vec<TaggedMesh>>;

/// Accumulating state of one conversion
#[derive(Debug, Clone)]
pub struct Consolidator {
    settings: Settings,
    normalizer: UnitNormalizer,
    buckets: BTreeMap<BucketKey, Bucket>,
    bounding: BoundingMaps,
    bounds: ModelBounds,
    diagnostics: Vec<Error>,
    next_fragment_id: FragmentId,
}

impl Consolidator {
    pub fn new(settings: Settings, normalizer: UnitNormalizer) -> Self {
        Self {
            settings,
            normalizer,
            buckets: BTreeMap::new(),
            bounding: BoundingMaps::new(),
            bounds: ModelBounds::empty(),
            diagnostics: Vec::new(),
            next_fragment_id: 0,
        }
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    pub fn bounding_maps(&self) -> &BoundingMaps {
        &self.bounding
    }

    #[inline]
    pub fn model_bounds(&self) -> &ModelBounds {
        &self.bounds
    }

    #[inline]
    pub fn diagnostics(&self) -> &[Error] {
        &self.diagnostics
    }

    /// Number of (category, floor) buckets awaiting finalization
    #[inline]
    pub fn pending_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Classify one element and emit its instanced fragment, or queue it for merging.
    ///
    /// Instance transforms are normalized here, once. Merge candidates return no
    /// fragments; they come out of [`Consolidator::finalize_merged`].
    pub fn classify_and_emit(&mut self, group: GeometryGroup, source: &SourceModel) -> Result<Vec<Fragment>> {
        let key = group.key().ok_or(Error::EmptyGroup)?;
        let category = source.category_of(key);

        match classify(&group, category, &self.settings) {
            Strategy::Instanced => Ok(self.emit_instanced(group, source)?.into_iter().collect()),
            Strategy::Merged => {
                self.queue_merged(group, key, category, source);
                Ok(Vec::new())
            }
        }
    }

    fn emit_instanced(&mut self, group: GeometryGroup, source: &SourceModel) -> Result<Option<Fragment>> {
        let voids = group.has_voids();
        let GeometryGroup {
            instances,
            geometries_by_material,
        } = group;

        let used: Vec<(MaterialId, Vec<Mesh>)> = geometries_by_material
            .into_iter()
            .filter(|(_, meshes)| !meshes.is_empty())
            .collect();
        if used.is_empty() {
            tracing::debug!(item = instances[0].id, "Element has no geometry, skipped");
            return Ok(None);
        }

        let materials: Vec<MaterialId> = used.iter().map(|(id, _)| *id).collect();
        for &material_id in &materials {
            if !source.materials.contains_key(&material_id) {
                self.report(Error::UnknownMaterial {
                    material_id,
                    item_id: instances[0].id,
                });
            }
        }

        let (mesh, draw_groups) = Mesh::merge_grouped(used.iter().map(|(_, meshes)| meshes.iter()));
        let helper = estimate_bounding_transform(used.iter().flat_map(|(_, meshes)| meshes.iter()));

        let partition = if voids || source.any_transparent(&materials) {
            BoundingPartition::Transparent
        } else {
            BoundingPartition::Opaque
        };

        let mut fragment_instances = Vec::with_capacity(instances.len());
        for instance in instances {
            let mut transform = instance.transform;
            self.normalizer.apply(&mut transform);

            let bounding = transform * helper;
            self.record_bounding(partition, instance.id, &bounding);

            fragment_instances.push(FragmentInstance {
                ids: smallvec![instance.id],
                transform,
            });
        }

        let id = self.allocate_id();
        tracing::debug!(
            fragment = id,
            instances = fragment_instances.len(),
            materials = materials.len(),
            vertices = mesh.vertex_count(),
            ?partition,
            "Instanced fragment"
        );

        Ok(Some(Fragment::instanced(
            id,
            mesh,
            draw_groups,
            materials,
            fragment_instances,
        )))
    }

    fn queue_merged(
        &mut self,
        group: GeometryGroup,
        item: ItemId,
        category: Option<CategoryCode>,
        source: &SourceModel,
    ) {
        let Some(category) = category else {
            self.report(Error::MissingCategory { item_id: item });
            return;
        };
        let Some(floor) = source.spatial.floor_of(item) else {
            self.report(Error::MissingFloor { item_id: item });
            return;
        };

        let GeometryGroup {
            mut instances,
            geometries_by_material,
        } = group;
        let mut transform = instances.swap_remove(0).transform;
        self.normalizer.apply(&mut transform);

        for (material_id, meshes) in geometries_by_material {
            if meshes.is_empty() {
                continue;
            }
            if !source.materials.contains_key(&material_id) {
                self.report(Error::UnknownMaterial {
                    material_id,
                    item_id: item,
                });
            }

            let bucket = self
                .buckets
                .entry((category, floor))
                .or_default()
                .entry(material_id)
                .or_default();
            for mut mesh in meshes {
                mesh.transform(&transform);
                bucket.push(TaggedMesh { item, mesh });
            }
        }
    }

    /// Turn every pending bucket into one merged fragment per (category, floor).
    ///
    /// Block ids are a dense renumbering of item ids in order of first appearance;
    /// each item's bounding transform is estimated from its own meshes only and
    /// recorded as opaque.
    pub fn finalize_merged(&mut self) -> Result<Vec<Fragment>> {
        let buckets = std::mem::take(&mut self.buckets);
        let mut fragments = Vec::with_capacity(buckets.len());

        for ((category, floor), bucket) in buckets {
            let vertices: usize = bucket
                .values()
                .flatten()
                .map(|tagged| tagged.mesh.vertex_count())
                .sum();
            if vertices > u32::MAX as usize {
                return Err(Error::BufferOverflow {
                    category,
                    floor,
                    vertices,
                });
            }

            let mut block_of: FxHashMap<ItemId, u32> = FxHashMap::default();
            let mut item_ids = InstanceIds::new();
            let mut item_meshes: Vec<Vec<&Mesh>> = Vec::new();
            let mut block_ids = Vec::with_capacity(vertices);

            for tagged in bucket.values().flatten() {
                let block = *block_of.entry(tagged.item).or_insert_with(|| {
                    item_ids.push(tagged.item);
                    item_meshes.push(Vec::new());
                    item_ids.len() as u32 - 1
                });
                item_meshes[block as usize].push(&tagged.mesh);
                block_ids.extend(std::iter::repeat(block).take(tagged.mesh.vertex_count()));
            }

            for (item, meshes) in item_ids.iter().zip(&item_meshes) {
                let bounding = estimate_bounding_transform(meshes.iter().copied());
                self.record_bounding(BoundingPartition::Opaque, *item, &bounding);
            }

            let materials: Vec<MaterialId> = bucket.keys().copied().collect();
            let (mesh, draw_groups) = Mesh::merge_grouped(
                bucket
                    .values()
                    .map(|tagged| tagged.iter().map(|t| &t.mesh)),
            );

            let id = self.allocate_id();
            tracing::debug!(
                fragment = id,
                category,
                floor,
                items = item_ids.len(),
                materials = materials.len(),
                vertices,
                "Merged fragment"
            );

            fragments.push(Fragment::merged(
                id,
                mesh,
                draw_groups,
                materials,
                block_ids,
                item_ids,
                category,
                floor,
            ));
        }

        Ok(fragments)
    }

    fn record_bounding(&mut self, partition: BoundingPartition, item: ItemId, bounding: &Matrix4<f64>) {
        if !self.bounding.insert(partition, item, matrix_elements(bounding)) {
            tracing::warn!(item, ?partition, "Item already bounded in the other partition, kept there");
        }
        self.bounds.include_transform(bounding);
    }

    fn report(&mut self, error: Error) {
        tracing::warn!(%error, "Inconsistent source data");
        self.diagnostics.push(error);
    }

    fn allocate_id(&mut self) -> FragmentId {
        let id = self.next_fragment_id;
        self.next_fragment_id += 1;
        id
    }

    /// Drop all accumulated state, keeping settings and normalizer
    pub fn reset(&mut self) {
        self.buckets.clear();
        self.bounding.clear();
        self.bounds = ModelBounds::empty();
        self.diagnostics.clear();
        self.next_fragment_id = 0;
    }

    /// Hand over the bounding maps, model bounds and diagnostics, leaving the
    /// consolidator empty
    pub(crate) fn take_results(&mut self) -> (BoundingMaps, ModelBounds, Vec<Error>) {
        let results = (
            std::mem::take(&mut self.bounding),
            std::mem::replace(&mut self.bounds, ModelBounds::empty()),
            std::mem::take(&mut self.diagnostics),
        );
        self.reset();
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::{IFCSLAB, IFCWALL, IFCWINDOW};
    use crate::model::{Instance, Material};
    use crate::units::LengthUnit;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn quad(x: f64) -> Mesh {
        let mut mesh = Mesh::new();
        let n = Vector3::z();
        mesh.add_vertex(Point3::new(x, 0.0, 0.0), n);
        mesh.add_vertex(Point3::new(x + 1.0, 0.0, 0.0), n);
        mesh.add_vertex(Point3::new(x + 1.0, 1.0, 0.0), n);
        mesh.add_vertex(Point3::new(x, 1.0, 0.0), n);
        mesh.add_triangle(0, 1, 2);
        mesh.add_triangle(0, 2, 3);
        mesh
    }

    fn source() -> SourceModel {
        let mut source = SourceModel::new();
        source.materials.insert(1, Material::opaque(0.8, 0.8, 0.8));
        source.materials.insert(2, Material::translucent(0.2, 0.4, 1.0, 0.4));
        source.spatial.add_floor(100, None, 0.0);
        for item in 1..=20 {
            source.categories.insert(item, IFCWALL);
            source.spatial.assign(item, 100);
        }
        source
    }

    fn single(item: ItemId) -> GeometryGroup {
        GeometryGroup::new(vec![Instance::new(item, Matrix4::identity())])
    }

    fn consolidator() -> Consolidator {
        Consolidator::new(Settings::default(), UnitNormalizer::default())
    }

    #[test]
    fn test_classification_rule() {
        let settings = Settings::default();
        let repeated = GeometryGroup::new(vec![
            Instance::new(1, Matrix4::identity()),
            Instance::new(2, Matrix4::identity()),
        ]);
        let voided = GeometryGroup::new(vec![Instance::new(3, Matrix4::identity()).with_voids(true)]);

        assert_eq!(classify(&repeated, Some(IFCWALL), &settings), Strategy::Instanced);
        assert_eq!(classify(&single(4), Some(IFCWINDOW), &settings), Strategy::Instanced);
        assert_eq!(classify(&voided, Some(IFCWALL), &settings), Strategy::Instanced);
        assert_eq!(classify(&single(4), Some(IFCWALL), &settings), Strategy::Merged);
        assert_eq!(classify(&single(4), None, &settings), Strategy::Merged);
    }

    #[test]
    fn test_empty_group_is_rejected() {
        let mut consolidator = consolidator();
        let result = consolidator.classify_and_emit(GeometryGroup::default(), &source());
        assert_eq!(result.unwrap_err(), Error::EmptyGroup);
    }

    #[test]
    fn test_instanced_bounding_follows_instance() {
        let source = source();
        let mut consolidator = consolidator();
        let shift = Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0));
        let group = GeometryGroup::new(vec![
            Instance::new(1, Matrix4::identity()),
            Instance::new(2, shift),
        ])
        .with_geometry(1, quad(0.0));

        let fragments = consolidator.classify_and_emit(group, &source).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].instance_count(), 2);

        let maps = consolidator.bounding_maps();
        let first = maps.opaque()[&1];
        let second = maps.opaque()[&2];
        assert_relative_eq!(second[12] - first[12], 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_transparent_material_goes_transparent() {
        let source = source();
        let mut consolidator = consolidator();
        let group = GeometryGroup::new(vec![
            Instance::new(1, Matrix4::identity()),
            Instance::new(2, Matrix4::identity()),
        ])
        .with_geometry(1, quad(0.0))
        .with_geometry(2, quad(2.0));

        let fragments = consolidator.classify_and_emit(group, &source).unwrap();
        assert_eq!(fragments[0].materials(), &[1, 2]);
        assert_eq!(fragments[0].draw_groups().len(), 2);
        assert!(consolidator.bounding_maps().transparent().contains_key(&1));
        assert!(consolidator.bounding_maps().opaque().is_empty());
    }

    #[test]
    fn test_empty_material_is_skipped() {
        let source = source();
        let mut consolidator = consolidator();
        let mut group = GeometryGroup::new(vec![
            Instance::new(1, Matrix4::identity()),
            Instance::new(2, Matrix4::identity()),
        ])
        .with_geometry(1, quad(0.0));
        group.geometries_by_material.insert(2, Vec::new());

        let fragments = consolidator.classify_and_emit(group, &source).unwrap();
        assert_eq!(fragments[0].materials(), &[1]);
        assert!(consolidator.bounding_maps().transparent().is_empty());
    }

    #[test]
    fn test_merge_candidates_wait_for_finalize() {
        let source = source();
        let mut consolidator = consolidator();

        for item in [5, 3, 9] {
            let group = single(item).with_geometry(1, quad(item as f64 * 2.0));
            assert!(consolidator.classify_and_emit(group, &source).unwrap().is_empty());
        }
        assert_eq!(consolidator.pending_buckets(), 1);

        let fragments = consolidator.finalize_merged().unwrap();
        assert_eq!(fragments.len(), 1);
        let merged = &fragments[0];
        assert_eq!(merged.instances()[0].ids.as_slice(), &[5, 3, 9]);
        assert_eq!(merged.block_ids().unwrap(), &[0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2]);
        assert_eq!(merged.mesh().vertex_count(), 12);
        assert_eq!(consolidator.pending_buckets(), 0);
        assert_eq!(consolidator.bounding_maps().opaque().len(), 3);
    }

    #[test]
    fn test_merged_bounding_uses_own_geometry() {
        let source = source();
        let mut consolidator = consolidator();
        consolidator
            .classify_and_emit(single(1).with_geometry(1, quad(0.0)), &source)
            .unwrap();
        consolidator
            .classify_and_emit(single(2).with_geometry(1, quad(100.0)), &source)
            .unwrap();
        consolidator.finalize_merged().unwrap();

        let entry = consolidator.bounding_maps().opaque()[&1];
        // Center of the first quad, not of the whole bucket
        assert_relative_eq!(entry[12], 0.5, epsilon = 1e-6);
        assert_relative_eq!(entry[13], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_buckets_split_by_category_and_floor() {
        let mut source = source();
        source.categories.insert(2, IFCSLAB);
        source.spatial.assign(3, 200);

        let mut consolidator = consolidator();
        for item in 1..=4 {
            let group = single(item).with_geometry(1, quad(0.0));
            consolidator.classify_and_emit(group, &source).unwrap();
        }
        let fragments = consolidator.finalize_merged().unwrap();
        assert_eq!(fragments.len(), 3);
        let total: usize = fragments.iter().map(|f| f.instances()[0].ids.len()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_missing_floor_is_reported() {
        let mut source = source();
        source.spatial.clean_up();
        let mut consolidator = consolidator();

        let group = single(7).with_geometry(1, quad(0.0));
        assert!(consolidator.classify_and_emit(group, &source).unwrap().is_empty());
        assert_eq!(consolidator.diagnostics(), &[Error::MissingFloor { item_id: 7 }]);
        assert_eq!(consolidator.pending_buckets(), 0);
        assert!(consolidator.bounding_maps().is_empty());
    }

    #[test]
    fn test_missing_category_is_reported() {
        let mut source = source();
        source.categories.remove(&8);
        let mut consolidator = consolidator();

        let group = single(8).with_geometry(1, quad(0.0));
        consolidator.classify_and_emit(group, &source).unwrap();
        assert_eq!(consolidator.diagnostics(), &[Error::MissingCategory { item_id: 8 }]);
    }

    #[test]
    fn test_unit_scale_applies_to_merged_geometry() {
        let source = source();
        let normalizer = UnitNormalizer::new(LengthUnit::parse("MILLIMETRE"));
        let mut consolidator = Consolidator::new(Settings::default(), normalizer);

        let group = single(1).with_geometry(1, quad(1000.0));
        consolidator.classify_and_emit(group, &source).unwrap();
        let fragments = consolidator.finalize_merged().unwrap();

        let (min, max) = fragments[0].mesh().bounds();
        assert_relative_eq!(min.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(max.x, 1.001, epsilon = 1e-6);
    }

    #[test]
    fn test_reset_clears_state() {
        let source = source();
        let mut consolidator = consolidator();
        consolidator
            .classify_and_emit(single(1).with_geometry(1, quad(0.0)), &source)
            .unwrap();
        consolidator.reset();
        assert_eq!(consolidator.pending_buckets(), 0);
        assert!(consolidator.finalize_merged().unwrap().is_empty());
    }
}
