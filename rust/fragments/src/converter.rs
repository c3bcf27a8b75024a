// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversion session
//!
//! A [`FragmentConverter`] is created per model with its settings and source
//! metadata, fed one [`GeometryGroup`] per logical element, and finished into a
//! [`FragmentGroup`]. Finishing (or [`FragmentConverter::reset`]) clears the
//! accumulated state so the session can convert the next model.

use crate::categories::category_table;
use crate::consolidator::Consolidator;
use crate::error::Result;
use crate::fragment::Fragment;
use crate::group::{FragmentGroup, VoxelGrid};
use crate::model::{GeometryGroup, SourceModel};
use crate::settings::Settings;
use crate::units::UnitNormalizer;

#[derive(Debug)]
pub struct FragmentConverter {
    source: SourceModel,
    consolidator: Consolidator,
    fragments: Vec<Fragment>,
}

impl FragmentConverter {
    pub fn new(settings: Settings, source: SourceModel) -> Self {
        let normalizer = if settings.bake_coordination {
            UnitNormalizer::with_transform(source.length_unit, source.coordination_matrix)
        } else {
            UnitNormalizer::new(source.length_unit)
        };
        tracing::debug!(
            unit_scale = source.length_unit.scale(),
            bake_coordination = settings.bake_coordination,
            "Fragment conversion started"
        );

        Self {
            source,
            consolidator: Consolidator::new(settings, normalizer),
            fragments: Vec::new(),
        }
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        self.consolidator.settings()
    }

    #[inline]
    pub fn source(&self) -> &SourceModel {
        &self.source
    }

    /// Fragments emitted so far (merged fragments appear on finish)
    #[inline]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Consolidate one element, returning how many fragments it produced
    pub fn push(&mut self, group: GeometryGroup) -> Result<usize> {
        let emitted = self.consolidator.classify_and_emit(group, &self.source)?;
        let count = emitted.len();
        self.fragments.extend(emitted);
        Ok(count)
    }

    /// Finalize merged buckets and assemble the output model
    pub fn finish(&mut self) -> Result<FragmentGroup> {
        let merged = self.consolidator.finalize_merged()?;
        let merged_count = merged.len();
        let instanced_count = self.fragments.len();

        let mut fragments = std::mem::take(&mut self.fragments);
        fragments.extend(merged);

        let voxel_size = self.consolidator.settings().voxel_size;
        let (bounding, bounds, diagnostics) = self.consolidator.take_results();
        let voxel_grid = VoxelGrid::new(bounds, voxel_size);

        tracing::info!(
            instanced = instanced_count,
            merged = merged_count,
            opaque = bounding.opaque().len(),
            transparent = bounding.transparent().len(),
            voxels = ?voxel_grid.dims,
            diagnostics = diagnostics.len(),
            "Fragment model assembled"
        );

        Ok(FragmentGroup {
            fragments,
            bounding,
            level_relationships: self.source.spatial.items_by_floor().clone(),
            floors_properties: self.source.spatial.floor_properties().clone(),
            all_types: category_table(),
            item_types: self.source.categories.clone(),
            coordination_matrix: self.source.coordination_matrix,
            voxel_grid,
            diagnostics,
        })
    }

    /// Discard everything accumulated since the last finish
    pub fn reset(&mut self) {
        self.fragments.clear();
        self.consolidator.reset();
    }
}

/// Convert a whole model in one call
pub fn convert<I>(settings: Settings, source: SourceModel, groups: I) -> Result<FragmentGroup>
where
    I: IntoIterator<Item = GeometryGroup>,
{
    let mut converter = FragmentConverter::new(settings, source);
    for group in groups {
        converter.push(group)?;
    }
    converter.finish()
}
