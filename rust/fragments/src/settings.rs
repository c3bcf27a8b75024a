// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversion settings, optionally loaded from environment variables.

use crate::categories::{IFCDOOR, IFCFURNISHINGELEMENT, IFCWINDOW};
use ifc_fragments_geometry::DEFAULT_THRESHOLD_DEG;
use rustc_hash::FxHashSet;

/// Fragment conversion settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Settings {
    /// Category codes that are always instanced, even for single occurrences.
    pub instanced_categories: FxHashSet<u32>,
    /// Edge length of the coarse voxel grid summarizing the model extent.
    pub voxel_size: f64,
    /// Crease angle in degrees for edge generation.
    pub edge_threshold_deg: f64,
    /// Premultiply the coordination matrix into every instance transform.
    pub bake_coordination: bool,
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    ///
    /// - `FRAGMENTS_INSTANCED_CATEGORIES`: comma-separated category codes
    /// - `FRAGMENTS_VOXEL_SIZE`
    /// - `FRAGMENTS_EDGE_THRESHOLD`
    /// - `FRAGMENTS_BAKE_COORDINATION`: `true`/`false`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            instanced_categories: lookup("FRAGMENTS_INSTANCED_CATEGORIES")
                .map(|list| {
                    list.split(',')
                        .filter_map(|s| s.trim().parse::<u32>().ok())
                        .collect()
                })
                .unwrap_or(defaults.instanced_categories),
            voxel_size: lookup("FRAGMENTS_VOXEL_SIZE")
                .and_then(|v| v.parse().ok())
                .filter(|v: &f64| *v > 0.0)
                .unwrap_or(defaults.voxel_size),
            edge_threshold_deg: lookup("FRAGMENTS_EDGE_THRESHOLD")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.edge_threshold_deg),
            bake_coordination: lookup("FRAGMENTS_BAKE_COORDINATION")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bake_coordination),
        }
    }

    /// Whether items of `category` bypass merging
    #[inline]
    pub fn is_instanced_category(&self, category: u32) -> bool {
        self.instanced_categories.contains(&category)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            instanced_categories: [IFCFURNISHINGELEMENT, IFCWINDOW, IFCDOOR]
                .into_iter()
                .collect(),
            voxel_size: 1.0,
            edge_threshold_deg: DEFAULT_THRESHOLD_DEG,
            bake_coordination: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: FxHashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.is_instanced_category(IFCWINDOW));
        assert_eq!(settings.edge_threshold_deg, 80.0);
        assert!(!settings.bake_coordination);
    }

    #[test]
    fn test_lookup_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("FRAGMENTS_INSTANCED_CATEGORIES", "1, 2,x"),
            ("FRAGMENTS_VOXEL_SIZE", "2.5"),
            ("FRAGMENTS_BAKE_COORDINATION", "true"),
        ]));
        assert_eq!(settings.instanced_categories.len(), 2);
        assert!(settings.is_instanced_category(2));
        assert_eq!(settings.voxel_size, 2.5);
        assert!(settings.bake_coordination);
        assert_eq!(settings.edge_threshold_deg, 80.0);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("FRAGMENTS_VOXEL_SIZE", "-1"),
            ("FRAGMENTS_EDGE_THRESHOLD", "steep"),
        ]));
        assert_eq!(settings.voxel_size, 1.0);
        assert_eq!(settings.edge_threshold_deg, 80.0);
    }
}
