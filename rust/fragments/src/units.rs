// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Length units and instance transform normalization
//!
//! Source models declare their length unit as an SI unit with an optional
//! prefix (`.MILLI.` `.METRE.`) or as a conversion-based unit (`FOOT`). The
//! normalizer turns that into one scale factor and composes it, together with an
//! optional global transform, into instance transforms.

use nalgebra::{Matrix4, Vector3};

/// SI Prefix multipliers as defined in the IFC specification
#[inline]
pub fn get_si_prefix_multiplier(prefix: &str) -> f64 {
    match prefix {
        "ATTO" => 1e-18,
        "FEMTO" => 1e-15,
        "PICO" => 1e-12,
        "NANO" => 1e-9,
        "MICRO" => 1e-6,
        "MILLI" => 1e-3,
        "CENTI" => 1e-2,
        "DECI" => 1e-1,
        "DECA" => 1e1,
        "HECTO" => 1e2,
        "KILO" => 1e3,
        "MEGA" => 1e6,
        "GIGA" => 1e9,
        "TERA" => 1e12,
        "PETA" => 1e15,
        "EXA" => 1e18,
        _ => 1.0, // No prefix or unknown = base unit (meters)
    }
}

/// Metres per conversion-based length unit
#[inline]
pub fn get_conversion_unit_scale(name: &str) -> Option<f64> {
    match name {
        "INCH" => Some(0.0254),
        "FOOT" => Some(0.3048),
        "YARD" => Some(0.9144),
        "MILE" => Some(1609.344),
        _ => None,
    }
}

/// Declared length unit of a source model, as metres per model unit
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LengthUnit {
    scale: f64,
}

impl LengthUnit {
    pub const METRE: LengthUnit = LengthUnit { scale: 1.0 };

    /// Unit with an explicit metres-per-unit factor
    pub fn from_scale(scale: f64) -> Self {
        Self { scale }
    }

    /// SI metre with an optional prefix (`None` = metre)
    pub fn from_si_prefix(prefix: Option<&str>) -> Self {
        Self {
            scale: prefix.map_or(1.0, get_si_prefix_multiplier),
        }
    }

    /// Parse a unit name such as `MILLIMETRE`, `.CENTI.`, `FOOT` or `metre`.
    ///
    /// Unknown names fall back to metres.
    pub fn parse(name: &str) -> Self {
        let name = name.trim().trim_matches('.').to_ascii_uppercase();

        if let Some(scale) = get_conversion_unit_scale(&name) {
            return Self { scale };
        }

        let prefix = name
            .strip_suffix("METRE")
            .or_else(|| name.strip_suffix("METER"))
            .unwrap_or(name.as_str());

        Self::from_si_prefix(if prefix.is_empty() { None } else { Some(prefix) })
    }

    /// Metres per model unit
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl Default for LengthUnit {
    fn default() -> Self {
        Self::METRE
    }
}

/// Applies the unit scale (and an optional global transform) to instance transforms.
///
/// [`UnitNormalizer::apply`] is not idempotent: every transform must go through it
/// exactly once. The consolidator takes ownership of incoming instances and
/// normalizes each one as it is consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitNormalizer {
    unit: LengthUnit,
    transform: Matrix4<f64>,
    composed: Matrix4<f64>,
}

impl UnitNormalizer {
    /// Normalizer that only rescales
    pub fn new(unit: LengthUnit) -> Self {
        Self::with_transform(unit, Matrix4::identity())
    }

    /// Normalizer that rescales and then applies `transform`
    pub fn with_transform(unit: LengthUnit, transform: Matrix4<f64>) -> Self {
        let scaling = Matrix4::new_nonuniform_scaling(&Vector3::repeat(unit.scale()));
        Self {
            unit,
            transform,
            composed: transform * scaling,
        }
    }

    #[inline]
    pub fn unit(&self) -> LengthUnit {
        self.unit
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.unit.scale()
    }

    #[inline]
    pub fn transform(&self) -> &Matrix4<f64> {
        &self.transform
    }

    /// Compose the normalization into `matrix` in place
    #[inline]
    pub fn apply(&self, matrix: &mut Matrix4<f64>) {
        *matrix = self.composed * *matrix;
    }
}

impl Default for UnitNormalizer {
    fn default() -> Self {
        Self::new(LengthUnit::METRE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_si_prefix_multipliers() {
        assert_eq!(get_si_prefix_multiplier("MILLI"), 0.001);
        assert_eq!(get_si_prefix_multiplier("CENTI"), 0.01);
        assert_eq!(get_si_prefix_multiplier("KILO"), 1000.0);
        assert_eq!(get_si_prefix_multiplier(""), 1.0);
        assert_eq!(get_si_prefix_multiplier("UNKNOWN"), 1.0);
    }

    #[test]
    fn test_parse_unit_names() {
        assert_eq!(LengthUnit::parse("MILLIMETRE").scale(), 0.001);
        assert_eq!(LengthUnit::parse(".CENTI.").scale(), 0.01);
        assert_eq!(LengthUnit::parse("metre").scale(), 1.0);
        assert_eq!(LengthUnit::parse("FOOT").scale(), 0.3048);
        assert_eq!(LengthUnit::parse("furlong").scale(), 1.0);
    }

    #[test]
    fn test_apply_scales_translation_and_geometry() {
        let normalizer = UnitNormalizer::new(LengthUnit::parse("MILLIMETRE"));
        let mut m = Matrix4::new_translation(&Vector3::new(1000.0, 0.0, 2500.0));
        normalizer.apply(&mut m);

        let p = m.transform_point(&Point3::new(500.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(1.5, 0.0, 2.5), epsilon = 1e-12);
    }

    #[test]
    fn test_apply_twice_compounds() {
        let normalizer = UnitNormalizer::new(LengthUnit::from_scale(0.5));
        let mut m = Matrix4::identity();
        normalizer.apply(&mut m);
        normalizer.apply(&mut m);
        assert_relative_eq!(m[(0, 0)], 0.25);
    }

    #[test]
    fn test_global_transform_applies_after_scale() {
        let shift = Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0));
        let normalizer = UnitNormalizer::with_transform(LengthUnit::from_scale(0.1), shift);
        let mut m = Matrix4::new_translation(&Vector3::new(20.0, 0.0, 0.0));
        normalizer.apply(&mut m);
        assert_relative_eq!(m[(0, 3)], 12.0, epsilon = 1e-12);
    }
}
