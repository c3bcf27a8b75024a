// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instanced edges
//!
//! One edge geometry per fragment, extracted from the fragment's local mesh and
//! drawn once for all of its instances. Each instance contributes a translation,
//! a rotation quaternion and a scale to three per-instance attributes; the vertex
//! stage applies them (see [`INSTANCE_TRS_WGSL`]) before the regular line
//! transform.
//!
//! Edge sets are regenerated wholesale: changing any instance transform means
//! calling [`InstancedEdges::generate`] again for the whole fragment.

use crate::error::{Error, Result};
use crate::fragment::{Fragment, FragmentId};
use ifc_fragments_geometry::decompose::DEFAULT_SHEAR_TOLERANCE;
use ifc_fragments_geometry::{check_no_shear, decompose, extract_edges, EdgeGeometry, Trs};
use nalgebra::{UnitQuaternion, Vector3};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// Default line colour (RGB)
pub const EDGE_COLOR: u32 = 0x555555;

/// Vertex-stage function applying one instance's translation, rotation and scale
pub const INSTANCE_TRS_WGSL: &str = r#"
struct InstanceTrs {
    @location(4) instT: vec3<f32>,
    @location(5) instR: vec4<f32>,
    @location(6) instS: vec3<f32>,
};

fn apply_instance_trs(position: vec3<f32>, inst: InstanceTrs) -> vec3<f32> {
    var p = position * inst.instS;
    let q = inst.instR;
    p = p + 2.0 * cross(q.xyz, cross(q.xyz, p) + q.w * p);
    return p + inst.instT;
}
"#;

/// A per-instance vertex attribute
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceAttribute {
    pub name: &'static str,
    /// Floats per instance
    pub item_size: usize,
    pub data: Vec<f32>,
}

impl InstanceAttribute {
    fn with_capacity(name: &'static str, item_size: usize, instances: usize) -> Self {
        Self {
            name,
            item_size,
            data: Vec::with_capacity(instances * item_size),
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.data.len() / self.item_size
    }

    #[inline]
    pub fn get(&self, instance: usize) -> Option<&[f32]> {
        let start = instance * self.item_size;
        self.data.get(start..start + self.item_size)
    }
}

/// Edge geometry of one fragment plus its per-instance transforms
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSet {
    fragment: FragmentId,
    geometry: EdgeGeometry,
    translations: InstanceAttribute,
    rotations: InstanceAttribute,
    scales: InstanceAttribute,
    visible: bool,
    color: u32,
}

impl EdgeSet {
    /// Extract the edges of `fragment` and decompose each instance transform
    pub fn build(fragment: &Fragment, threshold_deg: f64) -> Result<Self> {
        let geometry = extract_edges(fragment.mesh(), threshold_deg)?;

        let count = fragment.instance_count();
        let mut translations = InstanceAttribute::with_capacity("instT", 3, count);
        let mut rotations = InstanceAttribute::with_capacity("instR", 4, count);
        let mut scales = InstanceAttribute::with_capacity("instS", 3, count);

        for (index, instance) in fragment.instances().iter().enumerate() {
            if let Err(error) = check_no_shear(&instance.transform, DEFAULT_SHEAR_TOLERANCE) {
                tracing::warn!(
                    fragment = fragment.id(),
                    instance = index,
                    %error,
                    "Sheared instance transform, edges use the nearest rotation"
                );
            }

            let trs = decompose(&instance.transform);
            let q = trs.rotation.quaternion();
            translations.data.extend(trs.translation.iter().map(|&v| v as f32));
            rotations
                .data
                .extend_from_slice(&[q.i as f32, q.j as f32, q.k as f32, q.w as f32]);
            scales.data.extend(trs.scale.iter().map(|&v| v as f32));
        }

        Ok(Self {
            fragment: fragment.id(),
            geometry,
            translations,
            rotations,
            scales,
            visible: false,
            color: EDGE_COLOR,
        })
    }

    #[inline]
    pub fn fragment(&self) -> FragmentId {
        self.fragment
    }

    #[inline]
    pub fn geometry(&self) -> &EdgeGeometry {
        &self.geometry
    }

    #[inline]
    pub fn translations(&self) -> &InstanceAttribute {
        &self.translations
    }

    #[inline]
    pub fn rotations(&self) -> &InstanceAttribute {
        &self.rotations
    }

    #[inline]
    pub fn scales(&self) -> &InstanceAttribute {
        &self.scales
    }

    /// The three instance attributes in binding order
    pub fn attributes(&self) -> [&InstanceAttribute; 3] {
        [&self.translations, &self.rotations, &self.scales]
    }

    #[inline]
    pub fn instance_count(&self) -> usize {
        self.translations.count()
    }

    /// Translation, rotation and scale of one instance, as uploaded
    pub fn instance_trs(&self, instance: usize) -> Option<Trs> {
        let t = self.translations.get(instance)?;
        let r = self.rotations.get(instance)?;
        let s = self.scales.get(instance)?;
        Some(Trs {
            translation: Vector3::new(t[0] as f64, t[1] as f64, t[2] as f64),
            rotation: UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
                r[3] as f64,
                r[0] as f64,
                r[1] as f64,
                r[2] as f64,
            )),
            scale: Vector3::new(s[0] as f64, s[1] as f64, s[2] as f64),
        })
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[inline]
    pub fn color(&self) -> u32 {
        self.color
    }

    fn release(&mut self) {
        self.geometry = EdgeGeometry::default();
        self.translations.data = Vec::new();
        self.rotations.data = Vec::new();
        self.scales.data = Vec::new();
    }
}

/// Edge sets keyed by fragment id
#[derive(Debug, Clone)]
pub struct InstancedEdges {
    sets: FxHashMap<FragmentId, EdgeSet>,
    threshold_deg: f64,
}

impl InstancedEdges {
    pub fn new(threshold_deg: f64) -> Self {
        Self {
            sets: FxHashMap::default(),
            threshold_deg,
        }
    }

    #[inline]
    pub fn threshold_deg(&self) -> f64 {
        self.threshold_deg
    }

    /// Build the edge set of `fragment`, replacing (and releasing) any previous one.
    ///
    /// The new set starts hidden.
    pub fn generate(&mut self, fragment: &Fragment) -> Result<&EdgeSet> {
        let set = EdgeSet::build(fragment, self.threshold_deg)?;
        Ok(self.insert(set))
    }

    /// Build edge sets for many fragments in parallel, then store them.
    ///
    /// Fragment ids must be distinct. Nothing is stored if any extraction fails.
    pub fn generate_all(&mut self, fragments: &[Fragment]) -> Result<usize> {
        let threshold = self.threshold_deg;
        let sets = fragments
            .par_iter()
            .map(|fragment| EdgeSet::build(fragment, threshold))
            .collect::<Result<Vec<_>>>()?;

        let count = sets.len();
        for set in sets {
            self.insert(set);
        }
        tracing::debug!(count, "Generated instanced edges");
        Ok(count)
    }

    fn insert(&mut self, set: EdgeSet) -> &EdgeSet {
        let id = set.fragment;
        if let Some(mut previous) = self.sets.remove(&id) {
            previous.release();
        }
        self.sets.entry(id).or_insert(set)
    }

    #[inline]
    pub fn get(&self, fragment: FragmentId) -> Option<&EdgeSet> {
        self.sets.get(&fragment)
    }

    pub fn set_visible(&mut self, fragment: FragmentId, visible: bool) -> Result<()> {
        let set = self
            .sets
            .get_mut(&fragment)
            .ok_or(Error::FragmentNotFound(fragment))?;
        set.visible = visible;
        Ok(())
    }

    /// Release and drop the edge set of one fragment
    pub fn remove(&mut self, fragment: FragmentId) -> bool {
        match self.sets.remove(&fragment) {
            Some(mut set) => {
                set.release();
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Release every edge set
    pub fn dispose(&mut self) {
        for set in self.sets.values_mut() {
            set.release();
        }
        self.sets.clear();
    }
}

impl Default for InstancedEdges {
    fn default() -> Self {
        Self::new(ifc_fragments_geometry::DEFAULT_THRESHOLD_DEG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::FragmentInstance;
    use approx::assert_relative_eq;
    use ifc_fragments_geometry::Mesh;
    use nalgebra::{Matrix4, Point3};
    use smallvec::smallvec;
    use std::f64::consts::FRAC_PI_2;

    fn triangle() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Point3::new(0.0, 0.0, 0.0), Vector3::z());
        mesh.add_vertex(Point3::new(1.0, 0.0, 0.0), Vector3::z());
        mesh.add_vertex(Point3::new(0.0, 1.0, 0.0), Vector3::z());
        mesh.add_triangle(0, 1, 2);
        mesh
    }

    fn fragment(id: FragmentId, transforms: &[Matrix4<f64>]) -> Fragment {
        let instances = transforms
            .iter()
            .enumerate()
            .map(|(i, t)| FragmentInstance {
                ids: smallvec![i as u32 + 1],
                transform: *t,
            })
            .collect();
        Fragment::instanced(id, triangle(), Vec::new(), vec![1], instances)
    }

    #[test]
    fn test_one_entry_per_instance() {
        let transforms = [
            Matrix4::identity(),
            Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0)),
            Matrix4::new_scaling(2.0),
        ];
        let mut edges = InstancedEdges::default();
        let set = edges.generate(&fragment(0, &transforms)).unwrap();

        assert_eq!(set.instance_count(), 3);
        assert_eq!(set.translations().data.len(), 9);
        assert_eq!(set.rotations().data.len(), 12);
        assert_eq!(set.scales().data.len(), 9);
        assert_eq!(set.geometry().segment_count(), 3);
        assert!(!set.is_visible());
        assert_eq!(set.color(), EDGE_COLOR);
        assert_eq!(set.translations().get(1), Some(&[1.0f32, 2.0, 3.0][..]));
    }

    #[test]
    fn test_regenerate_replaces() {
        let mut edges = InstancedEdges::default();
        edges.generate(&fragment(4, &[Matrix4::identity()])).unwrap();
        edges.set_visible(4, true).unwrap();

        let two = [Matrix4::identity(), Matrix4::identity()];
        let set = edges.generate(&fragment(4, &two)).unwrap();
        assert_eq!(set.instance_count(), 2);
        assert!(!set.is_visible());
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn test_uploaded_trs_reproduces_instance() {
        let transform = Matrix4::new_translation(&Vector3::new(4.0, 0.0, 1.0))
            * Matrix4::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2)
            * Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 1.0, 1.0));
        let mut edges = InstancedEdges::default();
        let set = edges.generate(&fragment(0, &[transform])).unwrap();
        let trs = set.instance_trs(0).unwrap();

        let p = Point3::new(1.0, 0.5, 0.0);
        assert_relative_eq!(trs.apply(&p), transform.transform_point(&p), epsilon = 1e-5);
    }

    #[test]
    fn test_generate_all_and_dispose() {
        let fragments: Vec<Fragment> = (0..8)
            .map(|id| fragment(id, &[Matrix4::identity(); 2]))
            .collect();
        let mut edges = InstancedEdges::new(30.0);
        assert_eq!(edges.generate_all(&fragments).unwrap(), 8);
        assert_eq!(edges.len(), 8);
        assert!(edges.get(7).is_some());

        assert!(edges.remove(7));
        assert!(!edges.remove(7));
        edges.dispose();
        assert!(edges.is_empty());
    }

    #[test]
    fn test_visibility_of_unknown_fragment() {
        let mut edges = InstancedEdges::default();
        assert_eq!(edges.set_visible(3, true), Err(Error::FragmentNotFound(3)));
    }
}
