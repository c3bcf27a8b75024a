// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC-Fragments
//!
//! Turns the per-instance, per-material meshes produced by an IFC geometry
//! parser into render fragments.
//!
//! ## Overview
//!
//! - **Consolidation**: repeated elements, always-instanced categories and voided
//!   elements become GPU-instanced fragments; the rest are merged into one buffer
//!   per category, floor and material set, with per-vertex block ids
//! - **Bounding boxes**: every item gets an approximate minimum-volume oriented
//!   box, split into opaque and transparent/voided maps
//! - **Instanced edges**: one edge geometry per fragment, replicated across
//!   instances through per-instance translation, rotation and scale attributes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ifc_fragments::{FragmentConverter, InstancedEdges, Settings};
//!
//! let mut converter = FragmentConverter::new(Settings::from_env(), source);
//! for group in groups {
//!     converter.push(group)?;
//! }
//! let model = converter.finish()?;
//!
//! let mut edges = InstancedEdges::new(converter.settings().edge_threshold_deg);
//! edges.generate_all(model.fragments())?;
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization of meshes, fragments and model tables

pub mod categories;
pub mod consolidator;
pub mod converter;
pub mod edges;
pub mod error;
pub mod fragment;
pub mod group;
pub mod model;
pub mod settings;
pub mod spatial;
pub mod units;

pub use consolidator::{classify, Consolidator, Strategy};
pub use converter::{convert, FragmentConverter};
pub use edges::{EdgeSet, InstanceAttribute, InstancedEdges, EDGE_COLOR, INSTANCE_TRS_WGSL};
pub use error::{Error, Result};
pub use fragment::{
    BoundingEntry, BoundingMaps, BoundingPartition, Fragment, FragmentId, FragmentInstance,
    FragmentKind,
};
pub use group::{FragmentGroup, ModelBounds, VoxelGrid};
pub use model::{
    CategoryCode, FloorId, GeometryGroup, Instance, ItemId, Material, MaterialId, MaterialList,
    SourceModel,
};
pub use settings::Settings;
pub use spatial::{FloorProperties, SpatialStructure};
pub use units::{LengthUnit, UnitNormalizer};

pub use ifc_fragments_geometry as geometry;
