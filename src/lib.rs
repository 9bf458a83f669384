//! Procedural **involute spur gears** as closed, indexed polygon meshes.
//!
//! A gear is described by its module, tooth count, face width and bore radius
//! ([`GearParameters`]). [`MeshPipeline`] turns those into a watertight solid by running a
//! fixed sequence of stages over one shared [`Mesh`]:
//!
//! 1. sample one involute flank from the base circle to the tip circle
//! 2. mirror it into a single tooth
//! 3. close each tooth with a root fillet and array the unit around the axis
//! 4. extrude the outline to the face width
//! 5. cap both ends and cut the through-bore
//! 6. round the tooth tip edges
//!
//! Every stage checks the vertex, edge and face counts it expects and the final mesh is
//! verified to be a closed, consistently wound solid of genus 1.
//!
//! ```no_run
//! use gearmesh::{GearParameters, build_gear};
//!
//! let mesh = build_gear(&GearParameters::default())?;
//! assert!(mesh.analyze_manifold().is_closed_solid());
//! # Ok::<(), gearmesh::GearError>(())
//! ```
//!
//! # Features
//! #### Default
//! - **f64**: use f64 as Real
//!
//! #### Optional
//! - **f32**: use f32 as Real, this conflicts with f64
//! - **parallel**: build batches of gears on the rayon thread pool

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod aabb;
pub mod config;
pub mod errors;
pub mod float_types;
pub mod gear;
pub mod mesh;
pub mod params;
pub mod pipeline;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use aabb::Aabb;
pub use config::{BevelSettings, BuildSettings};
pub use errors::{GearError, Result};
pub use gear::bevel::BevelOutcome;
pub use mesh::manifold::ManifoldAnalysis;
pub use mesh::{Face, Mesh, MeshVertex};
pub use params::{GearGeometry, GearParameters};
pub use pipeline::{BuildReport, BuildStage, Checkpoint, MeshPipeline, build_gear};
