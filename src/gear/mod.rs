//! The construction stages of a spur gear solid.
//!
//! Each stage reads what it needs from the [`PipelineContext`](crate::pipeline::PipelineContext),
//! mutates the shared mesh and returns a small handle (index lists) that the next
//! stage consumes.

pub mod bevel;
pub mod bore;
pub mod extrude;
pub mod involute;
pub mod outline;
pub mod tooth;

use crate::float_types::Real;
use nalgebra::{Point3, Rotation3, Vector3};

/// Rotation by `angle` radians about the gear axis.
#[inline]
pub(crate) fn rotation_z(angle: Real) -> Rotation3<Real> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), angle)
}

/// Polar angle of a point around the gear axis, in `(-π, π]`.
#[inline]
pub(crate) fn polar_angle(p: &Point3<Real>) -> Real {
    p.y.atan2(p.x)
}
