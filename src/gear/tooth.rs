//! One tooth boundary from a sampled flank.

use super::rotation_z;
use crate::errors::{GearError, Result};
use crate::float_types::Real;
use crate::pipeline::{BuildStage, PipelineContext};
use nalgebra::Point3;
use tracing::{debug, instrument};

const STAGE: BuildStage = BuildStage::ProfileBuilt;

/// Mirror points across the x axis (negate `y`).
pub fn mirror_flank(points: &[Point3<Real>]) -> Vec<Point3<Real>> {
    points.iter().map(|p| Point3::new(p.x, -p.y, p.z)).collect()
}

/// The opposite flank of a tooth: `flank` mirrored across the x axis, then rotated
/// about the gear axis by `tooth_angle` so both roots bound the tooth at the base
/// circle. Keeps root-to-tip order.
pub fn opposite_flank(flank: &[Point3<Real>], tooth_angle: Real) -> Vec<Point3<Real>> {
    let rotation = rotation_z(tooth_angle);
    mirror_flank(flank)
        .into_iter()
        .map(|p| rotation * p)
        .collect()
}

/// One tooth boundary as an open polyline:
/// `root A, ..., tip A, tip B, ..., root B`, counter-clockwise around the gear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToothProfile {
    pub indices: Vec<u32>,
    /// Vertices per flank (`steps + 1`)
    pub flank_len: usize,
}

impl ToothProfile {
    pub fn root_a(&self) -> u32 {
        self.indices[0]
    }

    pub fn tip_a(&self) -> u32 {
        self.indices[self.flank_len - 1]
    }

    pub fn tip_b(&self) -> u32 {
        self.indices[self.flank_len]
    }

    pub fn root_b(&self) -> u32 {
        self.indices[self.indices.len() - 1]
    }
}

/// Add the opposite flank and the tip closure edge.
#[instrument(skip(ctx, flank), fields(flank_len = flank.len()))]
pub fn build_profile(ctx: &mut PipelineContext, flank: &[u32]) -> Result<ToothProfile> {
    let flank_len = flank.len();
    if flank_len < 2 {
        return Err(GearError::inconsistent(STAGE, "flank samples", 2, flank_len));
    }
    let points: Vec<Point3<Real>> = flank.iter().map(|&i| ctx.mesh.position(i)).collect();

    // Tip to root, so the profile reads as one counter-clockwise polyline.
    let opposite: Vec<Point3<Real>> = opposite_flank(&points, ctx.geometry.tooth_angle)
        .into_iter()
        .rev()
        .collect();
    let opposite = ctx.mesh.add_vertices(opposite);
    ctx.mesh.add_polyline(&opposite);

    let tip_a = flank[flank_len - 1];
    let tip_b = opposite[0];
    ctx.mesh.add_edge(tip_a, tip_b);

    let mut indices = flank.to_vec();
    indices.extend_from_slice(&opposite);
    GearError::check_count(
        STAGE,
        "tooth profile vertices",
        ctx.settings.tooth_vertex_count(),
        indices.len(),
    )?;
    GearError::check_count(
        STAGE,
        "tooth profile edges",
        ctx.settings.tooth_vertex_count() - 1,
        ctx.mesh.edge_count(),
    )?;

    ctx.selection.edges.push([tip_a, tip_b]);
    debug!(
        vertices = indices.len(),
        tip_width = ctx.mesh.edge_length([tip_a, tip_b]),
        "tooth profile built"
    );
    Ok(ToothProfile { indices, flank_len })
}
