//! Involute flank sampling.

use crate::errors::{GearError, Result};
use crate::float_types::Real;
use crate::params::MIN_TEETH;
use crate::pipeline::{BuildStage, PipelineContext};
use nalgebra::Point3;
use tracing::{debug, instrument};

const STAGE: BuildStage = BuildStage::Sampling;

/// Point of the involute of a circle of radius `base_radius` at roll angle `u`.
#[inline]
pub fn involute_point(base_radius: Real, u: Real) -> Point3<Real> {
    let (sin, cos) = u.sin_cos();
    Point3::new(
        base_radius * (cos + u * sin),
        base_radius * (sin - u * cos),
        0.0,
    )
}

/// Roll angle at which the involute reaches `radius`.
#[inline]
pub fn roll_angle_at_radius(radius: Real, base_radius: Real) -> Real {
    ((radius / base_radius).powi(2) - 1.0).max(0.0).sqrt()
}

/// Sample one flank from the base circle to the tip circle with `steps` uniform
/// roll-angle steps. Returns `steps + 1` points in the `z = 0` plane, the first at
/// `(base_radius, 0, 0)` and the last on the tip circle.
pub fn sample_involute(
    base_radius: Real,
    tip_radius: Real,
    steps: usize,
) -> Result<Vec<Point3<Real>>> {
    if !(base_radius.is_finite() && base_radius > 0.0) {
        return Err(GearError::invalid(
            STAGE,
            "base_radius",
            format!("must be positive, got {base_radius}"),
        ));
    }
    if !(tip_radius.is_finite() && tip_radius > base_radius) {
        return Err(GearError::invalid(
            STAGE,
            "tip_radius",
            format!("must exceed the base radius {base_radius}, got {tip_radius}"),
        ));
    }
    if steps == 0 {
        return Err(GearError::invalid(STAGE, "flank_steps", "must be at least 1"));
    }

    let u_max = roll_angle_at_radius(tip_radius, base_radius);
    let points: Vec<Point3<Real>> = (0..=steps)
        .map(|i| involute_point(base_radius, u_max * i as Real / steps as Real))
        .collect();
    Ok(points)
}

/// Sample the first flank of tooth 0 into the mesh as an open polyline.
/// Returns the flank's vertex indices from root to tip.
#[instrument(skip(ctx), fields(steps = ctx.settings.flank_steps))]
pub fn sample_flank(ctx: &mut PipelineContext) -> Result<Vec<u32>> {
    if ctx.geometry.teeth < MIN_TEETH {
        return Err(GearError::invalid(
            STAGE,
            "teeth",
            format!("involute flanks need at least {MIN_TEETH} teeth"),
        ));
    }
    let points = sample_involute(
        ctx.geometry.base_radius,
        ctx.geometry.tip_radius,
        ctx.settings.flank_steps,
    )?;
    GearError::check_count(STAGE, "flank samples", ctx.settings.flank_steps + 1, points.len())?;

    let flank = ctx.mesh.add_vertices(points);
    ctx.mesh.add_polyline(&flank);
    ctx.selection.vertices.extend_from_slice(&flank);
    debug!(
        samples = flank.len(),
        base_radius = ctx.geometry.base_radius,
        tip_radius = ctx.geometry.tip_radius,
        "flank sampled"
    );
    Ok(flank)
}
