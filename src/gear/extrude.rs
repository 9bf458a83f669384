//! Linear extrusion of the planar outline into a prism.

use super::outline::Outline;
use crate::errors::{GearError, Result};
use crate::pipeline::{BuildStage, PipelineContext};
use nalgebra::Vector3;
use tracing::{debug, instrument};

const STAGE: BuildStage = BuildStage::Extruded;

/// Bottom (`z = 0`) and top (`z = h`) copies of the outline loop, index-aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extrusion {
    pub bottom: Vec<u32>,
    pub top: Vec<u32>,
}

/// Copy every loop vertex up by the gear height and add one side quad per loop edge.
///
/// For a counter-clockwise loop the quad `[b_i, b_i+1, t_i+1, t_i]` faces away from
/// the outline interior. The end caps are added later by the bore cutter.
#[instrument(skip(ctx, outline), fields(loop_len = outline.len(), height = ctx.geometry.height))]
pub fn extrude(ctx: &mut PipelineContext, outline: &Outline) -> Result<Extrusion> {
    let height = ctx.geometry.height;
    if !(height.is_finite() && height > 0.0) {
        return Err(GearError::invalid(
            STAGE,
            "height",
            format!("must be positive, got {height}"),
        ));
    }

    let vertices_before = ctx.mesh.vertex_count();
    let faces_before = ctx.mesh.face_count();
    let lift = Vector3::new(0.0, 0.0, height);

    let bottom = outline.indices.clone();
    let top: Vec<u32> = bottom
        .iter()
        .map(|&i| {
            let p = ctx.mesh.position(i);
            ctx.mesh.add_vertex(p + lift)
        })
        .collect();

    let n = bottom.len();
    for i in 0..n {
        let j = (i + 1) % n;
        ctx.mesh.add_face(vec![bottom[i], bottom[j], top[j], top[i]]);
    }
    ctx.mesh.sync_edges();

    GearError::check_count(
        STAGE,
        "extruded vertices",
        2 * vertices_before,
        ctx.mesh.vertex_count(),
    )?;
    GearError::check_count(STAGE, "side faces", faces_before + n, ctx.mesh.face_count())?;
    GearError::check_count(STAGE, "extruded edges", 3 * n, ctx.mesh.edge_count())?;

    ctx.selection.faces.extend(faces_before..ctx.mesh.face_count());
    debug!(side_faces = n, "outline extruded");
    Ok(Extrusion { bottom, top })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildSettings;
    use crate::gear::{involute, outline, tooth};
    use crate::params::GearParameters;

    fn extruded(params: GearParameters) -> (PipelineContext, Extrusion) {
        let mut ctx = PipelineContext::new(params, BuildSettings::default()).expect("valid");
        let flank = involute::sample_flank(&mut ctx).expect("sampled");
        let profile = tooth::build_profile(&mut ctx, &flank).expect("profile");
        let loop_ = outline::assemble_outline(&mut ctx, &profile).expect("outline");
        let solid = extrude(&mut ctx, &loop_).expect("extruded");
        (ctx, solid)
    }

    #[test]
    fn extrusion_doubles_vertices_and_adds_one_face_per_edge() {
        let (ctx, solid) = extruded(GearParameters::default());
        assert_eq!(ctx.mesh.vertex_count(), 2 * 666);
        assert_eq!(ctx.mesh.face_count(), 666);
        assert_eq!(solid.top.len(), solid.bottom.len());
        for (&b, &t) in solid.bottom.iter().zip(&solid.top) {
            let (pb, pt) = (ctx.mesh.position(b), ctx.mesh.position(t));
            assert_eq!(pb.z, 0.0);
            assert!((pt.z - 1.0).abs() < 1e-12);
            assert_eq!((pb.x, pb.y), (pt.x, pt.y));
        }
    }

    #[test]
    fn side_walls_form_an_open_band() {
        let (ctx, _) = extruded(GearParameters::new(1.5, 20, 2.0, 1.0));
        for face in ctx.mesh.faces() {
            let normal = ctx.mesh.face_area_vector(face);
            assert!(normal.z.abs() < 1e-9, "side faces are vertical");
        }
        // Open tube: the side walls alone form a single band with two boundary loops.
        let analysis = ctx.mesh.analyze_manifold();
        assert_eq!(analysis.boundary_edges, 2 * 20 * 37);
        assert!(analysis.consistent_orientation);
        assert_eq!(analysis.euler_characteristic, 0);
    }

    #[test]
    fn outward_normals_on_tip_faces() {
        let (ctx, solid) = extruded(GearParameters::default());
        // Face 10 joins tip A (loop index 10) with tip B (loop index 11).
        let face = &ctx.mesh.faces[10];
        assert_eq!(face.indices[0], solid.bottom[10]);
        let normal = ctx.mesh.face_normal(face).expect("non-degenerate");
        let tip_mid = nalgebra::center(
            &ctx.mesh.position(solid.bottom[10]),
            &ctx.mesh.position(solid.bottom[11]),
        );
        assert!(normal.dot(&tip_mid.coords) > 0.0, "tip face must face outward");
    }
}
