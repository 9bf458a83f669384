//! Rounded bevel of the tooth tip edges.
//!
//! The tip edges are found by length: every edge as long as a tip chord (an edge on
//! the tip circle lying in an end cap) belongs to the class. Each class edge is then
//! replaced by a strip of quads following a quarter-elliptic profile between its two
//! faces, and each endpoint by the profile vertices, spliced into the third face
//! meeting at that corner.

use crate::errors::{GearError, Result};
use crate::float_types::{FRAC_PI_2, Real};
use crate::mesh::{Mesh, edge_key};
use crate::pipeline::{BuildStage, PipelineContext};
use nalgebra::{Point3, Vector3};
use tracing::{debug, instrument, warn};

const STAGE: BuildStage = BuildStage::Beveled;

/// Relative length difference under which two edges count as the same class.
pub const LENGTH_MATCH: Real = 1e-6;

/// Slid vertices stop this fraction of the way to the middle of their edge.
const OVERLAP_MARGIN: Real = 0.95;

/// Result of the bevel stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BevelOutcome {
    pub edges: usize,
    /// Offset actually used
    pub offset: Real,
    pub clamped: bool,
}

/// Edges with both endpoints on the tip circle and at the same height.
pub fn tip_edges(mesh: &Mesh, tip_radius: Real, tolerance: Real) -> Vec<[u32; 2]> {
    mesh.edges
        .iter()
        .copied()
        .filter(|&[a, b]| {
            let (va, vb) = (&mesh.vertices[a as usize], &mesh.vertices[b as usize]);
            (va.radial_distance() - tip_radius).abs() <= tolerance
                && (vb.radial_distance() - tip_radius).abs() <= tolerance
                && (va.pos.z - vb.pos.z).abs() <= tolerance
        })
        .collect()
}

/// Every edge whose length matches `length` to a relative [`LENGTH_MATCH`].
pub fn edges_of_length(mesh: &Mesh, length: Real) -> Vec<[u32; 2]> {
    let window = LENGTH_MATCH * length.max(1.0);
    mesh.edges
        .iter()
        .copied()
        .filter(|&edge| (mesh.edge_length(edge) - length).abs() <= window)
        .collect()
}

/// One endpoint of a bevelled edge.
#[derive(Debug, Clone, Copy)]
struct Corner {
    vertex: u32,
    /// Neighbour of `vertex` in the first face, other than the opposite endpoint
    w1: u32,
    /// Neighbour of `vertex` in the second face
    w2: u32,
    /// The third face meeting at `vertex`
    f3: usize,
}

/// The two faces on `edge`, in face order.
fn edge_faces(mesh: &Mesh, [u, v]: [u32; 2]) -> Result<(usize, usize)> {
    let faces: Vec<usize> = mesh
        .faces
        .iter()
        .enumerate()
        .filter(|(_, f)| f.edge_direction(u, v).is_some())
        .map(|(i, _)| i)
        .collect();
    match faces.as_slice() {
        &[f1, f2] => Ok((f1, f2)),
        other => Err(GearError::inconsistent(STAGE, "faces on bevel edge", 2, other.len())),
    }
}

fn other_neighbor(mesh: &Mesh, face: usize, vertex: u32, exclude: u32) -> Result<u32> {
    let (prev, next) = mesh.faces[face]
        .neighbors_of(vertex)
        .ok_or_else(|| GearError::degenerate(STAGE, "bevel corner missing from its face"))?;
    Ok(if prev == exclude { next } else { prev })
}

fn corner(mesh: &Mesh, vertex: u32, opposite: u32, f1: usize, f2: usize) -> Result<Corner> {
    let around = mesh.faces_around(vertex);
    GearError::check_count(STAGE, "faces at bevel corner", 3, around.len())?;
    let f3 = around
        .into_iter()
        .find(|&f| f != f1 && f != f2)
        .ok_or_else(|| GearError::degenerate(STAGE, "bevel corner has no third face"))?;
    Ok(Corner {
        vertex,
        w1: other_neighbor(mesh, f1, vertex, opposite)?,
        w2: other_neighbor(mesh, f2, vertex, opposite)?,
        f3,
    })
}

/// Direction from `from` toward `to` and the sine of its angle to `edge_dir`.
fn slide_direction(
    from: Point3<Real>,
    to: Point3<Real>,
    edge_dir: &Vector3<Real>,
) -> (Vector3<Real>, Real) {
    let dir = (to - from).normalize();
    (dir, edge_dir.cross(&dir).norm())
}

/// Largest offset that keeps the corner's slid vertices short of the middle of the
/// edges they slide along.
fn corner_offset_limit(mesh: &Mesh, corner: &Corner, opposite: u32) -> Real {
    let u = mesh.position(corner.vertex);
    let edge_dir = (mesh.position(opposite) - u).normalize();
    [corner.w1, corner.w2]
        .into_iter()
        .map(|w| {
            let target = mesh.position(w);
            let (_, sin) = slide_direction(u, target, &edge_dir);
            0.5 * (target - u).norm() * sin * OVERLAP_MARGIN
        })
        .fold(Real::INFINITY, Real::min)
}

/// Quarter-elliptic profile from `p1` to `p2`, bulging toward the original corner `u`.
/// Returns `segments + 1` points.
pub fn bevel_profile(
    u: Point3<Real>,
    p1: Point3<Real>,
    p2: Point3<Real>,
    segments: usize,
) -> Vec<Point3<Real>> {
    let center = p1 + (p2 - u);
    (0..=segments)
        .map(|k| {
            if k == 0 {
                return p1;
            }
            if k == segments {
                return p2;
            }
            let t = FRAC_PI_2 * k as Real / segments as Real;
            center + (p1 - center) * t.cos() + (p2 - center) * t.sin()
        })
        .collect()
}

/// Profile vertex indices for one corner: the slide positions along both faces and
/// the arc between them.
fn add_corner_profile(
    mesh: &mut Mesh,
    corner: &Corner,
    opposite: u32,
    offset: Real,
    segments: usize,
) -> Result<Vec<u32>> {
    let u = mesh.position(corner.vertex);
    let edge_dir = (mesh.position(opposite) - u).normalize();
    let mut slid = [u; 2];
    for (slot, w) in slid.iter_mut().zip([corner.w1, corner.w2]) {
        let (dir, sin) = slide_direction(u, mesh.position(w), &edge_dir);
        if sin <= Real::EPSILON {
            return Err(GearError::degenerate(
                STAGE,
                format!("edge at vertex {} is parallel to the bevelled edge", corner.vertex),
            ));
        }
        *slot = u + dir * (offset / sin);
    }
    Ok(mesh.add_vertices(bevel_profile(u, slid[0], slid[1], segments)))
}

/// Replace `vertex` in `face` by `with`, in place.
fn splice(mesh: &mut Mesh, face: usize, vertex: u32, with: &[u32]) -> Result<()> {
    let indices = &mut mesh.faces[face].indices;
    let at = indices
        .iter()
        .position(|&i| i == vertex)
        .ok_or_else(|| GearError::degenerate(STAGE, "bevel splice target missing"))?;
    indices.splice(at..=at, with.iter().copied());
    Ok(())
}

/// Splice a corner's arc into its third face, ordered to match the face winding.
fn splice_arc(mesh: &mut Mesh, corner: &Corner, arc: &[u32]) -> Result<()> {
    let (prev, next) = mesh.faces[corner.f3]
        .neighbors_of(corner.vertex)
        .ok_or_else(|| GearError::degenerate(STAGE, "bevel corner missing from third face"))?;
    if prev == corner.w1 && next == corner.w2 {
        splice(mesh, corner.f3, corner.vertex, arc)
    } else if prev == corner.w2 && next == corner.w1 {
        let reversed: Vec<u32> = arc.iter().rev().copied().collect();
        splice(mesh, corner.f3, corner.vertex, &reversed)
    } else {
        Err(GearError::degenerate(
            STAGE,
            format!("third face at vertex {} does not join both slide edges", corner.vertex),
        ))
    }
}

fn bevel_edge(mesh: &mut Mesh, [u, v]: [u32; 2], offset: Real, segments: usize) -> Result<()> {
    let (f1, f2) = edge_faces(mesh, [u, v])?;
    let at_u = corner(mesh, u, v, f1, f2)?;
    let at_v = corner(mesh, v, u, f1, f2)?;

    let arc_u = add_corner_profile(mesh, &at_u, v, offset, segments)?;
    let arc_v = add_corner_profile(mesh, &at_v, u, offset, segments)?;
    let last = segments;

    let forward = mesh.faces[f1].edge_direction(u, v) == Some(true);

    splice(mesh, f1, u, &arc_u[..1])?;
    splice(mesh, f1, v, &arc_v[..1])?;
    splice(mesh, f2, u, &arc_u[last..])?;
    splice(mesh, f2, v, &arc_v[last..])?;
    splice_arc(mesh, &at_u, &arc_u)?;
    splice_arc(mesh, &at_v, &arc_v)?;

    // `a -> b` is the direction the first face traverses the edge.
    let (a, b) = if forward { (&arc_u, &arc_v) } else { (&arc_v, &arc_u) };
    for k in 0..segments {
        mesh.add_face(vec![b[k], a[k], a[k + 1], b[k + 1]]);
    }
    Ok(())
}

/// Bevel every tooth tip edge, top and bottom.
#[instrument(
    skip(ctx),
    fields(offset = ctx.settings.bevel.offset, segments = ctx.settings.bevel.segments)
)]
pub fn bevel_tips(ctx: &mut PipelineContext) -> Result<BevelOutcome> {
    let tolerance = ctx.tolerance();
    let settings = ctx.settings.bevel;
    let expected = 2 * ctx.geometry.teeth as usize;

    let seeds = tip_edges(&ctx.mesh, ctx.geometry.tip_radius, tolerance);
    let Some(&seed) = seeds.first() else {
        return Err(GearError::inconsistent(STAGE, "tip edges", expected, 0));
    };
    let class = edges_of_length(&ctx.mesh, ctx.mesh.edge_length(seed));
    GearError::check_count(STAGE, "tip edge class", expected, class.len())?;

    let mut endpoints: Vec<u32> = class.iter().flatten().copied().collect();
    endpoints.sort_unstable();
    endpoints.dedup();
    GearError::check_count(STAGE, "tip edge endpoints", 2 * expected, endpoints.len())?;
    for &i in &endpoints {
        ctx.mesh.vertices[i as usize].selected = true;
    }
    ctx.selection.edges = class.clone();

    let mut offset = settings.offset;
    let mut clamped = false;
    if settings.clamp_overlap {
        let edge_faces_map = ctx.mesh.edge_face_map();
        let mut limit = Real::INFINITY;
        for &[u, v] in &class {
            let faces = edge_faces_map
                .get(&edge_key(u, v))
                .map_or(&[][..], Vec::as_slice);
            let &[f1, f2] = faces else {
                return Err(GearError::inconsistent(STAGE, "faces on bevel edge", 2, faces.len()));
            };
            for (vertex, opposite) in [(u, v), (v, u)] {
                let at = corner(&ctx.mesh, vertex, opposite, f1, f2)?;
                limit = limit.min(corner_offset_limit(&ctx.mesh, &at, opposite));
            }
        }
        if limit < offset {
            warn!(
                requested = settings.offset,
                applied = limit,
                "bevel offset clamped to avoid overlapping neighbouring edges"
            );
            offset = limit;
            clamped = true;
        }
    }
    if !(offset > tolerance) {
        return Err(GearError::degenerate(
            STAGE,
            format!("bevel offset {offset} collapses below the weld tolerance"),
        ));
    }

    let vertices_before = ctx.mesh.vertex_count();
    let faces_before = ctx.mesh.face_count();
    for &edge in &class {
        bevel_edge(&mut ctx.mesh, edge, offset, settings.segments)?;
    }
    ctx.mesh.sync_edges();
    ctx.mesh.compact();

    GearError::check_count(
        STAGE,
        "bevelled vertices",
        vertices_before + 2 * settings.segments * class.len(),
        ctx.mesh.vertex_count(),
    )?;
    GearError::check_count(
        STAGE,
        "bevelled faces",
        faces_before + settings.segments * class.len(),
        ctx.mesh.face_count(),
    )?;

    ctx.note_bevel_offset(offset);
    debug!(edges = class.len(), offset, clamped, "tips bevelled");
    Ok(BevelOutcome {
        edges: class.len(),
        offset,
        clamped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildSettings;
    use crate::gear::{bore, extrude, involute, outline, tooth};
    use crate::mesh::tests::unit_cube;
    use crate::params::GearParameters;

    fn bored(params: GearParameters) -> PipelineContext {
        let mut ctx = PipelineContext::new(params, BuildSettings::default()).expect("valid");
        let flank = involute::sample_flank(&mut ctx).expect("sampled");
        let profile = tooth::build_profile(&mut ctx, &flank).expect("profile");
        let loop_ = outline::assemble_outline(&mut ctx, &profile).expect("outline");
        let solid = extrude::extrude(&mut ctx, &loop_).expect("extruded");
        bore::cut_bore(&mut ctx, &solid).expect("bored");
        ctx
    }

    #[test]
    fn reference_gear_tips_are_rounded_with_a_clamped_offset() {
        let mut ctx = bored(GearParameters::default());
        let (v, f) = (ctx.mesh.vertex_count(), ctx.mesh.face_count());
        let outcome = bevel_tips(&mut ctx).expect("bevelled");

        assert_eq!(outcome.edges, 36);
        assert!(outcome.clamped, "0.6 overlaps the tip cap");
        assert!(outcome.offset > 0.0 && outcome.offset < 0.6);
        assert_eq!(ctx.report().bevel_offset, Some(outcome.offset));
        assert_eq!(ctx.mesh.vertex_count(), v + 36 * 2 * 10);
        assert_eq!(ctx.mesh.face_count(), f + 36 * 10);

        let analysis = ctx.mesh.analyze_manifold();
        assert!(analysis.is_closed_solid(), "{analysis:?}");
        assert_eq!(analysis.genus(), Some(1));
        // No vertex reaches the tip circle at either end cap any more.
        let (tip, height) = (ctx.geometry.tip_radius, ctx.geometry.height);
        assert!(ctx.mesh.vertices.iter().all(|v| {
            let on_cap = v.pos.z.abs() < 1e-9 || (v.pos.z - height).abs() < 1e-9;
            !on_cap || v.radial_distance() < tip - 1e-3
        }));
    }

    #[test]
    fn unclamped_small_offset_is_applied_as_requested() {
        let mut ctx = bored(GearParameters::new(2.0, 30, 4.0, 3.0));
        ctx.settings.bevel.offset = 0.05;
        let outcome = bevel_tips(&mut ctx).expect("bevelled");
        assert!(!outcome.clamped);
        assert_eq!(outcome.offset, 0.05);
        assert_eq!(outcome.edges, 60);
    }

    #[test]
    fn profile_is_a_quarter_circle_for_a_right_angle() {
        let u = Point3::new(1.0, 1.0, 0.0);
        let p1 = Point3::new(0.8, 1.0, 0.0);
        let p2 = Point3::new(1.0, 0.8, 0.0);
        let arc = bevel_profile(u, p1, p2, 4);
        assert_eq!(arc.len(), 5);
        assert_eq!(arc[0], p1);
        assert_eq!(arc[4], p2);
        let center = Point3::new(0.8, 0.8, 0.0);
        for p in &arc {
            assert!(((p - center).norm() - 0.2).abs() < 1e-12);
        }
    }

    #[test]
    fn cube_edge_bevel_stays_closed() {
        let mut cube = unit_cube();
        // Top front edge, between vertices 4 and 5.
        bevel_edge(&mut cube, [4, 5], 0.25, 3).expect("bevelled");
        cube.sync_edges();
        cube.compact();

        assert_eq!(cube.vertex_count(), 8 - 2 + 2 * 4);
        assert_eq!(cube.face_count(), 6 + 3);
        let analysis = cube.analyze_manifold();
        assert!(analysis.is_closed_solid(), "{analysis:?}");
        assert_eq!(analysis.genus(), Some(0));

        // A rounded edge removes less than the chamfered corner prism (0.25² / 2).
        let removed = 1.0 - cube.signed_volume();
        assert!(removed > 0.0 && removed < 0.25 * 0.25 / 2.0, "removed {removed}");
    }

    #[test]
    fn bevel_surface_keeps_the_offset_from_the_faces() {
        let mut cube = unit_cube();
        bevel_edge(&mut cube, [6, 7], 0.1, 5).expect("bevelled");
        // New vertices on the top face sit 0.1 away from the back face (y = 1).
        let slid_on_top: Vec<_> = cube
            .vertices
            .iter()
            .skip(8)
            .filter(|v| (v.pos.z - 1.0).abs() < 1e-12)
            .collect();
        assert_eq!(slid_on_top.len(), 2);
        for v in slid_on_top {
            assert!((v.pos.y - 0.9).abs() < 1e-12);
        }
    }

    #[test]
    fn offset_limit_respects_shortest_slide_edge() {
        let cube = unit_cube();
        let (f1, f2) = edge_faces(&cube, [4, 5]).expect("two faces");
        let at = corner(&cube, 4, 5, f1, f2).expect("valence three");
        let limit = corner_offset_limit(&cube, &at, 5);
        assert!((limit - 0.5 * OVERLAP_MARGIN).abs() < 1e-12);
    }

    #[test]
    fn tip_class_matches_length_not_position() {
        let cube = unit_cube();
        // All twelve cube edges have unit length.
        assert_eq!(edges_of_length(&cube, 1.0).len(), 12);
        assert!(edges_of_length(&cube, 1.1).is_empty());
        let diagonal_circle = 2.0_f64.sqrt() as Real;
        // Vertices 2 and 6 are the only ones at radius √2; they share no level.
        assert!(tip_edges(&cube, diagonal_circle, 1e-9).is_empty());
    }
}
