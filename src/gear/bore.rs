//! Concentric through-bore and the two end caps around it.
//!
//! Each end cap is split into one polygon per tooth (root, flank, tip, flank, root)
//! and a triangulated annulus between the rim candidates (outline vertices on or
//! inside the base circle) and a circular ring of radius `inner_radius`.

use super::extrude::Extrusion;
use super::polar_angle;
use crate::errors::{GearError, Result};
use crate::float_types::{PI, Real, TAU};
use crate::mesh::Mesh;
use crate::pipeline::{BuildStage, PipelineContext};
use geo::{Coord, LineString, Polygon, TriangulateEarcut};
use hashbrown::HashMap;
use nalgebra::{Point2, Point3};
use tracing::{debug, instrument, warn};

const STAGE: BuildStage = BuildStage::Bored;

/// Vertex rings bounding the bore wall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bore {
    pub top_ring: Vec<u32>,
    pub bottom_ring: Vec<u32>,
    /// The annulus was ear clipped because the angular zipper would fold over
    pub fallback: bool,
}

/// Ring segment count for a given number of rim candidates.
pub const fn ring_segments(candidates: usize) -> usize {
    let half = candidates / 2;
    if half < 3 { 3 } else { half }
}

/// Triangles of the annulus between `outer` and `inner`, both counter-clockwise in
/// the xy plane. Indices address `outer` first, then `inner` offset by `outer.len()`.
/// Every triangle is counter-clockwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnulusTriangulation {
    pub triangles: Vec<[usize; 3]>,
    pub ear_clipped: bool,
}

/// Triangulate the annulus by walking both loops in polar angle, starting at the
/// angle of `outer[0]`. Falls back to ear clipping if any zipper triangle would not
/// be strictly counter-clockwise.
pub fn bridge_annulus(
    outer: &[Point2<Real>],
    inner: &[Point2<Real>],
) -> Result<AnnulusTriangulation> {
    let triangles = zipper(outer, inner);
    let folds = triangles
        .iter()
        .any(|&tri| triangle_area(outer, inner, tri) <= 0.0);
    if !folds {
        return Ok(AnnulusTriangulation {
            triangles,
            ear_clipped: false,
        });
    }

    let triangles = ear_clip(outer, inner)?;
    Ok(AnnulusTriangulation {
        triangles,
        ear_clipped: true,
    })
}

fn point_at(outer: &[Point2<Real>], inner: &[Point2<Real>], index: usize) -> Point2<Real> {
    if index < outer.len() {
        outer[index]
    } else {
        inner[index - outer.len()]
    }
}

fn triangle_area(outer: &[Point2<Real>], inner: &[Point2<Real>], [a, b, c]: [usize; 3]) -> Real {
    let (pa, pb, pc) = (
        point_at(outer, inner, a),
        point_at(outer, inner, b),
        point_at(outer, inner, c),
    );
    0.5 * (pb - pa).perp(&(pc - pa))
}

fn zipper(outer: &[Point2<Real>], inner: &[Point2<Real>]) -> Vec<[usize; 3]> {
    let (m, n) = (outer.len(), inner.len());
    let start = outer[0].y.atan2(outer[0].x);
    let relative = |p: &Point2<Real>| (p.y.atan2(p.x) - start).rem_euclid(TAU);

    let mut outer_angles: Vec<Real> = outer.iter().map(relative).collect();
    outer_angles[0] = 0.0;
    outer_angles.push(TAU);
    let inner_angles: Vec<Real> = (0..=n).map(|j| TAU * j as Real / n as Real).collect();

    let mut triangles = Vec::with_capacity(m + n);
    let (mut i, mut j) = (0, 0);
    while i < m || j < n {
        let advance_outer = j == n || (i < m && outer_angles[i + 1] <= inner_angles[j + 1]);
        if advance_outer {
            triangles.push([i % m, (i + 1) % m, m + j % n]);
            i += 1;
        } else {
            triangles.push([i % m, m + (j + 1) % n, m + j % n]);
            j += 1;
        }
    }
    triangles
}

fn ear_clip(outer: &[Point2<Real>], inner: &[Point2<Real>]) -> Result<Vec<[usize; 3]>> {
    let ring = |points: &[Point2<Real>]| {
        LineString::from(
            points
                .iter()
                .map(|p| Coord { x: p.x, y: p.y })
                .collect::<Vec<_>>(),
        )
    };
    let polygon = Polygon::new(ring(outer), vec![ring(inner)]);
    let triangulation = polygon.earcut_triangles_raw();
    let vertices = triangulation.vertices;

    let mut lookup = HashMap::with_capacity(outer.len() + inner.len());
    for (i, p) in outer.iter().chain(inner).enumerate() {
        lookup.entry((p.x.to_bits(), p.y.to_bits())).or_insert(i);
    }

    let mut triangles = Vec::with_capacity(triangulation.triangle_indices.len() / 3);
    for raw in triangulation.triangle_indices.chunks_exact(3) {
        let mut tri = [0usize; 3];
        for (slot, &k) in tri.iter_mut().zip(raw) {
            let key = (vertices[2 * k].to_bits(), vertices[2 * k + 1].to_bits());
            *slot = *lookup.get(&key).ok_or_else(|| {
                GearError::degenerate(STAGE, "ear clipping produced a vertex not on the annulus")
            })?;
        }
        if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
            continue;
        }
        if triangle_area(outer, inner, tri) < 0.0 {
            tri.swap(1, 2);
        }
        triangles.push(tri);
    }
    Ok(triangles)
}

/// Distance from the gear axis to the segment `p`-`q` in the xy plane.
fn axis_distance(p: &Point2<Real>, q: &Point2<Real>) -> Real {
    let d = q - p;
    let length_sq = d.norm_squared();
    let t = if length_sq > 0.0 {
        (-p.coords.dot(&d) / length_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (p.coords + d * t).norm()
}

/// Select the loop vertices on or inside the base circle and return their loop positions.
fn select_rim(ctx: &mut PipelineContext, loop_: &[u32]) -> Result<Vec<usize>> {
    let limit = ctx.geometry.base_radius + ctx.tolerance();
    ctx.mesh.deselect_all();
    let positions: Vec<usize> = (0..loop_.len())
        .filter(|&i| ctx.mesh.vertices[loop_[i] as usize].radial_distance() <= limit)
        .collect();
    for &i in &positions {
        ctx.mesh.vertices[loop_[i] as usize].selected = true;
    }
    GearError::check_count(
        STAGE,
        "inner-rim candidates",
        ctx.geometry.teeth as usize * ctx.settings.rim_candidates_per_unit(),
        positions.len(),
    )?;
    ctx.selection.vertices = ctx.mesh.selected();
    Ok(positions)
}

/// Loop position ranges of the tooth caps: runs of non-candidates between two
/// consecutive candidates, both candidates included.
fn tooth_caps(rim: &[usize], loop_len: usize) -> Vec<Vec<usize>> {
    let mut caps = Vec::new();
    for c in 0..rim.len() {
        let from = rim[c];
        let to = rim[(c + 1) % rim.len()];
        let span = (to + loop_len - from) % loop_len;
        if span > 1 {
            caps.push((0..=span).map(|s| (from + s) % loop_len).collect());
        }
    }
    caps
}

fn xy(mesh: &Mesh, index: u32) -> Point2<Real> {
    let p = mesh.position(index);
    Point2::new(p.x, p.y)
}

fn add_ring(mesh: &mut Mesh, radius: Real, start: Real, segments: usize, z: Real) -> Vec<u32> {
    (0..segments)
        .map(|j| {
            let angle = start + TAU * j as Real / segments as Real;
            let (sin, cos) = angle.sin_cos();
            mesh.add_vertex(Point3::new(radius * cos, radius * sin, z))
        })
        .collect()
}

/// Cut the bore, close both end caps and add the bore wall.
#[instrument(skip(ctx, solid), fields(inner_radius = ctx.geometry.inner_radius))]
pub fn cut_bore(ctx: &mut PipelineContext, solid: &Extrusion) -> Result<Bore> {
    let geometry = ctx.geometry;
    let inner_radius = geometry.inner_radius;
    if !(inner_radius > 0.0 && inner_radius < geometry.base_radius) {
        return Err(GearError::invalid(
            STAGE,
            "inner_radius",
            format!(
                "must lie in (0, {}), got {inner_radius}",
                geometry.base_radius
            ),
        ));
    }
    let tolerance = ctx.tolerance();
    let loop_len = solid.top.len();
    let vertices_before = ctx.mesh.vertex_count();
    let faces_before = ctx.mesh.face_count();

    // Top cap first, as the ring starts there.
    let rim = select_rim(ctx, &solid.top)?;
    let outer_top: Vec<Point2<Real>> = rim.iter().map(|&i| xy(&ctx.mesh, solid.top[i])).collect();

    let innermost = (0..outer_top.len())
        .map(|c| axis_distance(&outer_top[c], &outer_top[(c + 1) % outer_top.len()]))
        .fold(Real::INFINITY, Real::min);
    if inner_radius >= innermost - tolerance {
        return Err(GearError::degenerate(
            STAGE,
            format!(
                "bore radius {inner_radius} reaches the root fillets (closest approach {innermost})"
            ),
        ));
    }

    let segments = ring_segments(rim.len());
    let ring_chord = 2.0 * inner_radius * (PI / segments as Real).sin();
    if ring_chord < tolerance {
        return Err(GearError::degenerate(
            STAGE,
            format!(
                "bore ring of {segments} segments at radius {inner_radius} has edges of \
                 {ring_chord}, below the weld tolerance {tolerance}"
            ),
        ));
    }
    let start = polar_angle(&ctx.mesh.position(solid.top[rim[0]]));
    let top_ring = add_ring(&mut ctx.mesh, inner_radius, start, segments, geometry.height);
    let bottom_ring = add_ring(&mut ctx.mesh, inner_radius, start, segments, 0.0);

    let caps = tooth_caps(&rim, loop_len);
    GearError::check_count(STAGE, "tooth caps", geometry.teeth as usize, caps.len())?;
    for cap in &caps {
        ctx.mesh.add_face(cap.iter().map(|&i| solid.top[i]).collect());
    }

    let ring_xy: Vec<Point2<Real>> = top_ring.iter().map(|&i| xy(&ctx.mesh, i)).collect();
    let top_annulus = bridge_annulus(&outer_top, &ring_xy)?;
    let m = rim.len();
    let resolve = |ring: &[u32], loop_: &[u32], index: usize| {
        if index < m {
            loop_[rim[index]]
        } else {
            ring[index - m]
        }
    };
    for tri in &top_annulus.triangles {
        let face = tri.iter().map(|&k| resolve(&top_ring, &solid.top, k)).collect();
        ctx.mesh.add_face(face);
    }

    // Bore wall, facing the axis.
    for j in 0..segments {
        let k = (j + 1) % segments;
        ctx.mesh
            .add_face(vec![bottom_ring[j], top_ring[j], top_ring[k], bottom_ring[k]]);
    }

    // Bottom cap, wound the other way.
    let bottom_rim = select_rim(ctx, &solid.bottom)?;
    if bottom_rim != rim {
        return Err(GearError::degenerate(
            STAGE,
            "top and bottom rim candidates differ",
        ));
    }
    for cap in &caps {
        ctx.mesh
            .add_face(cap.iter().rev().map(|&i| solid.bottom[i]).collect());
    }
    let outer_bottom: Vec<Point2<Real>> =
        rim.iter().map(|&i| xy(&ctx.mesh, solid.bottom[i])).collect();
    let bottom_annulus = bridge_annulus(&outer_bottom, &ring_xy)?;
    for tri in &bottom_annulus.triangles {
        let face = tri
            .iter()
            .rev()
            .map(|&k| resolve(&bottom_ring, &solid.bottom, k))
            .collect();
        ctx.mesh.add_face(face);
    }
    ctx.mesh.sync_edges();

    let fallback = top_annulus.ear_clipped || bottom_annulus.ear_clipped;
    if fallback {
        warn!(
            teeth = geometry.teeth,
            "angular bridge folds over the root fillets, annulus ear clipped instead"
        );
        ctx.note_bore_fallback();
    }

    GearError::check_count(
        STAGE,
        "bore vertices",
        vertices_before + 2 * segments,
        ctx.mesh.vertex_count(),
    )?;
    GearError::check_count(
        STAGE,
        "annulus triangles",
        2 * (m + segments),
        top_annulus.triangles.len() + bottom_annulus.triangles.len(),
    )?;
    GearError::check_count(
        STAGE,
        "bored faces",
        faces_before + 2 * caps.len() + segments + 2 * (m + segments),
        ctx.mesh.face_count(),
    )?;
    ctx.mesh.analyze_manifold().ensure_closed_solid(STAGE, 1)?;

    debug!(candidates = m, ring_segments = segments, fallback, "bore cut");
    Ok(Bore {
        top_ring,
        bottom_ring,
        fallback,
    })
}
