//! Test support library
//! Provides various helper functions & utilities for tests.
#![allow(dead_code)]

use gearmesh::{GearParameters, Mesh, float_types::Real};
use nalgebra::Point3;

/// Returns the bounding box `[min_x, min_y, min_z, max_x, max_y, max_z]` of a mesh.
pub fn bounding_box(mesh: &Mesh) -> [Real; 6] {
    let aabb = mesh.bounding_box().expect("mesh has vertices");
    [
        aabb.mins.x,
        aabb.mins.y,
        aabb.mins.z,
        aabb.maxs.x,
        aabb.maxs.y,
        aabb.maxs.z,
    ]
}

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

/// Smallest and largest distance of any vertex from the gear axis.
pub fn radial_extent(mesh: &Mesh) -> (Real, Real) {
    mesh.vertices
        .iter()
        .map(|v| v.radial_distance())
        .fold((Real::MAX, Real::MIN), |(lo, hi), r| (lo.min(r), hi.max(r)))
}

/// Whether some vertex of `mesh` lies within `eps` of `p`.
pub fn has_vertex_near(mesh: &Mesh, p: &Point3<Real>, eps: Real) -> bool {
    mesh.vertices.iter().any(|v| (v.pos - p).norm() < eps)
}

/// Innermost radius reached by the root fillets of a gear.
pub fn fillet_floor(params: &GearParameters) -> Real {
    let geometry = params.validate().expect("valid parameters");
    let half_gap = 0.5 * geometry.gap_angle();
    geometry.base_radius * (half_gap.cos() - half_gap.sin())
}

/// Vertex and face counts predicted for a finished gear.
pub fn expected_counts(
    teeth: usize,
    flank_steps: usize,
    fillet_segments: usize,
    bevel_segments: usize,
) -> (usize, usize) {
    let loop_len = teeth * (2 * flank_steps + 2 + fillet_segments - 1);
    let rim = teeth * (fillet_segments + 1);
    let ring = (rim / 2).max(3);
    let vertices = 2 * loop_len + 2 * ring + 4 * teeth * bevel_segments;
    let faces = loop_len + 2 * teeth + 2 * (rim + ring) + ring + 2 * teeth * bevel_segments;
    (vertices, faces)
}
