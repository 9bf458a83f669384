//! Full planar gear outline: teeth arrayed around the axis, joined by root fillets.

use super::rotation_z;
use super::tooth::ToothProfile;
use crate::errors::{GearError, Result};
use crate::float_types::{PI, Real};
use crate::mesh::{Mesh, signed_area_xy};
use crate::pipeline::{BuildStage, PipelineContext};
use nalgebra::{Point3, Vector3};
use tracing::{debug, instrument};

const STAGE: BuildStage = BuildStage::OutlineAssembled;

/// Semicircular fillet from `from` to `to` in the `z = 0` plane, centred on the chord
/// midpoint and bulging toward the gear axis. Returns `segments + 1` points, both
/// ends included.
pub fn fillet_arc(from: Point3<Real>, to: Point3<Real>, segments: usize) -> Vec<Point3<Real>> {
    let center = nalgebra::center(&from, &to);
    let radius = (from - center).norm();
    let toward_from = (from - center) / radius;
    let toward_axis = -Vector3::new(center.x, center.y, 0.0).normalize();

    (0..=segments)
        .map(|k| {
            if k == 0 {
                return from;
            }
            if k == segments {
                return to;
            }
            let theta = PI * k as Real / segments as Real;
            center + (toward_from * theta.cos() + toward_axis * theta.sin()) * radius
        })
        .collect()
}

/// The closed outline loop, counter-clockwise, starting at the first root of tooth 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    pub indices: Vec<u32>,
    /// Loop vertices per tooth-and-gap unit
    pub unit_len: usize,
}

impl Outline {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn unit_count(&self) -> usize {
        self.indices.len() / self.unit_len.max(1)
    }

    /// Loop indices of unit `k`: the tooth and the fillet that follows it.
    pub fn unit(&self, k: usize) -> &[u32] {
        &self.indices[k * self.unit_len..(k + 1) * self.unit_len]
    }
}

/// Close the tooth with its root fillet, array the unit `z` times, weld the seams and
/// trace the resulting loop.
#[instrument(skip(ctx, profile), fields(teeth = ctx.geometry.teeth))]
pub fn assemble_outline(ctx: &mut PipelineContext, profile: &ToothProfile) -> Result<Outline> {
    let teeth = ctx.geometry.teeth as usize;
    let pitch = ctx.geometry.angular_pitch;
    let segments = ctx.settings.fillet_segments;

    // Fillet from this tooth's second root to a duplicate of the next tooth's first root.
    let root_b = ctx.mesh.position(profile.root_b());
    let next_root_a = rotation_z(pitch) * ctx.mesh.position(profile.root_a());
    let fillet = ctx.mesh.add_vertices(fillet_arc(root_b, next_root_a, segments));
    ctx.mesh.add_polyline(&fillet);

    let unit_positions = ctx.mesh.positions();
    let unit_edges = ctx.mesh.edges.clone();
    for k in 1..teeth {
        let rotation = rotation_z(pitch * k as Real);
        let offset = ctx.mesh.vertex_count() as u32;
        for p in &unit_positions {
            ctx.mesh.add_vertex(rotation * p);
        }
        for [a, b] in &unit_edges {
            ctx.mesh.add_edge(a + offset, b + offset);
        }
    }

    let raw_vertices = ctx.mesh.vertex_count();
    let remap = ctx.mesh.weld(ctx.tolerance());
    debug!(
        raw_vertices,
        welded = raw_vertices - ctx.mesh.vertex_count(),
        "outline units welded"
    );

    let unit_len = ctx.settings.unit_vertex_count();
    GearError::check_count(STAGE, "outline vertices", teeth * unit_len, ctx.mesh.vertex_count())?;
    GearError::check_count(
        STAGE,
        "outline edges",
        ctx.mesh.vertex_count(),
        ctx.mesh.edge_count(),
    )?;

    let start = remap[profile.root_a() as usize];
    let second = remap[profile.indices[1] as usize];
    let indices = trace_loop(&ctx.mesh, start, second)?;

    let area = signed_area_xy(indices.iter().map(|&i| ctx.mesh.position(i)));
    if area <= 0.0 {
        return Err(GearError::degenerate(
            STAGE,
            format!("outline encloses non-positive area {area}"),
        ));
    }

    ctx.selection.vertices.extend_from_slice(&indices);
    Ok(Outline { indices, unit_len })
}

/// Walk the edge graph of a single closed loop from `start`, leaving through `second`.
/// Every vertex must have exactly two neighbours and the walk must visit all of them.
pub fn trace_loop(mesh: &Mesh, start: u32, second: u32) -> Result<Vec<u32>> {
    let n = mesh.vertex_count();
    let mut neighbors: Vec<Vec<u32>> = vec![Vec::with_capacity(2); n];
    for &[a, b] in &mesh.edges {
        neighbors[a as usize].push(b);
        neighbors[b as usize].push(a);
    }
    if let Some(bad) = neighbors.iter().find(|adjacent| adjacent.len() != 2) {
        return Err(GearError::inconsistent(STAGE, "outline vertex valence", 2, bad.len()));
    }
    if !neighbors[start as usize].contains(&second) {
        return Err(GearError::inconsistent(STAGE, "outline start edge", 1, 0));
    }

    let mut indices = Vec::with_capacity(n);
    let (mut previous, mut current) = (start, second);
    indices.push(start);
    while current != start && indices.len() <= n {
        indices.push(current);
        let adjacent = &neighbors[current as usize];
        let next = if adjacent[0] == previous {
            adjacent[1]
        } else {
            adjacent[0]
        };
        previous = current;
        current = next;
    }
    GearError::check_count(STAGE, "outline loop length", n, indices.len())?;
    Ok(indices)
}
