//! Tolerance-based vertex welding.

use super::Mesh;
use crate::float_types::Real;
use hashbrown::HashMap;
use nalgebra::Point3;

type Cell = (i64, i64, i64);

#[inline]
fn cell_of(p: &Point3<Real>, size: Real) -> Cell {
    (
        (p.x / size).floor() as i64,
        (p.y / size).floor() as i64,
        (p.z / size).floor() as i64,
    )
}

impl Mesh {
    /// Merge every vertex into the first earlier vertex lying within `tolerance`,
    /// rewrite edges and faces, and renumber the survivors in their original order.
    ///
    /// Candidates are looked up in a uniform grid of cell size `tolerance`, so only
    /// the 27 cells around a vertex are searched. Survivors are pairwise further
    /// apart than `tolerance`, which makes a second weld a no-op.
    ///
    /// Returns the remap table (old index -> new index). A merged vertex stays
    /// selected if any of its sources was.
    pub fn weld(&mut self, tolerance: Real) -> Vec<u32> {
        let mut grid: HashMap<Cell, Vec<u32>> = HashMap::with_capacity(self.vertices.len());
        let mut target: Vec<u32> = Vec::with_capacity(self.vertices.len());

        for (i, vertex) in self.vertices.iter().enumerate() {
            let (cx, cy, cz) = cell_of(&vertex.pos, tolerance);
            let mut found = None;
            'search: for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let Some(bucket) = grid.get(&(cx + dx, cy + dy, cz + dz)) else {
                            continue;
                        };
                        for &candidate in bucket {
                            let other = &self.vertices[candidate as usize].pos;
                            if (vertex.pos - other).norm() <= tolerance {
                                found = Some(candidate);
                                break 'search;
                            }
                        }
                    }
                }
            }
            match found {
                Some(representative) => target.push(representative),
                None => {
                    grid.entry((cx, cy, cz)).or_default().push(i as u32);
                    target.push(i as u32);
                },
            }
        }

        let mut remap = vec![0u32; self.vertices.len()];
        let mut kept = Vec::with_capacity(grid.len());
        for i in 0..self.vertices.len() {
            let representative = target[i] as usize;
            if representative == i {
                remap[i] = kept.len() as u32;
                kept.push(self.vertices[i]);
            } else {
                remap[i] = remap[representative];
                if self.vertices[i].selected {
                    kept[remap[i] as usize].selected = true;
                }
            }
        }

        self.vertices = kept;
        self.apply_remap(&remap);
        remap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::unit_cube;

    #[test]
    fn merges_coincident_polyline_ends() {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertices([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ]);
        let b = mesh.add_vertices([
            Point3::new(1.0 + 1e-6, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ]);
        mesh.add_polyline(&a);
        mesh.add_polyline(&b);

        let remap = mesh.weld(1e-4);
        assert_eq!(remap, vec![0, 1, 1, 2]);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.edges, vec![[0, 1], [1, 2]]);
    }

    #[test]
    fn merges_across_grid_cell_boundaries() {
        let mut mesh = Mesh::new();
        // Both sides of the x = 1e-4 cell boundary.
        mesh.add_vertex(Point3::new(0.99e-4, 0.0, 0.0));
        mesh.add_vertex(Point3::new(1.01e-4, 0.0, 0.0));
        mesh.add_edge(0, 1);
        mesh.weld(1e-4);
        assert_eq!(mesh.vertex_count(), 1);
        assert!(mesh.edges.is_empty(), "collapsed edge should be dropped");
    }

    #[test]
    fn weld_is_idempotent() {
        let mut mesh = unit_cube();
        // Duplicate the top ring and rebuild the top face on the copies.
        let copies: Vec<u32> = (4..8)
            .map(|i| {
                let p = mesh.position(i);
                mesh.add_vertex(p + nalgebra::Vector3::new(3e-5, 0.0, 0.0))
            })
            .collect();
        mesh.faces[1].indices = copies;
        mesh.sync_edges();

        mesh.weld(1e-4);
        let once = mesh.clone();
        let remap = mesh.weld(1e-4);
        assert_eq!(mesh, once, "a second weld must not change the mesh");
        assert_eq!(remap, (0..8).collect::<Vec<u32>>());
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.edge_count(), 12);
    }

    #[test]
    fn selection_survives_merge() {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Point3::origin());
        let dup = mesh.add_vertex(Point3::new(0.0, 0.0, 1e-6));
        mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        mesh.add_polyline(&[0, 2]);
        mesh.add_polyline(&[dup, 2]);
        mesh.vertices[dup as usize].selected = true;
        mesh.weld(1e-4);
        assert_eq!(mesh.selected(), vec![0]);
    }
}
