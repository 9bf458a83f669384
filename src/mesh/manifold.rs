//! Manifold validation and topology analysis.

use super::{Mesh, edge_key};
use crate::errors::{GearError, Result};
use crate::pipeline::BuildStage;
use hashbrown::HashMap;

/// Topological summary of a mesh.
///
/// ## **Properties checked**
/// 1. **Edge manifold**: every edge is shared by exactly 2 faces
/// 2. **Orientation consistency**: adjacent faces traverse their shared edge in opposite directions
/// 3. **Closedness**: no boundary edges
/// 4. **Connectivity**: number of edge-connected face components
///
/// The Euler characteristic `χ = V − E + F` of a closed orientable surface is
/// `2 − 2g`; a gear body with one through-bore has genus 1, so `χ = 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifoldAnalysis {
    /// Every edge has two faces, no vertex is isolated and windings agree
    pub is_manifold: bool,
    /// Edges used by a single face (0 for closed solids)
    pub boundary_edges: usize,
    /// Edges used by more than two faces
    pub non_manifold_edges: usize,
    /// Vertices no face references
    pub isolated_vertices: usize,
    pub connected_components: usize,
    pub consistent_orientation: bool,
    /// V − E + F, with E counted from face boundaries
    pub euler_characteristic: i64,
}

impl ManifoldAnalysis {
    /// Closed, manifold and consistently oriented.
    pub const fn is_closed_solid(&self) -> bool {
        self.is_manifold && self.boundary_edges == 0
    }

    /// Genus of a closed orientable surface, if the characteristic allows one.
    pub const fn genus(&self) -> Option<i64> {
        let twice = 2 * self.connected_components as i64 - self.euler_characteristic;
        if twice >= 0 && twice % 2 == 0 {
            Some(twice / 2)
        } else {
            None
        }
    }

    /// Fail unless this is one closed, consistently oriented solid of the given genus.
    pub fn ensure_closed_solid(&self, stage: BuildStage, genus: usize) -> Result<()> {
        GearError::check_count(stage, "boundary edges", 0, self.boundary_edges)?;
        GearError::check_count(stage, "non-manifold edges", 0, self.non_manifold_edges)?;
        GearError::check_count(stage, "isolated vertices", 0, self.isolated_vertices)?;
        GearError::check_count(stage, "connected components", 1, self.connected_components)?;
        if !self.consistent_orientation {
            return Err(GearError::degenerate(stage, "adjacent face windings disagree"));
        }
        match self.genus() {
            Some(found) => GearError::check_count(stage, "genus", genus, found as usize),
            None => Err(GearError::degenerate(
                stage,
                format!(
                    "euler characteristic {} has no closed-surface genus",
                    self.euler_characteristic
                ),
            )),
        }
    }
}

impl Mesh {
    pub fn analyze_manifold(&self) -> ManifoldAnalysis {
        let edge_faces = self.edge_face_map();

        let mut boundary_edges = 0;
        let mut non_manifold_edges = 0;
        for faces in edge_faces.values() {
            match faces.len() {
                1 => boundary_edges += 1,
                2 => {},
                _ => non_manifold_edges += 1,
            }
        }

        let mut referenced = vec![false; self.vertices.len()];
        for face in &self.faces {
            for &i in &face.indices {
                referenced[i as usize] = true;
            }
        }
        let isolated_vertices = referenced.iter().filter(|&&r| !r).count();

        let consistent_orientation = self.check_orientation_consistency(&edge_faces);
        let connected_components = self.count_connected_components(&edge_faces);

        let euler_characteristic = self.vertices.len() as i64 - edge_faces.len() as i64
            + self.faces.len() as i64;

        ManifoldAnalysis {
            is_manifold: non_manifold_edges == 0
                && isolated_vertices == 0
                && consistent_orientation,
            boundary_edges,
            non_manifold_edges,
            isolated_vertices,
            connected_components,
            consistent_orientation,
            euler_characteristic,
        }
    }

    fn check_orientation_consistency(&self, edge_faces: &HashMap<[u32; 2], Vec<usize>>) -> bool {
        edge_faces.iter().all(|([a, b], faces)| {
            let [first, second] = faces.as_slice() else {
                return true;
            };
            let one = self.faces[*first].edge_direction(*a, *b);
            let two = self.faces[*second].edge_direction(*a, *b);
            one != two
        })
    }

    /// Count components with a union-find over faces sharing an edge.
    fn count_connected_components(&self, edge_faces: &HashMap<[u32; 2], Vec<usize>>) -> usize {
        let mut parent: Vec<usize> = (0..self.faces.len()).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for faces in edge_faces.values() {
            for pair in faces.windows(2) {
                let a = find(&mut parent, pair[0]);
                let b = find(&mut parent, pair[1]);
                if a != b {
                    parent[a] = b;
                }
            }
        }

        (0..self.faces.len())
            .filter(|&i| find(&mut parent, i) == i)
            .count()
    }

    /// Number of faces bounded by the undirected edge `a`-`b`.
    pub fn edge_valence(&self, a: u32, b: u32) -> usize {
        self.edge_face_map()
            .get(&edge_key(a, b))
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::unit_cube;

    #[test]
    fn cube_is_a_closed_genus_zero_solid() {
        let analysis = unit_cube().analyze_manifold();
        assert!(analysis.is_closed_solid(), "{analysis:?}");
        assert_eq!(analysis.euler_characteristic, 2);
        assert_eq!(analysis.connected_components, 1);
        assert_eq!(analysis.genus(), Some(0));
        assert!(analysis.ensure_closed_solid(BuildStage::Done, 0).is_ok());
        assert!(matches!(
            analysis.ensure_closed_solid(BuildStage::Done, 1),
            Err(GearError::GeometryInconsistency {
                check: "genus",
                expected: 1,
                actual: 0,
                ..
            })
        ));
    }

    #[test]
    fn open_box_has_boundary() {
        let mut cube = unit_cube();
        cube.faces.remove(1);
        let analysis = cube.analyze_manifold();
        assert_eq!(analysis.boundary_edges, 4);
        assert!(!analysis.is_closed_solid());
        assert_eq!(analysis.euler_characteristic, 1);
        assert!(matches!(
            analysis.ensure_closed_solid(BuildStage::Done, 0),
            Err(GearError::GeometryInconsistency {
                check: "boundary edges",
                ..
            })
        ));
    }

    #[test]
    fn separate_pieces_are_counted() {
        let mut mesh = unit_cube();
        let offset = mesh.vertex_count() as u32;
        let second = unit_cube();
        for v in &second.vertices {
            mesh.add_vertex(v.pos + nalgebra::Vector3::new(5.0, 0.0, 0.0));
        }
        for face in &second.faces {
            mesh.add_face(face.indices.iter().map(|i| i + offset).collect());
        }
        let analysis = mesh.analyze_manifold();
        assert_eq!(analysis.connected_components, 2);
        assert_eq!(analysis.euler_characteristic, 4);
        assert_eq!(analysis.genus(), Some(0));
        assert_eq!(mesh.edge_valence(0, 1), 2);
    }
}
