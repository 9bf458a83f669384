//! Degenerate element detection.

use super::Mesh;
use crate::errors::{GearError, Result};
use crate::float_types::Real;
use crate::pipeline::BuildStage;

/// Elements that collapsed below the weld tolerance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DegeneracyReport {
    /// Edges shorter than the tolerance
    pub short_edges: Vec<[u32; 2]>,
    /// Faces whose area is below `tolerance²`, or that repeat a vertex
    pub collapsed_faces: Vec<usize>,
}

impl DegeneracyReport {
    pub fn is_clean(&self) -> bool {
        self.short_edges.is_empty() && self.collapsed_faces.is_empty()
    }
}

impl Mesh {
    pub fn find_degenerate(&self, tolerance: Real) -> DegeneracyReport {
        let short_edges = self
            .edges
            .iter()
            .copied()
            .filter(|&edge| self.edge_length(edge) < tolerance)
            .collect();

        let min_area = tolerance * tolerance;
        let collapsed_faces = self
            .faces
            .iter()
            .enumerate()
            .filter(|(_, face)| {
                let mut sorted = face.indices.clone();
                sorted.sort_unstable();
                sorted.dedup();
                sorted.len() < face.len() || self.face_area(face) < min_area
            })
            .map(|(i, _)| i)
            .collect();

        DegeneracyReport {
            short_edges,
            collapsed_faces,
        }
    }

    /// Fail with `DegenerateGeometry` if any edge or face collapsed below `tolerance`.
    pub fn ensure_non_degenerate(&self, stage: BuildStage, tolerance: Real) -> Result<()> {
        let report = self.find_degenerate(tolerance);
        if let Some(&[a, b]) = report.short_edges.first() {
            return Err(GearError::degenerate(
                stage,
                format!(
                    "{} edge(s) shorter than {tolerance}, first between vertices {a} and {b}",
                    report.short_edges.len()
                ),
            ));
        }
        if let Some(&face) = report.collapsed_faces.first() {
            return Err(GearError::degenerate(
                stage,
                format!(
                    "{} face(s) with zero area, first is face {face}",
                    report.collapsed_faces.len()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::unit_cube;
    use nalgebra::Point3;

    #[test]
    fn cube_is_clean() {
        let cube = unit_cube();
        assert!(cube.find_degenerate(1e-4).is_clean());
        assert!(cube.ensure_non_degenerate(BuildStage::Done, 1e-4).is_ok());
    }

    #[test]
    fn sliver_triangle_is_reported() {
        let mut mesh = Mesh::new();
        mesh.add_vertices([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 1e-12, 0.0),
        ]);
        mesh.add_face(vec![0, 1, 2]);
        mesh.sync_edges();

        let report = mesh.find_degenerate(1e-4);
        assert!(report.short_edges.is_empty());
        assert_eq!(report.collapsed_faces, vec![0]);
        let err = mesh
            .ensure_non_degenerate(BuildStage::Bored, 1e-4)
            .unwrap_err();
        assert!(matches!(
            err,
            GearError::DegenerateGeometry {
                stage: BuildStage::Bored,
                ..
            }
        ));
    }

    #[test]
    fn short_edge_is_reported() {
        let mut mesh = Mesh::new();
        mesh.add_vertices([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1e-6, 0.0, 0.0),
        ]);
        mesh.add_edge(0, 1);
        assert_eq!(mesh.find_degenerate(1e-4).short_edges, vec![[0, 1]]);
    }
}
